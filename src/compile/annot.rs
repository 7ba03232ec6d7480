//! Annotation-tag parsing policies.
//!
//! Tags arrive as free text; everything here is best-effort. A payload that
//! fails to parse warns and is ignored, never aborts the declaration.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diag::Diagnostics;
use crate::ir::RegexSpec;
use crate::oracle::Tags;

pub(super) const TAG_NULLABLE: &str = "nullable";
pub(super) const TAG_UNDEFINEABLE: &str = "undefineable";
const TAG_REGEX: &str = "regex";
const TAG_INTEGER: &str = "integer";
const TAG_MIN: &str = "min";
const TAG_MAX: &str = "max";
const TAG_MIN_LENGTH: &str = "minLength";
const TAG_MAX_LENGTH: &str = "maxLength";
const TAG_PATTERN: &str = "pattern";

/// `@regex /pattern/ name?`: slash-delimited pattern, optionally followed
/// by a label. Bare payloads without slashes are taken whole as the pattern.
static REGEX_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?P<pat>.*)/(?:\s+(?P<name>\S+))?\s*$").unwrap());

pub(super) fn string_regex(tags: Option<&Tags>, diags: &Diagnostics) -> Option<RegexSpec> {
    let text = tags?.text(TAG_REGEX)?.trim();
    if text.is_empty() {
        return None;
    }
    let (pattern, name) = match REGEX_TAG.captures(text) {
        Some(caps) => (
            caps.name("pat").map(|m| m.as_str().to_string())?,
            caps.name("name").map(|m| m.as_str().to_string()),
        ),
        None => (text.to_string(), None),
    };
    if let Err(err) = Regex::new(&pattern) {
        diags.warn(format!("@{TAG_REGEX} pattern `{pattern}` is invalid and was ignored: {err}"));
        return None;
    }
    Some(RegexSpec { pattern, name })
}

pub(super) fn number_facts(tags: Option<&Tags>, diags: &Diagnostics) -> (bool, Option<f64>, Option<f64>) {
    let Some(tags) = tags else {
        return (false, None, None);
    };
    (
        tags.has(TAG_INTEGER),
        numeric_tag(tags, TAG_MIN, diags),
        numeric_tag(tags, TAG_MAX, diags),
    )
}

pub(super) fn array_bounds(tags: Option<&Tags>, diags: &Diagnostics) -> (Option<u32>, Option<u32>) {
    let Some(tags) = tags else {
        return (None, None);
    };
    (
        length_tag(tags, TAG_MIN_LENGTH, diags),
        length_tag(tags, TAG_MAX_LENGTH, diags),
    )
}

/// Key pattern for a string index signature, validated up front so the
/// renderers can embed it verbatim.
pub(super) fn indexer_pattern(tags: &Tags, diags: &Diagnostics) -> Option<String> {
    let text = tags.text(TAG_PATTERN)?.trim();
    if text.is_empty() {
        return None;
    }
    if let Err(err) = Regex::new(text) {
        diags.warn(format!("@{TAG_PATTERN} pattern `{text}` is invalid and was ignored: {err}"));
        return None;
    }
    Some(text.to_string())
}

fn numeric_tag(tags: &Tags, name: &str, diags: &Diagnostics) -> Option<f64> {
    let value = tags.parsed(name, |s| s.trim().parse::<f64>().ok());
    if value.is_none() {
        if let Some(text) = tags.text(name) {
            diags.warn(format!("@{name} payload `{}` is not a number and was ignored", text.trim()));
        }
    }
    value
}

fn length_tag(tags: &Tags, name: &str, diags: &Diagnostics) -> Option<u32> {
    let value = tags.parsed(name, |s| s.trim().parse::<u32>().ok());
    if value.is_none() {
        if let Some(text) = tags.text(name) {
            diags.warn(format!("@{name} payload `{}` is not a length and was ignored", text.trim()));
        }
    }
    value
}
