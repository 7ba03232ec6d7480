//! Dialect renderers: reachable declarations → validator source text.
//!
//! Shared plumbing lives here (emission order, binding headers, JS text
//! helpers, the interface ordering nudge); the dialect-specific lowering
//! is `joi.rs` and `yup.rs`, each an exhaustive match over `SchemaKind` so
//! a new IR variant fails to compile until both dialects handle it.

pub mod joi;
pub mod yup;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::diag::Diagnostics;
use crate::ir::{LiteralValue, SchemaKind, SchemaType};
use crate::store::{Binding, DeclKind, FileSchema, SchemaStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Joi,
    Yup,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Appended to declaration names to form generated identifiers.
    pub id_suffix: String,
    /// Inserted before the extension of output files and import specifiers.
    pub file_suffix: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { id_suffix: "Schema".to_string(), file_suffix: ".generated".to_string() }
    }
}

impl RenderOptions {
    pub fn generated_name(&self, name: &str) -> String {
        format!("{name}{}", self.id_suffix)
    }
}

/// A declaration-level lowering failure. Recoverable: the declaration is
/// skipped with a warning, unless it was forced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{dialect} cannot express {construct}")]
    Unsupported { dialect: &'static str, construct: &'static str },
    #[error("intersection members must be object shapes or unions")]
    MixedIntersection,
}

/// Fatal render outcome: a forced declaration failed.
#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("forced declaration `{decl}` failed to render: {source}")]
    Forced {
        decl: String,
        #[source]
        source: RenderError,
    },
}

/// Render one file. `None` when nothing in it is reachable.
pub fn render_file(
    dialect: Dialect,
    key: &str,
    store: &SchemaStore,
    opts: &RenderOptions,
    diags: &Diagnostics,
) -> Result<Option<String>, RenderFailure> {
    let Some(file) = store.file(key) else {
        return Ok(None);
    };
    match dialect {
        Dialect::Joi => joi::render(key, file, store, opts, diags),
        Dialect::Yup => yup::render(key, file, store, opts, diags),
    }
}

// --------------------------- Binding headers -------------------------------- //

/// `import`/`export` lines for the reachable bindings, already projected by
/// the store. Enum bindings also pull in the bare value map, which the
/// deferred `Enum.Member` accesses read from.
pub(crate) fn bindings_header(
    key: &str,
    store: &SchemaStore,
    opts: &RenderOptions,
) -> Vec<String> {
    let mut lines = Vec::new();
    for imp in store.used_imports(key) {
        lines.push(format!(
            "import {{ {} }} from '{}';",
            binding_list(&imp.bindings, &imp.file, store, opts),
            suffixed_specifier(&imp.spec, opts),
        ));
    }
    for exp in store.used_exports(key) {
        // local exports are already `export const`; only re-exports remain
        let (Some(origin), Some(spec)) = (&exp.file, &exp.spec) else {
            continue;
        };
        lines.push(format!(
            "export {{ {} }} from '{}';",
            binding_list(&exp.bindings, origin, store, opts),
            suffixed_specifier(spec, opts),
        ));
    }
    lines
}

fn binding_list(
    bindings: &[Binding],
    origin_key: &str,
    store: &SchemaStore,
    opts: &RenderOptions,
) -> String {
    let mut parts = Vec::new();
    for b in bindings {
        let origin = b.bound.as_deref().unwrap_or(&b.name);
        if store.lookup_kind(origin_key, origin) == Some(DeclKind::Enum) {
            parts.push(alias_pair(origin, &b.name));
        }
        parts.push(alias_pair(&opts.generated_name(origin), &opts.generated_name(&b.name)));
    }
    parts.join(", ")
}

fn alias_pair(origin: &str, local: &str) -> String {
    if origin == local {
        origin.to_string()
    } else {
        format!("{origin} as {local}")
    }
}

/// `./models` -> `./models.generated`; an explicit extension keeps it after
/// the suffix (`./models.ts` -> `./models.generated.ts`).
pub(crate) fn suffixed_specifier(spec: &str, opts: &RenderOptions) -> String {
    for ext in [".d.ts", ".tsx", ".ts"] {
        if let Some(stem) = spec.strip_suffix(ext) {
            return format!("{stem}{}{ext}", opts.file_suffix);
        }
    }
    format!("{spec}{}", opts.file_suffix)
}

// --------------------------- Interface order -------------------------------- //

/// Reachable interfaces, nudged so a same-file heritage base comes before
/// anything deriving from it. Best-effort (one DFS pass, visited set), not
/// a full topological sort; ties keep declaration order.
pub(crate) fn interface_order(file: &FileSchema) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited = std::collections::BTreeSet::new();
    for name in file.interfaces.keys() {
        if file.referenced.contains(name) {
            visit_interface(file, name, &mut visited, &mut order);
        }
    }
    order
}

fn visit_interface(
    file: &FileSchema,
    name: &str,
    visited: &mut std::collections::BTreeSet<String>,
    order: &mut Vec<String>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    if let Some(decl) = file.interfaces.get(name) {
        for heritage in &decl.heritages {
            if let Some(base) = reference_name(heritage) {
                if file.interfaces.contains_key(base) && file.referenced.contains(base) {
                    visit_interface(file, base, visited, order);
                }
            }
        }
        order.push(name.to_string());
    }
}

pub(crate) fn reference_name(ty: &SchemaType) -> Option<&str> {
    match &ty.kind {
        SchemaKind::TypeReference { name } => Some(name),
        SchemaKind::TypeAccess { name, .. } => Some(name),
        _ => None,
    }
}

// ------------------------------ JS text ------------------------------------- //

static JS_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

pub(crate) fn pad(n: usize) -> String {
    "    ".repeat(n)
}

/// Object key as it appears in generated source: bare when it is a valid
/// identifier, quoted otherwise.
pub(crate) fn js_key(name: &str) -> String {
    if JS_IDENT.is_match(name) {
        name.to_string()
    } else {
        format!("'{}'", js_escape(name))
    }
}

pub(crate) fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn literal_js(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Str(s) => format!("'{}'", js_escape(s)),
        LiteralValue::Num(n) => format!("{n}"),
        LiteralValue::Bool(b) => format!("{b}"),
        LiteralValue::BigInt(raw) => format!("{raw}n"),
    }
}

pub(crate) fn number_js(n: f64) -> String {
    format!("{n}")
}

/// Embed a pattern in a JS regex literal.
pub(crate) fn regex_literal(pattern: &str) -> String {
    format!("/{}/", pattern.replace('/', "\\/"))
}
