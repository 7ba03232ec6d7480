//! Passthrough compiler configuration.
//!
//! Options the external checker was run with that change how types compile
//! here; unknown keys are ignored so the same file can be shared with the
//! checker itself.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Strict null mode: nullability is read off union members instead of
    /// `@nullable`/`@undefineable` annotation tags.
    pub strict_null_checks: bool,
}

/// Load a config file. Any failure here is fatal for the run.
pub fn load(path: &Path) -> anyhow::Result<CompilerConfig> {
    let src = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("failed to read compiler config {}: {err}", path.display()))?;
    crate::snapshot::json_with_path(&src)
        .map_err(|err| anyhow::anyhow!("invalid compiler config {}: {err}", path.display()))
}
