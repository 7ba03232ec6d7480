//! Type-graph snapshot files.
//!
//! A snapshot is the external type checker's exported view of a program:
//! one shared arena of type nodes plus, per source file, the declarations
//! (with their annotation tags) and the import/export tables. Loading a
//! snapshot is the only I/O the compiler core depends on.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::oracle::{Tags, TypeEntry, TypeId, TypeOracle};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub files: Vec<FileFacts>,
}

impl TypeOracle for Snapshot {
    fn entry(&self, id: TypeId) -> Option<&TypeEntry> {
        self.types.get(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFacts {
    pub path: String,
    #[serde(default)]
    pub declarations: Vec<DeclFacts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DeclFacts {
    Interface {
        name: String,
        #[serde(rename = "type")]
        ty: TypeId,
        #[serde(default)]
        heritages: Vec<TypeId>,
        #[serde(default)]
        type_params: u32,
        #[serde(default)]
        tags: Tags,
    },
    Type {
        name: String,
        #[serde(rename = "type")]
        ty: TypeId,
        #[serde(default)]
        type_params: u32,
        #[serde(default)]
        tags: Tags,
    },
    Enum {
        name: String,
        #[serde(default)]
        members: Vec<EnumMemberFacts>,
        #[serde(default)]
        tags: Tags,
    },
    Import {
        from: String,
        #[serde(default)]
        bindings: Vec<BindingFacts>,
    },
    Export {
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        bindings: Vec<BindingFacts>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMemberFacts {
    pub name: String,
    /// Constant text as formatted by the checker. Absent when the value was
    /// not representable; that degrades to the text `undefined`, silently.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingFacts {
    pub name: String,
    /// Original name when the binding renames (`import { A as B }`).
    #[serde(default)]
    pub bound: Option<String>,
}

// ------------------------------ Loading ----------------------------------- //

/// Deserialize with JSON-path context in error messages, so a malformed
/// snapshot or config names the offending element instead of a byte offset.
pub fn json_with_path<T: DeserializeOwned>(src: &str) -> anyhow::Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow::anyhow!("at JSON path {path} -> {}", err.into_inner())
    })
}

pub fn load(path: &Path) -> anyhow::Result<Snapshot> {
    let src = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("failed to read snapshot {}: {err}", path.display()))?;
    json_with_path(&src)
        .map_err(|err| anyhow::anyhow!("invalid snapshot {}: {err}", path.display()))
}

// --------------------------- Module specifiers ----------------------------- //

/// Only file-relative specifiers are followed when resolving imports and
/// exports; package/absolute specifiers belong to some other resolver.
pub fn is_relative_specifier(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../")
}

/// Store key for a source path: extension stripped, `.`/`..` segments
/// folded, so `./b` inside `src/a.ts` and `src/b.ts` agree on `src/b`.
pub fn module_key(path: &str) -> String {
    let trimmed = path
        .strip_suffix(".d.ts")
        .or_else(|| path.strip_suffix(".tsx"))
        .or_else(|| path.strip_suffix(".ts"))
        .unwrap_or(path);

    let mut segments: Vec<&str> = Vec::new();
    for seg in trimmed.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&"..")) || segments.is_empty() {
                    segments.push("..");
                } else {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Resolve a relative specifier against the path of the importing file.
pub fn resolve_specifier(importing_file: &str, spec: &str) -> String {
    let dir = match importing_file.rfind('/') {
        Some(idx) => &importing_file[..idx],
        None => "",
    };
    if dir.is_empty() {
        module_key(spec)
    } else {
        module_key(&format!("{dir}/{spec}"))
    }
}
