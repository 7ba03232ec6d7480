//! Per-file declaration tables and the cross-file usage tracker.
//!
//! Every declaration is recorded whether or not it will render; only names
//! in `referenced` reach the output. Two-phase lifecycle: `write_*` during
//! compilation, then `finalize` once per file after the whole graph has
//! been visited. `finalize` routes references that pointed at files visited
//! later, so import order never matters; afterwards the referenced sets are
//! a fixed point.
//!
//! Cross-file links are path + name through the store map, never object
//! references. Recursion in `use_name` is bounded because a name is marked
//! before its expansion and marked names never expand twice.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::ir::{Member, SchemaKind, SchemaType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("`{name}` (referenced from {file}) does not resolve to any declaration")]
    UnresolvedReference { file: String, name: String },
}

// ----------------------------- Declarations -------------------------------- //

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub heritages: Vec<SchemaType>,
    pub members: Vec<Member>,
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub name: String,
    pub ty: SchemaType,
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    /// Checker-formatted constant text; `undefined` when unrepresentable.
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub bound: Option<String>,
}

impl Binding {
    fn origin_name(&self) -> &str {
        self.bound.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// Resolved store key of the origin file.
    pub file: String,
    /// Original specifier text, used verbatim (suffixed) in output.
    pub spec: String,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone)]
pub struct ExportDecl {
    pub file: Option<String>,
    pub spec: Option<String>,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Interface,
    Alias,
    Enum,
}

// ------------------------------ File schema -------------------------------- //

#[derive(Debug, Default)]
pub struct FileSchema {
    pub source_path: String,
    pub interfaces: IndexMap<String, InterfaceDecl>,
    pub aliases: IndexMap<String, TypeAliasDecl>,
    pub enums: IndexMap<String, EnumDecl>,
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
    pub referenced: BTreeSet<String>,
    pub finalized: bool,
}

impl FileSchema {
    pub fn is_local(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
            || self.aliases.contains_key(name)
            || self.enums.contains_key(name)
    }

    pub fn local_kind(&self, name: &str) -> Option<DeclKind> {
        if self.interfaces.contains_key(name) {
            Some(DeclKind::Interface)
        } else if self.aliases.contains_key(name) {
            Some(DeclKind::Alias)
        } else if self.enums.contains_key(name) {
            Some(DeclKind::Enum)
        } else {
            None
        }
    }

    /// One binding hop through the import / re-export tables.
    fn binding_target(&self, name: &str) -> Option<(String, String)> {
        for imp in &self.imports {
            if let Some(b) = imp.bindings.iter().find(|b| b.name == name) {
                return Some((imp.file.clone(), b.origin_name().to_string()));
            }
        }
        for exp in &self.exports {
            let Some(origin) = &exp.file else { continue };
            if let Some(b) = exp.bindings.iter().find(|b| b.name == name) {
                return Some((origin.clone(), b.origin_name().to_string()));
            }
        }
        None
    }
}

// -------------------------------- Store ------------------------------------ //

#[derive(Debug, Default)]
pub struct SchemaStore {
    files: IndexMap<String, FileSchema>,
}

enum Expansion {
    Local(Vec<String>),
    NonLocal { finalized: bool },
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_mut(&mut self, key: &str) -> &mut FileSchema {
        self.files.entry(key.to_string()).or_default()
    }

    pub fn file(&self, key: &str) -> Option<&FileSchema> {
        self.files.get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileSchema)> {
        self.files.iter()
    }

    // -- phase one: recording ------------------------------------------------

    pub fn write_interface(
        &mut self,
        key: &str,
        decl: InterfaceDecl,
        render_now: bool,
    ) -> Result<(), StoreError> {
        let name = decl.name.clone();
        self.file_mut(key).interfaces.insert(name.clone(), decl);
        if render_now { self.use_name(key, &name) } else { Ok(()) }
    }

    pub fn write_alias(
        &mut self,
        key: &str,
        decl: TypeAliasDecl,
        render_now: bool,
    ) -> Result<(), StoreError> {
        let name = decl.name.clone();
        self.file_mut(key).aliases.insert(name.clone(), decl);
        if render_now { self.use_name(key, &name) } else { Ok(()) }
    }

    pub fn write_enum(
        &mut self,
        key: &str,
        decl: EnumDecl,
        render_now: bool,
    ) -> Result<(), StoreError> {
        let name = decl.name.clone();
        self.file_mut(key).enums.insert(name.clone(), decl);
        if render_now { self.use_name(key, &name) } else { Ok(()) }
    }

    pub fn write_import(&mut self, key: &str, decl: ImportDecl) {
        self.file_mut(key).imports.push(decl);
    }

    pub fn write_export(&mut self, key: &str, decl: ExportDecl) {
        self.file_mut(key).exports.push(decl);
    }

    // -- reachability --------------------------------------------------------

    /// Mark `name` reachable in `key` and expand what it drags in.
    ///
    /// Expansion descends into nested structure but stops at references,
    /// which recurse through `use_name` by name instead; a name that is not
    /// local defers until `finalize` unless the file already finalized.
    pub fn use_name(&mut self, key: &str, name: &str) -> Result<(), StoreError> {
        let Some(file) = self.files.get_mut(key) else {
            return Err(StoreError::UnresolvedReference {
                file: key.to_string(),
                name: name.to_string(),
            });
        };
        if !file.referenced.insert(name.to_string()) {
            return Ok(());
        }

        let expansion = if let Some(decl) = file.interfaces.get(name) {
            let mut refs = Vec::new();
            for heritage in &decl.heritages {
                collect_refs(heritage, &mut refs);
            }
            for member in &decl.members {
                collect_refs(&member.ty, &mut refs);
            }
            Expansion::Local(refs)
        } else if let Some(decl) = file.aliases.get(name) {
            let mut refs = Vec::new();
            collect_refs(&decl.ty, &mut refs);
            Expansion::Local(refs)
        } else if file.enums.contains_key(name) {
            Expansion::Local(Vec::new()) // enums are terminal
        } else {
            Expansion::NonLocal { finalized: file.finalized }
        };

        match expansion {
            Expansion::Local(refs) => {
                for r in refs {
                    self.use_name(key, &r)?;
                }
                Ok(())
            }
            Expansion::NonLocal { finalized: true } => self.resolve_nonlocal(key, name),
            Expansion::NonLocal { finalized: false } => Ok(()), // deferred
        }
    }

    /// Cross into the origin file through the import / re-export tables.
    fn resolve_nonlocal(&mut self, key: &str, name: &str) -> Result<(), StoreError> {
        let target = self.files.get(key).and_then(|f| f.binding_target(name));
        match target {
            Some((origin, bound)) => self.use_name(&origin, &bound),
            None => Err(StoreError::UnresolvedReference {
                file: key.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Close out one file after the whole graph has been visited: resolve
    /// every referenced name that is not local, which triggers `use_name`
    /// on files visited later than this one. A name that resolves nowhere
    /// is a broken reference request and fatal.
    pub fn finalize(&mut self, key: &str) -> Result<(), StoreError> {
        let Some(file) = self.files.get_mut(key) else {
            return Ok(());
        };
        file.finalized = true;
        let deferred: Vec<String> = file
            .referenced
            .iter()
            .filter(|n| !file.is_local(n))
            .cloned()
            .collect();
        for name in deferred {
            self.resolve_nonlocal(key, &name)?;
        }
        Ok(())
    }

    // -- projections ---------------------------------------------------------

    /// Import declarations filtered down to reachable bindings: the final
    /// tree-shaking step before rendering.
    pub fn used_imports(&self, key: &str) -> Vec<ImportDecl> {
        let Some(file) = self.files.get(key) else {
            return Vec::new();
        };
        file.imports
            .iter()
            .filter_map(|imp| {
                let bindings: Vec<Binding> = imp
                    .bindings
                    .iter()
                    .filter(|b| file.referenced.contains(&b.name))
                    .cloned()
                    .collect();
                (!bindings.is_empty()).then(|| ImportDecl {
                    file: imp.file.clone(),
                    spec: imp.spec.clone(),
                    bindings,
                })
            })
            .collect()
    }

    pub fn used_exports(&self, key: &str) -> Vec<ExportDecl> {
        let Some(file) = self.files.get(key) else {
            return Vec::new();
        };
        file.exports
            .iter()
            .filter_map(|exp| {
                let bindings: Vec<Binding> = exp
                    .bindings
                    .iter()
                    .filter(|b| file.referenced.contains(&b.name))
                    .cloned()
                    .collect();
                (!bindings.is_empty()).then(|| ExportDecl {
                    file: exp.file.clone(),
                    spec: exp.spec.clone(),
                    bindings,
                })
            })
            .collect()
    }

    /// What kind of declaration does `name` in `key` ultimately refer to?
    /// Follows binding chains with a visited set; renderers use this to
    /// decide how to import a binding (enums also need their value map).
    pub fn lookup_kind(&self, key: &str, name: &str) -> Option<DeclKind> {
        let mut seen = BTreeSet::new();
        let mut cursor = (key.to_string(), name.to_string());
        loop {
            if !seen.insert(cursor.clone()) {
                return None;
            }
            let file = self.files.get(&cursor.0)?;
            if let Some(kind) = file.local_kind(&cursor.1) {
                return Some(kind);
            }
            cursor = file.binding_target(&cursor.1)?;
        }
    }
}

/// Collect the reference names a schema tree depends on. Descends through
/// arrays, tuples, objects, unions and intersections; stops at references.
pub fn collect_refs(ty: &SchemaType, out: &mut Vec<String>) {
    match &ty.kind {
        SchemaKind::TypeReference { name } => out.push(name.clone()),
        SchemaKind::TypeAccess { name, .. } => out.push(name.clone()),
        SchemaKind::Object { members: Some(members) } => {
            for m in members {
                collect_refs(&m.ty, out);
            }
        }
        SchemaKind::Array { of, .. } => collect_refs(of, out),
        SchemaKind::Tuple { of, rest, .. } => {
            for t in of {
                collect_refs(t, out);
            }
            if let Some(rest) = rest {
                collect_refs(rest, out);
            }
        }
        SchemaKind::Union { of } | SchemaKind::Intersection { of } => {
            for t in of {
                collect_refs(t, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{SchemaKind, SchemaType};

    fn reference(name: &str) -> SchemaType {
        SchemaType::new(SchemaKind::TypeReference { name: name.to_string() })
    }

    fn member(name: &str, ty: SchemaType) -> Member {
        Member { name: name.to_string(), ty, indexer: None }
    }

    fn interface(name: &str, heritages: Vec<SchemaType>, members: Vec<Member>) -> InterfaceDecl {
        InterfaceDecl { name: name.to_string(), heritages, members, forced: false }
    }

    #[test]
    fn use_expands_heritages_members_and_alias_targets() {
        let mut store = SchemaStore::new();
        store
            .write_interface(
                "a",
                interface("A", vec![reference("Base")], vec![member("b", reference("B"))]),
                false,
            )
            .unwrap();
        store.write_interface("a", interface("Base", vec![], vec![]), false).unwrap();
        store
            .write_alias(
                "a",
                TypeAliasDecl {
                    name: "B".to_string(),
                    ty: SchemaType::new(SchemaKind::Array {
                        of: Box::new(reference("C")),
                        min_length: None,
                        max_length: None,
                    }),
                    forced: false,
                },
                false,
            )
            .unwrap();
        store
            .write_enum(
                "a",
                EnumDecl { name: "C".to_string(), members: vec![], forced: false },
                false,
            )
            .unwrap();
        store
            .write_interface("a", interface("Unrelated", vec![], vec![]), false)
            .unwrap();

        store.use_name("a", "A").unwrap();
        let file = store.file("a").unwrap();
        for name in ["A", "Base", "B", "C"] {
            assert!(file.referenced.contains(name), "missing {name}");
        }
        assert!(!file.referenced.contains("Unrelated"));
    }

    #[test]
    fn cyclic_declarations_mark_in_one_pass() {
        let mut store = SchemaStore::new();
        store
            .write_interface("a", interface("A", vec![], vec![member("b", reference("B"))]), false)
            .unwrap();
        store
            .write_interface("a", interface("B", vec![], vec![member("a", reference("A"))]), false)
            .unwrap();
        store.use_name("a", "A").unwrap();
        let file = store.file("a").unwrap();
        assert!(file.referenced.contains("A"));
        assert!(file.referenced.contains("B"));
    }

    #[test]
    fn cross_file_mutual_recursion_resolves_through_finalize() {
        let mut store = SchemaStore::new();
        // file `a` is visited first and forced; `b` arrives later
        store.write_import(
            "a",
            ImportDecl {
                file: "b".to_string(),
                spec: "./b".to_string(),
                bindings: vec![Binding { name: "B".to_string(), bound: None }],
            },
        );
        store
            .write_interface("a", interface("A", vec![], vec![member("b", reference("B"))]), true)
            .unwrap();

        store.write_import(
            "b",
            ImportDecl {
                file: "a".to_string(),
                spec: "./a".to_string(),
                bindings: vec![Binding { name: "A".to_string(), bound: None }],
            },
        );
        store
            .write_interface("b", interface("B", vec![], vec![member("a", reference("A"))]), false)
            .unwrap();

        store.finalize("a").unwrap();
        store.finalize("b").unwrap();

        assert!(store.file("a").unwrap().referenced.contains("A"));
        assert!(store.file("a").unwrap().referenced.contains("B"));
        assert!(store.file("b").unwrap().referenced.contains("B"));
        assert!(store.file("b").unwrap().referenced.contains("A"));
    }

    #[test]
    fn renamed_import_crosses_to_original_name() {
        let mut store = SchemaStore::new();
        store.write_import(
            "a",
            ImportDecl {
                file: "b".to_string(),
                spec: "./b".to_string(),
                bindings: vec![Binding { name: "Local".to_string(), bound: Some("Origin".to_string()) }],
            },
        );
        store
            .write_interface(
                "a",
                interface("A", vec![], vec![member("x", reference("Local"))]),
                true,
            )
            .unwrap();
        store
            .write_interface("b", interface("Origin", vec![], vec![]), false)
            .unwrap();
        store.finalize("a").unwrap();
        store.finalize("b").unwrap();
        assert!(store.file("b").unwrap().referenced.contains("Origin"));
    }

    #[test]
    fn reexport_table_routes_usage() {
        let mut store = SchemaStore::new();
        // `a` imports from barrel `idx`, which re-exports from `b`
        store.write_import(
            "a",
            ImportDecl {
                file: "idx".to_string(),
                spec: "./idx".to_string(),
                bindings: vec![Binding { name: "B".to_string(), bound: None }],
            },
        );
        store
            .write_interface("a", interface("A", vec![], vec![member("b", reference("B"))]), true)
            .unwrap();
        store.write_export(
            "idx",
            ExportDecl {
                file: Some("b".to_string()),
                spec: Some("./b".to_string()),
                bindings: vec![Binding { name: "B".to_string(), bound: None }],
            },
        );
        store
            .write_interface("b", interface("B", vec![], vec![]), false)
            .unwrap();
        store.finalize("a").unwrap();
        store.finalize("idx").unwrap();
        store.finalize("b").unwrap();
        assert!(store.file("b").unwrap().referenced.contains("B"));
        // the barrel marked the binding reachable on the way through
        assert!(store.file("idx").unwrap().referenced.contains("B"));
    }

    #[test]
    fn unresolved_reference_is_fatal_at_finalize() {
        let mut store = SchemaStore::new();
        store
            .write_interface(
                "a",
                interface("A", vec![], vec![member("g", reference("Ghost"))]),
                true,
            )
            .unwrap();
        let err = store.finalize("a").unwrap_err();
        assert!(matches!(err, StoreError::UnresolvedReference { name, .. } if name == "Ghost"));
    }

    #[test]
    fn post_finalize_use_resolves_immediately() {
        let mut store = SchemaStore::new();
        store.write_import(
            "a",
            ImportDecl {
                file: "b".to_string(),
                spec: "./b".to_string(),
                bindings: vec![Binding { name: "B".to_string(), bound: None }],
            },
        );
        store.write_interface("a", interface("A", vec![], vec![]), false).unwrap();
        store.write_interface("b", interface("B", vec![], vec![]), false).unwrap();
        store.finalize("a").unwrap();
        store.finalize("b").unwrap();
        // lands on a finalized file: routed through cross-file resolution now
        store.use_name("a", "B").unwrap();
        assert!(store.file("b").unwrap().referenced.contains("B"));
    }

    #[test]
    fn used_imports_project_only_reachable_bindings() {
        let mut store = SchemaStore::new();
        store.write_import(
            "a",
            ImportDecl {
                file: "b".to_string(),
                spec: "./b".to_string(),
                bindings: vec![
                    Binding { name: "Used".to_string(), bound: None },
                    Binding { name: "Unused".to_string(), bound: None },
                ],
            },
        );
        store
            .write_interface(
                "a",
                interface("A", vec![], vec![member("u", reference("Used"))]),
                true,
            )
            .unwrap();
        store.write_interface("b", interface("Used", vec![], vec![]), false).unwrap();
        store.write_interface("b", interface("Unused", vec![], vec![]), false).unwrap();
        store.finalize("a").unwrap();
        store.finalize("b").unwrap();

        let imports = store.used_imports("a");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].bindings.len(), 1);
        assert_eq!(imports[0].bindings[0].name, "Used");
    }

    #[test]
    fn lookup_kind_follows_binding_chains() {
        let mut store = SchemaStore::new();
        store.write_import(
            "a",
            ImportDecl {
                file: "idx".to_string(),
                spec: "./idx".to_string(),
                bindings: vec![Binding { name: "Color".to_string(), bound: None }],
            },
        );
        store.write_export(
            "idx",
            ExportDecl {
                file: Some("b".to_string()),
                spec: Some("./b".to_string()),
                bindings: vec![Binding { name: "Color".to_string(), bound: None }],
            },
        );
        store
            .write_enum(
                "b",
                EnumDecl { name: "Color".to_string(), members: vec![], forced: false },
                false,
            )
            .unwrap();
        assert_eq!(store.lookup_kind("a", "Color"), Some(DeclKind::Enum));
        assert_eq!(store.lookup_kind("a", "Nope"), None);
    }
}
