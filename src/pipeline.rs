//! Two-phase batch pipeline.
//!
//! Phase one visits every file of every snapshot, compiling declarations
//! into the store; phase two finalizes every file (cross-file usage
//! propagation) and renders. Rendering must not start before every file is
//! recorded, or reachability would miss late arrivals. The only parallel
//! step is the terminal write of rendered text, which has no ordering
//! dependency between files.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use rayon::prelude::*;

use crate::compile::{CompileError, Compiler, Scope};
use crate::config::CompilerConfig;
use crate::diag::Diagnostics;
use crate::ir::SchemaKind;
use crate::render::{self, Dialect, RenderFailure, RenderOptions};
use crate::snapshot::{
    BindingFacts, DeclFacts, FileFacts, Snapshot, is_relative_specifier, module_key,
    resolve_specifier,
};
use crate::store::{
    Binding, EnumDecl, EnumMember, ExportDecl, ImportDecl, InterfaceDecl, SchemaStore,
    TypeAliasDecl,
};

const TAG_SCHEMA: &str = "schema";
const TAG_NOSCHEMA: &str = "noschema";

// ------------------------------ Phase one ---------------------------------- //

pub fn build_store(
    snapshots: &[Snapshot],
    config: &CompilerConfig,
    diags: &Diagnostics,
) -> anyhow::Result<SchemaStore> {
    let mut store = SchemaStore::new();
    for snapshot in snapshots {
        for file in &snapshot.files {
            visit_file(&mut store, snapshot, file, config, diags)?;
        }
    }
    // phase boundary: every table is populated, reachability can close
    for key in store.keys() {
        store.finalize(&key)?;
    }
    Ok(store)
}

fn visit_file(
    store: &mut SchemaStore,
    snapshot: &Snapshot,
    file: &FileFacts,
    config: &CompilerConfig,
    diags: &Diagnostics,
) -> anyhow::Result<()> {
    let key = module_key(&file.path);
    store.file_mut(&key).source_path = file.path.clone();
    let compiler = Compiler::new(snapshot, config, diags);

    for decl in &file.declarations {
        match decl {
            DeclFacts::Interface { name, ty, heritages, type_params, tags } => {
                if tags.has(TAG_NOSCHEMA) {
                    continue;
                }
                let forced = tags.has(TAG_SCHEMA);
                let compiled = (|| {
                    if *type_params > 0 {
                        return Err(CompileError::Generic(name.clone()));
                    }
                    let scope = Scope::declaration(name);
                    let members = match compiler.compile(*ty, scope)?.kind {
                        SchemaKind::Object { members: Some(members) } => members,
                        SchemaKind::Object { members: None } => Vec::new(),
                        _ => return Err(CompileError::InterfaceShape(name.clone())),
                    };
                    let heritages = heritages
                        .iter()
                        .map(|&h| compiler.compile(h, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(InterfaceDecl { name: name.clone(), heritages, members, forced })
                })();
                match compiled {
                    Ok(decl) => store.write_interface(&key, decl, forced)?,
                    Err(err) => skip_or_abort(name, &file.path, forced, err, diags)?,
                }
            }
            DeclFacts::Type { name, ty, type_params, tags } => {
                if tags.has(TAG_NOSCHEMA) {
                    continue;
                }
                let forced = tags.has(TAG_SCHEMA);
                let compiled = (|| {
                    if *type_params > 0 {
                        return Err(CompileError::Generic(name.clone()));
                    }
                    let scope = Scope::declaration_with_tags(name, tags);
                    let ty = compiler.compile(*ty, scope)?;
                    Ok(TypeAliasDecl { name: name.clone(), ty, forced })
                })();
                match compiled {
                    Ok(decl) => store.write_alias(&key, decl, forced)?,
                    Err(err) => skip_or_abort(name, &file.path, forced, err, diags)?,
                }
            }
            DeclFacts::Enum { name, members, tags } => {
                if tags.has(TAG_NOSCHEMA) {
                    continue;
                }
                let forced = tags.has(TAG_SCHEMA);
                let members = members
                    .iter()
                    .map(|m| EnumMember {
                        name: m.name.clone(),
                        // unrepresentable constants degrade silently
                        value: m.value.clone().unwrap_or_else(|| "undefined".to_string()),
                    })
                    .collect();
                store.write_enum(&key, EnumDecl { name: name.clone(), members, forced }, forced)?;
            }
            DeclFacts::Import { from, bindings } => {
                if !is_relative_specifier(from) {
                    continue; // package imports belong to some other resolver
                }
                store.write_import(
                    &key,
                    ImportDecl {
                        file: resolve_specifier(&file.path, from),
                        spec: from.clone(),
                        bindings: convert_bindings(bindings),
                    },
                );
            }
            DeclFacts::Export { from, bindings } => {
                let (origin, spec) = match from {
                    Some(from) if is_relative_specifier(from) => {
                        (Some(resolve_specifier(&file.path, from)), Some(from.clone()))
                    }
                    Some(_) => continue,
                    None => (None, None),
                };
                store.write_export(
                    &key,
                    ExportDecl { file: origin, spec, bindings: convert_bindings(bindings) },
                );
            }
        }
    }
    Ok(())
}

fn convert_bindings(bindings: &[BindingFacts]) -> Vec<Binding> {
    bindings
        .iter()
        .map(|b| Binding { name: b.name.clone(), bound: b.bound.clone() })
        .collect()
}

fn skip_or_abort(
    name: &str,
    path: &str,
    forced: bool,
    err: CompileError,
    diags: &Diagnostics,
) -> anyhow::Result<()> {
    if forced {
        Err(anyhow!("forced declaration `{name}` in {path} failed to compile: {err}"))
    } else {
        diags.warn(format!("skipping `{name}` in {path}: {err}"));
        Ok(())
    }
}

// ------------------------------ Phase two ---------------------------------- //

pub fn render_all(
    store: &SchemaStore,
    dialect: Dialect,
    opts: &RenderOptions,
    out_dir: Option<&Path>,
    diags: &Diagnostics,
) -> Result<Vec<(PathBuf, String)>, RenderFailure> {
    let mut outputs = Vec::new();
    for (key, file) in store.iter() {
        if let Some(text) = render::render_file(dialect, key, store, opts, diags)? {
            outputs.push((output_path(&file.source_path, &opts.file_suffix, out_dir), text));
        }
    }
    Ok(outputs)
}

/// Output path: suffix inserted before the extension (appended, with `.ts`,
/// when the source had none), optionally rerooted under `out_dir`.
pub fn output_path(source_path: &str, suffix: &str, out_dir: Option<&Path>) -> PathBuf {
    let mut named = None;
    for ext in [".d.ts", ".tsx", ".ts"] {
        if let Some(stem) = source_path.strip_suffix(ext) {
            named = Some(format!("{stem}{suffix}{ext}"));
            break;
        }
    }
    let named = named.unwrap_or_else(|| format!("{source_path}{suffix}.ts"));
    match out_dir {
        Some(dir) => dir.join(named.trim_start_matches('/')),
        None => PathBuf::from(named),
    }
}

/// The one concurrent step: no ordering dependency between files.
pub fn write_outputs(outputs: &[(PathBuf, String)]) -> anyhow::Result<()> {
    outputs.par_iter().try_for_each(|(path, text)| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| anyhow!("failed to create {}: {err}", parent.display()))?;
        }
        std::fs::write(path, text)
            .map_err(|err| anyhow!("failed to write {}: {err}", path.display()))
    })
}
