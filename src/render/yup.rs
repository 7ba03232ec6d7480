//! The yup renderer.
//!
//! Presence is ambient: the caller decides whether a position demands
//! `.required()` and threads that down; nothing is required by default.
//! This mirrors how yup composes optionality, and it is why the rule
//! methods here take a `required` flag where the Joi renderer reads the
//! node. Tuples, index signatures and intersections have no yup form and
//! abort the enclosing declaration.

use crate::diag::Diagnostics;
use crate::ir::{Member, SchemaKind, SchemaType};
use crate::render::{
    RenderError, RenderFailure, RenderOptions, bindings_header, interface_order, js_escape, js_key,
    literal_js, number_js, pad, reference_name, regex_literal,
};
use crate::store::{EnumDecl, FileSchema, InterfaceDecl, SchemaStore, TypeAliasDecl};

const DIALECT: &str = "yup";

pub(super) fn render(
    key: &str,
    file: &FileSchema,
    store: &SchemaStore,
    opts: &RenderOptions,
    diags: &Diagnostics,
) -> Result<Option<String>, RenderFailure> {
    Renderer { file, opts, diags, indent: 0 }.render(key, store)
}

struct Renderer<'a> {
    file: &'a FileSchema,
    opts: &'a RenderOptions,
    diags: &'a Diagnostics,
    indent: usize,
}

impl<'a> Renderer<'a> {
    fn render(mut self, key: &str, store: &SchemaStore) -> Result<Option<String>, RenderFailure> {
        let header = bindings_header(key, store, self.opts);
        let mut decls: Vec<String> = Vec::new();

        for (name, decl) in &self.file.enums {
            if self.file.referenced.contains(name) {
                decls.push(self.emit_enum(decl));
            }
        }
        for name in interface_order(self.file) {
            let decl = &self.file.interfaces[&name];
            self.emit_declaration(&name, decl.forced, &mut decls, |r| r.emit_interface(decl))?;
        }
        for (name, decl) in &self.file.aliases {
            if self.file.referenced.contains(name) {
                self.emit_declaration(name, decl.forced, &mut decls, |r| r.emit_alias(decl))?;
            }
        }

        if decls.is_empty() && header.is_empty() {
            return Ok(None);
        }

        let mut out = String::from("import * as yup from 'yup';\n");
        if !header.is_empty() {
            out.push('\n');
            for line in &header {
                out.push_str(line);
                out.push('\n');
            }
        }
        for decl in &decls {
            out.push('\n');
            out.push_str(decl);
        }
        Ok(Some(out))
    }

    fn emit_declaration(
        &mut self,
        name: &str,
        forced: bool,
        decls: &mut Vec<String>,
        emit: impl FnOnce(&mut Self) -> Result<String, RenderError>,
    ) -> Result<(), RenderFailure> {
        match emit(self) {
            Ok(text) => {
                decls.push(text);
                Ok(())
            }
            Err(source) if forced => Err(RenderFailure::Forced { decl: name.to_string(), source }),
            Err(source) => {
                self.diags.warn(format!("skipping `{name}`: {source}"));
                Ok(())
            }
        }
    }

    // ---------------------------- Declarations ----------------------------- //

    fn emit_enum(&mut self, decl: &EnumDecl) -> String {
        let mut out = format!("export const {} = {{\n", decl.name);
        for member in &decl.members {
            out.push_str(&format!("{}{}: {},\n", pad(1), js_key(&member.name), member.value));
        }
        out.push_str("};\n");
        out.push_str(&format!(
            "export const {} = yup.mixed().oneOf(Object.values({}));\n",
            self.opts.generated_name(&decl.name),
            decl.name,
        ));
        out
    }

    fn emit_interface(&mut self, decl: &InterfaceDecl) -> Result<String, RenderError> {
        let shape = self.object_shape(&decl.members)?;
        let rule = match decl.heritages.split_first() {
            None => shape,
            Some((first, rest)) => {
                let mut chain = self.heritage_rule(first)?;
                for heritage in rest {
                    chain.push_str(&format!(".concat({})", self.heritage_rule(heritage)?));
                }
                format!("{chain}.concat({shape})")
            }
        };
        Ok(format!(
            "export const {} = {rule};\n",
            self.opts.generated_name(&decl.name),
        ))
    }

    fn emit_alias(&mut self, decl: &TypeAliasDecl) -> Result<String, RenderError> {
        // top level defaults to absent; consumers opt in per position
        let rule = self.rule(&decl.ty, false)?;
        Ok(format!(
            "export const {} = {rule};\n",
            self.opts.generated_name(&decl.name),
        ))
    }

    fn heritage_rule(&mut self, heritage: &SchemaType) -> Result<String, RenderError> {
        match reference_name(heritage) {
            Some(name) => Ok(self.opts.generated_name(name)),
            None => self.rule_kind(&heritage.kind),
        }
    }

    // ------------------------------- Rules --------------------------------- //

    /// `required` is the ambient demand from the enclosing position, not a
    /// property of the node itself.
    fn rule(&mut self, ty: &SchemaType, required: bool) -> Result<String, RenderError> {
        let base = self.rule_kind(&ty.kind)?;
        Ok(if required { format!("{base}.required()") } else { base })
    }

    fn rule_kind(&mut self, kind: &SchemaKind) -> Result<String, RenderError> {
        Ok(match kind {
            SchemaKind::Any | SchemaKind::Unknown => "yup.mixed()".to_string(),
            SchemaKind::Boolean => "yup.boolean()".to_string(),
            SchemaKind::BigInt => test_guard("bigint", "expected a bigint", "typeof value === 'bigint'"),
            SchemaKind::Symbol => test_guard("symbol", "expected a symbol", "typeof value === 'symbol'"),
            SchemaKind::Void | SchemaKind::Undefined => {
                test_guard("undefined", "expected undefined", "value === undefined")
            }
            SchemaKind::Null => "yup.mixed().oneOf([null])".to_string(),
            SchemaKind::Never => test_guard("never", "no value is allowed", "false"),
            SchemaKind::Func => {
                test_guard("function", "expected a function", "typeof value === 'function'")
            }
            SchemaKind::Date => "yup.date()".to_string(),
            SchemaKind::Buffer => test_guard("buffer", "expected a Buffer", "Buffer.isBuffer(value)"),
            SchemaKind::String { regex } => {
                let mut out = String::from("yup.string()");
                if let Some(spec) = regex {
                    match &spec.name {
                        Some(name) => out.push_str(&format!(
                            ".matches({}, '{}')",
                            regex_literal(&spec.pattern),
                            js_escape(name),
                        )),
                        None => out.push_str(&format!(".matches({})", regex_literal(&spec.pattern))),
                    }
                }
                out
            }
            SchemaKind::Number { integer, min, max } => {
                let mut out = String::from("yup.number()");
                if *integer {
                    out.push_str(".integer()");
                }
                if let Some(min) = min {
                    out.push_str(&format!(".min({})", number_js(*min)));
                }
                if let Some(max) = max {
                    out.push_str(&format!(".max({})", number_js(*max)));
                }
                out
            }
            SchemaKind::Object { members: None } => "yup.object()".to_string(),
            SchemaKind::Object { members: Some(members) } => self.object_shape(members)?,
            SchemaKind::TypeReference { name } => {
                format!("yup.lazy(() => {})", self.opts.generated_name(name))
            }
            SchemaKind::TypeAccess { name, access } => {
                format!("yup.lazy(() => yup.mixed().oneOf([{name}.{access}]))")
            }
            SchemaKind::Array { of, min_length, max_length } => {
                let mut out = format!("yup.array().of({})", self.rule(of, false)?);
                if let Some(min) = min_length {
                    out.push_str(&format!(".min({min})"));
                }
                if let Some(max) = max_length {
                    out.push_str(&format!(".max({max})"));
                }
                out
            }
            SchemaKind::Tuple { .. } => {
                return Err(RenderError::Unsupported { dialect: DIALECT, construct: "tuples" });
            }
            SchemaKind::Union { of } => {
                let options = of
                    .iter()
                    .map(|t| self.rule(t, false))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                format!(
                    "yup.mixed().test('union', 'no alternative matched', (value) => [{options}].some((option) => option.isValidSync(value)))"
                )
            }
            SchemaKind::Intersection { .. } => {
                return Err(RenderError::Unsupported {
                    dialect: DIALECT,
                    construct: "intersections",
                });
            }
            SchemaKind::Literal { value } => {
                format!("yup.mixed().oneOf([{}])", literal_js(value))
            }
        })
    }

    fn object_shape(&mut self, members: &[Member]) -> Result<String, RenderError> {
        if members.iter().any(|m| m.indexer.is_some()) {
            return Err(RenderError::Unsupported {
                dialect: DIALECT,
                construct: "index signatures",
            });
        }
        if members.is_empty() {
            return Ok("yup.object().shape({})".to_string());
        }
        let body = self.with_indent(self.indent + 1, |r| {
            let mut body = String::new();
            for member in members {
                // the one place that demands presence
                let rule = r.rule(&member.ty, member.ty.is_present())?;
                body.push_str(&format!("{}{}: {rule},\n", pad(r.indent), js_key(&member.name)));
            }
            Ok(body)
        })?;
        Ok(format!("yup.object().shape({{\n{body}{}}})", pad(self.indent)))
    }

    /// Run `body` at a deeper nesting level, restoring the counter even
    /// when the body fails (a skipped declaration must not skew the next).
    fn with_indent<T>(
        &mut self,
        indent: usize,
        body: impl FnOnce(&mut Self) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        let saved = self.indent;
        self.indent = indent;
        let result = body(self);
        self.indent = saved;
        result
    }
}

fn test_guard(name: &str, message: &str, predicate: &str) -> String {
    format!("yup.mixed().test('{name}', '{message}', (value) => {predicate})")
}
