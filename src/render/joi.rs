//! The Joi renderer.
//!
//! Presence is per-node: every rule carries `.required()` unless its own
//! flag says optional (Joi composes presence on any schema). References go
//! through `Joi.lazy` so declaration order and cycles never matter.
//! Intersections concat natively; an intersection with union members needs
//! a synthesized short-circuit block instead (Joi has no declarative form
//! for it).

use crate::diag::Diagnostics;
use crate::ir::{Indexer, Member, SchemaKind, SchemaType};
use crate::render::{
    self, RenderError, RenderFailure, RenderOptions, bindings_header, interface_order, js_key,
    literal_js, number_js, pad, reference_name, regex_literal,
};
use crate::store::{EnumDecl, FileSchema, InterfaceDecl, SchemaStore, TypeAliasDecl};

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

        let mut out = String::from("import * as Joi from 'joi';\n");
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

    /// Declaration-level failure policy: skip with a warning, fatal when
    /// the declaration was forced.
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
                self.diags
                    .warn(format!("skipping `{name}`: {source}"));
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
            "export const {} = Joi.valid(...Object.values({}));\n",
            self.opts.generated_name(&decl.name),
            decl.name,
        ));
        out
    }

    fn emit_interface(&mut self, decl: &InterfaceDecl) -> Result<String, RenderError> {
        let mut rule = self.object_rule(&decl.members)?;
        for heritage in &decl.heritages {
            rule.push_str(&format!(".concat({})", self.heritage_rule(heritage)?));
        }
        Ok(format!(
            "export const {} = {rule};\n",
            self.opts.generated_name(&decl.name),
        ))
    }

    fn emit_alias(&mut self, decl: &TypeAliasDecl) -> Result<String, RenderError> {
        Ok(format!(
            "export const {} = {};\n",
            self.opts.generated_name(&decl.name),
            self.rule(&decl.ty)?,
        ))
    }

    /// Heritage bases concat by generated name; the ordering nudge makes
    /// same-file bases legal and imports hoist cross-file ones.
    fn heritage_rule(&mut self, heritage: &SchemaType) -> Result<String, RenderError> {
        match reference_name(heritage) {
            Some(name) => Ok(self.opts.generated_name(name)),
            None => self.rule_kind(&heritage.kind),
        }
    }

    // ------------------------------- Rules --------------------------------- //

    fn rule(&mut self, ty: &SchemaType) -> Result<String, RenderError> {
        let base = self.rule_kind(&ty.kind)?;
        Ok(if ty.is_present() { format!("{base}.required()") } else { base })
    }

    fn rule_kind(&mut self, kind: &SchemaKind) -> Result<String, RenderError> {
        Ok(match kind {
            SchemaKind::Any | SchemaKind::Unknown => "Joi.any()".to_string(),
            SchemaKind::Boolean => "Joi.boolean()".to_string(),
            SchemaKind::BigInt => guard("typeof value === 'bigint'"),
            SchemaKind::Symbol => guard("typeof value === 'symbol'"),
            SchemaKind::Void | SchemaKind::Undefined => guard("value === undefined"),
            SchemaKind::Null => "Joi.valid(null)".to_string(),
            SchemaKind::Never => {
                "Joi.any().custom((value, helpers) => helpers.error('any.invalid'))".to_string()
            }
            SchemaKind::Func => guard("typeof value === 'function'"),
            SchemaKind::Date => "Joi.date()".to_string(),
            SchemaKind::Buffer => guard("Buffer.isBuffer(value)"),
            SchemaKind::String { regex } => {
                let mut out = String::from("Joi.string()");
                if let Some(spec) = regex {
                    match &spec.name {
                        Some(name) => out.push_str(&format!(
                            ".regex({}, '{}')",
                            regex_literal(&spec.pattern),
                            render::js_escape(name),
                        )),
                        None => out.push_str(&format!(".regex({})", regex_literal(&spec.pattern))),
                    }
                }
                out
            }
            SchemaKind::Number { integer, min, max } => {
                let mut out = String::from("Joi.number()");
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
            SchemaKind::Object { members: None } => "Joi.object()".to_string(),
            SchemaKind::Object { members: Some(members) } => self.object_rule(members)?,
            SchemaKind::TypeReference { name } => {
                format!("Joi.lazy(() => {})", self.opts.generated_name(name))
            }
            SchemaKind::TypeAccess { name, access } => {
                format!("Joi.lazy(() => Joi.valid({name}.{access}))")
            }
            SchemaKind::Array { of, min_length, max_length } => {
                let mut out = format!("Joi.array().items({})", self.rule(of)?);
                if let Some(min) = min_length {
                    out.push_str(&format!(".min({min})"));
                }
                if let Some(max) = max_length {
                    out.push_str(&format!(".max({max})"));
                }
                out
            }
            SchemaKind::Tuple { of, min_length, rest } => {
                let elements = of
                    .iter()
                    .map(|t| self.rule(t))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                let mut out = format!("Joi.array().ordered({elements})");
                if let Some(rest) = rest {
                    out.push_str(&format!(".items({})", self.rule(rest)?));
                }
                out.push_str(&format!(".min({min_length})"));
                if rest.is_none() {
                    out.push_str(&format!(".max({})", of.len()));
                }
                out
            }
            SchemaKind::Union { of } => {
                let alternatives = of
                    .iter()
                    .map(|t| self.rule(t))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                format!("Joi.alternatives({alternatives})")
            }
            SchemaKind::Intersection { of } => self.intersection_rule(of)?,
            SchemaKind::Literal { value } => format!("Joi.valid({})", literal_js(value)),
        })
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

    fn object_rule(&mut self, members: &[Member]) -> Result<String, RenderError> {
        let props: Vec<&Member> = members.iter().filter(|m| m.indexer.is_none()).collect();
        let mut out = if props.is_empty() {
            String::from("Joi.object({})")
        } else {
            let body = self.with_indent(self.indent + 1, |r| {
                let mut body = String::new();
                for member in &props {
                    body.push_str(&format!(
                        "{}{}: {},\n",
                        pad(r.indent),
                        js_key(&member.name),
                        r.rule(&member.ty)?,
                    ));
                }
                Ok(body)
            })?;
            format!("Joi.object({{\n{body}{}}})", pad(self.indent))
        };
        for member in members.iter().filter(|m| m.indexer.is_some()) {
            let key = match member.indexer.as_ref() {
                Some(Indexer::Number) => regex_literal(r"^\d+$"),
                Some(Indexer::Pattern(pattern)) => regex_literal(pattern),
                None => continue,
            };
            out.push_str(&format!(".pattern({key}, {})", self.rule(&member.ty)?));
        }
        Ok(out)
    }

    /// Intersections. All members object-shaped: a plain `.concat` chain in
    /// a deferred block. With union members: hoist the objects into one
    /// concatenation, each union into its own temporary, and short-circuit
    /// over the temporaries. Anything else in the member list is an error,
    /// by policy rather than accident.
    fn intersection_rule(&mut self, of: &[SchemaType]) -> Result<String, RenderError> {
        if of.is_empty() {
            return Ok("Joi.any()".to_string());
        }
        let outer = self.indent;
        let (objects, unions) = self.with_indent(outer + 1, |r| {
            let mut objects: Vec<String> = Vec::new();
            let mut unions: Vec<String> = Vec::new();
            for member in of {
                match &member.kind {
                    SchemaKind::Object { members: Some(ms) } => objects.push(r.object_rule(ms)?),
                    SchemaKind::Object { members: None } => {
                        objects.push("Joi.object()".to_string());
                    }
                    SchemaKind::TypeReference { name } => {
                        objects.push(r.opts.generated_name(name));
                    }
                    SchemaKind::Union { .. } => unions.push(r.rule_kind(&member.kind)?),
                    _ => return Err(RenderError::MixedIntersection),
                }
            }
            Ok((objects, unions))
        })?;

        let chain = match objects.split_first() {
            Some((first, rest)) => {
                let mut chain = first.clone();
                for o in rest {
                    chain.push_str(&format!(".concat({o})"));
                }
                chain
            }
            None => "Joi.any()".to_string(),
        };

        if unions.is_empty() {
            return Ok(format!("Joi.lazy(() => {chain})"));
        }

        // synthesized fallback: deferred block with ordered short-circuit
        let i1 = pad(outer + 1);
        let i2 = pad(outer + 2);
        let i3 = pad(outer + 3);
        let mut out = String::from("Joi.lazy(() => {\n");
        out.push_str(&format!("{i1}const base = {chain};\n"));
        for (idx, union) in unions.iter().enumerate() {
            out.push_str(&format!("{i1}const union{idx} = {union};\n"));
        }
        let names: Vec<String> = (0..unions.len()).map(|i| format!("union{i}")).collect();
        out.push_str(&format!("{i1}return base.custom((value, helpers) => {{\n"));
        out.push_str(&format!("{i2}for (const option of [{}]) {{\n", names.join(", ")));
        out.push_str(&format!("{i3}if (option.validate(value).error) {{\n"));
        out.push_str(&format!("{}return helpers.error('any.invalid');\n", pad(outer + 4)));
        out.push_str(&format!("{i3}}}\n"));
        out.push_str(&format!("{i2}}}\n"));
        out.push_str(&format!("{i2}return value;\n"));
        out.push_str(&format!("{i1}}});\n"));
        out.push_str(&format!("{}}})", pad(outer)));
        Ok(out)
    }
}

fn guard(predicate: &str) -> String {
    format!("Joi.any().custom((value, helpers) => ({predicate} ? value : helpers.error('any.invalid')))")
}
