//! Type IR Compiler: oracle facts in, `SchemaType` trees out.
//!
//! One declaration at a time, structural recursion for nested shapes.
//! Cycles never recurse: a type carrying a declared alias other than the
//! enclosing declaration's own name short-circuits into a `TypeReference`,
//! and references resolve at render time, not here. Context (the enclosing
//! declaration, the active property's tags) travels as an explicit
//! parameter so the compiler stays re-entrant.

pub mod annot;

use thiserror::Error;

use crate::config::CompilerConfig;
use crate::diag::Diagnostics;
use crate::ir::{Indexer, LiteralValue, Member, SchemaKind, SchemaType};
use crate::oracle::{
    IndexerKey, LiteralNode, ObjectNode, Tags, TupleFacts, TypeEntry, TypeId, TypeNode, TypeOracle,
};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("type #{0} is not present in the oracle arena")]
    UnknownType(TypeId),
    #[error("type #{0} has an unrecognized classification")]
    UnrecognizedClassification(TypeId),
    #[error("declaration `{0}` is parameterized; generic declarations are not supported")]
    Generic(String),
    #[error("interface `{0}` did not compile to an object shape")]
    InterfaceShape(String),
}

/// Explicit compilation context: who encloses this type, and which
/// property's tags are active for annotation-driven refinement.
///
/// `root` is true only for the declaration's own type. It gates the alias
/// short-circuit: at the root, a type aliased with the declaration's own
/// name must expand (that IS the declaration); anywhere deeper the same
/// alias is a self-reference and must stay a reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub decl_name: &'a str,
    pub prop_tags: Option<&'a Tags>,
    root: bool,
}

impl<'a> Scope<'a> {
    pub fn declaration(decl_name: &'a str) -> Self {
        Self { decl_name, prop_tags: None, root: true }
    }

    pub fn declaration_with_tags(decl_name: &'a str, tags: &'a Tags) -> Self {
        Self { decl_name, prop_tags: Some(tags), root: true }
    }

    fn nested(self) -> Self {
        Self { root: false, ..self }
    }

    fn with_tags(self, tags: &'a Tags) -> Self {
        Self { prop_tags: Some(tags), root: false, ..self }
    }

    fn without_tags(self) -> Self {
        Self { prop_tags: None, root: false, ..self }
    }
}

pub struct Compiler<'a, O: TypeOracle> {
    oracle: &'a O,
    strict_nulls: bool,
    diags: &'a Diagnostics,
}

impl<'a, O: TypeOracle> Compiler<'a, O> {
    pub fn new(oracle: &'a O, config: &CompilerConfig, diags: &'a Diagnostics) -> Self {
        Self { oracle, strict_nulls: config.strict_null_checks, diags }
    }

    /// Compile one type handle. Invoked once per declaration and recursively
    /// for nested structure.
    pub fn compile(&self, ty: TypeId, scope: Scope<'_>) -> Result<SchemaType, CompileError> {
        let entry = self.oracle.entry(ty).ok_or(CompileError::UnknownType(ty))?;

        // Exactly null / exactly undefined: only a matching value satisfies
        // the position, absence does not, so presence is forced.
        match entry.node {
            TypeNode::Null => return Ok(SchemaType::with_required(SchemaKind::Null, true)),
            TypeNode::Undefined => {
                return Ok(SchemaType::with_required(SchemaKind::Undefined, true));
            }
            _ => {}
        }

        self.compile_nullable(ty, entry, scope)
    }

    // ------------------------- Nullability ------------------------------- //

    fn compile_nullable(
        &self,
        ty: TypeId,
        entry: &TypeEntry,
        scope: Scope<'_>,
    ) -> Result<SchemaType, CompileError> {
        let mut nullable = false;
        let mut undefineable = false;

        let mut core = if self.strict_nulls {
            match &entry.node {
                TypeNode::Union { members } => {
                    let mut rest = Vec::new();
                    for &member in members {
                        match self.oracle.entry(member).map(|e| &e.node) {
                            Some(TypeNode::Null) => nullable = true,
                            Some(TypeNode::Undefined) => undefineable = true,
                            _ => rest.push(member),
                        }
                    }
                    if !nullable && !undefineable {
                        self.compile_nonnull(ty, entry, scope)?
                    } else {
                        match rest.len() {
                            // nothing but markers: no value can match the core
                            0 => SchemaType::new(SchemaKind::Never),
                            1 => self.compile(rest[0], scope.nested())?,
                            _ => self.compile_union(&rest, scope)?,
                        }
                    }
                }
                _ => self.compile_nonnull(ty, entry, scope)?,
            }
        } else {
            if let Some(tags) = scope.prop_tags {
                nullable = tags.has(annot::TAG_NULLABLE);
                undefineable = tags.has(annot::TAG_UNDEFINEABLE);
            }
            self.compile_nonnull(ty, entry, scope)?
        };

        if nullable || undefineable {
            if core.required.is_none() {
                core.required = Some(!undefineable);
            }
            if nullable {
                let required = core.required.take();
                core = SchemaType {
                    kind: SchemaKind::Union {
                        of: vec![core, SchemaType::new(SchemaKind::Null)],
                    },
                    required,
                };
            }
        }
        Ok(core)
    }

    // ----------------------- Classification ------------------------------ //

    fn compile_nonnull(
        &self,
        ty: TypeId,
        entry: &TypeEntry,
        scope: Scope<'_>,
    ) -> Result<SchemaType, CompileError> {
        // Aliased-name short-circuit: emit a reference instead of
        // re-expanding. Primary cycle breaker.
        if let Some(alias) = &entry.alias {
            if !scope.root || alias != scope.decl_name {
                return Ok(SchemaType::new(SchemaKind::TypeReference { name: alias.clone() }));
            }
        }

        let kind = match &entry.node {
            TypeNode::Any => SchemaKind::Any,
            TypeNode::Unknown => SchemaKind::Unknown,
            TypeNode::String => SchemaKind::String {
                regex: annot::string_regex(scope.prop_tags, self.diags),
            },
            TypeNode::Number => self.number_kind(scope),
            TypeNode::Boolean => SchemaKind::Boolean,
            TypeNode::BigInt => SchemaKind::BigInt,
            TypeNode::Symbol => SchemaKind::Symbol,
            TypeNode::Void => SchemaKind::Void,
            TypeNode::Undefined => SchemaKind::Undefined,
            TypeNode::Null => SchemaKind::Null,
            TypeNode::Never => SchemaKind::Never,
            TypeNode::EnumLiteral { enum_name, member } => match member {
                Some(access) => SchemaKind::TypeAccess {
                    name: enum_name.clone(),
                    access: access.clone(),
                },
                None => SchemaKind::TypeReference { name: enum_name.clone() },
            },
            TypeNode::Literal { value } => SchemaKind::Literal {
                value: match value {
                    LiteralNode::Bool(b) => LiteralValue::Bool(*b),
                    LiteralNode::Num(n) => LiteralValue::Num(*n),
                    LiteralNode::Str(s) => LiteralValue::Str(s.clone()),
                },
            },
            TypeNode::BigIntLiteral { raw } => SchemaKind::Literal {
                value: LiteralValue::BigInt(raw.clone()),
            },
            TypeNode::Union { members } => return self.compile_union(members, scope),
            TypeNode::Intersection { members } => {
                let of = members
                    .iter()
                    .map(|&m| self.compile(m, scope.nested()))
                    .collect::<Result<Vec<_>, _>>()?;
                SchemaKind::Intersection { of }
            }
            TypeNode::Object(obj) => return self.compile_object(obj, scope),
            TypeNode::Unrecognized => {
                return Err(CompileError::UnrecognizedClassification(ty));
            }
        };
        Ok(SchemaType::new(kind))
    }

    fn number_kind(&self, scope: Scope<'_>) -> SchemaKind {
        let (integer, min, max) = annot::number_facts(scope.prop_tags, self.diags);
        SchemaKind::Number { integer, min, max }
    }

    fn compile_union(&self, members: &[TypeId], scope: Scope<'_>) -> Result<SchemaType, CompileError> {
        let mut of = members
            .iter()
            .map(|&m| self.compile(m, scope.nested()))
            .collect::<Result<Vec<_>, _>>()?;
        merge_boolean_literals(&mut of);
        Ok(SchemaType::new(SchemaKind::Union { of }))
    }

    // --------------------------- Objects ---------------------------------- //

    fn compile_object(&self, obj: &ObjectNode, scope: Scope<'_>) -> Result<SchemaType, CompileError> {
        if obj.call_signatures > 0 {
            return Ok(SchemaType::new(SchemaKind::Func));
        }
        if let Some(tuple) = &obj.tuple {
            return self.compile_tuple(tuple, scope);
        }

        // Well-known wrapper names map to their plain equivalents.
        if let Some(name) = &obj.name {
            let kind = match name.as_str() {
                "Number" => Some(self.number_kind(scope)),
                "String" => Some(SchemaKind::String {
                    regex: annot::string_regex(scope.prop_tags, self.diags),
                }),
                "Boolean" => Some(SchemaKind::Boolean),
                "BigInt" => Some(SchemaKind::BigInt),
                "Symbol" => Some(SchemaKind::Symbol),
                "Object" => Some(SchemaKind::Object { members: None }),
                "Date" => Some(SchemaKind::Date),
                "Buffer" => Some(SchemaKind::Buffer),
                "Array" => {
                    let of = match obj.type_arguments.first() {
                        Some(&arg) => self.compile(arg, scope.without_tags())?,
                        None => SchemaType::new(SchemaKind::Any),
                    };
                    let (min_length, max_length) = annot::array_bounds(scope.prop_tags, self.diags);
                    Some(SchemaKind::Array { of: Box::new(of), min_length, max_length })
                }
                _ => None,
            };
            if let Some(kind) = kind {
                return Ok(SchemaType::new(kind));
            }
            // Named types with type arguments stay a reference; expanding a
            // generic instantiation is out of scope.
            if !obj.type_arguments.is_empty() {
                return Ok(SchemaType::new(SchemaKind::TypeReference { name: name.clone() }));
            }
        }

        // Plain structural shape.
        let mut members = Vec::with_capacity(obj.properties.len() + 1);
        for prop in &obj.properties {
            let mut compiled = self.compile(prop.ty, scope.with_tags(&prop.tags))?;
            if compiled.required.is_none() {
                compiled.required = Some(!prop.optional);
            }
            members.push(Member { name: prop.name.clone(), ty: compiled, indexer: None });
        }
        for (i, ix) in obj.indexers.iter().enumerate() {
            if i > 0 {
                self.diags.warn(format!(
                    "`{}` carries more than one index signature; extras are ignored",
                    scope.decl_name,
                ));
                break;
            }
            let value = self.compile(ix.value, scope.without_tags())?;
            let indexer = match ix.key {
                IndexerKey::Number => Indexer::Number,
                IndexerKey::String => Indexer::Pattern(
                    annot::indexer_pattern(&ix.tags, self.diags).unwrap_or_else(|| ".*".to_string()),
                ),
            };
            members.push(Member {
                name: "[index]".to_string(),
                ty: value,
                indexer: Some(indexer),
            });
        }
        Ok(SchemaType::new(SchemaKind::Object { members: Some(members) }))
    }

    fn compile_tuple(&self, tuple: &TupleFacts, scope: Scope<'_>) -> Result<SchemaType, CompileError> {
        let element_scope = scope.without_tags();
        let mut of = Vec::with_capacity(tuple.elements.len());
        for (i, &el) in tuple.elements.iter().enumerate() {
            let mut compiled = self.compile(el, element_scope)?;
            // positions below the minimum length must be present
            compiled.required = Some((i as u32) < tuple.min_length);
            of.push(compiled);
        }
        let rest = match tuple.rest {
            Some(rest) => Some(Box::new(self.compile(rest, element_scope)?)),
            None => None,
        };
        Ok(SchemaType::new(SchemaKind::Tuple { of, min_length: tuple.min_length, rest }))
    }
}

/// If both boolean literals appear as union alternatives, they are jointly
/// just `boolean`: the first becomes `Boolean`, the duplicate drops.
fn merge_boolean_literals(of: &mut Vec<SchemaType>) {
    let lit = |v: bool| {
        move |t: &SchemaType| matches!(&t.kind, SchemaKind::Literal { value: LiteralValue::Bool(b) } if *b == v)
    };
    let (Some(t_idx), Some(f_idx)) = (of.iter().position(lit(true)), of.iter().position(lit(false)))
    else {
        return;
    };
    let (keep, drop) = if t_idx < f_idx { (t_idx, f_idx) } else { (f_idx, t_idx) };
    of[keep].kind = SchemaKind::Boolean;
    of.remove(drop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use serde_json::{Value, json};

    fn oracle(types: Value) -> Snapshot {
        serde_json::from_value(json!({ "types": types, "files": [] })).unwrap()
    }

    fn compiler<'a>(
        snap: &'a Snapshot,
        strict: bool,
        diags: &'a Diagnostics,
    ) -> Compiler<'a, Snapshot> {
        let config = CompilerConfig { strict_null_checks: strict };
        Compiler::new(snap, &config, diags)
    }

    #[test]
    fn nullable_union_strips_markers_and_wraps_null() {
        // member order must not matter
        for members in [json!([1, 2]), json!([2, 1])] {
            let snap = oracle(json!([
                { "kind": "union", "members": members },
                { "kind": "null" },
                { "kind": "string" },
            ]));
            let diags = Diagnostics::new();
            let out = compiler(&snap, true, &diags)
                .compile(0, Scope::declaration("T"))
                .unwrap();
            assert_eq!(out.required, Some(true));
            match out.kind {
                SchemaKind::Union { of } => {
                    assert_eq!(of.len(), 2);
                    assert!(matches!(of[0].kind, SchemaKind::String { .. }));
                    assert_eq!(of[1].kind, SchemaKind::Null);
                }
                other => panic!("expected union, got {other:?}"),
            }
        }
    }

    #[test]
    fn undefined_marker_clears_required_without_wrapping() {
        let snap = oracle(json!([
            { "kind": "union", "members": [1, 2] },
            { "kind": "undefined" },
            { "kind": "string" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        assert_eq!(out.required, Some(false));
        assert!(matches!(out.kind, SchemaKind::String { .. }));
    }

    #[test]
    fn exactly_null_forces_presence() {
        let snap = oracle(json!([{ "kind": "null" }]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        assert_eq!(out.kind, SchemaKind::Null);
        assert_eq!(out.required, Some(true));
    }

    #[test]
    fn non_strict_mode_reads_nullability_tags() {
        let snap = oracle(json!([{ "kind": "string" }]));
        let diags = Diagnostics::new();
        let tags: Tags = serde_json::from_value(json!({ "nullable": "", "undefineable": "" })).unwrap();
        let scope = Scope::declaration_with_tags("T", &tags);
        let out = compiler(&snap, false, &diags).compile(0, scope).unwrap();
        assert_eq!(out.required, Some(false));
        match out.kind {
            SchemaKind::Union { of } => assert_eq!(of[1].kind, SchemaKind::Null),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn boolean_literal_union_merges_regardless_of_position() {
        for members in [json!([1, 2, 3]), json!([2, 3, 1])] {
            let snap = oracle(json!([
                { "kind": "union", "members": members },
                { "kind": "literal", "value": true },
                { "kind": "literal", "value": false },
                { "kind": "string" },
            ]));
            let diags = Diagnostics::new();
            let out = compiler(&snap, true, &diags)
                .compile(0, Scope::declaration("T"))
                .unwrap();
            match out.kind {
                SchemaKind::Union { of } => {
                    assert_eq!(of.len(), 2);
                    assert_eq!(of.iter().filter(|t| t.kind == SchemaKind::Boolean).count(), 1);
                    assert!(!of.iter().any(|t| matches!(
                        &t.kind,
                        SchemaKind::Literal { value: LiteralValue::Bool(_) }
                    )));
                }
                other => panic!("expected union, got {other:?}"),
            }
        }
    }

    #[test]
    fn tuple_positions_below_min_length_are_required() {
        let snap = oracle(json!([
            { "kind": "object", "tuple": { "elements": [1, 1, 1], "min-length": 2 } },
            { "kind": "string" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        match out.kind {
            SchemaKind::Tuple { of, min_length, rest } => {
                assert_eq!(min_length, 2);
                assert!(rest.is_none());
                assert_eq!(of[0].required, Some(true));
                assert_eq!(of[1].required, Some(true));
                assert_eq!(of[2].required, Some(false));
            }
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn alias_short_circuits_into_reference() {
        let snap = oracle(json!([
            { "kind": "object", "alias": "Other", "properties": [] },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("Mine"))
            .unwrap();
        assert_eq!(out.kind, SchemaKind::TypeReference { name: "Other".to_string() });
    }

    #[test]
    fn self_recursive_alias_stays_finite() {
        // type Node = { next: Node | null }: the inner occurrence carries
        // the declaration's own alias and must become a reference, not a
        // re-expansion
        let snap = oracle(json!([
            { "kind": "object", "alias": "Node", "properties": [
                { "name": "next", "type": 1 },
            ]},
            { "kind": "union", "members": [0, 2] },
            { "kind": "null" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("Node"))
            .unwrap();
        let SchemaKind::Object { members: Some(members) } = out.kind else {
            panic!("expected object");
        };
        let SchemaKind::Union { of } = &members[0].ty.kind else {
            panic!("expected nullable wrapper union");
        };
        assert_eq!(of[0].kind, SchemaKind::TypeReference { name: "Node".to_string() });
        assert_eq!(of[1].kind, SchemaKind::Null);
    }

    #[test]
    fn own_alias_does_not_short_circuit() {
        let snap = oracle(json!([
            { "kind": "object", "alias": "Mine", "properties": [
                { "name": "x", "type": 1 },
            ]},
            { "kind": "number" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("Mine"))
            .unwrap();
        assert!(matches!(out.kind, SchemaKind::Object { members: Some(_) }));
    }

    #[test]
    fn enum_literals_compile_to_reference_or_access() {
        let snap = oracle(json!([
            { "kind": "enum-literal", "enum": "Color" },
            { "kind": "enum-literal", "enum": "Color", "member": "Red" },
        ]));
        let diags = Diagnostics::new();
        let c = compiler(&snap, true, &diags);
        assert_eq!(
            c.compile(0, Scope::declaration("T")).unwrap().kind,
            SchemaKind::TypeReference { name: "Color".to_string() },
        );
        assert_eq!(
            c.compile(1, Scope::declaration("T")).unwrap().kind,
            SchemaKind::TypeAccess { name: "Color".to_string(), access: "Red".to_string() },
        );
    }

    #[test]
    fn member_optionality_defaults_but_never_overrides() {
        let snap = oracle(json!([
            { "kind": "object", "properties": [
                { "name": "plain", "type": 3 },
                { "name": "maybe", "type": 3, "optional": true },
                { "name": "opt_union", "type": 1 },
            ]},
            { "kind": "union", "members": [2, 3] },
            { "kind": "undefined" },
            { "kind": "string" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        let SchemaKind::Object { members: Some(members) } = out.kind else {
            panic!("expected object");
        };
        assert_eq!(members[0].ty.required, Some(true));
        assert_eq!(members[1].ty.required, Some(false));
        // sub-compiler already decided: optionality flag must not override
        assert_eq!(members[2].ty.required, Some(false));
    }

    #[test]
    fn wrapper_names_map_to_plain_kinds() {
        let snap = oracle(json!([
            { "kind": "object", "name": "Date" },
            { "kind": "object", "name": "Buffer" },
            { "kind": "object", "name": "Array", "type-arguments": [3] },
            { "kind": "boolean" },
            { "kind": "object", "name": "Object" },
        ]));
        let diags = Diagnostics::new();
        let c = compiler(&snap, true, &diags);
        let scope = Scope::declaration("T");
        assert_eq!(c.compile(0, scope).unwrap().kind, SchemaKind::Date);
        assert_eq!(c.compile(1, scope).unwrap().kind, SchemaKind::Buffer);
        match c.compile(2, scope).unwrap().kind {
            SchemaKind::Array { of, .. } => assert_eq!(of.kind, SchemaKind::Boolean),
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(c.compile(4, scope).unwrap().kind, SchemaKind::Object { members: None });
    }

    #[test]
    fn generic_named_type_stays_a_reference() {
        let snap = oracle(json!([
            { "kind": "object", "name": "Box", "type-arguments": [1], "properties": [
                { "name": "inner", "type": 1 },
            ]},
            { "kind": "string" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        assert_eq!(out.kind, SchemaKind::TypeReference { name: "Box".to_string() });
    }

    #[test]
    fn callable_shapes_compile_to_func() {
        let snap = oracle(json!([
            { "kind": "object", "call-signatures": 2, "properties": [] },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        assert_eq!(out.kind, SchemaKind::Func);
    }

    #[test]
    fn unrecognized_classification_is_a_compiler_fault() {
        let snap = oracle(json!([{ "kind": "mapped" }]));
        let diags = Diagnostics::new();
        let err = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnrecognizedClassification(0)));
    }

    #[test]
    fn string_and_number_refinements_come_from_tags() {
        let snap = oracle(json!([
            { "kind": "object", "properties": [
                { "name": "code", "type": 1, "tags": { "regex": "/^[A-Z]{3}$/ code" } },
                { "name": "age", "type": 2, "tags": { "integer": "", "min": "0", "max": "150" } },
            ]},
            { "kind": "string" },
            { "kind": "number" },
        ]));
        let diags = Diagnostics::new();
        let out = compiler(&snap, true, &diags)
            .compile(0, Scope::declaration("T"))
            .unwrap();
        let SchemaKind::Object { members: Some(members) } = out.kind else {
            panic!("expected object");
        };
        match &members[0].ty.kind {
            SchemaKind::String { regex: Some(spec) } => {
                assert_eq!(spec.pattern, "^[A-Z]{3}$");
                assert_eq!(spec.name.as_deref(), Some("code"));
            }
            other => panic!("expected refined string, got {other:?}"),
        }
        assert_eq!(
            members[1].ty.kind,
            SchemaKind::Number { integer: true, min: Some(0.0), max: Some(150.0) },
        );
    }
}
