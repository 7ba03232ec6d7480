//! Type Descriptor Oracle boundary.
//!
//! Symbol resolution, type-flag classification and annotation extraction
//! happened in an external type checker. This crate only asks questions
//! about the resulting type graph through [`TypeOracle`]; it never walks
//! syntax or resolves names itself. `snapshot` holds the one production
//! answer-set, deserialized from the checker's exported JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Handle into the oracle's type arena.
pub type TypeId = usize;

pub trait TypeOracle {
    /// Look up a type node. `None` means the snapshot carries a dangling
    /// handle, which the compiler reports as its own fault.
    fn entry(&self, id: TypeId) -> Option<&TypeEntry>;
}

/// One arena slot: the structural description plus the declared alias
/// symbol, when the checker resolved one at the use site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntry {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(flatten)]
    pub node: TypeNode,
}

/// Structural classification of a type, as reported by the checker.
///
/// Closed set: a snapshot produced by a newer checker may carry kinds this
/// build does not know; those deserialize as `Unrecognized` and abort the
/// enclosing declaration at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TypeNode {
    Any,
    Unknown,
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    Void,
    Undefined,
    Null,
    Never,
    Literal {
        value: LiteralNode,
    },
    BigIntLiteral {
        raw: String,
    },
    /// A member of an enumeration. `member` is present when the source
    /// accessed the member through a qualifying name (`Color.Red`).
    EnumLiteral {
        #[serde(rename = "enum")]
        enum_name: String,
        #[serde(default)]
        member: Option<String>,
    },
    Union {
        members: Vec<TypeId>,
    },
    Intersection {
        members: Vec<TypeId>,
    },
    Object(ObjectNode),
    #[serde(other)]
    Unrecognized,
}

/// A literal type's value. Bigints travel as `BigIntLiteral` instead, so
/// untagged decoding here never has to disambiguate digits from text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralNode {
    Bool(bool),
    Num(f64),
    Str(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ObjectNode {
    /// Symbol name, when the type is a named one (wrappers such as `Date`
    /// or `Array`, and user-declared generics).
    pub name: Option<String>,
    pub properties: Vec<PropertyFacts>,
    pub type_arguments: Vec<TypeId>,
    /// Present when the checker proved a fixed-length shape.
    pub tuple: Option<TupleFacts>,
    pub indexers: Vec<IndexerFacts>,
    pub call_signatures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFacts {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TupleFacts {
    pub elements: Vec<TypeId>,
    #[serde(default)]
    pub min_length: u32,
    #[serde(default)]
    pub rest: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerFacts {
    pub key: IndexerKey,
    pub value: TypeId,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerKey {
    Number,
    String,
}

/// Annotation tags attached to a declaration or property by the checker
/// (`@schema`, `@min 3`, ...), keyed by tag name without the `@`.
///
/// Three extraction modes, all absent-safe: presence ([`has`]), raw text
/// ([`text`]), raw text transformed ([`parsed`]).
///
/// [`has`]: Tags::has
/// [`text`]: Tags::text
/// [`parsed`]: Tags::parsed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(pub BTreeMap<String, String>);

impl Tags {
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn parsed<T>(&self, name: &str, transform: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        self.text(name).and_then(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Tags {
        let mut map = BTreeMap::new();
        map.insert("integer".to_string(), String::new());
        map.insert("min".to_string(), "3".to_string());
        map.insert("max".to_string(), "not-a-number".to_string());
        Tags(map)
    }

    #[test]
    fn tag_extraction_modes() {
        let t = tags();
        assert!(t.has("integer"));
        assert!(!t.has("regex"));
        assert_eq!(t.text("min"), Some("3"));
        assert_eq!(t.text("regex"), None);
        assert_eq!(t.parsed("min", |s| s.parse::<f64>().ok()), Some(3.0));
        // transform failure and absence are both `None`
        assert_eq!(t.parsed("max", |s| s.parse::<f64>().ok()), None);
        assert_eq!(t.parsed("missing", |s| s.parse::<f64>().ok()), None);
    }

    #[test]
    fn unknown_type_kind_deserializes_as_unrecognized() {
        let entry: TypeEntry =
            serde_json::from_value(serde_json::json!({ "kind": "conditional" })).unwrap();
        assert_eq!(entry.node, TypeNode::Unrecognized);
    }

    #[test]
    fn object_node_defaults_are_empty() {
        let entry: TypeEntry =
            serde_json::from_value(serde_json::json!({ "kind": "object" })).unwrap();
        match entry.node {
            TypeNode::Object(o) => {
                assert!(o.properties.is_empty());
                assert_eq!(o.call_signatures, 0);
                assert!(o.tuple.is_none());
            }
            other => panic!("expected object, got {other:?}"),
        }
    }
}
