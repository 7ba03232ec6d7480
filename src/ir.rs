// Strongly-typed schema IR. Dialect-agnostic; no renderer concerns here.

/// One node of the compiled schema tree.
///
/// `required` is tri-state: `Some(true)`/`Some(false)` were decided during
/// compilation (optionality, nullability, tuple position); `None` inherits
/// whatever the enclosing position defaults to.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaType {
    pub kind: SchemaKind,
    pub required: Option<bool>,
}

impl SchemaType {
    pub fn new(kind: SchemaKind) -> Self {
        Self { kind, required: None }
    }

    pub fn with_required(kind: SchemaKind, required: bool) -> Self {
        Self { kind, required: Some(required) }
    }

    /// Effective presence under "default present" semantics.
    pub fn is_present(&self) -> bool {
        self.required != Some(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Any,
    Unknown,
    Boolean,
    BigInt,
    Symbol,
    Void,
    Undefined,
    Null,
    Never,
    Func,
    Date,
    Buffer,
    String {
        regex: Option<RegexSpec>,
    },
    Number {
        integer: bool,
        min: Option<f64>,
        max: Option<f64>,
    },
    Object {
        members: Option<Vec<Member>>,   // None = opaque boxed Object
    },
    /// Deferred, name-based link. Never embeds the target's tree; this is
    /// what keeps recursive and mutually-recursive declarations finite.
    TypeReference {
        name: String,
    },
    /// A qualified enum member access (`Color.Red`), also deferred.
    TypeAccess {
        name: String,
        access: String,
    },
    Array {
        of: Box<SchemaType>,
        min_length: Option<u32>,
        max_length: Option<u32>,
    },
    Tuple {
        of: Vec<SchemaType>,     // positional elements, exact arity
        min_length: u32,         // positions below this are required
        rest: Option<Box<SchemaType>>,
    },
    Union {
        of: Vec<SchemaType>,
    },
    Intersection {
        of: Vec<SchemaType>,
    },
    Literal {
        value: LiteralValue,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Num(f64),
    Bool(bool),
    BigInt(String),              // raw digits, rendered with the `n` suffix
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegexSpec {
    pub pattern: String,
    pub name: Option<String>,
}

/// One property or one index signature of an object-like shape.
/// An object declaration has at most one indexer member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: SchemaType,
    pub indexer: Option<Indexer>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Indexer {
    Number,
    Pattern(String),
}
