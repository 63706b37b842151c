//! Type keys, conversion targets and the type hierarchy
//!
//! The hierarchy is a small registered graph: every type may name one
//! superclass and any number of capabilities. Converter selection
//! measures how far a value's runtime type sits from a converter's
//! declared source type in this graph.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Name of a node in the type hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    pub const NULL: TypeKey = TypeKey::from_static("null");
    pub const OBJECT: TypeKey = TypeKey::from_static("object");
    pub const BOOL: TypeKey = TypeKey::from_static("bool");
    pub const NUMBER: TypeKey = TypeKey::from_static("number");
    pub const I8: TypeKey = TypeKey::from_static("i8");
    pub const I16: TypeKey = TypeKey::from_static("i16");
    pub const I32: TypeKey = TypeKey::from_static("i32");
    pub const I64: TypeKey = TypeKey::from_static("i64");
    pub const U8: TypeKey = TypeKey::from_static("u8");
    pub const U16: TypeKey = TypeKey::from_static("u16");
    pub const U32: TypeKey = TypeKey::from_static("u32");
    pub const U64: TypeKey = TypeKey::from_static("u64");
    pub const F32: TypeKey = TypeKey::from_static("f32");
    pub const F64: TypeKey = TypeKey::from_static("f64");
    pub const BIG_INT: TypeKey = TypeKey::from_static("bigint");
    pub const DECIMAL: TypeKey = TypeKey::from_static("decimal");
    pub const STRING: TypeKey = TypeKey::from_static("string");
    pub const LIST: TypeKey = TypeKey::from_static("list");
    pub const ARRAY: TypeKey = TypeKey::from_static("array");
    pub const MAP: TypeKey = TypeKey::from_static("map");
    pub const ENUM: TypeKey = TypeKey::from_static("enum");
    /// Capability: ordered values
    pub const COMPARABLE: TypeKey = TypeKey::from_static("comparable");
    /// Capability: character data
    pub const TEXT: TypeKey = TypeKey::from_static("text");
    /// Capability: iterable element sequences
    pub const SEQUENCE: TypeKey = TypeKey::from_static("sequence");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fixed-width and arbitrary-precision numeric types
    pub fn numeric_types() -> [TypeKey; 12] {
        [
            Self::I8,
            Self::I16,
            Self::I32,
            Self::I64,
            Self::U8,
            Self::U16,
            Self::U32,
            Self::U64,
            Self::F32,
            Self::F64,
            Self::BIG_INT,
            Self::DECIMAL,
        ]
    }

    pub fn is_numeric(&self) -> bool {
        Self::numeric_types().contains(self)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static ANY: TargetType = TargetType::Any;

/// What a conversion should produce
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// Unconstrained: any non-null value already conforms
    Any,
    /// A concrete type from the hierarchy
    Type(TypeKey),
    /// A list whose elements convert to the inner type
    List(Box<TargetType>),
    /// A map whose keys and values convert to the inner types
    Map(Box<TargetType>, Box<TargetType>),
}

impl TargetType {
    pub const BOOL: TargetType = TargetType::Type(TypeKey::BOOL);
    pub const STRING: TargetType = TargetType::Type(TypeKey::STRING);
    pub const I32: TargetType = TargetType::Type(TypeKey::I32);
    pub const I64: TargetType = TargetType::Type(TypeKey::I64);
    pub const F64: TargetType = TargetType::Type(TypeKey::F64);

    pub fn of(key: TypeKey) -> Self {
        TargetType::Type(key)
    }

    pub fn list_of(element: TargetType) -> Self {
        TargetType::List(Box::new(element))
    }

    pub fn map_of(key: TargetType, value: TargetType) -> Self {
        TargetType::Map(Box::new(key), Box::new(value))
    }

    /// Concrete targets allow the identity short-circuit; parameterized ones don't
    pub fn is_concrete(&self) -> bool {
        matches!(self, TargetType::Any | TargetType::Type(_))
    }

    pub fn type_key(&self) -> Option<&TypeKey> {
        match self {
            TargetType::Type(key) => Some(key),
            _ => None,
        }
    }

    /// Element type when producing a sequence (raw list targets yield `Any`)
    pub fn element_type(&self) -> Option<&TargetType> {
        match self {
            TargetType::List(element) => Some(element),
            TargetType::Type(key) if *key == TypeKey::LIST || *key == TypeKey::SEQUENCE => {
                Some(&ANY)
            }
            _ => None,
        }
    }

    /// Key and value types when producing a map (raw map targets yield `Any`)
    pub fn entry_types(&self) -> Option<(&TargetType, &TargetType)> {
        match self {
            TargetType::Map(key, value) => Some((key, value)),
            TargetType::Type(key) if *key == TypeKey::MAP => {
                Some((&ANY, &ANY))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Any => f.write_str("any"),
            TargetType::Type(key) => write!(f, "{key}"),
            TargetType::List(element) => write!(f, "list<{element}>"),
            TargetType::Map(key, value) => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// Registration record for one type
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub superclass: Option<TypeKey>,
    pub capabilities: Vec<TypeKey>,
    /// Declared constants, for enumeration types
    pub constants: Option<Vec<String>>,
}

impl TypeDef {
    pub fn class(superclass: TypeKey) -> Self {
        Self {
            superclass: Some(superclass),
            ..Self::default()
        }
    }

    /// A capability node; reachable only through types that declare it
    pub fn capability() -> Self {
        Self::default()
    }

    pub fn enumeration<I, S>(constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            superclass: Some(TypeKey::ENUM),
            capabilities: vec![TypeKey::COMPARABLE],
            constants: Some(constants.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_capability(mut self, capability: TypeKey) -> Self {
        self.capabilities.push(capability);
        self
    }
}

/// The registered supertype/capability graph
#[derive(Debug, Clone)]
pub struct TypeHierarchy {
    types: HashMap<TypeKey, TypeDef>,
}

impl TypeHierarchy {
    /// A hierarchy with nothing but the root type
    pub fn empty() -> Self {
        let mut types = HashMap::new();
        types.insert(TypeKey::OBJECT, TypeDef::default());
        Self { types }
    }

    /// The built-in value types
    pub fn with_builtins() -> Self {
        let mut hierarchy = Self::empty();
        for capability in [TypeKey::COMPARABLE, TypeKey::TEXT, TypeKey::SEQUENCE] {
            hierarchy.register(capability, TypeDef::capability());
        }
        hierarchy.register(
            TypeKey::BOOL,
            TypeDef::class(TypeKey::OBJECT).with_capability(TypeKey::COMPARABLE),
        );
        hierarchy.register(TypeKey::NUMBER, TypeDef::class(TypeKey::OBJECT));
        for numeric in TypeKey::numeric_types() {
            hierarchy.register(
                numeric,
                TypeDef::class(TypeKey::NUMBER).with_capability(TypeKey::COMPARABLE),
            );
        }
        hierarchy.register(
            TypeKey::STRING,
            TypeDef::class(TypeKey::OBJECT)
                .with_capability(TypeKey::TEXT)
                .with_capability(TypeKey::COMPARABLE),
        );
        hierarchy.register(
            TypeKey::LIST,
            TypeDef::class(TypeKey::OBJECT).with_capability(TypeKey::SEQUENCE),
        );
        hierarchy.register(TypeKey::ARRAY, TypeDef::class(TypeKey::OBJECT));
        hierarchy.register(TypeKey::MAP, TypeDef::class(TypeKey::OBJECT));
        hierarchy.register(
            TypeKey::ENUM,
            TypeDef::class(TypeKey::OBJECT).with_capability(TypeKey::COMPARABLE),
        );
        hierarchy
    }

    /// Register (or replace) a type
    pub fn register(&mut self, key: TypeKey, def: TypeDef) {
        self.types.insert(key, def);
    }

    pub fn get(&self, key: &TypeKey) -> Option<&TypeDef> {
        self.types.get(key)
    }

    pub fn is_enum(&self, key: &TypeKey) -> bool {
        self.enum_constants(key).is_some()
    }

    pub fn enum_constants(&self, key: &TypeKey) -> Option<&[String]> {
        self.types.get(key)?.constants.as_deref()
    }

    /// Hierarchy distance from `from` up to `to`, `None` when unreachable.
    ///
    /// distance(T, T) = 0; otherwise one more than the closest of the
    /// superclass and the capabilities. Types never registered sit
    /// directly below the root.
    pub fn distance(&self, from: &TypeKey, to: &TypeKey) -> Option<usize> {
        let mut visiting = Vec::new();
        self.distance_inner(from, to, &mut visiting)
    }

    fn distance_inner(
        &self,
        from: &TypeKey,
        to: &TypeKey,
        visiting: &mut Vec<TypeKey>,
    ) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        if visiting.contains(from) {
            return None;
        }
        let Some(def) = self.types.get(from) else {
            return (*to == TypeKey::OBJECT && *from != TypeKey::NULL).then_some(1);
        };

        visiting.push(from.clone());
        let via_superclass = def
            .superclass
            .as_ref()
            .and_then(|superclass| self.distance_inner(superclass, to, visiting));
        let via_capabilities = def
            .capabilities
            .iter()
            .filter_map(|capability| self.distance_inner(capability, to, visiting))
            .min();
        visiting.pop();

        [via_superclass, via_capabilities]
            .into_iter()
            .flatten()
            .min()
            .map(|d| d + 1)
    }

    /// Whether a value of type `value_type` is an instance of `target`
    pub fn is_instance(&self, value_type: &TypeKey, target: &TypeKey) -> bool {
        self.distance(value_type, target).is_some()
    }
}

impl Default for TypeHierarchy {
    fn default() -> Self {
        Self::with_builtins()
    }
}
