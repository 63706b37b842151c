//! Dynamic values
//!
//! Every variable, parameter, expression result and writer input is a
//! [`Value`]. Each value reports a runtime [`TypeKey`] so the converter
//! registry can place it in the type hierarchy.

use crate::convert::TypeKey;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A dynamically typed template value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    BigInt(BigInt),
    Decimal(BigDecimal),
    String(String),
    /// A constant of a registered enumeration type
    Enum(EnumValue),
    /// A growable sequence
    List(Vec<Value>),
    /// A fixed host array; adapted to a list by the converter registry
    Array(Vec<Value>),
    Map(ValueMap),
    /// An opaque host value with a registered type
    Object(ObjectValue),
}

impl Value {
    pub const NULL: Value = Value::Null;

    /// The runtime type of this value
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Null => TypeKey::NULL,
            Value::Bool(_) => TypeKey::BOOL,
            Value::I8(_) => TypeKey::I8,
            Value::I16(_) => TypeKey::I16,
            Value::I32(_) => TypeKey::I32,
            Value::I64(_) => TypeKey::I64,
            Value::U8(_) => TypeKey::U8,
            Value::U16(_) => TypeKey::U16,
            Value::U32(_) => TypeKey::U32,
            Value::U64(_) => TypeKey::U64,
            Value::F32(_) => TypeKey::F32,
            Value::F64(_) => TypeKey::F64,
            Value::BigInt(_) => TypeKey::BIG_INT,
            Value::Decimal(_) => TypeKey::DECIMAL,
            Value::String(_) => TypeKey::STRING,
            Value::Enum(e) => e.type_key.clone(),
            Value::List(_) => TypeKey::LIST,
            Value::Array(_) => TypeKey::ARRAY,
            Value::Map(_) => TypeKey::MAP,
            Value::Object(o) => o.type_key.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I8(n) => *n != 0,
            Value::I16(n) => *n != 0,
            Value::I32(n) => *n != 0,
            Value::I64(n) => *n != 0,
            Value::U8(n) => *n != 0,
            Value::U16(n) => *n != 0,
            Value::U32(n) => *n != 0,
            Value::U64(n) => *n != 0,
            Value::F32(f) => *f != 0.0,
            Value::F64(f) => *f != 0.0,
            Value::BigInt(n) => *n != BigInt::from(0),
            Value::Decimal(d) => *d != BigDecimal::from(0),
            Value::String(s) => !s.is_empty(),
            Value::List(items) | Value::Array(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Enum(_) | Value::Object(_) => true,
        }
    }

    /// Render the value to a string for output
    pub fn render_to_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::I8(n) => n.to_string(),
            Value::I16(n) => n.to_string(),
            Value::I32(n) => n.to_string(),
            Value::I64(n) => n.to_string(),
            Value::U8(n) => n.to_string(),
            Value::U16(n) => n.to_string(),
            Value::U32(n) => n.to_string(),
            Value::U64(n) => n.to_string(),
            Value::F32(f) => f.to_string(),
            Value::F64(f) => f.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Enum(e) => e.constant.clone(),
            Value::List(items) | Value::Array(items) => {
                let items: Vec<String> = items.iter().map(Value::render_to_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.render_to_string(), v.render_to_string()))
                    .collect();
                format!("[{}]", entries.join(", "))
            }
            Value::Object(o) => format!("[object {}]", o.type_key),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of any fixed-width integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(n) => Some(i64::from(*n)),
            Value::I16(n) => Some(i64::from(*n)),
            Value::I32(n) => Some(i64::from(*n)),
            Value::I64(n) => Some(*n),
            Value::U8(n) => Some(i64::from(*n)),
            Value::U16(n) => Some(i64::from(*n)),
            Value::U32(n) => Some(i64::from(*n)),
            Value::U64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Elements of a list or array
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_to_string())
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    BigInt => BigInt,
    BigDecimal => Decimal,
    String => String,
    Vec<Value> => List,
    ValueMap => Map,
    EnumValue => Enum,
    ObjectValue => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A constant of an enumeration registered with the type hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_key: TypeKey,
    pub constant: String,
}

impl EnumValue {
    pub fn new(type_key: TypeKey, constant: impl Into<String>) -> Self {
        Self {
            type_key,
            constant: constant.into(),
        }
    }
}

/// An opaque host value carried through templates untouched
#[derive(Clone)]
pub struct ObjectValue {
    pub type_key: TypeKey,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectValue {
    pub fn new<T: Any + Send + Sync>(type_key: TypeKey, value: T) -> Self {
        Self {
            type_key,
            inner: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_key", &self.type_key)
            .finish_non_exhaustive()
    }
}

/// Objects compare by identity
impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An insertion-ordered map with arbitrary value keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap {
    entries: Vec<(Value, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing (in place) any entry with an equal key
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up an entry whose key is the given string
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for ValueMap {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
