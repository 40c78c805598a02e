//! The `Value` tagged union.
//!
//! Every storable value is one of these variants. The structural serializer
//! dispatches on the variant instead of inspecting runtime attributes, and
//! user types enter the model either as plain containers (through the serde
//! bridge in [`convert`]) or as [`Instance`]s of a registered [`Stashable`].

mod array;
mod convert;
mod frame;
mod object;
mod set;

pub use array::{DType, NdArray};
pub use frame::{DataFrame, Series};
pub use object::{ClassDef, ClassRef, FunctionRef, Instance, Opaque, State, Stashable};
pub use set::ValueSet;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Any value a stash can hold
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Set(ValueSet),
    FrozenSet(ValueSet),
    Array(NdArray),
    Frame(DataFrame),
    Series(Series),
    /// Items drained from an iterator
    Generator(Vec<Value>),
    Class(ClassRef),
    Function(FunctionRef),
    Instance(Instance),
    /// Best-effort placeholder for something that could not be reconstructed
    Opaque(Opaque),
}

impl Value {
    /// Short name of the variant, used in errors and for set ordering
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Path(_) => "path",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Array(_) => "ndarray",
            Value::Frame(_) => "DataFrame",
            Value::Series(_) => "Series",
            Value::Generator(_) => "generator",
            Value::Class(_) => "type",
            Value::Function(_) => "function",
            Value::Instance(_) => "instance",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn path(path: impl AsRef<Path>) -> Self {
        Value::Path(path.as_ref().to_path_buf())
    }

    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn frozenset<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::FrozenSet(items.into_iter().map(Into::into).collect())
    }

    /// Drain an iterator into a generator value
    pub fn generator<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Generator(items.into_iter().map(Into::into).collect())
    }

    pub fn dict<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of any ordered sequence: list, tuple or drained generator
    #[must_use]
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Generator(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(set) | Value::FrozenSet(set) => Some(set),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Look up a key of a dict value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict().and_then(|map| map.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_pick_variants() {
        assert_eq!(Value::tuple([1, 2]).type_name(), "tuple");
        assert_eq!(Value::set(["a"]).type_name(), "set");
        assert_eq!(Value::frozenset(["a"]).type_name(), "frozenset");
        assert_eq!(Value::generator(0..3).as_slice().map(<[Value]>::len), Some(3));
        assert_eq!(Value::bytes(b"\0x".to_vec()).as_bytes(), Some(&b"\0x"[..]));
    }

    #[test]
    fn test_dict_lookup() {
        let value = Value::dict([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!(value.get("a").and_then(Value::as_i64), Some(1));
        assert_eq!(value.get("b").and_then(Value::as_str), Some("x"));
        assert!(value.get("c").is_none());
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::from("3").as_f64(), None);
    }
}
