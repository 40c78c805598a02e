//! Conversions between Rust values, plain JSON and [`Value`].

use super::{ClassDef, ClassRef, DataFrame, FunctionRef, Instance, NdArray, Opaque, Series, Value, ValueSet};
use crate::errors::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::None
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Value::Path(value)
    }
}

impl From<&Path> for Value {
    fn from(value: &Path) -> Self {
        Value::Path(value.to_path_buf())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Dict(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(map: HashMap<String, T>) -> Self {
        Value::Dict(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl From<ValueSet> for Value {
    fn from(set: ValueSet) -> Self {
        Value::Set(set)
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Value::Array(array)
    }
}

impl From<DataFrame> for Value {
    fn from(frame: DataFrame) -> Self {
        Value::Frame(frame)
    }
}

impl From<Series> for Value {
    fn from(series: Series) -> Self {
        Value::Series(series)
    }
}

impl From<ClassRef> for Value {
    fn from(class: ClassRef) -> Self {
        Value::Class(class)
    }
}

impl From<ClassDef> for Value {
    fn from(def: ClassDef) -> Self {
        Value::Class(ClassRef::from(def))
    }
}

impl From<FunctionRef> for Value {
    fn from(function: FunctionRef) -> Self {
        Value::Function(function)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Instance(instance)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Value::Opaque(opaque)
    }
}

impl Value {
    /// Convert plain JSON into a value: objects become dicts, arrays lists
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into plain JSON, flattening sequences and sets into arrays
    ///
    /// Shapes with no plain JSON equivalent (arrays, frames, classes,
    /// functions, instances) are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let json = match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::serialization("float", format!("{f} has no JSON form")))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Path(p) => serde_json::Value::String(p.to_string_lossy().into_owned()),
            Value::List(items) | Value::Tuple(items) | Value::Generator(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?)
            }
            Value::Set(set) | Value::FrozenSet(set) => {
                serde_json::Value::Array(set.iter().map(Value::to_json).collect::<Result<_>>()?)
            }
            Value::Dict(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            other => return Err(Error::type_mismatch("plain JSON value", other.type_name())),
        };
        Ok(json)
    }

    /// Build a value from anything serde can serialize
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Value::from_json(serde_json::to_value(value)?))
    }

    /// Read the value back into a serde type
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }
}
