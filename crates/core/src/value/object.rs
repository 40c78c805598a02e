//! Classes, functions and instances.
//!
//! A type is identified by its address (`module.qualname`). Addresses that
//! are present in a type registry are "importable" and serialize as a bare
//! reference; anything else carries its own definition.

use super::Value;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute state of an instance
pub type State = BTreeMap<String, Value>;

/// Last path segment of an address, accepting both `.` and `::` separators
fn short_name(address: &str) -> &str {
    let tail = address.rsplit("::").next().unwrap_or(address);
    tail.rsplit('.').next().unwrap_or(tail)
}

/// A reference to a class, either by address or by inline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassRef {
    Address(String),
    Inline(Box<ClassDef>),
}

impl ClassRef {
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            ClassRef::Address(address) => address.clone(),
            ClassRef::Inline(def) => def.address(),
        }
    }

    #[must_use]
    pub fn definition(&self) -> Option<&ClassDef> {
        match self {
            ClassRef::Address(_) => None,
            ClassRef::Inline(def) => Some(def),
        }
    }
}

impl From<&str> for ClassRef {
    fn from(address: &str) -> Self {
        ClassRef::Address(address.to_string())
    }
}

impl From<String> for ClassRef {
    fn from(address: String) -> Self {
        ClassRef::Address(address)
    }
}

impl From<ClassDef> for ClassRef {
    fn from(def: ClassDef) -> Self {
        ClassRef::Inline(Box::new(def))
    }
}

/// A class that is defined by its data rather than by a registered type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub module: String,
    pub qualname: String,
    /// Addresses of base classes
    pub bases: Vec<String>,
    /// Non-dunder class attributes
    pub attributes: State,
    pub methods: BTreeMap<String, FunctionRef>,
}

impl ClassDef {
    pub fn new(module: impl Into<String>, qualname: impl Into<String>) -> Self {
        let qualname = qualname.into();
        Self {
            name: short_name(&qualname).to_string(),
            module: module.into(),
            qualname,
            bases: Vec::new(),
            attributes: State::new(),
            methods: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_base(mut self, address: impl Into<String>) -> Self {
        self.bases.push(address.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, name: impl Into<String>, function: FunctionRef) -> Self {
        self.methods.insert(name.into(), function);
        self
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.module, self.qualname)
    }
}

/// A reference to a callable
///
/// Registered functions are identified by address alone. Unregistered ones
/// may carry a source text and captured variables, which become part of their
/// serialized identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRef {
    address: String,
    source: Option<String>,
    closure: State,
}

impl FunctionRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            source: None,
            closure: State::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_closure(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.closure.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn name(&self) -> &str {
        short_name(&self.address)
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn closure(&self) -> &State {
        &self.closure
    }

    /// The same function addressed as a method of `class_address`
    #[must_use]
    pub fn as_method_of(&self, class_address: &str) -> Self {
        if self
            .address
            .strip_prefix(class_address)
            .is_some_and(|rest| rest.starts_with('.'))
        {
            return self.clone();
        }
        Self {
            address: format!("{class_address}.{}", self.name()),
            source: self.source.clone(),
            closure: self.closure.clone(),
        }
    }
}

/// Build a [`FunctionRef`] addressed by the caller's module path and the
/// function's name
#[macro_export]
macro_rules! function_ref {
    ($function:ident) => {
        $crate::FunctionRef::new(concat!(module_path!(), "::", stringify!($function)))
    };
}

/// An object: a class plus attribute state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    class: ClassRef,
    state: State,
}

impl Instance {
    pub fn new(class: impl Into<ClassRef>, state: State) -> Self {
        Self {
            class: class.into(),
            state,
        }
    }

    #[must_use]
    pub fn address(&self) -> String {
        self.class.address()
    }

    #[must_use]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.state.get(attribute)
    }

    #[must_use]
    pub fn into_state(self) -> State {
        self.state
    }
}

/// Placeholder for a value whose type could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opaque {
    pub address: String,
    /// Compact JSON of the node that could not be reconstructed
    pub repr: String,
}

/// A Rust type that can live in a stash as an [`Instance`]
///
/// Implementors pick a stable address and map themselves to and from
/// attribute state. Registering the type with the codec's type registry makes
/// it importable; reading then validates stored state through `from_state`.
pub trait Stashable: Sized {
    const ADDRESS: &'static str;

    fn to_state(&self) -> State;

    fn from_state(state: &State) -> Result<Self>;

    fn to_value(&self) -> Value {
        Value::Instance(Instance::new(Self::ADDRESS, self.to_state()))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Instance(instance) if instance.address() == Self::ADDRESS => {
                Self::from_state(instance.state())
            }
            Value::Instance(instance) => Err(Error::type_mismatch(
                Self::ADDRESS,
                instance.address(),
            )),
            other => Err(Error::type_mismatch(Self::ADDRESS, other.type_name())),
        }
    }
}
