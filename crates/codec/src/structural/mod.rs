//! The structural serializer
//!
//! Maps a [`Value`] to a JSON-shaped node tree and back. Plain JSON shapes
//! (null, bool, numbers, strings, lists, string-keyed maps) map to
//! themselves. Everything else becomes a mapping tagged with `__py__`, the
//! address used to route it back on deserialization:
//!
//! 1. the custom dispatch table (built-in codecs, then registered codecs),
//! 2. instance nodes (`__py_state__` / `__py_class__`),
//! 3. inline class definitions (`__py_name__`),
//! 4. functions carrying source or a closure,
//! 5. bare references to registered classes and functions.
//!
//! Unknown addresses come back as [`Opaque`] placeholders with a warning.

mod builtins;
pub mod nodes;
mod objects;

pub use nodes::{Node, NodeMap};

use crate::registry::TypeRegistry;
use crate::serializer::Serializer;
use serde::{Deserialize, Serialize};
use stash_core::{Error, Opaque, Result, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How unregistered types are treated on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    /// Unregistered classes and functions fail the write
    #[default]
    Required,
    /// Unregistered types are written as tagged references and read back
    /// as opaque placeholders
    Lenient,
}

impl SchemaMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaMode::Required => "required",
            SchemaMode::Lenient => "lenient",
        }
    }
}

impl fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "required" => Ok(SchemaMode::Required),
            "lenient" => Ok(SchemaMode::Lenient),
            other => Err(Error::configuration(format!(
                "unknown schema mode '{other}', expected one of: required, lenient"
            ))),
        }
    }
}

/// Serializer for arbitrary value graphs
#[derive(Debug, Clone)]
pub struct StructuralSerializer {
    registry: Arc<TypeRegistry>,
    schema: SchemaMode,
}

impl Default for StructuralSerializer {
    fn default() -> Self {
        Self::new(TypeRegistry::shared(), SchemaMode::default())
    }
}

impl StructuralSerializer {
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, schema: SchemaMode) -> Self {
        Self { registry, schema }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn schema(&self) -> SchemaMode {
        self.schema
    }

    /// Convert a value to a node
    pub fn to_node(&self, value: &Value) -> Result<Node> {
        let node = match value {
            Value::None => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Int(i) => Node::from(*i),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(number) => Node::Number(number),
                None => builtins::float_node(*f),
            },
            Value::Str(s) => Node::String(s.clone()),
            Value::List(items) => Node::Array(self.to_nodes(items)?),
            Value::Dict(map) => self.dict_node(map)?,
            Value::Tuple(items) => nodes::with_args("tuple", self.to_nodes(items)?),
            Value::Set(set) => nodes::with_args("set", self.to_nodes(set)?),
            Value::FrozenSet(set) => nodes::with_args("frozenset", self.to_nodes(set)?),
            Value::Bytes(bytes) => builtins::bytes_node(bytes),
            Value::Path(path) => builtins::path_node(path)?,
            Value::Array(array) => builtins::ndarray_node(self, array)?,
            Value::Frame(frame) => builtins::frame_node(self, frame)?,
            Value::Series(series) => builtins::series_node(self, series)?,
            Value::Generator(items) => builtins::generator_node(self.to_nodes(items)?),
            Value::Class(class) => self.class_node(class)?,
            Value::Function(function) => self.function_node(function, true)?,
            Value::Instance(instance) => self.instance_node(value, instance)?,
            Value::Opaque(opaque) => objects::opaque_node(opaque),
        };
        Ok(node)
    }

    pub(crate) fn to_nodes<'a, I>(&self, items: I) -> Result<Vec<Node>>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        items.into_iter().map(|item| self.to_node(item)).collect()
    }

    pub(crate) fn to_node_map(&self, map: &BTreeMap<String, Value>) -> Result<NodeMap> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.to_node(value)?)))
            .collect()
    }

    fn dict_node(&self, map: &BTreeMap<String, Value>) -> Result<Node> {
        if map.keys().any(|key| nodes::is_reserved(key)) {
            let items = map
                .iter()
                .map(|(key, value)| {
                    Ok(Node::Array(vec![Node::String(key.clone()), self.to_node(value)?]))
                })
                .collect::<Result<Vec<_>>>()?;
            let mut node = nodes::tagged("dict");
            node.insert(nodes::DICTITEMS.to_string(), Node::Array(items));
            return Ok(Node::Object(node));
        }
        Ok(Node::Object(self.to_node_map(map)?))
    }

    /// Convert a node back to a value
    pub fn from_node(&self, node: &Node) -> Result<Value> {
        let value = match node {
            Node::Null => Value::None,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| {
                    Error::deserialization("number", format!("{n} is not representable"))
                })?),
            },
            Node::String(s) => Value::Str(s.clone()),
            Node::Array(items) => Value::List(self.from_nodes(items)?),
            Node::Object(map) => match map.get(nodes::PY) {
                None => Value::Dict(self.from_node_map(map)?),
                Some(Node::String(address)) => self.from_tagged(address, map)?,
                Some(other) => {
                    return Err(Error::deserialization(
                        other.to_string(),
                        "'__py__' must be a string address",
                    ))
                }
            },
        };
        Ok(value)
    }

    pub(crate) fn from_nodes(&self, items: &[Node]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.from_node(item)).collect()
    }

    pub(crate) fn from_node_map(&self, map: &NodeMap) -> Result<BTreeMap<String, Value>> {
        map.iter()
            .map(|(key, node)| Ok((key.clone(), self.from_node(node)?)))
            .collect()
    }

    fn from_tagged(&self, address: &str, map: &NodeMap) -> Result<Value> {
        if let Some(decode) = builtins::decoder(address) {
            return decode(self, map);
        }
        if let Some(codec) = self.registry.codec(address) {
            return codec.decode(map, self);
        }
        if map.contains_key(nodes::STATE) || map.contains_key(nodes::CLASS) {
            return self.instance_from_node(address, map);
        }
        if map.contains_key(nodes::NAME) {
            return self.class_from_node(address, map);
        }
        if map.contains_key(nodes::SRC) || map.contains_key(nodes::CLOSURE) {
            return Ok(Value::Function(objects::function_from_node(self, address, map)?));
        }
        Ok(self.reference_from_node(address, map))
    }

    /// Placeholder for a node that cannot be reconstructed
    pub(crate) fn opaque(&self, address: &str, map: &NodeMap) -> Value {
        tracing::warn!(
            address,
            "type is not registered, returning an opaque placeholder"
        );
        Value::Opaque(Opaque {
            address: address.to_string(),
            repr: Node::Object(map.clone()).to_string(),
        })
    }
}

impl Serializer for StructuralSerializer {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn serialize(&self, value: &Value) -> Result<Node> {
        self.to_node(value)
    }

    fn deserialize(&self, node: &Node) -> Result<Value> {
        self.from_node(node)
    }
}
