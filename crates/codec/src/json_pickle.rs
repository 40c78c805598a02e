//! Serializer over serde's own JSON representation of [`Value`]
//!
//! Variants are externally tagged (`{"Int": 1}`), so the node is generic JSON
//! rather than the `__py__` format. Non-finite floats have no JSON form and
//! fail to deserialize.

use crate::serializer::Serializer;
use crate::structural::Node;
use serde::Deserialize as _;
use stash_core::{Error, Result, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPickleSerializer;

impl Serializer for JsonPickleSerializer {
    fn name(&self) -> &'static str {
        "json-pickle"
    }

    fn serialize(&self, value: &Value) -> Result<Node> {
        serde_json::to_value(value).map_err(|e| Error::serialization(value.type_name(), e.to_string()))
    }

    fn deserialize(&self, node: &Node) -> Result<Value> {
        Value::deserialize(node).map_err(|e| Error::deserialization("json-pickle", e.to_string()))
    }
}
