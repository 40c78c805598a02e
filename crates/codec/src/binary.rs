//! Opaque binary serializer
//!
//! The value's native bincode encoding, base64-wrapped in a single leaf node.
//! Any value the structural serializer can hold round-trips, including
//! unregistered instances; the bytes are not meant to be portable across
//! versions of the value model.

use crate::serializer::Serializer;
use crate::structural::nodes::{self, Node};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use stash_core::{Error, Result, Value};

pub const ADDRESS: &str = "bincode";

#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn serialize(&self, value: &Value) -> Result<Node> {
        let bytes = bincode::serialize(value)
            .map_err(|e| Error::serialization(value.type_name(), e.to_string()))?;
        Ok(nodes::with_args(ADDRESS, vec![Node::String(STANDARD.encode(bytes))]))
    }

    fn deserialize(&self, node: &Node) -> Result<Value> {
        let map = node
            .as_object()
            .ok_or_else(|| Error::deserialization(ADDRESS, "expected a tagged node"))?;
        let address = nodes::str_field(map, ADDRESS, nodes::PY)?;
        if address != ADDRESS {
            return Err(Error::type_mismatch(ADDRESS, address));
        }
        let bytes = STANDARD
            .decode(nodes::single_str_arg(map, ADDRESS)?)
            .map_err(|e| Error::deserialization(ADDRESS, e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| Error::deserialization(ADDRESS, e.to_string()))
    }
}
