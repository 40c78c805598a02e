//! Reserved node keys and field accessors

use stash_core::{Error, Result};

/// A JSON-compatible serialized node
pub type Node = serde_json::Value;

/// Object form of a node
pub type NodeMap = serde_json::Map<String, Node>;

/// Every reserved key starts with this prefix
pub const RESERVED_PREFIX: &str = "__py";

pub const PY: &str = "__py__";
pub const ARGS: &str = "__py_args__";
pub const KWARGS: &str = "__py_kwargs__";
pub const STATE: &str = "__py_state__";
pub const SRC: &str = "__py_src__";
pub const BASES: &str = "__py_bases__";
pub const CLOSURE: &str = "__py_closure__";
pub const CLASS: &str = "__py_class__";
pub const NAME: &str = "__py_name__";
pub const MODULE: &str = "__py_module__";
pub const QUALNAME: &str = "__py_qualname__";
pub const DATA: &str = "__py_data__";
pub const DICT: &str = "__py_dict__";
pub const METHODS: &str = "__py_methods__";
pub const LISTITEMS: &str = "__py_listitems__";
pub const DICTITEMS: &str = "__py_dictitems__";
pub const GENERATOR_STATE: &str = "__py_generator_state__";

/// A node map holding only the `__py__` tag
pub(crate) fn tagged(address: impl Into<String>) -> NodeMap {
    let mut map = NodeMap::new();
    map.insert(PY.to_string(), Node::String(address.into()));
    map
}

/// A tagged node with positional arguments
pub(crate) fn with_args(address: &str, args: Vec<Node>) -> Node {
    let mut map = tagged(address);
    map.insert(ARGS.to_string(), Node::Array(args));
    Node::Object(map)
}

/// A tagged node with a data payload
pub(crate) fn with_data(address: &str, data: NodeMap) -> Node {
    let mut map = tagged(address);
    map.insert(DATA.to_string(), Node::Object(data));
    Node::Object(map)
}

pub(crate) fn field<'a>(map: &'a NodeMap, address: &str, key: &str) -> Result<&'a Node> {
    map.get(key).ok_or_else(|| Error::missing_field(address, key))
}

pub(crate) fn str_field<'a>(map: &'a NodeMap, address: &str, key: &str) -> Result<&'a str> {
    field(map, address, key)?
        .as_str()
        .ok_or_else(|| Error::deserialization(address, format!("'{key}' must be a string")))
}

pub(crate) fn array_field<'a>(map: &'a NodeMap, address: &str, key: &str) -> Result<&'a [Node]> {
    field(map, address, key)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::deserialization(address, format!("'{key}' must be an array")))
}

pub(crate) fn object_field<'a>(map: &'a NodeMap, address: &str, key: &str) -> Result<&'a NodeMap> {
    field(map, address, key)?
        .as_object()
        .ok_or_else(|| Error::deserialization(address, format!("'{key}' must be an object")))
}

/// `__py_args__` holding exactly one string
pub(crate) fn single_str_arg<'a>(map: &'a NodeMap, address: &str) -> Result<&'a str> {
    match array_field(map, address, ARGS)? {
        [Node::String(arg)] => Ok(arg),
        other => Err(Error::deserialization(
            address,
            format!("expected one string argument, got {}", other.len()),
        )),
    }
}

/// The string items of an array node
pub(crate) fn strings(nodes: &[Node], address: &str, what: &str) -> Result<Vec<String>> {
    nodes
        .iter()
        .map(|node| {
            node.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::deserialization(address, format!("{what} must be strings")))
        })
        .collect()
}

/// Whether a mapping key would be mistaken for node metadata
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_field_is_a_deserialization_error() {
        let node = json!({"__py__": "tuple"});
        let map = node.as_object().unwrap();
        let err = array_field(map, "tuple", ARGS).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
        assert!(err.to_string().contains("__py_args__"));
    }

    #[test]
    fn test_reserved_prefix() {
        assert!(is_reserved("__py__"));
        assert!(is_reserved("__python"));
        assert!(!is_reserved("_py"));
    }
}
