//! Serializer plug-in interface and selector

use crate::binary::BinarySerializer;
use crate::json_pickle::JsonPickleSerializer;
use crate::registry::TypeRegistry;
use crate::structural::{Node, SchemaMode, StructuralSerializer};
use serde::{Deserialize, Serialize};
use stash_core::{Error, Result, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Converts values to JSON-shaped nodes and back
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Option string this serializer is selected by
    fn name(&self) -> &'static str;

    fn serialize(&self, value: &Value) -> Result<Node>;

    fn deserialize(&self, node: &Node) -> Result<Value>;
}

/// Serializer selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SerializerKind {
    #[default]
    Structural,
    Binary,
    JsonPickle,
}

impl SerializerKind {
    pub const ALL: [SerializerKind; 3] = [
        SerializerKind::Structural,
        SerializerKind::Binary,
        SerializerKind::JsonPickle,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Structural => "structural",
            SerializerKind::Binary => "binary",
            SerializerKind::JsonPickle => "json-pickle",
        }
    }

    /// Instantiate the selected serializer
    #[must_use]
    pub fn build(&self, registry: Arc<TypeRegistry>, schema: SchemaMode) -> Arc<dyn Serializer> {
        match self {
            SerializerKind::Structural => Arc::new(StructuralSerializer::new(registry, schema)),
            SerializerKind::Binary => Arc::new(BinarySerializer),
            SerializerKind::JsonPickle => Arc::new(JsonPickleSerializer),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "structural" => Ok(SerializerKind::Structural),
            "binary" => Ok(SerializerKind::Binary),
            "json-pickle" | "json_pickle" | "jsonpickle" => Ok(SerializerKind::JsonPickle),
            _ => Err(Error::configuration(format!(
                "unknown serializer '{s}', expected one of: structural, binary, json-pickle"
            ))),
        }
    }
}

/// Serializer factory
pub fn create_serializer(
    name: &str,
    registry: Arc<TypeRegistry>,
    schema: SchemaMode,
) -> Result<Arc<dyn Serializer>> {
    Ok(name.parse::<SerializerKind>()?.build(registry, schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_routes_by_name() {
        for kind in SerializerKind::ALL {
            let serializer =
                create_serializer(kind.as_str(), TypeRegistry::shared(), SchemaMode::Required)
                    .unwrap();
            assert_eq!(serializer.name(), kind.as_str());
        }
    }

    #[test]
    fn test_unknown_serializer_is_a_configuration_error() {
        let err = create_serializer("pickle", TypeRegistry::shared(), SchemaMode::Required)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_option_strings_round_trip() {
        for kind in SerializerKind::ALL {
            assert_eq!(kind.to_string().parse::<SerializerKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_string(&SerializerKind::JsonPickle).unwrap(),
            "\"json-pickle\""
        );
    }
}
