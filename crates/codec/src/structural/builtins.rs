//! Built-in codecs for containers, scalars without a JSON form, arrays and
//! frames

use super::nodes::{self, Node, NodeMap};
use super::StructuralSerializer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use stash_core::{DType, DataFrame, Error, NdArray, Result, Series, Value};
use std::path::{Path, PathBuf};

type Decoder = fn(&StructuralSerializer, &NodeMap) -> Result<Value>;

pub(crate) const FRAME: &str = "frame.DataFrame";
pub(crate) const SERIES: &str = "frame.Series";

/// Decoder for a built-in address
pub(super) fn decoder(address: &str) -> Option<Decoder> {
    let decode: Decoder = match address {
        "tuple" => |s, map| Ok(Value::Tuple(args(s, map, "tuple")?)),
        "set" => |s, map| Ok(Value::Set(args(s, map, "set")?.into())),
        "frozenset" => |s, map| Ok(Value::FrozenSet(args(s, map, "frozenset")?.into())),
        "bytes" => decode_bytes,
        "path" => |_, map| Ok(Value::Path(PathBuf::from(nodes::single_str_arg(map, "path")?))),
        "float" => decode_float,
        "dict" => decode_dict,
        "generator" => |s, map| {
            let items = nodes::array_field(map, "generator", nodes::GENERATOR_STATE)?;
            Ok(Value::Generator(s.from_nodes(items)?))
        },
        "ndarray" => |s, map| {
            let data = nodes::object_field(map, "ndarray", nodes::DATA)?;
            Ok(Value::Array(ndarray_from_data(s, data)?))
        },
        FRAME => decode_frame,
        SERIES => decode_series,
        _ => return None,
    };
    Some(decode)
}

fn args(serializer: &StructuralSerializer, map: &NodeMap, address: &str) -> Result<Vec<Value>> {
    serializer.from_nodes(nodes::array_field(map, address, nodes::ARGS)?)
}

pub(super) fn float_node(value: f64) -> Node {
    let repr = if value.is_nan() {
        "nan"
    } else if value.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    };
    nodes::with_args("float", vec![Node::String(repr.to_string())])
}

fn decode_float(_: &StructuralSerializer, map: &NodeMap) -> Result<Value> {
    let value = match nodes::single_str_arg(map, "float")? {
        "nan" => f64::NAN,
        "inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse().map_err(|_| {
            Error::deserialization("float", format!("'{other}' is not a float"))
        })?,
    };
    Ok(Value::Float(value))
}

pub(super) fn bytes_node(bytes: &[u8]) -> Node {
    nodes::with_args("bytes", vec![Node::String(STANDARD.encode(bytes))])
}

fn decode_bytes(_: &StructuralSerializer, map: &NodeMap) -> Result<Value> {
    let encoded = nodes::single_str_arg(map, "bytes")?;
    STANDARD
        .decode(encoded)
        .map(Value::Bytes)
        .map_err(|e| Error::deserialization("bytes", e.to_string()))
}

pub(super) fn path_node(path: &Path) -> Result<Node> {
    let text = path
        .to_str()
        .ok_or_else(|| Error::serialization("path", format!("{} is not UTF-8", path.display())))?;
    Ok(nodes::with_args("path", vec![Node::String(text.to_string())]))
}

fn decode_dict(serializer: &StructuralSerializer, map: &NodeMap) -> Result<Value> {
    let items = nodes::array_field(map, "dict", nodes::DICTITEMS)?;
    let mut dict = std::collections::BTreeMap::new();
    for item in items {
        match item.as_array().map(Vec::as_slice) {
            Some([Node::String(key), value]) => {
                dict.insert(key.clone(), serializer.from_node(value)?);
            }
            _ => {
                return Err(Error::deserialization(
                    "dict",
                    "items must be [string key, value] pairs",
                ))
            }
        }
    }
    Ok(Value::Dict(dict))
}

pub(super) fn generator_node(items: Vec<Node>) -> Node {
    let mut map = nodes::tagged("generator");
    map.insert(nodes::GENERATOR_STATE.to_string(), Node::Array(items));
    Node::Object(map)
}

fn ndarray_data(serializer: &StructuralSerializer, array: &NdArray) -> Result<NodeMap> {
    let mut data = NodeMap::new();
    data.insert("dtype".into(), Node::String(array.dtype().as_str().into()));
    data.insert(
        "shape".into(),
        Node::Array(array.shape().iter().map(|&d| Node::from(d as u64)).collect()),
    );
    match array.to_le_bytes() {
        Some(bytes) => {
            data.insert("bytes".into(), Node::String(STANDARD.encode(bytes)));
        }
        None => {
            let values = array.values().unwrap_or_default();
            data.insert("values".into(), Node::Array(serializer.to_nodes(&values)?));
        }
    }
    Ok(data)
}

pub(super) fn ndarray_node(serializer: &StructuralSerializer, array: &NdArray) -> Result<Node> {
    Ok(nodes::with_data("ndarray", ndarray_data(serializer, array)?))
}

fn ndarray_from_data(serializer: &StructuralSerializer, data: &NodeMap) -> Result<NdArray> {
    let dtype_name = nodes::str_field(data, "ndarray", "dtype")?;
    let dtype = DType::parse(dtype_name)
        .ok_or_else(|| Error::deserialization("ndarray", format!("unknown dtype '{dtype_name}'")))?;
    let shape = nodes::array_field(data, "ndarray", "shape")?
        .iter()
        .map(|dim| {
            dim.as_u64()
                .map(|d| d as usize)
                .ok_or_else(|| Error::deserialization("ndarray", "shape must hold integers"))
        })
        .collect::<Result<Vec<_>>>()?;

    if dtype == DType::Object {
        let values = serializer.from_nodes(nodes::array_field(data, "ndarray", "values")?)?;
        return NdArray::from_values(&shape, values);
    }
    let bytes = STANDARD
        .decode(nodes::str_field(data, "ndarray", "bytes")?)
        .map_err(|e| Error::deserialization("ndarray", e.to_string()))?;
    NdArray::from_le_bytes(dtype, &shape, &bytes)
}

/// Decode a nested array node
fn nested_array(serializer: &StructuralSerializer, data: &NodeMap, address: &str, key: &str) -> Result<NdArray> {
    match serializer.from_node(nodes::field(data, address, key)?)? {
        Value::Array(array) => Ok(array),
        other => Err(Error::deserialization(
            address,
            format!("'{key}' must be an ndarray, got {}", other.type_name()),
        )),
    }
}

fn labels(array: &NdArray, address: &str) -> Result<Vec<String>> {
    array
        .values()
        .unwrap_or_default()
        .into_iter()
        .map(|label| match label {
            Value::Str(s) => Ok(s),
            other => Err(Error::deserialization(
                address,
                format!("labels must be strings, got {}", other.type_name()),
            )),
        })
        .collect()
}

pub(super) fn frame_node(serializer: &StructuralSerializer, frame: &DataFrame) -> Result<Node> {
    let mut data = NodeMap::new();
    data.insert("values".into(), ndarray_node(serializer, frame.values())?);
    data.insert(
        "columns".into(),
        ndarray_node(serializer, &NdArray::labels(frame.columns().iter().cloned()))?,
    );
    data.insert(
        "index_columns".into(),
        Node::Array(frame.index_columns().iter().cloned().map(Node::String).collect()),
    );
    data.insert(
        "dtypes".into(),
        Node::Object(
            frame
                .dtypes()
                .iter()
                .map(|(column, dtype)| (column.clone(), Node::String(dtype.clone())))
                .collect(),
        ),
    );
    Ok(nodes::with_data(FRAME, data))
}

fn decode_frame(serializer: &StructuralSerializer, map: &NodeMap) -> Result<Value> {
    let data = nodes::object_field(map, FRAME, nodes::DATA)?;
    let values = nested_array(serializer, data, FRAME, "values")?;
    let columns = labels(&nested_array(serializer, data, FRAME, "columns")?, FRAME)?;
    let index_columns = nodes::strings(
        nodes::array_field(data, FRAME, "index_columns")?,
        FRAME,
        "index columns",
    )?;
    let dtypes = nodes::object_field(data, FRAME, "dtypes")?
        .iter()
        .map(|(column, dtype)| {
            dtype
                .as_str()
                .map(|d| (column.clone(), d.to_string()))
                .ok_or_else(|| Error::deserialization(FRAME, "dtypes must be strings"))
        })
        .collect::<Result<_>>()?;
    Ok(Value::Frame(DataFrame::from_parts(
        columns,
        index_columns,
        values,
        dtypes,
    )?))
}

pub(super) fn series_node(serializer: &StructuralSerializer, series: &Series) -> Result<Node> {
    let mut data = NodeMap::new();
    data.insert("values".into(), ndarray_node(serializer, series.values())?);
    data.insert("index".into(), ndarray_node(serializer, series.index())?);
    data.insert(
        "name".into(),
        series.name().map_or(Node::Null, |name| Node::String(name.to_string())),
    );
    Ok(nodes::with_data(SERIES, data))
}

fn decode_series(serializer: &StructuralSerializer, map: &NodeMap) -> Result<Value> {
    let data = nodes::object_field(map, SERIES, nodes::DATA)?;
    let values = nested_array(serializer, data, SERIES, "values")?;
    let index = nested_array(serializer, data, SERIES, "index")?;
    let series = Series::new(values, index)?;
    let series = match data.get("name") {
        Some(Node::String(name)) => series.with_name(name.clone()),
        None | Some(Node::Null) => series,
        Some(_) => return Err(Error::deserialization(SERIES, "'name' must be a string")),
    };
    Ok(Value::Series(series))
}
