//! Numeric n-d arrays backed by `ndarray`.
//!
//! Plain dtypes convert to and from little-endian raw bytes in logical
//! (row-major) order; `object` arrays hold nested values.

use super::Value;
use crate::errors::{Error, Result};
use ndarray::{Array, Array1, ArrayD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Object,
}

impl DType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Object => "object",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let dtype = match name {
            "bool" => DType::Bool,
            "int8" => DType::Int8,
            "int16" => DType::Int16,
            "int32" => DType::Int32,
            "int64" => DType::Int64,
            "uint8" => DType::UInt8,
            "uint16" => DType::UInt16,
            "uint32" => DType::UInt32,
            "uint64" => DType::UInt64,
            "float32" => DType::Float32,
            "float64" => DType::Float64,
            "object" => DType::Object,
            _ => return None,
        };
        Some(dtype)
    }

    /// Bytes per element, `None` for object arrays
    #[must_use]
    pub fn itemsize(&self) -> Option<usize> {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => Some(1),
            DType::Int16 | DType::UInt16 => Some(2),
            DType::Int32 | DType::UInt32 | DType::Float32 => Some(4),
            DType::Int64 | DType::UInt64 | DType::Float64 => Some(8),
            DType::Object => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically-shaped array of one dtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NdArray {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Object(ArrayD<Value>),
}

fn encode_le<T: Copy, const N: usize>(array: &ArrayD<T>, to_bytes: fn(T) -> [u8; N]) -> Vec<u8> {
    let mut out = Vec::with_capacity(array.len() * N);
    for item in array.iter() {
        out.extend_from_slice(&to_bytes(*item));
    }
    out
}

fn decode_le<T, const N: usize>(
    shape: &[usize],
    bytes: &[u8],
    from_bytes: fn([u8; N]) -> T,
) -> Result<ArrayD<T>> {
    if bytes.len() % N != 0 {
        return Err(Error::deserialization(
            "ndarray",
            format!("{} bytes is not a multiple of itemsize {N}", bytes.len()),
        ));
    }
    let items = bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_bytes(buf)
        })
        .collect();
    shaped(shape, items)
}

fn shaped<T>(shape: &[usize], items: Vec<T>) -> Result<ArrayD<T>> {
    let count = items.len();
    ArrayD::from_shape_vec(IxDyn(shape), items).map_err(|e| {
        Error::deserialization(
            "ndarray",
            format!("{count} elements do not fit shape {shape:?}: {e}"),
        )
    })
}

impl NdArray {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            NdArray::Bool(_) => DType::Bool,
            NdArray::Int8(_) => DType::Int8,
            NdArray::Int16(_) => DType::Int16,
            NdArray::Int32(_) => DType::Int32,
            NdArray::Int64(_) => DType::Int64,
            NdArray::UInt8(_) => DType::UInt8,
            NdArray::UInt16(_) => DType::UInt16,
            NdArray::UInt32(_) => DType::UInt32,
            NdArray::UInt64(_) => DType::UInt64,
            NdArray::Float32(_) => DType::Float32,
            NdArray::Float64(_) => DType::Float64,
            NdArray::Object(_) => DType::Object,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::Bool(a) => a.shape(),
            NdArray::Int8(a) => a.shape(),
            NdArray::Int16(a) => a.shape(),
            NdArray::Int32(a) => a.shape(),
            NdArray::Int64(a) => a.shape(),
            NdArray::UInt8(a) => a.shape(),
            NdArray::UInt16(a) => a.shape(),
            NdArray::UInt32(a) => a.shape(),
            NdArray::UInt64(a) => a.shape(),
            NdArray::Float32(a) => a.shape(),
            NdArray::Float64(a) => a.shape(),
            NdArray::Object(a) => a.shape(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Raw little-endian element bytes; `None` for object arrays
    #[must_use]
    pub fn to_le_bytes(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            NdArray::Bool(a) => encode_le(a, |b: bool| [u8::from(b)]),
            NdArray::Int8(a) => encode_le(a, i8::to_le_bytes),
            NdArray::Int16(a) => encode_le(a, i16::to_le_bytes),
            NdArray::Int32(a) => encode_le(a, i32::to_le_bytes),
            NdArray::Int64(a) => encode_le(a, i64::to_le_bytes),
            NdArray::UInt8(a) => encode_le(a, u8::to_le_bytes),
            NdArray::UInt16(a) => encode_le(a, u16::to_le_bytes),
            NdArray::UInt32(a) => encode_le(a, u32::to_le_bytes),
            NdArray::UInt64(a) => encode_le(a, u64::to_le_bytes),
            NdArray::Float32(a) => encode_le(a, f32::to_le_bytes),
            NdArray::Float64(a) => encode_le(a, f64::to_le_bytes),
            NdArray::Object(_) => return None,
        };
        Some(bytes)
    }

    /// Rebuild a plain-dtype array from raw little-endian bytes
    pub fn from_le_bytes(dtype: DType, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        let array = match dtype {
            DType::Bool => NdArray::Bool(decode_le(shape, bytes, |b: [u8; 1]| b[0] != 0)?),
            DType::Int8 => NdArray::Int8(decode_le(shape, bytes, i8::from_le_bytes)?),
            DType::Int16 => NdArray::Int16(decode_le(shape, bytes, i16::from_le_bytes)?),
            DType::Int32 => NdArray::Int32(decode_le(shape, bytes, i32::from_le_bytes)?),
            DType::Int64 => NdArray::Int64(decode_le(shape, bytes, i64::from_le_bytes)?),
            DType::UInt8 => NdArray::UInt8(decode_le(shape, bytes, u8::from_le_bytes)?),
            DType::UInt16 => NdArray::UInt16(decode_le(shape, bytes, u16::from_le_bytes)?),
            DType::UInt32 => NdArray::UInt32(decode_le(shape, bytes, u32::from_le_bytes)?),
            DType::UInt64 => NdArray::UInt64(decode_le(shape, bytes, u64::from_le_bytes)?),
            DType::Float32 => NdArray::Float32(decode_le(shape, bytes, f32::from_le_bytes)?),
            DType::Float64 => NdArray::Float64(decode_le(shape, bytes, f64::from_le_bytes)?),
            DType::Object => {
                return Err(Error::deserialization(
                    "ndarray",
                    "object arrays carry element values, not raw bytes",
                ))
            }
        };
        Ok(array)
    }

    /// Build an object array from values in row-major order
    pub fn from_values(shape: &[usize], values: Vec<Value>) -> Result<Self> {
        Ok(NdArray::Object(shaped(shape, values)?))
    }

    /// Elements of an object array in row-major order
    #[must_use]
    pub fn values(&self) -> Option<Vec<Value>> {
        match self {
            NdArray::Object(a) => Some(a.iter().cloned().collect()),
            _ => None,
        }
    }

    /// Elements as floats, for numeric dtypes
    #[must_use]
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let values = match self {
            NdArray::Bool(a) => a.iter().map(|b| f64::from(u8::from(*b))).collect(),
            NdArray::Int8(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::Int16(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::Int32(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::Int64(a) => a.iter().map(|v| *v as f64).collect(),
            NdArray::UInt8(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::UInt16(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::UInt32(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::UInt64(a) => a.iter().map(|v| *v as f64).collect(),
            NdArray::Float32(a) => a.iter().map(|v| f64::from(*v)).collect(),
            NdArray::Float64(a) => a.iter().copied().collect(),
            NdArray::Object(_) => return None,
        };
        Some(values)
    }

    /// Object array of strings, the representation used for labels
    #[must_use]
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = labels.into_iter().map(|s| Value::Str(s.into())).collect();
        NdArray::Object(Array1::from_vec(values).into_dyn())
    }
}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<D: Dimension> From<Array<$ty, D>> for NdArray {
                fn from(array: Array<$ty, D>) -> Self {
                    NdArray::$variant(array.into_dyn())
                }
            }
        )*
    };
}

impl_from_array! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Value => Object,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_le_bytes_round_trip() {
        let original = NdArray::from(array![[1.5f64, -2.0], [0.25, 8.0]]);
        let bytes = original.to_le_bytes().unwrap();
        assert_eq!(bytes.len(), 4 * 8);

        let restored = NdArray::from_le_bytes(DType::Float64, &[2, 2], &bytes).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.shape(), &[2, 2]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let bytes = NdArray::from(array![1i32, 2, 3]).to_le_bytes().unwrap();
        assert!(NdArray::from_le_bytes(DType::Int32, &[2, 2], &bytes).is_err());
        assert!(NdArray::from_le_bytes(DType::Int64, &[3], &bytes[..5]).is_err());
    }

    #[test]
    fn test_object_arrays_have_no_raw_bytes() {
        let labels = NdArray::labels(["a", "b"]);
        assert_eq!(labels.dtype(), DType::Object);
        assert!(labels.to_le_bytes().is_none());
        assert_eq!(labels.values().unwrap(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_dtype_names_round_trip() {
        for dtype in [DType::Bool, DType::UInt16, DType::Float32, DType::Object] {
            assert_eq!(DType::parse(dtype.as_str()), Some(dtype));
        }
        assert_eq!(DType::parse("complex128"), None);
    }
}
