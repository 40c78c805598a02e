//! Byte framing: `b64?(compress?(canonical_json(node)))`
//!
//! The JSON is compact with object keys in sorted order regardless of how the
//! node map was built, so equal nodes always produce equal frames.

mod compression;

pub use compression::{Compression, DEFAULT_ZSTD_LEVEL};

use crate::structural::Node;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use stash_core::{Error, Result};

/// Render a node as compact JSON with sorted object keys
#[must_use]
pub fn canonical_json(node: &Node) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(node, &mut out);
    out
}

fn write_canonical(node: &Node, out: &mut Vec<u8>) {
    match node {
        Node::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Node::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Node::String(key.clone()), out);
                out.push(b':');
                write_canonical(value, out);
            }
            out.push(b'}');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(node: &Node, out: &mut Vec<u8>) {
    // Scalars render through serde_json's own formatter, which cannot fail
    // when writing into memory
    let rendered = node.to_string();
    out.extend_from_slice(rendered.as_bytes());
}

/// Frames nodes for storage and recovers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Encoder {
    compression: Compression,
    level: Option<u32>,
    b64: bool,
}

impl Encoder {
    #[must_use]
    pub fn new(compression: Compression, b64: bool) -> Self {
        Self {
            compression,
            level: None,
            b64,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<u32>) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn b64(&self) -> bool {
        self.b64
    }

    /// Frame raw bytes: compress, then base64
    pub fn encode_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let compressed = self.compression.compress(bytes, self.level)?;
        if self.b64 {
            Ok(STANDARD.encode(compressed).into_bytes())
        } else {
            Ok(compressed)
        }
    }

    /// Inverse of [`Encoder::encode_bytes`]
    pub fn decode_bytes(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let compressed = if self.b64 {
            STANDARD
                .decode(frame)
                .map_err(|e| Error::encoding(format!("invalid base64 frame: {e}")))?
        } else {
            frame.to_vec()
        };
        self.compression.decompress(&compressed)
    }

    pub fn encode(&self, node: &Node) -> Result<Vec<u8>> {
        self.encode_bytes(&canonical_json(node))
    }

    pub fn decode(&self, frame: &[u8]) -> Result<Node> {
        Ok(serde_json::from_slice(&self.decode_bytes(frame)?)?)
    }

    /// Encode to a string; requires base64 so the frame is printable
    pub fn encode_str(&self, node: &Node) -> Result<String> {
        if !self.b64 {
            return Err(Error::configuration(
                "string frames require b64 encoding to be enabled",
            ));
        }
        String::from_utf8(self.encode(node)?)
            .map_err(|e| Error::encoding(format!("frame is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys_without_whitespace() {
        let node = json!({"b": [1, {"z": null, "a": "x"}], "a": 1.5});
        assert_eq!(
            canonical_json(&node),
            br#"{"a":1.5,"b":[1,{"a":"x","z":null}]}"#.to_vec()
        );
    }

    #[test]
    fn test_every_codec_with_and_without_b64() {
        let node = json!({"a": 1, "b": [true, null, "x"], "u": "ünïcode"});
        for compression in Compression::ALL {
            for b64 in [true, false] {
                let encoder = Encoder::new(compression, b64);
                let frame = encoder.encode(&node).unwrap();
                if b64 {
                    assert!(frame.is_ascii(), "{compression}");
                }
                assert_eq!(encoder.decode(&frame).unwrap(), node, "{compression} b64={b64}");
            }
        }
    }

    #[test]
    fn test_raw_frame_is_the_json() {
        let encoder = Encoder::new(Compression::Raw, false);
        assert_eq!(encoder.encode(&json!("k")).unwrap(), b"\"k\"".to_vec());
    }

    #[test]
    fn test_string_frames_need_b64() {
        let encoder = Encoder::new(Compression::Zlib, false);
        assert!(encoder.encode_str(&json!(1)).is_err());
        let encoder = Encoder::new(Compression::Zlib, true);
        assert!(encoder.encode_str(&json!(1)).is_ok());
    }

    #[test]
    fn test_bad_base64_is_an_encoding_error() {
        let encoder = Encoder::new(Compression::Raw, true);
        assert!(matches!(
            encoder.decode(b"%%%"),
            Err(Error::Encoding { .. })
        ));
    }
}
