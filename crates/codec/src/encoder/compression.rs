//! Compression codecs for byte frames
//!
//! `blosc` is a blosc-style codec rather than c-blosc: an 8-byte shuffle
//! followed by zstd, with no blosc header. Its frames are not readable by
//! c-blosc and c-blosc frames are not readable here.

use serde::{Deserialize, Serialize};
use stash_core::{Error, Result};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Default zstd level for the blosc codec
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Element width used by the blosc byte shuffle
const SHUFFLE_TYPESIZE: usize = 8;

/// Compression codec applied to serialized frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Raw,
    Zlib,
    Lz4,
    Gzip,
    Bzip2,
    /// Byte shuffle plus zstd, not c-blosc compatible
    Blosc,
}

impl Compression {
    pub const ALL: [Compression; 6] = [
        Compression::Raw,
        Compression::Zlib,
        Compression::Lz4,
        Compression::Gzip,
        Compression::Bzip2,
        Compression::Blosc,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Raw => "raw",
            Compression::Zlib => "zlib",
            Compression::Lz4 => "lz4",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Blosc => "blosc",
        }
    }

    /// Compress `data`; `level` is clamped to the codec's range
    pub fn compress(&self, data: &[u8], level: Option<u32>) -> Result<Vec<u8>> {
        let fail = |e| Error::compression(self.as_str(), "compress", e);
        match self {
            Compression::Raw => Ok(data.to_vec()),
            Compression::Zlib => {
                let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate_level(level));
                encoder.write_all(data).map_err(fail)?;
                encoder.finish().map_err(fail)
            }
            Compression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate_level(level));
                encoder.write_all(data).map_err(fail)?;
                encoder.finish().map_err(fail)
            }
            Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Compression::Bzip2 => {
                let level = bzip2::Compression::new(level.unwrap_or(9).clamp(1, 9));
                let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), level);
                encoder.write_all(data).map_err(fail)?;
                encoder.finish().map_err(fail)
            }
            Compression::Blosc => {
                let level = level.map_or(DEFAULT_ZSTD_LEVEL, |l| l.clamp(1, 22) as i32);
                zstd::stream::encode_all(shuffle(data, SHUFFLE_TYPESIZE).as_slice(), level)
                    .map_err(fail)
            }
        }
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let fail = |e| Error::compression(self.as_str(), "decompress", e);
        let mut out = Vec::new();
        match self {
            Compression::Raw => return Ok(data.to_vec()),
            Compression::Zlib => {
                flate2::read::ZlibDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(fail)?;
            }
            Compression::Gzip => {
                flate2::read::GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(fail)?;
            }
            Compression::Lz4 => {
                out = lz4_flex::decompress_size_prepended(data)
                    .map_err(|e| fail(io::Error::new(io::ErrorKind::InvalidData, e)))?;
            }
            Compression::Bzip2 => {
                bzip2::read::BzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(fail)?;
            }
            Compression::Blosc => {
                let shuffled = zstd::stream::decode_all(data).map_err(fail)?;
                out = unshuffle(&shuffled, SHUFFLE_TYPESIZE);
            }
        }
        Ok(out)
    }
}

fn flate_level(level: Option<u32>) -> flate2::Compression {
    level.map_or_else(flate2::Compression::default, |l| {
        flate2::Compression::new(l.min(9))
    })
}

/// Group byte `i` of every element together; trailing bytes stay in place
fn shuffle(data: &[u8], typesize: usize) -> Vec<u8> {
    let elements = data.len() / typesize;
    let body = elements * typesize;
    let mut out = Vec::with_capacity(data.len());
    for byte in 0..typesize {
        out.extend((0..elements).map(|element| data[element * typesize + byte]));
    }
    out.extend_from_slice(&data[body..]);
    out
}

fn unshuffle(data: &[u8], typesize: usize) -> Vec<u8> {
    let elements = data.len() / typesize;
    let body = elements * typesize;
    let mut out = vec![0u8; data.len()];
    for byte in 0..typesize {
        for element in 0..elements {
            out[element * typesize + byte] = data[byte * elements + element];
        }
    }
    out[body..].copy_from_slice(&data[body..]);
    out
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" | "none" => Ok(Compression::Raw),
            "zlib" => Ok(Compression::Zlib),
            "lz4" => Ok(Compression::Lz4),
            "gzip" => Ok(Compression::Gzip),
            "bzip2" => Ok(Compression::Bzip2),
            "blosc" => Ok(Compression::Blosc),
            _ => Err(Error::configuration(format!(
                "unknown compression '{s}', expected one of: raw, zlib, lz4, gzip, bzip2, blosc"
            ))),
        }
    }
}
