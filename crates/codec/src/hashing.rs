//! Frame hashing for directory-sharded backends

use md5::{Digest, Md5};

/// Lowercase 32-digit hex MD5 of a frame
#[must_use]
pub fn frame_hash(frame: &[u8]) -> String {
    format!("{:x}", Md5::digest(frame))
}
