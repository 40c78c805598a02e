//! Encoding pipeline for stash
//!
//! A stored key or value goes through two stages:
//!
//! - a [`Serializer`] turns the [`Value`](stash_core::Value) into a
//!   JSON-shaped [`Node`],
//! - the [`Encoder`] renders the node as canonical JSON, then optionally
//!   compresses and base64-encodes the bytes.
//!
//! The [`TypeRegistry`] decides which class and function addresses are
//! importable, and holds custom [`NodeCodec`]s.

pub mod binary;
pub mod encoder;
pub mod hashing;
pub mod json_pickle;
pub mod registry;
pub mod serializer;
pub mod structural;

pub use binary::BinarySerializer;
pub use encoder::{canonical_json, Compression, Encoder};
pub use hashing::frame_hash;
pub use json_pickle::JsonPickleSerializer;
pub use registry::{NodeCodec, StateValidator, TypeRegistry};
pub use serializer::{create_serializer, Serializer, SerializerKind};
pub use structural::{Node, NodeMap, SchemaMode, StructuralSerializer};
