//! Persistent key-value stash
//!
//! A [`Stash`] maps arbitrary [`Value`]s to [`Value`]s on top of a pluggable
//! storage [`Engine`]: in-process memory, hash-sharded files, SQLite, LMDB,
//! a shelve-style JSON dictionary, redb, pickledb, and (behind cargo
//! features) Redis and MongoDB.
//!
//! Keys and values are serialized into JSON-shaped nodes, rendered as
//! canonical JSON, optionally compressed and base64-encoded. Equal values
//! always produce equal frames, so any value can be a key.
//!
//! ```no_run
//! use stash::{create_stash, Args, Engine, StashConfig, Value};
//! use stash_core::FunctionRef;
//!
//! let stash = create_stash(StashConfig::builder().with_engine(Engine::File).build()?)?;
//! stash.set(Value::tuple([1, 2]), "pair")?;
//!
//! let add = stash.memoize(FunctionRef::new("demo.add"), |args| {
//!     let x = args.get(0).and_then(Value::as_i64).unwrap_or(0);
//!     let y = args.get(1).and_then(Value::as_i64).unwrap_or(0);
//!     Ok(Value::Int(x + y))
//! });
//! assert_eq!(add.call(Args::new().arg(2).arg(3))?, Value::Int(5));
//! # Ok::<(), stash::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod factory;
pub mod lock;
pub mod memoize;
pub mod stash;

pub use backend::{memory::reset_registry, Backend, BackendState};
pub use config::{Engine, InstanceKey, LockKind, Requirements, StashConfig, StashConfigBuilder};
pub use factory::{create_stash, reset_instances};
pub use lock::{InstanceLock, LockGuard};
pub use memoize::{Args, Memoized, FORCE_KWARG};
pub use stash::Stash;

pub use stash_codec::{Compression, SchemaMode, SerializerKind, TypeRegistry};
pub use stash_core::{Error, Result, Value};
