//! Shared fixtures for stash integration tests

#![allow(dead_code)]

use stash::{Compression, Engine, SchemaMode, Stash, StashConfig};
use stash_codec::TypeRegistry;
use std::sync::Arc;
use tempfile::TempDir;

/// Every engine that runs without an external server
pub const LOCAL_ENGINES: [Engine; 8] = [
    Engine::Memory,
    Engine::File,
    Engine::PairTree,
    Engine::Sqlite,
    Engine::Lmdb,
    Engine::Shelve,
    Engine::DiskCache,
    Engine::PickleDb,
];

/// A stash rooted in its own temporary directory
pub struct TestStash {
    pub stash: Stash,
    pub root: TempDir,
}

impl std::ops::Deref for TestStash {
    type Target = Stash;

    fn deref(&self) -> &Stash {
        &self.stash
    }
}

pub fn config(root: &TempDir, engine: Engine) -> StashConfig {
    StashConfig::builder()
        .with_engine(engine)
        .with_root_dir(root.path())
        .with_name("test")
        .build()
        .unwrap()
}

/// Open `engine` with a private registry so tests cannot see each other's types
pub fn open(engine: Engine) -> TestStash {
    open_with(engine, Compression::Zlib, SchemaMode::Required)
}

pub fn open_with(engine: Engine, compress: Compression, schema: SchemaMode) -> TestStash {
    stash_utils::tracing::init_for_tests();
    let root = TempDir::new().unwrap();
    let mut config = config(&root, engine);
    config.compress = compress;
    config.schema = schema;
    let stash = Stash::open_with_registry(config, Arc::new(TypeRegistry::new())).unwrap();
    TestStash { stash, root }
}

/// Reopen the same location as a fresh handle
pub fn reopen(test: &TestStash) -> Stash {
    Stash::open_with_registry(test.stash.config().clone(), Arc::clone(test.stash.registry()))
        .unwrap()
}
