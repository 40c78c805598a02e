//! Stash construction with a process-wide instance cache
//!
//! Opening the same stash twice returns the same handle, so every caller in
//! the process shares one engine connection and one lock.

use crate::config::{InstanceKey, StashConfig};
use crate::stash::Stash;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use stash_codec::TypeRegistry;
use stash_core::Result;
use tracing::debug;

static INSTANCES: Lazy<DashMap<InstanceKey, Stash>> = Lazy::new(DashMap::new);

/// Open a stash, reusing a live handle for an identical configuration
///
/// Identity is `(name, engine, root_dir, compress, b64, filename, dbname)`;
/// the serializer is not part of it.
pub fn create_stash(config: StashConfig) -> Result<Stash> {
    config.validate()?;
    let key = config.instance_key();

    if let Some(existing) = INSTANCES.get(&key) {
        debug!(name = %key.name, engine = %key.engine, "reusing cached stash");
        return Ok(existing.clone());
    }

    let stash = Stash::open_with_registry(config, TypeRegistry::shared())?;
    Ok(INSTANCES.entry(key).or_insert(stash).clone())
}

/// Forget every cached handle
///
/// Handles already given out stay usable.
pub fn reset_instances() {
    INSTANCES.clear();
}
