//! The stash handle: a persistent mapping from values to values

use crate::backend::{Backend, BackendState, LazyBackend};
use crate::config::{Engine, StashConfig};
use crate::factory;
use crate::lock::{InstanceLock, LockGuard};
use crate::memoize::Memoized;
use parking_lot::Mutex;
use stash_codec::{Encoder, Serializer, TypeRegistry};
use stash_core::{FunctionRef, Result, Value};
use stash_utils::ensure_dir;
use std::fmt;
use std::sync::Arc;

/// A persistent mapping bound to one engine and one encoding configuration
///
/// Keys and values are any [`Value`]; both go through
/// serialize, then canonical JSON, compression and base64 before they reach
/// the engine. Handles are cheap to clone and share one engine connection.
///
/// ```no_run
/// use stash::{Engine, Stash, StashConfig};
///
/// let config = StashConfig::builder().with_engine(Engine::Sqlite).with_name("results").build()?;
/// let stash = Stash::open(config)?;
/// stash.set("answer", 42)?;
/// assert_eq!(stash.get("answer")?, Some(42.into()));
/// # Ok::<(), stash::Error>(())
/// ```
#[derive(Clone)]
pub struct Stash {
    inner: Arc<StashInner>,
}

struct StashInner {
    config: StashConfig,
    serializer: Arc<dyn Serializer>,
    encoder: Encoder,
    registry: Arc<TypeRegistry>,
    lock: InstanceLock,
    backend: Mutex<LazyBackend>,
}

impl fmt::Debug for Stash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stash")
            .field("name", &self.inner.config.name)
            .field("engine", &self.inner.config.engine)
            .field("serializer", &self.inner.serializer.name())
            .field("encoder", &self.inner.encoder)
            .finish_non_exhaustive()
    }
}

impl Stash {
    /// Open a stash that resolves types through the process-wide registry
    ///
    /// This bypasses the instance cache; use [`create_stash`](crate::create_stash)
    /// to share handles.
    pub fn open(config: StashConfig) -> Result<Self> {
        Self::open_with_registry(config, TypeRegistry::shared())
    }

    /// Open a stash with its own type registry
    pub fn open_with_registry(config: StashConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        config.validate()?;
        if config.engine.uses_filesystem() {
            ensure_dir(&config.directory())?;
        }

        let serializer = config.serializer.build(Arc::clone(&registry), config.schema);
        let encoder =
            Encoder::new(config.compress, config.b64).with_level(config.compression_level);
        let lock = InstanceLock::new(config.lock);
        let backend = Mutex::new(LazyBackend::new(config.clone()));

        Ok(Self {
            inner: Arc::new(StashInner {
                config,
                serializer,
                encoder,
                registry,
                lock,
                backend,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StashConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    #[must_use]
    pub fn engine(&self) -> Engine {
        self.inner.config.engine
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.inner.registry
    }

    /// Lifecycle state of the underlying engine
    #[must_use]
    pub fn state(&self) -> BackendState {
        self.inner.backend.lock().state()
    }

    /// Whether two handles share the same engine connection
    #[must_use]
    pub fn same_instance(&self, other: &Stash) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The byte frame a value is stored as
    pub fn frame(&self, value: &Value) -> Result<Vec<u8>> {
        let node = self.inner.serializer.serialize(value)?;
        self.inner.encoder.encode(&node)
    }

    fn value_of(&self, frame: &[u8]) -> Result<Value> {
        let node = self.inner.encoder.decode(frame)?;
        self.inner.serializer.deserialize(&node)
    }

    fn with_backend<T>(&self, f: impl FnOnce(&mut dyn Backend) -> Result<T>) -> Result<T> {
        let _guard = self.inner.lock.lock();
        let mut backend = self.inner.backend.lock();
        f(backend.open()?)
    }

    pub fn get(&self, key: impl Into<Value>) -> Result<Option<Value>> {
        let key = self.frame(&key.into())?;
        let frame = self.with_backend(|backend| backend.get(&key))?;
        frame.map(|frame| self.value_of(&frame)).transpose()
    }

    /// The stored value, or `default` when the key is absent
    pub fn get_or(&self, key: impl Into<Value>, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Store a value
    ///
    /// Both sides are encoded before the engine is touched, so an encoding
    /// failure leaves the stash unchanged.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let key = self.frame(&key.into())?;
        let value = self.frame(&value.into())?;
        self.with_backend(|backend| backend.set(&key, &value))
    }

    pub fn contains(&self, key: impl Into<Value>) -> Result<bool> {
        let key = self.frame(&key.into())?;
        self.with_backend(|backend| backend.contains(&key))
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool> {
        let key = self.frame(&key.into())?;
        self.with_backend(|backend| backend.delete(&key))
    }

    pub fn len(&self) -> Result<usize> {
        self.with_backend(|backend| backend.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&self) -> Result<Vec<Value>> {
        let frames = self.with_backend(|backend| backend.keys())?;
        frames.iter().map(|frame| self.value_of(frame)).collect()
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        Ok(self.items()?.into_iter().map(|(_, value)| value).collect())
    }

    pub fn items(&self) -> Result<Vec<(Value, Value)>> {
        let frames = self.with_backend(|backend| backend.items())?;
        frames
            .iter()
            .map(|(key, value)| Ok((self.value_of(key)?, self.value_of(value)?)))
            .collect()
    }

    /// A detached snapshot of every entry
    pub fn copy(&self) -> Result<Vec<(Value, Value)>> {
        self.items()
    }

    pub fn clear(&self) -> Result<()> {
        self.with_backend(|backend| backend.clear())
    }

    /// Remove and return a value
    pub fn pop(&self, key: impl Into<Value>) -> Result<Option<Value>> {
        let key = self.frame(&key.into())?;
        let frame = self.with_backend(|backend| {
            let frame = backend.get(&key)?;
            if frame.is_some() {
                backend.delete(&key)?;
            }
            Ok(frame)
        })?;
        frame.map(|frame| self.value_of(&frame)).transpose()
    }

    pub fn pop_or(&self, key: impl Into<Value>, default: impl Into<Value>) -> Result<Value> {
        Ok(self.pop(key)?.unwrap_or_else(|| default.into()))
    }

    /// The stored value, storing `default` first when the key is absent
    pub fn setdefault(&self, key: impl Into<Value>, default: impl Into<Value>) -> Result<Value> {
        let default = default.into();
        let key = self.frame(&key.into())?;
        let default_frame = self.frame(&default)?;
        let existing = self.with_backend(|backend| match backend.get(&key)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                backend.set(&key, &default_frame)?;
                Ok(None)
            }
        })?;
        match existing {
            Some(frame) => self.value_of(&frame),
            None => Ok(default),
        }
    }

    /// Store every pair; all pairs are encoded before any is written
    pub fn update<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let frames = entries
            .into_iter()
            .map(|(key, value)| Ok((self.frame(&key.into())?, self.frame(&value.into())?)))
            .collect::<Result<Vec<_>>>()?;
        self.with_backend(|backend| {
            for (key, value) in &frames {
                backend.set(key, value)?;
            }
            Ok(())
        })
    }

    /// Hold the instance lock across several operations
    ///
    /// Operations on this handle from the same thread proceed while the
    /// guard is held; other threads wait.
    pub fn lock(&self) -> LockGuard<'_> {
        self.inner.lock.lock()
    }

    /// Flush and release the engine; the next operation reopens it
    pub fn close(&self) -> Result<()> {
        let _guard = self.inner.lock.lock();
        self.inner.backend.lock().close()
    }

    /// A stash nested under this one, named `<name>/<child>`
    ///
    /// Children of a stash using the process-wide registry come from the
    /// instance cache; others get a fresh handle sharing the parent's registry.
    pub fn child(&self, name: &str) -> Result<Stash> {
        let mut config = self.inner.config.clone();
        config.name = format!("{}/{}", config.name, name);
        if Arc::ptr_eq(&self.inner.registry, &TypeRegistry::shared()) {
            factory::create_stash(config)
        } else {
            Stash::open_with_registry(config, Arc::clone(&self.inner.registry))
        }
    }

    /// Wrap `f` so calls are answered from this stash when possible
    ///
    /// `function` identifies `f` in keys and must stay stable across
    /// processes for cached results to be found again.
    pub fn memoize<F>(&self, function: FunctionRef, f: F) -> Memoized<F>
    where
        F: Fn(&crate::Args) -> anyhow::Result<Value>,
    {
        Memoized::new(self.clone(), function, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory;
    use crate::config::LockKind;
    use stash_codec::{Compression, SerializerKind};

    fn memory_stash(name: &str) -> Stash {
        let config = StashConfig::builder()
            .with_engine(Engine::Memory)
            .with_name(name)
            .build()
            .unwrap();
        Stash::open_with_registry(config, Arc::new(TypeRegistry::new())).unwrap()
    }

    #[test]
    fn test_backend_opens_on_first_access() {
        let stash = memory_stash("unit-lazy");
        assert_eq!(stash.state(), BackendState::Closed);
        assert!(!stash.contains("k").unwrap());
        assert_eq!(stash.state(), BackendState::Open);
        stash.close().unwrap();
        assert_eq!(stash.state(), BackendState::Closed);
    }

    #[test]
    fn test_pop_and_setdefault() {
        let stash = memory_stash("unit-pop");
        assert_eq!(stash.setdefault("k", 1).unwrap(), Value::Int(1));
        assert_eq!(stash.setdefault("k", 2).unwrap(), Value::Int(1));
        assert_eq!(stash.pop("k").unwrap(), Some(Value::Int(1)));
        assert_eq!(stash.pop("k").unwrap(), None);
        assert_eq!(stash.pop_or("k", "gone").unwrap(), Value::from("gone"));
        assert!(stash.is_empty().unwrap());
    }

    #[test]
    fn test_failed_encoding_leaves_stash_unchanged() {
        let stash = memory_stash("unit-rollback");
        let unregistered = Value::Function(FunctionRef::new("nowhere.f"));
        assert!(stash.set("k", unregistered.clone()).is_err());
        assert!(stash
            .update(vec![("a", Value::Int(1)), ("b", unregistered)])
            .is_err());
        assert_eq!(stash.len().unwrap(), 0);
    }

    #[test]
    fn test_operations_run_while_holding_the_lock() {
        let stash = memory_stash("unit-guard");
        let _guard = stash.lock();
        stash.set("k", "v").unwrap();
        assert_eq!(stash.get("k").unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_frame_follows_the_encoding_options() {
        let config = StashConfig::builder()
            .with_engine(Engine::Memory)
            .with_name("unit-frame")
            .with_compress(Compression::Raw)
            .with_b64(false)
            .with_serializer(SerializerKind::Structural)
            .with_lock(LockKind::None)
            .build()
            .unwrap();
        let stash = Stash::open(config).unwrap();
        assert_eq!(stash.frame(&Value::from("k")).unwrap(), b"\"k\"".to_vec());
        memory::reset_registry();
    }

    #[test]
    fn test_child_names_nest() {
        let stash = memory_stash("unit-parent");
        let child = stash.child("kid").unwrap();
        assert_eq!(child.name(), "unit-parent/kid");
        stash.set("k", 1).unwrap();
        assert!(!child.contains("k").unwrap());
    }
}
