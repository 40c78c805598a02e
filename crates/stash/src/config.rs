//! Stash configuration
//!
//! A [`StashConfig`] names the storage engine, the encoding pipeline and the
//! on-disk location of one stash. It is plain serde data, so it can come from
//! a JSON file as well as from the builder.

use serde::{Deserialize, Serialize};
use stash_codec::{Compression, SchemaMode, SerializerKind};
use stash_core::{Error, Result, ResultExt};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Storage engine behind a stash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    #[default]
    Memory,
    File,
    PairTree,
    Sqlite,
    Lmdb,
    Shelve,
    DiskCache,
    PickleDb,
    Redis,
    Mongo,
}

/// What an engine needs from the encoded frames it stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirements {
    pub string_keys: bool,
    pub string_values: bool,
}

impl Engine {
    pub const ALL: [Engine; 10] = [
        Engine::Memory,
        Engine::File,
        Engine::PairTree,
        Engine::Sqlite,
        Engine::Lmdb,
        Engine::Shelve,
        Engine::DiskCache,
        Engine::PickleDb,
        Engine::Redis,
        Engine::Mongo,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Memory => "memory",
            Engine::File => "file",
            Engine::PairTree => "pair-tree",
            Engine::Sqlite => "sqlite",
            Engine::Lmdb => "lmdb",
            Engine::Shelve => "shelve",
            Engine::DiskCache => "disk-cache",
            Engine::PickleDb => "pickle-db",
            Engine::Redis => "redis",
            Engine::Mongo => "mongo",
        }
    }

    #[must_use]
    pub fn requirements(&self) -> Requirements {
        match self {
            Engine::Memory | Engine::Sqlite | Engine::Lmdb | Engine::DiskCache => {
                Requirements::default()
            }
            // The key is stored on the first line of each entry file
            Engine::File | Engine::PairTree => Requirements {
                string_keys: true,
                string_values: false,
            },
            Engine::Shelve | Engine::PickleDb | Engine::Redis | Engine::Mongo => Requirements {
                string_keys: true,
                string_values: true,
            },
        }
    }

    /// Whether the engine keeps its data under `root_dir`
    #[must_use]
    pub fn uses_filesystem(&self) -> bool {
        !matches!(self, Engine::Memory | Engine::Redis | Engine::Mongo)
    }

    #[must_use]
    pub fn default_filename(&self) -> &'static str {
        match self {
            Engine::Memory => "memory",
            Engine::File => "files",
            Engine::PairTree => "pairtree",
            Engine::Sqlite => "stash.sqlite",
            Engine::Lmdb => "lmdb",
            Engine::Shelve => "stash.shelve",
            Engine::DiskCache => "stash.redb",
            Engine::PickleDb => "stash.pickledb",
            Engine::Redis => "redis",
            Engine::Mongo => "mongo",
        }
    }

    /// Whether support for the engine was compiled in
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            Engine::Redis => cfg!(feature = "redis"),
            Engine::Mongo => cfg!(feature = "mongo"),
            _ => true,
        }
    }

    fn default_url(&self) -> Option<&'static str> {
        match self {
            Engine::Redis => Some("redis://127.0.0.1:6379/"),
            Engine::Mongo => Some("mongodb://127.0.0.1:27017"),
            _ => None,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let engine = match s.to_lowercase().replace('_', "-").as_str() {
            "memory" => Engine::Memory,
            "file" => Engine::File,
            "pair-tree" | "pairtree" => Engine::PairTree,
            "sqlite" => Engine::Sqlite,
            "lmdb" => Engine::Lmdb,
            "shelve" => Engine::Shelve,
            "disk-cache" | "diskcache" => Engine::DiskCache,
            "pickle-db" | "pickledb" => Engine::PickleDb,
            "redis" => Engine::Redis,
            "mongo" | "mongodb" => Engine::Mongo,
            _ => {
                return Err(Error::configuration(format!(
                    "unknown engine '{s}', expected one of: {}",
                    Engine::ALL.map(|e| e.as_str()).join(", ")
                )))
            }
        };
        Ok(engine)
    }
}

/// Per-instance mutual exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// A re-entrant mutex, so a thread holding the stash lock can keep
    /// using the stash
    #[default]
    Mutex,
    /// No locking, for single-threaded use
    None,
}

impl FromStr for LockKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mutex" => Ok(LockKind::Mutex),
            "none" => Ok(LockKind::None),
            _ => Err(Error::configuration(format!(
                "unknown lock '{s}', expected one of: mutex, none"
            ))),
        }
    }
}

/// Configuration of one stash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    pub engine: Engine,
    /// Logical namespace, the first path segment below `root_dir`
    pub name: String,
    pub root_dir: PathBuf,
    pub serializer: SerializerKind,
    pub compress: Compression,
    pub compression_level: Option<u32>,
    pub b64: bool,
    /// Leaf file or directory name; the engine's default when unset
    pub filename: Option<String>,
    /// Table, database or collection group inside the engine
    pub dbname: String,
    /// Server address for network engines
    pub url: Option<String>,
    pub schema: SchemaMode,
    pub lock: LockKind,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            name: "stash".to_string(),
            root_dir: stash_utils::default_root(),
            serializer: SerializerKind::default(),
            compress: Compression::default(),
            compression_level: None,
            b64: true,
            filename: None,
            dbname: "stash".to_string(),
            url: None,
            schema: SchemaMode::default(),
            lock: LockKind::default(),
        }
    }
}

/// Identity of a stash in the factory's instance cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub name: String,
    pub engine: Engine,
    pub root_dir: PathBuf,
    pub compress: Compression,
    pub b64: bool,
    pub filename: String,
    pub dbname: String,
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl StashConfig {
    #[must_use]
    pub fn builder() -> StashConfigBuilder {
        StashConfigBuilder::new()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read configuration", e))?;
        Self::from_json_str(&json)
            .with_context(|| format!("invalid stash configuration in {}", path.display()))
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        self.filename
            .as_deref()
            .unwrap_or_else(|| self.engine.default_filename())
    }

    /// `<root_dir>/<name>/<filename>`
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.root_dir.join(&self.name).join(self.filename())
    }

    /// The directory the engine's data lives in
    ///
    /// A filename with an extension names a file inside `<root_dir>/<name>`;
    /// one without names the directory itself.
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        let path = self.path();
        if Path::new(self.filename()).extension().is_some() {
            path.parent().map(Path::to_path_buf).unwrap_or(path)
        } else {
            path
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().or_else(|| self.engine.default_url())
    }

    #[must_use]
    pub fn instance_key(&self) -> InstanceKey {
        InstanceKey {
            name: self.name.clone(),
            engine: self.engine,
            root_dir: self.root_dir.clone(),
            compress: self.compress,
            b64: self.b64,
            filename: self.filename().to_string(),
            dbname: self.dbname.clone(),
        }
    }

    /// Check the configuration is usable before any engine is touched
    pub fn validate(&self) -> Result<()> {
        let name = Path::new(&self.name);
        if self.name.is_empty()
            || name.is_absolute()
            || name
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::configuration(format!(
                "stash name '{}' must be a non-empty relative path",
                self.name
            )));
        }

        let filename = self.filename();
        if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." {
            return Err(Error::configuration(format!(
                "filename '{filename}' must be a single path segment"
            )));
        }

        if !is_identifier(&self.dbname) {
            return Err(Error::configuration(format!(
                "dbname '{}' may only contain ASCII letters, digits and '_'",
                self.dbname
            )));
        }

        if !self.engine.is_available() {
            return Err(Error::configuration(format!(
                "engine '{}' requires the `{}` cargo feature",
                self.engine,
                self.engine.as_str()
            )));
        }

        let requirements = self.engine.requirements();
        if (requirements.string_keys || requirements.string_values) && !self.b64 {
            return Err(Error::configuration(format!(
                "engine '{}' stores strings and requires b64 = true",
                self.engine
            )));
        }

        Ok(())
    }
}

/// Builder for [`StashConfig`]
#[derive(Debug, Clone, Default)]
pub struct StashConfigBuilder {
    config: StashConfig,
}

impl StashConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.config.engine = engine;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.config.root_dir = root_dir.into();
        self
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: SerializerKind) -> Self {
        self.config.serializer = serializer;
        self
    }

    #[must_use]
    pub fn with_compress(mut self, compress: Compression) -> Self {
        self.config.compress = compress;
        self
    }

    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_b64(mut self, b64: bool) -> Self {
        self.config.b64 = b64;
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.config.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.config.dbname = dbname.into();
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SchemaMode) -> Self {
        self.config.schema = schema;
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock: LockKind) -> Self {
        self.config.lock = lock;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<StashConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_derivation() {
        let config = StashConfig::builder()
            .with_engine(Engine::Sqlite)
            .with_name("results")
            .with_root_dir("/data")
            .build()
            .unwrap();
        assert_eq!(config.path(), PathBuf::from("/data/results/stash.sqlite"));
        assert_eq!(config.directory(), PathBuf::from("/data/results"));

        let config = StashConfig::builder()
            .with_engine(Engine::File)
            .with_name("results")
            .with_root_dir("/data")
            .build()
            .unwrap();
        assert_eq!(config.directory(), PathBuf::from("/data/results/files"));
    }

    #[test]
    fn test_string_engines_require_b64() {
        for engine in [Engine::File, Engine::PairTree, Engine::Shelve, Engine::PickleDb] {
            let err = StashConfig::builder()
                .with_engine(engine)
                .with_b64(false)
                .build()
                .unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "{engine}");
        }
        assert!(StashConfig::builder()
            .with_engine(Engine::Sqlite)
            .with_b64(false)
            .build()
            .is_ok());
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert!(StashConfig::builder().with_name("../escape").build().is_err());
        assert!(StashConfig::builder().with_name("").build().is_err());
        assert!(StashConfig::builder().with_filename("a/b").build().is_err());
        assert!(StashConfig::builder().with_dbname("t; DROP").build().is_err());
        assert!(StashConfig::builder().with_name("parent/child").build().is_ok());
    }

    #[test]
    fn test_json_loading_uses_option_strings() {
        let config = StashConfig::from_json_str(
            r#"{"engine": "pair-tree", "compress": "bzip2", "serializer": "json-pickle",
                "name": "runs", "root_dir": "/tmp/stash", "schema": "lenient"}"#,
        )
        .unwrap();
        assert_eq!(config.engine, Engine::PairTree);
        assert_eq!(config.compress, Compression::Bzip2);
        assert_eq!(config.serializer, SerializerKind::JsonPickle);
        assert_eq!(config.schema, SchemaMode::Lenient);
        assert!(config.b64);
        assert_eq!(config.dbname, "stash");

        assert!(StashConfig::from_json_str(r#"{"engine": "leveldb"}"#).is_err());
    }

    #[test]
    fn test_engine_names_round_trip() {
        for engine in Engine::ALL {
            assert_eq!(engine.as_str().parse::<Engine>().unwrap(), engine);
        }
        assert_eq!("pickledb".parse::<Engine>().unwrap(), Engine::PickleDb);
        assert!("leveldb".parse::<Engine>().is_err());
    }

    #[test]
    fn test_network_engines_skip_the_filesystem() {
        assert!(!Engine::Memory.uses_filesystem());
        assert!(!Engine::Redis.uses_filesystem());
        assert!(Engine::Lmdb.uses_filesystem());
    }
}
