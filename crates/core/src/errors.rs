use std::path::PathBuf;

/// Result type alias for stash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stash operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A value could not be turned into a serialized node
    #[error("failed to serialize {shape}: {message}")]
    Serialization { shape: String, message: String },

    /// A serialized node could not be turned back into a value
    #[error("failed to deserialize '{address}': {message}")]
    Deserialization { address: String, message: String },

    /// Schema-required mode refused a type that is not in the registry
    #[error("type '{address}' is not registered ({kind})")]
    UnregisteredType { address: String, kind: &'static str },

    /// A value had a different shape than the caller asked for
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Compression or decompression failed
    #[error("{codec} {operation} failed: {source}")]
    Compression {
        codec: &'static str,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Framing errors: base64, UTF-8, truncated frames
    #[error("encoding error: {message}")]
    Encoding { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Storage engine errors
    #[error("{engine} backend {operation} failed: {message}")]
    Backend {
        engine: String,
        operation: String,
        message: String,
    },

    /// A memoized callable returned an error
    #[error("call to '{function}' failed: {source}")]
    Callable {
        function: String,
        #[source]
        source: anyhow::Error,
    },
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a serialization error for a value shape
    #[must_use]
    pub fn serialization(shape: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Serialization {
            shape: shape.into(),
            message: message.into(),
        }
    }

    /// Create a deserialization error for a type address
    #[must_use]
    pub fn deserialization(address: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Deserialization {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create an error for a node missing a mandatory reconstruction field
    #[must_use]
    pub fn missing_field(address: impl Into<String>, field: &str) -> Self {
        Error::Deserialization {
            address: address.into(),
            message: format!("missing mandatory field '{field}'"),
        }
    }

    #[must_use]
    pub fn unregistered(address: impl Into<String>, kind: &'static str) -> Self {
        Error::UnregisteredType {
            address: address.into(),
            kind,
        }
    }

    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a compression error
    #[must_use]
    pub fn compression(
        codec: &'static str,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        Error::Compression {
            codec,
            operation,
            source,
        }
    }

    /// Create a framing error
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Error::Encoding {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a storage engine error from any displayable engine error
    #[must_use]
    pub fn backend(
        engine: impl Into<String>,
        operation: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        Error::Backend {
            engine: engine.into(),
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    /// Wrap an error returned by a memoized callable
    #[must_use]
    pub fn callable(function: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Callable {
            function: function.into(),
            source,
        }
    }

    /// Whether this error came from user code rather than the stash
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Error::Callable { .. })
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = Error::missing_field("ndarray", "__py_data__");
        assert_eq!(
            err.to_string(),
            "failed to deserialize 'ndarray': missing mandatory field '__py_data__'"
        );
    }

    #[test]
    fn test_backend_error_from_display() {
        let err = Error::backend("sqlite", "open", "database is locked");
        assert_eq!(err.to_string(), "sqlite backend open failed: database is locked");
        assert!(!err.is_callable());
    }

    #[test]
    fn test_context_wraps_message() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = result.context("loading config").unwrap_err();
        assert!(err.to_string().starts_with("configuration error: loading config"));
    }
}
