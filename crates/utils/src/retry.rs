//! Blocking retry with exponential backoff

use stash_core::{Error, Result};
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Exponential backoff multiplier
    pub multiplier: f64,
    /// Add jitter to retry delays to spread out competing openers
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Opening a storage engine: 10 attempts starting at 10ms, doubling, capped at 1s
    #[must_use]
    pub fn backend_open() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Check if this error should trigger a retry
    fn is_retryable(&self) -> bool;
}

impl RetryableError for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::AlreadyExists
        )
    }
}

impl RetryableError for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Engines report lock contention and half-created files this way
            Error::Backend { .. } => true,
            Error::FileSystem { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Execute a blocking operation with exponential backoff retry
pub fn retry_blocking<F, T, E>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, E>,
    E: Into<Error> + RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if attempt >= config.max_attempts || !err.is_retryable() {
                    return Err(err.into());
                }

                let delay = config.delay_for(attempt - 1);
                let actual_delay = if config.jitter {
                    let jitter = Duration::from_millis(
                        (delay.as_millis() as f64 * rand::random::<f64>() * 0.3) as u64,
                    );
                    delay + jitter
                } else {
                    delay
                };

                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = actual_delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );

                std::thread::sleep(actual_delay);
            }
        }
    }
}
