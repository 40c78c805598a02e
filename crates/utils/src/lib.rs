//! Shared utilities for the stash workspace
//!
//! Small, dependency-light helpers used by the backends and the factory:
//! atomic writes and shard-directory housekeeping, blocking retry with
//! exponential backoff, tracing setup and the XDG default root.

pub mod fs;
pub mod retry;
pub mod tracing;
pub mod xdg;

pub use fs::{ensure_dir, prune_empty_dirs, read_if_exists, walk_files, write_atomic};
pub use retry::{retry_blocking, RetryConfig, RetryableError};
pub use xdg::default_root;
