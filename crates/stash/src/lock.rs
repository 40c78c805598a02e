//! Per-instance mutual exclusion

use crate::config::LockKind;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// The lock every stash operation runs under
///
/// The mutex is re-entrant: a thread holding the guard from
/// [`Stash::lock`](crate::Stash::lock) can keep calling stash operations,
/// which take the same lock internally.
#[derive(Debug)]
pub enum InstanceLock {
    Mutex(ReentrantMutex<()>),
    NoOp,
}

/// Held for the duration of a locked section
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard<'a> {
    _guard: Option<ReentrantMutexGuard<'a, ()>>,
}

impl InstanceLock {
    #[must_use]
    pub fn new(kind: LockKind) -> Self {
        match kind {
            LockKind::Mutex => InstanceLock::Mutex(ReentrantMutex::new(())),
            LockKind::None => InstanceLock::NoOp,
        }
    }

    pub fn lock(&self) -> LockGuard<'_> {
        match self {
            InstanceLock::Mutex(mutex) => LockGuard {
                _guard: Some(mutex.lock()),
            },
            InstanceLock::NoOp => LockGuard { _guard: None },
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, InstanceLock::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_reentrant_on_the_same_thread() {
        let lock = InstanceLock::new(LockKind::Mutex);
        let _outer = lock.lock();
        let _inner = lock.lock();
    }

    #[test]
    fn test_excludes_other_threads() {
        let lock = Arc::new(InstanceLock::new(LockKind::Mutex));
        let entered = Arc::new(AtomicBool::new(false));

        let guard = lock.lock();
        let handle = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            std::thread::spawn(move || {
                let _guard = lock.lock();
                entered.store(true, Ordering::SeqCst);
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_noop_never_blocks() {
        let lock = InstanceLock::new(LockKind::None);
        assert!(lock.is_noop());
        let _a = lock.lock();
        let _b = lock.lock();
    }
}
