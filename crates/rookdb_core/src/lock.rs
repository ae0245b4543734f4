//! Owner-tracked reentrant lock pair.
//!
//! A thread that already holds the exclusive side of an [`OwnedRwLock`] may
//! take further read or write lockers on the same lock without deadlocking
//! itself. Reentrancy is detected by comparing the caller against an atomic
//! owner marker rather than by a recursive lock type, so the underlying lock
//! stays a plain reader-writer lock.
//!
//! Each protected resource carries its own owner marker, so two resources
//! (for example the inventory lock and a per-collection status lock) can be
//! nested in a fixed order without violating the no-self-block contract.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Identity of the calling thread as a small nonzero integer.
fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

const NO_OWNER: u64 = 0;

/// A reader-writer lock that remembers which thread holds it exclusively.
///
/// The lock itself protects no data; it serializes critical sections, and
/// the owner marker lets nested lockers on the same thread pass through.
#[derive(Debug, Default)]
pub struct OwnedRwLock {
    raw: RwLock<()>,
    owner: AtomicU64,
}

impl OwnedRwLock {
    /// Creates a new unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn owned_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread_id()
    }
}

/// Shared locker that does not block a thread already holding the write side.
///
/// Attempts a non-blocking read first; only if that fails *and* the calling
/// thread is not the current exclusive owner does it block for the real
/// lock. Held for the locker's lifetime.
#[must_use = "the read lock is released when the locker is dropped"]
pub struct RecursiveReadLocker<'a> {
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

impl<'a> RecursiveReadLocker<'a> {
    /// Acquires the shared side of `lock`.
    pub fn new(lock: &'a OwnedRwLock) -> Self {
        let guard = match lock.raw.try_read() {
            Some(guard) => Some(guard),
            None if lock.owned_by_current_thread() => None,
            None => Some(lock.raw.read()),
        };
        Self { _guard: guard }
    }
}

/// Exclusive locker with explicit lock/unlock for try-then-backoff patterns.
///
/// Recursive `lock()` on the *same* instance is disallowed (asserted);
/// callers needing reentrancy construct a second locker on the same
/// [`OwnedRwLock`]. Dropping the locker releases the lock and clears the
/// owner marker only if this instance set it.
#[must_use = "the write lock is released when the locker is dropped"]
pub struct RecursiveWriteLocker<'a> {
    lock: &'a OwnedRwLock,
    guard: Option<RwLockWriteGuard<'a, ()>>,
    owned: bool,
    engaged: bool,
}

impl<'a> RecursiveWriteLocker<'a> {
    /// Creates a locker and acquires the lock immediately.
    pub fn acquired(lock: &'a OwnedRwLock) -> Self {
        let mut locker = Self::unlocked(lock);
        locker.lock();
        locker
    }

    /// Creates a locker without acquiring the lock.
    pub fn unlocked(lock: &'a OwnedRwLock) -> Self {
        Self {
            lock,
            guard: None,
            owned: false,
            engaged: false,
        }
    }

    /// Acquires the exclusive side, passing through if the calling thread
    /// already owns it via another locker instance.
    pub fn lock(&mut self) {
        // recursive locking of the same instance is not supported
        // (create a new instance instead)
        assert!(!self.engaged, "recursive lock() on the same locker");

        if let Some(guard) = self.lock.raw.try_write() {
            self.lock.owner.store(current_thread_id(), Ordering::Release);
            self.guard = Some(guard);
            self.owned = true;
        } else if !self.lock.owned_by_current_thread() {
            let guard = self.lock.raw.write();
            self.lock.owner.store(current_thread_id(), Ordering::Release);
            self.guard = Some(guard);
            self.owned = true;
        }
        // else: this thread already holds the lock through another instance

        self.engaged = true;
    }

    /// Releases the lock if this instance holds it.
    pub fn unlock(&mut self) {
        if self.owned {
            self.lock.owner.store(NO_OWNER, Ordering::Release);
            self.owned = false;
        }
        self.guard = None;
        self.engaged = false;
    }

    /// Whether this instance currently engages the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.engaged
    }
}

impl Drop for RecursiveWriteLocker<'_> {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn write_then_nested_read_same_thread() {
        let lock = OwnedRwLock::new();
        let writer = RecursiveWriteLocker::acquired(&lock);
        assert!(writer.is_locked());

        // must not deadlock against our own write lock
        let _reader = RecursiveReadLocker::new(&lock);
    }

    #[test]
    fn write_then_nested_write_same_thread() {
        let lock = OwnedRwLock::new();
        let outer = RecursiveWriteLocker::acquired(&lock);
        let inner = RecursiveWriteLocker::acquired(&lock);
        assert!(outer.is_locked());
        assert!(inner.is_locked());
    }

    #[test]
    #[should_panic(expected = "recursive lock()")]
    fn relocking_same_instance_panics() {
        let lock = OwnedRwLock::new();
        let mut locker = RecursiveWriteLocker::acquired(&lock);
        locker.lock();
    }

    #[test]
    fn unlock_allows_other_threads() {
        let lock = Arc::new(OwnedRwLock::new());
        let mut locker = RecursiveWriteLocker::acquired(&lock);

        let contender = {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let _locker = RecursiveWriteLocker::acquired(&lock);
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        locker.unlock();
        contender.join().unwrap();
    }

    #[test]
    fn other_thread_blocks_until_drop() {
        let lock = Arc::new(OwnedRwLock::new());
        let locker = RecursiveWriteLocker::acquired(&lock);

        let (tx, rx) = std::sync::mpsc::channel();
        let contender = {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let _reader = RecursiveReadLocker::new(&lock);
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        drop(locker);
        contender.join().unwrap();
        rx.recv_timeout(Duration::from_millis(1000)).unwrap();
    }
}
