//! Parity-encoded atomic usage counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Usage counter that conflates "in-use count" and "marked dropped" in one
/// atomic word.
///
/// Even values are plain reference counts (`value = 2 * users`). An odd
/// value means the owner has been marked for deletion; the terminal value
/// `1` means "marked dropped with zero active users" and makes the owner
/// eligible for physical destruction.
#[derive(Debug, Default)]
pub struct UsageCount {
    value: AtomicU64,
}

impl UsageCount {
    /// Creates a counter with zero users, not marked dropped.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Registers a new user.
    ///
    /// Fails without mutating anything if the counter has been marked
    /// dropped. Each successful call must be paired with a [`release`].
    ///
    /// [`release`]: UsageCount::release
    pub fn try_use(&self) -> bool {
        let mut expected = self.value.load(Ordering::Relaxed);
        loop {
            if expected & 1 != 0 {
                // dropped bit is set
                return false;
            }
            let updated = expected + 2;
            match self.value.compare_exchange_weak(
                expected,
                updated,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(current) => expected = current,
            }
        }
    }

    /// Registers a new user even when the counter is marked dropped.
    ///
    /// Used by internal activities that must keep the owner alive while
    /// winding it down.
    pub fn force_use(&self) {
        self.value.fetch_add(2, Ordering::Release);
    }

    /// Releases one user.
    ///
    /// Releasing more often than acquiring is a programming error.
    pub fn release(&self) {
        let old = self.value.fetch_sub(2, Ordering::Release);
        debug_assert!(old >= 2, "usage count underflow");
    }

    /// Marks the counter as dropped.
    ///
    /// Returns whether this call was the one that set the bit; safe to call
    /// more than once.
    pub fn mark_dropped(&self) -> bool {
        let old = self.value.fetch_or(1, Ordering::AcqRel);
        old & 1 == 0
    }

    /// Whether the counter has been marked dropped.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.value.load(Ordering::Acquire) & 1 == 1
    }

    /// Whether the counter is dropped with zero active users.
    ///
    /// Compares with exactly 1: the dropped bit set and nothing else.
    #[must_use]
    pub fn is_dangling(&self) -> bool {
        self.value.load(Ordering::Acquire) == 1
    }

    /// Current number of active users.
    #[must_use]
    pub fn active_users(&self) -> u64 {
        self.value.load(Ordering::Acquire) >> 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn acquire_release_balance() {
        let count = UsageCount::new();
        for _ in 0..5 {
            assert!(count.try_use());
        }
        assert_eq!(count.active_users(), 5);
        for _ in 0..5 {
            count.release();
        }
        assert!(!count.is_dangling());
        assert!(!count.is_dropped());
    }

    #[test]
    fn use_fails_after_mark() {
        let count = UsageCount::new();
        assert!(count.mark_dropped());
        assert!(!count.try_use());
        assert!(count.is_dropped());
    }

    #[test]
    fn mark_is_idempotent() {
        let count = UsageCount::new();
        assert!(count.mark_dropped());
        assert!(!count.mark_dropped());
    }

    #[test]
    fn dangling_requires_zero_users() {
        let count = UsageCount::new();
        assert!(count.try_use());
        count.mark_dropped();
        assert!(!count.is_dangling());
        count.release();
        assert!(count.is_dangling());
    }

    #[test]
    fn force_use_ignores_dropped_bit() {
        let count = UsageCount::new();
        count.mark_dropped();
        count.force_use();
        assert_eq!(count.active_users(), 1);
        assert!(!count.is_dangling());
        count.release();
        assert!(count.is_dangling());
    }

    #[test]
    fn concurrent_acquire_release() {
        let count = Arc::new(UsageCount::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let count = Arc::clone(&count);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    assert!(count.try_use());
                    count.release();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(count.active_users(), 0);
        count.mark_dropped();
        assert!(count.is_dangling());
    }
}
