use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicI32;
use crate::relax::Relax;

/// The explicit locking protocol of an exclusive lock word.
///
/// The word is `0` when free and `1` when held. Transactions that elided the
/// lock observe the word as `0` for as long as they run, so these operations
/// must never leave a transient non-zero value on a free lock.
pub trait Lock {
    /// Tries to lock the word with acquire ordering.
    ///
    /// Returns `true` if successfully moved from unlocked state to locked
    /// state, `false` otherwise.
    fn try_lock_acquire(&self) -> bool;

    /// Tries to lock the word with acquire ordering and weak exchange.
    fn try_lock_acquire_weak(&self) -> bool;

    /// Blocks the thread until the word is locked. The relax policy runs
    /// while the word is held somewhere else, which is observed with relaxed
    /// loads only (test and test-and-set).
    fn lock_acquire<R: Relax>(&self);

    /// Returns `true` if the word is currently held.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    fn is_locked_relaxed(&self) -> bool;

    /// Frees the word with release ordering.
    fn notify_release(&self);
}

/// The explicit locking protocol of a reader-writer lock word.
///
/// The word is `0` when free, `-1` when a writer holds it and the number of
/// readers otherwise.
pub trait SharedLock {
    /// Tries to add a reader, failing if a writer holds the word.
    fn try_read_acquire(&self) -> bool;

    /// Blocks the thread until a reader is added.
    fn read_acquire<R: Relax>(&self);

    /// Removes a reader.
    fn read_release(&self);

    /// Tries to take the word for writing, failing if it is held at all.
    fn try_write_acquire(&self) -> bool;

    /// Blocks the thread until the word is taken for writing.
    fn write_acquire<R: Relax>(&self);

    /// Frees the word held for writing.
    fn write_release(&self);
}

const FREE: i32 = 0;
const HELD: i32 = 1;
const WRITER: i32 = -1;

impl Lock for AtomicI32 {
    fn try_lock_acquire(&self) -> bool {
        self.compare_exchange(FREE, HELD, Acquire, Relaxed).is_ok()
    }

    fn try_lock_acquire_weak(&self) -> bool {
        self.compare_exchange_weak(FREE, HELD, Acquire, Relaxed).is_ok()
    }

    fn lock_acquire<R: Relax>(&self) {
        let mut relax = R::new();
        while !self.try_lock_acquire_weak() {
            while self.load(Relaxed) != FREE {
                relax.relax();
            }
        }
    }

    fn is_locked_relaxed(&self) -> bool {
        self.load(Relaxed) != FREE
    }

    fn notify_release(&self) {
        self.store(FREE, Release);
    }
}

impl SharedLock for AtomicI32 {
    fn try_read_acquire(&self) -> bool {
        let readers = self.load(Relaxed);
        readers >= FREE && self.compare_exchange(readers, readers + 1, Acquire, Relaxed).is_ok()
    }

    fn read_acquire<R: Relax>(&self) {
        let mut relax = R::new();
        loop {
            let readers = self.load(Relaxed);
            if readers == WRITER {
                relax.relax();
                continue;
            }
            debug_assert!(readers < i32::MAX, "reader count overflow");
            if self.compare_exchange_weak(readers, readers + 1, Acquire, Relaxed).is_ok() {
                return;
            }
        }
    }

    fn read_release(&self) {
        let prev = self.fetch_sub(1, Release);
        debug_assert!(prev > FREE, "read unlock without readers");
    }

    fn try_write_acquire(&self) -> bool {
        self.compare_exchange(FREE, WRITER, Acquire, Relaxed).is_ok()
    }

    fn write_acquire<R: Relax>(&self) {
        let mut relax = R::new();
        while self.compare_exchange_weak(FREE, WRITER, Acquire, Relaxed).is_err() {
            while self.load(Relaxed) != FREE {
                relax.relax();
            }
        }
    }

    fn write_release(&self) {
        self.store(FREE, Release);
    }
}
