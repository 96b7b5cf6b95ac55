use core::fmt;
use core::marker::PhantomData;

use crate::cfg::atomic::AtomicI32;
use crate::elide::{try_enter, try_enter_or_bail};
use crate::lock::Lock;
use crate::relax::{Relax, Spin};
use crate::rtm;

/// An elided spin lock.
///
/// # Example
///
/// ```
/// use rtmlock::raw::RawSpinLock;
///
/// let lock = RawSpinLock::<rtmlock::relax::Spin>::new();
/// lock.lock();
/// // SAFETY: The lock was acquired by this thread.
/// unsafe { lock.unlock() };
/// assert!(!lock.is_locked());
/// ```
pub struct RawSpinLock<R = Spin> {
    word: AtomicI32,
    marker: PhantomData<fn() -> R>,
}

impl<R> RawSpinLock<R> {
    /// Creates a new unlocked spin lock.
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicI32::new(0), marker: PhantomData }
    }

    /// Creates a new unlocked spin lock with a Loom lock word (non-const).
    #[cfg(all(loom, test))]
    pub fn new() -> Self {
        Self { word: AtomicI32::new(0), marker: PhantomData }
    }

    /// Returns `true` if some thread holds the lock word explicitly.
    ///
    /// Elided critical sections do not write the lock word and are not
    /// reported.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.is_locked_relaxed()
    }

    /// Releases the lock acquired by [`lock`] or [`try_lock`].
    ///
    /// # Safety
    ///
    /// The lock must be held by the current thread, and the critical
    /// sections it opened after acquiring this lock must have been released.
    ///
    /// [`lock`]: RawSpinLock::lock
    /// [`try_lock`]: RawSpinLock::try_lock
    #[inline]
    pub unsafe fn unlock(&self) {
        if self.word.is_locked_relaxed() {
            self.word.notify_release();
        } else {
            // SAFETY: A free word means this thread elided the lock.
            unsafe { rtm::end() }
        }
    }
}

impl<R: Relax> RawSpinLock<R> {
    /// Acquires the lock, eliding it if possible, spinning otherwise.
    #[inline]
    pub fn lock(&self) {
        if !try_enter(&self.word) {
            self.word.lock_acquire::<R>();
        }
    }

    /// Attempts to acquire the lock, failing if it is held explicitly.
    ///
    /// Elision is still attempted first when the word looks free. It gives
    /// up as soon as the word is found held, and otherwise only backs off for
    /// a bounded number of retries, so this function never waits for an
    /// explicit holder.
    #[inline]
    pub fn try_lock(&self) -> bool {
        if self.word.is_locked_relaxed() {
            return false;
        }
        try_enter_or_bail(&self.word) || self.word.try_lock_acquire()
    }
}

#[cfg(not(all(loom, test)))]
impl<R> Default for RawSpinLock<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for RawSpinLock<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSpinLock").field("locked", &self.is_locked()).finish()
    }
}

#[cfg(all(test, not(loom)))]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::RawSpinLock;
    use crate::relax::{Spin, Yield};

    #[test]
    fn lock_unlock() {
        let lock = RawSpinLock::<Spin>::new();
        assert!(!lock.is_locked());
        lock.lock();
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_free() {
        let lock = RawSpinLock::<Spin>::new();
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn explicit_holder_blocks_try_lock() {
        use crate::lock::Lock;

        let lock = RawSpinLock::<Spin>::new();
        assert!(lock.word.try_lock_acquire());
        assert!(lock.is_locked());
        thread::scope(|s| {
            s.spawn(|| assert!(!lock.try_lock()));
        });
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_returns_while_held() {
        use crate::elide::try_enter_or_bail;
        use crate::lock::Lock;

        let lock = RawSpinLock::<Spin>::new();
        assert!(lock.word.try_lock_acquire());
        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..1000 {
                    // Same state as a holder arriving right after the
                    // `is_locked` check of `try_lock`.
                    assert!(!try_enter_or_bail(&lock.word));
                    assert!(!lock.try_lock());
                }
            });
        });
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn counts_under_contention() {
        const THREADS: usize = 4;
        const ITERS: usize = 1000;

        struct Shared {
            lock: RawSpinLock<Yield>,
            count: core::cell::UnsafeCell<usize>,
        }
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared { lock: RawSpinLock::new(), count: 0.into() });
        let handles: std::vec::Vec<_> = (0..THREADS)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        shared.lock.lock();
                        unsafe { *shared.count.get() += 1 };
                        unsafe { shared.lock.unlock() };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(unsafe { *shared.count.get() }, THREADS * ITERS);
    }
}
