use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::Ordering::Relaxed;

use crate::cfg::atomic::AtomicI32;
use crate::elide::{try_enter, try_enter_or_bail};
use crate::lock::SharedLock;
use crate::relax::{Relax, Spin};
use crate::rtm;

/// An elided reader-writer spin lock.
///
/// Readers and writers elide the lock in the same way, so concurrent elided
/// writers only serialize when their data accesses conflict. Explicit readers
/// share the lock word, which aborts every elided section.
///
/// # Example
///
/// ```
/// use rtmlock::raw::RawRwLock;
///
/// let lock = RawRwLock::<rtmlock::relax::Spin>::new();
/// lock.read();
/// // SAFETY: A read lock was acquired by this thread.
/// unsafe { lock.read_unlock() };
/// lock.write();
/// // SAFETY: The write lock was acquired by this thread.
/// unsafe { lock.write_unlock() };
/// ```
pub struct RawRwLock<R = Spin> {
    word: AtomicI32,
    marker: PhantomData<fn() -> R>,
}

impl<R> RawRwLock<R> {
    /// Creates a new unlocked reader-writer lock.
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicI32::new(0), marker: PhantomData }
    }

    /// Creates a new unlocked reader-writer lock with a Loom lock word
    /// (non-const).
    #[cfg(all(loom, test))]
    pub fn new() -> Self {
        Self { word: AtomicI32::new(0), marker: PhantomData }
    }

    /// Returns `true` if readers or a writer hold the lock word explicitly.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.load(Relaxed) != 0
    }

    /// Returns `true` if a writer holds the lock word explicitly.
    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.word.load(Relaxed) < 0
    }

    /// Releases a read lock.
    ///
    /// # Safety
    ///
    /// A read lock must be held by the current thread.
    #[inline]
    pub unsafe fn read_unlock(&self) {
        if self.is_locked() {
            self.word.read_release();
        } else {
            // SAFETY: A free word means this thread elided the lock.
            unsafe { rtm::end() }
        }
    }

    /// Releases the write lock.
    ///
    /// # Safety
    ///
    /// The write lock must be held by the current thread.
    #[inline]
    pub unsafe fn write_unlock(&self) {
        if self.is_locked() {
            self.word.write_release();
        } else {
            // SAFETY: A free word means this thread elided the lock.
            unsafe { rtm::end() }
        }
    }
}

impl<R: Relax> RawRwLock<R> {
    /// Acquires a read lock, eliding it if possible, spinning while a writer
    /// holds the lock otherwise.
    ///
    /// Explicit readers already holding the lock are joined without elision,
    /// since elision would wait for them to leave.
    #[inline]
    pub fn read(&self) {
        if self.word.load(Relaxed) > 0 || !try_enter(&self.word) {
            self.word.read_acquire::<R>();
        }
    }

    /// Attempts to acquire a read lock, failing if a writer holds the lock.
    ///
    /// Never waits for an explicit holder, see [`RawRwLock::try_write`].
    #[inline]
    pub fn try_read(&self) -> bool {
        match self.word.load(Relaxed) {
            0 => try_enter_or_bail(&self.word) || self.word.try_read_acquire(),
            readers if readers > 0 => self.word.try_read_acquire(),
            _ => false,
        }
    }

    /// Acquires the write lock, eliding it if possible, spinning while the
    /// lock is held otherwise.
    #[inline]
    pub fn write(&self) {
        if !try_enter(&self.word) {
            self.word.write_acquire::<R>();
        }
    }

    /// Attempts to acquire the write lock, failing if the lock is held.
    ///
    /// Elision gives up as soon as the word is found held, and otherwise only
    /// backs off for a bounded number of retries, so this function never
    /// waits for an explicit holder.
    #[inline]
    pub fn try_write(&self) -> bool {
        if self.is_locked() {
            return false;
        }
        try_enter_or_bail(&self.word) || self.word.try_write_acquire()
    }
}

#[cfg(not(all(loom, test)))]
impl<R> Default for RawRwLock<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for RawRwLock<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock").field("state", &self.word.load(Relaxed)).finish()
    }
}

#[cfg(all(test, not(loom)))]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::RawRwLock;
    use crate::lock::SharedLock;
    use crate::relax::{Spin, Yield};

    #[test]
    fn read_write_unlock() {
        let lock = RawRwLock::<Spin>::new();
        lock.read();
        unsafe { lock.read_unlock() };
        lock.write();
        unsafe { lock.write_unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn explicit_reader_admits_readers_only() {
        let lock = RawRwLock::<Spin>::new();
        lock.word.read_acquire::<Spin>();
        assert!(lock.is_locked());
        assert!(!lock.is_locked_exclusive());
        thread::scope(|s| {
            s.spawn(|| {
                assert!(!lock.try_write());
                assert!(lock.try_read());
                unsafe { lock.read_unlock() };
            });
        });
        unsafe { lock.read_unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn explicit_writer_excludes_all() {
        let lock = RawRwLock::<Spin>::new();
        assert!(lock.word.try_write_acquire());
        assert!(lock.is_locked_exclusive());
        thread::scope(|s| {
            s.spawn(|| {
                assert!(!lock.try_write());
                assert!(!lock.try_read());
            });
        });
        unsafe { lock.write_unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn writers_count_under_contention() {
        const THREADS: usize = 4;
        const ITERS: usize = 1000;

        struct Shared {
            lock: RawRwLock<Yield>,
            count: core::cell::UnsafeCell<usize>,
        }
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared { lock: RawRwLock::new(), count: 0.into() });
        let handles: std::vec::Vec<_> = (0..THREADS)
            .map(|n| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for i in 0..ITERS {
                        if (n + i) % 3 == 0 {
                            shared.lock.read();
                            let _ = unsafe { *shared.count.get() };
                            unsafe { shared.lock.read_unlock() };
                        }
                        shared.lock.write();
                        unsafe { *shared.count.get() += 1 };
                        unsafe { shared.lock.write_unlock() };
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
