use crate::raw::RawRwLock;
use crate::relax::Relax;

/// A [`lock_api::RwLock`] alias that wraps a [`RawRwLock`].
///
/// [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
pub type RwLock<T, R> = lock_api::RwLock<RawRwLock<R>, T>;

// SAFETY: Explicit writers hold the word alone, explicit readers share it,
// and elided sections abort whenever the word is written. Guards are not
// `Send`.
unsafe impl<R: Relax> lock_api::RawRwLock for RawRwLock<R> {
    type GuardMarker = lock_api::GuardNoSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline]
    fn lock_shared(&self) {
        self.read();
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_read()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        // SAFETY: Caller guarantees a read lock is held by this thread.
        unsafe { self.read_unlock() }
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.write();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_write()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        // SAFETY: Caller guarantees the write lock is held by this thread.
        unsafe { self.write_unlock() }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        Self::is_locked_exclusive(self)
    }
}
