use crate::raw::RawSpinLock;
use crate::relax::Relax;

/// A [`lock_api::Mutex`] alias that wraps a [`RawSpinLock`].
///
/// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
pub type Mutex<T, R> = lock_api::Mutex<RawSpinLock<R>, T>;

/// A [`lock_api::MutexGuard`] alias that wraps a [`RawSpinLock`].
///
/// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
pub type MutexGuard<'a, T, R> = lock_api::MutexGuard<'a, RawSpinLock<R>, T>;

// SAFETY: The lock word protocol provides mutual exclusion among explicit
// holders, and the transaction read set excludes explicit holders from
// elided ones. Guards are not `Send`, so the unlocking thread is the thread
// that opened the transaction.
unsafe impl<R: Relax> lock_api::RawMutex for RawSpinLock<R> {
    type GuardMarker = lock_api::GuardNoSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline]
    fn lock(&self) {
        Self::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        Self::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: Caller guarantees the lock is held by this thread.
        unsafe { Self::unlock(self) }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }
}
