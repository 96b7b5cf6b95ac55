//! Elided locks for [`lock_api`].
//!
//! With the `lock_api` feature enabled, [`RawSpinLock`] implements
//! [`lock_api::RawMutex`] and [`RawRwLock`] implements
//! [`lock_api::RawRwLock`]. This module exports [`lock_api::Mutex`] and
//! [`lock_api::RwLock`] aliases built on them, grouped by relax policy.
//!
//! With the `yield` feature as well, [`RawSpinLock`] also backs a
//! [`lock_api::ReentrantMutex`], see [`reentrant`].
//!
//! Guards are not `Send`: an elided critical section is a transaction, which
//! must be committed by the thread that started it.
//!
//! [`RawSpinLock`]: crate::raw::RawSpinLock
//! [`RawRwLock`]: crate::raw::RawRwLock
//! [lock_api]: https://crates.io/crates/lock_api
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
//! [`lock_api::ReentrantMutex`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutex.html
//! [`reentrant`]: crate::lock_api::reentrant
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html
//! [`lock_api::RawRwLock`]: https://docs.rs/lock_api/latest/lock_api/trait.RawRwLock.html

mod mutex;
mod rwlock;

#[cfg(any(feature = "yield", test))]
mod reentrant_mutex;

/// Elided locks that implement a `spin` relax policy.
///
/// During contention on the lock word, these locks spin while signaling the
/// processor that it is running a busy-wait spin-loop.
pub mod spins {
    use super::{mutex, rwlock};
    use crate::relax::Spin;

    /// A [`lock_api::Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use rtmlock::lock_api::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
    pub type Mutex<T> = mutex::Mutex<T, Spin>;

    /// A [`lock_api::MutexGuard`] that implements the [`Spin`] relax policy.
    ///
    /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
    pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, Spin>;

    /// A [`lock_api::RwLock`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use rtmlock::lock_api::spins::RwLock;
    ///
    /// let lock = RwLock::new(0);
    /// *lock.write() += 1;
    /// assert_eq!(*lock.read(), 1);
    /// ```
    /// [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
    pub type RwLock<T> = rwlock::RwLock<T, Spin>;

    /// Elided locks that implement a `spin with backoff` relax policy.
    pub mod backoff {
        use super::{mutex, rwlock};
        use crate::relax::SpinBackoff;

        /// A [`lock_api::Mutex`] that implements the [`SpinBackoff`] relax
        /// policy.
        ///
        /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
        pub type Mutex<T> = mutex::Mutex<T, SpinBackoff>;

        /// A [`lock_api::MutexGuard`] that implements the [`SpinBackoff`]
        /// relax policy.
        ///
        /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
        pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, SpinBackoff>;

        /// A [`lock_api::RwLock`] that implements the [`SpinBackoff`] relax
        /// policy.
        ///
        /// [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
        pub type RwLock<T> = rwlock::RwLock<T, SpinBackoff>;
    }
}

/// Elided locks that implement a `yield` relax policy.
///
/// During contention on the lock word, these locks yield the current time
/// slice to the OS scheduler.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod yields {
    use super::{mutex, rwlock};
    use crate::relax::Yield;

    /// A [`lock_api::Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
    pub type Mutex<T> = mutex::Mutex<T, Yield>;

    /// A [`lock_api::MutexGuard`] that implements the [`Yield`] relax policy.
    ///
    /// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
    pub type MutexGuard<'a, T> = mutex::MutexGuard<'a, T, Yield>;

    /// A [`lock_api::RwLock`] that implements the [`Yield`] relax policy.
    ///
    /// [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
    pub type RwLock<T> = rwlock::RwLock<T, Yield>;

    /// Elided locks that implement a `yield with backoff` relax policy.
    #[cfg(feature = "yield")]
    pub mod backoff {
        use super::{mutex, rwlock};
        use crate::relax::YieldBackoff;

        /// A [`lock_api::Mutex`] that implements the [`YieldBackoff`] relax
        /// policy.
        ///
        /// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
        pub type Mutex<T> = mutex::Mutex<T, YieldBackoff>;

        /// A [`lock_api::RwLock`] that implements the [`YieldBackoff`] relax
        /// policy.
        ///
        /// [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html
        pub type RwLock<T> = rwlock::RwLock<T, YieldBackoff>;
    }
}

/// Elided reentrant mutexes, which the owning thread may lock again.
///
/// The owning thread is identified by [`ThreadId`], which needs the standard
/// library.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod reentrant {
    use super::reentrant_mutex;
    use crate::relax::Spin;

    pub use reentrant_mutex::ThreadId;

    /// A [`lock_api::ReentrantMutex`] that implements the [`Spin`] relax
    /// policy.
    ///
    /// # Example
    ///
    /// ```
    /// use rtmlock::lock_api::reentrant::ReentrantMutex;
    ///
    /// let mutex = ReentrantMutex::new(0);
    /// let outer = mutex.lock();
    /// let inner = mutex.lock();
    /// assert_eq!(*outer, *inner);
    /// ```
    /// [`lock_api::ReentrantMutex`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutex.html
    pub type ReentrantMutex<T> = reentrant_mutex::ReentrantMutex<T, Spin>;

    /// A [`lock_api::ReentrantMutexGuard`] that implements the [`Spin`]
    /// relax policy.
    ///
    /// [`lock_api::ReentrantMutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutexGuard.html
    pub type ReentrantMutexGuard<'a, T> = reentrant_mutex::ReentrantMutexGuard<'a, T, Spin>;

    /// Elided reentrant mutexes that implement a `yield` relax policy.
    pub mod yields {
        use super::reentrant_mutex;
        use crate::relax::Yield;

        /// A [`lock_api::ReentrantMutex`] that implements the [`Yield`]
        /// relax policy.
        ///
        /// [`lock_api::ReentrantMutex`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutex.html
        pub type ReentrantMutex<T> = reentrant_mutex::ReentrantMutex<T, Yield>;
    }
}
