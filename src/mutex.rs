//! An elided mutual exclusion lock that owns its data.
//!
//! This Mutex is generic over the relax policy of its explicit locking path.
//! User may choose a policy as long as it implements the [`Relax`] trait. The
//! following modules provide type aliases for [`Mutex`] associated with a
//! relax policy:
//!
//! - [`spins`] and [`spins::backoff`]
//! - `yields` and `yields::backoff`, with the `yield` feature
//!
//! [`Relax`]: crate::relax::Relax

use core::cell::UnsafeCell;
use core::fmt::{self, Debug, Display, Formatter};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::raw::RawSpinLock;
use crate::relax::{Relax, Spin};

/// A mutual exclusion primitive useful for protecting shared data.
///
/// Critical sections are elided with hardware transactions when the CPU
/// supports them, and the lock word is only written when elision fails. The
/// data can only be accessed through the RAII guards returned from [`lock`]
/// and [`try_lock`], which guarantees that the data is only ever accessed
/// inside a critical section.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use std::sync::mpsc::channel;
///
/// use rtmlock::mutex::spins::Mutex;
///
/// const N: usize = 10;
///
/// let data = Arc::new(Mutex::new(0));
///
/// let (tx, rx) = channel();
/// for _ in 0..N {
///     let (data, tx) = (data.clone(), tx.clone());
///     thread::spawn(move || {
///         // Send the message after the critical section ended, a syscall
///         // inside of it would abort an elided section.
///         let done = {
///             let mut data = data.lock();
///             *data += 1;
///             *data == N
///         };
///         if done {
///             tx.send(()).unwrap();
///         }
///     });
/// }
///
/// rx.recv().unwrap();
/// ```
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
pub struct Mutex<T: ?Sized, R = Spin> {
    raw: RawSpinLock<R>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, R> Sync for Mutex<T, R> {}
unsafe impl<T: ?Sized + Send, R> Send for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// const MUTEX: Mutex<i32> = Mutex::new(0);
    /// let mutex = Mutex::new(0);
    /// ```
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { raw: RawSpinLock::new(), data: UnsafeCell::new(value) }
    }

    /// Creates a new mutex with a Loom lock word (non-const).
    #[cfg(all(loom, test))]
    pub fn new(value: T) -> Self {
        Self { raw: RawSpinLock::new(), data: UnsafeCell::new(value) }
    }

    /// Consumes this mutex, returning the underlying data.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// assert_eq!(mutex.into_inner(), 0);
    /// ```
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, R: Relax> Mutex<T, R> {
    /// Acquires this mutex, spinning until it is able to do so.
    ///
    /// The critical section is elided when possible. Upon returning, the
    /// thread is either running inside a transaction that observed the mutex
    /// free, or it is the only thread that explicitly holds it. The mutex is
    /// released when the returned guard is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::thread;
    ///
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// let mutex = Arc::new(Mutex::new(0));
    /// let c_mutex = Arc::clone(&mutex);
    ///
    /// thread::spawn(move || {
    ///     *c_mutex.lock() = 10;
    /// })
    /// .join().expect("thread::spawn failed");
    ///
    /// assert_eq!(*mutex.lock(), 10);
    /// ```
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.lock();
        MutexGuard::new(self)
    }

    /// Attempts to acquire this mutex.
    ///
    /// If the mutex is explicitly held by some other thread, then [`None`]
    /// is returned. Otherwise, an RAII guard is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// if let Some(mut guard) = mutex.try_lock() {
    ///     *guard = 10;
    /// }
    /// assert_eq!(mutex.into_inner(), 10);
    /// ```
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.try_lock().then(|| MutexGuard::new(self))
    }
}

impl<T: ?Sized, R> Mutex<T, R> {
    /// Returns `true` if the lock is currently held explicitly.
    ///
    /// Elided critical sections are not reported. This method does not
    /// provide any synchronization guarantees, so its only useful as a
    /// heuristic.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs to
    /// take place - the mutable borrow statically guarantees no locks exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// let mut mutex = Mutex::new(0);
    /// *mutex.get_mut() = 10;
    /// assert_eq!(*mutex.lock(), 10);
    /// ```
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

#[cfg(not(all(loom, test)))]
impl<T: Default, R> Default for Mutex<T, R> {
    /// Creates a `Mutex<T, R>`, with the `Default` value for `T`.
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(not(all(loom, test)))]
impl<T, R> From<T> for Mutex<T, R> {
    /// Creates a `Mutex<T, R>` from a instance of `T`.
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug, R: Relax> Debug for Mutex<T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure is
/// dropped (falls out of scope), the mutex will be unlocked.
///
/// The guard is bound to the thread that acquired the mutex: an elided
/// critical section must be committed by the thread that started it.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, R> {
    lock: &'a Mutex<T, R>,
    marker: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync, R> Sync for MutexGuard<'_, T, R> {}

impl<'a, T: ?Sized, R> MutexGuard<'a, T, R> {
    fn new(lock: &'a Mutex<T, R>) -> Self {
        Self { lock, marker: PhantomData }
    }
}

impl<T: ?Sized, R> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: The guard proves this thread is inside the critical section.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R> DerefMut for MutexGuard<'_, T, R> {
    /// Mutably dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard proves this thread is inside the critical section.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, R> Drop for MutexGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: The guard was created after acquiring the lock, on this
        // thread since guards are not `Send`.
        unsafe { self.lock.raw.unlock() }
    }
}

impl<T: ?Sized + Debug, R> Debug for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Display, R> Display for MutexGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// An elided Mutex that implements a `spin` relax policy.
///
/// During contention on the lock word, this lock spins while signaling the
/// processor that it is running a busy-wait spin-loop.
pub mod spins {
    use crate::relax::Spin;

    /// A [`Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use rtmlock::mutex::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// An elided Mutex that implements a `spin with backoff` relax policy.
    pub mod backoff {
        use crate::relax::SpinBackoff;

        /// A [`Mutex`] that implements the [`SpinBackoff`] relax policy.
        ///
        /// # Example
        ///
        /// ```
        /// use rtmlock::mutex::spins::backoff::Mutex;
        ///
        /// let mutex = Mutex::new(0);
        /// let guard = mutex.lock();
        /// assert_eq!(*guard, 0);
        /// ```
        /// [`Mutex`]: crate::mutex::Mutex
        pub type Mutex<T> = crate::mutex::Mutex<T, SpinBackoff>;
    }
}

/// An elided Mutex that implements a `yield` relax policy.
///
/// During contention on the lock word, this lock will yield the current time
/// slice to the OS scheduler.
#[cfg(any(feature = "yield", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod yields {
    use crate::relax::Yield;

    /// A [`Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// [`Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// An elided Mutex that implements a `yield with backoff` relax policy.
    #[cfg(feature = "yield")]
    pub mod backoff {
        use crate::relax::YieldBackoff;

        /// A [`Mutex`] that implements the [`YieldBackoff`] relax policy.
        ///
        /// [`Mutex`]: crate::mutex::Mutex
        pub type Mutex<T> = crate::mutex::Mutex<T, YieldBackoff>;
    }
}
