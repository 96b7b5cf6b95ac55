//! An elided reader-writer lock that owns its data.
//!
//! Both readers and writers try to elide the lock first. Elided writers do
//! not exclude each other through the lock word, only through the conflict
//! detection of the hardware, so disjoint writes run in parallel.

use core::cell::UnsafeCell;
use core::fmt::{self, Debug, Display, Formatter};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::raw::RawRwLock;
use crate::relax::{Relax, Spin};

/// A reader-writer lock useful for protecting shared data.
///
/// # Examples
///
/// ```
/// use rtmlock::rwlock::RwLock;
///
/// let lock: RwLock<_> = RwLock::new(5);
/// {
///     let r1 = lock.read();
///     assert_eq!(*r1, 5);
/// }
/// {
///     let mut w = lock.write();
///     *w += 1;
/// }
/// assert_eq!(*lock.read(), 6);
/// ```
pub struct RwLock<T: ?Sized, R = Spin> {
    raw: RawRwLock<R>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, R> Send for RwLock<T, R> {}
unsafe impl<T: ?Sized + Send + Sync, R> Sync for RwLock<T, R> {}

impl<T, R> RwLock<T, R> {
    /// Creates a new reader-writer lock in an unlocked state ready for use.
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { raw: RawRwLock::new(), data: UnsafeCell::new(value) }
    }

    /// Creates a new reader-writer lock with a Loom lock word (non-const).
    #[cfg(all(loom, test))]
    pub fn new(value: T) -> Self {
        Self { raw: RawRwLock::new(), data: UnsafeCell::new(value) }
    }

    /// Consumes this lock, returning the underlying data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, R: Relax> RwLock<T, R> {
    /// Acquires shared read access, spinning while a writer holds the lock
    /// explicitly.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, T, R> {
        self.raw.read();
        RwLockReadGuard { lock: self, marker: PhantomData }
    }

    /// Attempts to acquire shared read access, returning [`None`] if a writer
    /// holds the lock explicitly.
    #[inline]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T, R>> {
        self.raw.try_read().then(|| RwLockReadGuard { lock: self, marker: PhantomData })
    }

    /// Acquires exclusive write access, spinning while the lock is held
    /// explicitly.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, T, R> {
        self.raw.write();
        RwLockWriteGuard { lock: self, marker: PhantomData }
    }

    /// Attempts to acquire exclusive write access, returning [`None`] if the
    /// lock is held explicitly.
    #[inline]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T, R>> {
        self.raw.try_write().then(|| RwLockWriteGuard { lock: self, marker: PhantomData })
    }
}

impl<T: ?Sized, R> RwLock<T, R> {
    /// Returns `true` if readers or a writer hold the lock explicitly.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns `true` if a writer holds the lock explicitly.
    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.raw.is_locked_exclusive()
    }

    /// Returns a mutable reference to the underlying data.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

#[cfg(not(all(loom, test)))]
impl<T: Default, R> Default for RwLock<T, R> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(not(all(loom, test)))]
impl<T, R> From<T> for RwLock<T, R> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug, R: Relax> Debug for RwLock<T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RwLock");
        match self.try_read() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// RAII structure used to release the shared read access of a lock when
/// dropped.
#[must_use = "if unused the RwLock will immediately unlock"]
pub struct RwLockReadGuard<'a, T: ?Sized, R> {
    lock: &'a RwLock<T, R>,
    marker: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync, R> Sync for RwLockReadGuard<'_, T, R> {}

impl<T: ?Sized, R> Deref for RwLockReadGuard<'_, T, R> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: Writers are excluded while the guard lives.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R> Drop for RwLockReadGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: Read access was acquired on this thread.
        unsafe { self.lock.raw.read_unlock() }
    }
}

/// RAII structure used to release the exclusive write access of a lock when
/// dropped.
#[must_use = "if unused the RwLock will immediately unlock"]
pub struct RwLockWriteGuard<'a, T: ?Sized, R> {
    lock: &'a RwLock<T, R>,
    marker: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync, R> Sync for RwLockWriteGuard<'_, T, R> {}

impl<T: ?Sized, R> Deref for RwLockWriteGuard<'_, T, R> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: Every other access is excluded while the guard lives.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R> DerefMut for RwLockWriteGuard<'_, T, R> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Every other access is excluded while the guard lives.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, R> Drop for RwLockWriteGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: Write access was acquired on this thread.
        unsafe { self.lock.raw.write_unlock() }
    }
}

impl<T: ?Sized + Debug, R> Debug for RwLockReadGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Display, R> Display for RwLockReadGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Debug, R> Debug for RwLockWriteGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Display, R> Display for RwLockWriteGuard<'_, T, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
