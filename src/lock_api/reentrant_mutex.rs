use core::num::NonZeroUsize;

use crate::raw::RawSpinLock;

/// A [`lock_api::ReentrantMutex`] alias that wraps a [`RawSpinLock`].
///
/// The owner is tracked by [`ThreadId`], the recursion count by
/// `lock_api`. When the outermost acquisition is elided, the owner and the
/// count are only written inside the transaction, so concurrent elided
/// owners always conflict and at most one of them commits.
///
/// [`lock_api::ReentrantMutex`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutex.html
pub type ReentrantMutex<T, R> = lock_api::ReentrantMutex<RawSpinLock<R>, ThreadId, T>;

/// A [`lock_api::ReentrantMutexGuard`] alias that wraps a [`RawSpinLock`].
///
/// [`lock_api::ReentrantMutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.ReentrantMutexGuard.html
pub type ReentrantMutexGuard<'a, T, R> =
    lock_api::ReentrantMutexGuard<'a, RawSpinLock<R>, ThreadId, T>;

// The address of a thread local is unique among live threads and never zero.
std::thread_local! {
    static KEY: u8 = const { 0 }
}

/// Identifies the current thread by the address of a thread local.
///
/// Reading it does not allocate nor issue system calls, so it can run inside
/// an elided critical section.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadId;

// SAFETY: Two live threads never share the address of a thread local.
unsafe impl lock_api::GetThreadId for ThreadId {
    const INIT: Self = Self;

    #[inline]
    fn nonzero_thread_id(&self) -> NonZeroUsize {
        let addr = KEY.with(|key| key as *const u8 as usize);
        NonZeroUsize::new(addr).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use lock_api::GetThreadId;

    use super::ThreadId;
    use crate::lock_api::reentrant::ReentrantMutex;

    #[test]
    fn thread_ids_differ() {
        let here = ThreadId.nonzero_thread_id();
        assert_eq!(here, ThreadId.nonzero_thread_id());
        let there = thread::spawn(|| ThreadId.nonzero_thread_id().get()).join().unwrap();
        assert_ne!(here.get(), there);
    }

    #[test]
    fn relock_on_same_thread() {
        let m = ReentrantMutex::new(1);
        let a = m.lock();
        let b = m.lock();
        assert_eq!(*a + *b, 2);
        let c = m.try_lock().unwrap();
        assert_eq!(*c, 1);
    }

    #[test]
    fn other_thread_blocked_until_all_guards_drop() {
        let m = ReentrantMutex::new(0);
        let outer = m.lock();
        let inner = m.lock();
        // Spawning a thread aborts an elided section, so the lock word is
        // held explicitly from here on.
        thread::scope(|s| {
            s.spawn(|| assert!(m.try_lock().is_none()));
        });
        drop(inner);
        thread::scope(|s| {
            s.spawn(|| assert!(m.try_lock().is_none()));
        });
        drop(outer);
        thread::scope(|s| {
            s.spawn(|| assert!(m.try_lock().is_some()));
        });
    }

    #[test]
    fn lock_waits_for_owner() {
        let m = Arc::new(ReentrantMutex::new(()));
        let acquired = Arc::new(AtomicBool::new(false));
        let outer = m.lock();
        let inner = m.lock();
        let handle = thread::spawn({
            let (m, acquired) = (Arc::clone(&m), Arc::clone(&acquired));
            move || {
                let _guard = m.lock();
                acquired.store(true, Ordering::SeqCst);
            }
        });
        // The owner holds the word explicitly once the spawn aborted it.
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(inner);
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(outer);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
