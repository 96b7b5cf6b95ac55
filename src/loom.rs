//! Loom models of the explicit locking paths.
//!
//! Transactions cannot be modeled, so under Loom RTM is reported as not
//! supported and every acquisition takes the explicit path on the lock word.

use loom::cell::UnsafeCell;
use loom::sync::Arc;
use loom::{model, thread};

use crate::raw::{RawRwLock, RawSpinLock};
use crate::relax::Yield;

// Three or more threads make the models run for too long.
const THREADS: usize = 2;

struct Shared<L> {
    lock: L,
    value: UnsafeCell<usize>,
}

// SAFETY: `value` is only accessed while `lock` is held.
unsafe impl<L: Sync> Sync for Shared<L> {}

impl<L> Shared<L> {
    fn new(lock: L) -> Arc<Self> {
        Arc::new(Self { lock, value: UnsafeCell::new(0) })
    }

    fn get(&self) -> usize {
        self.value.with(|ptr| unsafe { *ptr })
    }

    fn inc(&self) {
        self.value.with_mut(|ptr| unsafe { *ptr += 1 });
    }
}

fn join_all<L, F>(shared: &Arc<Shared<L>>, f: F)
where
    L: Send + Sync + 'static,
    F: Fn(usize, &Shared<L>) + Copy + Send + 'static,
{
    let handles: std::vec::Vec<_> = (0..THREADS)
        .map(|run| {
            let shared = Arc::clone(shared);
            thread::spawn(move || f(run, &shared))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn spin_lock_join() {
    model(|| {
        let shared = Shared::new(RawSpinLock::<Yield>::new());
        join_all(&shared, |_, shared| {
            shared.lock.lock();
            shared.inc();
            unsafe { shared.lock.unlock() };
        });
        assert_eq!(shared.get(), THREADS);
        assert!(!shared.lock.is_locked());
    });
}

#[test]
fn spin_try_lock_join() {
    model(|| {
        let shared = Shared::new(RawSpinLock::<Yield>::new());
        join_all(&shared, |run, shared| {
            let locked = if run % 2 == 0 { shared.lock.try_lock() } else { shared.lock.lock(); true };
            if locked {
                shared.inc();
                unsafe { shared.lock.unlock() };
            }
        });
        assert!((1..=THREADS).contains(&shared.get()));
    });
}

#[test]
fn rwlock_write_join() {
    model(|| {
        let shared = Shared::new(RawRwLock::<Yield>::new());
        join_all(&shared, |_, shared| {
            shared.lock.write();
            shared.inc();
            unsafe { shared.lock.write_unlock() };
        });
        assert_eq!(shared.get(), THREADS);
    });
}

#[test]
fn rwlock_read_write_join() {
    model(|| {
        let shared = Shared::new(RawRwLock::<Yield>::new());
        join_all(&shared, |run, shared| {
            if run % 2 == 0 {
                shared.lock.read();
                let value = shared.get();
                unsafe { shared.lock.read_unlock() };
                assert!(value <= 1);
            } else {
                shared.lock.write();
                shared.inc();
                unsafe { shared.lock.write_unlock() };
            }
        });
        assert_eq!(shared.get(), 1);
        assert!(!shared.lock.is_locked());
    });
}
