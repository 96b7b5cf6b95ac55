use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::Arc;
use std::thread;

use rtmlock::{rtm, try_enter};

#[test]
fn free_word_is_never_written() {
    let lock = AtomicI32::new(0);
    for _ in 0..64 {
        if try_enter(&lock) {
            assert!(rtm::test());
            unsafe { rtm::end() };
        }
        assert!(!rtm::test());
    }
    assert_eq!(lock.load(Relaxed), 0);
}

#[test]
fn not_supported_means_never_elided() {
    if rtm::is_supported() {
        return;
    }
    let lock = AtomicI32::new(0);
    assert!(!try_enter(&lock));
    assert!(!rtm::test());
}

#[test]
fn elided_and_explicit_sections_exclude() {
    const THREADS: usize = 4;
    const ITERS: usize = 2000;

    struct Shared {
        lock: AtomicI32,
        value: std::cell::UnsafeCell<usize>,
    }
    unsafe impl Sync for Shared {}

    let shared = Arc::new(Shared { lock: AtomicI32::new(0), value: 0.into() });
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..ITERS {
                    if try_enter(&shared.lock) {
                        unsafe { *shared.value.get() += 1 };
                        unsafe { rtm::end() };
                        continue;
                    }
                    while shared.lock.compare_exchange_weak(0, 1, Acquire, Relaxed).is_err() {
                        std::hint::spin_loop();
                    }
                    unsafe { *shared.value.get() += 1 };
                    shared.lock.store(0, Release);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(unsafe { *shared.value.get() }, THREADS * ITERS);
    assert_eq!(shared.lock.load(Relaxed), 0);
}
