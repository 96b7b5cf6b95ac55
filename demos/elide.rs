use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::Arc;
use std::thread;

// A caller owned lock word, elided with `try_enter` and acquired explicitly
// with a compare and swap whenever elision fails.
struct Counter {
    lock: AtomicI32,
    value: std::cell::UnsafeCell<u64>,
}

unsafe impl Sync for Counter {}

impl Counter {
    fn inc(&self) -> bool {
        if rtmlock::try_enter(&self.lock) {
            unsafe { *self.value.get() += 1 };
            // SAFETY: `try_enter` returned `true`.
            unsafe { rtmlock::rtm::end() };
            return true;
        }
        while self.lock.compare_exchange_weak(0, 1, Acquire, Relaxed).is_err() {
            while self.lock.load(Relaxed) != 0 {
                std::hint::spin_loop();
            }
        }
        unsafe { *self.value.get() += 1 };
        self.lock.store(0, Release);
        false
    }
}

fn main() {
    const THREADS: usize = 4;
    const ITERS: usize = 100_000;

    println!("rtm supported: {}", rtmlock::rtm::is_supported());

    let counter = Arc::new(Counter { lock: AtomicI32::new(0), value: 0.into() });
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || (0..ITERS).filter(|_| counter.inc()).count())
        })
        .collect();
    let elided: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let total = unsafe { *counter.value.get() };
    assert_eq!(total, (THREADS * ITERS) as u64);
    println!("{total} increments, {elided} elided");
}
