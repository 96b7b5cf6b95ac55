use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

// Requires the `lock_api` feature.
//
// You may export this types to your callers, change the inner raw lock type
// (as long as it implements the same raw interfaces), without breaking their
// code.
pub type Mutex<T> = rtmlock::lock_api::spins::Mutex<T>;
pub type RwLock<T> = rtmlock::lock_api::spins::RwLock<T>;

fn main() {
    const N: usize = 10;

    let data = Arc::new(Mutex::new(0));
    let seen = Arc::new(RwLock::new(Vec::with_capacity(N)));

    let (tx, rx) = channel();
    for n in 0..N {
        let (data, seen, tx) = (data.clone(), seen.clone(), tx.clone());
        thread::spawn(move || {
            let done = {
                let mut data = data.lock();
                *data += 1;
                *data == N
            };
            // Pushing may allocate, which aborts an elided section and
            // retries it with the lock word held.
            seen.write().push(n);
            if done {
                tx.send(()).unwrap();
            }
        });
    }
    let _message = rx.recv();

    // Would return `None` if lock was held explicitly.
    let count = data.try_lock().unwrap();
    assert_eq!(*count, N);
}
