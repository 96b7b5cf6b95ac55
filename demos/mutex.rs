use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use rtmlock::mutex::spins::Mutex;

fn main() {
    const N: usize = 10;

    // Spawn a few threads to increment a shared variable (non-atomically), and
    // let the main thread know once all increments are done.
    //
    // Here we're using an Arc to share memory among threads, and the data inside
    // the Arc is protected with a mutex.
    let data = Arc::new(Mutex::new(0));

    let (tx, rx) = channel();
    for _ in 0..N {
        let (data, tx) = (data.clone(), tx.clone());
        thread::spawn(move || {
            // The critical section may run inside a hardware transaction, so
            // it must not perform system calls: the channel send happens
            // once the guard is gone.
            let done = {
                let mut data = data.lock();
                *data += 1;
                *data == N
            };
            if done {
                tx.send(()).unwrap();
            }
        });
    }
    let _message = rx.recv();

    let count = data.lock();
    assert_eq!(*count, N);
    // lock is unlock here when `count` goes out of scope.
}
