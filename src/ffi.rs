//! C ABI exports, for runtimes that keep their lock words outside of Rust.

use core::ffi::c_int;
use core::sync::atomic::AtomicI32;

/// Tries to enter the critical section protected by `*lock`
/// transactionally, see [`try_enter`].
///
/// Returns `1` when a transaction is open, `0` when the caller must acquire
/// the lock explicitly.
///
/// # Safety
///
/// `lock` must be non-null, aligned, and valid for reads for the duration of
/// the call. Concurrent writes must be atomic.
///
/// [`try_enter`]: crate::try_enter
#[no_mangle]
pub unsafe extern "C" fn rtmlock_try_enter(lock: *const i32) -> c_int {
    // SAFETY: `AtomicI32` has the same in-memory representation as `i32`,
    // and the caller guarantees the pointer is valid.
    let lock = unsafe { &*lock.cast::<AtomicI32>() };
    c_int::from(crate::try_enter(lock))
}

/// Returns `1` if the current thread runs inside a transaction, `0` otherwise.
#[no_mangle]
pub extern "C" fn rtmlock_test() -> c_int {
    c_int::from(crate::rtm::test())
}

/// Commits the transaction of the current thread.
///
/// # Safety
///
/// The current thread must be executing inside a transaction, see
/// [`rtm::end`].
///
/// [`rtm::end`]: crate::rtm::end
#[no_mangle]
pub unsafe extern "C" fn rtmlock_end() {
    // SAFETY: Caller guarantees a transaction is running.
    unsafe { crate::rtm::end() }
}

/// Returns the current value of the CPU cycle counter, see [`cycles::read`].
///
/// [`cycles::read`]: crate::cycles::read
#[no_mangle]
pub extern "C" fn rtmlock_rdtsc() -> u64 {
    crate::cycles::read()
}

#[cfg(all(test, not(loom)))]
mod test {
    use core::sync::atomic::{AtomicI32, Ordering::Relaxed};

    use super::{rtmlock_end, rtmlock_rdtsc, rtmlock_test, rtmlock_try_enter};

    #[test]
    fn try_enter_and_end() {
        let lock = AtomicI32::new(0);
        if unsafe { rtmlock_try_enter(lock.as_ptr()) } == 1 {
            assert_eq!(rtmlock_test(), 1);
            unsafe { rtmlock_end() };
        }
        assert_eq!(rtmlock_test(), 0);
        assert_eq!(lock.load(Relaxed), 0);
    }

    #[test]
    fn rdtsc_moves_forward() {
        let t1 = rtmlock_rdtsc();
        let t2 = rtmlock_rdtsc();
        assert!(t1 <= t2);
    }
}
