//! Lock elision: entering a critical section inside a hardware transaction.
//!
//! [`try_enter`] tries to start a transaction in which the lock word is
//! observed free. While that transaction runs, the lock word is part of its
//! read set, so any thread that takes the lock explicitly (by writing the
//! word) aborts it. Threads that elided the same lock never write the word,
//! and therefore run their critical sections concurrently, as long as their
//! data accesses do not conflict.
//!
//! Elision is an optimization only. Every caller must have an explicit
//! locking path on the same lock word for when [`try_enter`] returns `false`.

use core::sync::atomic::Ordering::Relaxed;

use crate::cfg::atomic::AtomicI32;
use crate::cycles::{Clock, Tsc};
use crate::relax::{Relax, Spin};
use crate::rtm::{Abort, Htm, Region, Status};

/// Maximum number of transactions a single [`try_enter`] call will begin.
pub const MAX_RETRIES: u32 = 20;

/// Tries to enter the critical section protected by `lock` transactionally.
///
/// Returns `true` when the current thread is now executing inside a hardware
/// transaction that observed `lock` free. The caller runs its critical
/// section speculatively and must commit it with [`rtm::end`]. If the
/// transaction aborts at any later point, memory and registers roll back and
/// execution resumes inside this function, which then retries or returns
/// `false`.
///
/// Returns `false` when no transaction is open, the caller must then acquire
/// `lock` explicitly. That happens when RTM is not supported, when the
/// transaction keeps aborting for [`MAX_RETRIES`] attempts, or as soon as an
/// abort is not worth retrying (capacity overflows, for example).
///
/// `lock` is only ever read: `0` means free, anything else means that some
/// thread holds it explicitly. After an abort, this function spins until the
/// explicit holder releases `lock` before it decides whether to retry.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicI32, Ordering};
///
/// let lock = AtomicI32::new(0);
/// let mut value = 0;
/// if rtmlock::try_enter(&lock) {
///     value += 1;
///     // SAFETY: `try_enter` returned `true`, a transaction is running.
///     unsafe { rtmlock::rtm::end() };
/// } else {
///     while lock.compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed).is_err() {}
///     value += 1;
///     lock.store(0, Ordering::Release);
/// }
/// assert_eq!(value, 1);
/// ```
///
/// [`rtm::end`]: crate::rtm::end
#[inline]
pub fn try_enter(lock: &AtomicI32) -> bool {
    enter(lock, Until(Spin))
}

/// As [`try_enter`], but gives up instead of waiting whenever `lock` is
/// found held explicitly.
#[inline]
pub(crate) fn try_enter_or_bail(lock: &AtomicI32) -> bool {
    enter(lock, Bail)
}

#[inline]
fn enter<W: Wait>(lock: &AtomicI32, mut wait: W) -> bool {
    match Region::select() {
        Region::Rtm(mut rtm) => try_enter_with(lock, &mut rtm, &mut Tsc, &mut wait, &mut Spin),
        // Nothing ever starts, so there is no holder worth waiting for.
        Region::Unsupported(mut stub) => {
            try_enter_with(lock, &mut stub, &mut Tsc, &mut Bail, &mut Spin)
        }
    }
}

/// How the elision loop waits for an explicit holder after an abort.
pub(crate) trait Wait {
    /// Returns once `lock` is free, or `false` to give up on elision.
    fn wait(&mut self, lock: &AtomicI32) -> bool;
}

/// Waits for the explicit holder, relaxing with `R`.
pub(crate) struct Until<R>(pub(crate) R);

impl<R: Relax> Wait for Until<R> {
    #[inline]
    fn wait(&mut self, lock: &AtomicI32) -> bool {
        while lock.load(Relaxed) != 0 {
            self.0.relax();
        }
        true
    }
}

/// Gives up as soon as the lock word is held.
pub(crate) struct Bail;

impl Wait for Bail {
    #[inline]
    fn wait(&mut self, lock: &AtomicI32) -> bool {
        lock.load(Relaxed) == 0
    }
}

/// What to do after a transaction aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Next {
    /// Contention on the lock word or on the data: back off, then retry.
    Backoff,
    /// The hardware hints that a retry may succeed.
    Retry,
    /// Retrying is pointless, take the explicit path.
    Fallback,
}

impl Next {
    fn after(abort: &Abort) -> Self {
        if abort.is_conflict() || abort.is_lock_busy() {
            Self::Backoff
        } else if abort.is_retry() {
            Self::Retry
        } else {
            Self::Fallback
        }
    }
}

/// Number of pause cycles to back off after `attempts` contended attempts.
///
/// The low three bits of the cycle counter, forced odd so never zero, are
/// doubled for every attempt already made.
fn backoff_pauses(cycles: u64, attempts: u32) -> u32 {
    let jitter = (cycles & 0x7) as u32 | 1;
    jitter << attempts
}

/// The elision loop, generic over the transactional region, the jitter
/// source, the way it waits for an explicit holder (`wait`) and the relax
/// strategy that backs off after contention (`backoff`).
pub(crate) fn try_enter_with<H, C, W, B>(
    lock: &AtomicI32,
    htm: &mut H,
    clock: &mut C,
    wait: &mut W,
    backoff: &mut B,
) -> bool
where
    H: Htm,
    C: Clock,
    W: Wait,
    B: Relax,
{
    let mut attempts = 0;
    while attempts < MAX_RETRIES {
        attempts += 1;

        let abort = match htm.begin() {
            Status::Started => {
                if lock.load(Relaxed) == 0 {
                    return true;
                }
                // On hardware this does not return, `begin` reports the abort.
                htm.abort_busy();
                Abort::LOCK_BUSY
            }
            Status::Aborted(abort) => abort,
        };

        // Let the explicit holder finish before starting over.
        if !wait.wait(lock) {
            break;
        }

        match Next::after(&abort) {
            Next::Backoff => {
                for _ in 0..backoff_pauses(clock.cycles(), attempts) {
                    backoff.relax();
                }
            }
            Next::Retry => {}
            Next::Fallback => break,
        }
    }
    false
}

#[cfg(all(test, not(loom)))]
mod test {
    use core::sync::atomic::Ordering::Relaxed;
    use std::vec::Vec;

    use super::{backoff_pauses, try_enter_with, Bail, Next, Until, MAX_RETRIES};
    use crate::cfg::atomic::AtomicI32;
    use crate::cycles::Clock;
    use crate::relax::Relax;
    use crate::rtm::{Abort, Htm, Status, Unsupported};

    const CONFLICT: u32 = 1 << 2;
    const RETRY: u32 = 1 << 1;
    const CAPACITY: u32 = 1 << 3;

    /// Replays a status per attempt and counts calls.
    struct Script<'a, F> {
        status: F,
        begins: u32,
        busy_aborts: u32,
        lock: &'a AtomicI32,
        hold_on_begin: bool,
    }

    impl<'a, F: FnMut(u32) -> Status> Script<'a, F> {
        fn new(lock: &'a AtomicI32, status: F) -> Self {
            Self { status, begins: 0, busy_aborts: 0, lock, hold_on_begin: false }
        }
    }

    unsafe impl<F: FnMut(u32) -> Status> Htm for Script<'_, F> {
        fn begin(&mut self) -> Status {
            self.begins += 1;
            if self.hold_on_begin {
                // Another thread takes the lock explicitly right after begin.
                self.lock.store(1, Relaxed);
            }
            (self.status)(self.begins)
        }

        fn abort_busy(&mut self) {
            self.busy_aborts += 1;
            if self.hold_on_begin {
                self.lock.store(0, Relaxed);
            }
        }
    }

    /// Returns a fixed cycle count and records every read.
    struct FixedClock {
        cycles: u64,
        reads: u32,
    }

    impl Clock for FixedClock {
        fn cycles(&mut self) -> u64 {
            self.reads += 1;
            self.cycles
        }
    }

    /// Counts relax calls without spinning.
    struct Count(u64);

    impl Relax for Count {
        fn new() -> Self {
            Self(0)
        }

        fn relax(&mut self) {
            self.0 += 1;
        }
    }

    fn aborted(raw: u32) -> Status {
        Status::Aborted(Abort::from_raw(raw))
    }

    #[test]
    fn started_free_lock_enters_at_once() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |_| Status::Started);
        let mut clock = FixedClock { cycles: 5, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, 1);
        assert_eq!(htm.busy_aborts, 0);
        assert_eq!(clock.reads, 0);
        assert_eq!(wait.0 .0, 0);
        assert_eq!(backoff.0, 0);
    }

    #[test]
    fn always_conflicting_exhausts_retries() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |_| aborted(CONFLICT | RETRY));
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, MAX_RETRIES);
        assert_eq!(clock.reads, MAX_RETRIES);
        // Jitter is 1 for a zero clock: 2 + 4 + ... + 2^20.
        assert_eq!(backoff.0, (1 << (MAX_RETRIES + 1)) - 2);
        assert_eq!(wait.0 .0, 0);
    }

    #[test]
    fn capacity_abort_falls_back_early() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |n| aborted(if n < 3 { RETRY } else { CAPACITY }));
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, 3);
        assert_eq!(clock.reads, 0);
        assert_eq!(backoff.0, 0);
    }

    #[test]
    fn retry_hint_retries_without_backoff() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |n| if n < 4 { aborted(RETRY) } else { Status::Started });
        let mut clock = FixedClock { cycles: 7, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, 4);
        assert_eq!(backoff.0, 0);
    }

    #[test]
    fn unclassified_abort_falls_back() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |_| aborted(0));
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, 1);
    }

    #[test]
    fn busy_lock_never_enters() {
        let lock = AtomicI32::new(0);
        let mut htm = Script::new(&lock, |_| Status::Started);
        htm.hold_on_begin = true;
        let mut clock = FixedClock { cycles: 2, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(htm.begins, MAX_RETRIES);
        assert_eq!(htm.busy_aborts, MAX_RETRIES);
        // Jitter is 3 for a clock of 2.
        assert_eq!(backoff.0, 3 * ((1 << (MAX_RETRIES + 1)) - 2));
    }

    #[test]
    fn waits_for_explicit_holder() {
        struct Release<'a> {
            lock: &'a AtomicI32,
            spins: u32,
        }

        impl Relax for Release<'_> {
            fn new() -> Self {
                unreachable!()
            }

            fn relax(&mut self) {
                self.spins += 1;
                if self.spins == 10 {
                    self.lock.store(0, Relaxed);
                }
            }
        }

        let lock = AtomicI32::new(1);
        let mut htm = Script::new(&lock, |n| if n == 1 { aborted(CONFLICT) } else { Status::Started });
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let mut wait = Until(Release { lock: &lock, spins: 0 });
        let mut backoff = Count::new();
        assert!(try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(wait.0.spins, 10);
        assert_eq!(htm.begins, 2);
        assert_eq!(backoff.0, 2);
    }

    #[test]
    fn bail_gives_up_on_held_word() {
        let lock = AtomicI32::new(1);
        let mut htm = Script::new(&lock, |_| aborted(CONFLICT | RETRY));
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let mut backoff = Count::new();
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut Bail, &mut backoff));
        assert_eq!(htm.begins, 1);
        assert_eq!(clock.reads, 0);
        assert_eq!(backoff.0, 0);
        assert_eq!(lock.load(Relaxed), 1);
    }

    #[test]
    fn bail_gives_up_after_busy_abort() {
        let lock = AtomicI32::new(1);
        let mut htm = Script::new(&lock, |_| Status::Started);
        let mut clock = FixedClock { cycles: 0, reads: 0 };
        let mut backoff = Count::new();
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut Bail, &mut backoff));
        assert_eq!(htm.begins, 1);
        assert_eq!(htm.busy_aborts, 1);
        assert_eq!(backoff.0, 0);
    }

    #[test]
    fn unsupported_region_never_waits() {
        for word in [0, 1] {
            let lock = AtomicI32::new(word);
            let mut clock = FixedClock { cycles: 0, reads: 0 };
            let mut backoff = Count::new();
            assert!(!try_enter_with(&lock, &mut Unsupported, &mut clock, &mut Bail, &mut backoff));
            assert_eq!(clock.reads, 0);
            assert_eq!(backoff.0, 0);
        }
    }

    #[test]
    fn lock_word_is_never_written() {
        let lock = AtomicI32::new(0);
        let statuses = [aborted(CONFLICT), aborted(RETRY), aborted(0xff00_0001), aborted(CAPACITY)];
        let mut htm = Script::new(&lock, |n| statuses[(n as usize - 1) % statuses.len()]);
        let mut clock = FixedClock { cycles: 1, reads: 0 };
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(!try_enter_with(&lock, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(lock.load(Relaxed), 0);
        assert_eq!(htm.begins, 4);

        let held = AtomicI32::new(0);
        let mut htm = Script::new(&held, |_| Status::Started);
        let (mut wait, mut backoff) = (Until(Count::new()), Count::new());
        assert!(try_enter_with(&held, &mut htm, &mut clock, &mut wait, &mut backoff));
        assert_eq!(held.load(Relaxed), 0);
    }

    #[test]
    fn backoff_is_nonzero_and_grows() {
        for cycles in 0..16u64 {
            let pauses: Vec<_> = (1..=MAX_RETRIES).map(|n| backoff_pauses(cycles, n)).collect();
            assert!(pauses.iter().all(|&p| p > 0));
            assert!(pauses.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(pauses[0], ((cycles & 0x7) as u32 | 1) << 1);
        }
    }

    #[test]
    fn classify_aborts() {
        assert_eq!(Next::after(&Abort::from_raw(CONFLICT)), Next::Backoff);
        assert_eq!(Next::after(&Abort::LOCK_BUSY), Next::Backoff);
        assert_eq!(Next::after(&Abort::explicit(0x01)), Next::Fallback);
        assert_eq!(Next::after(&Abort::from_raw(0x0100_0003)), Next::Retry);
        assert_eq!(Next::after(&Abort::from_raw(RETRY)), Next::Retry);
        assert_eq!(Next::after(&Abort::from_raw(CAPACITY | RETRY)), Next::Retry);
        assert_eq!(Next::after(&Abort::from_raw(CAPACITY)), Next::Fallback);
        assert_eq!(Next::after(&Abort::from_raw(1 << 4)), Next::Fallback);
        assert_eq!(Next::after(&Abort::from_raw(1 << 5)), Next::Fallback);
    }

    #[test]
    fn hardware_entry_commits() {
        let lock = AtomicI32::new(0);
        let mut value = 0;
        if super::try_enter(&lock) {
            value += 1;
            unsafe { crate::rtm::end() };
        } else {
            value += 1;
        }
        assert_eq!(value, 1);
        assert_eq!(lock.load(Relaxed), 0);
        if !crate::rtm::is_supported() {
            assert!(!super::try_enter(&lock));
            assert!(!super::try_enter(&AtomicI32::new(1)));
        }
    }

    #[test]
    fn held_word_bails_on_hardware() {
        let lock = AtomicI32::new(1);
        assert!(!super::try_enter_or_bail(&lock));
        assert!(!crate::rtm::test());
        assert_eq!(lock.load(Relaxed), 1);
    }
}
