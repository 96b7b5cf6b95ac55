//! Restricted Transactional Memory primitives.
//!
//! This module exposes the pieces of Intel TSX that lock elision is built
//! from: starting a transaction ([`Htm::begin`]), aborting it because the
//! lock word was found busy ([`Htm::abort_busy`]), testing whether the
//! current thread is running transactionally ([`test`]) and committing the
//! transaction ([`end`]).
//!
//! Support for RTM is detected the first time [`is_supported`] is called and
//! the answer is cached for the rest of the process. When RTM is not
//! supported, transactional begins are never executed and every lock in this
//! crate goes straight to its explicit locking path.

use core::fmt;

#[cfg(all(target_arch = "x86_64", not(all(loom, test))))]
mod x86;
#[cfg(all(target_arch = "x86_64", not(all(loom, test))))]
use x86 as imp;

#[cfg(not(all(target_arch = "x86_64", not(all(loom, test)))))]
mod unsupported;
#[cfg(not(all(target_arch = "x86_64", not(all(loom, test)))))]
use unsupported as imp;

/// Explicit abort code used by elision when the lock word is found held
/// inside a transaction.
///
/// It must not be used for any other explicit abort, otherwise unrelated
/// aborts would be classified as lock contention and backed off.
pub(crate) const LOCK_BUSY: u8 = 0xff;

/// The outcome of starting a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The transaction is running, the current thread executes speculatively.
    Started,
    /// The transaction did not start, or it aborted and rolled back.
    Aborted(Abort),
}

impl Status {
    /// The raw value `xbegin` leaves in `eax` when the transaction started.
    pub const STARTED: u32 = !0;

    /// Decodes the raw `eax` value produced by `xbegin`.
    ///
    /// # Example
    ///
    /// ```
    /// use rtmlock::rtm::Status;
    ///
    /// assert_eq!(Status::from_raw(Status::STARTED), Status::Started);
    /// let abort = Status::from_raw(1 << 2).aborted().unwrap();
    /// assert!(abort.is_conflict());
    /// ```
    pub const fn from_raw(raw: u32) -> Self {
        if raw == Self::STARTED {
            Self::Started
        } else {
            Self::Aborted(Abort::from_raw(raw))
        }
    }

    /// Returns `true` if the transaction started.
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Returns the abort classification, if the transaction did not start.
    pub const fn aborted(self) -> Option<Abort> {
        match self {
            Self::Started => None,
            Self::Aborted(abort) => Some(abort),
        }
    }
}

/// Why a transaction aborted.
///
/// The hardware reports the reasons as a bitset, more than one of them may be
/// set for a single abort. A zero status, with no reason at all, is reported
/// for aborts the processor does not classify (interrupts, for example).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Abort {
    raw: u32,
}

impl Abort {
    const EXPLICIT: u32 = 1 << 0;
    const RETRY: u32 = 1 << 1;
    const CONFLICT: u32 = 1 << 2;
    const CAPACITY: u32 = 1 << 3;
    const DEBUG: u32 = 1 << 4;
    const NESTED: u32 = 1 << 5;
    const CODE_SHIFT: u32 = 24;

    /// The abort status elision produces when it finds the lock word busy.
    pub(crate) const LOCK_BUSY: Self = Self::explicit(LOCK_BUSY);

    /// Decodes an abort status from the raw `eax` value.
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    /// An explicit abort, as if `xabort` had been executed with `code`.
    ///
    /// The hardware only sets the retry hint for explicit aborts when the
    /// transaction could succeed on retry, it is left clear here.
    pub const fn explicit(code: u8) -> Self {
        Self::from_raw(Self::EXPLICIT | (code as u32) << Self::CODE_SHIFT)
    }

    /// Returns the raw status bits.
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Returns the `xabort` code if the transaction was explicitly aborted.
    pub const fn code(&self) -> Option<u8> {
        if self.raw & Self::EXPLICIT != 0 {
            Some((self.raw >> Self::CODE_SHIFT) as u8)
        } else {
            None
        }
    }

    /// The hardware hints that retrying the transaction may succeed.
    pub const fn is_retry(&self) -> bool {
        self.raw & Self::RETRY != 0
    }

    /// Another logical processor conflicted with a memory address that was
    /// part of the aborted transaction.
    pub const fn is_conflict(&self) -> bool {
        self.raw & Self::CONFLICT != 0
    }

    /// An internal buffer overflowed.
    pub const fn is_capacity(&self) -> bool {
        self.raw & Self::CAPACITY != 0
    }

    /// A debug breakpoint was hit.
    pub const fn is_debug(&self) -> bool {
        self.raw & Self::DEBUG != 0
    }

    /// The abort happened during a nested transaction.
    pub const fn is_nested(&self) -> bool {
        self.raw & Self::NESTED != 0
    }

    /// Elision found the lock word held inside its transaction.
    pub const fn is_lock_busy(&self) -> bool {
        matches!(self.code(), Some(LOCK_BUSY))
    }
}

impl fmt::Debug for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Abort")
            .field("code", &self.code())
            .field("retry", &self.is_retry())
            .field("conflict", &self.is_conflict())
            .field("capacity", &self.is_capacity())
            .field("debug", &self.is_debug())
            .field("nested", &self.is_nested())
            .finish()
    }
}

/// A transactional region capability.
///
/// # Safety
///
/// When [`begin`] returns [`Status::Started`], the current thread must be
/// executing inside a transaction that [`end`] commits and that
/// [`abort_busy`] rolls back. A hardware implementation never returns from
/// `abort_busy` inside a transaction: control resumes at [`begin`], which then
/// reports the abort. Implementations that can return from `abort_busy` are
/// test doubles; the caller treats the return as an abort with the lock-busy
/// code.
///
/// [`begin`]: Htm::begin
/// [`abort_busy`]: Htm::abort_busy
pub unsafe trait Htm {
    /// Starts a transaction.
    fn begin(&mut self) -> Status;

    /// Aborts the running transaction with the lock-busy code.
    fn abort_busy(&mut self);
}

/// The hardware backed transactional region.
///
/// It can only be obtained through [`Rtm::detect`], which checks that the
/// CPU supports RTM.
#[derive(Clone, Copy, Debug)]
pub struct Rtm(());

impl Rtm {
    /// Returns the hardware transactional region, if the CPU supports it.
    #[inline]
    pub fn detect() -> Option<Self> {
        is_supported().then_some(Self(()))
    }
}

// SAFETY: Only constructed after `is_supported` returned `true`, and both
// methods are the raw `xbegin` and `xabort` instructions.
unsafe impl Htm for Rtm {
    #[inline(always)]
    fn begin(&mut self) -> Status {
        // SAFETY: RTM support was checked by `Rtm::detect`.
        Status::from_raw(unsafe { imp::xbegin() })
    }

    #[inline(always)]
    fn abort_busy(&mut self) {
        // SAFETY: RTM support was checked by `Rtm::detect`.
        unsafe { imp::xabort_busy() }
    }
}

/// A transactional region that never starts.
///
/// Every begin reports an abort without the retry hint, so elision gives up
/// on its first attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;

// SAFETY: `begin` never reports `Started`.
unsafe impl Htm for Unsupported {
    #[inline(always)]
    fn begin(&mut self) -> Status {
        Status::Aborted(Abort::default())
    }

    #[inline(always)]
    fn abort_busy(&mut self) {}
}

/// The transactional region selected for this process.
///
/// Selection follows [`is_supported`], so the CPU is queried once and every
/// later selection returns the same variant.
#[derive(Clone, Copy, Debug)]
pub enum Region {
    /// The CPU supports RTM.
    Rtm(Rtm),
    /// Transactions never start, every lock takes its explicit path.
    Unsupported(Unsupported),
}

impl Region {
    /// Selects the transactional region this CPU supports.
    #[inline]
    pub fn select() -> Self {
        match Rtm::detect() {
            Some(rtm) => Self::Rtm(rtm),
            None => Self::Unsupported(Unsupported),
        }
    }
}

/// Returns `true` if the CPU supports Restricted Transactional Memory.
///
/// The CPU is only queried on the first call, the answer is cached for the
/// rest of the process. Processors that advertise RTM but force every
/// transaction to abort (`RTM_ALWAYS_ABORT`) are reported as unsupported.
#[inline]
pub fn is_supported() -> bool {
    imp::is_supported()
}

/// Returns `true` if the current thread is executing inside a transaction.
///
/// Always `false` when RTM is not supported.
#[inline]
pub fn test() -> bool {
    // SAFETY: RTM support was checked.
    is_supported() && unsafe { imp::xtest() }
}

/// Commits the transaction of the current thread.
///
/// # Safety
///
/// The current thread must be executing inside a transaction, that is, a call
/// to [`test`] would return `true`. Committing outside a transaction raises a
/// general protection fault.
#[inline]
pub unsafe fn end() {
    debug_assert!(test(), "committing outside of a transaction");
    // SAFETY: Caller guarantees a transaction is running.
    unsafe { imp::xend() }
}
