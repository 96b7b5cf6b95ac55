use core::arch::asm;
use core::arch::x86_64::{__cpuid, __cpuid_count};
use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering::Relaxed;

const UNKNOWN: u8 = 0;
const UNSUPPORTED: u8 = 1;
const SUPPORTED: u8 = 2;

static RTM: AtomicU8 = AtomicU8::new(UNKNOWN);

#[inline]
pub fn is_supported() -> bool {
    match RTM.load(Relaxed) {
        UNKNOWN => detect(),
        state => state == SUPPORTED,
    }
}

// Racing threads compute the same answer, the last store wins.
#[cold]
fn detect() -> bool {
    let supported = cpuid_rtm();
    RTM.store(if supported { SUPPORTED } else { UNSUPPORTED }, Relaxed);
    log::debug!("restricted transactional memory supported: {supported}");
    supported
}

fn cpuid_rtm() -> bool {
    const RTM_EBX: u32 = 1 << 11;
    const RTM_ALWAYS_ABORT_EDX: u32 = 1 << 11;

    // SAFETY: `cpuid` is always available on x86_64.
    let max_leaf = unsafe { __cpuid(0) }.eax;
    if max_leaf < 7 {
        return false;
    }
    // SAFETY: leaf 7 was checked against the maximum supported leaf.
    let leaf = unsafe { __cpuid_count(7, 0) };
    leaf.ebx & RTM_EBX != 0 && leaf.edx & RTM_ALWAYS_ABORT_EDX == 0
}

// The TSX instructions are emitted as raw bytes so that they assemble
// regardless of the `rtm` target feature.

/// `xbegin` with its fallback address set to the next instruction.
///
/// Returns `!0` once the transaction started. On abort, execution resumes
/// right after `xbegin` with registers and memory rolled back and the abort
/// status in `eax`.
///
/// # Safety
///
/// The CPU must support RTM.
#[inline(always)]
pub unsafe fn xbegin() -> u32 {
    let mut status = !0u32;
    // SAFETY: Caller guarantees RTM support.
    unsafe {
        asm!(".byte 0xc7, 0xf8", ".long 0", inout("eax") status, options(nostack));
    }
    status
}

/// `xabort 0xff`, a no-op outside of a transaction.
///
/// # Safety
///
/// The CPU must support RTM.
#[inline(always)]
pub unsafe fn xabort_busy() {
    // The immediate byte must match `LOCK_BUSY`.
    const _: () = assert!(super::LOCK_BUSY == 0xff);
    // SAFETY: Caller guarantees RTM support.
    unsafe {
        asm!(".byte 0xc6, 0xf8, 0xff", options(nostack));
    }
}

/// `xend`.
///
/// # Safety
///
/// The CPU must support RTM and a transaction must be running.
#[inline(always)]
pub unsafe fn xend() {
    // SAFETY: Caller guarantees RTM support and an active transaction.
    unsafe {
        asm!(".byte 0x0f, 0x01, 0xd5", options(nostack));
    }
}

/// `xtest`.
///
/// # Safety
///
/// The CPU must support RTM.
#[inline(always)]
pub unsafe fn xtest() -> bool {
    let out: u8;
    // SAFETY: Caller guarantees RTM support.
    unsafe {
        asm!(".byte 0x0f, 0x01, 0xd6", "setnz {}", out(reg_byte) out, options(nomem, nostack));
    }
    out != 0
}
