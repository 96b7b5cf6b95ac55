//! Free-running CPU cycle counter.
//!
//! The counter is read without any serializing instruction, so the value may
//! be sampled slightly before or after the surrounding instructions retire.
//! That is fine for its only consumer in this crate, which uses the low bits
//! as entropy for the elision backoff.

/// Returns the current value of the CPU cycle counter.
///
/// On x86 this is `rdtsc`, whose two 32-bit halves (`edx:eax`) are composed
/// into a single `u64`. On aarch64 it reads the virtual counter `cntvct_el0`.
/// Other targets have no user space cycle counter, so a process wide tick
/// count is returned instead, which is still monotonic.
///
/// # Example
///
/// ```
/// let t1 = rtmlock::cycles::read();
/// let t2 = rtmlock::cycles::read();
/// assert!(t1 <= t2);
/// ```
#[inline]
pub fn read() -> u64 {
    imp::read()
}

/// A source of cycle counts, used to seed backoff jitter.
pub trait Clock {
    /// Returns the current cycle count.
    fn cycles(&mut self) -> u64;
}

/// The [`Clock`] backed by the CPU cycle counter, see [`read`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Tsc;

impl Clock for Tsc {
    #[inline(always)]
    fn cycles(&mut self) -> u64 {
        read()
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod imp {
    use core::arch::asm;

    #[inline(always)]
    pub fn read() -> u64 {
        let lo: u32;
        let hi: u32;
        // SAFETY: `rdtsc` is available on every x86 CPU Rust supports and it
        // only writes to `eax` and `edx`.
        unsafe {
            asm!("rdtsc", out("eax") lo, out("edx") hi, options(nomem, nostack, preserves_flags));
        }
        (u64::from(hi) << 32) | u64::from(lo)
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use core::arch::asm;

    #[inline(always)]
    pub fn read() -> u64 {
        let cnt: u64;
        // SAFETY: `cntvct_el0` is readable from EL0 on every aarch64 OS Rust
        // supports.
        unsafe {
            asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nomem, nostack, preserves_flags));
        }
        cnt
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
mod imp {
    use core::sync::atomic::{AtomicUsize, Ordering::Relaxed};

    static TICKS: AtomicUsize = AtomicUsize::new(0);

    #[inline]
    pub fn read() -> u64 {
        TICKS.fetch_add(1, Relaxed) as u64
    }
}
