//! Targets without RTM, and Loom models.

#[inline(always)]
pub fn is_supported() -> bool {
    false
}

#[inline(always)]
pub unsafe fn xbegin() -> u32 {
    unreachable!("transaction started without RTM support")
}

#[inline(always)]
pub unsafe fn xabort_busy() {}

#[inline(always)]
pub unsafe fn xend() {
    unreachable!("transaction committed without RTM support")
}

#[inline(always)]
pub unsafe fn xtest() -> bool {
    false
}
