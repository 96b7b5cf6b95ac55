pub mod atomic {
    #[cfg(not(all(loom, test)))]
    pub use core::sync::atomic::AtomicI32;

    #[cfg(all(loom, test))]
    pub use loom::sync::atomic::AtomicI32;
}

pub mod hint {
    #[cfg(not(all(loom, test)))]
    pub use core::hint::spin_loop;

    #[cfg(all(loom, test))]
    pub use loom::hint::spin_loop;
}

#[cfg(any(feature = "yield", test))]
pub mod thread {
    #[cfg(not(all(loom, test)))]
    pub use std::thread::yield_now;

    #[cfg(all(loom, test))]
    pub use loom::thread::yield_now;
}
