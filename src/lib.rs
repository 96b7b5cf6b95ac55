//! Hardware lock elision for spin locks, built on Intel's Restricted
//! Transactional Memory (RTM).
//!
//! Lock elision runs a critical section inside a hardware transaction
//! instead of writing the lock word. The transaction only reads the lock
//! word, so any number of threads can run their critical sections in
//! parallel, and the hardware rolls a transaction back when its memory
//! accesses conflict with another thread. When transactions keep aborting,
//! or the CPU does not support them, the lock word is acquired explicitly
//! with an ordinary spin lock protocol.
//!
//! The heart of the crate is [`try_enter`], a single elision attempt on a
//! caller owned lock word. It retries aborted transactions a bounded number
//! of times, backing off with cycle counter jitter when the abort was caused
//! by contention. Built on it, the crate provides:
//!
//! - [`raw::RawSpinLock`] and [`raw::RawRwLock`], data-less elided locks;
//! - [`mutex::Mutex`] and [`rwlock::RwLock`], elided locks that own their data;
//! - implementations of the [`lock_api`] raw traits, with the `lock_api` feature.
//!
//! Support for RTM is detected at runtime, once, and cached, see
//! [`rtm::is_supported`]. Processors without RTM, and non-x86_64 targets,
//! always take the explicit path.
//!
//! ## Use cases
//!
//! Elision pays off for short critical sections that mostly touch disjoint
//! data behind a single coarse lock. Critical sections that perform system
//! calls, take page faults or touch more cache lines than the transactional
//! buffers can hold always abort and will only add latency.
//!
//! ## Features
//!
//! This crate does not provide any default features. Features that can be
//! enabled are:
//!
//! ### yield
//!
//! The `yield` feature requires linking to the standard library, so it is not
//! suitable for `no_std` environments. It provides relax policies that call
//! [`std::thread::yield_now`] while the lock word is held explicitly. Together
//! with `lock_api`, it also enables the reentrant mutex aliases under
//! `lock_api::reentrant`, which identify threads with a std thread local.
//!
//! ### lock_api
//!
//! Implements [`lock_api::RawMutex`] and [`lock_api::RawRwLock`] for the raw
//! locks and exposes [`lock_api::Mutex`] and [`lock_api::RwLock`] aliases
//! under the [`lock_api`](mod@crate::lock_api) module.
//!
//! ### ffi
//!
//! Exports [`try_enter`], [`rtm::test`], [`rtm::end`] and [`cycles::read`]
//! with the C ABI.
//!
//! [`std::thread::yield_now`]: https://doc.rust-lang.org/std/thread/fn.yield_now.html
//! [`lock_api`]: https://docs.rs/lock_api/latest/lock_api
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html
//! [`lock_api::RawRwLock`]: https://docs.rs/lock_api/latest/lock_api/trait.RawRwLock.html
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [`lock_api::RwLock`]: https://docs.rs/lock_api/latest/lock_api/struct.RwLock.html

#![cfg_attr(all(not(feature = "yield"), not(test)), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

pub mod cycles;
pub mod mutex;
pub mod raw;
pub mod relax;
pub mod rtm;
pub mod rwlock;

pub use elide::{try_enter, MAX_RETRIES};

#[cfg(all(feature = "lock_api", not(loom)))]
#[cfg_attr(docsrs, doc(cfg(feature = "lock_api")))]
pub mod lock_api;

#[cfg(all(feature = "ffi", not(loom)))]
#[cfg_attr(docsrs, doc(cfg(feature = "ffi")))]
pub mod ffi;

pub(crate) mod cfg;
pub(crate) mod elide;
pub(crate) mod lock;

#[cfg(all(loom, test))]
#[cfg(not(tarpaulin))]
pub(crate) mod loom;
