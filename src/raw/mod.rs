//! Elided raw locks, without protected data.
//!
//! Every acquisition first tries to elide the lock with [`try_enter`]. When
//! elision succeeds, the lock word is left untouched and the critical section
//! runs inside a hardware transaction. Otherwise the lock word is acquired
//! explicitly, spinning with the relax policy `R` while it is busy.
//!
//! Unlocking inspects the lock word: a non-zero word was acquired explicitly
//! by the caller and is released, a zero word means the caller elided the
//! lock and the transaction is committed. A thread running inside an elided
//! section can never observe a non-zero word, since any explicit acquisition
//! by another thread aborts its transaction.
//!
//! Critical sections are thread bound: they must be released by the thread
//! that acquired them, because a transaction belongs to the thread that
//! started it.
//!
//! [`try_enter`]: crate::try_enter

mod rwlock;
mod spinlock;

pub use rwlock::RawRwLock;
pub use spinlock::RawSpinLock;
