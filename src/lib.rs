//! # Remutex
//!
//! **Remutex** is a re-entrant mutual-exclusion primitive for threads that
//! share nothing but a block of atomic memory cells, designed as the
//! cross-thread coordination layer for the **Nebula** ecosystem.
//!
//! Unlike `std::sync::Mutex`, a [`SharedMutex`] carries no OS mutex handle
//! and wraps no value. All of its state lives in three 32-bit cells of a
//! [`SharedBlock`] — flag, owner, recursion depth — mutated only through
//! sequentially consistent atomic operations. Any thread holding a clone of
//! the block can build an equivalent handle over the same slot, so unrelated
//! threads (a coordinating main thread included) can serialize access to
//! arbitrary shared state, and the owning thread can re-acquire its own lock
//! without deadlocking itself.
//!
//! Remutex offers:
//!
//! - A **blocking engine** ([`SharedMutex::lock`]) that parks contended
//!   threads on the flag cell with the OS futex-style wait instead of
//!   spinning
//! - An **async engine** ([`SharedMutex::lock_async`]) that suspends only
//!   the task, with a native-wait strategy and a linear back-off polling
//!   fallback resolved once per process
//! - **Re-entrancy bookkeeping** with deterministic corruption detection on
//!   the recursion counter
//! - **Many mutexes per block**: slots are independent 12-byte strides, so
//!   one allocation can back a whole family of locks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use remutex::{SharedBlock, SharedMutex};
//!
//! let block = SharedBlock::new(1)?;
//! let mutex = SharedMutex::new(block.clone())?;
//!
//! let worker = std::thread::spawn(move || {
//!     let mutex = SharedMutex::new(block).unwrap();
//!     mutex.lock().unwrap();
//!     // ... critical section ...
//!     mutex.unlock().unwrap();
//! });
//!
//! mutex.lock()?;
//! // ... critical section ...
//! mutex.unlock()?;
//! ```
//!
//! ## Guarantees and non-guarantees
//!
//! At every externally observable point, at most one thread owns a slot,
//! and the recursion depth is positive exactly while the slot is locked.
//! No fairness is promised: when a lock is released, any waiter may win
//! the next race regardless of how long it waited. There are no timeouts
//! and no deadlock detection; bounded waiting is the caller's concern.
//!
//! ## Modules
//!
//! The crate surface is intentionally small: blocks, handles, the lock
//! future, and the error taxonomy, plus [`pending_async_waits`] for
//! embedders that need to know whether lock waits are in flight.

mod block;
mod error;
mod mutex;
mod thread_id;
mod wait;

pub use block::{BYTES_PER_MUTEX, CELL_SIZE, CELLS_PER_MUTEX, MAX_MUTEXES, SharedBlock};
pub use error::Error;
pub use mutex::{LockFuture, SharedMutex};
pub use wait::pending_async_waits;
