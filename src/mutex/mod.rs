//! The re-entrant mutex handle and its acquisition engines.

mod future;

pub use future::LockFuture;

use crate::block::{CELLS_PER_MUTEX, SharedBlock};
use crate::error::Error;
use crate::thread_id;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Flag cell value while the slot is unlocked.
const UNLOCKED: u32 = 0;

/// Flag cell value while the slot is held.
const LOCKED: u32 = 1;

/// Highest legal recursion depth. Anything above this, read as a
/// 32-bit value, is a negative signed depth and means corruption.
const MAX_RECURSION: u32 = i32::MAX as u32;

/// Latched once the main-thread blocking advisory has been emitted.
static MAIN_THREAD_ADVISORY: AtomicBool = AtomicBool::new(false);

/// Outcome of one pass over the acquisition fast paths.
pub(crate) enum Acquire {
    /// The slot is now held by the calling thread (fresh or deeper).
    Acquired,

    /// The slot is held by another thread; the caller must wait for
    /// the flag cell to change and retry.
    Contended,
}

/// A re-entrant mutex over one slot of a [`SharedBlock`].
///
/// The handle itself is stateless: it is a reference to the block plus
/// the resolved slot position. All lock state lives in the slot's
/// three shared cells (`flag`, `owner`, `recursion`), which are only
/// ever touched atomically, so any number of handles on any number of
/// threads may reference the same slot and observe consistent state.
///
/// Ownership is *thread*-scoped. Whichever thread wins the flag CAS
/// owns the slot; that thread may call [`lock`](Self::lock) again any
/// number of times (each acquisition deepens the recursion count) and
/// must balance every acquisition with an [`unlock`](Self::unlock).
/// Any other thread's `unlock` is rejected.
///
/// The mutex serializes access to caller-owned state; it does not wrap
/// a value of its own.
///
/// # Examples
///
/// ```rust,ignore
/// let block = SharedBlock::new(1)?;
/// let mutex = SharedMutex::new(block.clone())?;
///
/// let worker = std::thread::spawn(move || {
///     // Same slot, rebuilt on the other thread.
///     let mutex = SharedMutex::new(block)?;
///     mutex.lock()?;
///     // ... critical section ...
///     mutex.unlock()
/// });
/// ```
#[derive(Debug, Clone)]
pub struct SharedMutex {
    /// The shared cells this mutex lives in.
    block: SharedBlock,

    /// Cell index of the slot's flag cell (`slot index * 3`).
    base: usize,
}

impl SharedMutex {
    /// Creates a handle over slot 0 of `block`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if the block holds no complete slot.
    pub fn new(block: SharedBlock) -> Result<SharedMutex, Error> {
        Self::with_index(block, 0)
    }

    /// Creates a handle over slot `index` of `block`.
    ///
    /// The whole slot, cells `index * 3` through `index * 3 + 2`, must
    /// lie inside the block.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if it does not.
    pub fn with_index(block: SharedBlock, index: usize) -> Result<SharedMutex, Error> {
        let base = index
            .checked_mul(CELLS_PER_MUTEX)
            .ok_or(Error::IndexOutOfRange)?;

        // The last cell's index can itself overflow for an index near
        // usize::MAX / 3, so the bound check must be checked too.
        let last = base
            .checked_add(CELLS_PER_MUTEX - 1)
            .ok_or(Error::IndexOutOfRange)?;

        if last >= block.cell_count() {
            return Err(Error::IndexOutOfRange);
        }

        Ok(Self { block, base })
    }

    /// Returns the underlying block.
    ///
    /// Hand a clone of it to another thread to construct an equivalent
    /// handle there; the cells are shared, never copied.
    pub fn block(&self) -> &SharedBlock {
        &self.block
    }

    /// Returns the slot index this handle resolves to.
    pub fn index(&self) -> usize {
        self.base / CELLS_PER_MUTEX
    }

    /// Acquires the mutex, blocking the calling thread until it is
    /// available.
    ///
    /// If the calling thread already holds the slot, the recursion
    /// count is deepened and the call returns immediately; no blocking
    /// wait is involved. Otherwise the thread parks on the flag cell
    /// until the holder releases, then re-races the acquisition CAS.
    /// No ordering among waiting threads is guaranteed.
    ///
    /// The first blocking `lock` issued from the process's main thread
    /// emits a one-time `log::warn!` advisory, since parking the main
    /// thread stalls whatever else it was meant to drive. The advisory
    /// never affects behavior.
    ///
    /// # Errors
    ///
    /// [`Error::RecursionOverflow`] or [`Error::RecursionUnderflow`]
    /// if the recursion cell is at its ceiling or has been corrupted.
    pub fn lock(&self) -> Result<(), Error> {
        if thread_id::is_main_thread() && !MAIN_THREAD_ADVISORY.swap(true, Ordering::SeqCst) {
            log::warn!(
                "SharedMutex::lock on the main thread blocks it until the lock is released; \
                 other work scheduled on this thread will stall (consider lock_async)"
            );
        }

        let me = thread_id::current();

        loop {
            match self.try_acquire(me)? {
                Acquire::Acquired => return Ok(()),
                // Park on the flag keyed to the locked value we just
                // observed; a release changed it and woke us, or the
                // wake was spurious. Either way, re-race.
                Acquire::Contended => atomic_wait::wait(self.flag(), LOCKED),
            }
        }
    }

    /// Acquires the mutex without blocking the calling thread.
    ///
    /// Returns a future that resolves once the calling task's thread
    /// holds the slot, fresh or re-entrant. While the lock is
    /// contended only the task is suspended; the thread keeps running
    /// other scheduled work. See [`LockFuture`] for the wait strategy.
    ///
    /// Like [`lock`](Self::lock), the resolved acquisition must be
    /// balanced with [`unlock`](Self::unlock) from the same thread.
    pub fn lock_async(&self) -> LockFuture<'_> {
        LockFuture::new(self)
    }

    /// Releases one level of the calling thread's hold on the mutex.
    ///
    /// If the recursion count is still positive afterwards the thread
    /// keeps the lock at a shallower depth. When it reaches zero the
    /// slot is fully released (owner cleared, flag cleared, in that
    /// order) and every thread waiting on the flag cell is woken to
    /// re-race the acquisition CAS. Waking all waiters means a wake
    /// can never be lost to a stale one — an abandoned async helper
    /// may still be parked on the cell — at the cost of the fairness
    /// this mutex never promised anyway.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOwned`] if the slot is not locked, or is held by
    ///   a different thread. No state is mutated.
    /// - [`Error::RecursionUnderflow`] if the recursion cell holds no
    ///   positive depth while the flag says locked; the cells were
    ///   tampered with from outside.
    pub fn unlock(&self) -> Result<(), Error> {
        let me = thread_id::current();

        let flag = self.flag().load(Ordering::SeqCst);
        let owner = self.owner().load(Ordering::SeqCst);

        if flag != LOCKED || owner != me {
            return Err(Error::NotOwned);
        }

        loop {
            let depth = self.recursion().load(Ordering::SeqCst);

            if depth == 0 || depth > MAX_RECURSION {
                return Err(Error::RecursionUnderflow);
            }

            let cas = self.recursion().compare_exchange(
                depth,
                depth - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );

            if cas.is_err() {
                continue;
            }

            if depth > 1 {
                // Still held by this thread, one level shallower.
                return Ok(());
            }

            self.owner().store(0, Ordering::SeqCst);
            self.flag().store(UNLOCKED, Ordering::SeqCst);

            // Wake everyone, not just one waiter: a single wake could
            // be consumed by a helper whose future was dropped, which
            // would leave a live waiter parked on a free lock.
            atomic_wait::wake_all(self.flag());

            return Ok(());
        }
    }

    /// One pass over the acquisition fast paths, shared by the
    /// blocking and asynchronous engines.
    ///
    /// Runs the owner re-entry check, then the fresh-acquisition CAS;
    /// a lost CAS re-reads and retries inside this loop. Only genuine
    /// contention (locked by someone else) is reported back for the
    /// caller to wait on.
    pub(crate) fn try_acquire(&self, me: u32) -> Result<Acquire, Error> {
        loop {
            let flag = self.flag().load(Ordering::SeqCst);
            let owner = self.owner().load(Ordering::SeqCst);

            if flag == LOCKED && owner == me {
                // Already ours; deepen the hold. Only this thread can
                // release the slot, so the ownership cannot change
                // under us here.
                self.deepen_recursion()?;
                return Ok(Acquire::Acquired);
            }

            if flag == UNLOCKED {
                let won = self
                    .flag()
                    .compare_exchange(UNLOCKED, LOCKED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();

                if won {
                    self.owner().store(me, Ordering::SeqCst);
                    self.recursion().store(1, Ordering::SeqCst);
                    return Ok(Acquire::Acquired);
                }

                // Lost the race; re-read and go again.
                continue;
            }

            return Ok(Acquire::Contended);
        }
    }

    /// CAS-increments the recursion count of a slot this thread holds.
    ///
    /// Rejects a non-positive depth (the flag said locked, so a zero
    /// or negative count is corruption) and a depth at the signed
    /// 32-bit ceiling.
    fn deepen_recursion(&self) -> Result<(), Error> {
        loop {
            let depth = self.recursion().load(Ordering::SeqCst);

            if depth == 0 || depth > MAX_RECURSION {
                return Err(Error::RecursionUnderflow);
            }

            if depth == MAX_RECURSION {
                return Err(Error::RecursionOverflow);
            }

            let cas = self.recursion().compare_exchange(
                depth,
                depth + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );

            if cas.is_ok() {
                return Ok(());
            }
        }
    }

    /// The slot's flag cell (0 unlocked, 1 locked).
    fn flag(&self) -> &AtomicU32 {
        self.block.cell(self.base)
    }

    /// The slot's owner cell (thread identity, 0 when unlocked).
    fn owner(&self) -> &AtomicU32 {
        self.block.cell(self.base + 1)
    }

    /// The slot's recursion-depth cell.
    fn recursion(&self) -> &AtomicU32 {
        self.block.cell(self.base + 2)
    }
}
