use super::{Acquire, LOCKED, SharedMutex};
use crate::error::Error;
use crate::wait::WaitStrategy;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future returned by [`SharedMutex::lock_async`].
///
/// Each poll runs the same owner-re-entry and fresh-acquisition CAS
/// passes as the blocking engine. On contention the task is suspended
/// and the process-wide wait strategy arranges the wake-up: either
/// a helper blocks on the flag cell with the native wait primitive, or
/// the task is re-woken after a linear back-off delay and re-races.
///
/// Resolves to `Ok(())` once the polling task's thread holds the slot,
/// fresh or re-entrant. A recursion-counter corruption in the
/// re-entrant fast path resolves the future with the error instead.
///
/// Dropping the future before it resolves abandons the acquisition;
/// the slot is untouched.
pub struct LockFuture<'a> {
    /// The handle being acquired.
    mutex: &'a SharedMutex,

    /// How many times this acquisition has already waited; drives the
    /// polling strategy's back-off.
    attempts: u32,
}

impl<'a> LockFuture<'a> {
    pub(crate) fn new(mutex: &'a SharedMutex) -> Self {
        Self { mutex, attempts: 0 }
    }
}

impl Future for LockFuture<'_> {
    type Output = Result<(), Error>;

    /// Polls the future to attempt acquiring the mutex.
    ///
    /// If the slot is free or already held by this thread, the future
    /// resolves immediately. Otherwise the wait strategy is asked to
    /// fire the waker once the flag cell may have changed, and the
    /// future returns `Poll::Pending`.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = crate::thread_id::current();

        match this.mutex.try_acquire(me) {
            Ok(Acquire::Acquired) => Poll::Ready(Ok(())),

            Ok(Acquire::Contended) => {
                let attempt = this.attempts;
                this.attempts = this.attempts.saturating_add(1);

                WaitStrategy::current().park(
                    this.mutex.block().clone(),
                    this.mutex.base,
                    LOCKED,
                    attempt,
                    cx.waker().clone(),
                );

                Poll::Pending
            }

            Err(e) => Poll::Ready(Err(e)),
        }
    }
}
