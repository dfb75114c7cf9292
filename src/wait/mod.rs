//! Asynchronous wait strategies.
//!
//! A contended `lock_async` must suspend the logical task without
//! blocking the thread that polls it. How the task gets woken again is
//! decided once per process, by a capability probe, into one of two
//! strategies:
//!
//! - **Native**: a helper thread blocks on the flag cell with the OS
//!   futex-style wait and wakes the task when the cell is signaled.
//! - **Polling**: the task is re-woken after a linear back-off delay
//!   (0, 1, 2, ... capped at 8 ms) and re-races the acquisition CAS.
//!
//! Both variants implement the same contract: "arrange for this waker
//! to fire once the cell may have changed". The probe runs once and is
//! latched; there is no per-call capability testing.
//!
//! While a wait is pending, a keep-alive token holds a process-wide
//! count so an embedder can tell the process is not idle merely
//! because a lock wait is in flight. The token is released the instant
//! the wait settles, before the task is woken.

use crate::block::SharedBlock;

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Waker;
use std::thread;
use std::time::Duration;

/// Back-off cap for the polling strategy, in milliseconds.
const BACKOFF_CAP_MS: u32 = 8;

/// Platforms where the futex-style blocking wait is available.
const NATIVE_WAIT_SUPPORTED: bool = cfg!(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
    target_os = "freebsd",
));

/// The strategy latched by the first contended `lock_async`.
static STRATEGY: OnceLock<WaitStrategy> = OnceLock::new();

/// Number of asynchronous waits currently in flight.
static PENDING_WAITS: AtomicUsize = AtomicUsize::new(0);

/// How a contended asynchronous acquisition waits for the flag cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitStrategy {
    /// Block a helper thread on the cell with the OS wait primitive.
    Native,

    /// Re-wake the task after a linear back-off delay and re-race.
    Polling,
}

impl WaitStrategy {
    /// Returns the process-wide strategy, probing on first use.
    pub(crate) fn current() -> WaitStrategy {
        *STRATEGY.get_or_init(Self::detect)
    }

    /// Capability probe, run exactly once per process.
    ///
    /// `REMUTEX_FORCE_POLLING` forces the fallback even where the
    /// native wait exists, which keeps the polling path exercisable on
    /// every platform.
    fn detect() -> WaitStrategy {
        if std::env::var_os("REMUTEX_FORCE_POLLING").is_some() {
            return WaitStrategy::Polling;
        }

        if NATIVE_WAIT_SUPPORTED {
            WaitStrategy::Native
        } else {
            WaitStrategy::Polling
        }
    }

    /// Arranges for `waker` to fire once `block.cell(cell)` may no
    /// longer hold `expected`.
    ///
    /// `attempt` counts how many times the caller has already waited
    /// for this acquisition; only the polling strategy uses it, to
    /// derive the back-off delay.
    ///
    /// Spurious wake-ups are allowed by contract: the caller always
    /// re-checks the cell and may park again.
    pub(crate) fn park(
        self,
        block: SharedBlock,
        cell: usize,
        expected: u32,
        attempt: u32,
        waker: Waker,
    ) {
        let work: Box<dyn FnOnce() + Send> = match self {
            WaitStrategy::Native => Box::new(move || {
                atomic_wait::wait(block.cell(cell), expected);
            }),
            WaitStrategy::Polling => Box::new(move || {
                let delay = backoff(attempt);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }),
        };

        let keep_alive = KeepAlive::engage();
        let fallback = waker.clone();

        let spawned = thread::Builder::new()
            .name("remutex-wait".into())
            .spawn(move || {
                work();
                drop(keep_alive);
                waker.wake();
            });

        // If no helper thread can be spawned, wake the task right away
        // and let it re-race the CAS instead of stranding it.
        if let Err(e) = spawned {
            log::warn!("failed to spawn wait helper, waking task immediately: {e}");
            fallback.wake();
        }
    }
}

/// Linear back-off: 0 ms, 1 ms, 2 ms, ... capped at 8 ms.
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt.min(BACKOFF_CAP_MS)))
}

/// Returns how many asynchronous lock waits are currently pending.
///
/// While this is nonzero the process has work in flight even if every
/// executor queue looks empty. Embedders can consult it before
/// treating the process as idle.
pub fn pending_async_waits() -> usize {
    PENDING_WAITS.load(Ordering::SeqCst)
}

/// Token counting one in-flight asynchronous wait.
///
/// Engaged before the wait starts, dropped the instant it settles.
struct KeepAlive;

impl KeepAlive {
    fn engage() -> KeepAlive {
        PENDING_WAITS.fetch_add(1, Ordering::SeqCst);
        KeepAlive
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        PENDING_WAITS.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::backoff;

    use std::time::Duration;

    #[test]
    fn test_backoff_grows_linearly_to_the_cap() {
        let delays: Vec<_> = (0..=10).map(backoff).collect();

        let expected: Vec<_> = [0u64, 1, 2, 3, 4, 5, 6, 7, 8, 8, 8]
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();

        assert_eq!(delays, expected);
    }

    #[test]
    fn test_backoff_stays_capped_for_large_attempts() {
        assert_eq!(backoff(1_000), Duration::from_millis(8));
        assert_eq!(backoff(u32::MAX), Duration::from_millis(8));
    }
}
