use std::sync::atomic::{AtomicU32, Ordering};

/// Next identity to hand out. Starts at 1; 0 is reserved for "no owner"
/// in the slot's owner cell.
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    /// This thread's identity, allocated on first use.
    static CURRENT_ID: u32 = NEXT_ID.fetch_add(1, Ordering::Relaxed);
}

/// Returns the calling thread's stable, process-unique identity.
///
/// The identity is nonzero, assigned on the thread's first lock
/// operation, and never changes for the lifetime of the thread. It is
/// the value written to a slot's owner cell while the thread holds the
/// mutex.
pub(crate) fn current() -> u32 {
    CURRENT_ID.with(|id| *id)
}

/// Returns `true` when the calling thread is the process's main thread.
///
/// The main thread carries the name `"main"`; worker threads either
/// have no name or a caller-chosen one. Used only for the one-time
/// blocking advisory.
pub(crate) fn is_main_thread() -> bool {
    std::thread::current().name() == Some("main")
}
