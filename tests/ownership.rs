use remutex::{Error, SharedBlock, SharedMutex};

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

const FLAG: usize = 0;
const OWNER: usize = 1;
const RECURSION: usize = 2;

#[test]
fn test_unlock_of_an_unlocked_slot_is_rejected() {
    let block = SharedBlock::new(1).unwrap();
    let mutex = SharedMutex::new(block.clone()).unwrap();

    let err = mutex.unlock().unwrap_err();

    assert_eq!(err, Error::NotOwned);
    assert_eq!(err.code(), "MUTEX_IS_NOT_OWNED_BY_CURRENT_THREAD");

    assert_eq!(block.cell(FLAG).load(Ordering::SeqCst), 0);
    assert_eq!(block.cell(OWNER).load(Ordering::SeqCst), 0);
    assert_eq!(block.cell(RECURSION).load(Ordering::SeqCst), 0);
}

#[test]
fn test_unlock_from_a_foreign_thread_is_rejected() {
    let block = SharedBlock::new(1).unwrap();
    let locked = Arc::new(Barrier::new(2));
    let done = Arc::new(Barrier::new(2));

    let holder = {
        let block = block.clone();
        let locked = locked.clone();
        let done = done.clone();

        thread::spawn(move || {
            let mutex = SharedMutex::new(block).unwrap();
            mutex.lock().unwrap();
            locked.wait();
            done.wait();
            mutex.unlock().unwrap();
        })
    };

    locked.wait();

    let mutex = SharedMutex::new(block.clone()).unwrap();
    let err = mutex.unlock().unwrap_err();
    assert_eq!(err, Error::NotOwned);

    // The holder's state is untouched by the rejected call.
    assert_eq!(block.cell(FLAG).load(Ordering::SeqCst), 1);
    assert_ne!(block.cell(OWNER).load(Ordering::SeqCst), 0);
    assert_eq!(block.cell(RECURSION).load(Ordering::SeqCst), 1);

    done.wait();
    holder.join().unwrap();
}

#[test]
fn test_forced_zero_depth_underflows_on_unlock() {
    let block = SharedBlock::new(1).unwrap();
    let mutex = SharedMutex::new(block.clone()).unwrap();

    mutex.lock().unwrap();

    // Tamper with the shared cells from outside the API.
    block.cell(RECURSION).store(0, Ordering::SeqCst);

    let err = mutex.unlock().unwrap_err();
    assert_eq!(err, Error::RecursionUnderflow);
    assert_eq!(err.code(), "MUTEX_RECURSION_COUNT_UNDERFLOW");
}

#[test]
fn test_forced_max_depth_overflows_on_reentry() {
    let block = SharedBlock::new(1).unwrap();
    let mutex = SharedMutex::new(block.clone()).unwrap();

    mutex.lock().unwrap();

    block.cell(RECURSION).store(i32::MAX as u32, Ordering::SeqCst);

    let err = mutex.lock().unwrap_err();
    assert_eq!(err, Error::RecursionOverflow);
    assert_eq!(err.code(), "MUTEX_RECURSION_COUNT_OVERFLOW");

    // The async fast path reports the same corruption as a rejection.
    let err = futures::executor::block_on(mutex.lock_async()).unwrap_err();
    assert_eq!(err, Error::RecursionOverflow);
}

#[test]
fn test_negative_depth_reads_as_underflow() {
    let block = SharedBlock::new(1).unwrap();
    let mutex = SharedMutex::new(block.clone()).unwrap();

    mutex.lock().unwrap();

    // A depth past i32::MAX is a wrapped negative value.
    block.cell(RECURSION).store(u32::MAX, Ordering::SeqCst);

    let err = mutex.unlock().unwrap_err();
    assert_eq!(err, Error::RecursionUnderflow);

    let err = mutex.lock().unwrap_err();
    assert_eq!(err, Error::RecursionUnderflow);
}
