use remutex::{SharedBlock, SharedMutex};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_mutual_exclusion() {
    let block = SharedBlock::new(1).unwrap();
    let inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for _ in 0..2 {
        let block = block.clone();
        let inside = inside.clone();

        handles.push(thread::spawn(move || {
            let mutex = SharedMutex::new(block).unwrap();

            for _ in 0..500 {
                mutex.lock().unwrap();

                // Exactly one thread may be between lock and unlock.
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                assert_eq!(inside.fetch_sub(1, Ordering::SeqCst), 1);

                mutex.unlock().unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_no_lost_updates_under_contention() {
    let block = SharedBlock::new(1).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for _ in 0..4 {
        let block = block.clone();
        let counter = counter.clone();

        handles.push(thread::spawn(move || {
            let mutex = SharedMutex::new(block).unwrap();

            for _ in 0..1000 {
                mutex.lock().unwrap();

                // Non-atomic read-modify-write pattern, serialized by
                // the mutex alone.
                let seen = counter.load(Ordering::Relaxed);
                counter.store(seen + 1, Ordering::Relaxed);

                mutex.unlock().unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 4000);
}

#[test]
fn test_contended_wait_and_release() {
    let block = SharedBlock::new(1).unwrap();
    let mutex = SharedMutex::new(block.clone()).unwrap();

    mutex.lock().unwrap();

    let waiter = {
        let block = block.clone();

        thread::spawn(move || {
            let mutex = SharedMutex::new(block).unwrap();
            let start = Instant::now();
            mutex.lock().unwrap();
            let waited = start.elapsed();
            mutex.unlock().unwrap();
            waited
        })
    };

    thread::sleep(Duration::from_millis(60));
    mutex.unlock().unwrap();

    let waited = waiter.join().unwrap();

    // The waiter cannot get in before the release; scheduling slack
    // only ever makes it wait longer.
    assert!(waited >= Duration::from_millis(25), "waited {waited:?}");
}

#[test]
fn test_slots_are_independent() {
    let block = SharedBlock::new(3).unwrap();
    let first = SharedMutex::with_index(block.clone(), 0).unwrap();

    first.lock().unwrap();

    let others = {
        let block = block.clone();

        thread::spawn(move || {
            // Slots 1 and 2 must be acquirable while slot 0 is held
            // elsewhere, without blocking or observing it.
            for index in 1..3 {
                let mutex = SharedMutex::with_index(block.clone(), index).unwrap();
                mutex.lock().unwrap();
                mutex.unlock().unwrap();
            }
        })
    };

    others.join().unwrap();

    // Slot 0 is still held and still ours.
    assert_eq!(block.cell(0).load(Ordering::SeqCst), 1);
    assert_eq!(block.cell(2).load(Ordering::SeqCst), 1);

    // The other slots went back to rest untouched by slot 0's hold.
    for cell in 3..9 {
        assert_eq!(block.cell(cell).load(Ordering::SeqCst), 0);
    }

    first.unlock().unwrap();
}
