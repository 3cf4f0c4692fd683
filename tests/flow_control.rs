use dmxp_qbench::Bench::cancel::StopToken;
use dmxp_qbench::Bench::flow::FlowController;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn outstanding_never_exceeds_capacity() {
    let flow = Arc::new(FlowController::new(4));
    let stop = StopToken::new();
    let outstanding = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let flow = flow.clone();
            let stop = stop.clone();
            let outstanding = outstanding.clone();
            let peak = peak.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(flow.acquire(&stop));
                    let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                    flow.release();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(flow.available(), 4);
}

#[test]
fn release_all_unblocks_waiters() {
    let flow = Arc::new(FlowController::new(1));
    let stop = StopToken::new();
    assert!(flow.try_acquire());

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let flow = flow.clone();
            let stop = stop.clone();
            thread::spawn(move || flow.acquire(&stop))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    flow.release_all(3);
    for w in waiters {
        assert!(w.join().unwrap());
    }
}

#[test]
fn stop_releases_a_blocked_acquire() {
    let flow = Arc::new(FlowController::new(1));
    let stop = StopToken::new();
    assert!(flow.try_acquire());

    let waiter = {
        let flow = flow.clone();
        let stop = stop.clone();
        thread::spawn(move || flow.acquire(&stop))
    };
    thread::sleep(Duration::from_millis(20));
    let stopped_at = Instant::now();
    stop.stop();

    assert!(!waiter.join().unwrap());
    // observed within one poll slice
    assert!(stopped_at.elapsed() < Duration::from_millis(500));
    assert_eq!(flow.available(), 0);
}
