use super::cancel::{StopToken, STOP_POLL};
use parking_lot::{Condvar, Mutex};

/// Counting permit pool bounding how many messages are in flight.
///
/// Producers take a permit before submitting; whoever completes the message
/// gives it back. Waiters park on a condvar in slices of at most `STOP_POLL`
/// so a raised stop token is always noticed.
pub struct FlowController {
    capacity: usize,
    state: Mutex<Permits>,
    freed: Condvar,
}

struct Permits {
    free: usize,
    // set by `release_all`; lifts the cap so shutdown can flood waiters
    draining: bool,
}

impl FlowController {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(Permits {
                free: capacity,
                draining: false,
            }),
            freed: Condvar::new(),
        }
    }

    /// Block until a permit is available. Returns `false` without taking a
    /// permit if `stop` is raised first.
    pub fn acquire(&self, stop: &StopToken) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.free > 0 {
                state.free -= 1;
                return true;
            }
            if stop.is_stopped() {
                return false;
            }
            self.freed.wait_for(&mut state, STOP_POLL);
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.free > 0 {
            state.free -= 1;
            true
        } else {
            false
        }
    }

    /// Return one permit. Before shutdown the pool never grows past
    /// `capacity`, so completions of messages this run never acquired
    /// (a queue left over from an earlier run) cannot widen the window.
    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.draining || state.free < self.capacity {
            state.free += 1;
        }
        drop(state);
        self.freed.notify_one();
    }

    /// Return `count` permits at once. Shutdown calls this with the full
    /// capacity so nothing stays parked on messages that will never complete.
    pub fn release_all(&self, count: usize) {
        let mut state = self.state.lock();
        state.draining = true;
        state.free += count;
        drop(state);
        self.freed.notify_all();
    }

    /// Configured number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free. Only exceeds `capacity` after `release_all`.
    pub fn available(&self) -> usize {
        self.state.lock().free
    }
}

impl std::fmt::Debug for FlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowController")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_run_out_and_come_back() {
        let flow = FlowController::new(2);
        assert!(flow.try_acquire());
        assert!(flow.try_acquire());
        assert!(!flow.try_acquire());
        flow.release();
        assert_eq!(flow.available(), 1);
        assert!(flow.try_acquire());
    }

    #[test]
    fn acquire_gives_up_when_stopped() {
        let flow = FlowController::new(1);
        let stop = StopToken::new();
        assert!(flow.acquire(&stop));
        stop.stop();
        assert!(!flow.acquire(&stop));
    }

    #[test]
    fn unmatched_releases_do_not_grow_the_pool() {
        let flow = FlowController::new(4);
        assert!(flow.try_acquire());
        for _ in 0..10 {
            flow.release();
        }
        assert!(flow.available() <= flow.capacity());
        assert_eq!(flow.available(), 4);
    }

    #[test]
    fn release_all_lifts_the_cap() {
        let flow = FlowController::new(2);
        flow.release_all(2);
        flow.release();
        assert_eq!(flow.available(), 5);
    }
}
