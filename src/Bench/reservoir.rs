use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-capacity uniform sample of latency observations (nanoseconds).
///
/// Classic reservoir sampling shared by many writers: every call claims a
/// ticket from `seen`; the first `capacity` tickets fill the buffer, later
/// ticket `i` replaces a random slot with probability `capacity / (i + 1)`.
/// After `n` calls each observation is retained with probability
/// `min(1, capacity / n)`, regardless of how threads interleave.
///
/// Random draws come from fastrand's per-thread generators, which are seeded
/// from system entropy, so writers never serialize on a shared RNG. The lock
/// is only taken by calls that actually touch the buffer.
pub struct LatencyReservoir {
    capacity: usize,
    seen: CachePadded<AtomicU64>,
    samples: Mutex<Vec<u64>>,
}

impl LatencyReservoir {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: CachePadded::new(AtomicU64::new(0)),
            samples: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn record(&self, value_ns: u64) {
        let index = self.seen.fetch_add(1, Ordering::Relaxed);
        if self.capacity == 0 {
            return;
        }

        let capacity = self.capacity as u64;
        if index < capacity {
            let mut samples = self.samples.lock();
            // Several threads may hold tickets below capacity at once; only
            // append while there is room.
            if samples.len() < self.capacity {
                samples.push(value_ns);
            }
            return;
        }

        let pos = fastrand::u64(0..=index);
        if pos < capacity {
            let mut samples = self.samples.lock();
            // A lower ticket may not have landed yet.
            if let Some(slot) = samples.get_mut(pos as usize) {
                *slot = value_ns;
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of `record` calls so far, including ones that were not retained.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the retained samples, in no particular order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.samples.lock().clone()
    }
}

impl std::fmt::Debug for LatencyReservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyReservoir")
            .field("capacity", &self.capacity)
            .field("seen", &self.seen())
            .field("len", &self.len())
            .finish()
    }
}
