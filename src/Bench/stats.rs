use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters for one run, updated lock-free from any worker.
///
/// Each counter sits on its own cache line so producers and consumers bumping
/// different fields do not contend.
#[derive(Debug, Default)]
pub struct StatsCounters {
    sent_messages: CachePadded<AtomicU64>,
    sent_bytes: CachePadded<AtomicU64>,
    recv_messages: CachePadded<AtomicU64>,
    recv_bytes: CachePadded<AtomicU64>,
    send_errors: CachePadded<AtomicU64>,
    recv_errors: CachePadded<AtomicU64>,
    send_retries: CachePadded<AtomicU64>,
    recv_retries: CachePadded<AtomicU64>,
}

/// Point-in-time copy of the counters. Fields are read one by one, so the
/// snapshot is not atomic across fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent_messages: u64,
    pub sent_bytes: u64,
    pub recv_messages: u64,
    pub recv_bytes: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
    pub send_retries: u64,
    pub recv_retries: u64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_recv(&self, bytes: usize) {
        self.recv_messages.fetch_add(1, Ordering::Relaxed);
        self.recv_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn send_retry(&self) {
        self.send_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn recv_retry(&self) {
        self.recv_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent_messages: self.sent_messages.load(Ordering::Relaxed),
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            recv_messages: self.recv_messages.load(Ordering::Relaxed),
            recv_bytes: self.recv_bytes.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            send_retries: self.send_retries.load(Ordering::Relaxed),
            recv_retries: self.recv_retries.load(Ordering::Relaxed),
        }
    }
}
