use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::time::Duration;

use super::layout::{ChannelEntry, Slot, MSG_INLINE};
use crate::Core::futex::{futex_wait_timeout, futex_wake};

/// Process-local view of the ring living in a mapped region.
///
/// Producers claim positions by advancing `tail`, consumers by advancing
/// `head`; the per-slot `sequence` tells each side when its slot is ready.
/// Cursors and epoch words live in the region's `ChannelEntry`.
pub struct RingBuffer {
    pub(crate) metadata: *const ChannelEntry,
    pub(crate) buffer_base: *mut u8,
    pub(crate) capacity: usize,
    mask: usize,
}

// The view only holds pointers into the shared mapping; all access is atomic
// or guarded by slot ownership.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring buffer view over an existing memory region.
    ///
    /// # Safety
    /// Caller must ensure `metadata` and `buffer_base` are valid pointers to shared memory
    /// and that `(*metadata).capacity` is a non-zero power of two.
    pub unsafe fn new(metadata: *const ChannelEntry, buffer_base: *mut u8) -> Self {
        let capacity = (*metadata).capacity as usize;
        Self {
            metadata,
            buffer_base,
            capacity,
            mask: capacity - 1,
        }
    }

    /// Size in bytes of one slot stride in memory.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<Slot>()
    }

    /// Number of slots in the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Initialize per-slot sequence numbers to k for k in 0..capacity.
    /// This should ONLY be called by the creator of the region.
    ///
    /// # Safety
    /// Caller guarantees the underlying memory is allocated and writable.
    pub unsafe fn init_slots(&self) {
        for k in 0..self.capacity {
            let slot = self.slot_mut(k);
            (*slot).sequence.store(k as u64, Relaxed);
        }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut Slot {
        let base = self.buffer_base.add(index * Self::slot_stride());
        base as *mut Slot
    }

    #[inline]
    fn entry(&self) -> &ChannelEntry {
        // Safety: metadata is valid for the lifetime of the view
        unsafe { &*self.metadata }
    }

    /// Enqueue reserves a slot and publishes the message.
    /// Returns the index on success, or None if the ring appears full.
    /// Payloads longer than `MSG_INLINE` are truncated; callers check the size first.
    pub fn enqueue(&self, payload: &[u8]) -> Option<usize> {
        let tail_atomic = &self.entry().tail;

        loop {
            let tail = tail_atomic.load(Relaxed);
            let idx = (tail as usize) & self.mask;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - tail as i64;

            if dif == 0 {
                if tail_atomic
                    .compare_exchange_weak(tail, tail + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let len = payload.len().min(MSG_INLINE);
                    // We own this slot now
                    unsafe {
                        (*slot_ptr).payload_len = len as u32;

                        ptr::copy_nonoverlapping(
                            payload.as_ptr(),
                            ptr::addr_of_mut!((*slot_ptr).payload) as *mut u8,
                            len,
                        );

                        // Publish
                        (*slot_ptr).sequence.store(tail + 1, Release);
                    }
                    return Some(idx);
                }
                continue;
            } else if dif < 0 {
                // full
                return None;
            } else {
                // someone else is producing; backoff and retry
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Dequeue acquires a ready slot and copies its payload into `out`.
    /// Returns the payload length, or None if the ring appears empty.
    pub fn dequeue_into(&self, out: &mut Vec<u8>) -> Option<usize> {
        let head_atomic = &self.entry().head;

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head as usize) & self.mask;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let len = unsafe {
                        let len = ((*slot_ptr).payload_len as usize).min(MSG_INLINE);
                        let payload = &(*slot_ptr).payload;
                        out.clear();
                        out.extend_from_slice(&payload[..len]);
                        len
                    };

                    // free slot for future producers
                    unsafe {
                        (*slot_ptr)
                            .sequence
                            .store(head + self.capacity as u64, Release);
                    }
                    return Some(len);
                }
                continue;
            } else if dif < 0 {
                // empty
                return None;
            } else {
                // producer not finished; retry
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Current value of the data signal word. Read it before trying to dequeue,
    /// then pass it to `wait_for_data` so a concurrent enqueue is never missed.
    #[inline]
    pub fn data_epoch(&self) -> u32 {
        self.entry().signal.load(Acquire)
    }

    /// Current value of the space signal word, see `data_epoch`.
    #[inline]
    pub fn space_epoch(&self) -> u32 {
        self.entry().space.load(Acquire)
    }

    /// Signal consumers that new data is available
    pub fn signal_consumer(&self) {
        let signal = &self.entry().signal;
        signal.fetch_add(1, Release);
        futex_wake(signal, 1);
    }

    /// Signal producers that a slot was freed
    pub fn signal_producer(&self) {
        let space = &self.entry().space;
        space.fetch_add(1, Release);
        futex_wake(space, 1);
    }

    /// Wake every waiter on both words; used when a channel is torn down.
    pub fn wake_all(&self) {
        let entry = self.entry();
        entry.signal.fetch_add(1, Release);
        entry.space.fetch_add(1, Release);
        futex_wake(&entry.signal, i32::MAX);
        futex_wake(&entry.space, i32::MAX);
    }

    /// Wait for new data, at most `timeout`
    pub fn wait_for_data(&self, epoch: u32, timeout: Duration) {
        futex_wait_timeout(&self.entry().signal, epoch, timeout);
    }

    /// Wait for a free slot, at most `timeout`
    pub fn wait_for_space(&self, epoch: u32, timeout: Duration) {
        futex_wait_timeout(&self.entry().space, epoch, timeout);
    }
}
