use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Identifies a region as a DMXP benchmark channel ("DMXP_QBN").
pub const MAGIC_NUMBER: u64 = 0x444D58505F51424E;

/// Version of the in-region layout.
pub const LAYOUT_VERSION: u32 = 3;

/// Inline payload bytes per slot; the largest message the shm backend carries.
pub const MSG_INLINE: usize = 1024;

/// Defines the metadata for the MPMC channel living in a region.
///
/// This struct contains the atomic cursors and wake-up words needed to manage
/// the ring. Keeping them apart from the slots keeps the control plane separate
/// from the data plane.
#[repr(C, align(128))]
pub struct ChannelEntry {
    /// The capacity of this channel's ring buffer in number of slots.
    /// Always a power of two.
    pub capacity: u64,

    /// Byte offset from the start of the region to the first slot.
    pub band_offset: u64,

    /// Bumped on every enqueue; consumers futex-wait on it when the ring is empty.
    pub signal: AtomicU32,

    /// Bumped on every dequeue; producers futex-wait on it when the ring is full.
    pub space: AtomicU32,

    /// The "tail" cursor for producers. Atomically incremented to claim a slot for writing.
    pub tail: CachePadded<AtomicU64>,

    /// The "head" cursor for consumers. Atomically incremented to claim a slot for reading.
    pub head: CachePadded<AtomicU64>,
}

/// Header located at the very beginning of a channel region.
#[repr(C, align(128))]
pub struct RegionHeader {
    /// A "magic number" to identify the memory region as a benchmark channel.
    pub magic: u64,

    /// The version of the memory layout.
    pub version: u32,

    /// Inline payload bytes per slot, checked on attach.
    pub slot_payload: u32,

    /// The channel living in this region.
    pub channel: ChannelEntry,
}

/// One ring slot as laid out in the band after the header.
///
/// `sequence` carries the hand-off: a slot is writable at position `p` when
/// it reads `p`, readable when it reads `p + 1`, and the reader frees it for
/// the next lap by storing `p + capacity`.
#[repr(C, align(64))]
pub struct Slot {
    pub sequence: AtomicU64,
    /// Bytes of `payload` in use.
    pub payload_len: u32,
    pub payload: [u8; MSG_INLINE],
}
