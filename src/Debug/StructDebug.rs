use crate::Core::alloc::ChannelRegion;
use crate::MPMC::Buffer::RingBuffer;
use std::fmt;
use std::sync::atomic::Ordering;

/// Debug function for ChannelRegion
///
/// Provides a safe debug representation that shows:
/// - Region name and mapping size
/// - Header pointer location
/// - Underlying RingBuffer details
pub fn debug_channel_region(region: &ChannelRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelRegion")
        .field("name", &region.name())
        .field("size", &region.size())
        .field("header", &format_args!("{:p}", region.header_ptr()))
        .field("buffer", region.buffer())
        .finish()
}

/// Debug function for RingBuffer
///
/// Displays the buffer location and a racy view of its cursors
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (head, tail) = unsafe {
        let entry = &*buffer.metadata;
        (entry.head.load(Ordering::Relaxed), entry.tail.load(Ordering::Relaxed))
    };
    f.debug_struct("RingBuffer")
        .field("base", &format_args!("0x{:x}", buffer.buffer_base as usize))
        .field("capacity", &buffer.capacity)
        .field("head", &head)
        .field("tail", &tail)
        .finish_non_exhaustive()
}
