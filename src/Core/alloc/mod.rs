use crate::Core::SharedMemory::{attach_shared_memory, create_shared_memory, SharedMemoryBackend};
use crate::MPMC::Buffer::layout::{ChannelEntry, RegionHeader, LAYOUT_VERSION, MAGIC_NUMBER};
use crate::MPMC::Buffer::{RingBuffer, MSG_INLINE};
use crossbeam_utils::CachePadded;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64};
mod debug;

/// Largest ring the region allocator will lay out.
pub const MAX_SLOTS: usize = 1 << 16;

#[inline]
fn align128(n: usize) -> usize {
    (n + 127) & !127
}

/// Byte offset of the first slot in a region.
#[inline]
pub fn band_offset() -> usize {
    align128(std::mem::size_of::<RegionHeader>())
}

/// Total region size needed for a ring of `capacity` slots.
#[inline]
pub fn region_size(capacity: usize) -> usize {
    align128(band_offset() + capacity * RingBuffer::slot_stride())
}

/// A named shared memory region holding exactly one MPMC channel.
///
/// The creator lays out the header and initializes the slots; any other
/// mapping attaches by name and validates the header before use.
pub struct ChannelRegion {
    shm: Box<dyn SharedMemoryBackend>,
    name: String,
    buffer: RingBuffer,
}

impl ChannelRegion {
    /// Create a region named `name` with a ring of `capacity` slots.
    pub fn create(name: &str, capacity: usize) -> io::Result<Self> {
        // Validate capacity is a power of two and non-zero
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Capacity must be a power of two and greater than zero",
            ));
        }
        if capacity > MAX_SLOTS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Capacity {} exceeds the {} slot limit", capacity, MAX_SLOTS),
            ));
        }

        let size = region_size(capacity);
        let shm = create_shared_memory(size, name).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "Failed to create shared memory:\n\
                    ├─ Region size: {size}\n\
                    ├─ Slots:       {capacity}\n\
                    ╰─ Error: {e}"
                ),
            )
        })?;

        let header_ptr = shm.as_ptr() as *mut RegionHeader;
        if (header_ptr as usize) % 128 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        // Initialize region header
        unsafe {
            std::ptr::write(
                header_ptr,
                RegionHeader {
                    magic: MAGIC_NUMBER,
                    version: LAYOUT_VERSION,
                    slot_payload: MSG_INLINE as u32,
                    channel: ChannelEntry {
                        capacity: capacity as u64,
                        band_offset: band_offset() as u64,
                        signal: AtomicU32::new(0),
                        space: AtomicU32::new(0),
                        tail: CachePadded::new(AtomicU64::new(0)),
                        head: CachePadded::new(AtomicU64::new(0)),
                    },
                },
            );
        }

        let buffer = unsafe {
            let ring = RingBuffer::new(
                &(*header_ptr).channel,
                shm.as_ptr().add(band_offset()),
            );
            // Initialize slots (only done by creator)
            ring.init_slots();
            ring
        };

        Ok(Self {
            shm,
            name: name.to_string(),
            buffer,
        })
    }

    /// Attach to a region previously created under `name`.
    pub fn attach(name: &str) -> io::Result<Self> {
        let shm = attach_shared_memory(name, band_offset())?;

        let header = shm.as_ptr() as *const RegionHeader;
        if (header as usize) % 128 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory not properly aligned",
            ));
        }

        // Verify magic number, version and size
        let capacity = unsafe {
            if (*header).magic != MAGIC_NUMBER {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid magic number - shared memory not properly initialized",
                ));
            }
            if (*header).version != LAYOUT_VERSION || (*header).slot_payload != MSG_INLINE as u32 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Shared memory layout version mismatch",
                ));
            }
            (*header).channel.capacity as usize
        };

        if capacity == 0 || !capacity.is_power_of_two() || shm.size() < region_size(capacity) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Shared memory too small for its advertised channel",
            ));
        }

        let buffer = unsafe {
            RingBuffer::new(
                &(*header).channel,
                shm.as_ptr().add((*header).channel.band_offset as usize),
            )
        };

        Ok(Self {
            shm,
            name: name.to_string(),
            buffer,
        })
    }

    /// Get a reference to the underlying ring buffer
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    /// Name the region was created or attached under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the mapping in bytes
    pub fn size(&self) -> usize {
        self.shm.size()
    }

    pub(crate) fn header_ptr(&self) -> *const RegionHeader {
        self.shm.as_ptr() as *const RegionHeader
    }
}

// Implement Send + Sync since we manage synchronization internally
unsafe impl Send for ChannelRegion {}
unsafe impl Sync for ChannelRegion {}
