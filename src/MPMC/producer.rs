// In src/MPMC/producer.rs
use crate::Core::alloc::ChannelRegion;
use crate::MPMC::Buffer::MSG_INLINE;
use std::io;
use std::time::{Duration, Instant};

/// Upper bound on a single futex park, so a blocked send re-checks its deadline.
const MAX_PARK: Duration = Duration::from_millis(10);

/// A producer for sending messages through a shared memory channel.
/// The producer owns its mapping of the region and writes messages into its ring.
pub struct Producer {
    region: ChannelRegion,
}

impl Producer {
    pub(crate) fn new(region: ChannelRegion) -> Self {
        Self { region }
    }

    // the inline slot payload bounds every message
    fn check_size(message: &[u8]) -> io::Result<()> {
        if message.len() > MSG_INLINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Message too large ({} > {})", message.len(), MSG_INLINE),
            ));
        }
        Ok(())
    }

    /// Sends a message through the channel without waiting.
    ///
    /// # Returns
    /// * `Ok(())` if the message was sent successfully
    /// * `Err(WouldBlock)` if the ring is full
    /// * `Err(InvalidInput)` if the message is too large
    pub fn send<T: AsRef<[u8]>>(&self, message: T) -> io::Result<()> {
        let message = message.as_ref();
        Self::check_size(message)?;

        let buffer = self.region.buffer();
        match buffer.enqueue(message) {
            Some(_) => {
                buffer.signal_consumer();
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "Failed to enqueue message - buffer full",
            )),
        }
    }

    /// Sends a message, waiting up to `timeout` for a free slot.
    ///
    /// Returns `Err(WouldBlock)` if the ring stayed full for the whole timeout.
    pub fn send_timeout<T: AsRef<[u8]>>(&self, message: T, timeout: Duration) -> io::Result<()> {
        let message = message.as_ref();
        Self::check_size(message)?;

        let buffer = self.region.buffer();
        let start = Instant::now();

        loop {
            // Read the epoch before trying so a dequeue in between wakes us
            let epoch = buffer.space_epoch();
            match self.send(message) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return Err(e);
                    }
                    buffer.wait_for_space(epoch, remaining.min(MAX_PARK));
                }
                other => return other,
            }
        }
    }

    /// Returns the region backing this producer
    pub fn region(&self) -> &ChannelRegion {
        &self.region
    }
}
