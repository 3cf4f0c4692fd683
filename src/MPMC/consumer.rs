// src/MPMC/consumer.rs

use crate::Core::alloc::ChannelRegion;
use std::io;
use std::time::{Duration, Instant};

const MAX_PARK: Duration = Duration::from_millis(10);

/// A consumer for receiving messages from a shared memory channel.
/// The consumer attaches to a region by name and reads from its ring.
#[derive(Debug)]
pub struct Consumer {
    region: ChannelRegion,
}

impl Consumer {
    pub(crate) fn new(region: ChannelRegion) -> Self {
        Self { region }
    }

    /// Receives a message into `out` if one is available.
    ///
    /// # Returns
    /// * `Some(len)` if a message was received; `out` holds the payload
    /// * `None` if no message is available
    pub fn receive_into(&self, out: &mut Vec<u8>) -> Option<usize> {
        let buffer = self.region.buffer();
        let len = buffer.dequeue_into(out)?;
        buffer.signal_producer();
        Some(len)
    }

    /// Receives a message from the channel, waiting up to the specified timeout.
    ///
    /// # Returns
    /// * `Ok(len)` if a message was received; `out` holds the payload
    /// * `Err(WouldBlock)` if the timeout was reached
    pub fn receive_timeout(&self, out: &mut Vec<u8>, timeout: Duration) -> io::Result<usize> {
        let buffer = self.region.buffer();
        let start = Instant::now();

        loop {
            let epoch = buffer.data_epoch();
            if let Some(len) = self.receive_into(out) {
                return Ok(len);
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "No message available before timeout",
                ));
            }
            // Wait for signal
            buffer.wait_for_data(epoch, remaining.min(MAX_PARK));
        }
    }

    /// Returns the region this consumer is attached to
    pub fn region(&self) -> &ChannelRegion {
        &self.region
    }
}
