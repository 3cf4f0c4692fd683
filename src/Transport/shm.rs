// Pull-style transport over the shared-memory MPMC ring

use super::{
    CompletionHandler, Delivery, Transport, TransportError, TransportFactory, TransportSetupError,
};
use crate::Bench::config::BenchConfig;
use crate::Core::alloc::MAX_SLOTS;
use crate::Core::unlink_shared_memory;
use crate::MPMC::Buffer::MSG_INLINE;
use crate::MPMC::{ChannelBuilder, Consumer, Producer};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const BACKEND: &str = "shm";

/// Options for the shared-memory ring backend.
#[derive(Clone, Debug)]
pub struct ShmOptions {
    /// Region name under `/dev/shm`.
    pub name: String,
    pub non_blocking: bool,
    /// When false, an existing region is reused along with any messages
    /// still queued in it.
    pub unlink_at_start: bool,
    pub unlink_at_end: bool,
}

impl Default for ShmOptions {
    fn default() -> Self {
        Self {
            name: "dmxp_qbench".to_string(),
            non_blocking: false,
            unlink_at_start: true,
            unlink_at_end: true,
        }
    }
}

/// Ring slots for a requested in-flight bound: next power of two, capped.
pub fn ring_capacity(max_in_flight: usize) -> usize {
    max_in_flight.max(1).next_power_of_two().min(MAX_SLOTS)
}

impl TransportFactory for ShmOptions {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn open(
        &self,
        config: &BenchConfig,
        _completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError> {
        if config.message_size > MSG_INLINE {
            return Err(TransportSetupError::MessageTooLarge {
                backend: BACKEND,
                requested: config.message_size,
                limit: MSG_INLINE,
            });
        }

        let capacity = ring_capacity(config.max_in_flight);
        if capacity < config.max_in_flight {
            warn!(
                requested = config.max_in_flight,
                capacity, "max-inflight exceeds the ring slot limit, capping"
            );
        }

        if self.unlink_at_start {
            if let Err(e) = unlink_shared_memory(&self.name) {
                warn!(name = %self.name, error = %e, "failed to unlink stale region");
            }
        }

        let open_err = |source: io::Error| TransportSetupError::Open {
            backend: BACKEND,
            identifier: self.name.clone(),
            source,
        };

        let builder = ChannelBuilder::new()
            .with_name(self.name.clone())
            .with_capacity(capacity);
        // a kept region is reused as-is, including messages left in it
        let producer = if self.unlink_at_start {
            builder.build_producer()
        } else {
            builder.attach_or_build_producer()
        }
        .map_err(open_err)?;
        let consumer = builder.build_consumer().map_err(open_err)?;

        let slots = producer.region().buffer().capacity();
        if slots != capacity {
            warn!(
                name = %self.name,
                requested = capacity,
                slots, "reusing existing region with a different ring size"
            );
        }

        info!(
            name = %self.name,
            slots,
            slot_payload = MSG_INLINE,
            region_bytes = producer.region().size(),
            non_blocking = self.non_blocking,
            "shared-memory ring ready"
        );

        Ok(Arc::new(ShmTransport {
            producer,
            consumer,
            name: self.name.clone(),
            non_blocking: self.non_blocking,
            unlink_at_end: self.unlink_at_end,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Producer half creates (or reuses) the region, consumer half maps it a second time by name.
pub struct ShmTransport {
    producer: Producer,
    consumer: Consumer,
    name: String,
    non_blocking: bool,
    unlink_at_end: bool,
    closed: AtomicBool,
}

impl ShmTransport {
    fn check_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl Transport for ShmTransport {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn identifier(&self) -> &str {
        &self.name
    }

    fn delivery(&self) -> Delivery {
        Delivery::Pull
    }

    fn non_blocking(&self) -> bool {
        self.non_blocking
    }

    fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        self.check_open()?;
        let sent = if self.non_blocking {
            self.producer.send(payload)
        } else {
            self.producer.send_timeout(payload, timeout)
        };
        sent.map_err(TransportError::from_os)
    }

    fn receive(&self, buf: &mut Vec<u8>, timeout: Duration) -> Result<usize, TransportError> {
        self.check_open()?;
        if self.non_blocking {
            return match self.consumer.receive_into(buf) {
                Some(_) => Ok(buf.len()),
                None => Err(TransportError::WouldBlock),
            };
        }
        self.consumer
            .receive_timeout(buf, timeout)
            .map(|_| buf.len())
            .map_err(TransportError::from_os)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.producer.region().buffer().wake_all();
        if self.unlink_at_end {
            if let Err(e) = unlink_shared_memory(&self.name) {
                warn!(name = %self.name, error = %e, "failed to unlink region");
            }
        }
    }
}

impl Drop for ShmTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_capacity_rounds_and_caps() {
        assert_eq!(ring_capacity(0), 1);
        assert_eq!(ring_capacity(4), 4);
        assert_eq!(ring_capacity(1000), 1024);
        assert_eq!(ring_capacity(usize::MAX / 4), MAX_SLOTS);
    }
}
