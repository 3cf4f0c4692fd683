//! Transport capability contract the benchmark engine drives, plus the
//! backends shipped with the crate.
//!
//! A transport moves opaque byte messages. Pull-style transports hand
//! messages back through [`Transport::receive`]; push-style transports call
//! the [`CompletionHandler`] given at open time from their own threads.

pub mod dispatch;
#[cfg(target_os = "linux")]
pub mod mqueue;
pub mod shm;

pub use dispatch::DispatchOptions;
#[cfg(target_os = "linux")]
pub use mqueue::MqueueOptions;
pub use shm::ShmOptions;

use crate::Bench::config::BenchConfig;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How completed messages reach the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Consumers call `receive`.
    Pull,
    /// The transport invokes the completion handler.
    Push,
}

/// Steady-state send/receive failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transient: queue full/empty or the timeout elapsed.
    #[error("operation would block")]
    WouldBlock,

    /// The transport was closed underneath the caller.
    #[error("transport closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify an OS error: would-block, timeout and interruption are transient.
    pub fn from_os(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                TransportError::WouldBlock
            }
            _ => TransportError::Io(err),
        }
    }
}

/// Fatal failure while opening a transport.
#[derive(Debug, Error)]
pub enum TransportSetupError {
    #[error("failed to open {backend} transport `{identifier}`: {source}")]
    Open {
        backend: &'static str,
        identifier: String,
        #[source]
        source: io::Error,
    },

    #[error("message size {requested} exceeds the {backend} limit of {limit} bytes")]
    MessageTooLarge {
        backend: &'static str,
        requested: usize,
        limit: usize,
    },

    #[error("failed to spawn {backend} worker: {source}")]
    Spawn {
        backend: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Receives messages delivered by a push-style transport. Consumers of
/// pull-style transports feed the same handler.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, payload: &[u8]);
}

/// An open transport handle.
pub trait Transport: Send + Sync {
    /// Backend name used in reports, e.g. `shm`.
    fn backend(&self) -> &'static str;

    /// Queue or region name the run used.
    fn identifier(&self) -> &str;

    fn delivery(&self) -> Delivery;

    fn non_blocking(&self) -> bool {
        false
    }

    /// Submit one message, waiting at most `timeout` for room.
    fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Receive one message into `buf`, waiting at most `timeout`.
    /// Returns the message length; `buf[..len]` holds it.
    fn receive(&self, buf: &mut Vec<u8>, timeout: Duration) -> Result<usize, TransportError> {
        let _ = (buf, timeout);
        Err(TransportError::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            "push-style transport has no receive",
        )))
    }

    /// Release the handle and any backend resources. Idempotent.
    fn close(&self);
}

/// Opens a transport for one run.
pub trait TransportFactory {
    fn backend(&self) -> &'static str;

    /// `completion` is only invoked by push-style transports.
    fn open(
        &self,
        config: &BenchConfig,
        completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError>;
}
