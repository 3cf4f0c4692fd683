// Push-style transport: serial worker queues fed round-robin

use super::{
    CompletionHandler, Delivery, Transport, TransportError, TransportFactory, TransportSetupError,
};
use crate::Bench::config::BenchConfig;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const BACKEND: &str = "dispatch";

/// Options for the dispatch-queue backend. One serial queue per configured consumer.
#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Thread-name prefix of the serial queues and the run's identifier.
    pub label: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            label: "dispatch_queue".to_string(),
        }
    }
}

impl TransportFactory for DispatchOptions {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn open(
        &self,
        config: &BenchConfig,
        completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError> {
        let queues = config.consumers.max(1);
        let mut senders = Vec::with_capacity(queues);
        let mut workers = Vec::with_capacity(queues);

        for i in 0..queues {
            let (tx, rx) = unbounded::<Vec<u8>>();
            let handler = Arc::clone(&completion);
            let spawned = thread::Builder::new()
                .name(format!("{}.worker.{}", self.label, i))
                .spawn(move || {
                    // Runs until every sender is dropped, then drains what is left.
                    for payload in rx.iter() {
                        handler.on_complete(&payload);
                    }
                });
            match spawned {
                Ok(handle) => {
                    senders.push(tx);
                    workers.push(handle);
                }
                Err(source) => {
                    drop(senders);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(TransportSetupError::Spawn {
                        backend: BACKEND,
                        source,
                    });
                }
            }
        }

        debug!(queues, label = %self.label, "dispatch queues started");
        Ok(Arc::new(DispatchTransport {
            label: self.label.clone(),
            queues: RwLock::new(Some(senders)),
            next: AtomicU64::new(0),
            workers: Mutex::new(workers),
        }))
    }
}

pub struct DispatchTransport {
    label: String,
    queues: RwLock<Option<Vec<Sender<Vec<u8>>>>>,
    next: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Transport for DispatchTransport {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn identifier(&self) -> &str {
        &self.label
    }

    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    /// Queues are unbounded; the engine's flow control is the only bound.
    fn send(&self, payload: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let guard = self.queues.read();
        let queues = guard.as_ref().ok_or(TransportError::Closed)?;
        let idx = self.next.fetch_add(1, Ordering::Relaxed) as usize % queues.len();
        queues[idx]
            .send(payload.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        // Dropping the senders lets each worker drain its queue and exit.
        if self.queues.write().take().is_none() {
            return;
        }
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                warn!(label = %self.label, "dispatch worker panicked");
            }
        }
    }
}

impl Drop for DispatchTransport {
    fn drop(&mut self) {
        self.close();
    }
}
