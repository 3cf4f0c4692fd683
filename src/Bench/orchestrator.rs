use super::cancel::StopToken;
use super::config::BenchConfig;
use super::envelope::{EnvelopeBuilder, EnvelopeHeader};
use super::error::{BenchError, ConfigError};
use super::flow::FlowController;
use super::percentile::PercentileResult;
use super::report::Reporter;
use super::reservoir::LatencyReservoir;
use super::stats::{StatsCounters, StatsSnapshot};
use crate::Core::clock::monotonic_ns;
use crate::Transport::{
    CompletionHandler, Delivery, Transport, TransportError, TransportFactory,
};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Backoff after a transient (would-block / timeout) failure.
pub const TRANSIENT_BACKOFF: Duration = Duration::from_micros(50);
/// Backoff after a hard transport error.
pub const ERROR_BACKOFF: Duration = Duration::from_micros(100);

const MIB: f64 = 1024.0 * 1024.0;

/// Receive side shared by consumer workers and push-style transports:
/// count the message, sample its latency, hand the flow-control slot back.
pub struct CompletionSink {
    stats: Arc<StatsCounters>,
    reservoir: Arc<LatencyReservoir>,
    flow: Arc<FlowController>,
}

impl CompletionSink {
    pub fn new(
        stats: Arc<StatsCounters>,
        reservoir: Arc<LatencyReservoir>,
        flow: Arc<FlowController>,
    ) -> Self {
        Self {
            stats,
            reservoir,
            flow,
        }
    }
}

impl CompletionHandler for CompletionSink {
    fn on_complete(&self, payload: &[u8]) {
        let received_ns = monotonic_ns();
        self.stats.record_recv(payload.len());
        if let Some(header) = EnvelopeHeader::decode(payload) {
            // A send stamp from the future means clock trouble; skip it.
            if let Some(latency) = received_ns.checked_sub(header.send_timestamp_ns) {
                self.reservoir.record(latency);
            }
        }
        self.flow.release();
    }
}

/// Everything a producer or consumer worker needs for one run.
pub struct WorkerContext {
    config: BenchConfig,
    transport: Arc<dyn Transport>,
    stats: Arc<StatsCounters>,
    flow: Arc<FlowController>,
    sink: Arc<CompletionSink>,
    stop: StopToken,
}

impl WorkerContext {
    pub fn new(
        config: BenchConfig,
        transport: Arc<dyn Transport>,
        stats: Arc<StatsCounters>,
        flow: Arc<FlowController>,
        sink: Arc<CompletionSink>,
        stop: StopToken,
    ) -> Self {
        Self {
            config,
            transport,
            stats,
            flow,
            sink,
            stop,
        }
    }

    /// Producer loop: build, take a slot, submit; retry the same message
    /// until it is accepted or the run stops.
    pub fn run_producer(&self, worker: usize) {
        let mut envelope =
            EnvelopeBuilder::new(self.config.message_size, self.config.random_payload, worker);
        debug!(worker, header = envelope.carries_header(), "producer started");

        'run: while !self.stop.is_stopped() {
            let message = envelope.build();
            if !self.flow.acquire(&self.stop) {
                break;
            }

            loop {
                match self.transport.send(message, self.config.op_timeout) {
                    Ok(()) => {
                        self.stats.record_send(message.len());
                        break;
                    }
                    Err(TransportError::WouldBlock) => {
                        self.stats.send_retry();
                        thread::sleep(TRANSIENT_BACKOFF);
                    }
                    Err(e) => {
                        self.stats.send_error();
                        trace!(worker, error = %e, "send failed");
                        thread::sleep(ERROR_BACKOFF);
                    }
                }
                if self.stop.is_stopped() {
                    // Never submitted, so nobody else will return the slot.
                    self.flow.release();
                    break 'run;
                }
            }
        }

        debug!(worker, built = envelope.next_sequence(), "producer exited");
    }

    /// Consumer loop for pull-style transports. Every receive is bounded by
    /// `op_timeout` so a stop is observed even when no traffic arrives.
    pub fn run_consumer(&self, worker: usize) {
        debug!(worker, "consumer started");
        let mut buf = Vec::with_capacity(self.config.message_size);

        while !self.stop.is_stopped() {
            match self.transport.receive(&mut buf, self.config.op_timeout) {
                Ok(len) => self.sink.on_complete(&buf[..len]),
                Err(TransportError::WouldBlock) => {
                    self.stats.recv_retry();
                    thread::sleep(TRANSIENT_BACKOFF);
                }
                Err(e) => {
                    self.stats.recv_error();
                    trace!(worker, error = %e, "receive failed");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        debug!(worker, "consumer exited");
    }
}

/// Final numbers of one run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub backend: &'static str,
    pub identifier: String,
    pub non_blocking: bool,
    /// Wall-clock seconds used for throughput; the configured duration if
    /// the measured time was degenerate.
    pub elapsed_secs: f64,
    pub stats: StatsSnapshot,
    pub percentiles: PercentileResult,
    /// Samples retained in the reservoir at the end of the run.
    pub latency_samples: usize,
}

impl RunOutcome {
    pub fn throughput_msgs(&self) -> f64 {
        self.stats.recv_messages as f64 / self.elapsed_secs
    }

    pub fn throughput_mib(&self) -> f64 {
        (self.stats.recv_bytes as f64 / MIB) / self.elapsed_secs
    }
}

/// Seconds for throughput math: measured if positive, configured otherwise.
pub fn effective_elapsed(measured: Duration, configured: Duration) -> f64 {
    let secs = measured.as_secs_f64();
    if secs > 0.0 {
        secs
    } else {
        configured.as_secs_f64()
    }
}

/// Drives one benchmark run: opens the transport, runs workers for the
/// configured duration, shuts down in order and summarizes.
pub struct Orchestrator {
    config: BenchConfig,
    stop: StopToken,
    stats: Arc<StatsCounters>,
    reservoir: Arc<LatencyReservoir>,
    flow: Arc<FlowController>,
}

impl Orchestrator {
    pub fn new(config: BenchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stop: StopToken::new(),
            stats: Arc::new(StatsCounters::new()),
            reservoir: Arc::new(LatencyReservoir::new(config.latency_sample)),
            flow: Arc::new(FlowController::new(config.max_in_flight)),
            config,
        })
    }

    /// Token that ends the run early when stopped, e.g. from a signal handler.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<StatsCounters> {
        &self.stats
    }

    pub fn reservoir(&self) -> &Arc<LatencyReservoir> {
        &self.reservoir
    }

    pub fn run(
        &self,
        factory: &dyn TransportFactory,
        reporter: &Reporter,
    ) -> Result<RunOutcome, BenchError> {
        let sink = Arc::new(CompletionSink::new(
            Arc::clone(&self.stats),
            Arc::clone(&self.reservoir),
            Arc::clone(&self.flow),
        ));
        let transport = factory.open(&self.config, sink.clone())?;
        let ctx = Arc::new(WorkerContext::new(
            self.config.clone(),
            Arc::clone(&transport),
            Arc::clone(&self.stats),
            Arc::clone(&self.flow),
            sink,
            self.stop.clone(),
        ));

        let mut consumers = Vec::new();
        if transport.delivery() == Delivery::Pull {
            for i in 0..self.config.consumers {
                let worker = Arc::clone(&ctx);
                match spawn_worker(format!("consumer.{i}"), move || worker.run_consumer(i)) {
                    Ok(handle) => consumers.push(handle),
                    Err(source) => {
                        return Err(self.abort(&*transport, consumers, "consumer", source))
                    }
                }
            }
        }

        let mut producers = Vec::with_capacity(self.config.producers);
        for i in 0..self.config.producers {
            let worker = Arc::clone(&ctx);
            match spawn_worker(format!("producer.{i}"), move || worker.run_producer(i)) {
                Ok(handle) => producers.push(handle),
                Err(source) => {
                    consumers.extend(producers);
                    return Err(self.abort(&*transport, consumers, "producer", source));
                }
            }
        }

        let start = Instant::now();
        self.drive(start, reporter);

        // Shutdown order matters: producers first, then free every slot so
        // nothing stays parked, then let in-flight completions land.
        self.stop.stop();
        join_all(producers, "producer");
        self.flow.release_all(self.flow.capacity());
        thread::sleep(self.config.grace_period);
        join_all(consumers, "consumer");

        let elapsed_secs = effective_elapsed(start.elapsed(), self.config.duration);
        let stats = self.stats.snapshot();
        let samples = self.reservoir.snapshot();
        let latency_samples = samples.len();
        let percentiles = PercentileResult::from_samples(samples);

        let outcome = RunOutcome {
            backend: transport.backend(),
            identifier: transport.identifier().to_string(),
            non_blocking: transport.non_blocking(),
            elapsed_secs,
            stats,
            percentiles,
            latency_samples,
        };
        transport.close();

        info!(
            backend = outcome.backend,
            elapsed_secs,
            sent = stats.sent_messages,
            received = stats.recv_messages,
            latency_samples,
            "run finished"
        );
        Ok(outcome)
    }

    /// Sleep until the deadline or a stop, printing progress along the way.
    fn drive(&self, start: Instant, reporter: &Reporter) {
        let deadline = start + self.config.duration;
        let interval = self.config.print_interval;
        let mut next_print = start + interval;

        loop {
            let now = Instant::now();
            if now >= deadline || self.stop.is_stopped() {
                return;
            }
            let wake = if interval.is_zero() {
                deadline
            } else {
                next_print.min(deadline)
            };
            if self.stop.sleep(wake.saturating_duration_since(now)) {
                return;
            }
            if !interval.is_zero() && Instant::now() >= next_print {
                reporter.progress(&self.stats.snapshot());
                next_print += interval;
            }
        }
    }

    fn abort(
        &self,
        transport: &dyn Transport,
        started: Vec<JoinHandle<()>>,
        role: &'static str,
        source: io::Error,
    ) -> BenchError {
        self.stop.stop();
        self.flow.release_all(self.flow.capacity());
        join_all(started, role);
        transport.close();
        BenchError::Spawn { role, source }
    }
}

fn spawn_worker<F>(name: String, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(f)
}

fn join_all(handles: Vec<JoinHandle<()>>, role: &str) {
    for handle in handles {
        if handle.join().is_err() {
            warn!(role, "worker thread panicked");
        }
    }
}
