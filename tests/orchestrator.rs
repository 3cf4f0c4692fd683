use dmxp_qbench::Bench::{BenchConfig, BenchError, ConfigError, Orchestrator, Reporter, RunOutcome};
use dmxp_qbench::Transport::{
    CompletionHandler, Delivery, DispatchOptions, ShmOptions, Transport, TransportError,
    TransportFactory, TransportSetupError,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn quick_config() -> BenchConfig {
    BenchConfig::new()
        .with_duration(Duration::from_millis(400))
        .with_print_interval(Duration::ZERO)
        .with_grace_period(Duration::from_millis(50))
}

fn run(config: BenchConfig, factory: &dyn TransportFactory) -> RunOutcome {
    let reporter = Reporter::from_config(&config);
    Orchestrator::new(config)
        .unwrap()
        .run(factory, &reporter)
        .unwrap()
}

fn assert_healthy(outcome: &RunOutcome) {
    let s = &outcome.stats;
    assert!(s.recv_messages > 0, "{:?}", s);
    assert!(s.recv_messages <= s.sent_messages, "{:?}", s);
    assert_eq!(s.sent_bytes, s.sent_messages * 64);
    assert_eq!(s.send_errors, 0);
    assert!(!outcome.percentiles.is_empty());
    let p50 = outcome.percentiles.get(0.50).unwrap();
    let p99 = outcome.percentiles.get(0.99).unwrap();
    assert!(p50 <= p99);
    assert!(outcome.throughput_msgs() > 0.0);
}

#[test]
fn dispatch_four_producers_one_consumer() {
    let config = quick_config()
        .with_producers(4)
        .with_consumers(1)
        .with_message_size(64);
    let outcome = run(config, &DispatchOptions::default());
    assert_eq!(outcome.backend, "dispatch");
    assert_eq!(outcome.identifier, "dispatch_queue");
    assert_healthy(&outcome);
}

#[test]
fn small_in_flight_window_samples_every_message() {
    let config = quick_config()
        .with_max_in_flight(4)
        .with_message_size(64)
        .with_grace_period(Duration::from_millis(200));
    let capacity = config.latency_sample;
    let outcome = run(config, &DispatchOptions::default());

    let recv = outcome.stats.recv_messages as usize;
    assert!(recv > 0);
    assert_eq!(outcome.latency_samples, recv.min(capacity));
    assert!(outcome.percentiles.get(0.50).unwrap() >= 0.0);
}

#[test]
#[serial]
fn shm_four_producers_one_consumer() {
    let config = quick_config()
        .with_producers(4)
        .with_consumers(1)
        .with_message_size(64)
        .with_max_in_flight(256);
    let factory = ShmOptions {
        name: "qbench_orchestrator_test".to_string(),
        ..ShmOptions::default()
    };
    let outcome = run(config, &factory);
    assert_eq!(outcome.backend, "shm");
    assert_healthy(&outcome);
    assert!(!std::path::Path::new("/dev/shm/qbench_orchestrator_test").exists());
}

#[test]
#[serial]
fn shm_rejects_messages_larger_than_a_slot() {
    let config = quick_config().with_message_size(4096);
    let err = Orchestrator::new(config.clone())
        .unwrap()
        .run(&ShmOptions::default(), &Reporter::from_config(&config))
        .unwrap_err();
    assert!(matches!(
        err,
        BenchError::TransportSetup(TransportSetupError::MessageTooLarge { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn messages_shorter_than_the_header_have_no_latency() {
    let config = quick_config().with_message_size(8);
    let outcome = run(config.clone(), &DispatchOptions::default());
    assert!(outcome.stats.recv_messages > 0);
    assert!(outcome.percentiles.is_empty());
    assert_eq!(outcome.latency_samples, 0);
    let text = Reporter::default().summary(&config, &outcome);
    assert!(text.contains("unavailable"), "{}", text);
}

#[test]
fn zero_latency_sample_disables_sampling() {
    let config = quick_config().with_latency_sample(0).with_message_size(64);
    let outcome = run(config, &DispatchOptions::default());
    assert!(outcome.stats.recv_messages > 0);
    assert!(outcome.percentiles.is_empty());
}

#[test]
fn invalid_configs_are_rejected_before_running() {
    assert!(matches!(
        Orchestrator::new(BenchConfig::new().with_producers(0)),
        Err(ConfigError::NoWorkers)
    ));
    assert!(matches!(
        Orchestrator::new(BenchConfig::new().with_message_size(0)),
        Err(ConfigError::ZeroMessageSize)
    ));
    assert!(matches!(
        Orchestrator::new(BenchConfig::new().with_max_in_flight(0)),
        Err(ConfigError::ZeroInFlight)
    ));
}

/// Pull transport that accepts a fixed number of sends and never yields data.
struct Scripted {
    budget: AtomicUsize,
    closed: AtomicBool,
}

impl Transport for Scripted {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn identifier(&self) -> &str {
        "scripted"
    }

    fn delivery(&self) -> Delivery {
        Delivery::Pull
    }

    fn send(&self, _payload: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let left = self.budget.load(Ordering::SeqCst);
        if left > 0
            && self
                .budget
                .compare_exchange(left, left - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            Ok(())
        } else {
            Err(TransportError::WouldBlock)
        }
    }

    fn receive(&self, _buf: &mut Vec<u8>, timeout: Duration) -> Result<usize, TransportError> {
        thread::sleep(timeout.min(Duration::from_millis(5)));
        Err(TransportError::WouldBlock)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedFactory {
    budget: usize,
    opened: std::sync::Mutex<Option<Arc<Scripted>>>,
}

impl TransportFactory for ScriptedFactory {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn open(
        &self,
        _config: &BenchConfig,
        _completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError> {
        let t = Arc::new(Scripted {
            budget: AtomicUsize::new(self.budget),
            closed: AtomicBool::new(false),
        });
        *self.opened.lock().unwrap() = Some(t.clone());
        Ok(t)
    }
}

#[test]
fn counts_exactly_the_accepted_sends() {
    let factory = ScriptedFactory {
        budget: 5,
        opened: std::sync::Mutex::new(None),
    };
    let config = quick_config().with_producers(2).with_consumers(2);
    let outcome = run(config, &factory);

    assert_eq!(outcome.stats.sent_messages, 5);
    assert_eq!(outcome.stats.recv_messages, 0);
    assert!(outcome.stats.send_retries > 0);
    assert!(outcome.stats.recv_retries > 0);
    assert!(outcome.percentiles.is_empty());

    let transport = factory.opened.lock().unwrap().clone().unwrap();
    assert!(transport.closed.load(Ordering::SeqCst));
}

/// Push transport that swallows every message and never completes one.
struct BlackHole;

impl Transport for BlackHole {
    fn backend(&self) -> &'static str {
        "blackhole"
    }

    fn identifier(&self) -> &str {
        "blackhole"
    }

    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    fn send(&self, _payload: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&self) {}
}

struct BlackHoleFactory;

impl TransportFactory for BlackHoleFactory {
    fn backend(&self) -> &'static str {
        "blackhole"
    }

    fn open(
        &self,
        _config: &BenchConfig,
        _completion: Arc<dyn CompletionHandler>,
    ) -> Result<Arc<dyn Transport>, TransportSetupError> {
        Ok(Arc::new(BlackHole))
    }
}

#[test]
fn in_flight_bound_holds_when_nothing_completes() {
    let config = quick_config().with_producers(3).with_max_in_flight(8);
    let outcome = run(config, &BlackHoleFactory);
    assert_eq!(outcome.stats.sent_messages, 8);
    assert_eq!(outcome.stats.recv_messages, 0);
}

#[test]
fn stop_token_ends_the_run_early() {
    let config = quick_config().with_duration(Duration::from_secs(30));
    let orchestrator = Orchestrator::new(config.clone()).unwrap();
    let stop = orchestrator.stop_token();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        stop.stop();
    });

    let started = Instant::now();
    let outcome = orchestrator
        .run(&DispatchOptions::default(), &Reporter::from_config(&config))
        .unwrap();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.elapsed_secs < 5.0);
    assert!(outcome.stats.recv_messages > 0);
}

#[test]
fn csv_records_are_appended() {
    let path = std::env::temp_dir().join(format!("qbench_csv_{}.csv", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let config = quick_config().with_message_size(64).with_csv_path(&path);
    let reporter = Reporter::from_config(&config);

    let outcome = run(config.clone(), &DispatchOptions::default());
    reporter.append_csv(&config, &outcome).unwrap();
    reporter.append_csv(&config, &outcome).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(fields.len(), 20);
    assert_eq!(fields[0], "dispatch");
    assert_eq!(fields[1], "dispatch_queue");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unwritable_csv_does_not_fail_the_run() {
    let config = quick_config()
        .with_message_size(64)
        .with_csv_path("/nonexistent-qbench-dir/out.csv");
    let reporter = Reporter::from_config(&config);
    let outcome = run(config.clone(), &DispatchOptions::default());

    assert!(reporter.append_csv(&config, &outcome).is_err());
    // logs a warning and returns
    reporter.finish(&config, &outcome);
}
