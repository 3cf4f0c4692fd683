use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use dmxp_qbench::Bench::{BenchConfig, BenchError, Orchestrator, Reporter};
#[cfg(target_os = "linux")]
use dmxp_qbench::Transport::MqueueOptions;
#[cfg(not(target_os = "linux"))]
use dmxp_qbench::Transport::TransportSetupError;
use dmxp_qbench::Transport::{DispatchOptions, ShmOptions, TransportFactory};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Parser, Debug)]
#[command(name = "qbench")]
#[command(about = "Throughput and end-to-end latency benchmark for message-passing backends")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    backend: Backend,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run length in seconds
    #[arg(long, default_value_t = 5)]
    duration_seconds: u64,

    /// Bytes per message, including the 16-byte timestamp header
    #[arg(long, default_value_t = 256)]
    message_size: usize,

    /// Bound on messages sent but not yet received
    #[arg(long, alias = "max-messages", default_value_t = 1024)]
    max_inflight: usize,

    #[arg(long, default_value_t = 1)]
    producers: usize,

    #[arg(long, default_value_t = 1)]
    consumers: usize,

    /// Fill payload bytes after the header with random data
    #[arg(
        long,
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    random_payload: bool,

    /// Latency reservoir size; 0 disables latency sampling
    #[arg(long, default_value_t = 100_000)]
    latency_sample: usize,

    /// Seconds between progress lines; 0 disables them
    #[arg(long, default_value_t = 1)]
    print_interval: u64,

    /// Append one CSV record per run to this file
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
}

impl RunArgs {
    fn to_config(&self) -> BenchConfig {
        let config = BenchConfig::new()
            .with_duration(Duration::from_secs(self.duration_seconds))
            .with_message_size(self.message_size)
            .with_max_in_flight(self.max_inflight)
            .with_producers(self.producers)
            .with_consumers(self.consumers)
            .with_random_payload(self.random_payload)
            .with_latency_sample(self.latency_sample)
            .with_print_interval(Duration::from_secs(self.print_interval));
        match &self.csv {
            Some(path) => config.with_csv_path(path.clone()),
            None => config,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Backend {
    /// Shared-memory MPMC ring under /dev/shm
    Shm(QueueArgs),
    /// POSIX message queue (Linux)
    Mqueue(QueueArgs),
    /// Serial dispatch queues delivering through a completion callback
    Dispatch,
}

#[derive(Args, Debug)]
struct QueueArgs {
    /// Region or queue name (backend default when omitted)
    #[arg(long)]
    name: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    nonblocking: bool,

    /// Remove a stale queue before opening
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    unlink_start: bool,

    /// Remove the queue after the run
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    unlink_end: bool,
}

impl Backend {
    fn factory(&self) -> Result<Box<dyn TransportFactory>, BenchError> {
        match self {
            Backend::Shm(args) => {
                let defaults = ShmOptions::default();
                Ok(Box::new(ShmOptions {
                    name: args.name.clone().unwrap_or(defaults.name),
                    non_blocking: args.nonblocking,
                    unlink_at_start: args.unlink_start,
                    unlink_at_end: args.unlink_end,
                }))
            }
            Backend::Mqueue(args) => mqueue_factory(args),
            Backend::Dispatch => Ok(Box::new(DispatchOptions::default())),
        }
    }
}

#[cfg(target_os = "linux")]
fn mqueue_factory(args: &QueueArgs) -> Result<Box<dyn TransportFactory>, BenchError> {
    let defaults = MqueueOptions::default();
    Ok(Box::new(MqueueOptions {
        name: args.name.clone().unwrap_or(defaults.name),
        non_blocking: args.nonblocking,
        unlink_at_start: args.unlink_start,
        unlink_at_end: args.unlink_end,
    }))
}

#[cfg(not(target_os = "linux"))]
fn mqueue_factory(args: &QueueArgs) -> Result<Box<dyn TransportFactory>, BenchError> {
    Err(BenchError::TransportSetup(TransportSetupError::Open {
        backend: "mqueue",
        identifier: args.name.clone().unwrap_or_default(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "POSIX message queues are only supported on Linux",
        ),
    }))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "benchmark failed");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), BenchError> {
    let config = cli.run.to_config();
    let orchestrator = Orchestrator::new(config)?;
    let factory = cli.backend.factory()?;
    let reporter = Reporter::from_config(orchestrator.config());

    let stop = orchestrator.stop_token();
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        warn!(error = %e, "failed to install signal handler; Ctrl-C will not stop the run early");
    }

    reporter.print_config(orchestrator.config(), factory.backend());
    let outcome = orchestrator.run(factory.as_ref(), &reporter)?;
    reporter.finish(orchestrator.config(), &outcome);
    Ok(())
}
