//! Benchmark engine: configuration, workers, statistics and reporting.

pub mod cancel;
pub mod config;
pub mod envelope;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod percentile;
pub mod report;
pub mod reservoir;
pub mod stats;

pub use cancel::StopToken;
pub use config::BenchConfig;
pub use error::{BenchError, ConfigError, ReportError};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use report::Reporter;
