use crate::Transport::TransportSetupError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid run parameters, rejected before any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("message-size must be > 0")]
    ZeroMessageSize,

    #[error("producers and consumers must be >= 1")]
    NoWorkers,

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("max-inflight must be >= 1")]
    ZeroInFlight,

    #[error("latency-sample {requested} exceeds the limit of {limit} samples")]
    SampleTooLarge { requested: usize, limit: usize },
}

/// Failure to write the CSV record. Logged, never fatal.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to open CSV file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to append to CSV file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that end a run before it starts.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("transport setup failed: {0}")]
    TransportSetup(#[from] TransportSetupError),

    #[error("failed to spawn {role} worker: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
}

impl BenchError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            BenchError::Config(_) => 1,
            BenchError::TransportSetup(_) | BenchError::Spawn { .. } => 2,
        }
    }
}
