use super::config::BenchConfig;
use super::error::ReportError;
use super::orchestrator::RunOutcome;
use super::stats::StatsSnapshot;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MIB: f64 = 1024.0 * 1024.0;

/// Console output and the optional append-only CSV record.
#[derive(Clone, Debug, Default)]
pub struct Reporter {
    csv_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(csv_path: Option<PathBuf>) -> Self {
        Self { csv_path }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(config.csv_path.clone())
    }

    pub fn csv_path(&self) -> Option<&Path> {
        self.csv_path.as_deref()
    }

    pub fn print_config(&self, config: &BenchConfig, backend: &str) {
        println!("Configuration:");
        println!("  backend:          {}", backend);
        println!("  duration-seconds: {}", config.duration.as_secs_f64());
        println!("  message-size:     {}", config.message_size);
        println!("  max-inflight:     {}", config.max_in_flight);
        println!("  producers:        {}", config.producers);
        println!("  consumers:        {}", config.consumers);
        println!("  random-payload:   {}", config.random_payload);
        println!("  latency-sample:   {}", config.latency_sample);
        println!("  print-interval:   {}", config.print_interval.as_secs_f64());
        if let Some(path) = &self.csv_path {
            println!("  csv:              {}", path.display());
        }
    }

    pub fn progress(&self, snap: &StatsSnapshot) {
        println!("{}", progress_line(snap));
    }

    pub fn summary(&self, config: &BenchConfig, outcome: &RunOutcome) -> String {
        let s = &outcome.stats;
        let mut out = String::new();
        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "  backend:         {} ({})", outcome.backend, outcome.identifier);
        let _ = writeln!(out, "  non-blocking:    {}", outcome.non_blocking);
        let _ = writeln!(out, "  elapsed-sec:     {:.6}", outcome.elapsed_secs);
        let _ = writeln!(out, "  messages-sent:   {}", s.sent_messages);
        let _ = writeln!(out, "  messages-recv:   {}", s.recv_messages);
        let _ = writeln!(out, "  bytes-sent:      {}", s.sent_bytes);
        let _ = writeln!(out, "  bytes-recv:      {}", s.recv_bytes);
        let _ = writeln!(out, "  throughput-msg/s {:.2}", outcome.throughput_msgs());
        let _ = writeln!(out, "  throughput-MiB/s {:.2}", outcome.throughput_mib());
        let _ = writeln!(
            out,
            "  send-errors:     {} (retries {})",
            s.send_errors, s.send_retries
        );
        let _ = writeln!(
            out,
            "  recv-errors:     {} (retries {})",
            s.recv_errors, s.recv_retries
        );

        if outcome.percentiles.is_empty() {
            let reason = if config.latency_sample == 0 {
                "sampling disabled"
            } else {
                "no timestamped messages"
            };
            let _ = writeln!(out, "  latency-us:      unavailable ({})", reason);
        } else {
            let mut line = String::new();
            for &(q, value) in outcome.percentiles.points() {
                let _ = write!(line, " {}={:.2}", quantile_label(q), value);
            }
            let _ = writeln!(
                out,
                "  latency-us:     {} (samples {})",
                line, outcome.latency_samples
            );
        }
        out
    }

    /// One CSV record, no trailing newline.
    pub fn csv_line(&self, config: &BenchConfig, outcome: &RunOutcome) -> String {
        let mut fields = vec![
            outcome.backend.to_string(),
            outcome.identifier.clone(),
            // whole seconds print without a fraction
            config.duration.as_secs_f64().to_string(),
            config.message_size.to_string(),
            config.max_in_flight.to_string(),
            config.producers.to_string(),
            config.consumers.to_string(),
            flag(outcome.non_blocking).to_string(),
            flag(config.random_payload).to_string(),
            config.latency_sample.to_string(),
            format!("{:.6}", outcome.elapsed_secs),
            outcome.stats.recv_messages.to_string(),
            outcome.stats.recv_bytes.to_string(),
            format!("{:.2}", outcome.throughput_msgs()),
            format!("{:.2}", outcome.throughput_mib()),
        ];
        for q in super::percentile::QUANTILES {
            fields.push(match outcome.percentiles.get(q) {
                Some(v) => format!("{:.2}", v),
                None => "nan".to_string(),
            });
        }
        fields.join(",")
    }

    pub fn append_csv(&self, config: &BenchConfig, outcome: &RunOutcome) -> Result<(), ReportError> {
        let Some(path) = &self.csv_path else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ReportError::Open {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{}", self.csv_line(config, outcome)).map_err(|source| {
            ReportError::Write {
                path: path.clone(),
                source,
            }
        })
    }

    /// Print the summary and append the CSV record. CSV trouble is only
    /// logged; the run's result stands.
    pub fn finish(&self, config: &BenchConfig, outcome: &RunOutcome) {
        print!("{}", self.summary(config, outcome));
        match self.append_csv(config, outcome) {
            Ok(()) => {
                if let Some(path) = &self.csv_path {
                    info!(path = %path.display(), "CSV record appended");
                }
            }
            Err(e) => warn!(error = %e, "CSV record not written"),
        }
    }
}

pub fn progress_line(snap: &StatsSnapshot) -> String {
    format!(
        "sent={} recv={} sentMiB={:.2} recvMiB={:.2}",
        snap.sent_messages,
        snap.recv_messages,
        snap.sent_bytes as f64 / MIB,
        snap.recv_bytes as f64 / MIB
    )
}

fn quantile_label(q: f64) -> String {
    // 0.999 -> p99.9
    let pct = format!("{:.1}", q * 100.0);
    format!("p{}", pct.trim_end_matches(".0"))
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}
