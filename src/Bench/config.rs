use super::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Hard cap on the latency reservoir: 16Mi samples, 128 MiB of `u64`.
pub const MAX_LATENCY_SAMPLE: usize = 16 * 1024 * 1024;

/// Run parameters shared by every backend.
#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub duration: Duration,
    pub message_size: usize,
    /// Upper bound on messages sent but not yet completed.
    pub max_in_flight: usize,
    pub producers: usize,
    /// Consumer workers for pull-style transports; serial queues for push-style ones.
    pub consumers: usize,
    pub random_payload: bool,
    /// Reservoir capacity; 0 disables latency sampling.
    pub latency_sample: usize,
    /// Progress print period; zero disables progress output.
    pub print_interval: Duration,
    pub csv_path: Option<PathBuf>,
    /// Bound on every blocking transport call.
    pub op_timeout: Duration,
    /// Wait after producers exit so asynchronous completions can land.
    pub grace_period: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            message_size: 256,
            max_in_flight: 1024,
            producers: 1,
            consumers: 1,
            random_payload: false,
            latency_sample: 100_000,
            print_interval: Duration::from_secs(1),
            csv_path: None,
            op_timeout: Duration::from_millis(100),
            grace_period: Duration::from_millis(200),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_message_size(mut self, size: usize) -> Self {
        self.message_size = size;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn with_random_payload(mut self, enabled: bool) -> Self {
        self.random_payload = enabled;
        self
    }

    pub fn with_latency_sample(mut self, capacity: usize) -> Self {
        self.latency_sample = capacity;
        self
    }

    pub fn with_print_interval(mut self, interval: Duration) -> Self {
        self.print_interval = interval;
        self
    }

    pub fn with_csv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.csv_path = Some(path.into());
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Reject parameters that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_size == 0 {
            return Err(ConfigError::ZeroMessageSize);
        }
        if self.producers == 0 || self.consumers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::ZeroInFlight);
        }
        if self.latency_sample > MAX_LATENCY_SAMPLE {
            return Err(ConfigError::SampleTooLarge {
                requested: self.latency_sample,
                limit: MAX_LATENCY_SAMPLE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BenchConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_parameters() {
        let base = BenchConfig::new();
        assert!(matches!(
            base.clone().with_message_size(0).validate(),
            Err(ConfigError::ZeroMessageSize)
        ));
        assert!(matches!(
            base.clone().with_producers(0).validate(),
            Err(ConfigError::NoWorkers)
        ));
        assert!(matches!(
            base.clone().with_consumers(0).validate(),
            Err(ConfigError::NoWorkers)
        ));
        assert!(matches!(
            base.clone().with_duration(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration)
        ));
        assert!(matches!(
            base.clone().with_max_in_flight(0).validate(),
            Err(ConfigError::ZeroInFlight)
        ));
    }

    #[test]
    fn caps_latency_sample() {
        let cfg = BenchConfig::new().with_latency_sample(MAX_LATENCY_SAMPLE + 1);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SampleTooLarge { .. })
        ));
        assert!(BenchConfig::new()
            .with_latency_sample(MAX_LATENCY_SAMPLE)
            .validate()
            .is_ok());
        assert!(BenchConfig::new().with_latency_sample(0).validate().is_ok());
    }
}
