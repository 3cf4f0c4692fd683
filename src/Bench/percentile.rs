/// Quantiles reported for every run.
pub const QUANTILES: [f64; 5] = [0.50, 0.90, 0.95, 0.99, 0.999];

/// Latency quantiles in microseconds. Empty means no sample was collected,
/// which is reported as "unavailable" rather than as zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PercentileResult {
    points: Vec<(f64, f64)>,
}

impl PercentileResult {
    /// Sort `samples_ns` and evaluate every entry of `QUANTILES`.
    pub fn from_samples(mut samples_ns: Vec<u64>) -> Self {
        if samples_ns.is_empty() {
            return Self::default();
        }
        samples_ns.sort_unstable();
        let points = QUANTILES
            .iter()
            .filter_map(|&q| quantile(&samples_ns, q).map(|us| (q, us)))
            .collect();
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value for quantile `q` if it was computed.
    pub fn get(&self, q: f64) -> Option<f64> {
        self.points
            .iter()
            .find(|(p, _)| (p - q).abs() < f64::EPSILON)
            .map(|(_, v)| *v)
    }

    /// `(quantile, microseconds)` pairs in ascending quantile order.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

/// Linearly interpolated quantile of an ascending slice of nanosecond values,
/// returned in microseconds. `None` for an empty slice.
pub fn quantile(sorted_ns: &[u64], q: f64) -> Option<f64> {
    if sorted_ns.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted_ns.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (pos.ceil() as usize).min(sorted_ns.len() - 1);
    let frac = pos - lo as f64;
    let ns = sorted_ns[lo] as f64 * (1.0 - frac) + sorted_ns[hi] as f64 * frac;
    Some(ns / 1000.0)
}
