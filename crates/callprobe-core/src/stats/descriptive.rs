//! Summary statistics over sample slices

use serde::Serialize;

/// Arithmetic mean, `0.0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`), `0.0` for an empty slice
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile with linear interpolation between closest ranks
///
/// `q` is in percent (0..=100). Returns `None` for an empty slice.
///
/// # Example
/// ```
/// use callprobe_core::stats::percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(percentile(&values, 50.0), Some(2.5));
/// assert_eq!(percentile(&values, 25.0), Some(1.75));
/// ```
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, q))
}

/// Percentile over an already sorted slice (must be non-empty)
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Map NaN and infinities to `0.0`
///
/// Every metric passes through here before it is placed in a report, so a
/// numeric domain error degrades one value instead of the whole report.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!(value = %value, "non_finite_metric_defaulted");
        0.0
    }
}

/// Mean, spread and quartiles of a sample set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

impl Distribution {
    /// Summarize `values`, `None` when there are no samples
    pub fn from_samples(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            mean: finite_or_zero(mean(values)),
            std: finite_or_zero(population_std(values)),
            p25: finite_or_zero(percentile_sorted(&sorted, 25.0)),
            p50: finite_or_zero(percentile_sorted(&sorted, 50.0)),
            p75: finite_or_zero(percentile_sorted(&sorted, 75.0)),
        })
    }
}
