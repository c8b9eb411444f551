//! Per-packet statistical outliers
//!
//! Each packet becomes a row `[packet_size, inter_arrival, media_indicator]`.
//! The inter-arrival series is one element shorter than the others, so all
//! three columns are truncated to the shortest. An isolation forest is fit
//! on the rows and the top `contamination` fraction by score is flagged.

use super::forest::IsolationForest;
use crate::config::AnalysisConfig;
use crate::packet::Protocol;
use crate::stats::percentile;
use crate::traffic::TrafficPattern;
use serde::Serialize;

/// A packet flagged as a statistical outlier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketAnomaly {
    pub timestamp: f64,
    pub packet_size: usize,
    pub protocol: Protocol,
    /// `None` when the index has no inter-arrival sample
    pub inter_arrival: Option<f64>,
    /// Isolation score in `(0, 1]`
    pub score: f64,
}

/// Fits an isolation forest over a traffic pattern and flags outliers
#[derive(Debug, Clone, Copy)]
pub struct OutlierDetector {
    contamination: f64,
    seed: u64,
    trees: usize,
    max_samples: usize,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl OutlierDetector {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            contamination: config.contamination,
            seed: config.outlier_seed,
            trees: config.outlier_trees,
            max_samples: config.outlier_max_samples,
        }
    }

    /// Same settings with a different RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Feature rows for a pattern, truncated to the shortest column
    pub fn feature_rows(pattern: &TrafficPattern) -> Vec<Vec<f64>> {
        pattern
            .packet_sizes
            .iter()
            .zip(&pattern.inter_arrival_times)
            .zip(&pattern.protocol_sequence)
            .map(|((&size, &gap), protocol)| vec![size as f64, gap, protocol.indicator()])
            .collect()
    }

    /// Flag outlier packets
    ///
    /// Needs at least two sizes, one inter-arrival time and two protocol
    /// tags; anything less returns an empty list.
    pub fn detect(&self, pattern: &TrafficPattern) -> Vec<PacketAnomaly> {
        if pattern.packet_sizes.len() < 2
            || pattern.inter_arrival_times.is_empty()
            || pattern.protocol_sequence.len() < 2
        {
            tracing::debug!(packets = pattern.len(), "outlier_detection_skipped");
            return Vec::new();
        }

        let rows = Self::feature_rows(pattern);
        let forest = IsolationForest::fit(&rows, self.trees, self.max_samples, self.seed);
        let scores = forest.score_all(&rows);

        let cutoff_percent = 100.0 * (1.0 - self.contamination.clamp(0.0, 1.0));
        let Some(cutoff) = percentile(&scores, cutoff_percent) else {
            return Vec::new();
        };

        let anomalies: Vec<PacketAnomaly> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score > cutoff)
            .filter_map(|(i, &score)| {
                Some(PacketAnomaly {
                    timestamp: *pattern.time_series.get(i)?,
                    packet_size: *pattern.packet_sizes.get(i)?,
                    protocol: *pattern.protocol_sequence.get(i)?,
                    inter_arrival: pattern.inter_arrival_times.get(i).copied(),
                    score,
                })
            })
            .collect();

        tracing::debug!(
            rows = rows.len(),
            flagged = anomalies.len(),
            cutoff = %format!("{:.4}", cutoff),
            "outliers_flagged"
        );
        anomalies
    }
}
