//! Per-call feature vectors for quality models

use crate::call::Call;
use crate::flow::FlowMetrics;
use crate::qos::QosReport;
use crate::stats::{finite_or_zero, mean, population_std};
use serde::Serialize;

/// Column names, in vector order
pub const FEATURE_NAMES: [&str; 6] = [
    "duration",
    "packet_count",
    "sip_count",
    "rtp_count",
    "jitter_ms",
    "packets_per_second",
];

/// Fixed-width numeric description of one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CallFeatures {
    /// Seconds
    pub duration: f64,
    pub packet_count: f64,
    pub sip_count: f64,
    pub rtp_count: f64,
    pub jitter_ms: f64,
    /// `packet_count / duration`, 0 for zero-length calls
    pub packets_per_second: f64,
}

impl CallFeatures {
    fn from_counts(duration: f64, total: usize, signaling: usize, media: usize, jitter_ms: f64) -> Self {
        let duration = finite_or_zero(duration);
        let packet_count = total as f64;
        let packets_per_second = if duration > 0.0 {
            packet_count / duration
        } else {
            0.0
        };
        Self {
            duration,
            packet_count,
            sip_count: signaling as f64,
            rtp_count: media as f64,
            jitter_ms: finite_or_zero(jitter_ms),
            packets_per_second: finite_or_zero(packets_per_second),
        }
    }

    pub fn from_call(call: &Call, metrics: &FlowMetrics) -> Self {
        Self::from_counts(
            call.duration(),
            call.packet_count(),
            call.signaling_count(),
            call.media_count(),
            metrics.mean_jitter_ms(),
        )
    }

    pub fn from_report(report: &QosReport) -> Self {
        Self::from_counts(
            report.call_duration,
            report.packet_stats.total,
            report.packet_stats.signaling,
            report.packet_stats.media,
            report.quality_metrics.jitter,
        )
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.duration,
            self.packet_count,
            self.sip_count,
            self.rtp_count,
            self.jitter_ms,
            self.packets_per_second,
        ]
    }
}

/// Mean and population std of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: &'static str,
    pub mean: f64,
    pub std: f64,
}

/// One row per call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureMatrix {
    rows: Vec<CallFeatures>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<CallFeatures>) -> Self {
        let matrix = Self { rows };
        matrix.log_summaries();
        matrix
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a QosReport>) -> Self {
        Self::new(reports.into_iter().map(CallFeatures::from_report).collect())
    }

    pub fn rows(&self) -> &[CallFeatures] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of column `index` (see [`FEATURE_NAMES`])
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.to_array().get(index).copied())
            .collect()
    }

    pub fn column_summaries(&self) -> Vec<ColumnSummary> {
        FEATURE_NAMES
            .iter()
            .enumerate()
            .map(|(i, &name)| {
                let values = self.column(i);
                ColumnSummary {
                    name,
                    mean: finite_or_zero(mean(&values)),
                    std: finite_or_zero(population_std(&values)),
                }
            })
            .collect()
    }

    fn log_summaries(&self) {
        tracing::info!(
            rows = self.rows.len(),
            columns = FEATURE_NAMES.len(),
            "Extracted call feature vectors"
        );
        if self.rows.is_empty() {
            return;
        }
        for summary in self.column_summaries() {
            tracing::debug!(
                feature = summary.name,
                mean = %format!("{:.2}", summary.mean),
                std = %format!("{:.2}", summary.std),
                "feature_column_summary"
            );
        }
    }
}

/// Predicted call quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Good,
    Poor,
}

/// A fitted, read-only call quality model
///
/// Callers own the model and pass it by reference; returns one label per
/// matrix row, in row order.
pub trait QualityModel {
    fn predict(&self, features: &FeatureMatrix) -> Vec<QualityLabel>;
}

/// Rule-of-thumb model: poor when jitter is high or packet rate too low
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdModel {
    pub max_jitter_ms: f64,
    /// Below this a call with media is considered starved
    pub min_packets_per_second: f64,
}

impl Default for ThresholdModel {
    fn default() -> Self {
        Self {
            max_jitter_ms: 30.0,
            min_packets_per_second: 10.0,
        }
    }
}

impl QualityModel for ThresholdModel {
    fn predict(&self, features: &FeatureMatrix) -> Vec<QualityLabel> {
        features
            .rows()
            .iter()
            .map(|row| {
                let starved = row.rtp_count > 0.0 && row.packets_per_second < self.min_packets_per_second;
                if row.jitter_ms > self.max_jitter_ms || starved {
                    QualityLabel::Poor
                } else {
                    QualityLabel::Good
                }
            })
            .collect()
    }
}

/// Run `model` over the reports' features and pair labels with call ids
pub fn classify<'a, M: QualityModel + ?Sized>(
    model: &M,
    reports: &'a [QosReport],
) -> Vec<(&'a str, QualityLabel)> {
    let matrix = FeatureMatrix::from_reports(reports);
    reports
        .iter()
        .map(|r| r.call_id.as_str())
        .zip(model.predict(&matrix))
        .collect()
}
