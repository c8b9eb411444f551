//! Threshold rules over flow metrics

use crate::config::AnalysisConfig;
use crate::flow::FlowMetrics;
use serde::{Serialize, Serializer};
use std::fmt;

/// A rule violation found in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAnomaly {
    /// Setup marker to first media took too long
    LongSetup,
    /// Inter-arrival spread of one media stream is too high
    HighJitter { ssrc: u32 },
    /// At least one loss window exceeded the loss threshold
    SignificantLoss,
}

impl fmt::Display for FlowAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowAnomaly::LongSetup => write!(f, "long setup"),
            FlowAnomaly::HighJitter { ssrc } => write!(f, "high jitter in stream {}", ssrc),
            FlowAnomaly::SignificantLoss => write!(f, "significant packet loss"),
        }
    }
}

impl Serialize for FlowAnomaly {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rule thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    /// Seconds
    pub long_setup: f64,
    /// Seconds of inter-arrival std
    pub high_jitter: f64,
    /// Loss fraction per window
    pub significant_loss: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl RuleThresholds {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            long_setup: config.long_setup_secs,
            high_jitter: config.high_jitter_secs,
            significant_loss: config.significant_loss,
        }
    }
}

/// Apply all rules to one call's metrics
///
/// Order is stable: long setup, then jitter per stream in SSRC order, then
/// loss. Each stream is reported at most once and loss at most once.
pub fn detect_flow_anomalies(metrics: &FlowMetrics, thresholds: &RuleThresholds) -> Vec<FlowAnomaly> {
    let mut anomalies = Vec::new();

    if metrics
        .setup_latency
        .is_some_and(|latency| latency > thresholds.long_setup)
    {
        anomalies.push(FlowAnomaly::LongSetup);
    }

    for (ssrc, stream) in &metrics.media_streams {
        if stream.jitter() > thresholds.high_jitter {
            anomalies.push(FlowAnomaly::HighJitter { ssrc: *ssrc });
        }
    }

    if metrics
        .loss_windows
        .iter()
        .any(|&loss| loss > thresholds.significant_loss)
    {
        anomalies.push(FlowAnomaly::SignificantLoss);
    }

    if !anomalies.is_empty() {
        tracing::debug!(count = anomalies.len(), "flow_anomalies_detected");
    }
    anomalies
}
