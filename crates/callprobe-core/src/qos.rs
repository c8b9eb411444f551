//! QoS scoring
//!
//! Combines a call's packet counts with its [`FlowMetrics`] into a
//! [`QosReport`], including an E-model MOS estimate.
//!
//! ## MOS
//!
//! ```text
//! R   = 93.2 - 0.024*L - 0.11*J - 30*ln(1 + 15*P)
//! MOS = 1 + 0.035*R + R*(R - 60)*(100 - R)*7e-6
//! ```
//!
//! `L` is one-way latency (ms), `J` jitter (ms) and `P` the loss fraction.
//! Latency is not measured yet, so reports pass `L = 0`.

use crate::anomaly::rules::{detect_flow_anomalies, RuleThresholds};
use crate::call::Call;
use crate::config::AnalysisConfig;
use crate::flow::FlowMetrics;
use crate::stats::finite_or_zero;
use serde::Serialize;

/// Lowest MOS on the ACR scale
pub const MOS_MIN: f64 = 1.0;

/// Highest MOS on the ACR scale
pub const MOS_MAX: f64 = 5.0;

/// E-model base rating with no impairments
const R_BASE: f64 = 93.2;

/// Estimate MOS from latency, jitter and loss
///
/// Inputs are sanitized first: negative or NaN latency and jitter count as 0,
/// loss is clamped to `[0, 1]`. The rating is clamped to `[0, 100]` before
/// the cubic so that extreme impairments bottom out at 1 instead of wrapping
/// around, and the result always lies in `[1, 5]`.
///
/// # Example
/// ```
/// use callprobe_core::qos::calculate_mos;
///
/// let perfect = calculate_mos(0.0, 0.0, 0.0);
/// assert!((perfect - 4.409).abs() < 1e-3);
/// assert_eq!(calculate_mos(1.0e6, 0.0, 0.0), 1.0);
/// ```
pub fn calculate_mos(latency_ms: f64, jitter_ms: f64, loss: f64) -> f64 {
    let latency = non_negative(latency_ms);
    let jitter = non_negative(jitter_ms);
    let loss = if loss.is_nan() { 0.0 } else { loss.clamp(0.0, 1.0) };

    let r = R_BASE - 0.024 * latency - 0.11 * jitter - 30.0 * (1.0 + 15.0 * loss).ln();
    let r = if r.is_nan() { 0.0 } else { r.clamp(0.0, 100.0) };

    let mos = 1.0 + 0.035 * r + r * (r - 60.0) * (100.0 - r) * 7e-6;
    if mos.is_nan() {
        MOS_MIN
    } else {
        mos.clamp(MOS_MIN, MOS_MAX)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

/// Packet counts of one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacketStats {
    pub total: usize,
    pub signaling: usize,
    pub media: usize,
}

/// Quality figures of one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// Mean per-stream jitter (ms)
    pub jitter: f64,
    /// Mean of the loss window samples
    pub packet_loss_rate: f64,
    /// Setup marker to first media (seconds), 0 when unknown
    pub setup_time: f64,
    pub mos: f64,
    pub rtp_stream_count: usize,
}

/// Terminal per-call report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QosReport {
    pub call_id: String,
    /// Seconds
    pub call_duration: f64,
    pub packet_stats: PacketStats,
    pub quality_metrics: QualityMetrics,
    /// Rule-based anomaly descriptions
    pub anomalies: Vec<String>,
}

/// Builds [`QosReport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct QosScorer {
    thresholds: RuleThresholds,
}

impl QosScorer {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(RuleThresholds::from_config(config))
    }

    /// Score one call
    ///
    /// Never fails: a sub-metric that cannot be computed falls back to 0.
    pub fn score(&self, call: &Call, metrics: &FlowMetrics) -> QosReport {
        let jitter = metrics.mean_jitter_ms();
        let packet_loss_rate = metrics.packet_loss_rate();
        let mos = calculate_mos(0.0, jitter, packet_loss_rate);

        let anomalies: Vec<String> = detect_flow_anomalies(metrics, &self.thresholds)
            .iter()
            .map(ToString::to_string)
            .collect();

        let report = QosReport {
            call_id: call.call_id().to_string(),
            call_duration: finite_or_zero(call.duration()),
            packet_stats: PacketStats {
                total: call.packet_count(),
                signaling: call.signaling_count(),
                media: call.media_count(),
            },
            quality_metrics: QualityMetrics {
                jitter,
                packet_loss_rate,
                setup_time: finite_or_zero(metrics.setup_latency.unwrap_or(0.0)),
                mos,
                rtp_stream_count: metrics.media_streams.len(),
            },
            anomalies,
        };

        tracing::debug!(
            call_id = %report.call_id,
            mos = %format!("{:.2}", report.quality_metrics.mos),
            anomalies = report.anomalies.len(),
            "qos_scored"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowAnalyzer;
    use crate::packet::{rtp_payload, sip_request, ClassifiedPacket, Protocol};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_unimpaired_mos() {
        // R = 93.2: 1 + 3.262 + 93.2 * 33.2 * 6.8 * 7e-6
        assert_abs_diff_eq!(calculate_mos(0.0, 0.0, 0.0), 4.40929, epsilon = 1e-4);
    }

    #[test]
    fn test_mos_decreases_with_impairment() {
        let clean = calculate_mos(0.0, 0.0, 0.0);
        let jittery = calculate_mos(0.0, 40.0, 0.0);
        let lossy = calculate_mos(0.0, 0.0, 0.1);
        assert!(jittery < clean);
        assert!(lossy < clean);
        assert!(calculate_mos(0.0, 40.0, 0.1) < jittery.min(lossy));
    }

    #[test]
    fn test_mos_clamped_for_extremes() {
        assert_eq!(calculate_mos(1e9, 0.0, 0.0), MOS_MIN);
        assert_eq!(calculate_mos(0.0, f64::INFINITY, 0.0), MOS_MIN);
        let negative = calculate_mos(-500.0, -500.0, -1.0);
        assert_abs_diff_eq!(negative, calculate_mos(0.0, 0.0, 0.0));
        for value in [f64::NAN, f64::NEG_INFINITY, 1e300] {
            let mos = calculate_mos(value, value, value);
            assert!((MOS_MIN..=MOS_MAX).contains(&mos));
        }
    }

    fn steady_call() -> Call {
        let mut packets = vec![ClassifiedPacket::new(
            0.0,
            Protocol::Signaling,
            sip_request("INVITE", Some("steady")),
        )];
        for i in 0..600u16 {
            // 10ms spacing with a small alternating wobble
            let wobble = if i % 2 == 0 { 0.001 } else { -0.001 };
            let ts = 0.005 + i as f64 * 0.00998 + wobble;
            packets.push(ClassifiedPacket::new(ts, Protocol::Media, rtp_payload(i, 77, 160)));
        }
        packets.push(ClassifiedPacket::new(
            6.0,
            Protocol::Signaling,
            sip_request("BYE", Some("steady")),
        ));
        Call::spanning("steady", &packets)
    }

    #[test]
    fn test_steady_call_scores_well() {
        let call = steady_call();
        let metrics = FlowAnalyzer::default().analyze(&call);
        let report = QosScorer::default().score(&call, &metrics);

        assert_eq!(report.call_id, "steady");
        assert_eq!(report.packet_stats.total, 602);
        assert_eq!(report.packet_stats.signaling, 2);
        assert_eq!(report.packet_stats.media, 600);
        assert_eq!(report.quality_metrics.rtp_stream_count, 1);
        assert_eq!(report.quality_metrics.packet_loss_rate, 0.0);
        assert!(report.quality_metrics.jitter <= 5.0);
        assert!(report.quality_metrics.mos > 4.0);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_loss_is_reported() {
        let mut packets = Vec::new();
        for i in 0..100u16 {
            // Every fifth packet missing
            if i % 5 != 4 {
                packets.push(ClassifiedPacket::new(
                    i as f64 * 0.02,
                    Protocol::Media,
                    rtp_payload(i, 5, 160),
                ));
            }
        }
        let call = Call::spanning("lossy", &packets);
        let metrics = FlowAnalyzer::default().analyze(&call);
        let report = QosScorer::default().score(&call, &metrics);

        assert!(report.quality_metrics.packet_loss_rate > 0.15);
        assert!(report.anomalies.contains(&"significant packet loss".to_string()));
        assert!(report.quality_metrics.mos < calculate_mos(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_call_report() {
        let call = Call::spanning("capture", &[]);
        let metrics = FlowAnalyzer::default().analyze(&call);
        let report = QosScorer::default().score(&call, &metrics);

        assert_eq!(report.call_duration, 0.0);
        assert_eq!(report.packet_stats, PacketStats::default());
        assert!(report.anomalies.is_empty());
        assert_abs_diff_eq!(report.quality_metrics.mos, 4.40929, epsilon = 1e-4);
    }
}
