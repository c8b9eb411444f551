//! Capture analysis pipeline
//!
//! Runs every stage over one capture:
//! 1. Call reconstruction
//! 2. Flow metrics and QoS report per complete call
//! 3. A capture-wide summary report over all packets
//! 4. Traffic behavior and packet outliers over all packets
//! 5. Feature matrix over the per-call reports
//!
//! Calls share no state, and nothing in the pipeline can fail.

use crate::anomaly::{OutlierDetector, PacketAnomaly};
use crate::call::{Call, CallDiagnostic, CallReconstructor};
use crate::config::AnalysisConfig;
use crate::error::{ConfigError, InputError};
use crate::features::FeatureMatrix;
use crate::flow::FlowAnalyzer;
use crate::packet::ClassifiedPacket;
use crate::qos::{QosReport, QosScorer};
use crate::traffic::{TrafficBehavior, TrafficPatternExtractor};
use serde::Serialize;
use std::path::Path;

/// Call id of the capture-wide summary report
pub const CAPTURE_CALL_ID: &str = "capture";

/// Everything derived from one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureAnalysis {
    /// Report over every packet, as if the capture were one call
    ///
    /// Loss windows here slide across call and SSRC boundaries, so
    /// back-to-back calls or a two-way call restart sequence numbers
    /// inside a window and inflate the loss rate. Use `calls` for
    /// per-call loss and MOS.
    pub summary: QosReport,
    /// One report per complete call, in start-time order
    pub calls: Vec<QosReport>,
    /// Calls that never saw a teardown marker
    pub incomplete_calls: Vec<CallDiagnostic>,
    /// Packets seen while no call was current
    pub unassigned_packets: usize,
    pub traffic_behavior: TrafficBehavior,
    pub packet_anomalies: Vec<PacketAnomaly>,
    /// One feature row per entry in `calls`
    pub features: FeatureMatrix,
}

/// Analysis pipeline bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl AnalysisEngine {
    /// Engine bound to `config` as given
    ///
    /// The config is not validated; use [`AnalysisEngine::try_new`] for
    /// settings that did not come from [`AnalysisConfig::from_file`].
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Engine bound to `config` after [`AnalysisConfig::validate`]
    pub fn try_new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Flow metrics and QoS report for one call
    pub fn analyze_call(&self, call: &Call) -> QosReport {
        let metrics = FlowAnalyzer::from_config(&self.config).analyze(call);
        QosScorer::from_config(&self.config).score(call, &metrics)
    }

    /// Analyze a whole capture
    ///
    /// Input order does not matter; packets are time-sorted first.
    pub fn analyze(&self, packets: &[ClassifiedPacket]) -> CaptureAnalysis {
        let reconstruction =
            CallReconstructor::new(self.config.call_association).reconstruct(packets);

        let calls: Vec<QosReport> = reconstruction
            .complete_calls()
            .into_iter()
            .map(|call| self.analyze_call(call))
            .collect();
        let incomplete_calls: Vec<CallDiagnostic> = reconstruction
            .incomplete_calls()
            .into_iter()
            .map(Call::diagnostic)
            .collect();

        let capture = Call::spanning(CAPTURE_CALL_ID, packets);
        let summary = self.analyze_call(&capture);

        let pattern = TrafficPatternExtractor::from_config(&self.config).extract(capture.packets());
        let traffic_behavior = pattern.behavior();
        let packet_anomalies = OutlierDetector::from_config(&self.config).detect(&pattern);

        let features = FeatureMatrix::from_reports(&calls);

        tracing::info!(
            packets = packets.len(),
            calls = calls.len(),
            incomplete = incomplete_calls.len(),
            unassigned = reconstruction.unassigned(),
            outliers = packet_anomalies.len(),
            "Capture analysis complete"
        );

        CaptureAnalysis {
            summary,
            calls,
            incomplete_calls,
            unassigned_packets: reconstruction.unassigned(),
            traffic_behavior,
            packet_anomalies,
            features,
        }
    }
}

/// Analyze a capture with the default configuration
pub fn analyze(packets: &[ClassifiedPacket]) -> CaptureAnalysis {
    AnalysisEngine::default().analyze(packets)
}

/// Parse a JSON array of classified packets
pub fn parse_packets(json: &str) -> Result<Vec<ClassifiedPacket>, InputError> {
    Ok(serde_json::from_str(json)?)
}

/// Read a JSON array of classified packets from disk
pub fn load_packets(path: &Path) -> Result<Vec<ClassifiedPacket>, InputError> {
    let contents = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let packets = parse_packets(&contents)?;
    tracing::info!(path = %path.display(), packets = packets.len(), "Loaded classified packets");
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssociationMode;
    use crate::packet::{rtp_payload, sip_request, Protocol};
    use std::io::Write;

    fn sip(ts: f64, method: &str, call_id: &str) -> ClassifiedPacket {
        ClassifiedPacket::new(ts, Protocol::Signaling, sip_request(method, Some(call_id)))
    }

    fn media(ts: f64, seq: u16, ssrc: u32) -> ClassifiedPacket {
        ClassifiedPacket::new(ts, Protocol::Media, rtp_payload(seq, ssrc, 160))
    }

    fn two_calls() -> Vec<ClassifiedPacket> {
        let mut packets = vec![sip(0.0, "INVITE", "first")];
        packets.extend((0..100u16).map(|i| media(0.1 + i as f64 * 0.02, i, 1)));
        packets.push(sip(2.5, "BYE", "first"));
        packets.push(sip(3.0, "INVITE", "second"));
        packets.extend((0..50u16).map(|i| media(3.2 + i as f64 * 0.02, i, 2)));
        packets.push(sip(5.0, "BYE", "second"));
        // Never torn down
        packets.push(sip(6.0, "INVITE", "dangling"));
        packets.push(media(6.1, 0, 3));
        packets
    }

    #[test]
    fn test_empty_capture() {
        let analysis = analyze(&[]);
        assert!(analysis.calls.is_empty());
        assert!(analysis.incomplete_calls.is_empty());
        assert_eq!(analysis.summary.packet_stats.total, 0);
        assert!(analysis.summary.anomalies.is_empty());
        assert!((1.0..=5.0).contains(&analysis.summary.quality_metrics.mos));
        assert!(analysis.packet_anomalies.is_empty());
        assert!(analysis.features.is_empty());
    }

    #[test]
    fn test_complete_and_incomplete_calls() {
        let analysis = analyze(&two_calls());

        let ids: Vec<&str> = analysis.calls.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(analysis.calls[0].packet_stats.media, 100);
        assert_eq!(analysis.calls[1].packet_stats.media, 50);
        assert_eq!(analysis.incomplete_calls.len(), 1);
        assert_eq!(analysis.incomplete_calls[0].call_id, "dangling");
        assert_eq!(analysis.features.len(), 2);
        assert_eq!(analysis.summary.call_id, CAPTURE_CALL_ID);
        assert_eq!(analysis.summary.packet_stats.total, 156);
    }

    #[test]
    fn test_packets_outside_calls_are_counted() {
        let mut packets = vec![media(0.0, 0, 9), media(0.02, 1, 9)];
        packets.extend(two_calls().into_iter().map(|mut p| {
            p.timestamp += 1.0;
            p
        }));
        let analysis = analyze(&packets);
        // Only the two packets ahead of the first INVITE belong to no call
        assert_eq!(analysis.unassigned_packets, 2);
    }

    #[test]
    fn test_config_drives_stages() {
        let config = AnalysisConfig {
            loss_window: 10,
            call_association: AssociationMode::CorrelationToken,
            ..AnalysisConfig::default()
        };
        let engine = AnalysisEngine::new(config.clone());
        assert_eq!(engine.config(), &config);
        let analysis = engine.analyze(&two_calls());
        assert_eq!(analysis.calls.len(), 2);
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let config = AnalysisConfig {
            contamination: 0.9,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            AnalysisEngine::try_new(config.clone()),
            Err(ConfigError::Invalid(_))
        ));
        // Unchecked constructor keeps the value as given
        assert_eq!(AnalysisEngine::new(config).config().contamination, 0.9);
        assert!(AnalysisEngine::try_new(AnalysisConfig::default()).is_ok());
    }

    #[test]
    fn test_summary_windows_span_calls() {
        let analysis = analyze(&two_calls());
        // Each call alone is loss-free
        assert!(analysis
            .calls
            .iter()
            .all(|r| r.quality_metrics.packet_loss_rate == 0.0));
        // Sequence restarts between calls land inside summary windows
        assert!(analysis.summary.quality_metrics.packet_loss_rate > 0.0);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let packets = two_calls();
        let a = serde_json::to_string(&analyze(&packets)).unwrap();
        let b = serde_json::to_string(&analyze(&packets)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_packets_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&two_calls()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let packets = load_packets(file.path()).unwrap();
        let expected = two_calls();
        assert_eq!(packets.len(), expected.len());
        assert!(packets
            .iter()
            .zip(&expected)
            .all(|(a, b)| a.payload == b.payload && a.protocol == b.protocol && a.size == b.size));
    }

    #[test]
    fn test_load_packets_errors() {
        let missing = load_packets(Path::new("/nonexistent/packets.json"));
        assert!(matches!(missing, Err(InputError::Io { .. })));
        assert!(matches!(parse_packets("{not json"), Err(InputError::Parse(_))));
    }
}
