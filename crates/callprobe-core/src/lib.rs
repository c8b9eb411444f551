//! Callprobe Core - VoIP call-flow and traffic analysis engine
//!
//! Consumes packets already classified as signaling (SIP) or media (RTP)
//! and produces:
//! - calls reconstructed from setup/teardown markers
//! - per-call flow metrics (jitter, windowed loss, bursts)
//! - QoS reports with an E-model MOS estimate
//! - traffic behavior summaries and statistical packet outliers
//! - per-call feature vectors for quality models
//!
//! The analysis path is synchronous and never fails; only configuration
//! and packet loading return errors.

pub mod anomaly;
pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod flow;
pub mod packet;
pub mod qos;
pub mod stats;
pub mod traffic;

pub use anomaly::{FlowAnomaly, OutlierDetector, PacketAnomaly};
pub use call::{Call, CallDiagnostic, CallReconstructor, Reconstruction};
pub use config::{AnalysisConfig, AssociationMode};
pub use engine::{analyze, load_packets, parse_packets, AnalysisEngine, CaptureAnalysis};
pub use error::{ConfigError, InputError};
pub use features::{CallFeatures, FeatureMatrix, QualityLabel, QualityModel};
pub use flow::{FlowAnalyzer, FlowMetrics, MediaStream};
pub use packet::{ClassifiedPacket, Protocol, SignalingMarker};
pub use qos::{calculate_mos, QosReport, QosScorer};
pub use traffic::{TrafficBehavior, TrafficPattern, TrafficPatternExtractor};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
