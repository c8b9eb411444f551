//! Callprobe - VoIP call-flow and traffic analysis
//!
//! This library re-exports the analysis engine from `callprobe-core`.
//! The `callprobe` binary is a thin command-line driver over it.

pub use callprobe_core::{anomaly, call, config, engine, error, features, flow, packet, qos, stats, traffic};

pub use callprobe_core::{analyze, load_packets, parse_packets, AnalysisConfig, AnalysisEngine};
pub use callprobe_core::{CaptureAnalysis, ClassifiedPacket, Protocol, QosReport, VERSION};

/// Date the binary was built (UTC, `YYYY-MM-DD`)
pub const BUILD_DATE: &str = env!("BUILD_DATE");
