//! Anomaly detection
//!
//! Two independent mechanisms:
//! - [`rules`]: fixed thresholds over a call's flow metrics
//! - [`outlier`]: isolation-forest scoring over per-packet features
//!
//! Neither can fail. Insufficient data yields an empty result.

pub mod forest;
pub mod outlier;
pub mod rules;

pub use forest::IsolationForest;
pub use outlier::{OutlierDetector, PacketAnomaly};
pub use rules::{detect_flow_anomalies, FlowAnomaly, RuleThresholds};
