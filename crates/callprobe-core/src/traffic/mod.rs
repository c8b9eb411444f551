//! Traffic pattern extraction
//!
//! Works over any time-ordered packet sequence, either one call's packets
//! or a whole capture:
//! - Burst segmentation ([`burst`])
//! - Series extraction and per-packet feature rows ([`pattern`])
//! - Protocol, size and timing distributions ([`distribution`])

pub mod burst;
pub mod distribution;
pub mod pattern;

pub use burst::{Burst, BurstPoint, BurstSegmenter};
pub use distribution::{BurstStatistics, ProtocolDistribution, TrafficBehavior};
pub use pattern::{TrafficPattern, TrafficPatternExtractor};
