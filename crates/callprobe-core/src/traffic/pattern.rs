//! Single-pass series extraction over a packet sequence

use super::burst::{Burst, BurstSegmenter};
use super::distribution::TrafficBehavior;
use crate::config::AnalysisConfig;
use crate::packet::{ClassifiedPacket, Protocol};
use serde::Serialize;

/// Raw series extracted from a packet sequence
///
/// `inter_arrival_times` has one element fewer than the other series
/// (none for an empty or single-packet sequence).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficPattern {
    pub time_series: Vec<f64>,
    pub packet_sizes: Vec<usize>,
    pub inter_arrival_times: Vec<f64>,
    pub protocol_sequence: Vec<Protocol>,
    pub burst_patterns: Vec<Burst>,
}

impl TrafficPattern {
    pub fn len(&self) -> usize {
        self.time_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_series.is_empty()
    }

    /// Summarize bursts, protocol mix, sizes and timing
    pub fn behavior(&self) -> TrafficBehavior {
        TrafficBehavior::from_pattern(self)
    }
}

/// Extracts [`TrafficPattern`]s
///
/// Stateless between calls: extracting the same input twice yields
/// identical output.
#[derive(Debug, Clone, Copy)]
pub struct TrafficPatternExtractor {
    burst_threshold: f64,
    min_burst_len: usize,
}

impl Default for TrafficPatternExtractor {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl TrafficPatternExtractor {
    /// Create an extractor
    ///
    /// # Arguments
    /// * `burst_threshold` - Maximum gap (seconds) between burst members
    /// * `min_burst_len` - Bursts need more members than this
    pub fn new(burst_threshold: f64, min_burst_len: usize) -> Self {
        Self {
            burst_threshold,
            min_burst_len,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.burst_threshold_secs, config.min_burst_len)
    }

    /// Extract series from a time-ordered packet sequence
    pub fn extract(&self, packets: &[ClassifiedPacket]) -> TrafficPattern {
        let mut pattern = TrafficPattern {
            time_series: Vec::with_capacity(packets.len()),
            packet_sizes: Vec::with_capacity(packets.len()),
            inter_arrival_times: Vec::with_capacity(packets.len().saturating_sub(1)),
            protocol_sequence: Vec::with_capacity(packets.len()),
            burst_patterns: Vec::new(),
        };
        let mut segmenter = BurstSegmenter::new(self.burst_threshold, self.min_burst_len);
        let mut last_time: Option<f64> = None;

        for packet in packets {
            pattern.time_series.push(packet.timestamp);
            pattern.packet_sizes.push(packet.size);
            pattern.protocol_sequence.push(packet.protocol);

            if let Some(last) = last_time {
                pattern.inter_arrival_times.push(packet.timestamp - last);
            }
            segmenter.push(packet.timestamp, packet.size);
            last_time = Some(packet.timestamp);
        }

        pattern.burst_patterns = segmenter.finish();

        tracing::debug!(
            packets = pattern.len(),
            bursts = pattern.burst_patterns.len(),
            "traffic_pattern_extracted"
        );
        pattern
    }
}
