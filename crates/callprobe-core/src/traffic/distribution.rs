//! Traffic behavior summaries
//!
//! Turns a [`TrafficPattern`] into burst statistics, protocol counts and
//! transitions, and size/timing distributions. All maps are ordered so the
//! same input always serializes identically.

use super::burst::Burst;
use super::pattern::TrafficPattern;
use crate::packet::Protocol;
use crate::stats::{finite_or_zero, mean, Distribution};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate statistics over recorded bursts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstStatistics {
    /// Number of bursts
    pub count: usize,
    /// Mean last-minus-first time within a burst (seconds)
    pub avg_duration: f64,
    /// Mean member count per burst
    pub avg_size: f64,
    /// Mean packet size across all burst members (bytes)
    pub avg_packet_size: f64,
}

impl BurstStatistics {
    /// Summarize bursts, `None` when there are none
    pub fn from_bursts(bursts: &[Burst]) -> Option<Self> {
        if bursts.is_empty() {
            return None;
        }
        let durations: Vec<f64> = bursts.iter().map(Burst::duration).collect();
        let sizes: Vec<f64> = bursts.iter().map(|b| b.len() as f64).collect();
        let packet_sizes: Vec<f64> = bursts
            .iter()
            .flat_map(|b| b.points().iter().map(|p| p.size as f64))
            .collect();

        Some(Self {
            count: bursts.len(),
            avg_duration: finite_or_zero(mean(&durations)),
            avg_size: finite_or_zero(mean(&sizes)),
            avg_packet_size: finite_or_zero(mean(&packet_sizes)),
        })
    }
}

/// Protocol counts and adjacent-pair transitions
///
/// Transition keys join the two tags with `->`, e.g. `SIGNALING->MEDIA`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProtocolDistribution {
    pub protocol_counts: BTreeMap<String, usize>,
    pub protocol_transitions: BTreeMap<String, usize>,
}

impl ProtocolDistribution {
    pub fn from_sequence(sequence: &[Protocol]) -> Self {
        let mut distribution = Self::default();
        for (i, protocol) in sequence.iter().enumerate() {
            *distribution
                .protocol_counts
                .entry(protocol.as_str().to_string())
                .or_insert(0) += 1;
            if i > 0 {
                let key = transition_key(sequence[i - 1], *protocol);
                *distribution.protocol_transitions.entry(key).or_insert(0) += 1;
            }
        }
        distribution
    }

    /// Count of one protocol tag
    pub fn count(&self, protocol: Protocol) -> usize {
        self.protocol_counts
            .get(protocol.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Count of one ordered transition
    pub fn transitions(&self, from: Protocol, to: Protocol) -> usize {
        self.protocol_transitions
            .get(&transition_key(from, to))
            .copied()
            .unwrap_or(0)
    }
}

fn transition_key(from: Protocol, to: Protocol) -> String {
    format!("{}->{}", from.as_str(), to.as_str())
}

/// Traffic behavior summary of one packet sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficBehavior {
    /// `None` when no burst was recorded
    pub burst_statistics: Option<BurstStatistics>,
    pub protocol_distribution: ProtocolDistribution,
    /// Packet sizes in bytes, `None` for an empty sequence
    pub size_distribution: Option<Distribution>,
    /// Inter-arrival times in seconds; `std` is the timing jitter
    pub timing_distribution: Option<Distribution>,
}

impl TrafficBehavior {
    pub fn from_pattern(pattern: &TrafficPattern) -> Self {
        let sizes: Vec<f64> = pattern.packet_sizes.iter().map(|&s| s as f64).collect();
        Self {
            burst_statistics: BurstStatistics::from_bursts(&pattern.burst_patterns),
            protocol_distribution: ProtocolDistribution::from_sequence(&pattern.protocol_sequence),
            size_distribution: Distribution::from_samples(&sizes),
            timing_distribution: Distribution::from_samples(&pattern.inter_arrival_times),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ClassifiedPacket;
    use crate::traffic::pattern::TrafficPatternExtractor;
    use approx::assert_abs_diff_eq;

    fn packet(ts: f64, size: usize, protocol: Protocol) -> ClassifiedPacket {
        ClassifiedPacket::with_size(ts, size, protocol, Vec::new())
    }

    #[test]
    fn test_protocol_transitions() {
        use Protocol::*;
        let distribution =
            ProtocolDistribution::from_sequence(&[Signaling, Media, Media, Signaling, Media]);
        assert_eq!(distribution.count(Signaling), 2);
        assert_eq!(distribution.count(Media), 3);
        assert_eq!(distribution.transitions(Signaling, Media), 2);
        assert_eq!(distribution.transitions(Media, Media), 1);
        assert_eq!(distribution.transitions(Media, Signaling), 1);
        assert_eq!(distribution.transitions(Signaling, Signaling), 0);
        assert!(distribution
            .protocol_transitions
            .contains_key("SIGNALING->MEDIA"));
    }

    #[test]
    fn test_empty_behavior() {
        let behavior = TrafficBehavior::from_pattern(&TrafficPattern::default());
        assert!(behavior.burst_statistics.is_none());
        assert!(behavior.size_distribution.is_none());
        assert!(behavior.timing_distribution.is_none());
        assert!(behavior.protocol_distribution.protocol_counts.is_empty());
    }

    #[test]
    fn test_burst_statistics() {
        // Burst A: 6 packets 10ms apart (50ms long), burst B: 8 packets (70ms long)
        let mut packets: Vec<ClassifiedPacket> = (0..6)
            .map(|i| packet(i as f64 * 0.01, 100, Protocol::Media))
            .collect();
        packets.extend((0..8).map(|i| packet(2.0 + i as f64 * 0.01, 200, Protocol::Media)));

        let pattern = TrafficPatternExtractor::default().extract(&packets);
        let stats = pattern.behavior().burst_statistics.unwrap();

        assert_eq!(stats.count, 2);
        assert_abs_diff_eq!(stats.avg_duration, 0.06, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.avg_size, 7.0);
        assert_abs_diff_eq!(stats.avg_packet_size, (600.0 + 1600.0) / 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_size_and_timing_distributions() {
        let packets = vec![
            packet(0.0, 100, Protocol::Signaling),
            packet(0.1, 200, Protocol::Media),
            packet(0.3, 300, Protocol::Media),
            packet(0.6, 400, Protocol::Media),
        ];
        let behavior = TrafficPatternExtractor::default()
            .extract(&packets)
            .behavior();

        let sizes = behavior.size_distribution.unwrap();
        assert_abs_diff_eq!(sizes.mean, 250.0);
        assert_abs_diff_eq!(sizes.p25, 175.0);
        assert_abs_diff_eq!(sizes.p50, 250.0);
        assert_abs_diff_eq!(sizes.p75, 325.0);

        let timing = behavior.timing_distribution.unwrap();
        assert_abs_diff_eq!(timing.mean, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(timing.p50, 0.2, epsilon = 1e-9);
        assert!(timing.p25 <= timing.p50 && timing.p50 <= timing.p75);
    }
}
