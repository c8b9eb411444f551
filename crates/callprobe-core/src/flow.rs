//! Per-call flow metrics
//!
//! Computes, for one call:
//! - setup/teardown boundaries and latencies
//! - media streams keyed by RTP SSRC, with per-stream jitter
//! - sliding-window packet loss from RTP sequence-number gaps
//! - burst periods over the call's packets
//!
//! ## Loss windows
//!
//! A window holds the most recent `W` media packets. Every position from
//! the `W`-th media packet onward produces one sample:
//!
//! ```text
//! expected = max(seq) - min(seq) + 1
//! loss     = (expected - received) / expected
//! ```
//!
//! Sequence numbers are unwrapped across the 16-bit boundary first, so a
//! window straddling 65535 -> 0 does not look like a massive gap.

use crate::call::Call;
use crate::config::AnalysisConfig;
use crate::packet::{ClassifiedPacket, SignalingMarker};
use crate::stats::{finite_or_zero, mean, population_std};
use crate::traffic::burst::{segment_bursts, Burst};
use std::collections::{BTreeMap, VecDeque};

/// Arrival times of one RTP stream
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStream {
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Arrival times in seconds, in call order
    pub timestamps: Vec<f64>,
}

impl MediaStream {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            timestamps: Vec::new(),
        }
    }

    pub fn packet_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Consecutive arrival deltas (seconds)
    pub fn inter_arrivals(&self) -> Vec<f64> {
        self.timestamps.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Population std of inter-arrival deltas in seconds
    ///
    /// `0.0` for streams with fewer than two packets.
    pub fn jitter(&self) -> f64 {
        if self.timestamps.len() < 2 {
            return 0.0;
        }
        finite_or_zero(population_std(&self.inter_arrivals()))
    }
}

/// Flow metrics of one call
///
/// Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMetrics {
    /// Timestamp of the setup marker (call start)
    pub setup_time: f64,
    /// Timestamp of the teardown marker, if observed
    pub teardown_time: Option<f64>,
    /// Setup marker to first media packet (seconds)
    pub setup_latency: Option<f64>,
    /// Last media packet to teardown marker (seconds)
    pub teardown_latency: Option<f64>,
    pub media_streams: BTreeMap<u32, MediaStream>,
    /// One loss rate in `[0, 1]` per window position
    pub loss_windows: Vec<f64>,
    pub burst_periods: Vec<Burst>,
}

impl FlowMetrics {
    /// Mean of the loss window samples, `0.0` without samples
    pub fn packet_loss_rate(&self) -> f64 {
        finite_or_zero(mean(&self.loss_windows))
    }

    /// Mean per-stream jitter in milliseconds, `0.0` without streams
    pub fn mean_jitter_ms(&self) -> f64 {
        let jitters: Vec<f64> = self.media_streams.values().map(MediaStream::jitter).collect();
        finite_or_zero(mean(&jitters) * 1000.0)
    }

    /// Highest loss window sample
    pub fn peak_loss(&self) -> f64 {
        self.loss_windows.iter().copied().fold(0.0, f64::max)
    }
}

/// Loss rate of one window of media packets
///
/// Packets whose payload is too short to carry a sequence number are
/// skipped. Returns `None` when no packet in the window has one.
///
/// # Example
/// ```
/// use callprobe_core::flow::window_loss_rate;
/// use callprobe_core::packet::{rtp_payload, ClassifiedPacket, Protocol};
///
/// let window: Vec<ClassifiedPacket> = [1u16, 2, 4, 5]
///     .iter()
///     .map(|&seq| ClassifiedPacket::new(0.0, Protocol::Media, rtp_payload(seq, 1, 0)))
///     .collect();
/// let refs: Vec<&ClassifiedPacket> = window.iter().collect();
/// assert!((window_loss_rate(&refs).unwrap() - 0.2).abs() < 1e-12);
/// ```
pub fn window_loss_rate(window: &[&ClassifiedPacket]) -> Option<f64> {
    let mut sequences = window.iter().filter_map(|p| p.sequence_number());
    let first = sequences.next()?;

    let mut previous = first;
    let mut extended = first as i64;
    let (mut lowest, mut highest) = (extended, extended);
    let mut received: i64 = 1;

    for seq in sequences {
        // Half-range rule: forward jumps under 32768 are gaps, larger ones are reordering
        extended += seq.wrapping_sub(previous) as i16 as i64;
        previous = seq;
        lowest = lowest.min(extended);
        highest = highest.max(extended);
        received += 1;
    }

    let expected = highest - lowest + 1;
    if expected <= 0 {
        return Some(0.0);
    }
    let rate = (expected - received) as f64 / expected as f64;
    Some(rate.clamp(0.0, 1.0))
}

/// Computes [`FlowMetrics`] for calls
///
/// # Example
/// ```
/// use callprobe_core::call::Call;
/// use callprobe_core::flow::FlowAnalyzer;
/// use callprobe_core::packet::{rtp_payload, ClassifiedPacket, Protocol};
///
/// let packets: Vec<ClassifiedPacket> = (1..=60u16)
///     .map(|seq| ClassifiedPacket::new(seq as f64 * 0.02, Protocol::Media, rtp_payload(seq, 9, 148)))
///     .collect();
/// let metrics = FlowAnalyzer::new(50).analyze(&Call::spanning("capture", &packets));
/// assert_eq!(metrics.loss_windows.len(), 11);
/// assert!(metrics.loss_windows.iter().all(|&loss| loss == 0.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FlowAnalyzer {
    /// Media packets per loss window
    window_size: usize,
    /// Maximum gap inside a burst (seconds)
    burst_threshold: f64,
    /// Bursts need more members than this
    min_burst_len: usize,
}

impl Default for FlowAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl FlowAnalyzer {
    /// Create an analyzer with the default burst settings
    ///
    /// # Arguments
    /// * `window_size` - Media packets per loss window (clamped to at least 1)
    pub fn new(window_size: usize) -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            window_size: window_size.max(1),
            burst_threshold: defaults.burst_threshold_secs,
            min_burst_len: defaults.min_burst_len,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            window_size: config.loss_window.max(1),
            burst_threshold: config.burst_threshold_secs,
            min_burst_len: config.min_burst_len,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Compute flow metrics for one call
    pub fn analyze(&self, call: &Call) -> FlowMetrics {
        let mut media_streams: BTreeMap<u32, MediaStream> = BTreeMap::new();
        let mut window: VecDeque<&ClassifiedPacket> = VecDeque::with_capacity(self.window_size);
        let mut loss_windows = Vec::new();
        let mut skipped_windows = 0usize;

        for packet in call.media_packets() {
            if let Some(ssrc) = packet.ssrc() {
                media_streams
                    .entry(ssrc)
                    .or_insert_with(|| MediaStream::new(ssrc))
                    .timestamps
                    .push(packet.timestamp);
            }

            window.push_back(packet);
            if window.len() >= self.window_size {
                let slice: Vec<&ClassifiedPacket> = window.iter().copied().collect();
                match window_loss_rate(&slice) {
                    Some(rate) => loss_windows.push(rate),
                    None => skipped_windows += 1,
                }
                window.pop_front();
            }
        }

        if skipped_windows > 0 {
            tracing::debug!(
                call_id = %call.call_id(),
                skipped = skipped_windows,
                "loss_window_skipped"
            );
        }

        let (setup_latency, teardown_latency) = marker_latencies(call.packets());
        let metrics = FlowMetrics {
            setup_time: call.start_time(),
            teardown_time: call.end_time(),
            setup_latency,
            teardown_latency,
            media_streams,
            loss_windows,
            burst_periods: segment_bursts(call.packets(), self.burst_threshold, self.min_burst_len),
        };

        tracing::debug!(
            call_id = %call.call_id(),
            streams = metrics.media_streams.len(),
            windows = metrics.loss_windows.len(),
            loss = metrics.packet_loss_rate(),
            peak_loss = metrics.peak_loss(),
            jitter_ms = %format!("{:.3}", metrics.mean_jitter_ms()),
            "flow_metrics_computed"
        );
        metrics
    }
}

/// Setup marker -> first media, and last media -> teardown marker
fn marker_latencies(packets: &[ClassifiedPacket]) -> (Option<f64>, Option<f64>) {
    let setup = packets
        .iter()
        .find(|p| p.signaling_marker() == Some(SignalingMarker::Setup))
        .map(|p| p.timestamp);
    let teardown = packets
        .iter()
        .rev()
        .find(|p| p.signaling_marker() == Some(SignalingMarker::Teardown))
        .map(|p| p.timestamp);

    let setup_latency = setup.and_then(|start| {
        packets
            .iter()
            .find(|p| p.is_media() && p.timestamp >= start)
            .map(|p| p.timestamp - start)
    });
    let teardown_latency = teardown.and_then(|end| {
        packets
            .iter()
            .rev()
            .find(|p| p.is_media() && p.timestamp <= end)
            .map(|p| end - p.timestamp)
    });

    (setup_latency, teardown_latency)
}
