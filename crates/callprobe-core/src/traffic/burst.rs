//! Burst segmentation over packet arrival times
//!
//! A burst is a run of packets whose inter-arrival gaps all stay at or
//! below a threshold (50ms by default). Runs with too few members are
//! treated as ordinary traffic and dropped.

use crate::packet::ClassifiedPacket;
use serde::Serialize;

/// Default maximum gap between burst members (50ms)
pub const DEFAULT_BURST_THRESHOLD_SECS: f64 = 0.05;

/// Default minimum size; a burst must have more members than this
pub const DEFAULT_MIN_BURST_LEN: usize = 5;

/// One packet inside a burst
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BurstPoint {
    /// Arrival time in seconds
    pub time: f64,
    /// Packet size in bytes
    pub size: usize,
}

/// A finished burst (never empty)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Burst {
    points: Vec<BurstPoint>,
}

impl Burst {
    pub fn points(&self) -> &[BurstPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.points.first().map(|p| p.time).unwrap_or(0.0)
    }

    pub fn end(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }

    /// Last-minus-first arrival time
    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}

/// Incremental burst segmenter
///
/// Feed arrivals in time order with [`Self::push`], then call
/// [`Self::finish`] to flush the run in progress.
///
/// # Example
/// ```
/// use callprobe_core::traffic::burst::BurstSegmenter;
///
/// let mut segmenter = BurstSegmenter::new(0.05, 5);
/// for i in 0..8 {
///     segmenter.push(i as f64 * 0.01, 160);
/// }
/// segmenter.push(5.0, 160); // isolated packet
/// let bursts = segmenter.finish();
/// assert_eq!(bursts.len(), 1);
/// assert_eq!(bursts[0].len(), 8);
/// ```
#[derive(Debug)]
pub struct BurstSegmenter {
    /// Maximum inter-arrival gap inside a burst (seconds)
    threshold: f64,
    /// Runs must be strictly longer than this to count
    min_len: usize,
    /// Run in progress
    current: Vec<BurstPoint>,
    /// Arrival time of the previous packet
    last_time: Option<f64>,
    /// Completed bursts
    finished: Vec<Burst>,
}

impl BurstSegmenter {
    /// Create a segmenter
    ///
    /// # Arguments
    /// * `threshold` - Maximum gap in seconds between consecutive members
    /// * `min_len` - A run is recorded only if it has more than this many members
    pub fn new(threshold: f64, min_len: usize) -> Self {
        Self {
            threshold,
            min_len,
            current: Vec::new(),
            last_time: None,
            finished: Vec::new(),
        }
    }

    /// Add the next arrival
    pub fn push(&mut self, time: f64, size: usize) {
        let point = BurstPoint { time, size };
        match self.last_time {
            Some(last) if time - last <= self.threshold => {
                self.current.push(point);
            }
            _ => {
                self.close_current();
                self.current.push(point);
            }
        }
        self.last_time = Some(time);
    }

    /// Flush the run in progress and return all recorded bursts
    pub fn finish(mut self) -> Vec<Burst> {
        self.close_current();
        self.finished
    }

    fn close_current(&mut self) {
        let run = std::mem::take(&mut self.current);
        if run.len() > self.min_len {
            tracing::trace!(
                members = run.len(),
                start = run[0].time,
                "burst_recorded"
            );
            self.finished.push(Burst { points: run });
        }
    }
}

/// Segment a time-ordered packet sequence into bursts
pub fn segment_bursts(packets: &[ClassifiedPacket], threshold: f64, min_len: usize) -> Vec<Burst> {
    let mut segmenter = BurstSegmenter::new(threshold, min_len);
    for packet in packets {
        segmenter.push(packet.timestamp, packet.size);
    }
    segmenter.finish()
}
