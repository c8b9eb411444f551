//! Call reconstruction from a classified packet stream
//!
//! Groups packets into logical calls using SIP `INVITE` / `BYE` request
//! lines and `Call-ID` tokens. A call is complete once both its setup and
//! teardown markers have been seen; only complete calls are scored.
//!
//! Two association strategies are supported (see [`AssociationMode`]):
//! the default attributes every packet to the most recently opened call,
//! which is only correct when calls do not interleave. The token-based
//! mode routes signaling by its own `Call-ID` and pins each media SSRC to
//! the call that was current when the stream first appeared.

use crate::config::AssociationMode;
use crate::packet::{ClassifiedPacket, SignalingMarker};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A logical call and the packets attributed to it
///
/// Created on the first setup marker for a token, finalized on teardown.
/// Once finalized a call is never mutated again.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    call_id: String,
    start_time: f64,
    end_time: Option<f64>,
    packets: Vec<ClassifiedPacket>,
}

impl Call {
    fn open(call_id: String, start_time: f64) -> Self {
        Self {
            call_id,
            start_time,
            end_time: None,
            packets: Vec::new(),
        }
    }

    /// Pseudo call covering a whole packet set
    ///
    /// Starts at the earliest timestamp and ends at the latest, so that
    /// capture-wide metrics can reuse the per-call pipeline. An empty
    /// packet set yields a zero-length call.
    pub fn spanning(call_id: impl Into<String>, packets: &[ClassifiedPacket]) -> Self {
        let mut packets = packets.to_vec();
        packets.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let start_time = packets.first().map(|p| p.timestamp).unwrap_or(0.0);
        let end_time = packets.last().map(|p| p.timestamp).unwrap_or(0.0);
        Self {
            call_id: call_id.into(),
            start_time,
            end_time: Some(end_time),
            packets,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Timestamp of the setup marker
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Timestamp of the teardown marker, if observed
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// True when both setup and teardown were observed
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Seconds between setup and teardown, `0.0` while incomplete
    pub fn duration(&self) -> f64 {
        self.end_time
            .map(|end| (end - self.start_time).max(0.0))
            .unwrap_or(0.0)
    }

    /// All packets in time order
    pub fn packets(&self) -> &[ClassifiedPacket] {
        &self.packets
    }

    pub fn signaling_packets(&self) -> impl Iterator<Item = &ClassifiedPacket> {
        self.packets.iter().filter(|p| p.is_signaling())
    }

    pub fn media_packets(&self) -> impl Iterator<Item = &ClassifiedPacket> {
        self.packets.iter().filter(|p| p.is_media())
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn signaling_count(&self) -> usize {
        self.signaling_packets().count()
    }

    pub fn media_count(&self) -> usize {
        self.media_packets().count()
    }

    /// Snapshot for diagnostics output
    pub fn diagnostic(&self) -> CallDiagnostic {
        CallDiagnostic {
            call_id: self.call_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            packet_count: self.packet_count(),
            signaling_count: self.signaling_count(),
            media_count: self.media_count(),
        }
    }
}

/// Summary of a call, used to report calls that never completed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDiagnostic {
    pub call_id: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub packet_count: usize,
    pub signaling_count: usize,
    pub media_count: usize,
}

/// Result of grouping a packet set into calls
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    calls: BTreeMap<String, Call>,
    unassigned: usize,
}

impl Reconstruction {
    /// All calls keyed by correlation token
    pub fn calls(&self) -> &BTreeMap<String, Call> {
        &self.calls
    }

    pub fn get(&self, call_id: &str) -> Option<&Call> {
        self.calls.get(call_id)
    }

    /// Complete calls ordered by start time
    pub fn complete_calls(&self) -> Vec<&Call> {
        self.sorted(true)
    }

    /// Calls that never saw a teardown, ordered by start time
    pub fn incomplete_calls(&self) -> Vec<&Call> {
        self.sorted(false)
    }

    /// Packets that could not be attributed to any open call
    pub fn unassigned(&self) -> usize {
        self.unassigned
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn sorted(&self, complete: bool) -> Vec<&Call> {
        let mut calls: Vec<&Call> = self
            .calls
            .values()
            .filter(|c| c.is_complete() == complete)
            .collect();
        calls.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.call_id.cmp(&b.call_id))
        });
        calls
    }
}

/// Groups classified packets into calls
///
/// # Example
/// ```
/// use callprobe_core::call::CallReconstructor;
/// use callprobe_core::config::AssociationMode;
/// use callprobe_core::packet::{rtp_payload, sip_request, ClassifiedPacket, Protocol};
///
/// let packets = vec![
///     ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("INVITE", Some("c1"))),
///     ClassifiedPacket::new(0.1, Protocol::Media, rtp_payload(1, 7, 160)),
///     ClassifiedPacket::new(0.2, Protocol::Signaling, sip_request("BYE", Some("c1"))),
/// ];
/// let result = CallReconstructor::new(AssociationMode::MostRecent).reconstruct(&packets);
/// let call = result.get("c1").unwrap();
/// assert!(call.is_complete());
/// assert_eq!(call.packet_count(), 3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CallReconstructor {
    mode: AssociationMode,
}

/// Mutable scan state, local to one `reconstruct` call
#[derive(Default)]
struct ScanState {
    calls: BTreeMap<String, Call>,
    current: Option<String>,
    ssrc_pins: HashMap<u32, String>,
    unassigned: usize,
}

impl ScanState {
    fn is_open(&self, call_id: &str) -> bool {
        self.calls.get(call_id).is_some_and(|c| !c.is_complete())
    }
}

impl CallReconstructor {
    pub fn new(mode: AssociationMode) -> Self {
        Self { mode }
    }

    /// Group `packets` into calls
    ///
    /// Packets are stably sorted by timestamp first, so ties keep their
    /// input order. Empty input yields an empty reconstruction.
    pub fn reconstruct(&self, packets: &[ClassifiedPacket]) -> Reconstruction {
        let mut ordered: Vec<&ClassifiedPacket> = packets.iter().collect();
        ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut state = ScanState::default();
        for packet in ordered {
            let marker = packet.signaling_marker();

            if marker == Some(SignalingMarker::Setup) {
                self.open_call(&mut state, packet);
            }

            match self.route(&mut state, packet) {
                Some(call_id) => {
                    if let Some(call) = state.calls.get_mut(&call_id) {
                        call.packets.push(packet.clone());
                    }
                }
                None => {
                    state.unassigned += 1;
                    tracing::trace!(
                        timestamp = packet.timestamp,
                        protocol = %packet.protocol,
                        "packet_unassigned"
                    );
                }
            }

            if marker == Some(SignalingMarker::Teardown) {
                self.finalize_call(&mut state, packet);
            }
        }

        let complete = state.calls.values().filter(|c| c.is_complete()).count();
        tracing::info!(
            packets = packets.len(),
            calls = state.calls.len(),
            complete = complete,
            incomplete = state.calls.len() - complete,
            unassigned = state.unassigned,
            "Call reconstruction finished"
        );

        Reconstruction {
            calls: state.calls,
            unassigned: state.unassigned,
        }
    }

    fn open_call(&self, state: &mut ScanState, packet: &ClassifiedPacket) {
        let token = packet
            .correlation_token()
            .unwrap_or_else(|| packet.synthetic_token());

        match state.calls.get(&token) {
            Some(call) if call.is_complete() => {
                tracing::debug!(call_id = %token, "setup_for_finalized_call_ignored");
            }
            Some(_) => {
                state.current = Some(token);
            }
            None => {
                tracing::debug!(
                    call_id = %token,
                    start = packet.timestamp,
                    "call_opened"
                );
                state
                    .calls
                    .insert(token.clone(), Call::open(token.clone(), packet.timestamp));
                state.current = Some(token);
            }
        }
    }

    /// Pick the open call a packet belongs to
    fn route(&self, state: &mut ScanState, packet: &ClassifiedPacket) -> Option<String> {
        let current = state.current.clone().filter(|id| state.is_open(id));

        let target = match self.mode {
            AssociationMode::MostRecent => current,
            AssociationMode::CorrelationToken if packet.is_signaling() => {
                match packet.correlation_token() {
                    Some(token) => Some(token),
                    None => current,
                }
            }
            AssociationMode::CorrelationToken => match packet.ssrc() {
                Some(ssrc) => match state.ssrc_pins.get(&ssrc) {
                    Some(pinned) => Some(pinned.clone()),
                    None => {
                        if let Some(id) = &current {
                            state.ssrc_pins.insert(ssrc, id.clone());
                        }
                        current
                    }
                },
                None => current,
            },
        };

        target.filter(|id| state.is_open(id))
    }

    fn finalize_call(&self, state: &mut ScanState, packet: &ClassifiedPacket) {
        let token = packet.correlation_token();
        let target = match (self.mode, token) {
            (_, None) => state.current.clone(),
            (AssociationMode::MostRecent, Some(token)) => {
                state.current.clone().filter(|current| *current == token)
            }
            (AssociationMode::CorrelationToken, Some(token)) => Some(token),
        };

        let Some(call_id) = target else {
            tracing::debug!(timestamp = packet.timestamp, "teardown_without_matching_call");
            return;
        };

        if let Some(call) = state.calls.get_mut(&call_id) {
            if call.end_time.is_none() {
                call.end_time = Some(packet.timestamp);
                tracing::debug!(
                    call_id = %call_id,
                    end = packet.timestamp,
                    packets = call.packets.len(),
                    "call_finalized"
                );
            }
        }

        if state.current.as_deref() == Some(call_id.as_str()) {
            state.current = None;
        }
    }
}
