//! Classified packet input contract
//!
//! Packets arrive already tagged as signaling or media by an upstream
//! classifier. This module only reads the handful of fields the analysis
//! needs out of the payload:
//! - SIP request line (call setup / teardown markers)
//! - SIP `Call-ID` header (correlation token)
//! - RTP sequence number and SSRC
//!
//! Every reader returns `Option` so that short or malformed payloads are
//! skipped by the caller instead of aborting a batch.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Offset of the 16-bit RTP sequence number
const SEQUENCE_OFFSET: usize = 2;

/// Offset of the 32-bit RTP synchronization source
const SSRC_OFFSET: usize = 8;

/// Protocol tag assigned by the upstream classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    /// Control plane (SIP)
    Signaling,
    /// Data plane (RTP)
    Media,
}

impl Protocol {
    /// Upper-case tag used in distribution keys and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Signaling => "SIGNALING",
            Protocol::Media => "MEDIA",
        }
    }

    /// Feature-space indicator: 1 for media, 0 otherwise
    pub fn indicator(&self) -> f64 {
        match self {
            Protocol::Media => 1.0,
            Protocol::Signaling => 0.0,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call lifecycle marker carried in a SIP request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingMarker {
    /// `INVITE` request
    Setup,
    /// `BYE` request
    Teardown,
}

/// A packet tagged by the upstream classifier
///
/// Immutable input to every analysis stage.
///
/// # Example
/// ```
/// use callprobe_core::packet::{ClassifiedPacket, Protocol, SignalingMarker};
///
/// let invite = ClassifiedPacket::new(
///     0.0,
///     Protocol::Signaling,
///     b"INVITE sip:bob@example.com SIP/2.0\r\nCall-ID: abc@host\r\n\r\n".to_vec(),
/// );
/// assert_eq!(invite.signaling_marker(), Some(SignalingMarker::Setup));
/// assert_eq!(invite.correlation_token().as_deref(), Some("abc@host"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPacket {
    /// Capture timestamp in seconds
    pub timestamp: f64,
    /// Wire length in bytes
    pub size: usize,
    /// Classifier tag
    pub protocol: Protocol,
    /// Application payload (SIP text or RTP header + data)
    #[serde(deserialize_with = "deserialize_payload", default)]
    pub payload: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadRepr {
    Text(String),
    Bytes(Vec<u8>),
}

fn deserialize_payload<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PayloadRepr::deserialize(deserializer)? {
        PayloadRepr::Text(text) => text.into_bytes(),
        PayloadRepr::Bytes(bytes) => bytes,
    })
}

impl ClassifiedPacket {
    /// Create a packet whose wire size equals its payload length
    pub fn new(timestamp: f64, protocol: Protocol, payload: Vec<u8>) -> Self {
        Self {
            timestamp,
            size: payload.len(),
            protocol,
            payload,
        }
    }

    /// Create a packet with an explicit wire size
    pub fn with_size(timestamp: f64, size: usize, protocol: Protocol, payload: Vec<u8>) -> Self {
        Self {
            timestamp,
            size,
            protocol,
            payload,
        }
    }

    pub fn is_signaling(&self) -> bool {
        self.protocol == Protocol::Signaling
    }

    pub fn is_media(&self) -> bool {
        self.protocol == Protocol::Media
    }

    /// RTP sequence number (bytes 2..4, big-endian)
    ///
    /// Returns `None` when the payload is shorter than 4 bytes.
    pub fn sequence_number(&self) -> Option<u16> {
        let bytes = self.payload.get(SEQUENCE_OFFSET..SEQUENCE_OFFSET + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// RTP synchronization source (bytes 8..12, big-endian)
    ///
    /// Returns `None` when the payload is shorter than 12 bytes.
    pub fn ssrc(&self) -> Option<u32> {
        let bytes = self.payload.get(SSRC_OFFSET..SSRC_OFFSET + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Call lifecycle marker from the SIP request line
    ///
    /// Only the request line is inspected, so a `200 OK` whose CSeq names
    /// `INVITE` is not mistaken for a new call.
    pub fn signaling_marker(&self) -> Option<SignalingMarker> {
        if !self.is_signaling() {
            return None;
        }
        let line = self.lines().find(|l| !l.trim().is_empty())?;
        let method = line.trim_start().split(' ').next()?;
        match method {
            "INVITE" => Some(SignalingMarker::Setup),
            "BYE" => Some(SignalingMarker::Teardown),
            _ => None,
        }
    }

    /// Value of the `Call-ID` header (or its compact form `i`)
    pub fn correlation_token(&self) -> Option<String> {
        if !self.is_signaling() {
            return None;
        }
        self.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.eq_ignore_ascii_case("call-id") || name.eq_ignore_ascii_case("i") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
    }

    /// Content-derived token for signaling that carries no `Call-ID`
    pub fn synthetic_token(&self) -> String {
        format!("synthetic-{:x}", md5::compute(&self.payload))
    }

    /// Lossy text lines of the payload
    fn lines(&self) -> impl Iterator<Item = &str> {
        // SIP headers are ASCII; stop at the first non-UTF-8 byte
        let text = match std::str::from_utf8(&self.payload) {
            Ok(text) => text,
            Err(e) => std::str::from_utf8(&self.payload[..e.valid_up_to()]).unwrap_or_default(),
        };
        text.lines()
    }
}

/// Build a minimal 12-byte RTP header followed by `extra` payload bytes
///
/// Synthesis helper for building captures in code, e.g. replaying a call
/// layout or generating load. Version 2, payload type 0 (PCMU), RTP
/// timestamp advancing 160 samples per sequence step.
pub fn rtp_payload(sequence: u16, ssrc: u32, extra: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(12 + extra);
    payload.push(0x80); // version 2
    payload.push(0x00); // PCMU
    payload.extend_from_slice(&sequence.to_be_bytes());
    payload.extend_from_slice(&(sequence as u32 * 160).to_be_bytes());
    payload.extend_from_slice(&ssrc.to_be_bytes());
    payload.resize(12 + extra, 0xFF);
    payload
}

/// Build a SIP request with the given method and optional `Call-ID`
///
/// Synthesis counterpart of [`rtp_payload`]: the request line, a `Via`,
/// the `Call-ID` when given and a matching `CSeq`.
pub fn sip_request(method: &str, call_id: Option<&str>) -> Vec<u8> {
    let mut text = format!("{} sip:bob@example.com SIP/2.0\r\n", method);
    text.push_str("Via: SIP/2.0/UDP 10.0.0.1:5060\r\n");
    if let Some(id) = call_id {
        text.push_str(&format!("Call-ID: {}\r\n", id));
    }
    text.push_str("CSeq: 1 ");
    text.push_str(method);
    text.push_str("\r\n\r\n");
    text.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_ssrc() {
        let pkt = ClassifiedPacket::new(0.0, Protocol::Media, rtp_payload(513, 0xDEADBEEF, 160));
        assert_eq!(pkt.sequence_number(), Some(513));
        assert_eq!(pkt.ssrc(), Some(0xDEADBEEF));
        assert_eq!(pkt.size, 172);
    }

    #[test]
    fn test_short_payloads_are_skipped() {
        let pkt = ClassifiedPacket::new(0.0, Protocol::Media, vec![0x80, 0x00, 0x01]);
        assert_eq!(pkt.sequence_number(), None);
        assert_eq!(pkt.ssrc(), None);

        let pkt = ClassifiedPacket::new(0.0, Protocol::Media, vec![0x80, 0x00, 0x00, 0x07]);
        assert_eq!(pkt.sequence_number(), Some(7));
        assert_eq!(pkt.ssrc(), None);
    }

    #[test]
    fn test_request_line_markers() {
        let invite = ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("INVITE", None));
        let bye = ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("BYE", None));
        let ack = ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("ACK", None));
        assert_eq!(invite.signaling_marker(), Some(SignalingMarker::Setup));
        assert_eq!(bye.signaling_marker(), Some(SignalingMarker::Teardown));
        assert_eq!(ack.signaling_marker(), None);
    }

    #[test]
    fn test_response_is_not_a_marker() {
        let ok = ClassifiedPacket::new(
            0.0,
            Protocol::Signaling,
            b"SIP/2.0 200 OK\r\nCall-ID: x\r\nCSeq: 1 INVITE\r\n\r\n".to_vec(),
        );
        assert_eq!(ok.signaling_marker(), None);
        assert_eq!(ok.correlation_token().as_deref(), Some("x"));
    }

    #[test]
    fn test_media_never_carries_markers() {
        let pkt = ClassifiedPacket::new(0.0, Protocol::Media, b"INVITE sip:x SIP/2.0".to_vec());
        assert_eq!(pkt.signaling_marker(), None);
    }

    #[test]
    fn test_compact_call_id() {
        let pkt = ClassifiedPacket::new(
            0.0,
            Protocol::Signaling,
            b"BYE sip:a SIP/2.0\r\ni:  compact-42 \r\n\r\n".to_vec(),
        );
        assert_eq!(pkt.correlation_token().as_deref(), Some("compact-42"));
    }

    #[test]
    fn test_call_id_header_is_case_insensitive() {
        let pkt = ClassifiedPacket::new(
            0.0,
            Protocol::Signaling,
            b"INVITE sip:a SIP/2.0\r\ncall-id: lower-7\r\n\r\n".to_vec(),
        );
        assert_eq!(pkt.correlation_token().as_deref(), Some("lower-7"));

        let upper = ClassifiedPacket::new(
            0.0,
            Protocol::Signaling,
            b"INVITE sip:a SIP/2.0\r\nCALL-ID: upper-7\r\n\r\n".to_vec(),
        );
        assert_eq!(upper.correlation_token().as_deref(), Some("upper-7"));
    }

    #[test]
    fn test_synthetic_token_is_content_derived() {
        let a = ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("INVITE", None));
        let b = ClassifiedPacket::new(9.0, Protocol::Signaling, sip_request("INVITE", None));
        let c = ClassifiedPacket::new(0.0, Protocol::Signaling, sip_request("INVITE", Some("z")));
        assert_eq!(a.synthetic_token(), b.synthetic_token());
        assert_ne!(a.synthetic_token(), c.synthetic_token());
        assert!(a.synthetic_token().starts_with("synthetic-"));
    }

    #[test]
    fn test_payload_accepts_text_or_bytes() {
        let json = r#"[
            {"timestamp": 0.5, "size": 400, "protocol": "SIGNALING", "payload": "INVITE sip:a SIP/2.0"},
            {"timestamp": 0.6, "size": 172, "protocol": "MEDIA", "payload": [128, 0, 0, 9]}
        ]"#;
        let packets: Vec<ClassifiedPacket> = serde_json::from_str(json).unwrap();
        assert_eq!(packets[0].signaling_marker(), Some(SignalingMarker::Setup));
        assert_eq!(packets[1].sequence_number(), Some(9));
        assert_eq!(packets[1].size, 172);
    }
}
