//! Frame parsing, encoding, and checksum.
//!
//! Three frame shapes share the wire, told apart by their first byte:
//! ```text
//! request:  04 SEQ CMD BODY... CS
//! response: TYPE SEQ LEN DATA[LEN] CS                 (TYPE = A0..A3)
//! event:    5A 43 MAC[6] TGT_HI TGT_LO CODE LEN PAYLOAD[LEN] CS
//! ```
//!
//! `CS` is the XOR of every preceding byte. It is verified over the whole
//! datagram before any field is interpreted, so a corrupted frame is never
//! partially trusted.

use std::fmt;

use crate::addr::MacAddr;
use crate::codec::{self, checksum};
use crate::error::{Result, WireError};

pub const REQUEST_MAGIC: u8 = 0x04;
pub const EVENT_MAGIC: [u8; 2] = [0x5A, 0x43];
/// Largest data or payload a one-byte length field can describe.
pub const MAX_DATA_LEN: usize = u8::MAX as usize;

/// Request header (magic, seq, command) plus checksum.
const REQUEST_MIN: usize = 4;
/// Response header (type, seq, len) plus checksum.
const RESPONSE_MIN: usize = 4;
/// Event header (magic 2, mac 6, target 2, code, len) plus checksum.
const EVENT_MIN: usize = 13;

// ---------------------------------------------------------------------------
// Response type
// ---------------------------------------------------------------------------

/// Response type byte (first byte of a response frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResponseKind {
    /// Command accepted, no data.
    Ok = 0xA0,
    /// Query answered; data follows.
    Answer = 0xA1,
    /// Target did not answer (or the value is unset).
    NoAnswer = 0xA2,
    /// Command failed; data[0] is an error code.
    Error = 0xA3,
}

impl ResponseKind {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0xA0 => Ok(Self::Ok),
            0xA1 => Ok(Self::Answer),
            0xA2 => Ok(Self::NoAnswer),
            0xA3 => Ok(Self::Error),
            _ => Err(WireError::UnknownResponseType { code: b }),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A command frame sent from the client to a controller.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub seq: u8,
    pub command: u8,
    /// Shaped body (basic, colour, or length-prefixed dynamic).
    pub body: Vec<u8>,
}

impl RequestFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(REQUEST_MIN + self.body.len());
        wire.push(REQUEST_MAGIC);
        wire.push(self.seq);
        wire.push(self.command);
        wire.extend_from_slice(&self.body);
        wire.push(checksum(&wire));
        wire
    }
}

impl fmt::Debug for RequestFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request[seq {} cmd 0x{:02X} | {}]",
            self.seq,
            self.command,
            codec::hex(&self.body)
        )
    }
}

/// A response frame sent by a controller to a command.
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub kind: ResponseKind,
    pub seq: u8,
    pub data: Vec<u8>,
}

impl ResponseFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(RESPONSE_MIN + self.data.len());
        debug_assert!(self.data.len() <= MAX_DATA_LEN, "response data exceeds length byte");
        wire.push(self.kind.as_byte());
        wire.push(self.seq);
        wire.push(self.data.len() as u8);
        wire.extend_from_slice(&self.data);
        wire.push(checksum(&wire));
        wire
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response[{:?} seq {} | {}]", self.kind, self.seq, codec::hex(&self.data))
    }
}

/// An event frame emitted by a controller over multicast or unicast.
///
/// The target is 16 bits wide here, one byte wider than the address field
/// of a request frame.
#[derive(Clone, PartialEq, Eq)]
pub struct EventFrame {
    pub mac: MacAddr,
    pub target: u16,
    pub code: u8,
    pub payload: Vec<u8>,
}

impl EventFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(EVENT_MIN + self.payload.len());
        wire.extend_from_slice(&EVENT_MAGIC);
        wire.extend_from_slice(&self.mac.0);
        codec::write_uint16(&mut wire, self.target);
        debug_assert!(self.payload.len() <= MAX_DATA_LEN, "event payload exceeds length byte");
        wire.push(self.code);
        wire.push(self.payload.len() as u8);
        wire.extend_from_slice(&self.payload);
        wire.push(checksum(&wire));
        wire
    }
}

impl fmt::Debug for EventFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{} target {} code 0x{:02X} | {}]",
            self.mac,
            self.target,
            self.code,
            codec::hex(&self.payload)
        )
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Any frame that can appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Request(RequestFrame),
    Response(ResponseFrame),
    Event(EventFrame),
}

impl Packet {
    /// Parse a single datagram.
    ///
    /// The checksum is verified first; a mismatch rejects the whole datagram
    /// regardless of which byte was corrupted.
    pub fn parse(wire: &[u8]) -> Result<Self> {
        if wire.len() < REQUEST_MIN {
            return Err(WireError::FrameTooShort { len: wire.len(), min: REQUEST_MIN });
        }
        let n = wire.len();
        let computed = checksum(&wire[..n - 1]);
        if computed != wire[n - 1] {
            return Err(WireError::ChecksumMismatch { expected: wire[n - 1], computed });
        }

        match wire[0] {
            REQUEST_MAGIC => Ok(Packet::Request(RequestFrame {
                seq: wire[1],
                command: wire[2],
                body: wire[3..n - 1].to_vec(),
            })),
            0xA0..=0xA3 => parse_response(wire).map(Packet::Response),
            b if b == EVENT_MAGIC[0] => parse_event(wire).map(Packet::Event),
            other => Err(WireError::UnknownHeader { got: other }),
        }
    }

    /// Sequence number for request/response frames.
    pub fn seq(&self) -> Option<u8> {
        match self {
            Packet::Request(f) => Some(f.seq),
            Packet::Response(f) => Some(f.seq),
            Packet::Event(_) => None,
        }
    }
}

fn parse_response(wire: &[u8]) -> Result<ResponseFrame> {
    let n = wire.len();
    let kind = ResponseKind::from_byte(wire[0])?;
    let declared = wire[2] as usize;
    let actual = n - RESPONSE_MIN;
    if declared != actual {
        return Err(WireError::LengthMismatch { declared, actual });
    }
    Ok(ResponseFrame {
        kind,
        seq: wire[1],
        data: wire[3..n - 1].to_vec(),
    })
}

fn parse_event(wire: &[u8]) -> Result<EventFrame> {
    let n = wire.len();
    if n < EVENT_MIN {
        return Err(WireError::FrameTooShort { len: n, min: EVENT_MIN });
    }
    if wire[..2] != EVENT_MAGIC {
        return Err(WireError::MissingMagic { got: [wire[0], wire[1]] });
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&wire[2..8]);
    let target = codec::read_uint16(wire, 8)?;
    let code = wire[10];
    let declared = wire[11] as usize;
    let actual = n - EVENT_MIN;
    if declared != actual {
        return Err(WireError::LengthMismatch { declared, actual });
    }
    Ok(EventFrame {
        mac: MacAddr(mac),
        target,
        code,
        payload: wire[12..n - 1].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddr = MacAddr([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);

    #[test]
    fn encode_request_worked_example() {
        // Arc level 0xFE on wire address 70, seq 5.
        let frame = RequestFrame { seq: 5, command: 0xA2, body: vec![70, 0x00, 0x00, 0xFE] };
        let wire = frame.encode();
        assert_eq!(wire[..7], [0x04, 0x05, 0xA2, 0x46, 0x00, 0x00, 0xFE]);
        assert_eq!(wire[7], 0x04 ^ 0x05 ^ 0xA2 ^ 0x46 ^ 0xFE);
    }

    #[test]
    fn parse_response_worked_example() {
        // ANSWER, seq 9, two data bytes.
        let mut wire = vec![0xA1, 0x09, 0x02, 0x01, 0x0F];
        wire.push(checksum(&wire));
        match Packet::parse(&wire).unwrap() {
            Packet::Response(r) => {
                assert_eq!(r.kind, ResponseKind::Answer);
                assert_eq!(r.seq, 9);
                assert_eq!(r.data, vec![0x01, 0x0F]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn longest_response_data_round_trips() {
        let frame = ResponseFrame { kind: ResponseKind::Answer, seq: 1, data: vec![0x41; MAX_DATA_LEN] };
        let wire = frame.encode();
        assert_eq!(wire[2], 0xFF);
        assert_eq!(Packet::parse(&wire).unwrap(), Packet::Response(frame));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "exceeds length byte")]
    fn oversized_event_payload_rejected() {
        let frame = EventFrame { mac: MAC, target: 1, code: 0x05, payload: vec![0; MAX_DATA_LEN + 1] };
        let _ = frame.encode();
    }

    #[test]
    fn request_round_trip() {
        let frame = RequestFrame { seq: 200, command: 0x0E, body: vec![3, 0xFE, 0x20, 0x0F, 0xA0, 0, 0, 0] };
        assert_eq!(Packet::parse(&frame.encode()).unwrap(), Packet::Request(frame));
    }

    #[test]
    fn event_round_trip() {
        let frame = EventFrame { mac: MAC, target: 68, code: 0x05, payload: vec![0x03] };
        let wire = frame.encode();
        assert_eq!(wire.len(), 14);
        assert_eq!(wire[..2], EVENT_MAGIC);
        assert_eq!(wire[8..10], [0x00, 68]);
        assert_eq!(Packet::parse(&wire).unwrap(), Packet::Event(frame));
    }

    #[test]
    fn empty_response_data() {
        let frame = ResponseFrame { kind: ResponseKind::Ok, seq: 0, data: vec![] };
        let wire = frame.encode();
        assert_eq!(wire.len(), 4);
        assert_eq!(Packet::parse(&wire).unwrap(), Packet::Response(frame));
    }

    #[test]
    fn every_single_byte_flip_fails_checksum() {
        let frames = [
            RequestFrame { seq: 7, command: 0xA1, body: vec![68, 0, 0, 3] }.encode(),
            ResponseFrame { kind: ResponseKind::Answer, seq: 7, data: vec![0x10, 0x20] }.encode(),
            EventFrame { mac: MAC, target: 70, code: 0x00, payload: vec![1] }.encode(),
        ];
        for wire in frames {
            for i in 0..wire.len() {
                for flip in [0x01u8, 0x80, 0xFF] {
                    let mut bad = wire.clone();
                    bad[i] ^= flip;
                    let err = Packet::parse(&bad).unwrap_err();
                    assert!(err.is_checksum(), "byte {i} flip {flip:02X}: {err:?}");
                }
            }
        }
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut wire = vec![0xA1, 0x01, 0x05, 0x01];
        wire.push(checksum(&wire));
        assert!(matches!(
            Packet::parse(&wire),
            Err(WireError::LengthMismatch { declared: 5, actual: 1 })
        ));
    }

    #[test]
    fn unknown_header_rejected() {
        let mut wire = vec![0xAE, 0x01, 0x00];
        wire.push(checksum(&wire));
        assert!(matches!(Packet::parse(&wire), Err(WireError::UnknownHeader { got: 0xAE })));
    }

    #[test]
    fn bad_event_magic_rejected() {
        let mut wire = EventFrame { mac: MAC, target: 1, code: 5, payload: vec![] }.encode();
        wire[1] = 0x44;
        let n = wire.len();
        wire[n - 1] = checksum(&wire[..n - 1]);
        assert!(matches!(Packet::parse(&wire), Err(WireError::MissingMagic { .. })));
    }

    #[test]
    fn too_short() {
        assert!(matches!(
            Packet::parse(&[0xA0, 0x00, 0xA0]),
            Err(WireError::FrameTooShort { .. })
        ));
        let mut short_event = vec![0x5A, 0x43, 0x00, 0x00];
        short_event.push(checksum(&short_event));
        assert!(Packet::parse(&short_event).unwrap_err().is_malformed());
    }
}
