//! Controller responses and error codes.

use std::fmt;

use crate::codec;
use crate::frame::{ResponseFrame, ResponseKind};

/// Error code carried in the first data byte of an ERROR response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    Checksum,
    ShortCircuit,
    ReceiveError,
    UnknownCommand,
    PaidFeature,
    InvalidArgs,
    Refused,
    QueueFailure,
    ResponseUnavailable,
    OtherDali,
    MaxLimit,
    UnexpectedResult,
    UnknownTarget,
    Unknown(u8),
}

impl ErrorCode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => Self::Checksum,
            0x02 => Self::ShortCircuit,
            0x03 => Self::ReceiveError,
            0x04 => Self::UnknownCommand,
            0xB0 => Self::PaidFeature,
            0xB1 => Self::InvalidArgs,
            0xB2 => Self::Refused,
            0xB3 => Self::QueueFailure,
            0xB4 => Self::ResponseUnavailable,
            0xB5 => Self::OtherDali,
            0xB6 => Self::MaxLimit,
            0xB7 => Self::UnexpectedResult,
            0xB8 => Self::UnknownTarget,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Checksum => "checksum error",
            Self::ShortCircuit => "DALI bus short circuit",
            Self::ReceiveError => "receive error",
            Self::UnknownCommand => "unknown command",
            Self::PaidFeature => "feature not licensed",
            Self::InvalidArgs => "invalid arguments",
            Self::Refused => "command refused",
            Self::QueueFailure => "queue failure",
            Self::ResponseUnavailable => "response unavailable",
            Self::OtherDali => "other DALI error",
            Self::MaxLimit => "limit reached",
            Self::UnexpectedResult => "unexpected result",
            Self::UnknownTarget => "unknown target",
            Self::Unknown(b) => return write!(f, "error code 0x{b:02X}"),
        };
        f.write_str(s)
    }
}

/// A decoded response to one command.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    pub kind: ResponseKind,
    pub seq: u8,
    pub data: Vec<u8>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.kind == ResponseKind::Ok
    }

    /// Answer data, if this is an ANSWER response.
    pub fn answer(&self) -> Option<&[u8]> {
        (self.kind == ResponseKind::Answer).then_some(self.data.as_slice())
    }

    /// Error code, if this is an ERROR response. An ERROR without data
    /// reports `Unknown(0)`.
    pub fn error_code(&self) -> Option<ErrorCode> {
        (self.kind == ResponseKind::Error)
            .then(|| ErrorCode::from_byte(self.data.first().copied().unwrap_or(0)))
    }
}

impl From<ResponseFrame> for Response {
    fn from(f: ResponseFrame) -> Self {
        Self { kind: f.kind, seq: f.seq, data: f.data }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[seq {}", self.kind, self.seq)?;
        if !self.data.is_empty() {
            write!(f, " | {}", codec::hex(&self.data))?;
        }
        write!(f, "]")
    }
}
