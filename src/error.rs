use thiserror::Error;

/// Errors arising from wire protocol parsing and encoding.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame too short ({len} bytes, minimum {min})")]
    FrameTooShort { len: usize, min: usize },

    #[error("unrecognised frame header 0x{got:02X}")]
    UnknownHeader { got: u8 },

    #[error("missing event magic (expected 5A 43, got {:02X} {:02X})", got[0], got[1])]
    MissingMagic { got: [u8; 2] },

    #[error("checksum mismatch (frame carries 0x{expected:02X}, computed 0x{computed:02X})")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("length mismatch (header declares {declared} data bytes, frame carries {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("unknown response type 0x{code:02X}")]
    UnknownResponseType { code: u8 },

    #[error("unknown event code 0x{code:02X} (target {target})")]
    UnknownEvent { code: u8, target: u16 },

    #[error("event target {target} is not valid for {event}")]
    InvalidTarget { event: &'static str, target: u16 },

    #[error("payload too short for {msg_type}: need {need} bytes, got {got}{}", format_raw_suffix(raw))]
    PayloadTooShort {
        msg_type: &'static str,
        need: usize,
        got: usize,
        /// Raw payload bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("unexpected payload length for {msg_type}: expected {expected}, got {got}{}", format_raw_suffix(raw))]
    UnexpectedLength {
        msg_type: &'static str,
        expected: usize,
        got: usize,
        /// Raw payload bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("unknown colour type 0x{code:02X}")]
    UnknownColourType { code: u8 },

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{command} cannot target {address}")]
    UnsupportedAddress {
        command: &'static str,
        address: crate::addr::Address,
    },

    #[error("invalid label payload: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

impl WireError {
    /// Create a `PayloadTooShort` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn payload_too_short(msg_type: &'static str, need: usize, got: usize) -> Self {
        Self::PayloadTooShort { msg_type, need, got, raw: Vec::new() }
    }

    /// Create an `UnexpectedLength` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn unexpected_length(msg_type: &'static str, expected: usize, got: usize) -> Self {
        Self::UnexpectedLength { msg_type, expected, got, raw: Vec::new() }
    }

    /// Check that `value` lies in `min..=max`.
    pub(crate) fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfRange { field, value, min, max })
        }
    }

    /// Attach raw payload bytes to decode-phase errors for diagnostics.
    pub fn with_raw(self, payload: &[u8]) -> Self {
        match self {
            Self::PayloadTooShort { msg_type, need, got, .. } => {
                Self::PayloadTooShort { msg_type, need, got, raw: payload.to_vec() }
            }
            Self::UnexpectedLength { msg_type, expected, got, .. } => {
                Self::UnexpectedLength { msg_type, expected, got, raw: payload.to_vec() }
            }
            other => other,
        }
    }

    /// True for a frame whose checksum byte did not match its contents.
    pub fn is_checksum(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    /// True for a structurally valid event frame carrying an unsupported code.
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, Self::UnknownEvent { .. })
    }

    /// True for frames that are too short or structurally invalid.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort { .. }
                | Self::UnknownHeader { .. }
                | Self::MissingMagic { .. }
                | Self::LengthMismatch { .. }
                | Self::UnknownResponseType { .. }
        )
    }
}

/// Format raw bytes as a suffix like " | 5A43..." (empty if no bytes).
pub(crate) fn format_raw_suffix(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let limit = 16;
    let hex: String = raw.iter().take(limit).map(|b| format!("{b:02X}")).collect();
    let ellipsis = if raw.len() > limit { "..." } else { "" };
    format!(" | {hex}{ellipsis}")
}

pub type Result<T> = std::result::Result<T, WireError>;
