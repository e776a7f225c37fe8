//! Field codecs for the TPI Advanced wire protocol.
//!
//! All multi-byte integers are big-endian. Signed types use two's complement.
//! The frame checksum is a single XOR byte over everything before it.

use crate::error::{Result, WireError};

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// XOR of every byte in `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

/// Read a single byte.
pub fn read_uint8(data: &[u8], offset: usize) -> Result<u8> {
    check_len(data, offset, 1, "UINT8")?;
    Ok(data[offset])
}

/// Read a signed byte.
pub fn read_int8(data: &[u8], offset: usize) -> Result<i8> {
    check_len(data, offset, 1, "INT8")?;
    Ok(data[offset] as i8)
}

/// Read a big-endian signed 16-bit integer.
pub fn read_int16(data: &[u8], offset: usize) -> Result<i16> {
    check_len(data, offset, 2, "INT16")?;
    Ok(i16::from_be_bytes([data[offset], data[offset + 1]]))
}

/// Read a big-endian unsigned 16-bit integer.
pub fn read_uint16(data: &[u8], offset: usize) -> Result<u16> {
    check_len(data, offset, 2, "UINT16")?;
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

/// Read a big-endian signed 32-bit integer.
pub fn read_int32(data: &[u8], offset: usize) -> Result<i32> {
    check_len(data, offset, 4, "INT32")?;
    Ok(i32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

/// Read a big-endian unsigned 32-bit integer.
pub fn read_uint32(data: &[u8], offset: usize) -> Result<u32> {
    check_len(data, offset, 4, "UINT32")?;
    Ok(u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

/// Read an ASCII label. Trailing NULs are stripped.
pub fn read_label(data: &[u8]) -> Result<String> {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    Ok(String::from_utf8(data[..end].to_vec())?)
}

// ---------------------------------------------------------------------------
// Write helpers
// ---------------------------------------------------------------------------

/// Write a big-endian unsigned 16-bit integer.
pub fn write_uint16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_be_bytes());
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Space-separated uppercase hex, e.g. `"04 05 A2 46 00 00 FE 1D"`.
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn check_len(data: &[u8], offset: usize, need: usize, name: &'static str) -> Result<()> {
    if data.len() < offset + need {
        Err(WireError::payload_too_short(name, offset + need, data.len()))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_xor() {
        assert_eq!(checksum(&[]), 0x00);
        assert_eq!(checksum(&[0x04, 0x00, 0x1C, 0x00, 0x00, 0x00, 0x00]), 0x18);
        assert_eq!(checksum(&[0xFF, 0x0F]), 0xF0);
    }

    #[test]
    fn int16_sign() {
        assert_eq!(read_int16(&[0xFF, 0xFE], 0).unwrap(), -2);
        assert_eq!(read_int16(&[0x80, 0x00], 0).unwrap(), i16::MIN);
        assert_eq!(read_int16(&[0x00, 0x7F, 0xFF], 1).unwrap(), i16::MAX);
    }

    #[test]
    fn uint16_big_endian() {
        let mut buf = Vec::new();
        write_uint16(&mut buf, 0x1234);
        assert_eq!(buf, vec![0x12, 0x34]);
        assert_eq!(read_uint16(&[0x00, 0x12, 0x34], 1).unwrap(), 0x1234);
    }

    #[test]
    fn int32_sign() {
        assert_eq!(read_int32(&[0xFF, 0xFF, 0xFF, 0xFE], 0).unwrap(), -2);
        assert_eq!(read_uint32(&[0x22, 0x33, 0x44, 0x55], 0).unwrap(), 0x2233_4455);
    }

    #[test]
    fn int8_sign() {
        assert_eq!(read_int8(&[0xFE], 0).unwrap(), -2);
        assert_eq!(read_uint8(&[0xFE], 0).unwrap(), 0xFE);
    }

    #[test]
    fn short_read_reports_need() {
        match read_uint32(&[0x01, 0x02], 0) {
            Err(WireError::PayloadTooShort { need, got, .. }) => {
                assert_eq!(need, 4);
                assert_eq!(got, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn label_strips_trailing_nul() {
        assert_eq!(read_label(b"Kitchen\0\0").unwrap(), "Kitchen");
        assert_eq!(read_label(b"").unwrap(), "");
        assert!(read_label(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn hex_format() {
        assert_eq!(hex(&[0x04, 0xA2, 0x0F]), "04 A2 0F");
        assert_eq!(hex(&[]), "");
    }
}
