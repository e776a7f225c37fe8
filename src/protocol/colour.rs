//! Colour values: XY chromaticity, tunable white, RGBWAF.
//!
//! On the wire a colour is a type byte followed by its channels:
//! ```text
//! 10 X_HI X_LO Y_HI Y_LO         XY
//! 20 K_HI K_LO                   tunable white (Kelvin)
//! 80 R G B W A F                 RGBWAF
//! ```
//! Controllers pad colour answers to 7 bytes, so decoding accepts the
//! padded forms as well.

use crate::codec;
use crate::error::{Result, WireError};

pub const COLOUR_TYPE_XY: u8 = 0x10;
pub const COLOUR_TYPE_TC: u8 = 0x20;
pub const COLOUR_TYPE_RGBWAF: u8 = 0x80;

pub const MIN_KELVIN: u16 = 1000;
pub const MAX_KELVIN: u16 = 20000;

/// Padded length of a colour record in scene and query answers.
pub const COLOUR_RECORD_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Colour {
    Xy { x: u16, y: u16 },
    Tc { kelvin: u16 },
    Rgbwaf { r: u8, g: u8, b: u8, w: u8, a: u8, f: u8 },
}

impl Colour {
    /// Tunable-white colour, range checked.
    pub fn kelvin(kelvin: u16) -> Result<Self> {
        WireError::check_range("kelvin", kelvin.into(), MIN_KELVIN.into(), MAX_KELVIN.into())?;
        Ok(Self::Tc { kelvin })
    }

    pub fn xy(x: u16, y: u16) -> Self {
        Self::Xy { x, y }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgbwaf { r, g, b, w: 0, a: 0, f: 0 }
    }

    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Xy { .. } => COLOUR_TYPE_XY,
            Self::Tc { .. } => COLOUR_TYPE_TC,
            Self::Rgbwaf { .. } => COLOUR_TYPE_RGBWAF,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Self::Tc { kelvin } = self {
            Self::kelvin(*kelvin)?;
        }
        Ok(())
    }

    /// Type byte followed by channel bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![self.type_byte()];
        match *self {
            Self::Xy { x, y } => {
                codec::write_uint16(&mut buf, x);
                codec::write_uint16(&mut buf, y);
            }
            Self::Tc { kelvin } => codec::write_uint16(&mut buf, kelvin),
            Self::Rgbwaf { r, g, b, w, a, f } => buf.extend_from_slice(&[r, g, b, w, a, f]),
        }
        buf
    }

    /// Decode a colour record. Lengths other than the exact or 7-byte
    /// padded form are rejected.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let code = codec::read_uint8(data, 0)?;
        let exact = match code {
            COLOUR_TYPE_XY => 5,
            COLOUR_TYPE_TC => 3,
            COLOUR_TYPE_RGBWAF => 7,
            _ => return Err(WireError::UnknownColourType { code }),
        };
        if data.len() != exact && data.len() != COLOUR_RECORD_LEN {
            return Err(WireError::unexpected_length("Colour", exact, data.len()).with_raw(data));
        }
        Ok(match code {
            COLOUR_TYPE_XY => Self::Xy {
                x: codec::read_uint16(data, 1)?,
                y: codec::read_uint16(data, 3)?,
            },
            COLOUR_TYPE_TC => Self::Tc { kelvin: codec::read_uint16(data, 1)? },
            _ => Self::Rgbwaf {
                r: data[1],
                g: data[2],
                b: data[3],
                w: data[4],
                a: data[5],
                f: data[6],
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_each_type() {
        assert_eq!(Colour::kelvin(2700).unwrap().encode(), vec![0x20, 0x0A, 0x8C]);
        assert_eq!(Colour::xy(0x1234, 0x5678).encode(), vec![0x10, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(Colour::rgb(1, 2, 3).encode(), vec![0x80, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn decode_padded_forms() {
        assert_eq!(
            Colour::decode(&[0x20, 0x0F, 0xA0, 0, 0, 0, 0]).unwrap(),
            Colour::Tc { kelvin: 4000 }
        );
        assert_eq!(Colour::decode(&[0x20, 0x0F, 0xA0]).unwrap(), Colour::Tc { kelvin: 4000 });
        assert_eq!(
            Colour::decode(&[0x10, 0, 1, 0, 2, 0, 0]).unwrap(),
            Colour::Xy { x: 1, y: 2 }
        );
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(matches!(
            Colour::decode(&[0x40, 0, 0]),
            Err(WireError::UnknownColourType { code: 0x40 })
        ));
        assert!(matches!(
            Colour::decode(&[0x20, 0x0F, 0xA0, 0]),
            Err(WireError::UnexpectedLength { .. })
        ));
        assert!(Colour::decode(&[]).is_err());
    }

    #[test]
    fn kelvin_range() {
        assert!(Colour::kelvin(999).is_err());
        assert!(Colour::kelvin(1000).is_ok());
        assert!(Colour::kelvin(20000).is_ok());
        assert!(Colour::Tc { kelvin: 20001 }.validate().is_err());
    }
}
