//! Conversion between signed samples and the sensor's two-byte encoding.
//!
//! The device does not use plain two's complement. A negative value `v` is
//! stored as `2^n - |v|` in the magnitude field with the sign bit set, where
//! `n` is 7 bits for 8-bit resolution and 9 bits for 10-bit resolution.
//!
//! | Resolution | High byte            | Low byte              |
//! |------------|----------------------|-----------------------|
//! | 8 bit      | `0x00`               | sign (7), field (6:0) |
//! | 10 bit     | sign (7), field8 (6) | field (7:0)           |

use crate::register::OperationRegister;

/// Sample resolution selected in OPF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 8-bit samples, range -128..=127
    Bits8,
    /// 10-bit samples, range -512..=511
    #[default]
    Bits10,
}

impl Resolution {
    /// Smallest encodable sample
    #[must_use]
    pub const fn min(self) -> i16 {
        match self {
            Resolution::Bits8 => -128,
            Resolution::Bits10 => -512,
        }
    }

    /// Largest encodable sample
    #[must_use]
    pub const fn max(self) -> i16 {
        match self {
            Resolution::Bits8 => 127,
            Resolution::Bits10 => 511,
        }
    }

    /// Resolution currently programmed in an OPF value
    #[must_use]
    pub fn from_operation(opf: OperationRegister) -> Self {
        if opf.bit8() {
            Resolution::Bits8
        } else {
            Resolution::Bits10
        }
    }
}

/// Encode a sample into `(high_byte, low_byte)`
///
/// Values outside the range of `resolution` saturate to the nearest bound
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode(resolution: Resolution, value: i16) -> (u8, u8) {
    let x = value.clamp(resolution.min(), resolution.max());

    match resolution {
        Resolution::Bits8 => {
            let low = if x >= 0 {
                (x & 0x7F) as u8
            } else {
                (((0x80 - x.unsigned_abs()) & 0x7F) as u8) | 0x80
            };
            (0x00, low)
        }
        Resolution::Bits10 => {
            if x >= 0 {
                let field = x as u16;
                (((field & 0x100) >> 2) as u8, (field & 0xFF) as u8)
            } else {
                let field = 0x200 - x.unsigned_abs();
                ((((field & 0x100) >> 2) as u8) | 0x80, (field & 0xFF) as u8)
            }
        }
    }
}

/// Decode `(high_byte, low_byte)` back into a sample
#[must_use]
pub fn decode(resolution: Resolution, high: u8, low: u8) -> i16 {
    match resolution {
        Resolution::Bits8 => {
            let x = i16::from(low & 0x7F);
            if low & 0x80 != 0 { x - 0x80 } else { x }
        }
        Resolution::Bits10 => {
            let x = (i16::from((high & 0x40) >> 6) << 8) | i16::from(low);
            if high & 0x80 != 0 { x - 0x200 } else { x }
        }
    }
}
