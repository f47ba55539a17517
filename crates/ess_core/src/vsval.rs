use std::fmt;
use std::io::{self, Read, Seek};

use serde::Serialize;
use thiserror::Error;

use crate::reader::LittleEndianReader;

// Largest value the three-byte form can carry: 24 bits minus the 2-bit tag.
pub const VSVAL_MAX: u32 = 0x3F_FFFF;

const ONE_BYTE_LIMIT: u32 = 0x40;
const TWO_BYTE_LIMIT: u32 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {0:#x} does not fit a variable-size int (max {VSVAL_MAX:#x})")]
pub struct VsvalRangeError(pub u32);

/// Unsigned integer stored in 1, 2 or 3 little-endian bytes. The low two
/// bits of the first byte give the width (0, 1, 2 → 1, 2, 3 bytes); the
/// value sits in the remaining bits.
///
/// The width read from disk is kept so a non-minimal encoding written by
/// the game survives a round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VarSizeInt {
    value: u32,
    width: u8,
}

impl VarSizeInt {
    pub fn new(value: u32) -> Result<Self, VsvalRangeError> {
        let width = if value < ONE_BYTE_LIMIT {
            1
        } else if value < TWO_BYTE_LIMIT {
            2
        } else if value <= VSVAL_MAX {
            3
        } else {
            return Err(VsvalRangeError(value));
        };
        Ok(Self { value, width })
    }

    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<Self> {
        let b0 = r.read_u8()? as u32;
        let (packed, width) = match b0 & 0x3 {
            0 => (b0, 1),
            1 => (b0 | ((r.read_u8()? as u32) << 8), 2),
            2 => {
                let b1 = r.read_u8()? as u32;
                let b2 = r.read_u8()? as u32;
                (b0 | (b1 << 8) | (b2 << 16), 3)
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid variable-size int tag in byte {b0:#04x}"),
                ));
            }
        };
        Ok(Self {
            value: packed >> 2,
            width,
        })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn as_usize(&self) -> usize {
        self.value as usize
    }

    pub fn size(&self) -> usize {
        self.width as usize
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        let tag = (self.width - 1) as u32;
        let packed = (self.value << 2) | tag;
        out.extend_from_slice(&packed.to_le_bytes()[..self.size()]);
    }
}

impl TryFrom<usize> for VarSizeInt {
    type Error = VsvalRangeError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        let value = u32::try_from(value).map_err(|_| VsvalRangeError(u32::MAX))?;
        Self::new(value)
    }
}

impl fmt::Display for VarSizeInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
