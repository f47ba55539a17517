//! Body compression used by the container and by individual change forms.
//!
//! The container compresses everything after the header as a single unit.
//! Zlib streams are standard; the LZ4 variant is a bare LZ4 *block* with no
//! frame header, its size carried by the container's own length prefixes.

use std::fmt;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EssError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Zlib,
    Lz4,
}

impl CompressionType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Zlib),
            2 => Some(Self::Lz4),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match *self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Lz4 => 2,
        }
    }

    pub fn is_compressed(&self) -> bool {
        *self != Self::None
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("zlib: {0}")]
    Zlib(#[from] std::io::Error),

    #[error("lz4: {0}")]
    Lz4(String),

    /// The stream decoded, but not to the advertised length. The decoded
    /// bytes are kept so the caller can still use what is there.
    #[error("decompressed {actual} bytes, expected {expected}")]
    LengthMismatch {
        expected: usize,
        actual: usize,
        partial: Vec<u8>,
    },
}

impl From<CodecError> for EssError {
    fn from(e: CodecError) -> Self {
        EssError::Compression(e.to_string())
    }
}

pub fn compress(kind: CompressionType, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match kind {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        CompressionType::Lz4 => Ok(lz4_flex::block::compress(data)),
    }
}

const ZLIB_PREALLOC_RATIO: usize = 64;

/// Upper bound on what an LZ4 block of `input_len` bytes can expand to.
fn lz4_max_output(input_len: usize) -> usize {
    input_len.saturating_mul(255).saturating_add(16)
}

pub fn decompress(
    kind: CompressionType,
    data: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let out = match kind {
        CompressionType::None => data.to_vec(),
        CompressionType::Zlib => {
            // The declared length comes from the file; only a hint here.
            let mut out = Vec::with_capacity(expected_len.min(data.len().saturating_mul(ZLIB_PREALLOC_RATIO)));
            ZlibDecoder::new(data).read_to_end(&mut out)?;
            out
        }
        CompressionType::Lz4 => lz4_flex::block::decompress(data, expected_len.min(lz4_max_output(data.len())))
            .map_err(|e| CodecError::Lz4(e.to_string()))?,
    };

    if out.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            expected: expected_len,
            actual: out.len(),
            partial: out,
        });
    }
    Ok(out)
}
