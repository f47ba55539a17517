use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read, Seek};

use serde::{Serialize, Serializer};

use crate::reader::LittleEndianReader;

/// A string prefixed by its byte length as `u16`. The bytes are kept
/// verbatim since saves mix code pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct WString {
    bytes: Vec<u8>,
}

impl WString {
    pub fn new(s: &str) -> io::Result<Self> {
        Self::from_bytes(s.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> io::Result<Self> {
        if bytes.len() > u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("wide string of {} bytes exceeds u16 length", bytes.len()),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<Self> {
        let len = r.read_u16()? as usize;
        Ok(Self {
            bytes: r.read_bytes(len)?,
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.bytes.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.bytes);
    }

    pub fn size(&self) -> usize {
        2 + self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn eq_ignore_case(&self, other: &WString) -> bool {
        self.bytes.eq_ignore_ascii_case(&other.bytes)
    }
}

impl fmt::Display for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl TryFrom<&str> for WString {
    type Error = io::Error;

    fn try_from(s: &str) -> io::Result<Self> {
        Self::new(s)
    }
}

impl Serialize for WString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_str_lossy())
    }
}
