use std::fmt;
use std::io::{self, Read, Seek};

use serde::Serialize;

use crate::reader::LittleEndianReader;

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident, $raw:ty, $read:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
        pub struct $name($raw);

        impl $name {
            pub const BITS: usize = <$raw>::BITS as usize;
            pub const SIZE: usize = Self::BITS / 8;

            pub const fn new(raw: $raw) -> Self {
                Self(raw)
            }

            pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<Self> {
                Ok(Self(r.$read()?))
            }

            pub const fn raw(&self) -> $raw {
                self.0
            }

            /// Panics when `index` is outside the set's width: asking for a
            /// bit that cannot exist is a caller bug, not a data problem.
            pub fn get(&self, index: usize) -> bool {
                assert!(
                    index < Self::BITS,
                    "flag index {index} out of range for {}-bit flag set",
                    Self::BITS
                );
                (self.0 >> index) & 1 == 1
            }

            pub fn any(&self, indices: &[usize]) -> bool {
                indices.iter().any(|&i| self.get(i))
            }

            pub fn emit(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.0.to_le_bytes());
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:0width$b}", self.0, width = Self::BITS)
            }
        }
    };
}

flag_set!(
    Flags8,
    u8,
    read_u8
);
flag_set!(
    Flags16,
    u16,
    read_u16
);
flag_set!(
    /// The 32-bit change-flag word carried by every change form.
    Flags32,
    u32,
    read_u32
);
