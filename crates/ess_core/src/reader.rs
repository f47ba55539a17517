use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

/// Little-endian cursor over a seekable source.
pub struct LittleEndianReader<R> {
    inner: R,
}

impl<R: Read + Seek> LittleEndianReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.inner.read_i8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.inner.read_u16::<LittleEndian>()
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.inner.read_i16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.inner.read_u32::<LittleEndian>()
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.inner.read_i32::<LittleEndian>()
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.inner.read_u64::<LittleEndian>()
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.inner.read_i64::<LittleEndian>()
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.inner.read_f32::<LittleEndian>()
    }

    // The one big-endian field in the format: the packed 3-byte RefID.
    pub fn read_u24_be(&mut self) -> io::Result<u32> {
        self.inner.read_u24::<BigEndian>()
    }

    /// Reads a length field that the format stores as a signed 32-bit int
    /// but which must never be negative.
    pub fn read_len_i32(&mut self, what: &str) -> io::Result<usize> {
        let raw = self.read_i32()?;
        if raw < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative {what}: {raw}"),
            ));
        }
        Ok(raw as usize)
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.ensure_available(n)?;
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u32_vec(&mut self, n: usize) -> io::Result<Vec<u32>> {
        self.ensure_available(n.saturating_mul(4))?;
        let mut result = Vec::with_capacity(n);
        for _ in 0..n {
            result.push(self.read_u32()?);
        }
        Ok(result)
    }

    pub fn read_zstring(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(bytes)
    }

    pub fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.inner.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Fails with `UnexpectedEof` before allocating when a count field
    /// claims more bytes than the source still holds.
    pub fn ensure_available(&mut self, n: usize) -> io::Result<()> {
        let remaining = self.remaining()?;
        if (n as u64) > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {n} bytes, only {remaining} remain"),
            ));
        }
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn len(&mut self) -> io::Result<u64> {
        let cur = self.position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn remaining(&mut self) -> io::Result<u64> {
        let cur = self.position()?;
        Ok(self.len()?.saturating_sub(cur))
    }
}

pub fn emit_u24_be(out: &mut Vec<u8>, raw: u32) {
    out.extend_from_slice(&raw.to_be_bytes()[1..]);
}
