//! Ordered name → value records.
//!
//! Most change-form bodies have no fixed schema: which fields exist depends
//! on flag bits and on values read earlier in the same body. A
//! [`GenericRecord`] is built one field at a time while reading, and later
//! replays its fields in insertion order to write them or to size them.
//! Write and size use the same per-kind width table, so
//! `size() == emitted length` holds for every record.

use std::io::{self, Read, Seek};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::context::EssContext;
use crate::reader::LittleEndianReader;
use crate::refid::RefId;
use crate::vsval::VarSizeInt;
use crate::wstring::WString;

/// Upper bound for fixed-length array reads; larger counts mean the parse
/// has wandered into the wrong bytes.
pub const MAX_FIXED_ARRAY: usize = 256;

#[derive(Debug, Clone)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    // Zero-terminated string; the terminator is not stored.
    Str(Vec<u8>),
    WStr(WString),
    ByteVec(Vec<u8>),
    ShortVec(Vec<i16>),
    IntVec(Vec<i32>),
    FloatVec(Vec<f32>),
    RefId(RefId),
    RefIdVec(Vec<RefId>),
    VarInt(VarSizeInt),
    Node(Box<GenericRecord>),
    List(Vec<GenericRecord>),
}

impl Value {
    pub fn size(&self) -> usize {
        match self {
            Value::Int8(_) => 1,
            Value::Int16(_) => 2,
            Value::Int32(_) | Value::Float(_) => 4,
            Value::Int64(_) => 8,
            Value::Str(s) => s.len() + 1,
            Value::WStr(s) => s.size(),
            Value::ByteVec(v) => v.len(),
            Value::ShortVec(v) => v.len() * 2,
            Value::IntVec(v) => v.len() * 4,
            Value::FloatVec(v) => v.len() * 4,
            Value::RefId(_) => RefId::SIZE,
            Value::RefIdVec(v) => v.len() * RefId::SIZE,
            Value::VarInt(v) => v.size(),
            Value::Node(r) => r.size(),
            Value::List(items) => items.iter().map(GenericRecord::size).sum(),
        }
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int8(v) => out.push(*v as u8),
            Value::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Str(s) => {
                out.extend_from_slice(s);
                out.push(0);
            }
            Value::WStr(s) => s.emit(out),
            Value::ByteVec(v) => out.extend_from_slice(v),
            Value::ShortVec(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Value::IntVec(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Value::FloatVec(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Value::RefId(id) => id.emit(out),
            Value::RefIdVec(v) => v.iter().for_each(|id| id.emit(out)),
            Value::VarInt(v) => v.emit(out),
            Value::Node(r) => r.emit(out),
            Value::List(items) => items.iter().for_each(|r| r.emit(out)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Str(_) => "zstring",
            Value::WStr(_) => "wstring",
            Value::ByteVec(_) => "byte[]",
            Value::ShortVec(_) => "short[]",
            Value::IntVec(_) => "int[]",
            Value::FloatVec(_) => "float[]",
            Value::RefId(_) => "refid",
            Value::RefIdVec(_) => "refid[]",
            Value::VarInt(_) => "vsval",
            Value::Node(_) => "record",
            Value::List(_) => "record[]",
        }
    }
}

fn floats_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

// Floats compare by bit pattern so a decoded body always equals itself,
// NaN payloads included.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::WStr(a), Value::WStr(b)) => a == b,
            (Value::ByteVec(a), Value::ByteVec(b)) => a == b,
            (Value::ShortVec(a), Value::ShortVec(b)) => a == b,
            (Value::IntVec(a), Value::IntVec(b)) => a == b,
            (Value::FloatVec(a), Value::FloatVec(b)) => floats_eq(a, b),
            (Value::RefId(a), Value::RefId(b)) => a == b,
            (Value::RefIdVec(a), Value::RefIdVec(b)) => a == b,
            (Value::VarInt(a), Value::VarInt(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float,
    WString => WStr,
    Vec<u8> => ByteVec,
    Vec<i16> => ShortVec,
    Vec<i32> => IntVec,
    Vec<f32> => FloatVec,
    RefId => RefId,
    Vec<RefId> => RefIdVec,
    VarSizeInt => VarInt,
    Vec<GenericRecord> => List,
);

impl From<GenericRecord> for Value {
    fn from(r: GenericRecord) -> Self {
        Value::Node(Box::new(r))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericRecord {
    entries: Vec<(String, Value)>,
}

impl GenericRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`. A repeated name replaces the earlier
    /// value but keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.size()).sum()
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        for (_, value) in &self.entries {
            value.emit(out);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        self.emit(&mut out);
        out
    }

    // --- typed lookups ---

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Value::Int8(v) => Some(*v as i32),
            Value::Int16(v) => Some(*v as i32),
            Value::Int32(v) => Some(*v),
            Value::VarInt(v) => Some(v.value() as i32),
            _ => None,
        }
    }

    pub fn get_u8(&self, name: &str) -> Option<u8> {
        match self.get(name)? {
            Value::Int8(v) => Some(*v as u8),
            _ => None,
        }
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_ref_id(&self, name: &str) -> Option<RefId> {
        match self.get(name)? {
            Value::RefId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn get_ref_ids(&self, name: &str) -> Option<&[RefId]> {
        match self.get(name)? {
            Value::RefIdVec(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn get_wstring(&self, name: &str) -> Option<&WString> {
        match self.get(name)? {
            Value::WStr(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            Value::ByteVec(b) => Some(b),
            _ => None,
        }
    }

    pub fn get_floats(&self, name: &str) -> Option<&[f32]> {
        match self.get(name)? {
            Value::FloatVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_ints(&self, name: &str) -> Option<&[i32]> {
        match self.get(name)? {
            Value::IntVec(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_record(&self, name: &str) -> Option<&GenericRecord> {
        match self.get(name)? {
            Value::Node(r) => Some(r),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&[GenericRecord]> {
        match self.get(name)? {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    // --- incremental readers: consume, store under `name`, return value ---

    pub fn read_i8<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<i8> {
        let v = r.read_i8()?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_u8<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<u8> {
        Ok(self.read_i8(r, name)? as u8)
    }

    pub fn read_i16<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<i16> {
        let v = r.read_i16()?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_i32<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<i32> {
        let v = r.read_i32()?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_i64<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<i64> {
        let v = r.read_i64()?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_f32<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<f32> {
        let v = r.read_f32()?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_zstring<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>, name: &str) -> io::Result<()> {
        let s = r.read_zstring()?;
        self.insert(name, Value::Str(s));
        Ok(())
    }

    pub fn read_wstring<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<WString> {
        let s = WString::read(r)?;
        self.insert(name, s.clone());
        Ok(s)
    }

    pub fn read_vsval<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<VarSizeInt> {
        let v = VarSizeInt::read(r)?;
        self.insert(name, v);
        Ok(v)
    }

    pub fn read_ref_id<R: Read + Seek>(
        &mut self,
        ctx: &mut EssContext<'_>,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<RefId> {
        let id = ctx.read_ref_id(r)?;
        self.insert(name, id);
        Ok(id)
    }

    pub fn read_bytes<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
    ) -> io::Result<()> {
        check_fixed(count, name)?;
        let v = r.read_bytes(count)?;
        self.insert(name, v);
        Ok(())
    }

    pub fn read_shorts<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
    ) -> io::Result<()> {
        check_fixed(count, name)?;
        let v = (0..count).map(|_| r.read_i16()).collect::<io::Result<Vec<_>>>()?;
        self.insert(name, v);
        Ok(())
    }

    pub fn read_ints<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
    ) -> io::Result<()> {
        check_fixed(count, name)?;
        let v = (0..count).map(|_| r.read_i32()).collect::<io::Result<Vec<_>>>()?;
        self.insert(name, v);
        Ok(())
    }

    pub fn read_floats<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
    ) -> io::Result<()> {
        check_fixed(count, name)?;
        let v = (0..count).map(|_| r.read_f32()).collect::<io::Result<Vec<_>>>()?;
        self.insert(name, v);
        Ok(())
    }

    /// Reads `count` RefIDs. The count comes from the data itself, so it is
    /// bounded by the bytes remaining rather than by `MAX_FIXED_ARRAY`.
    pub fn read_ref_ids<R: Read + Seek>(
        &mut self,
        ctx: &mut EssContext<'_>,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
    ) -> io::Result<Vec<RefId>> {
        r.ensure_available(count.saturating_mul(RefId::SIZE))?;
        let ids = (0..count)
            .map(|_| ctx.read_ref_id(r))
            .collect::<io::Result<Vec<_>>>()?;
        self.insert(name, ids.clone());
        Ok(ids)
    }

    pub fn read_record<F>(&mut self, name: &str, f: F) -> io::Result<&GenericRecord>
    where
        F: FnOnce(&mut GenericRecord) -> io::Result<()>,
    {
        let mut child = GenericRecord::new();
        f(&mut child)?;
        self.insert(name, child);
        match self.get(name) {
            Some(Value::Node(r)) => Ok(r),
            _ => Err(io::Error::other(format!("record field {name} vanished after insert"))),
        }
    }

    pub fn read_records<R, F>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        count: usize,
        mut f: F,
    ) -> io::Result<()>
    where
        R: Read + Seek,
        F: FnMut(&mut LittleEndianReader<R>, &mut GenericRecord) -> io::Result<()>,
    {
        // Every element takes at least one byte.
        r.ensure_available(count)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let mut item = GenericRecord::new();
            f(r, &mut item)?;
            items.push(item);
        }
        self.insert(name, items);
        Ok(())
    }

    // --- VarSizeInt-counted reads: `<name>_count` then `<name>` ---

    pub fn read_vs_bytes<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<Vec<u8>> {
        let count = self.read_vsval(r, &count_name(name))?.as_usize();
        let v = r.read_bytes(count)?;
        self.insert(name, v.clone());
        Ok(v)
    }

    pub fn read_vs_ints<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<()> {
        let count = self.read_vsval(r, &count_name(name))?.as_usize();
        r.ensure_available(count.saturating_mul(4))?;
        let v = (0..count).map(|_| r.read_i32()).collect::<io::Result<Vec<_>>>()?;
        self.insert(name, v);
        Ok(())
    }

    pub fn read_vs_floats<R: Read + Seek>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<()> {
        let count = self.read_vsval(r, &count_name(name))?.as_usize();
        r.ensure_available(count.saturating_mul(4))?;
        let v = (0..count).map(|_| r.read_f32()).collect::<io::Result<Vec<_>>>()?;
        self.insert(name, v);
        Ok(())
    }

    pub fn read_vs_ref_ids<R: Read + Seek>(
        &mut self,
        ctx: &mut EssContext<'_>,
        r: &mut LittleEndianReader<R>,
        name: &str,
    ) -> io::Result<Vec<RefId>> {
        let count = self.read_vsval(r, &count_name(name))?.as_usize();
        self.read_ref_ids(ctx, r, name, count)
    }

    pub fn read_vs_records<R, F>(
        &mut self,
        r: &mut LittleEndianReader<R>,
        name: &str,
        f: F,
    ) -> io::Result<()>
    where
        R: Read + Seek,
        F: FnMut(&mut LittleEndianReader<R>, &mut GenericRecord) -> io::Result<()>,
    {
        let count = self.read_vsval(r, &count_name(name))?.as_usize();
        self.read_records(r, name, count, f)
    }
}

pub fn count_name(name: &str) -> String {
    format!("{name}_count")
}

fn check_fixed(count: usize, name: &str) -> io::Result<()> {
    if count > MAX_FIXED_ARRAY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("fixed array {name} of {count} elements exceeds {MAX_FIXED_ARRAY}"),
        ));
    }
    Ok(())
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Str(s) => serializer.serialize_str(&String::from_utf8_lossy(s)),
            Value::WStr(s) => s.serialize(serializer),
            Value::ByteVec(v) => serializer.serialize_bytes(v),
            Value::ShortVec(v) => v.serialize(serializer),
            Value::IntVec(v) => v.serialize(serializer),
            Value::FloatVec(v) => v.serialize(serializer),
            Value::RefId(id) => serializer.serialize_str(&id.to_string()),
            Value::RefIdVec(ids) => {
                let mut seq = serializer.serialize_seq(Some(ids.len()))?;
                for id in ids {
                    seq.serialize_element(&id.to_string())?;
                }
                seq.end()
            }
            Value::VarInt(v) => serializer.serialize_u32(v.value()),
            Value::Node(r) => r.serialize(serializer),
            Value::List(items) => items.serialize(serializer),
        }
    }
}

impl Serialize for GenericRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::header::Game;
    use crate::plugins::PluginTable;
    use crate::refid::RefIdFactory;

    fn reader(bytes: &[u8]) -> LittleEndianReader<Cursor<&[u8]>> {
        LittleEndianReader::new(Cursor::new(bytes))
    }

    #[test]
    fn size_matches_emitted_bytes_for_every_kind() {
        let mut inner = GenericRecord::new();
        inner.insert("a", 7i8);
        inner.insert("b", 1.5f32);

        let mut rec = GenericRecord::new();
        rec.insert("i8", -1i8);
        rec.insert("i16", 300i16);
        rec.insert("i32", -70000i32);
        rec.insert("i64", 1i64 << 40);
        rec.insert("f", 0.25f32);
        rec.insert("s", Value::Str(b"hello".to_vec()));
        rec.insert("w", WString::new("wide").unwrap());
        rec.insert("bytes", vec![1u8, 2, 3]);
        rec.insert("shorts", vec![1i16, 2]);
        rec.insert("ints", vec![1i32, 2, 3]);
        rec.insert("floats", vec![1.0f32]);
        rec.insert("ref", RefId::unresolved(0x40_0001));
        rec.insert("refs", vec![RefId::unresolved(1), RefId::unresolved(2)]);
        rec.insert("vs", VarSizeInt::new(0x1234).unwrap());
        rec.insert("node", inner.clone());
        rec.insert("list", vec![inner.clone(), inner]);

        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(), rec.size());
        assert_eq!(rec.size(), 1 + 2 + 4 + 8 + 4 + 6 + 6 + 3 + 4 + 12 + 4 + 3 + 6 + 2 + 5 + 10);
    }

    #[test]
    fn duplicate_names_overwrite_in_place() {
        let mut rec = GenericRecord::new();
        rec.insert("first", 1i32);
        rec.insert("second", 2i32);
        rec.insert("first", 3i8);
        let names: Vec<&str> = rec.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(rec.get("first"), Some(&Value::Int8(3)));
        assert_eq!(rec.size(), 5);
    }

    #[test]
    fn incremental_reads_replay_to_identical_bytes() {
        let bytes: Vec<u8> = [
            &[0x05u8][..],
            &0x1234i16.to_le_bytes()[..],
            &(-2i32).to_le_bytes()[..],
            &3.5f32.to_le_bytes()[..],
            &b"abc\0"[..],
            &[0x03, 0x00, b'x', b'y', b'z'][..],
            &[0x08][..],
            &[9, 9][..],
        ]
        .concat();
        let mut r = reader(&bytes);
        let mut rec = GenericRecord::new();
        assert_eq!(rec.read_u8(&mut r, "tag").unwrap(), 5);
        rec.read_i16(&mut r, "short").unwrap();
        rec.read_i32(&mut r, "int").unwrap();
        assert_eq!(rec.read_f32(&mut r, "float").unwrap(), 3.5);
        rec.read_zstring(&mut r, "name").unwrap();
        rec.read_wstring(&mut r, "wide").unwrap();
        assert_eq!(rec.read_vs_bytes(&mut r, "blob").unwrap(), vec![9, 9]);

        assert_eq!(rec.to_bytes(), bytes);
        assert_eq!(rec.get_u8("blob_count"), None);
        assert_eq!(rec.get_i32("blob_count"), Some(2));
    }

    #[test]
    fn zero_count_yields_empty_collection() {
        let bytes = [0x00u8];
        let mut r = reader(&bytes);
        let mut rec = GenericRecord::new();
        rec.read_vs_floats(&mut r, "morphs").unwrap();
        assert_eq!(rec.get_floats("morphs"), Some(&[][..]));
        assert_eq!(rec.size(), 1);
    }

    #[test]
    fn fixed_arrays_reject_huge_counts() {
        let bytes = vec![0u8; 1024];
        let mut r = reader(&bytes);
        let mut rec = GenericRecord::new();
        let err = rec.read_bytes(&mut r, "blob", MAX_FIXED_ARRAY + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(rec.is_empty());
    }

    #[test]
    fn counted_refids_are_bounded_by_remaining_bytes() {
        // count 10, but only 2 ids follow
        let bytes = [0x28u8, 0, 0, 1, 0, 0, 2];
        let plugins = PluginTable::default();
        let mut factory = RefIdFactory::new();
        let mut ctx = EssContext::new(Game::SkyrimLe, 74, &plugins, &[], &mut factory);
        let mut rec = GenericRecord::new();
        let err = rec.read_vs_ref_ids(&mut ctx, &mut reader(&bytes), "forms").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn nested_records_and_lists() {
        let bytes = [0x08u8, 1, 0, 2, 0, 0x2A];
        let mut r = reader(&bytes);
        let mut rec = GenericRecord::new();
        rec.read_vs_records(&mut r, "items", |r, item| {
            item.read_i16(r, "value")?;
            Ok(())
        })
        .unwrap();
        let inner = rec
            .read_record("tail", |child| {
                child.read_i8(&mut r, "answer")?;
                Ok(())
            })
            .unwrap();
        assert_eq!(inner.get_i32("answer"), Some(42));
        assert_eq!(rec.get_list("items").unwrap().len(), 2);
        assert_eq!(rec.to_bytes(), bytes);
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::Float(f32::NAN), Value::Float(f32::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Int32(1), Value::Int16(1));
    }
}
