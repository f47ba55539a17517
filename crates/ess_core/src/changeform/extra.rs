//! Extra-data lists attached to placed references and inventory entries.
//!
//! Each entry is a type tag followed by a tag-specific payload. Tags outside
//! the table below cannot be skipped (the payload length is not stored), so
//! they fail the whole body decode.

use std::io::{self, Read, Seek};

use crate::context::EssContext;
use crate::reader::LittleEndianReader;
use crate::record::GenericRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExtraDataType {
    Worn,
    WornLeft,
    PackageStartLocation,
    ReferenceHandle,
    Ghost,
    OriginalReference,
    Ownership,
    Global,
    Rank,
    Count,
    Health,
    TimeLeft,
    Charge,
    Lock,
    Teleport,
    MapMarker,
    Scale,
    CannotWear,
    Poison,
    LinkedRef,
    ActivateRef,
    ObjectHealth,
    FactionChanges,
    AliasInstanceArray,
}

impl ExtraDataType {
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x16 => Self::Worn,
            0x17 => Self::WornLeft,
            0x18 => Self::PackageStartLocation,
            0x1C => Self::ReferenceHandle,
            0x1F => Self::Ghost,
            0x20 => Self::OriginalReference,
            0x21 => Self::Ownership,
            0x22 => Self::Global,
            0x23 => Self::Rank,
            0x24 => Self::Count,
            0x25 => Self::Health,
            0x27 => Self::TimeLeft,
            0x28 => Self::Charge,
            0x2A => Self::Lock,
            0x2B => Self::Teleport,
            0x2C => Self::MapMarker,
            0x2F => Self::Scale,
            0x3C => Self::CannotWear,
            0x3D => Self::Poison,
            0x4F => Self::LinkedRef,
            0x51 => Self::ActivateRef,
            0x54 => Self::ObjectHealth,
            0x5A => Self::FactionChanges,
            0x88 => Self::AliasInstanceArray,
            _ => return None,
        })
    }
}

pub(crate) fn read_extra_list<R: Read + Seek>(
    record: &mut GenericRecord,
    r: &mut LittleEndianReader<R>,
    name: &str,
    ctx: &mut EssContext<'_>,
) -> io::Result<()> {
    record.read_vs_records(r, name, |r, entry| read_extra_entry(entry, r, ctx))
}

fn read_extra_entry<R: Read + Seek>(
    entry: &mut GenericRecord,
    r: &mut LittleEndianReader<R>,
    ctx: &mut EssContext<'_>,
) -> io::Result<()> {
    let tag = entry.read_u8(r, "type")?;
    let kind = ExtraDataType::from_tag(tag).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown extra data type {tag:#04x}"),
        )
    })?;

    match kind {
        ExtraDataType::Worn | ExtraDataType::WornLeft | ExtraDataType::CannotWear => {}
        ExtraDataType::PackageStartLocation => {
            entry.read_ref_id(ctx, r, "location")?;
            entry.read_floats(r, "position", 3)?;
            entry.read_f32(r, "heading")?;
        }
        ExtraDataType::ReferenceHandle => {
            entry.read_ref_id(ctx, r, "handle")?;
        }
        ExtraDataType::Ghost => {
            entry.read_u8(r, "ghost")?;
        }
        ExtraDataType::OriginalReference => {
            entry.read_ref_id(ctx, r, "original")?;
        }
        ExtraDataType::Ownership => {
            entry.read_ref_id(ctx, r, "owner")?;
        }
        ExtraDataType::Global => {
            entry.read_ref_id(ctx, r, "global")?;
        }
        ExtraDataType::Rank => {
            entry.read_i32(r, "rank")?;
        }
        ExtraDataType::Count => {
            entry.read_i16(r, "count")?;
        }
        ExtraDataType::Health => {
            entry.read_f32(r, "health")?;
        }
        ExtraDataType::TimeLeft => {
            entry.read_f32(r, "time_left")?;
        }
        ExtraDataType::Charge => {
            entry.read_f32(r, "charge")?;
        }
        ExtraDataType::Lock => {
            entry.read_i8(r, "level")?;
            entry.read_ref_id(ctx, r, "key")?;
            entry.read_u8(r, "flags")?;
        }
        ExtraDataType::Teleport => {
            entry.read_ref_id(ctx, r, "door")?;
            entry.read_floats(r, "position", 3)?;
            entry.read_floats(r, "rotation", 3)?;
        }
        ExtraDataType::MapMarker => {
            entry.read_u8(r, "flags")?;
            entry.read_wstring(r, "name")?;
        }
        ExtraDataType::Scale => {
            entry.read_f32(r, "scale")?;
        }
        ExtraDataType::Poison => {
            entry.read_ref_id(ctx, r, "poison")?;
            entry.read_i32(r, "count")?;
        }
        ExtraDataType::LinkedRef => {
            entry.read_vs_records(r, "links", |r, link| {
                link.read_ref_id(ctx, r, "keyword")?;
                link.read_ref_id(ctx, r, "target")?;
                Ok(())
            })?;
        }
        ExtraDataType::ActivateRef => {
            entry.read_vs_records(r, "parents", |r, parent| {
                parent.read_ref_id(ctx, r, "parent")?;
                parent.read_f32(r, "delay")?;
                Ok(())
            })?;
            entry.read_u8(r, "flags")?;
        }
        ExtraDataType::ObjectHealth => {
            entry.read_f32(r, "health")?;
        }
        ExtraDataType::FactionChanges => {
            entry.read_vs_records(r, "factions", |r, faction| {
                faction.read_ref_id(ctx, r, "faction")?;
                faction.read_i8(r, "rank")?;
                Ok(())
            })?;
            entry.read_u8(r, "unknown")?;
        }
        ExtraDataType::AliasInstanceArray => {
            entry.read_vs_records(r, "aliases", |r, alias| {
                alias.read_ref_id(ctx, r, "quest")?;
                alias.read_i32(r, "alias_id")?;
                Ok(())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::header::Game;
    use crate::plugins::PluginTable;
    use crate::refid::RefIdFactory;

    fn read(data: &[u8]) -> io::Result<GenericRecord> {
        let plugins = PluginTable::new(vec!["Skyrim.esm"], None).unwrap();
        let mut factory = RefIdFactory::new();
        let mut ctx = EssContext::new(Game::SkyrimLe, 74, &plugins, &[], &mut factory);
        let mut r = LittleEndianReader::new(Cursor::new(data));
        let mut record = GenericRecord::new();
        read_extra_list(&mut record, &mut r, "extra", &mut ctx)?;
        Ok(record)
    }

    #[test]
    fn mixed_entries_replay_exactly() {
        let mut data = vec![3 << 2];
        data.push(0x16);
        data.push(0x21);
        data.extend_from_slice(&[0x40, 0x00, 0x07]);
        data.push(0x5A);
        data.push(1 << 2);
        data.extend_from_slice(&[0x40, 0x00, 0x08, 0xFF]);
        data.push(0x00);

        let record = read(&data).unwrap();
        let entries = record.get_list("extra").unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].get_ref_id("owner").unwrap().form_id(), Some(7));
        assert_eq!(record.to_bytes(), data);
    }

    #[test]
    fn unknown_tag_fails() {
        let err = read(&[1 << 2, 0xEE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
