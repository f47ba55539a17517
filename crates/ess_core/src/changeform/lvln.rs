use std::io::{self, Read, Seek};

use serde::Serialize;

use super::read_form_flags;
use crate::context::EssContext;
use crate::flags::Flags32;
use crate::reader::LittleEndianReader;
use crate::record::GenericRecord;
use crate::refid::RefId;

const ADDED_OBJECT: usize = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeveledEntry {
    pub level: u8,
    pub refid: RefId,
    pub count: i16,
    pub chance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeveledList {
    record: GenericRecord,
}

impl LeveledList {
    pub(crate) fn read<R: Read + Seek>(
        r: &mut LittleEndianReader<R>,
        flags: Flags32,
        ctx: &mut EssContext<'_>,
    ) -> io::Result<Self> {
        let mut record = GenericRecord::new();
        read_form_flags(r, flags, &mut record)?;
        if flags.get(ADDED_OBJECT) {
            let count = record.read_u8(r, "count")? as usize;
            record.read_records(r, "entries", count, |r, entry| {
                entry.read_u8(r, "level")?;
                entry.read_ref_id(ctx, r, "refid")?;
                entry.read_i16(r, "count")?;
                entry.read_u8(r, "chance")?;
                Ok(())
            })?;
        }
        Ok(Self { record })
    }

    pub fn record(&self) -> &GenericRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut GenericRecord {
        &mut self.record
    }

    pub fn entries(&self) -> Vec<LeveledEntry> {
        self.record
            .get_list("entries")
            .unwrap_or_default()
            .iter()
            .filter_map(|e| {
                Some(LeveledEntry {
                    level: e.get_u8("level")?,
                    refid: e.get_ref_id("refid")?,
                    count: e.get_i32("count")? as i16,
                    chance: e.get_u8("chance")?,
                })
            })
            .collect()
    }
}
