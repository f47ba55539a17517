use std::io::{self, Read, Seek};

use serde::Serialize;

use super::extra::read_extra_list;
use super::read_form_flags;
use crate::context::EssContext;
use crate::flags::Flags32;
use crate::reader::LittleEndianReader;
use crate::record::GenericRecord;
use crate::refid::{RefId, RefIdType};

const MOVE: usize = 1;
const HAVOK_MOVE: usize = 2;
const CELL_CHANGED: usize = 3;
const SCALE: usize = 4;
const INVENTORY: usize = 5;
const BASE_OBJECT: usize = 7;
const PROMOTED: usize = 25;
const LEVELED_INVENTORY: usize = 27;
const ANIMATION: usize = 28;

// Any of these bits means an extra-data list follows the move data.
const EXTRA_DATA_BITS: [usize; 10] = [6, 10, 11, 12, 21, 22, 23, 26, 29, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InitialType {
    Stationary = 0,
    Moved = 4,
    Created = 5,
    Relocated = 6,
}

impl InitialType {
    pub fn select(refid: RefId, flags: Flags32) -> Self {
        if refid.ref_type() == RefIdType::Created {
            Self::Created
        } else if flags.get(PROMOTED) || flags.get(CELL_CHANGED) {
            Self::Relocated
        } else if flags.get(HAVOK_MOVE) || flags.get(MOVE) {
            Self::Moved
        } else {
            Self::Stationary
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// REFR and ACHR body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    initial_type: InitialType,
    record: GenericRecord,
}

impl Reference {
    pub(crate) fn read<R: Read + Seek>(
        r: &mut LittleEndianReader<R>,
        refid: RefId,
        flags: Flags32,
        ctx: &mut EssContext<'_>,
    ) -> io::Result<Self> {
        let initial_type = InitialType::select(refid, flags);
        let mut record = GenericRecord::new();

        if initial_type != InitialType::Stationary {
            record.read_record("initial", |init| {
                read_placement(init, r, ctx)?;
                match initial_type {
                    InitialType::Created => {
                        init.read_u8(r, "unknown")?;
                        init.read_ref_id(ctx, r, "base_object")?;
                    }
                    InitialType::Relocated => {
                        init.read_ref_id(ctx, r, "starting_cell")?;
                    }
                    InitialType::Moved | InitialType::Stationary => {}
                }
                Ok(())
            })?;
        }

        if flags.get(HAVOK_MOVE) {
            record.read_vs_bytes(r, "havok")?;
        }
        read_form_flags(r, flags, &mut record)?;
        if flags.get(BASE_OBJECT) {
            record.read_ref_id(ctx, r, "base_object")?;
        }
        if flags.get(SCALE) {
            record.read_f32(r, "scale")?;
        }
        if flags.get(MOVE) {
            record.read_record("move", |mv| read_placement(mv, r, ctx))?;
        }
        if flags.any(&EXTRA_DATA_BITS) {
            read_extra_list(&mut record, r, "extra_data", ctx)?;
        }
        if flags.get(INVENTORY) || flags.get(LEVELED_INVENTORY) {
            record.read_vs_records(r, "inventory", |r, item| {
                item.read_ref_id(ctx, r, "item")?;
                item.read_i32(r, "count")?;
                read_extra_list(item, r, "extra", ctx)
            })?;
        }
        if flags.get(ANIMATION) {
            record.read_vs_bytes(r, "animation")?;
        }

        Ok(Self {
            initial_type,
            record,
        })
    }

    pub fn initial_type(&self) -> InitialType {
        self.initial_type
    }

    pub fn record(&self) -> &GenericRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut GenericRecord {
        &mut self.record
    }

    pub fn base_object(&self) -> Option<RefId> {
        self.record.get_ref_id("base_object").or_else(|| {
            self.record
                .get_record("initial")
                .and_then(|init| init.get_ref_id("base_object"))
        })
    }

    pub fn position(&self) -> Option<&[f32]> {
        self.record
            .get_record("move")
            .or_else(|| self.record.get_record("initial"))
            .and_then(|p| p.get_floats("position"))
    }

    pub fn inventory_len(&self) -> usize {
        self.record.get_list("inventory").map_or(0, <[_]>::len)
    }
}

fn read_placement<R: Read + Seek>(
    rec: &mut GenericRecord,
    r: &mut LittleEndianReader<R>,
    ctx: &mut EssContext<'_>,
) -> io::Result<()> {
    rec.read_ref_id(ctx, r, "cell")?;
    rec.read_floats(r, "position", 3)?;
    rec.read_floats(r, "rotation", 3)?;
    Ok(())
}
