use std::io::{self, Read, Seek};

use serde::Serialize;

use super::read_form_flags;
use crate::context::EssContext;
use crate::flags::Flags32;
use crate::reader::LittleEndianReader;
use crate::record::GenericRecord;
use crate::refid::RefId;
use crate::wstring::WString;

const BASE_DATA: usize = 1;
const AI_DATA: usize = 3;
const SPELL_LIST: usize = 4;
const FULL_NAME: usize = 5;
const FACTIONS: usize = 6;
const SKILLS: usize = 9;
const CLASS: usize = 10;
const FACE: usize = 11;
const DEFAULT_OUTFIT: usize = 12;
const SLEEP_OUTFIT: usize = 13;
const GENDER: usize = 24;
const RACE: usize = 25;

const AI_DATA_LEN: usize = 20;
const SKILL_COUNT: usize = 18;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorBase {
    record: GenericRecord,
}

impl ActorBase {
    pub(crate) fn read<R: Read + Seek>(
        r: &mut LittleEndianReader<R>,
        flags: Flags32,
        ctx: &mut EssContext<'_>,
    ) -> io::Result<Self> {
        let mut record = GenericRecord::new();
        read_form_flags(r, flags, &mut record)?;

        if flags.get(BASE_DATA) {
            record.read_record("base", |base| {
                base.read_i32(r, "flags")?;
                for name in [
                    "magicka_offset",
                    "stamina_offset",
                    "level",
                    "calc_min_level",
                    "calc_max_level",
                    "speed_multiplier",
                    "disposition_base",
                    "template_flags",
                    "health_offset",
                    "bleedout_override",
                ] {
                    base.read_i16(r, name)?;
                }
                Ok(())
            })?;
        }
        if flags.get(FACTIONS) {
            record.read_vs_records(r, "factions", |r, faction| {
                faction.read_ref_id(ctx, r, "faction")?;
                faction.read_i8(r, "rank")?;
                Ok(())
            })?;
        }
        if flags.get(SPELL_LIST) {
            record.read_vs_ref_ids(ctx, r, "spells")?;
            record.read_vs_ref_ids(ctx, r, "levelled_spells")?;
            record.read_vs_ref_ids(ctx, r, "shouts")?;
        }
        if flags.get(AI_DATA) {
            record.read_bytes(r, "ai", AI_DATA_LEN)?;
        }
        if flags.get(FULL_NAME) {
            record.read_wstring(r, "full_name")?;
        }
        if flags.get(SKILLS) {
            record.read_bytes(r, "skill_values", SKILL_COUNT)?;
            record.read_bytes(r, "skill_offsets", SKILL_COUNT)?;
        }
        if flags.get(CLASS) {
            record.read_ref_id(ctx, r, "class")?;
        }
        if flags.get(RACE) {
            record.read_ref_id(ctx, r, "race")?;
            record.read_ref_id(ctx, r, "original_race")?;
        }
        if flags.get(FACE) {
            record.read_record("face", |face| {
                face.read_ref_id(ctx, r, "hair_color")?;
                face.read_i32(r, "skin_tone")?;
                face.read_ref_id(ctx, r, "skin")?;
                face.read_vs_ref_ids(ctx, r, "head_parts")?;
                if face.read_u8(r, "has_morphs")? != 0 {
                    face.read_vs_floats(r, "morphs")?;
                }
                if face.read_u8(r, "has_presets")? != 0 {
                    face.read_vs_ints(r, "presets")?;
                }
                Ok(())
            })?;
        }
        if flags.get(GENDER) {
            record.read_u8(r, "gender")?;
        }
        if flags.get(DEFAULT_OUTFIT) {
            record.read_ref_id(ctx, r, "default_outfit")?;
        }
        if flags.get(SLEEP_OUTFIT) {
            record.read_ref_id(ctx, r, "sleep_outfit")?;
        }

        Ok(Self { record })
    }

    pub fn record(&self) -> &GenericRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut GenericRecord {
        &mut self.record
    }

    pub fn full_name(&self) -> Option<&WString> {
        self.record.get_wstring("full_name")
    }

    pub fn race(&self) -> Option<RefId> {
        self.record.get_ref_id("race")
    }

    pub fn factions(&self) -> Vec<(RefId, i8)> {
        self.record
            .get_list("factions")
            .unwrap_or_default()
            .iter()
            .filter_map(|f| Some((f.get_ref_id("faction")?, f.get_i32("rank")? as i8)))
            .collect()
    }

    pub fn level(&self) -> Option<i16> {
        self.record
            .get_record("base")
            .and_then(|b| b.get_i32("level"))
            .map(|l| l as i16)
    }
}
