use std::io::{self, Cursor, Read, Seek};
use std::ops::Range;

use serde::Serialize;

use crate::context::EssContext;
use crate::error::{EssError, Result};
use crate::reader::LittleEndianReader;
use crate::refid::RefId;
use crate::vsval::VarSizeInt;

pub const TABLE1_TYPES: Range<u32> = 0..100;
pub const TABLE2_TYPES: Range<u32> = 100..1000;
pub const TABLE3_TYPES: Range<u32> = 1000..1100;

pub const GLOBAL_VARIABLES_TYPE: u32 = 3;
pub const PAPYRUS_TYPE: u32 = 1001;
pub const ANIM_OBJECTS_TYPE: u32 = 1002;

/// One entry of a metadata table: `[type:u32][length:u32][data]`.
///
/// The data is kept as raw bytes and written back verbatim, so block types
/// this crate knows nothing about survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalData {
    pub type_code: u32,
    pub data: Vec<u8>,
}

impl GlobalData {
    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>, allowed: &Range<u32>) -> Result<Self> {
        let type_code = r.read_u32()?;
        if !allowed.contains(&type_code) {
            return Err(EssError::format(format!(
                "metadata block type {type_code} outside {}..{}",
                allowed.start, allowed.end
            )));
        }
        let len = r.read_u32()? as usize;
        let data = r.read_bytes(len)?;
        Ok(Self { type_code, data })
    }

    /// Salvages whatever is left of a block that could not be read in full,
    /// starting again from `start`. Returns `None` when not even the type
    /// field is there.
    pub fn read_partial<R: Read + Seek>(r: &mut LittleEndianReader<R>, start: u64) -> Option<Self> {
        r.seek_to(start).ok()?;
        let type_code = r.read_u32().ok()?;
        let _declared = r.read_u32().ok();
        let data = r.read_to_end().unwrap_or_default();
        Some(Self { type_code, data })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.type_code.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    pub fn size(&self) -> usize {
        8 + self.data.len()
    }

    pub fn name(&self) -> &'static str {
        block_name(self.type_code)
    }
}

pub fn block_name(type_code: u32) -> &'static str {
    match type_code {
        0 => "Misc Stats",
        1 => "Player Location",
        2 => "TES",
        3 => "Global Variables",
        4 => "Created Objects",
        5 => "Effects",
        6 => "Weather",
        7 => "Audio",
        8 => "SkyCells",
        100 => "Process Lists",
        101 => "Combat",
        102 => "Interface",
        103 => "Actor Causes",
        105 => "Detection Manager",
        106 => "Location MetaData",
        107 => "Quest Static Data",
        108 => "StoryTeller",
        109 => "Magic Favorites",
        110 => "PlayerControls",
        111 => "Story Event Manager",
        112 => "Ingredient Shared",
        113 => "MenuControls",
        114 => "MenuTopicManager",
        1000 => "Temp Effects",
        1001 => "Papyrus",
        1002 => "Anim Objects",
        1003 => "Timer",
        1004 => "Synchronized Animations",
        1005 => "Main",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalVariable {
    pub refid: RefId,
    pub value: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalVariableTable {
    pub variables: Vec<GlobalVariable>,
}

impl GlobalVariableTable {
    pub fn parse(data: &[u8], ctx: &mut EssContext<'_>) -> io::Result<Self> {
        let mut r = LittleEndianReader::new(Cursor::new(data));
        let count = VarSizeInt::read(&mut r)?.as_usize();
        r.ensure_available(count.saturating_mul(RefId::SIZE + 4))?;
        let mut variables = Vec::with_capacity(count);
        for _ in 0..count {
            let refid = ctx.read_ref_id(&mut r)?;
            let value = r.read_f32()?;
            variables.push(GlobalVariable { refid, value });
        }
        if r.remaining()? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} trailing bytes after global variables", r.remaining()?),
            ));
        }
        Ok(Self { variables })
    }

    pub fn emit(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let count = VarSizeInt::try_from(self.variables.len())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        count.emit(out);
        for var in &self.variables {
            var.refid.emit(out);
            out.extend_from_slice(&var.value.to_le_bytes());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
