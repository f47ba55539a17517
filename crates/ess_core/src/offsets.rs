use std::io::{Read, Seek};

use serde::Serialize;

use crate::error::{EssError, Result};
use crate::header::Game;
use crate::layout::{FileLayout, RegionId};
use crate::reader::LittleEndianReader;

pub const OFFSET_TABLE_SIZE: usize = 100;
const RESERVED_COUNT: usize = 15;

/// Absolute offsets and element counts of the container's variable regions.
///
/// Trusted as-is when reading; rebuilt from the in-memory sizes before every
/// write. Region sizes are never stored, only derived from neighbouring
/// offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OffsetTable {
    pub form_id_array_count_offset: u32,
    pub unknown_table3_offset: u32,
    pub table1_offset: u32,
    pub table2_offset: u32,
    pub change_forms_offset: u32,
    pub table3_offset: u32,
    pub table1_count: u32,
    pub table2_count: u32,
    // Real number of table3 blocks. Skyrim stores one less on disk.
    pub table3_count: u32,
    pub change_form_count: u32,
    pub reserved: [u32; RESERVED_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionCounts {
    pub table1: usize,
    pub table2: usize,
    pub table3: usize,
    pub change_forms: usize,
}

impl OffsetTable {
    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>, game: Game) -> Result<Self> {
        let form_id_array_count_offset = r.read_u32()?;
        let unknown_table3_offset = r.read_u32()?;
        let table1_offset = r.read_u32()?;
        let table2_offset = r.read_u32()?;
        let change_forms_offset = r.read_u32()?;
        let table3_offset = r.read_u32()?;
        let table1_count = r.read_u32()?;
        let table2_count = r.read_u32()?;
        let stored_table3_count = r.read_u32()?;
        let change_form_count = r.read_u32()?;
        let mut reserved = [0u32; RESERVED_COUNT];
        for slot in &mut reserved {
            *slot = r.read_u32()?;
        }

        // Skyrim writes one less than the number of table3 blocks.
        let table3_count = if game.is_skyrim() {
            stored_table3_count
                .checked_add(1)
                .ok_or_else(|| EssError::format("table3 count overflows"))?
        } else {
            stored_table3_count
        };

        let table = Self {
            form_id_array_count_offset,
            unknown_table3_offset,
            table1_offset,
            table2_offset,
            change_forms_offset,
            table3_offset,
            table1_count,
            table2_count,
            table3_count,
            change_form_count,
            reserved,
        };
        table.check_order()?;
        Ok(table)
    }

    pub fn emit(&self, out: &mut Vec<u8>, game: Game) {
        let stored_table3_count = if game.is_skyrim() {
            self.table3_count.saturating_sub(1)
        } else {
            self.table3_count
        };
        for v in [
            self.form_id_array_count_offset,
            self.unknown_table3_offset,
            self.table1_offset,
            self.table2_offset,
            self.change_forms_offset,
            self.table3_offset,
            self.table1_count,
            self.table2_count,
            stored_table3_count,
            self.change_form_count,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.reserved {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn size(&self) -> usize {
        OFFSET_TABLE_SIZE
    }

    /// Recomputes every offset and count from a layout of the container as
    /// it would be written now. Reserved words are left untouched.
    pub fn rebuild(&mut self, layout: &FileLayout, counts: RegionCounts) -> Result<()> {
        let offset = |id| -> Result<u32> {
            let start = layout.start_of(id)?;
            u32::try_from(start).map_err(|_| EssError::format(format!("{id:?} offset exceeds u32")))
        };
        let count = |n: usize| -> Result<u32> {
            u32::try_from(n).map_err(|_| EssError::format("region count exceeds u32"))
        };

        self.table1_offset = offset(RegionId::Table1)?;
        self.table2_offset = offset(RegionId::Table2)?;
        self.change_forms_offset = offset(RegionId::ChangeForms)?;
        self.table3_offset = offset(RegionId::Table3)?;
        self.form_id_array_count_offset = offset(RegionId::FormIdArray)?;
        self.unknown_table3_offset = offset(RegionId::WorldspaceArray)?;
        self.table1_count = count(counts.table1)?;
        self.table2_count = count(counts.table2)?;
        self.table3_count = count(counts.table3)?;
        self.change_form_count = count(counts.change_forms)?;
        Ok(())
    }

    pub fn table1_size(&self) -> u32 {
        self.table2_offset.saturating_sub(self.table1_offset)
    }

    pub fn table2_size(&self) -> u32 {
        self.change_forms_offset.saturating_sub(self.table2_offset)
    }

    pub fn change_forms_size(&self) -> u32 {
        self.table3_offset.saturating_sub(self.change_forms_offset)
    }

    pub fn table3_size(&self) -> u32 {
        self.form_id_array_count_offset.saturating_sub(self.table3_offset)
    }

    fn check_order(&self) -> Result<()> {
        let ordered = [
            self.table1_offset,
            self.table2_offset,
            self.change_forms_offset,
            self.table3_offset,
            self.form_id_array_count_offset,
            self.unknown_table3_offset,
        ];
        if ordered.windows(2).any(|w| w[0] > w[1]) {
            return Err(EssError::format(format!(
                "offset table regions out of order: {ordered:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample() -> OffsetTable {
        OffsetTable {
            form_id_array_count_offset: 500,
            unknown_table3_offset: 520,
            table1_offset: 200,
            table2_offset: 250,
            change_forms_offset: 300,
            table3_offset: 400,
            table1_count: 2,
            table2_count: 1,
            table3_count: 3,
            change_form_count: 4,
            reserved: [0; RESERVED_COUNT],
        }
    }

    #[test]
    fn wire_size_is_fixed() {
        let mut out = Vec::new();
        sample().emit(&mut out, Game::Fallout4);
        assert_eq!(out.len(), OFFSET_TABLE_SIZE);
        assert_eq!(sample().size(), OFFSET_TABLE_SIZE);
    }

    #[test]
    fn skyrim_stores_table3_count_minus_one() {
        let table = sample();
        let mut out = Vec::new();
        table.emit(&mut out, Game::SkyrimLe);
        assert_eq!(&out[32..36], &2u32.to_le_bytes());

        let back = OffsetTable::read(&mut LittleEndianReader::new(Cursor::new(out.as_slice())), Game::SkyrimLe)
            .unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn derived_sizes() {
        let t = sample();
        assert_eq!(t.table1_size(), 50);
        assert_eq!(t.table2_size(), 50);
        assert_eq!(t.change_forms_size(), 100);
        assert_eq!(t.table3_size(), 100);
    }

    #[test]
    fn rejects_out_of_order_offsets() {
        let mut t = sample();
        t.table2_offset = 100;
        let mut out = Vec::new();
        t.emit(&mut out, Game::Fallout4);
        let err = OffsetTable::read(&mut LittleEndianReader::new(Cursor::new(out.as_slice())), Game::Fallout4);
        assert!(matches!(err, Err(EssError::Format(_))));
    }

    #[test]
    fn rebuild_takes_offsets_from_layout() {
        let layout = FileLayout::from_sizes(&[
            (RegionId::Header, 40),
            (RegionId::FormVersion, 1),
            (RegionId::VersionString, 0),
            (RegionId::PluginTable, 9),
            (RegionId::OffsetTable, OFFSET_TABLE_SIZE),
            (RegionId::Table1, 16),
            (RegionId::Table2, 8),
            (RegionId::ChangeForms, 30),
            (RegionId::Table3, 12),
            (RegionId::FormIdArray, 8),
            (RegionId::WorldspaceArray, 4),
            (RegionId::UnknownTail, 0),
        ]);
        let mut t = OffsetTable::default();
        t.reserved[3] = 77;
        t.rebuild(
            &layout,
            RegionCounts {
                table1: 2,
                table2: 1,
                table3: 1,
                change_forms: 3,
            },
        )
        .unwrap();
        assert_eq!(t.table1_offset, 150);
        assert_eq!(t.table2_offset, 166);
        assert_eq!(t.change_forms_offset, 174);
        assert_eq!(t.table3_offset, 204);
        assert_eq!(t.form_id_array_count_offset, 216);
        assert_eq!(t.unknown_table3_offset, 224);
        assert_eq!(t.change_form_count, 3);
        assert_eq!(t.reserved[3], 77);
    }
}
