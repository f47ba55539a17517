use std::io::{self, Read, Seek};

use serde::Serialize;

use super::read_form_flags;
use crate::context::EssContext;
use crate::flags::Flags32;
use crate::reader::LittleEndianReader;
use crate::record::{GenericRecord, Value};
use crate::refid::RefId;

const ADDED_FORM: usize = 31;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormList {
    record: GenericRecord,
}

impl FormList {
    pub(crate) fn read<R: Read + Seek>(
        r: &mut LittleEndianReader<R>,
        flags: Flags32,
        ctx: &mut EssContext<'_>,
    ) -> io::Result<Self> {
        let mut record = GenericRecord::new();
        read_form_flags(r, flags, &mut record)?;
        if flags.get(ADDED_FORM) {
            let count = record.read_i32(r, "count")?;
            if count < 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("negative form list count {count}"),
                ));
            }
            record.read_ref_ids(ctx, r, "forms", count as usize)?;
        }
        Ok(Self { record })
    }

    pub fn record(&self) -> &GenericRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut GenericRecord {
        &mut self.record
    }

    pub fn forms(&self) -> &[RefId] {
        self.record.get_ref_ids("forms").unwrap_or_default()
    }

    /// Drops null entries and returns how many were removed.
    pub fn cleanse(&mut self) -> usize {
        let Some(Value::RefIdVec(forms)) = self.record.get_mut("forms") else {
            return 0;
        };
        let before = forms.len();
        forms.retain(|id| !id.is_zero());
        let kept = forms.len();
        let removed = before - kept;
        if removed > 0 {
            self.record.insert("count", kept as i32);
        }
        removed
    }
}
