use std::hash::{Hash, Hasher};
use std::io::{Read, Seek};

use serde::Serialize;

use crate::error::{EssError, Result};
use crate::reader::LittleEndianReader;
use crate::wstring::WString;

pub const MAX_FULL_PLUGINS: usize = 255;
pub const MAX_LITE_PLUGINS: usize = 4096;

// Top byte of a form id that routes it to the lightweight plugin space.
const LITE_FORM_PREFIX: u32 = 0xFE;
const LAST_FULL_PREFIX: u32 = 0xFD;

#[derive(Debug, Clone, Serialize)]
pub struct Plugin {
    pub name: WString,
    pub index: u16,
    pub lightweight: bool,
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_case(&other.name)
    }
}

impl Eq for Plugin {}

impl Hash for Plugin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.as_bytes().to_ascii_lowercase().hash(state);
    }
}

impl Plugin {
    // `0A` for full plugins, `FE:003` for lightweight ones.
    pub fn index_label(&self) -> String {
        if self.lightweight {
            format!("FE:{:03X}", self.index)
        } else {
            format!("{:02X}", self.index)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginSlot {
    Full(u8),
    Lite(u16),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginTable {
    full: Vec<Plugin>,
    lite: Option<Vec<Plugin>>,
}

impl PluginTable {
    pub fn new(full: Vec<&str>, lite: Option<Vec<&str>>) -> Result<Self> {
        if full.len() > MAX_FULL_PLUGINS {
            return Err(EssError::format(format!("{} full plugins", full.len())));
        }
        if lite.as_ref().is_some_and(|l| l.len() > MAX_LITE_PLUGINS) {
            return Err(EssError::format("too many lightweight plugins"));
        }
        Ok(Self {
            full: build_plugins(wide_names(full)?, false),
            lite: lite.map(|names| wide_names(names).map(|n| build_plugins(n, true))).transpose()?,
        })
    }

    /// Reads `[blockSize:u32][fullCount:u8][names…][liteCount:u16][names…]`,
    /// the lightweight part only when `supports_lite`. The block size is
    /// cross-checked against the bytes actually consumed.
    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>, supports_lite: bool) -> Result<Self> {
        let block_size = r.read_u32()? as u64;
        let start = r.position()?;

        let full_count = r.read_u8()? as usize;
        let mut full_names = Vec::with_capacity(full_count);
        for _ in 0..full_count {
            full_names.push(WString::read(r)?);
        }

        let lite = if supports_lite {
            let lite_count = r.read_u16()? as usize;
            if lite_count > MAX_LITE_PLUGINS {
                return Err(EssError::format(format!(
                    "lightweight plugin count {lite_count} exceeds {MAX_LITE_PLUGINS}"
                )));
            }
            let mut names = Vec::with_capacity(lite_count);
            for _ in 0..lite_count {
                names.push(WString::read(r)?);
            }
            Some(build_plugins(names, true))
        } else {
            None
        };

        let consumed = r.position()? - start;
        if consumed != block_size {
            return Err(EssError::format(format!(
                "plugin table declares {block_size} bytes but holds {consumed}"
            )));
        }

        Ok(Self {
            full: build_plugins(full_names, false),
            lite,
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&((self.size() - 4) as u32).to_le_bytes());
        out.push(self.full.len() as u8);
        for plugin in &self.full {
            plugin.name.emit(out);
        }
        if let Some(lite) = &self.lite {
            out.extend_from_slice(&(lite.len() as u16).to_le_bytes());
            for plugin in lite {
                plugin.name.emit(out);
            }
        }
    }

    pub fn size(&self) -> usize {
        let full: usize = self.full.iter().map(|p| p.name.size()).sum();
        let lite = self
            .lite
            .as_ref()
            .map(|l| 2 + l.iter().map(|p| p.name.size()).sum::<usize>())
            .unwrap_or(0);
        4 + 1 + full + lite
    }

    pub fn full(&self) -> &[Plugin] {
        &self.full
    }

    pub fn lite(&self) -> Option<&[Plugin]> {
        self.lite.as_deref()
    }

    pub fn len(&self) -> usize {
        self.full.len() + self.lite.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.full.iter().chain(self.lite.iter().flatten())
    }

    pub fn find(&self, name: &str) -> Option<&Plugin> {
        let wanted = WString::new(name).ok()?;
        self.iter().find(|p| p.name.eq_ignore_case(&wanted))
    }

    pub fn get(&self, slot: PluginSlot) -> Option<&Plugin> {
        match slot {
            PluginSlot::Full(i) => self.full.get(i as usize),
            PluginSlot::Lite(i) => self.lite.as_ref()?.get(i as usize),
        }
    }

    /// Top byte picks a full plugin, except `0xFE` which routes bits 12..23
    /// into the lightweight list. Anything that does not land on an existing
    /// plugin yields `None`.
    pub fn slot_for_form_id(&self, form_id: u32) -> Option<PluginSlot> {
        let prefix = form_id >> 24;
        let slot = if prefix == LITE_FORM_PREFIX {
            PluginSlot::Lite(((form_id >> 12) & 0xFFF) as u16)
        } else if prefix <= LAST_FULL_PREFIX {
            PluginSlot::Full(prefix as u8)
        } else {
            return None;
        };
        self.get(slot).map(|_| slot)
    }

    pub fn plugin_for_form_id(&self, form_id: u32) -> Option<&Plugin> {
        self.slot_for_form_id(form_id).and_then(|slot| self.get(slot))
    }
}

fn wide_names(names: Vec<&str>) -> Result<Vec<WString>> {
    names
        .into_iter()
        .map(|name| WString::new(name).map_err(|e| EssError::format(format!("plugin name: {e}"))))
        .collect()
}

fn build_plugins(names: Vec<WString>, lightweight: bool) -> Vec<Plugin> {
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| Plugin {
            name,
            index: index as u16,
            lightweight,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn table() -> PluginTable {
        PluginTable::new(
            vec!["Skyrim.esm", "Update.esm", "Dawnguard.esm"],
            Some(vec!["ccBGSSSE001-Fish.esl", "Tiny.esp"]),
        )
        .unwrap()
    }

    #[test]
    fn emit_and_read_agree_on_size() {
        let plugins = table();
        let mut out = Vec::new();
        plugins.emit(&mut out);
        assert_eq!(out.len(), plugins.size());

        let mut r = LittleEndianReader::new(Cursor::new(out.as_slice()));
        let back = PluginTable::read(&mut r, true).unwrap();
        assert_eq!(back, plugins);
        assert_eq!(back.lite().unwrap()[1].index_label(), "FE:001");
    }

    #[test]
    fn overlong_plugin_name_is_format_error() {
        let name = "a".repeat(70_000);
        let err = PluginTable::new(vec!["Skyrim.esm", name.as_str()], None).unwrap_err();
        assert!(matches!(err, EssError::Format(_)));
        assert!(table().find(&name).is_none());
    }

    #[test]
    fn block_size_mismatch_is_format_error() {
        let mut out = Vec::new();
        table().emit(&mut out);
        out[0] = out[0].wrapping_add(1);
        let mut r = LittleEndianReader::new(Cursor::new(out.as_slice()));
        assert!(matches!(PluginTable::read(&mut r, true), Err(EssError::Format(_))));
    }

    #[test]
    fn routes_form_ids_to_plugins() {
        let plugins = table();
        assert_eq!(plugins.plugin_for_form_id(0x0000_0014).unwrap().name.to_string(), "Skyrim.esm");
        assert_eq!(plugins.plugin_for_form_id(0x0200_1234).unwrap().name.to_string(), "Dawnguard.esm");
        assert_eq!(
            plugins.plugin_for_form_id(0xFE00_1800).unwrap().name.to_string(),
            "Tiny.esp"
        );
        assert!(plugins.plugin_for_form_id(0x0300_0001).is_none());
        assert!(plugins.plugin_for_form_id(0xFE00_2800).is_none());
        assert!(plugins.plugin_for_form_id(0xFF00_0001).is_none());
    }

    #[test]
    fn names_compare_case_insensitively() {
        let plugins = table();
        let a = plugins.find("skyrim.ESM").unwrap();
        assert_eq!(a, &plugins.full()[0]);
    }
}
