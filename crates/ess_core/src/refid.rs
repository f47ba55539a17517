use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::context::Analysis;
use crate::plugins::{PluginSlot, PluginTable};
use crate::reader::emit_u24_be;

const TYPE_SHIFT: u32 = 22;
const DATA_MASK: u32 = (1 << TYPE_SHIFT) - 1;
const CREATED_PREFIX: u32 = 0xFF00_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RefIdType {
    // 1-based index into the container's form id array.
    FormIndexed,
    Default,
    // Created at runtime; owned by no plugin.
    Created,
    Invalid,
}

impl RefIdType {
    fn from_raw(raw: u32) -> Self {
        match (raw >> TYPE_SHIFT) & 0x3 {
            0 => Self::FormIndexed,
            1 => Self::Default,
            2 => Self::Created,
            _ => Self::Invalid,
        }
    }
}

/// Compact three-byte object reference.
///
/// Identity is the raw packed value. The absolute form id and owning plugin
/// are worked out once, when the id is first produced by a container's
/// [`RefIdFactory`], and travel with the value afterwards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefId {
    raw: u32,
    form_id: Option<u32>,
    plugin: Option<PluginSlot>,
}

impl RefId {
    pub const SIZE: usize = 3;

    pub fn unresolved(raw: u32) -> Self {
        Self {
            raw: raw & 0x00FF_FFFF,
            form_id: None,
            plugin: None,
        }
    }

    fn resolve(raw: u32, form_ids: &[u32], plugins: &PluginTable) -> Self {
        let raw = raw & 0x00FF_FFFF;
        let data = raw & DATA_MASK;
        let (form_id, plugin) = match RefIdType::from_raw(raw) {
            // Index 0 is the null reference; the array itself is 1-based.
            RefIdType::FormIndexed if data == 0 => (Some(0), None),
            RefIdType::FormIndexed => match form_ids.get(data as usize - 1) {
                Some(&form_id) => (Some(form_id), plugins.slot_for_form_id(form_id)),
                None => (None, None),
            },
            RefIdType::Default => {
                let plugin = (!plugins.full().is_empty()).then_some(PluginSlot::Full(0));
                (Some(data), plugin)
            }
            RefIdType::Created => (Some(CREATED_PREFIX | data), None),
            RefIdType::Invalid => (None, None),
        };
        Self {
            raw,
            form_id,
            plugin,
        }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn ref_type(&self) -> RefIdType {
        RefIdType::from_raw(self.raw)
    }

    pub fn data(&self) -> u32 {
        self.raw & DATA_MASK
    }

    pub fn is_zero(&self) -> bool {
        self.data() == 0
    }

    pub fn form_id(&self) -> Option<u32> {
        self.form_id
    }

    pub fn plugin_slot(&self) -> Option<PluginSlot> {
        self.plugin
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        emit_u24_be(out, self.raw);
    }

    pub fn describe(&self, plugins: &PluginTable, analysis: Option<&dyn Analysis>) -> String {
        let plugin = self.plugin.and_then(|slot| plugins.get(slot));
        let mut out = match self.form_id {
            Some(id) => format!("{id:08x}"),
            None => format!("refid:{:06x}", self.raw),
        };
        if let (Some(analysis), Some(id)) = (analysis, self.form_id)
            && let Some(name) = analysis.name_of(plugin, id)
        {
            out = format!("{name} ({out})");
        }
        if let Some(plugin) = plugin {
            out.push_str(&format!(" [{}]", plugin.name));
        }
        out
    }
}

impl PartialEq for RefId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for RefId {}

impl Hash for RefId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for RefId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RefId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form_id {
            Some(id) => write!(f, "{id:08x}"),
            None => write!(f, "refid:{:06x}", self.raw),
        }
    }
}

/// Per-container interning table: the same raw value always yields the same
/// resolved `RefId`.
#[derive(Debug, Clone, Default)]
pub struct RefIdFactory {
    ids: HashMap<u32, RefId>,
}

impl RefIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make(&mut self, raw: u32, form_ids: &[u32], plugins: &PluginTable) -> RefId {
        *self
            .ids
            .entry(raw & 0x00FF_FFFF)
            .or_insert_with(|| RefId::resolve(raw, form_ids, plugins))
    }

    pub fn get(&self, raw: u32) -> Option<RefId> {
        self.ids.get(&(raw & 0x00FF_FFFF)).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
