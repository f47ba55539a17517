use serde::{Deserialize, Serialize};

use crate::compression::CompressionType;
use crate::header::Game;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub game: Game,
    pub version: u32,
    pub form_version: u8,
    pub version_string: Option<String>,
    pub save_number: u32,
    pub player_name: String,
    pub player_level: u32,
    pub player_location: String,
    pub game_date: String,
    pub player_race: String,
    pub player_sex: u16,
    pub player_current_xp: f32,
    pub player_level_up_xp: f32,
    pub screenshot_width: u32,
    pub screenshot_height: u32,
    pub compression: CompressionType,
    pub file_size: usize,
    pub digest: u32,
    pub plugin_count: usize,
    pub lite_plugin_count: Option<usize>,
    pub change_form_count: usize,
    pub global_variable_count: usize,
    pub table1_count: usize,
    pub table2_count: usize,
    pub table3_count: usize,
    pub form_id_count: usize,
    pub worldspace_count: usize,
    pub unknown_tail_size: usize,
    pub has_co_save: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityIssue {
    /// Part of the file could not be read; writing back is refused.
    Truncated,
    /// Decoded change-form bodies are views; writes always use the raw bytes.
    DecodedBodiesReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub can_query: bool,
    pub can_save: bool,
    pub can_recompress: bool,
    pub issues: Vec<CapabilityIssue>,
}

impl Capabilities {
    pub fn for_save(game: Game, truncated: bool) -> Self {
        let mut issues = vec![CapabilityIssue::DecodedBodiesReadOnly];
        if truncated {
            issues.insert(0, CapabilityIssue::Truncated);
        }
        Self {
            can_query: true,
            can_save: !truncated,
            can_recompress: !truncated && game.has_compression_field(),
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginEntry {
    pub index: String,
    pub name: String,
    pub lightweight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeFormSummary {
    pub refid: String,
    pub form_id: Option<u32>,
    pub plugin: Option<String>,
    pub kind: String,
    pub flags: u32,
    pub version: u8,
    pub size: usize,
    pub compressed: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalBlockSummary {
    pub table: u8,
    pub type_code: u32,
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalVariableEntry {
    pub refid: String,
    pub value: f32,
}
