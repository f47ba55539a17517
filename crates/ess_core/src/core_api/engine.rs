use std::path::Path;

use crate::changeform::{Body, DecodeMode};
use crate::compression::CompressionType;
use crate::context::Analysis;
use crate::ess::{DecodeStats, Ess, ReadOptions};
use crate::globals::GlobalData;
use crate::header::Game;

use super::error::{CoreError, CoreErrorCode};
use super::types::{
    Capabilities, ChangeFormSummary, GlobalBlockSummary, GlobalVariableEntry, PluginEntry, Snapshot,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine {
    options: ReadOptions,
}

#[derive(Debug)]
pub struct Session {
    snapshot: Snapshot,
    capabilities: Capabilities,
    ess: Ess,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ReadOptions {
        self.options
    }

    pub fn open_bytes<B: AsRef<[u8]>>(&self, bytes: B) -> Result<Session, CoreError> {
        let ess = Ess::read_bytes(bytes.as_ref(), self.options).map_err(|e| {
            let mut err = CoreError::from(e);
            err.message = format!("failed to parse save: {}", err.message);
            err
        })?;
        Ok(Session::new(ess))
    }

    pub fn open_path(&self, path: impl AsRef<Path>) -> Result<Session, CoreError> {
        let path = path.as_ref();
        let ess = Ess::read_path(path, self.options).map_err(|e| {
            let mut err = CoreError::from(e);
            err.message = format!("failed to read {}: {}", path.display(), err.message);
            err
        })?;
        Ok(Session::new(ess))
    }
}

impl Session {
    fn new(ess: Ess) -> Self {
        let snapshot = snapshot_of(&ess);
        let capabilities = Capabilities::for_save(ess.game(), ess.is_truncated());
        Self {
            snapshot,
            capabilities,
            ess,
        }
    }

    pub fn game(&self) -> Game {
        self.ess.game()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn ess(&self) -> &Ess {
        &self.ess
    }

    pub fn plugins(&self) -> Vec<PluginEntry> {
        self.ess
            .plugins()
            .iter()
            .map(|p| PluginEntry {
                index: p.index_label(),
                name: p.name.to_string(),
                lightweight: p.lightweight,
            })
            .collect()
    }

    pub fn change_form_summaries(&self, analysis: Option<&dyn Analysis>) -> Vec<ChangeFormSummary> {
        let plugins = self.ess.plugins();
        self.ess
            .change_forms()
            .iter()
            .map(|form| ChangeFormSummary {
                refid: form.refid.to_string(),
                form_id: form.refid.form_id(),
                plugin: form
                    .refid
                    .plugin_slot()
                    .and_then(|slot| plugins.get(slot))
                    .map(|p| p.name.to_string()),
                kind: form.type_name().into_owned(),
                flags: form.flags.raw(),
                version: form.version,
                size: form.size(),
                compressed: form.is_compressed(),
                description: form.describe(plugins, analysis),
            })
            .collect()
    }

    pub fn global_blocks(&self) -> Vec<GlobalBlockSummary> {
        let summarize = |table: u8, blocks: &[GlobalData]| {
            blocks
                .iter()
                .map(move |b| GlobalBlockSummary {
                    table,
                    type_code: b.type_code,
                    name: b.name().to_string(),
                    size: b.size(),
                })
                .collect::<Vec<_>>()
        };
        let mut out = summarize(1, self.ess.table1());
        out.extend(summarize(2, self.ess.table2()));
        out.extend(summarize(3, self.ess.table3()));
        out
    }

    pub fn global_variables(&self) -> Vec<GlobalVariableEntry> {
        self.ess
            .global_variables()
            .variables
            .iter()
            .map(|v| GlobalVariableEntry {
                refid: v.refid.to_string(),
                value: v.value,
            })
            .collect()
    }

    /// Policy the session decodes change forms with, taken from the
    /// engine's read options.
    pub fn decode_mode(&self) -> DecodeMode {
        self.ess.options().decode
    }

    pub fn decode_all(&mut self) -> DecodeStats {
        let mode = self.decode_mode();
        self.ess.decode_all(mode)
    }

    pub fn decode(&mut self, raw: u32) -> Result<Option<&Body>, CoreError> {
        let mode = self.decode_mode();
        let refid = self.ess.make_ref_id(raw);
        Ok(self.ess.decode_change_form(&refid, mode)?)
    }

    pub fn set_compression(&mut self, kind: CompressionType) -> Result<(), CoreError> {
        self.ess
            .set_compression(kind)
            .map_err(|e| CoreError::new(CoreErrorCode::UnsupportedOperation, e.to_string()))?;
        self.snapshot.compression = kind;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(self.ess.to_bytes()?)
    }

    pub fn write_path(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        Ok(self.ess.write_path(path)?)
    }
}

fn snapshot_of(ess: &Ess) -> Snapshot {
    let header = ess.header();
    Snapshot {
        game: header.game,
        version: header.version,
        form_version: ess.form_version(),
        version_string: ess.version_string().map(ToString::to_string),
        save_number: header.save_number,
        player_name: header.player_name.to_string(),
        player_level: header.player_level,
        player_location: header.player_location.to_string(),
        game_date: header.game_date.to_string(),
        player_race: header.player_race.to_string(),
        player_sex: header.player_sex,
        player_current_xp: header.player_current_xp,
        player_level_up_xp: header.player_level_up_xp,
        screenshot_width: header.screenshot_width,
        screenshot_height: header.screenshot_height,
        compression: header.compression,
        file_size: ess.original_size(),
        digest: ess.digest(),
        plugin_count: ess.plugins().full().len(),
        lite_plugin_count: ess.plugins().lite().map(<[_]>::len),
        change_form_count: ess.change_forms().len(),
        global_variable_count: ess.global_variables().len(),
        table1_count: ess.table1().len(),
        table2_count: ess.table2().len(),
        table3_count: ess.table3().len(),
        form_id_count: ess.form_ids().len(),
        worldspace_count: ess.worldspaces().len(),
        unknown_tail_size: ess.unknown_tail().len(),
        has_co_save: ess.co_save().is_some(),
        truncated: ess.is_truncated(),
    }
}
