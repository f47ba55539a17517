use std::collections::BTreeMap;
use std::fmt::Write as _;

use ess_core::DecodeStats;
use ess_core::core_api::{ChangeFormSummary, GlobalBlockSummary, Session};
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 18;
const BLOCK_NAME_WIDTH: usize = 24;
const FORM_KIND_WIDTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// List every change form instead of per-type counts.
    pub verbose: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelection {
    pub header: bool,
    pub plugins: bool,
    pub globals: bool,
    pub global_variables: bool,
    pub change_forms: bool,
    pub capabilities: bool,
}

impl FieldSelection {
    pub fn is_any_selected(&self) -> bool {
        self.header
            || self.plugins
            || self.globals
            || self.global_variables
            || self.change_forms
            || self.capabilities
    }
}

pub fn render_json_full(session: &Session, style: JsonStyle) -> JsonValue {
    let all = FieldSelection {
        header: true,
        plugins: true,
        globals: true,
        global_variables: true,
        change_forms: true,
        capabilities: true,
    };
    render_json_selected(session, &all, style)
}

pub fn render_json_selected(session: &Session, fields: &FieldSelection, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(selected_json(fields, session)),
    }
}

/// JSON for the outcome of a bulk decode pass.
pub fn render_decode_stats_json(stats: &DecodeStats) -> JsonValue {
    let failed: Vec<JsonValue> = stats
        .failed
        .iter()
        .map(|(refid, reason)| {
            let mut entry = JsonMap::new();
            entry.insert("refid".to_string(), JsonValue::String(refid.clone()));
            entry.insert("reason".to_string(), JsonValue::String(reason.clone()));
            JsonValue::Object(entry)
        })
        .collect();

    let mut out = JsonMap::new();
    out.insert("typed".to_string(), JsonValue::from(stats.typed));
    out.insert("opaque".to_string(), JsonValue::from(stats.opaque));
    out.insert("fallback".to_string(), JsonValue::from(stats.fallback));
    out.insert("failed".to_string(), JsonValue::Array(failed));
    JsonValue::Object(out)
}

pub fn render_text(session: &Session, style: TextStyle) -> String {
    render_text_with_options(session, style, TextRenderOptions::default())
}

pub fn render_text_with_options(session: &Session, style: TextStyle, options: TextRenderOptions) -> String {
    match style {
        TextStyle::Summary => render_summary(session, options),
    }
}

pub fn render_decode_stats_text(stats: &DecodeStats) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "Decoded: {} typed, {} opaque, {} fallback, {} failed",
        stats.typed,
        stats.opaque,
        stats.fallback,
        stats.failed.len()
    )
    .expect("writing to String cannot fail");
    for (refid, reason) in &stats.failed {
        writeln!(out, "  {refid}: {reason}").expect("writing to String cannot fail");
    }
    out
}

fn selected_json(fields: &FieldSelection, session: &Session) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();

    if fields.header {
        out.insert("header".to_string(), header_to_json(session));
    }
    if fields.plugins {
        out.insert("plugins".to_string(), plugins_to_json(session));
    }
    if fields.globals {
        out.insert("globals".to_string(), globals_to_json(&session.global_blocks()));
    }
    if fields.global_variables {
        let vars: Vec<JsonValue> = session
            .global_variables()
            .into_iter()
            .map(|v| {
                let mut entry = JsonMap::new();
                entry.insert("refid".to_string(), JsonValue::String(v.refid));
                entry.insert("value".to_string(), JsonValue::from(v.value));
                JsonValue::Object(entry)
            })
            .collect();
        out.insert("global_variables".to_string(), JsonValue::Array(vars));
    }
    if fields.change_forms {
        out.insert(
            "change_forms".to_string(),
            change_forms_to_json(&session.change_form_summaries(None)),
        );
    }
    if fields.capabilities {
        let caps = session.capabilities();
        let mut entry = JsonMap::new();
        entry.insert("can_query".to_string(), JsonValue::Bool(caps.can_query));
        entry.insert("can_save".to_string(), JsonValue::Bool(caps.can_save));
        entry.insert("can_recompress".to_string(), JsonValue::Bool(caps.can_recompress));
        entry.insert(
            "issues".to_string(),
            JsonValue::Array(
                caps.issues
                    .iter()
                    .map(|issue| JsonValue::String(format!("{issue:?}")))
                    .collect(),
            ),
        );
        out.insert("capabilities".to_string(), JsonValue::Object(entry));
    }

    out
}

fn header_to_json(session: &Session) -> JsonValue {
    let snapshot = session.snapshot();
    let mut out = JsonMap::new();
    out.insert("game".to_string(), JsonValue::String(snapshot.game.as_str().to_string()));
    out.insert("version".to_string(), JsonValue::from(snapshot.version));
    out.insert("form_version".to_string(), JsonValue::from(snapshot.form_version));
    out.insert(
        "version_string".to_string(),
        snapshot
            .version_string
            .clone()
            .map_or(JsonValue::Null, JsonValue::String),
    );
    out.insert("save_number".to_string(), JsonValue::from(snapshot.save_number));
    out.insert("name".to_string(), JsonValue::String(snapshot.player_name.clone()));
    out.insert("level".to_string(), JsonValue::from(snapshot.player_level));
    out.insert("location".to_string(), JsonValue::String(snapshot.player_location.clone()));
    out.insert("game_date".to_string(), JsonValue::String(snapshot.game_date.clone()));
    out.insert("race".to_string(), JsonValue::String(snapshot.player_race.clone()));
    out.insert("sex".to_string(), JsonValue::from(snapshot.player_sex));
    out.insert("xp".to_string(), JsonValue::from(snapshot.player_current_xp));
    out.insert("next_level_xp".to_string(), JsonValue::from(snapshot.player_level_up_xp));
    out.insert(
        "screenshot".to_string(),
        JsonValue::String(format!("{}x{}", snapshot.screenshot_width, snapshot.screenshot_height)),
    );
    out.insert("compression".to_string(), JsonValue::String(snapshot.compression.to_string()));
    out.insert("file_size".to_string(), JsonValue::from(snapshot.file_size));
    out.insert("crc32".to_string(), JsonValue::String(format!("{:08x}", snapshot.digest)));
    out.insert("truncated".to_string(), JsonValue::Bool(snapshot.truncated));
    out.insert("co_save".to_string(), JsonValue::Bool(snapshot.has_co_save));
    JsonValue::Object(out)
}

fn plugins_to_json(session: &Session) -> JsonValue {
    JsonValue::Array(
        session
            .plugins()
            .into_iter()
            .map(|p| {
                let mut entry = JsonMap::new();
                entry.insert("index".to_string(), JsonValue::String(p.index));
                entry.insert("name".to_string(), JsonValue::String(p.name));
                entry.insert("lightweight".to_string(), JsonValue::Bool(p.lightweight));
                JsonValue::Object(entry)
            })
            .collect(),
    )
}

fn globals_to_json(blocks: &[GlobalBlockSummary]) -> JsonValue {
    JsonValue::Array(
        blocks
            .iter()
            .map(|b| {
                let mut entry = JsonMap::new();
                entry.insert("table".to_string(), JsonValue::from(b.table));
                entry.insert("type".to_string(), JsonValue::from(b.type_code));
                entry.insert("name".to_string(), JsonValue::String(b.name.clone()));
                entry.insert("size".to_string(), JsonValue::from(b.size));
                JsonValue::Object(entry)
            })
            .collect(),
    )
}

fn change_forms_to_json(forms: &[ChangeFormSummary]) -> JsonValue {
    JsonValue::Array(
        forms
            .iter()
            .map(|f| {
                let mut entry = JsonMap::new();
                entry.insert("refid".to_string(), JsonValue::String(f.refid.clone()));
                entry.insert("type".to_string(), JsonValue::String(f.kind.clone()));
                entry.insert(
                    "plugin".to_string(),
                    f.plugin.clone().map_or(JsonValue::Null, JsonValue::String),
                );
                entry.insert("flags".to_string(), JsonValue::String(format!("{:08x}", f.flags)));
                entry.insert("version".to_string(), JsonValue::from(f.version));
                entry.insert("size".to_string(), JsonValue::from(f.size));
                entry.insert("compressed".to_string(), JsonValue::Bool(f.compressed));
                JsonValue::Object(entry)
            })
            .collect(),
    )
}

fn render_summary(session: &Session, options: TextRenderOptions) -> String {
    let snapshot = session.snapshot();
    let mut out = String::with_capacity(2048);

    writeln!(out, " ::: {} :::", snapshot.game).expect("writing to String cannot fail");
    writeln!(out).expect("writing to String cannot fail");
    let mut field = |label: &str, value: String| {
        writeln!(out, "{label:>LABEL_WIDTH$}: {value}").expect("writing to String cannot fail");
    };
    field("Name", snapshot.player_name.clone());
    field("Level", snapshot.player_level.to_string());
    field("Race", snapshot.player_race.clone());
    field("Location", snapshot.player_location.clone());
    field("Game Date", snapshot.game_date.clone());
    field("Save Number", snapshot.save_number.to_string());
    field(
        "Experience",
        format!("{:.0}/{:.0}", snapshot.player_current_xp, snapshot.player_level_up_xp),
    );
    field(
        "Format",
        match &snapshot.version_string {
            Some(v) => format!("v{} form {} ({v})", snapshot.version, snapshot.form_version),
            None => format!("v{} form {}", snapshot.version, snapshot.form_version),
        },
    );
    field("Compression", snapshot.compression.to_string());
    field(
        "File",
        format!("{} bytes, crc32 {:08x}", snapshot.file_size, snapshot.digest),
    );
    if snapshot.has_co_save {
        field("Co-save", "present".to_string());
    }
    if snapshot.truncated {
        field("Status", "TRUNCATED (read-only)".to_string());
    }
    writeln!(out).expect("writing to String cannot fail");

    write_plugins(&mut out, session);
    writeln!(out).expect("writing to String cannot fail");
    write_globals(&mut out, &session.global_blocks());
    writeln!(out).expect("writing to String cannot fail");
    write_change_forms(&mut out, &session.change_form_summaries(None), options);

    out
}

fn write_plugins(out: &mut String, session: &Session) {
    let plugins = session.plugins();
    writeln!(out, " ::: Plugins ({}) :::", plugins.len()).expect("writing to String cannot fail");
    if plugins.is_empty() {
        writeln!(out, "  none").expect("writing to String cannot fail");
    }
    for p in &plugins {
        writeln!(out, "  {:>6}  {}", p.index, p.name).expect("writing to String cannot fail");
    }
}

fn write_globals(out: &mut String, blocks: &[GlobalBlockSummary]) {
    writeln!(out, " ::: Global Data :::").expect("writing to String cannot fail");
    for b in blocks {
        writeln!(
            out,
            "  t{} {:>4}  {:<BLOCK_NAME_WIDTH$}{:>10} bytes",
            b.table, b.type_code, b.name, b.size
        )
        .expect("writing to String cannot fail");
    }
}

fn write_change_forms(out: &mut String, forms: &[ChangeFormSummary], options: TextRenderOptions) {
    writeln!(out, " ::: Change Forms ({}) :::", forms.len()).expect("writing to String cannot fail");
    if options.verbose {
        for f in forms {
            writeln!(
                out,
                "  {:<FORM_KIND_WIDTH$}{:<12}flags {:08x}  {:>6} bytes{}",
                f.kind,
                f.refid,
                f.flags,
                f.size,
                if f.compressed { "  (zlib)" } else { "" }
            )
            .expect("writing to String cannot fail");
        }
        return;
    }

    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for f in forms {
        let entry = counts.entry(f.kind.as_str()).or_default();
        entry.0 += 1;
        entry.1 += f.size;
    }
    for (kind, (count, bytes)) in counts {
        writeln!(out, "  {kind:<FORM_KIND_WIDTH$}{count:>7}  {bytes:>10} bytes")
            .expect("writing to String cannot fail");
    }
}
