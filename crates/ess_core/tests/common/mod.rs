#![allow(dead_code)]

use ess_core::compression::{self, CompressionType};
use ess_core::header::Game;

pub const PAPYRUS: u32 = 1001;

/// Builds synthetic savegames region by region, filling in the offset table
/// from the sizes it lays down.
#[derive(Debug, Clone)]
pub struct SaveBuilder {
    pub game: Game,
    pub version: u32,
    pub form_version: u8,
    pub compression: CompressionType,
    pub player_name: String,
    pub plugins: Vec<String>,
    pub lite_plugins: Option<Vec<String>>,
    pub screenshot: (u32, u32),
    pub table1: Vec<(u32, Vec<u8>)>,
    pub table2: Vec<(u32, Vec<u8>)>,
    pub change_forms: Vec<Vec<u8>>,
    pub table3: Vec<(u32, Vec<u8>)>,
    pub form_ids: Vec<u32>,
    pub worldspaces: Vec<u32>,
    pub tail: Vec<u8>,
}

/// Where each region landed in the uncompressed buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltOffsets {
    pub header_size: usize,
    pub offset_table: usize,
    pub table1: usize,
    pub table2: usize,
    pub change_forms: usize,
    pub table3: usize,
    pub form_id_array: usize,
    pub worldspaces: usize,
    pub total: usize,
}

impl SaveBuilder {
    pub fn new(game: Game) -> Self {
        let (version, form_version) = match game {
            Game::SkyrimLe => (9, 74),
            Game::SkyrimSe => (12, 78),
            Game::Fallout4 => (11, 68),
        };
        let lite_plugins = (game == Game::SkyrimSe).then(Vec::new);
        let table3 = if game.is_skyrim() {
            vec![(PAPYRUS, vec![0xAA, 0xBB, 0xCC])]
        } else {
            Vec::new()
        };
        Self {
            game,
            version,
            form_version,
            compression: CompressionType::None,
            player_name: "Prisoner".to_string(),
            plugins: vec!["Skyrim.esm".to_string(), "Update.esm".to_string()],
            lite_plugins,
            screenshot: (2, 1),
            table1: vec![(0, vec![1, 2, 3, 4]), (3, global_variables(&[(0x40_0010, 1.5)]))],
            table2: vec![(100, vec![9; 6])],
            change_forms: Vec::new(),
            table3,
            form_ids: vec![0x0000_0014, 0x0100_0D62],
            worldspaces: vec![0x3C],
            tail: Vec::new(),
        }
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn change_form(mut self, bytes: Vec<u8>) -> Self {
        self.change_forms.push(bytes);
        self
    }

    pub fn table1_block(mut self, type_code: u32, data: Vec<u8>) -> Self {
        self.table1.push((type_code, data));
        self
    }

    pub fn table3_block(mut self, type_code: u32, data: Vec<u8>) -> Self {
        self.table3.push((type_code, data));
        self
    }

    pub fn tail(mut self, tail: Vec<u8>) -> Self {
        self.tail = tail;
        self
    }

    pub fn header(&self) -> Vec<u8> {
        let mut fields = Vec::new();
        fields.extend_from_slice(&self.version.to_le_bytes());
        fields.extend_from_slice(&7u32.to_le_bytes());
        wstring(&mut fields, &self.player_name);
        fields.extend_from_slice(&12u32.to_le_bytes());
        wstring(&mut fields, "Helgen");
        wstring(&mut fields, "17.12.01");
        wstring(&mut fields, "NordRace");
        fields.extend_from_slice(&0u16.to_le_bytes());
        fields.extend_from_slice(&10.0f32.to_le_bytes());
        fields.extend_from_slice(&200.0f32.to_le_bytes());
        fields.extend_from_slice(&0x01D5_0000_0000_0000u64.to_le_bytes());
        fields.extend_from_slice(&self.screenshot.0.to_le_bytes());
        fields.extend_from_slice(&self.screenshot.1.to_le_bytes());
        if self.game == Game::SkyrimSe {
            fields.extend_from_slice(&self.compression.code().to_le_bytes());
        }

        let mut out = Vec::new();
        out.extend_from_slice(self.game.magic());
        out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
        out.extend_from_slice(&fields);
        let pixels = (self.screenshot.0 * self.screenshot.1) as usize;
        out.extend(std::iter::repeat_n(0x7F, pixels * self.game.screenshot_bytes_per_pixel()));
        out
    }

    /// Header plus the uncompressed body, with where every region starts.
    pub fn build_uncompressed(&self) -> (Vec<u8>, BuiltOffsets) {
        let mut out = self.header();
        let mut at = BuiltOffsets {
            header_size: out.len(),
            ..BuiltOffsets::default()
        };

        out.push(self.form_version);
        if self.game.is_fallout4() {
            wstring(&mut out, "1.10.163.0");
        }
        self.emit_plugins(&mut out);

        at.offset_table = out.len();
        out.extend_from_slice(&[0; 100]);

        at.table1 = out.len();
        emit_blocks(&mut out, &self.table1);
        at.table2 = out.len();
        emit_blocks(&mut out, &self.table2);
        at.change_forms = out.len();
        for form in &self.change_forms {
            out.extend_from_slice(form);
        }
        at.table3 = out.len();
        emit_blocks(&mut out, &self.table3);
        at.form_id_array = out.len();
        emit_u32_array(&mut out, &self.form_ids);
        at.worldspaces = out.len();
        emit_u32_array(&mut out, &self.worldspaces);
        out.extend_from_slice(&self.tail);
        at.total = out.len();

        let stored_table3 = if self.game.is_skyrim() {
            self.table3.len().saturating_sub(1)
        } else {
            self.table3.len()
        };
        let words = [
            at.form_id_array,
            at.worldspaces,
            at.table1,
            at.table2,
            at.change_forms,
            at.table3,
            self.table1.len(),
            self.table2.len(),
            stored_table3,
            self.change_forms.len(),
        ];
        for (i, word) in words.iter().enumerate() {
            let pos = at.offset_table + 4 * i;
            out[pos..pos + 4].copy_from_slice(&(*word as u32).to_le_bytes());
        }
        (out, at)
    }

    pub fn build(&self) -> Vec<u8> {
        let (plain, at) = self.build_uncompressed();
        if !self.compression.is_compressed() {
            return plain;
        }
        let body = &plain[at.header_size..];
        let packed = compression::compress(self.compression, body).expect("compress body");
        let mut out = plain[..at.header_size].to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        out.extend_from_slice(&packed);
        out
    }

    fn emit_plugins(&self, out: &mut Vec<u8>) {
        let mut block = vec![self.plugins.len() as u8];
        for name in &self.plugins {
            wstring(&mut block, name);
        }
        if let Some(lite) = &self.lite_plugins {
            block.extend_from_slice(&(lite.len() as u16).to_le_bytes());
            for name in lite {
                wstring(&mut block, name);
            }
        }
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);
    }
}

pub fn wstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

pub fn refid(out: &mut Vec<u8>, raw: u32) {
    out.extend_from_slice(&[(raw >> 16) as u8, (raw >> 8) as u8, raw as u8]);
}

/// Type-3 block payload: vsval count then `(refid, f32)` pairs.
pub fn global_variables(vars: &[(u32, f32)]) -> Vec<u8> {
    let mut out = vec![(vars.len() as u8) << 2];
    for (raw, value) in vars {
        refid(&mut out, *raw);
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// A change form with one-byte length fields and an uncompressed body.
pub fn change_form(raw: u32, flags: u32, type_code: u8, body: &[u8]) -> Vec<u8> {
    assert!(body.len() < 256);
    let mut out = Vec::new();
    refid(&mut out, raw);
    out.extend_from_slice(&flags.to_le_bytes());
    out.push(type_code & 0x3F);
    out.push(74);
    out.push(body.len() as u8);
    out.push(0);
    out.extend_from_slice(body);
    out
}

/// A change form whose body is zlib-compressed, with two-byte length fields.
pub fn compressed_change_form(raw: u32, flags: u32, type_code: u8, body: &[u8]) -> Vec<u8> {
    let packed = compression::compress(CompressionType::Zlib, body).expect("compress change form");
    let mut out = Vec::new();
    refid(&mut out, raw);
    out.extend_from_slice(&flags.to_le_bytes());
    out.push((1 << 6) | (type_code & 0x3F));
    out.push(74);
    out.extend_from_slice(&(packed.len() as u16).to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&packed);
    out
}

fn emit_blocks(out: &mut Vec<u8>, blocks: &[(u32, Vec<u8>)]) {
    for (type_code, data) in blocks {
        out.extend_from_slice(&type_code.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
}

fn emit_u32_array(out: &mut Vec<u8>, values: &[u32]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}
