use std::fmt;
use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};

use crate::compression::CompressionType;
use crate::error::{EssError, Result};
use crate::reader::LittleEndianReader;
use crate::wstring::WString;

pub const SKYRIM_MAGIC: &[u8] = b"TESV_SAVEGAME";
pub const FALLOUT4_MAGIC: &[u8] = b"FO4_SAVEGAME";

const SKYRIM_SE_VERSION: u32 = 12;
const SKYRIM_LE_MAX_VERSION: u32 = 9;
const FALLOUT4_VERSIONS: std::ops::RangeInclusive<u32> = 11..=15;
const FALLOUT4_LITE_VERSION: u32 = 12;
const SKYRIM_SE_LITE_FORM_VERSION: u8 = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    SkyrimLe,
    SkyrimSe,
    Fallout4,
}

impl Game {
    pub fn is_skyrim(&self) -> bool {
        matches!(self, Self::SkyrimLe | Self::SkyrimSe)
    }

    pub fn is_fallout4(&self) -> bool {
        *self == Self::Fallout4
    }

    pub fn magic(&self) -> &'static [u8] {
        if self.is_skyrim() {
            SKYRIM_MAGIC
        } else {
            FALLOUT4_MAGIC
        }
    }

    pub fn save_extension(&self) -> &'static str {
        if self.is_skyrim() { "ess" } else { "fos" }
    }

    pub fn co_save_extension(&self) -> &'static str {
        if self.is_skyrim() { "skse" } else { "f4se" }
    }

    /// Only the special edition carries a compression field in its header.
    pub fn has_compression_field(&self) -> bool {
        *self == Self::SkyrimSe
    }

    pub fn screenshot_bytes_per_pixel(&self) -> usize {
        match *self {
            Self::SkyrimLe => 3,
            Self::SkyrimSe | Self::Fallout4 => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::SkyrimLe => "Skyrim Legendary Edition",
            Self::SkyrimSe => "Skyrim Special Edition",
            Self::Fallout4 => "Fallout 4",
        }
    }

    fn detect(magic: &[u8], version: u32) -> Option<Self> {
        if magic == SKYRIM_MAGIC {
            match version {
                SKYRIM_SE_VERSION => Some(Self::SkyrimSe),
                v if v <= SKYRIM_LE_MAX_VERSION => Some(Self::SkyrimLe),
                _ => None,
            }
        } else if magic == FALLOUT4_MAGIC && FALLOUT4_VERSIONS.contains(&version) {
            Some(Self::Fallout4)
        } else {
            None
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub game: Game,
    pub version: u32,
    pub save_number: u32,
    pub player_name: WString,
    pub player_level: u32,
    pub player_location: WString,
    pub game_date: WString,
    pub player_race: WString,
    pub player_sex: u16,
    pub player_current_xp: f32,
    pub player_level_up_xp: f32,
    pub filetime: u64,
    pub screenshot_width: u32,
    pub screenshot_height: u32,
    pub compression: CompressionType,
    pub screenshot: Vec<u8>,
}

impl Header {
    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> Result<Self> {
        let magic = read_magic(r)?;
        let header_size = r.read_u32()? as u64;
        let fields_start = r.position()?;
        let version = r.read_u32()?;

        let game = Game::detect(magic, version).ok_or_else(|| {
            EssError::format(format!(
                "unsupported game/version combination: {} version {version}",
                String::from_utf8_lossy(magic)
            ))
        })?;

        let save_number = r.read_u32()?;
        let player_name = WString::read(r)?;
        let player_level = r.read_u32()?;
        let player_location = WString::read(r)?;
        let game_date = WString::read(r)?;
        let player_race = WString::read(r)?;
        let player_sex = r.read_u16()?;
        let player_current_xp = r.read_f32()?;
        let player_level_up_xp = r.read_f32()?;
        let filetime = r.read_u64()?;
        let screenshot_width = r.read_u32()?;
        let screenshot_height = r.read_u32()?;
        let compression = if game.has_compression_field() {
            let code = r.read_u16()?;
            CompressionType::from_code(code)
                .ok_or_else(|| EssError::format(format!("unknown compression type {code}")))?
        } else {
            CompressionType::None
        };

        let consumed = r.position()? - fields_start;
        if consumed != header_size {
            return Err(EssError::format(format!(
                "header declares {header_size} bytes of fields but holds {consumed}"
            )));
        }

        let screenshot_len = (screenshot_width as usize)
            .checked_mul(screenshot_height as usize)
            .and_then(|px| px.checked_mul(game.screenshot_bytes_per_pixel()))
            .ok_or_else(|| EssError::format("screenshot dimensions overflow"))?;
        let screenshot = r.read_bytes(screenshot_len)?;

        Ok(Self {
            game,
            version,
            save_number,
            player_name,
            player_level,
            player_location,
            game_date,
            player_race,
            player_sex,
            player_current_xp,
            player_level_up_xp,
            filetime,
            screenshot_width,
            screenshot_height,
            compression,
            screenshot,
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.game.magic());
        out.extend_from_slice(&(self.fields_size() as u32).to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.save_number.to_le_bytes());
        self.player_name.emit(out);
        out.extend_from_slice(&self.player_level.to_le_bytes());
        self.player_location.emit(out);
        self.game_date.emit(out);
        self.player_race.emit(out);
        out.extend_from_slice(&self.player_sex.to_le_bytes());
        out.extend_from_slice(&self.player_current_xp.to_le_bytes());
        out.extend_from_slice(&self.player_level_up_xp.to_le_bytes());
        out.extend_from_slice(&self.filetime.to_le_bytes());
        out.extend_from_slice(&self.screenshot_width.to_le_bytes());
        out.extend_from_slice(&self.screenshot_height.to_le_bytes());
        if self.game.has_compression_field() {
            out.extend_from_slice(&self.compression.code().to_le_bytes());
        }
        out.extend_from_slice(&self.screenshot);
    }

    // Bytes covered by the `headerSize` field.
    fn fields_size(&self) -> usize {
        let compression = if self.game.has_compression_field() { 2 } else { 0 };
        4 + 4
            + self.player_name.size()
            + 4
            + self.player_location.size()
            + self.game_date.size()
            + self.player_race.size()
            + 2
            + 4
            + 4
            + 8
            + 4
            + 4
            + compression
    }

    pub fn size(&self) -> usize {
        self.game.magic().len() + 4 + self.fields_size() + self.screenshot.len()
    }

    pub fn supports_lite_plugins(&self, form_version: u8) -> bool {
        match self.game {
            Game::SkyrimLe => false,
            Game::SkyrimSe => form_version >= SKYRIM_SE_LITE_FORM_VERSION,
            Game::Fallout4 => self.version >= FALLOUT4_LITE_VERSION,
        }
    }

    pub fn has_version_string(&self) -> bool {
        self.game.is_fallout4()
    }
}

fn read_magic<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> Result<&'static [u8]> {
    let start = r.position()?;
    for magic in [SKYRIM_MAGIC, FALLOUT4_MAGIC] {
        r.seek_to(start)?;
        if let Ok(bytes) = r.read_bytes(magic.len())
            && bytes == magic
        {
            return Ok(magic);
        }
    }
    Err(EssError::format("unrecognised savegame magic"))
}
