//! Change forms: per-object delta records keyed by RefID.
//!
//! A change form is read as a fixed header plus an opaque body. The body is
//! only interpreted on request ([`ChangeForm::decode`]); the bytes captured
//! at read time are what gets written back, whatever happens to the decoded
//! view afterwards.

mod extra;
pub mod flst;
pub mod lvln;
pub mod npc;
pub mod refr;

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Cursor, Read, Seek};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::compression::{self, CompressionType};
use crate::context::{Analysis, EssContext};
use crate::error::{EssError, Result};
use crate::flags::Flags32;
use crate::header::Game;
use crate::plugins::PluginTable;
use crate::reader::LittleEndianReader;
use crate::record::GenericRecord;
use crate::refid::RefId;

pub use flst::FormList;
pub use lvln::{LeveledEntry, LeveledList};
pub use npc::ActorBase;
pub use refr::Reference;

pub const RAW_CHUNK_SIZE: usize = 256;

// Change-flag bit shared by every body variant: a `(flags:i32, unknown:i16)`
// sub-record leads the body.
pub(crate) const CHANGE_FORM_FLAGS: usize = 0;

macro_rules! change_form_types {
    ($($variant:ident => $sig:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum ChangeFormType {
            $($variant),*
        }

        impl ChangeFormType {
            pub fn signature(&self) -> &'static str {
                match self {
                    $(Self::$variant => $sig),*
                }
            }
        }
    };
}

change_form_types!(
    Refr => "REFR", Achr => "ACHR", Pmis => "PMIS", Pgre => "PGRE", Pbea => "PBEA",
    Pfla => "PFLA", Cell => "CELL", Info => "INFO", Qust => "QUST", Npc => "NPC_",
    Acti => "ACTI", Tact => "TACT", Armo => "ARMO", Book => "BOOK", Cont => "CONT",
    Door => "DOOR", Ingr => "INGR", Ligh => "LIGH", Misc => "MISC", Appa => "APPA",
    Stat => "STAT", Mstt => "MSTT", Furn => "FURN", Weap => "WEAP", Ammo => "AMMO",
    Keym => "KEYM", Alch => "ALCH", Idlm => "IDLM", Note => "NOTE", Eczn => "ECZN",
    Clas => "CLAS", Fact => "FACT", Pack => "PACK", Navm => "NAVM", Woop => "WOOP",
    Mgef => "MGEF", Smqn => "SMQN", Scen => "SCEN", Lctn => "LCTN", Rela => "RELA",
    Phzd => "PHZD", Pbar => "PBAR", Pcon => "PCON", Flst => "FLST", Lvln => "LVLN",
    Lvli => "LVLI", Lvsp => "LVSP", Parw => "PARW", Ench => "ENCH",
);

use ChangeFormType::*;

// Numeric code order used by both Skyrim editions.
const SKYRIM_CODES: [ChangeFormType; 49] = [
    Refr, Achr, Pmis, Pgre, Pbea, Pfla, Cell, Info, Qust, Npc, Acti, Tact, Armo, Book, Cont,
    Door, Ingr, Ligh, Misc, Appa, Stat, Mstt, Furn, Weap, Ammo, Keym, Alch, Idlm, Note, Eczn,
    Clas, Fact, Pack, Navm, Woop, Mgef, Smqn, Scen, Lctn, Rela, Phzd, Pbar, Pcon, Flst, Lvln,
    Lvli, Lvsp, Parw, Ench,
];

// Fallout 4 groups the projectile types right after the placed references.
const FALLOUT4_CODES: [ChangeFormType; 49] = [
    Refr, Achr, Pmis, Parw, Pgre, Pbea, Pfla, Pcon, Pbar, Phzd, Cell, Info, Qust, Npc, Acti,
    Tact, Armo, Book, Cont, Door, Ingr, Ligh, Misc, Appa, Stat, Mstt, Furn, Weap, Ammo, Keym,
    Alch, Idlm, Note, Eczn, Clas, Fact, Pack, Navm, Woop, Mgef, Smqn, Scen, Lctn, Rela, Lvln,
    Lvli, Lvsp, Ench, Flst,
];

impl ChangeFormType {
    fn table(game: Game) -> &'static [ChangeFormType] {
        if game.is_fallout4() {
            &FALLOUT4_CODES
        } else {
            &SKYRIM_CODES
        }
    }

    pub fn from_code(game: Game, code: u8) -> Option<Self> {
        Self::table(game).get(code as usize).copied()
    }

    pub fn code(&self, game: Game) -> Option<u8> {
        Self::table(game)
            .iter()
            .position(|t| t == self)
            .map(|i| i as u8)
    }
}

impl fmt::Display for ChangeFormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

// Width of the two length fields, taken from the top two bits of the type
// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LengthWidth {
    U8,
    U16,
    U32,
}

impl LengthWidth {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::U8),
            1 => Some(Self::U16),
            2 => Some(Self::U32),
            _ => None,
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    fn read<R: Read + Seek>(&self, r: &mut LittleEndianReader<R>) -> io::Result<u32> {
        Ok(match self {
            Self::U8 => r.read_u8()? as u32,
            Self::U16 => r.read_u16()? as u32,
            Self::U32 => r.read_u32()?,
        })
    }

    fn emit(&self, out: &mut Vec<u8>, value: u32) {
        match self {
            Self::U8 => out.push(value as u8),
            Self::U16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            Self::U32 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DecodeMode {
    #[default]
    BestEffort,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RawChunk {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// Drains everything left in `r` into chunks of at most
/// [`RAW_CHUNK_SIZE`] bytes.
pub fn recover_unparsed<R: Read + Seek>(r: &mut LittleEndianReader<R>) -> io::Result<Vec<RawChunk>> {
    let mut chunks = Vec::new();
    loop {
        let remaining = r.remaining()?;
        if remaining == 0 {
            break;
        }
        let offset = r.position()?;
        let take = remaining.min(RAW_CHUNK_SIZE as u64) as usize;
        chunks.push(RawChunk {
            offset,
            bytes: r.read_bytes(take)?,
        });
    }
    Ok(chunks)
}

/// Opaque body: the bytes as they are, plus why no typed decode applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefaultBody {
    pub data: Vec<u8>,
    pub reason: Option<String>,
}

impl DefaultBody {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, reason: None }
    }

    pub fn fallback(data: Vec<u8>, reason: String) -> Self {
        Self {
            data,
            reason: Some(reason),
        }
    }

    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(RAW_CHUNK_SIZE)
    }
}

impl Serialize for DefaultBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DefaultBody", 2)?;
        s.serialize_field("size", &self.data.len())?;
        s.serialize_field("reason", &self.reason)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Body {
    FormList(FormList),
    LeveledList(LeveledList),
    Reference(Reference),
    ActorBase(ActorBase),
    Default(DefaultBody),
}

impl Body {
    pub fn name(&self) -> &'static str {
        match self {
            Body::FormList(_) => "form list",
            Body::LeveledList(_) => "leveled list",
            Body::Reference(_) => "reference",
            Body::ActorBase(_) => "actor base",
            Body::Default(_) => "opaque",
        }
    }

    pub fn record(&self) -> Option<&GenericRecord> {
        match self {
            Body::FormList(b) => Some(b.record()),
            Body::LeveledList(b) => Some(b.record()),
            Body::Reference(b) => Some(b.record()),
            Body::ActorBase(b) => Some(b.record()),
            Body::Default(_) => None,
        }
    }

    fn record_mut(&mut self) -> Option<&mut GenericRecord> {
        match self {
            Body::FormList(b) => Some(b.record_mut()),
            Body::LeveledList(b) => Some(b.record_mut()),
            Body::Reference(b) => Some(b.record_mut()),
            Body::ActorBase(b) => Some(b.record_mut()),
            Body::Default(_) => None,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Body::Default(b) => b.data.len(),
            other => other.record().map_or(0, GenericRecord::size),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Body::Default(DefaultBody { reason: Some(_), .. }))
    }

    fn attach_unparsed(&mut self, chunks: Vec<RawChunk>) {
        if let Some(record) = self.record_mut() {
            for (i, chunk) in chunks.into_iter().enumerate() {
                record.insert(format!("unparsed_{i}"), chunk.bytes);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DecodeState {
    #[default]
    Raw,
    Typed(Body),
    /// Holds a `Body::Default` whose `reason` says why decoding failed.
    Fallback(Body),
}

/// One change form. Equality and hashing cover the wire fields only; the
/// decode cache is not part of a change form's identity.
#[derive(Debug, Clone)]
pub struct ChangeForm {
    pub refid: RefId,
    pub flags: Flags32,
    type_field: u8,
    kind: Option<ChangeFormType>,
    pub version: u8,
    length1: u32,
    length2: u32,
    raw_body: Vec<u8>,
    state: DecodeState,
}

impl ChangeForm {
    pub fn read<R: Read + Seek>(r: &mut LittleEndianReader<R>, ctx: &mut EssContext<'_>) -> Result<Self> {
        let refid = ctx.read_ref_id(r)?;
        let flags = Flags32::read(r)?;
        let type_field = r.read_u8()?;
        let version = r.read_u8()?;
        let width = LengthWidth::from_bits(type_field >> 6).ok_or_else(|| {
            EssError::format(format!("change form {refid}: invalid length width in type byte {type_field:#04x}"))
        })?;
        let length1 = width.read(r)?;
        let length2 = width.read(r)?;
        let raw_body = r.read_bytes(length1 as usize)?;

        Ok(Self {
            refid,
            flags,
            type_field,
            kind: ChangeFormType::from_code(ctx.game, type_field & 0x3F),
            version,
            length1,
            length2,
            raw_body,
            state: DecodeState::Raw,
        })
    }

    pub fn emit(&self, out: &mut Vec<u8>) {
        let width = self.length_width();
        self.refid.emit(out);
        self.flags.emit(out);
        out.push(self.type_field);
        out.push(self.version);
        width.emit(out, self.length1);
        width.emit(out, self.length2);
        out.extend_from_slice(&self.raw_body);
    }

    pub fn size(&self) -> usize {
        RefId::SIZE + Flags32::SIZE + 2 + 2 * self.length_width().bytes() + self.raw_body.len()
    }

    pub fn length_width(&self) -> LengthWidth {
        // `read` rejected width bits 3, so this only maps 0..=2.
        LengthWidth::from_bits(self.type_field >> 6).unwrap_or(LengthWidth::U32)
    }

    pub fn type_code(&self) -> u8 {
        self.type_field & 0x3F
    }

    pub fn kind(&self) -> Option<ChangeFormType> {
        self.kind
    }

    pub fn type_name(&self) -> Cow<'static, str> {
        match self.kind {
            Some(kind) => Cow::Borrowed(kind.signature()),
            None => Cow::Owned(format!("type {}", self.type_code())),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.length2 > 0
    }

    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    pub fn body_bytes(&self) -> Result<Cow<'_, [u8]>> {
        if !self.is_compressed() {
            return Ok(Cow::Borrowed(&self.raw_body));
        }
        let data = compression::decompress(CompressionType::Zlib, &self.raw_body, self.length2 as usize)?;
        Ok(Cow::Owned(data))
    }

    pub fn state(&self) -> &DecodeState {
        &self.state
    }

    pub fn is_decoded(&self) -> bool {
        !matches!(self.state, DecodeState::Raw)
    }

    /// Decodes the body once and caches the result. Strict mode reports a
    /// failed or previously fallen-back body as [`EssError::Decode`].
    pub fn decode(&mut self, ctx: &mut EssContext<'_>, mode: DecodeMode) -> Result<&Body> {
        if matches!(self.state, DecodeState::Raw) {
            match self.parse_body(ctx, mode) {
                Ok(body) => self.state = DecodeState::Typed(body),
                Err(reason) if mode == DecodeMode::Strict => {
                    return Err(EssError::Decode {
                        refid: self.refid.to_string(),
                        reason,
                    });
                }
                Err(reason) => {
                    warn!(refid = %self.refid, kind = %self.type_name(), %reason, "change form body fell back to opaque bytes");
                    let data = match self.body_bytes() {
                        Ok(bytes) => bytes.into_owned(),
                        Err(_) => self.raw_body.clone(),
                    };
                    self.state = DecodeState::Fallback(Body::Default(DefaultBody::fallback(data, reason)));
                }
            }
        }

        match &self.state {
            DecodeState::Typed(body) => Ok(body),
            DecodeState::Fallback(Body::Default(DefaultBody {
                reason: Some(reason), ..
            })) if mode == DecodeMode::Strict => Err(EssError::Decode {
                refid: self.refid.to_string(),
                reason: reason.clone(),
            }),
            DecodeState::Fallback(body) => Ok(body),
            DecodeState::Raw => Err(EssError::Decode {
                refid: self.refid.to_string(),
                reason: "body was not decoded".to_string(),
            }),
        }
    }

    fn parse_body(&self, ctx: &mut EssContext<'_>, mode: DecodeMode) -> std::result::Result<Body, String> {
        let data = self.body_bytes().map_err(|e| e.to_string())?;
        let mut r = LittleEndianReader::new(Cursor::new(data.as_ref()));
        let Some(mut body) = self.read_typed(&mut r, ctx).map_err(|e| e.to_string())? else {
            return Ok(Body::Default(DefaultBody::new(data.into_owned())));
        };

        let left = r.remaining().map_err(|e| e.to_string())?;
        if left > 0 {
            if mode == DecodeMode::Strict {
                return Err(format!("{left} bytes left after {} body", body.name()));
            }
            let chunks = recover_unparsed(&mut r).map_err(|e| e.to_string())?;
            body.attach_unparsed(chunks);
        }
        Ok(body)
    }

    fn read_typed<R: Read + Seek>(
        &self,
        r: &mut LittleEndianReader<R>,
        ctx: &mut EssContext<'_>,
    ) -> io::Result<Option<Body>> {
        Ok(Some(match self.kind {
            Some(Flst) => Body::FormList(FormList::read(r, self.flags, ctx)?),
            Some(Lvln) => Body::LeveledList(LeveledList::read(r, self.flags, ctx)?),
            Some(Refr | Achr) => Body::Reference(Reference::read(r, self.refid, self.flags, ctx)?),
            Some(Npc) => Body::ActorBase(ActorBase::read(r, self.flags, ctx)?),
            _ => return Ok(None),
        }))
    }

    pub fn describe(&self, plugins: &PluginTable, analysis: Option<&dyn Analysis>) -> String {
        format!("{} {}", self.type_name(), self.refid.describe(plugins, analysis))
    }
}

impl PartialEq for ChangeForm {
    fn eq(&self, other: &Self) -> bool {
        self.refid == other.refid
            && self.flags == other.flags
            && self.type_field == other.type_field
            && self.version == other.version
            && self.length1 == other.length1
            && self.length2 == other.length2
            && self.raw_body == other.raw_body
    }
}

impl Eq for ChangeForm {}

pub(crate) fn read_form_flags<R: Read + Seek>(
    r: &mut LittleEndianReader<R>,
    flags: Flags32,
    record: &mut GenericRecord,
) -> io::Result<()> {
    if flags.get(CHANGE_FORM_FLAGS) {
        record.read_record("flags", |f| {
            f.read_i32(r, "flags")?;
            f.read_i16(r, "unknown")?;
            Ok(())
        })?;
    }
    Ok(())
}
