//! The savegame container: read protocol, write protocol and structural
//! comparison.
//!
//! Reading is one linear pass over an in-memory buffer. After every region
//! the stream position is checked against a running byte count, and at each
//! region boundary against the offset table; either mismatch aborts with
//! [`EssError::PositionDesync`]. Only the FormID array, table3 and the
//! worldspace array may come up short, which flags the container truncated
//! instead of failing the read.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::changeform::{Body, ChangeForm, DecodeMode};
use crate::compression::{self, CodecError, CompressionType};
use crate::context::EssContext;
use crate::error::{EssError, Result};
use crate::globals::{
    ANIM_OBJECTS_TYPE, GLOBAL_VARIABLES_TYPE, GlobalData, GlobalVariableTable, PAPYRUS_TYPE, TABLE1_TYPES,
    TABLE2_TYPES, TABLE3_TYPES,
};
use crate::header::{Game, Header};
use crate::layout::{FileLayout, RegionId};
use crate::offsets::{OFFSET_TABLE_SIZE, OffsetTable, RegionCounts};
use crate::plugins::PluginTable;
use crate::reader::LittleEndianReader;
use crate::refid::{RefId, RefIdFactory};
use crate::wstring::WString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Policy for change-form decoding requested through a `Session`.
    pub decode: DecodeMode,
    // Load the sibling co-save file when reading from a path.
    pub read_co_save: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            decode: DecodeMode::BestEffort,
            read_co_save: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BodyLengths {
    pub uncompressed: u32,
    pub compressed: u32,
}

// Change forms in file order, indexed by RefID. Inserting an existing key
// replaces that entry where it stands.
#[derive(Debug, Clone, Default)]
pub struct ChangeForms {
    forms: Vec<ChangeForm>,
    index: HashMap<RefId, usize>,
}

impl ChangeForms {
    pub fn insert(&mut self, form: ChangeForm) -> Option<ChangeForm> {
        if let Some(&i) = self.index.get(&form.refid) {
            return Some(std::mem::replace(&mut self.forms[i], form));
        }
        self.index.insert(form.refid, self.forms.len());
        self.forms.push(form);
        None
    }

    pub fn get(&self, refid: &RefId) -> Option<&ChangeForm> {
        self.index.get(refid).map(|&i| &self.forms[i])
    }

    pub fn get_mut(&mut self, refid: &RefId) -> Option<&mut ChangeForm> {
        self.index.get(refid).map(|&i| &mut self.forms[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeForm> {
        self.forms.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChangeForm> {
        self.forms.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn size(&self) -> usize {
        self.forms.iter().map(ChangeForm::size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub typed: usize,
    pub opaque: usize,
    pub fallback: usize,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Ess {
    path: Option<PathBuf>,
    header: Header,
    body_lengths: Option<BodyLengths>,
    form_version: u8,
    version_string: Option<WString>,
    plugins: PluginTable,
    offsets: OffsetTable,
    table1: Vec<GlobalData>,
    table2: Vec<GlobalData>,
    change_forms: ChangeForms,
    table3: Vec<GlobalData>,
    form_ids: Vec<u32>,
    worldspaces: Vec<u32>,
    unknown_tail: Vec<u8>,
    global_variables: GlobalVariableTable,
    ref_ids: RefIdFactory,
    co_save: Option<Vec<u8>>,
    truncated: bool,
    digest: u32,
    original_size: usize,
    options: ReadOptions,
}

impl Ess {
    pub fn read_bytes(data: &[u8], options: ReadOptions) -> Result<Self> {
        parse(data, None, options)
    }

    pub fn read_path(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut ess = parse(&data, Some(path.to_path_buf()), options)?;

        if options.read_co_save {
            let co_path = co_save_path(path, ess.game());
            if co_path.is_file() {
                let bytes = fs::read(&co_path)?;
                debug!(path = %co_path.display(), size = bytes.len(), "read co-save");
                ess.co_save = Some(bytes);
            }
        }
        Ok(ess)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.truncated {
            return Err(EssError::TruncatedWrite {
                file: self.display_name(),
            });
        }

        let layout = self.layout();
        let mut offsets = self.offsets;
        offsets.rebuild(&layout, self.region_counts())?;

        let header_size = self.header.size();
        let mut body = Vec::with_capacity(layout.file_len - header_size);
        body.push(self.form_version);
        if let Some(version) = &self.version_string {
            version.emit(&mut body);
        }
        self.plugins.emit(&mut body);
        offsets.emit(&mut body, self.game());
        for block in &self.table1 {
            block.emit(&mut body);
        }
        for block in &self.table2 {
            block.emit(&mut body);
        }
        for form in self.change_forms.iter() {
            form.emit(&mut body);
        }
        for block in &self.table3 {
            block.emit(&mut body);
        }
        emit_u32_array(&mut body, &self.form_ids);
        emit_u32_array(&mut body, &self.worldspaces);
        body.extend_from_slice(&self.unknown_tail);

        if header_size + body.len() != layout.file_len {
            return Err(EssError::PositionDesync {
                region: "write",
                expected: layout.file_len as u64,
                actual: (header_size + body.len()) as u64,
            });
        }

        let mut out = Vec::with_capacity(layout.file_len + 8);
        self.header.emit(&mut out);
        let compression = self.header.compression;
        if compression.is_compressed() {
            // [uncompressed length][compressed length][payload]
            let packed = compression::compress(compression, &body)?;
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
            out.extend_from_slice(&packed);
        } else {
            out.extend_from_slice(&body);
        }

        info!(
            file = %self.display_name(),
            size = out.len(),
            compression = %compression,
            change_forms = self.change_forms.len(),
            "serialized save"
        );
        Ok(out)
    }

    pub fn write_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        if let Some(co_save) = &self.co_save {
            let co_path = co_save_path(path, self.game());
            fs::write(&co_path, co_save)?;
            debug!(path = %co_path.display(), size = co_save.len(), "wrote co-save");
        }
        Ok(())
    }

    pub fn layout(&self) -> FileLayout {
        FileLayout::from_sizes(&[
            (RegionId::Header, self.header.size()),
            (RegionId::FormVersion, 1),
            (
                RegionId::VersionString,
                self.version_string.as_ref().map_or(0, WString::size),
            ),
            (RegionId::PluginTable, self.plugins.size()),
            (RegionId::OffsetTable, OFFSET_TABLE_SIZE),
            (RegionId::Table1, blocks_size(&self.table1)),
            (RegionId::Table2, blocks_size(&self.table2)),
            (RegionId::ChangeForms, self.change_forms.size()),
            (RegionId::Table3, blocks_size(&self.table3)),
            (RegionId::FormIdArray, 4 + 4 * self.form_ids.len()),
            (RegionId::WorldspaceArray, 4 + 4 * self.worldspaces.len()),
            (RegionId::UnknownTail, self.unknown_tail.len()),
        ])
    }

    pub fn size(&self) -> usize {
        self.layout().file_len
    }

    fn region_counts(&self) -> RegionCounts {
        RegionCounts {
            table1: self.table1.len(),
            table2: self.table2.len(),
            table3: self.table3.len(),
            change_forms: self.change_forms.len(),
        }
    }

    /// Selects the codec for the next write. Only families with a
    /// compression field in their header accept anything but `None`.
    pub fn set_compression(&mut self, kind: CompressionType) -> Result<()> {
        if kind.is_compressed() && !self.game().has_compression_field() {
            return Err(EssError::format(format!(
                "{} saves cannot be compressed",
                self.game()
            )));
        }
        self.header.compression = kind;
        Ok(())
    }

    pub fn decode_change_form(&mut self, refid: &RefId, mode: DecodeMode) -> Result<Option<&Body>> {
        let Some(form) = self.change_forms.get_mut(refid) else {
            return Ok(None);
        };
        let mut ctx = EssContext::new(
            self.header.game,
            self.form_version,
            &self.plugins,
            &self.form_ids,
            &mut self.ref_ids,
        );
        form.decode(&mut ctx, mode).map(Some)
    }

    pub fn decode_all(&mut self, mode: DecodeMode) -> DecodeStats {
        let Ess {
            header,
            form_version,
            plugins,
            form_ids,
            ref_ids,
            change_forms,
            ..
        } = self;
        let mut ctx = EssContext::new(header.game, *form_version, plugins, form_ids, ref_ids);
        let mut stats = DecodeStats::default();
        for form in change_forms.iter_mut() {
            let refid = form.refid;
            match form.decode(&mut ctx, mode) {
                Ok(body) if body.is_fallback() => stats.fallback += 1,
                Ok(Body::Default(_)) => stats.opaque += 1,
                Ok(_) => stats.typed += 1,
                Err(e) => stats.failed.push((refid.to_string(), e.to_string())),
            }
        }
        debug!(
            typed = stats.typed,
            opaque = stats.opaque,
            fallback = stats.fallback,
            failed = stats.failed.len(),
            "decoded change forms"
        );
        stats
    }

    // Decodes the type-3 block against this container's tables.
    fn extract_global_variables(&mut self) -> GlobalVariableTable {
        let Some(block) = self
            .table1
            .iter()
            .chain(&self.table2)
            .find(|b| b.type_code == GLOBAL_VARIABLES_TYPE)
        else {
            return GlobalVariableTable::default();
        };
        let mut ctx = EssContext::new(
            self.header.game,
            self.form_version,
            &self.plugins,
            &self.form_ids,
            &mut self.ref_ids,
        );
        match GlobalVariableTable::parse(&block.data, &mut ctx) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "global variable block did not decode; keeping raw bytes only");
                GlobalVariableTable::default()
            }
        }
    }

    fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn game(&self) -> Game {
        self.header.game
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn compression(&self) -> CompressionType {
        self.header.compression
    }

    pub fn body_lengths(&self) -> Option<BodyLengths> {
        self.body_lengths
    }

    pub fn form_version(&self) -> u8 {
        self.form_version
    }

    pub fn version_string(&self) -> Option<&WString> {
        self.version_string.as_ref()
    }

    pub fn plugins(&self) -> &PluginTable {
        &self.plugins
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn table1(&self) -> &[GlobalData] {
        &self.table1
    }

    pub fn table2(&self) -> &[GlobalData] {
        &self.table2
    }

    pub fn table3(&self) -> &[GlobalData] {
        &self.table3
    }

    pub fn global_variables(&self) -> &GlobalVariableTable {
        &self.global_variables
    }

    pub fn papyrus(&self) -> Option<&GlobalData> {
        self.table3.iter().find(|b| b.type_code == PAPYRUS_TYPE)
    }

    pub fn anim_objects(&self) -> Option<&GlobalData> {
        self.table3.iter().find(|b| b.type_code == ANIM_OBJECTS_TYPE)
    }

    pub fn change_forms(&self) -> &ChangeForms {
        &self.change_forms
    }

    pub fn change_form(&self, refid: &RefId) -> Option<&ChangeForm> {
        self.change_forms.get(refid)
    }

    pub fn form_ids(&self) -> &[u32] {
        &self.form_ids
    }

    pub fn worldspaces(&self) -> &[u32] {
        &self.worldspaces
    }

    pub fn unknown_tail(&self) -> &[u8] {
        &self.unknown_tail
    }

    pub fn ref_ids(&self) -> &RefIdFactory {
        &self.ref_ids
    }

    pub fn make_ref_id(&mut self, raw: u32) -> RefId {
        self.ref_ids.make(raw, &self.form_ids, &self.plugins)
    }

    pub fn co_save(&self) -> Option<&[u8]> {
        self.co_save.as_deref()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn digest(&self) -> u32 {
        self.digest
    }

    pub fn original_size(&self) -> usize {
        self.original_size
    }

    pub fn options(&self) -> ReadOptions {
        self.options
    }
}

pub fn co_save_path(path: &Path, game: Game) -> PathBuf {
    path.with_extension(game.co_save_extension())
}

/// Structural comparison: sizes, header, change forms by RefID and the VM
/// object graph bytes.
pub fn verify_identical(a: &Ess, b: &Ess) -> Result<()> {
    let (size_a, size_b) = (a.size(), b.size());
    if size_a != size_b {
        return Err(EssError::Verify(format!("total size {size_a} vs {size_b}")));
    }
    let body_a = size_a - a.header.size();
    let body_b = size_b - b.header.size();
    if body_a != body_b {
        return Err(EssError::Verify(format!("body size {body_a} vs {body_b}")));
    }
    if a.header != b.header {
        return Err(EssError::Verify("headers differ".to_string()));
    }
    if a.change_forms.len() != b.change_forms.len() {
        return Err(EssError::Verify(format!(
            "{} change forms vs {}",
            a.change_forms.len(),
            b.change_forms.len()
        )));
    }
    for form in a.change_forms.iter() {
        match b.change_forms.get(&form.refid) {
            Some(other) if other == form => {}
            Some(_) => return Err(EssError::Verify(format!("change form {} differs", form.refid))),
            None => return Err(EssError::Verify(format!("change form {} missing", form.refid))),
        }
    }
    let papyrus = |ess: &Ess| {
        ess.papyrus().map(|block| {
            let mut out = Vec::with_capacity(block.size());
            block.emit(&mut out);
            out
        })
    };
    if papyrus(a) != papyrus(b) {
        return Err(EssError::Verify("papyrus blocks differ".to_string()));
    }
    Ok(())
}

fn parse(data: &[u8], path: Option<PathBuf>, options: ReadOptions) -> Result<Ess> {
    let digest = crc32fast::hash(data);
    let mut r = LittleEndianReader::new(Cursor::new(data));
    let header = Header::read(&mut r)?;
    let header_size = header.size();
    let mut expected = header_size as u64;
    sync(&mut r, "header", expected)?;
    debug!(game = %header.game, version = header.version, size = header_size, "read header");

    let mut truncated = false;
    let mut body_lengths = None;
    // Offsets in the table count from byte 0 of the uncompressed layout, so
    // a compressed body is read back behind a copy of the header.
    let buffer: Cow<'_, [u8]> = if header.compression.is_compressed() {
        let uncompressed = r.read_len_i32("uncompressed length")?;
        let compressed = r.read_len_i32("compressed length")?;
        let payload = r.read_bytes(compressed)?;
        body_lengths = Some(BodyLengths {
            uncompressed: uncompressed as u32,
            compressed: compressed as u32,
        });
        let body = match compression::decompress(header.compression, &payload, uncompressed) {
            Ok(body) => body,
            Err(CodecError::LengthMismatch {
                expected: declared,
                actual,
                partial,
            }) => {
                warn!(declared, actual, "decompressed body is shorter than declared; treating save as truncated");
                truncated = true;
                partial
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            compression = %header.compression,
            compressed,
            uncompressed,
            "decompressed body"
        );
        let mut buffer = Vec::with_capacity(header_size + body.len());
        buffer.extend_from_slice(&data[..header_size]);
        buffer.extend_from_slice(&body);
        Cow::Owned(buffer)
    } else {
        Cow::Borrowed(data)
    };

    let mut r = LittleEndianReader::new(Cursor::new(buffer.as_ref()));
    r.seek_to(expected)?;

    let form_version = r.read_u8()?;
    expected += 1;
    sync(&mut r, "form version", expected)?;

    let version_string = if header.has_version_string() {
        let version = WString::read(&mut r)?;
        expected += version.size() as u64;
        sync(&mut r, "version string", expected)?;
        Some(version)
    } else {
        None
    };

    let plugins = PluginTable::read(&mut r, header.supports_lite_plugins(form_version))?;
    expected += plugins.size() as u64;
    sync(&mut r, "plugin table", expected)?;
    debug!(
        full = plugins.full().len(),
        lite = plugins.lite().map_or(0, <[_]>::len),
        "read plugin table"
    );

    let offsets = OffsetTable::read(&mut r, header.game)?;
    expected += OFFSET_TABLE_SIZE as u64;
    sync(&mut r, "offset table", expected)?;

    // The form id array lives near the end but change forms need it to
    // resolve their RefIDs, so it is read out of order.
    let (form_ids, form_ids_complete) = match read_u32_array(&mut r, offsets.form_id_array_count_offset as u64) {
        Ok(ids) => {
            debug!(offset = offsets.form_id_array_count_offset, count = ids.len(), "read form id array");
            (ids, true)
        }
        Err(e) => {
            warn!(error = %e, "form id array is incomplete; save is truncated");
            truncated = true;
            (Vec::new(), false)
        }
    };

    let mut ess = Ess {
        path,
        header,
        body_lengths,
        form_version,
        version_string,
        plugins,
        offsets,
        table1: Vec::new(),
        table2: Vec::new(),
        change_forms: ChangeForms::default(),
        table3: Vec::new(),
        form_ids,
        worldspaces: Vec::new(),
        unknown_tail: Vec::new(),
        global_variables: GlobalVariableTable::default(),
        ref_ids: RefIdFactory::new(),
        co_save: None,
        truncated,
        digest,
        original_size: data.len(),
        options,
    };

    r.seek_to(expected)?;
    check_offset("table1", offsets.table1_offset, expected)?;
    for _ in 0..offsets.table1_count {
        let block = GlobalData::read(&mut r, &TABLE1_TYPES)?;
        expected += block.size() as u64;
        ess.table1.push(block);
    }
    sync(&mut r, "table1", expected)?;
    debug!(offset = offsets.table1_offset, count = ess.table1.len(), "read table1");

    check_offset("table2", offsets.table2_offset, expected)?;
    for _ in 0..offsets.table2_count {
        let block = GlobalData::read(&mut r, &TABLE2_TYPES)?;
        expected += block.size() as u64;
        ess.table2.push(block);
    }
    sync(&mut r, "table2", expected)?;
    debug!(offset = offsets.table2_offset, count = ess.table2.len(), "read table2");

    ess.global_variables = ess.extract_global_variables();

    check_offset("change forms", offsets.change_forms_offset, expected)?;
    // Bytes of change forms replaced by a later duplicate.
    let mut dropped = 0usize;
    {
        let mut ctx = EssContext::new(
            ess.header.game,
            ess.form_version,
            &ess.plugins,
            &ess.form_ids,
            &mut ess.ref_ids,
        );
        for _ in 0..offsets.change_form_count {
            let form = ChangeForm::read(&mut r, &mut ctx)?;
            expected += form.size() as u64;
            if let Some(old) = ess.change_forms.insert(form) {
                dropped += old.size();
                warn!(refid = %old.refid, "duplicate change form; keeping the later one");
            }
        }
    }
    sync(&mut r, "change forms", expected)?;
    debug!(
        offset = offsets.change_forms_offset,
        count = ess.change_forms.len(),
        "read change forms"
    );

    check_offset("table3", offsets.table3_offset, expected)?;
    let mut table3_complete = true;
    for _ in 0..offsets.table3_count {
        let start = r.position()?;
        match GlobalData::read(&mut r, &TABLE3_TYPES) {
            Ok(block) => {
                expected += block.size() as u64;
                ess.table3.push(block);
            }
            Err(EssError::Io(e)) => {
                warn!(error = %e, offset = start, "table3 block is incomplete; keeping what was read");
                if let Some(partial) = GlobalData::read_partial(&mut r, start) {
                    ess.table3.push(partial);
                }
                ess.truncated = true;
                table3_complete = false;
                break;
            }
            Err(e) => return Err(e),
        }
    }
    if table3_complete {
        sync(&mut r, "table3", expected)?;
        debug!(offset = offsets.table3_offset, count = ess.table3.len(), "read table3");
    }

    if table3_complete && form_ids_complete {
        check_offset("form id array", offsets.form_id_array_count_offset, expected)?;
        expected += 4 + 4 * ess.form_ids.len() as u64;
        r.seek_to(expected)?;

        check_offset("worldspace array", offsets.unknown_table3_offset, expected)?;
        match read_u32_array(&mut r, expected) {
            Ok(ids) => {
                expected += 4 + 4 * ids.len() as u64;
                sync(&mut r, "worldspace array", expected)?;
                debug!(offset = offsets.unknown_table3_offset, count = ids.len(), "read worldspace array");
                ess.worldspaces = ids;
            }
            Err(e) => {
                warn!(error = %e, "worldspace array is incomplete; save is truncated");
                ess.truncated = true;
            }
        }
    }

    if !ess.truncated {
        ess.unknown_tail = r.read_to_end()?;
        if !ess.unknown_tail.is_empty() {
            debug!(size = ess.unknown_tail.len(), "captured unknown tail");
        }
        if !ess.header.compression.is_compressed() {
            ess.layout()
                .check_covers(data.len().saturating_sub(dropped))
                .map_err(|e| EssError::format(e.to_string()))?;
        }
    }

    info!(
        file = %ess.display_name(),
        game = %ess.header.game,
        plugins = ess.plugins.len(),
        change_forms = ess.change_forms.len(),
        truncated = ess.truncated,
        "read save"
    );
    Ok(ess)
}

fn sync<R: Read + Seek>(r: &mut LittleEndianReader<R>, region: &'static str, expected: u64) -> Result<()> {
    let actual = r.position()?;
    if actual != expected {
        return Err(EssError::PositionDesync {
            region,
            expected,
            actual,
        });
    }
    Ok(())
}

// A region must start where the offset table says it does.
fn check_offset(region: &'static str, recorded: u32, actual: u64) -> Result<()> {
    if recorded as u64 != actual {
        return Err(EssError::PositionDesync {
            region,
            expected: recorded as u64,
            actual,
        });
    }
    Ok(())
}

fn read_u32_array<R: Read + Seek>(r: &mut LittleEndianReader<R>, offset: u64) -> Result<Vec<u32>> {
    r.seek_to(offset)?;
    let count = r.read_u32()? as usize;
    Ok(r.read_u32_vec(count)?)
}

fn emit_u32_array(out: &mut Vec<u8>, values: &[u32]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn blocks_size(blocks: &[GlobalData]) -> usize {
    blocks.iter().map(GlobalData::size).sum()
}
