use std::io::{self, Read, Seek};

use crate::header::Game;
use crate::plugins::{Plugin, PluginTable};
use crate::reader::LittleEndianReader;
use crate::refid::{RefId, RefIdFactory};

/// Naming lookup supplied by mod-analysis tooling. Only used to decorate
/// display strings; never consulted for structure.
pub trait Analysis {
    fn name_of(&self, plugin: Option<&Plugin>, form_id: u32) -> Option<String>;
}

/// Everything a sub-parser needs from the container it belongs to.
pub struct EssContext<'a> {
    pub game: Game,
    pub form_version: u8,
    plugins: &'a PluginTable,
    form_ids: &'a [u32],
    ref_ids: &'a mut RefIdFactory,
}

impl<'a> EssContext<'a> {
    pub fn new(
        game: Game,
        form_version: u8,
        plugins: &'a PluginTable,
        form_ids: &'a [u32],
        ref_ids: &'a mut RefIdFactory,
    ) -> Self {
        Self {
            game,
            form_version,
            plugins,
            form_ids,
            ref_ids,
        }
    }

    pub fn read_ref_id<R: Read + Seek>(&mut self, r: &mut LittleEndianReader<R>) -> io::Result<RefId> {
        let raw = r.read_u24_be()?;
        Ok(self.make_ref_id(raw))
    }

    pub fn make_ref_id(&mut self, raw: u32) -> RefId {
        self.ref_ids.make(raw, self.form_ids, self.plugins)
    }

    pub fn plugins(&self) -> &PluginTable {
        self.plugins
    }
}
