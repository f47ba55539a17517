//! Reading and writing of Skyrim (LE/SE) and Fallout 4 `.ess` savegames.
//!
//! [`Ess::read_bytes`] parses the whole container into typed regions and
//! [`Ess::to_bytes`] writes them back. Change-form bodies stay raw until
//! [`Ess::decode_change_form`] or [`Ess::decode_all`] asks for a typed view.

pub mod changeform;
pub mod compression;
pub mod context;
pub mod core_api;
pub mod error;
pub mod ess;
pub mod flags;
pub mod globals;
pub mod header;
pub mod layout;
pub mod offsets;
pub mod plugins;
pub mod reader;
pub mod record;
pub mod refid;
pub mod vsval;
pub mod wstring;

pub use changeform::{Body, ChangeForm, ChangeFormType, DecodeMode, DecodeState};
pub use compression::CompressionType;
pub use context::{Analysis, EssContext};
pub use error::{EssError, Result};
pub use ess::{DecodeStats, Ess, ReadOptions, co_save_path, verify_identical};
pub use header::{Game, Header};
pub use plugins::{Plugin, PluginTable};
pub use refid::{RefId, RefIdFactory, RefIdType};
