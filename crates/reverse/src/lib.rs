//! Output generators for decoded keyboard layouts: C source with optional
//! hexadecimal dump, character table, keyboard map and JSON key map.

pub mod chars;
pub mod grid;
pub mod map;
pub mod regions;
pub mod source;
pub mod symbols;

pub use chars::write_char_table;
pub use map::write_keyboard_map;
pub use source::{read_headers, SourceGenerator, SourceOptions};
pub use symbols::Formatter;

use anyhow::{Context, Result};
use std::io::Write;
use wkl_core::KeyMap;

/// Leading bytes of the UTF-8 text files.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The key map as pretty-printed JSON.
pub fn write_json(out: &mut dyn Write, map: &KeyMap) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, map).context("Failed to serialize key map")?;
    writeln!(out)?;
    Ok(())
}
