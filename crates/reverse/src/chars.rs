//! Text table of the characters produced by each key.

use crate::grid::Grid;
use crate::symbols::{MODIFIER_HEADERS, VK_SYMBOLS};
use crate::UTF8_BOM;
use std::io::{self, Write};
use wkl_core::{KeyMap, VirtualKey};

/// Write one line per key record with its characters in each shift state.
/// Columns and lines without any printable character are dropped.
/// Virtual keys are always shown by name when they have one.
pub fn write_char_table(out: &mut dyn Write, map: &KeyMap) -> io::Result<()> {
    let mut grid = Grid::new();
    grid.add_line(["Scan code", "Virtual key"].into_iter().chain(MODIFIER_HEADERS));
    grid.add_underlines(&[], '-');

    for key in map.keys.iter().filter(|k| k.sc != 0) {
        for (record, extended) in [(&key.vk, false), (&key.evk, true)] {
            if record.is_used() {
                add_record(&mut grid, key.sc, record, extended);
            }
        }
    }

    grid.remove_empty_columns(2, 2);
    grid.remove_empty_lines(2, 2);
    grid.set_spacing(2);

    out.write_all(UTF8_BOM)?;
    grid.write_to(out)
}

fn add_record(grid: &mut Grid, sc: u16, record: &VirtualKey, extended: bool) {
    let sc = if extended { format!("{:02X} (ext)", sc) } else { format!("{:02X}", sc) };
    let vk = VK_SYMBOLS
        .find(u32::from(record.vk))
        .map_or_else(|| format!("{:02X}", record.vk), str::to_string);
    grid.add_line([sc, vk]);
    for &wc in &record.wc {
        grid.add_column(char_cell(wc));
    }
}

/// The character as text, empty for control characters.
fn char_cell(wc: u16) -> String {
    if wc < 0x20 || wc == 0x7F {
        return String::new();
    }
    char::decode_utf16([wc])
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkl_core::fixture::sample_layout;
    use wkl_core::{DecodeLimits, KbdTables, PointerWidth, WinKeyMap};

    fn sample_table() -> String {
        let (img, at) = sample_layout(PointerWidth::Bits64);
        let tables = KbdTables::decode(&img, at.tables, &DecodeLimits::default()).unwrap();
        let map = WinKeyMap::new(&tables).build_key_map();
        let mut out = Vec::new();
        write_char_table(&mut out, &map).unwrap();
        assert!(out.starts_with(UTF8_BOM));
        String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap()
    }

    #[test]
    fn sample_layout_table() {
        let text = sample_table();
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        assert_eq!(
            lines,
            vec![
                "Scan code  Virtual key  Base  Shift  AltGr",
                "---------  -----------  ----  -----  -----",
                "02         '1'          &     1",
                "10         'A'          a     A      æ",
                "11         'Z'          z     Z",
                "1A         VK_OEM_6     ^     ¨",
                "39         VK_SPACE",
            ]
        );
    }

    #[test]
    fn unnamed_virtual_keys_are_bare_hex() {
        let mut map = KeyMap::default();
        map.keys.resize(0x60, Default::default());
        map.keys[0x5F].sc = 0x5F;
        map.keys[0x5F].vk = VirtualKey { vk: 0x07, wc: [u16::from(b'x'), 0, 0, 0, 0, 0, 0, 0] };

        let mut out = Vec::new();
        write_char_table(&mut out, &map).unwrap();
        let text = String::from_utf8_lossy(&out[UTF8_BOM.len()..]).into_owned();
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        assert_eq!(lines[2], "5F         07           x");
    }

    #[test]
    fn extended_records_have_their_own_line() {
        let mut map = KeyMap::default();
        map.keys.resize(0x36, Default::default());
        map.keys[0x35].sc = 0x35;
        map.keys[0x35].vk = VirtualKey { vk: 0xDF, wc: [u16::from(b'!'), u16::from(b'/'), 0, 0, 0, 0, 0, 0] };
        map.keys[0x35].evk = VirtualKey { vk: 0x6F, wc: [u16::from(b'/'), 0, 0, 0, 0, 0, 0, 0] };

        let mut out = Vec::new();
        write_char_table(&mut out, &map).unwrap();
        let text = String::from_utf8_lossy(&out[UTF8_BOM.len()..]).into_owned();
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        assert_eq!(lines[2], "35         VK_OEM_8     !     /");
        assert_eq!(lines[3], "35 (ext)   VK_DIVIDE    /");
    }

    #[test]
    fn control_and_surrogate_cells() {
        assert_eq!(char_cell(0x0D), "");
        assert_eq!(char_cell(0x7F), "");
        assert_eq!(char_cell(0x20), " ");
        assert_eq!(char_cell(0x00E9), "é");
        assert_eq!(char_cell(0xD800), "\u{FFFD}");
    }
}
