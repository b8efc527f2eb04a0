//! Keyboard map drawn from a text template.
//!
//! Each cell of the template holds a hexadecimal scan code, optionally
//! followed by `e` for the extended key, padded with spaces. Every template
//! line with cells becomes two lines: Shift and Shift+AltGr on top, Base and
//! AltGr below. Other lines are copied unchanged.

use crate::UTF8_BOM;
use std::io::{self, BufRead, Write};
use tracing::error;
use wkl_core::kbd::ModBits;
use wkl_core::{KeyMap, VirtualKey};

const BASE: usize = 0;
const SHIFT: usize = ModBits::SHIFT.bits() as usize;
const ALTGR: usize = (ModBits::CTRL.bits() | ModBits::ALT.bits()) as usize;
const SHIFT_ALTGR: usize = SHIFT | ALTGR;

/// Render `template` with the characters of `map`. Returns the number of
/// invalid cells, which are copied unchanged.
pub fn write_keyboard_map(
    out: &mut dyn Write,
    template: &mut dyn BufRead,
    template_name: &str,
    map: &KeyMap,
) -> io::Result<usize> {
    out.write_all(UTF8_BOM)?;
    let mut invalid = 0;
    let mut raw = Vec::new();
    let mut line_number = 0;
    loop {
        raw.clear();
        if template.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        line_number += 1;
        let text = String::from_utf8_lossy(&raw);
        let mut text = text.trim_end_matches(|c| c == '\n' || c == '\r');
        if line_number == 1 {
            text = text.trim_start_matches('\u{FEFF}');
        }
        let line: Vec<char> = text.chars().collect();

        if !line.iter().any(char::is_ascii_hexdigit) {
            writeln!(out, "{}", text)?;
            continue;
        }
        let rendered = render_line(&line, map);
        if let Some(col) = rendered.invalid_at {
            let end = line[col..].iter().position(|c| !is_cell(*c)).map_or(line.len(), |n| col + n);
            let cell: String = line[col..end].iter().collect();
            error!("invalid cell \"{}\" in {}, line {}, col {}", cell, template_name, line_number, col + 1);
            invalid += 1;
        }
        writeln!(out, "{}", rendered.top)?;
        writeln!(out, "{}", rendered.bottom)?;
    }
    Ok(invalid)
}

struct RenderedLine {
    top: String,
    bottom: String,
    /// Index of the first invalid cell, rendering stopped there.
    invalid_at: Option<usize>,
}

fn is_cell(c: char) -> bool {
    c == ' ' || c.is_ascii_hexdigit()
}

fn render_line(line: &[char], map: &KeyMap) -> RenderedLine {
    let mut top = String::new();
    let mut bottom = String::new();
    let mut invalid_at = None;
    let mut end = 0;

    while let Some(hex) = line[end..].iter().position(char::is_ascii_hexdigit).map(|n| end + n) {
        // A cell starts at its leading spaces, not before the previous cell.
        let mut start = hex;
        while start > end && line[start - 1] == ' ' {
            start -= 1;
        }
        top.extend(&line[end..start]);
        bottom.extend(&line[end..start]);

        end = line[hex..].iter().position(|c| !is_cell(*c)).map_or(line.len(), |n| hex + n);
        let width = end - start;
        let Some(sc) = parse_scan_code(&line[hex..end]) else {
            invalid_at = Some(hex);
            end = start;
            break;
        };
        let extended = hex + 2 < end && line[hex + 2] == 'e';
        let record = map.get(sc).map(|key| key.record(extended)).filter(|r| r.is_used());

        let (left, right) = if width == 2 { (0, 0) } else { ((width - 3) / 2, width - (width - 3) / 2 - 3) };
        let separator = if width == 2 { "" } else { " " };
        let pad = |n: usize| " ".repeat(n);
        top.push_str(&format!(
            "{}{}{}{}{}",
            pad(left),
            printable(record, SHIFT),
            separator,
            printable(record, SHIFT_ALTGR),
            pad(right)
        ));
        bottom.push_str(&format!(
            "{}{}{}{}{}",
            pad(left),
            printable(record, BASE),
            separator,
            printable(record, ALTGR),
            pad(right)
        ));
    }

    top.extend(&line[end..]);
    bottom.extend(&line[end..]);
    RenderedLine { top, bottom, invalid_at }
}

/// Two hexadecimal digits at the start of the cell.
fn parse_scan_code(cell: &[char]) -> Option<u16> {
    match cell {
        [high, low, ..] => Some((high.to_digit(16)? * 16 + low.to_digit(16)?) as u16),
        _ => None,
    }
}

fn printable(record: Option<&VirtualKey>, mask: usize) -> char {
    let Some(wc) = record.map(|r| r.wc[mask]) else {
        return ' ';
    };
    if wc < 0x20 || wc == 0x7F {
        return ' ';
    }
    char::from_u32(u32::from(wc)).unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkl_core::fixture::sample_layout;
    use wkl_core::{DecodeLimits, KbdTables, PointerWidth, WinKeyMap};

    fn sample_map() -> KeyMap {
        let (img, at) = sample_layout(PointerWidth::Bits64);
        let tables = KbdTables::decode(&img, at.tables, &DecodeLimits::default()).unwrap();
        WinKeyMap::new(&tables).build_key_map()
    }

    fn render(template: &str, map: &KeyMap) -> (Vec<String>, usize) {
        let mut out = Vec::new();
        let invalid = write_keyboard_map(&mut out, &mut template.as_bytes(), "test.txt", map).unwrap();
        assert!(out.starts_with(UTF8_BOM));
        let text = String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap();
        (text.lines().map(str::to_string).collect(), invalid)
    }

    #[test]
    fn cells_become_two_lines() {
        let template = "+----+----+\n| 10 | 11 |\n+----+----+\n";
        let (lines, invalid) = render(template, &sample_map());
        assert_eq!(invalid, 0);
        assert_eq!(lines, vec!["+----+----+", "|A   |Z   |", "|a æ |z   |", "+----+----+"]);
    }

    #[test]
    fn narrow_and_wide_cells() {
        let (lines, _) = render("[10][  1a   ]\n", &sample_map());
        assert_eq!(lines, vec!["[A ][  ¨    ]", "[aæ][  ^    ]"]);
    }

    #[test]
    fn extended_and_unknown_keys() {
        let mut map = sample_map();
        map.keys[0x1C].evk.wc[BASE] = u16::from(b'E');
        map.keys[0x1C].vk.wc[BASE] = u16::from(b'R');
        let (lines, invalid) = render("|1c |1ce|50 |\r\n", &map);
        assert_eq!(invalid, 0);
        assert_eq!(lines, vec!["|   |   |   |", "|R  |E  |   |"]);
    }

    #[test]
    fn invalid_cell_stops_the_line() {
        let (lines, invalid) = render("|10 |1|11 |\n|2g|\n", &sample_map());
        assert_eq!(invalid, 2);
        assert_eq!(lines[0], "|A  |1|11 |");
        assert_eq!(lines[1], "|a æ|1|11 |");
        // 'g' ends the cell after one digit.
        assert_eq!(lines[2], "|2g|");
        assert_eq!(lines[3], "|2g|");
    }

    #[test]
    fn bom_and_plain_lines_are_kept() {
        let (lines, invalid) = render("\u{FEFF}+-- top row --+\n\n", &sample_map());
        assert_eq!(invalid, 0);
        assert_eq!(lines, vec!["+-- top row --+", ""]);
    }
}
