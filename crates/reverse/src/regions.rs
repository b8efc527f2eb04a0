//! Memory regions visited while decoding, and their hexadecimal dump.

use std::io::{self, Write};
use tracing::{debug, warn};
use wkl_core::{Located, Memory};

pub const PADDING: &str = "Padding";
pub const UNREFERENCED: &str = "Unreferenced";
const START_OF_PAGE: &str = "Start of memory page before first data structure";
const END_OF_PAGE: &str = "End of memory page after last data structure";
const BYTES_PER_LINE: usize = 16;
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// One named data structure in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

impl Region {
    pub fn new(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self { name: name.into(), address, size }
    }

    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionList {
    regions: Vec<Region>,
}

impl RegionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn push(&mut self, name: impl Into<String>, address: u64, size: u64) {
        self.regions.push(Region::new(name, address, size));
    }

    pub fn push_located<T>(&mut self, name: impl Into<String>, data: &Located<T>) {
        self.push(name, data.address, data.size);
    }

    /// Sort by address, merge neighbours with the same name which are
    /// adjacent or separated by zeroes, and name the holes between regions.
    /// Empty regions are dropped.
    pub fn sort_and_merge(&mut self, mem: &dyn Memory) {
        let mut sorted = std::mem::take(&mut self.regions);
        sorted.retain(|r| r.size > 0);
        sorted.sort_by_key(|r| r.address);

        let mut merged: Vec<Region> = Vec::with_capacity(sorted.len());
        for region in sorted {
            if let Some(prev) = merged.last_mut() {
                let zero_gap = mem.is_zero(prev.end(), region.address);
                if prev.name == region.name && (prev.end() == region.address || zero_gap) {
                    prev.size = prev.end().max(region.end()) - prev.address;
                    continue;
                }
                if prev.end() < region.address {
                    let name = if zero_gap { PADDING } else { UNREFERENCED };
                    let gap = Region::new(name, prev.end(), region.address - prev.end());
                    merged.push(gap);
                }
            }
            merged.push(region);
        }
        debug!("{} memory regions after merge", merged.len());
        self.regions = merged;
    }

    /// Dump all regions and the rest of their memory pages. Call
    /// `sort_and_merge` first.
    pub fn write_dump(&self, out: &mut dyn Write, mem: &dyn Memory, page_size: u64, rule: &str) -> io::Result<()> {
        let (Some(first), Some(last)) = (self.regions.first(), self.regions.iter().map(Region::end).max()) else {
            warn!("No data structure to dump");
            return Ok(());
        };
        let page_size = page_size.max(1);
        let first_address = first.address;
        let first_page = first_address - first_address % page_size;
        let last_page = last.saturating_add((page_size - last % page_size) % page_size);
        let total = last_page - first_page;

        writeln!(out)?;
        writeln!(out, "//{}", rule)?;
        writeln!(out, "// Data structures dump")?;
        writeln!(out, "//{}", rule)?;
        writeln!(out, "//")?;
        writeln!(out, "// Total size: {} bytes ({} pages)", total, total / page_size)?;
        writeln!(out, "// Base: 0x{:08X}", first_page)?;
        writeln!(out, "// End:  0x{:08X}", last_page)?;

        if first_page < first_address {
            dump_region(out, mem, &Region::new(START_OF_PAGE, first_page, first_address - first_page))?;
        }
        for region in &self.regions {
            dump_region(out, mem, region)?;
        }
        if last < last_page {
            dump_region(out, mem, &Region::new(END_OF_PAGE, last, last_page - last))?;
        }
        Ok(())
    }
}

fn dump_region(out: &mut dyn Write, mem: &dyn Memory, region: &Region) -> io::Result<()> {
    let header = format!("{} ({} bytes)", region.name, region.size);
    writeln!(out, "//")?;
    writeln!(out, "// {}", header)?;
    writeln!(out, "// {}", "-".repeat(header.chars().count()))?;
    write_hexa(out, mem, region.address, region.size, "// ")
}

/// Hexadecimal and ASCII dump, 16 bytes per line. Unreadable bytes are `??`.
pub fn write_hexa(out: &mut dyn Write, mem: &dyn Memory, address: u64, size: u64, margin: &str) -> io::Result<()> {
    let end = address.saturating_add(size);
    let mut cur = address;
    while cur < end {
        let count = (end - cur).min(BYTES_PER_LINE as u64) as usize;
        let bytes: Vec<Option<u8>> = (0..count as u64).map(|i| mem.read_u8(cur + i)).collect();

        write!(out, "{}0x{:08X}: ", margin, cur)?;
        for byte in &bytes {
            match byte {
                Some(b) => write!(out, "{:02X} ", b)?,
                None => write!(out, "?? ")?,
            }
        }
        write!(out, "{}", " ".repeat(2 + 3 * (BYTES_PER_LINE - count)))?;
        let ascii: String = bytes
            .iter()
            .map(|b| match b {
                Some(c @ 0x20..=0x7E) => char::from(*c),
                _ => '.',
            })
            .collect();
        writeln!(out, "{}", ascii)?;
        cur += count as u64;
    }
    Ok(())
}

/// Page size for the dump: the configured one, else the system one.
pub fn page_size(configured: Option<u64>) -> u64 {
    configured.filter(|size| *size > 0).unwrap_or_else(system_page_size)
}

#[cfg(target_os = "windows")]
pub fn system_page_size() -> u64 {
    use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    let mut info = SYSTEM_INFO::default();
    unsafe { GetSystemInfo(&mut info) };
    match u64::from(info.dwPageSize) {
        0 => DEFAULT_PAGE_SIZE,
        size => size,
    }
}

#[cfg(not(target_os = "windows"))]
pub fn system_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkl_core::{ImageBuffer, PointerWidth};

    fn memory() -> ImageBuffer {
        let mut data = vec![0u8; 0x100];
        data[0x00..0x08].copy_from_slice(b"ABCDEFGH");
        data[0x0A..0x0C].copy_from_slice(b"IJ");
        data[0x20..0x24].copy_from_slice(b"junk");
        data[0x30..0x32].copy_from_slice(&[0x01, 0x7F]);
        ImageBuffer::new(0x1000, data, PointerWidth::Bits64)
    }

    #[test]
    fn merges_same_names_and_names_gaps() {
        let mem = memory();
        let mut list = RegionList::new();
        list.push("table", 0x1030, 2);
        list.push("Strings in key_names", 0x100A, 2);
        list.push("Strings in key_names", 0x1000, 8);
        list.push("other", 0x1010, 0x10);

        list.sort_and_merge(&mem);
        assert_eq!(
            list.regions(),
            &[
                Region::new("Strings in key_names", 0x1000, 0x0C),
                Region::new(PADDING, 0x100C, 4),
                Region::new("other", 0x1010, 0x10),
                Region::new(UNREFERENCED, 0x1020, 0x10),
                Region::new("table", 0x1030, 2),
            ]
        );
    }

    #[test]
    fn same_names_separated_by_data_are_kept_apart() {
        let mem = memory();
        let mut list = RegionList::new();
        list.push("x", 0x1010, 0x10);
        list.push("x", 0x1030, 2);
        list.sort_and_merge(&mem);
        assert_eq!(list.regions().len(), 3);
        assert_eq!(list.regions()[1].name, UNREFERENCED);
    }

    #[test]
    fn hexa_lines() {
        let mem = memory();
        let mut out = Vec::new();
        write_hexa(&mut out, &mem, 0x1000, 0x12, "// ").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "// 0x00001000: 41 42 43 44 45 46 47 48 00 00 49 4A 00 00 00 00   ABCDEFGH..IJ...."
        );
        assert_eq!(lines[1], format!("// 0x00001010: 00 00 {}..", " ".repeat(2 + 3 * 14)));
    }

    #[test]
    fn unreadable_bytes() {
        let mem = memory();
        let mut out = Vec::new();
        write_hexa(&mut out, &mem, 0x10FE, 4, "").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0x000010FE: 00 00 ?? ?? "));
        assert!(text.trim_end().ends_with("...."));
    }

    #[test]
    fn dump_covers_whole_pages() {
        let mem = memory();
        let mut list = RegionList::new();
        list.push("table", 0x1030, 2);
        list.sort_and_merge(&mem);
        let mut out = Vec::new();
        list.write_dump(&mut out, &mem, 0x40, "--").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("\n//--\n// Data structures dump\n//--\n//\n// Total size: 64 bytes (1 pages)\n"));
        assert!(text.contains("// Base: 0x00001000\n// End:  0x00001040\n"));
        assert!(text.contains(
            "//\n// Start of memory page before first data structure (48 bytes)\n// -----------------------------------------------------------\n"
        ));
        assert!(text.contains("// table (2 bytes)\n// ---------------\n// 0x00001030: 01 7F "));
        assert!(text.contains("// End of memory page after last data structure (14 bytes)\n"));
    }

    #[test]
    fn empty_regions_are_dropped() {
        let mem = memory();
        let mut list = RegionList::new();
        list.push("table", 0x1030, 2);
        list.push("char_modifiers", u64::MAX - 3, 0);
        list.sort_and_merge(&mem);
        assert_eq!(list.regions(), &[Region::new("table", 0x1030, 2)]);
    }

    #[test]
    fn dump_at_the_end_of_the_address_space() {
        let mem = memory();
        let mut list = RegionList::new();
        list.push("table", u64::MAX - 3, 2);
        list.sort_and_merge(&mem);
        let mut out = Vec::new();
        list.write_dump(&mut out, &mem, 0x1000, "--").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("// End:  0xFFFFFFFFFFFFFFFF\n"));
        assert!(text.contains("// table (2 bytes)\n// ---------------\n// 0xFFFFFFFFFFFFFFFC: ?? ?? "));
    }

    #[test]
    fn configured_page_size_wins() {
        assert_eq!(page_size(Some(8192)), 8192);
        assert_eq!(page_size(Some(0)), system_page_size());
        assert!(system_page_size() > 0);
    }
}
