//! Synthetic keyboard layout images for tests.

use crate::kbd::{ModBits, VkAttributes, VkFlags, SHFT_INVALID, VK_NONE, WCH_DEAD, WCH_LGTR, WCH_NONE};
use crate::memory::{ImageBuffer, PointerWidth};
use crate::tables::{vk_to_wchar_table_entry_size, vsc_lpwstr_entry_size, KbdTablesLayout};

pub const BASE_64: u64 = 0x1_8000_0000;
pub const BASE_32: u64 = 0x1000_0000;
const PAGE: usize = 0x1000;

/// Appends C-like data to a memory image.
pub struct ImageWriter {
    base: u64,
    data: Vec<u8>,
    width: PointerWidth,
}

impl ImageWriter {
    pub fn new(base: u64, width: PointerWidth) -> Self {
        Self { base, data: Vec::new(), width }
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    /// Address of the next byte.
    pub fn address(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    pub fn align(&mut self, align: u64) {
        while self.address() % align != 0 {
            self.data.push(0);
        }
    }

    /// Append zeroed space, returns its address.
    pub fn reserve(&mut self, size: u64, align: u64) -> u64 {
        self.align(align);
        let at = self.address();
        self.data.resize(self.data.len() + size as usize, 0);
        at
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> u64 {
        let at = self.address();
        self.data.extend_from_slice(bytes);
        at
    }

    pub fn u16s(&mut self, values: &[u16]) -> u64 {
        self.align(2);
        let at = self.address();
        for v in values {
            self.data.extend_from_slice(&v.to_le_bytes());
        }
        at
    }

    /// Nul-terminated UTF-16 string.
    pub fn wstr(&mut self, text: &str) -> u64 {
        let mut units: Vec<u16> = text.encode_utf16().collect();
        units.push(0);
        self.u16s(&units)
    }

    fn offset(&self, address: u64) -> usize {
        (address - self.base) as usize
    }

    pub fn put_u8(&mut self, address: u64, value: u8) {
        let at = self.offset(address);
        self.data[at] = value;
    }

    pub fn put_u16(&mut self, address: u64, value: u16) {
        let at = self.offset(address);
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, address: u64, value: u32) {
        let at = self.offset(address);
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_ptr(&mut self, address: u64, value: u64) {
        let at = self.offset(address);
        match self.width {
            PointerWidth::Bits32 => self.data[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes()),
            PointerWidth::Bits64 => self.data[at..at + 8].copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// Pad to a page boundary and build the image.
    pub fn finish(mut self) -> ImageBuffer {
        let len = self.data.len().div_ceil(PAGE).max(1) * PAGE;
        self.data.resize(len, 0);
        ImageBuffer::new(self.base, self.data, self.width)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

const fn c(ch: char) -> u16 {
    ch as u16
}

const CAPLOK: u8 = VkAttributes::CAPLOK.bits();
const KBDEXT: u16 = VkFlags::EXT.bits();

/// Address of the main structures of the sample layout.
#[derive(Debug, Clone, Copy)]
pub struct SampleAddresses {
    pub tables: u64,
    pub key_names: u64,
    pub junk: u64,
}

/// Write a small French-like layout, returns the address of its `KBDTABLES`.
///
/// Scan codes: 01 Escape, 02 '1', 10 'A', 11 'Z', 1A dead '^', 1C Return
/// (also E0 1C), 2A left Shift, 38 Alt (E0 38 right Alt), 39 Space.
pub fn write_sample_layout(w: &mut ImageWriter) -> SampleAddresses {
    let width = w.width();
    let ptr = width.bytes();

    // Key names.
    let names: Vec<(u8, u64)> = vec![(0x01, w.wstr("ECHAP")), (0x39, w.wstr("ESPACE"))];
    let key_names = write_vsc_lpwstr(w, &names);
    let names_ext = vec![(0x1C, w.wstr("ENTREE (PAVE NUM.)"))];
    let key_names_ext = write_vsc_lpwstr(w, &names_ext);
    let dead_name = w.wstr("^CIRCONFLEXE");
    let key_names_dead = w.reserve(2 * ptr, ptr);
    w.put_ptr(key_names_dead, dead_name);

    // Unreferenced data between two tables.
    let junk = w.bytes(b"junk");

    // Scan codes.
    let mut vsc = vec![u16::from(VK_NONE); 0x3A];
    vsc[0x01] = 0x1B; // VK_ESCAPE
    vsc[0x02] = 0x31;
    vsc[0x10] = 0x41;
    vsc[0x11] = 0x5A;
    vsc[0x1A] = 0xDD; // VK_OEM_6
    vsc[0x1C] = 0x0D; // VK_RETURN
    vsc[0x2A] = 0xA0; // VK_LSHIFT
    vsc[0x38] = 0x12; // VK_MENU
    vsc[0x39] = 0x20; // VK_SPACE
    let scancode_to_vk = w.u16s(&vsc);
    let e0 = write_vsc_vk(w, &[(0x1C, 0x0D | KBDEXT), (0x38, 0xA5 | KBDEXT)]);
    let e1 = write_vsc_vk(w, &[(0x1D, 0x13)]);

    // Modifiers.
    let vk_to_bits = w.bytes(&[
        0x10,
        ModBits::SHIFT.bits() as u8,
        0x11,
        ModBits::CTRL.bits() as u8,
        0x12,
        ModBits::ALT.bits() as u8,
        0,
        0,
    ]);
    let modifiers = w.reserve(ptr + 2 + 8, ptr);
    w.put_ptr(modifiers, vk_to_bits);
    w.put_u16(modifiers + ptr, 7);
    for (i, n) in [0, 1, 2, 4, SHFT_INVALID, SHFT_INVALID, 3, 5].into_iter().enumerate() {
        w.put_u8(modifiers + ptr + 2 + i as u64, n);
    }

    // Characters.
    let wchar2 = write_vk_to_wchars(w, &[(0x20, 0, [c(' '), c(' ')])]);
    let wchar3 = write_vk_to_wchars(
        w,
        &[
            (0xDD, CAPLOK, [WCH_DEAD, 0x00A8, 0x001B]),
            (VK_NONE, 0, [c('^'), WCH_NONE, WCH_NONE]),
            (0x0D, 0, [c('\r'), c('\r'), c('\n')]),
            (0x1B, 0, [0x001B, 0x001B, 0x001B]),
        ],
    );
    let wchar4 = write_vk_to_wchars(
        w,
        &[
            (0x41, CAPLOK, [c('a'), c('A'), WCH_NONE, 0x00E6]),
            (0x5A, CAPLOK, [c('z'), c('Z'), WCH_NONE, WCH_LGTR]),
            (0x31, CAPLOK, [c('&'), c('1'), WCH_NONE, WCH_NONE]),
        ],
    );
    let table_entry = vk_to_wchar_table_entry_size(width);
    let vk_to_wchar = w.reserve(4 * table_entry, ptr);
    for (i, (table, n)) in [(wchar2, 2u8), (wchar3, 3), (wchar4, 4)].into_iter().enumerate() {
        let at = vk_to_wchar + i as u64 * table_entry;
        w.put_ptr(at, table);
        w.put_u8(at + ptr, n);
        w.put_u8(at + ptr + 1, 2 + 2 * n);
    }

    // Dead keys: DEADTRANS(ch, accent, composed, flags).
    let dead_keys = w.reserve(3 * 8, 4);
    for (i, (ch, accent, composed)) in [(c('a'), c('^'), 0x00E2), (c(' '), c('^'), c('^'))].into_iter().enumerate() {
        let at = dead_keys + 8 * i as u64;
        w.put_u32(at, u32::from(ch) | (u32::from(accent) << 16));
        w.put_u16(at + 4, composed);
    }

    // Ligatures: LIGATURE2.
    let ligatures = w.reserve(2 * 8, 2);
    w.put_u8(ligatures, 0x5A);
    w.put_u16(ligatures + 2, 3);
    w.put_u16(ligatures + 4, c('z'));
    w.put_u16(ligatures + 6, c('z'));

    // Root.
    let l = KbdTablesLayout::new(width);
    let tables = w.reserve(l.size, ptr);
    w.put_ptr(tables + l.char_modifiers, modifiers);
    w.put_ptr(tables + l.vk_to_wchar, vk_to_wchar);
    w.put_ptr(tables + l.dead_key, dead_keys);
    w.put_ptr(tables + l.key_names, key_names);
    w.put_ptr(tables + l.key_names_ext, key_names_ext);
    w.put_ptr(tables + l.key_names_dead, key_names_dead);
    w.put_ptr(tables + l.vsc_to_vk, scancode_to_vk);
    w.put_u8(tables + l.max_vsc_to_vk, vsc.len() as u8);
    w.put_ptr(tables + l.vsc_to_vk_e0, e0);
    w.put_ptr(tables + l.vsc_to_vk_e1, e1);
    w.put_u32(tables + l.locale_flags, 0x0001_0001);
    w.put_u8(tables + l.lg_max, 2);
    w.put_u8(tables + l.cb_lg_entry, 8);
    w.put_ptr(tables + l.ligature, ligatures);
    w.put_u32(tables + l.kbd_type, 4);

    SampleAddresses { tables, key_names, junk }
}

/// The sample layout alone in an image.
pub fn sample_layout(width: PointerWidth) -> (ImageBuffer, SampleAddresses) {
    let base = match width {
        PointerWidth::Bits32 => BASE_32,
        PointerWidth::Bits64 => BASE_64,
    };
    let mut w = ImageWriter::new(base, width);
    w.reserve(0x40, 1);
    let addresses = write_sample_layout(&mut w);
    (w.finish(), addresses)
}

fn write_vsc_lpwstr(w: &mut ImageWriter, entries: &[(u8, u64)]) -> u64 {
    let ptr = w.width().bytes();
    let size = vsc_lpwstr_entry_size(w.width());
    let start = w.reserve(size * (entries.len() as u64 + 1), ptr);
    for (i, (vsc, name)) in entries.iter().enumerate() {
        let at = start + i as u64 * size;
        w.put_u8(at, *vsc);
        w.put_ptr(at + ptr, *name);
    }
    start
}

fn write_vsc_vk(w: &mut ImageWriter, entries: &[(u8, u16)]) -> u64 {
    let start = w.reserve(4 * (entries.len() as u64 + 1), 2);
    for (i, (vsc, vk)) in entries.iter().enumerate() {
        let at = start + 4 * i as u64;
        w.put_u8(at, *vsc);
        w.put_u16(at + 2, *vk);
    }
    start
}

fn write_vk_to_wchars<const N: usize>(w: &mut ImageWriter, entries: &[(u8, u8, [u16; N])]) -> u64 {
    let size = 2 + 2 * N as u64;
    let start = w.reserve(size * (entries.len() as u64 + 1), 2);
    for (i, (vk, attributes, wch)) in entries.iter().enumerate() {
        let at = start + i as u64 * size;
        w.put_u8(at, *vk);
        w.put_u8(at + 1, *attributes);
        for (j, ch) in wch.iter().enumerate() {
            w.put_u16(at + 2 + 2 * j as u64, *ch);
        }
    }
    start
}
