//! Decoder of the `KBDTABLES` structure and of all the tables it points to.
//!
//! The tables come from a DLL we do not control. Decoding never fails: null
//! pointers become `None`, unreadable or unterminated arrays are cut where
//! memory stops and keep what was read so far.

use crate::config::DecodeLimits;
use crate::memory::{Memory, PointerWidth};
use serde::Serialize;
use tracing::{debug, warn};

/// A decoded value with the memory range it was read from.
/// For arrays, `size` includes the terminating element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located<T> {
    pub address: u64,
    pub size: u64,
    pub value: T,
}

impl<T> Located<T> {
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

/// Entry of `VK_TO_BIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VkToBit {
    pub vk: u8,
    pub mod_bits: u8,
}

/// The `MODIFIERS` structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modifiers {
    pub vk_to_bit: Option<Located<Vec<VkToBit>>>,
    /// Highest modifier bitmask, `mod_number` has one more element.
    pub max_mod_bits: u16,
    /// Modification number, indexed by modifier bitmask.
    pub mod_number: Vec<u8>,
}

/// Entry of a `VK_TO_WCHARSn` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VkToWchars {
    pub virtual_key: u8,
    pub attributes: u8,
    pub wch: Vec<u16>,
}

/// Entry of `VK_TO_WCHAR_TABLE`: one variable-stride array of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VkToWcharTable {
    pub modifications: u8,
    pub entry_size: u8,
    pub entries: Located<Vec<VkToWchars>>,
}

/// Entry of `DEADKEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadKey {
    pub both: u32,
    pub composed: u16,
    pub flags: u16,
}

impl DeadKey {
    /// Character typed after the dead key.
    pub fn base(&self) -> u16 {
        (self.both & 0xFFFF) as u16
    }

    /// The dead (accent) character.
    pub fn accent(&self) -> u16 {
        (self.both >> 16) as u16
    }
}

/// Entry of `VSC_LPWSTR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyName {
    pub vsc: u8,
    pub name: Option<Located<Vec<u16>>>,
}

/// Entry of `VSC_VK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VscVk {
    pub vsc: u8,
    pub vk: u16,
}

/// Entry of `LIGATUREn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ligature {
    pub virtual_key: u8,
    pub modification_number: u16,
    pub wch: Vec<u16>,
}

/// The decoded `KBDTABLES` root and every table reachable from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KbdTables {
    pub address: u64,
    pub size: u64,
    pub char_modifiers: Option<Located<Modifiers>>,
    pub vk_to_wchar: Option<Located<Vec<VkToWcharTable>>>,
    pub dead_keys: Option<Located<Vec<DeadKey>>>,
    pub key_names: Option<Located<Vec<KeyName>>>,
    pub key_names_ext: Option<Located<Vec<KeyName>>>,
    pub key_names_dead: Option<Located<Vec<Option<Located<Vec<u16>>>>>>,
    pub vsc_to_vk: Option<Located<Vec<u16>>>,
    pub max_vsc_to_vk: u8,
    pub vsc_to_vk_e0: Option<Located<Vec<VscVk>>>,
    pub vsc_to_vk_e1: Option<Located<Vec<VscVk>>>,
    pub locale_flags: u32,
    pub lg_max: u8,
    pub cb_lg_entry: u8,
    pub ligatures: Option<Located<Vec<Ligature>>>,
    pub kbd_type: u32,
    pub sub_type: u32,
}

/// Field offsets of `KBDTABLES` for a pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KbdTablesLayout {
    pub char_modifiers: u64,
    pub vk_to_wchar: u64,
    pub dead_key: u64,
    pub key_names: u64,
    pub key_names_ext: u64,
    pub key_names_dead: u64,
    pub vsc_to_vk: u64,
    pub max_vsc_to_vk: u64,
    pub vsc_to_vk_e0: u64,
    pub vsc_to_vk_e1: u64,
    pub locale_flags: u64,
    pub lg_max: u64,
    pub cb_lg_entry: u64,
    pub ligature: u64,
    pub kbd_type: u64,
    pub sub_type: u64,
    pub size: u64,
}

impl KbdTablesLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut c = FieldCursor::new(width);
        let char_modifiers = c.ptr();
        let vk_to_wchar = c.ptr();
        let dead_key = c.ptr();
        let key_names = c.ptr();
        let key_names_ext = c.ptr();
        let key_names_dead = c.ptr();
        let vsc_to_vk = c.ptr();
        let max_vsc_to_vk = c.field(1, 1);
        let vsc_to_vk_e0 = c.ptr();
        let vsc_to_vk_e1 = c.ptr();
        let locale_flags = c.field(4, 4);
        let lg_max = c.field(1, 1);
        let cb_lg_entry = c.field(1, 1);
        let ligature = c.ptr();
        let kbd_type = c.field(4, 4);
        let sub_type = c.field(4, 4);
        Self {
            char_modifiers,
            vk_to_wchar,
            dead_key,
            key_names,
            key_names_ext,
            key_names_dead,
            vsc_to_vk,
            max_vsc_to_vk,
            vsc_to_vk_e0,
            vsc_to_vk_e1,
            locale_flags,
            lg_max,
            cb_lg_entry,
            ligature,
            kbd_type,
            sub_type,
            size: c.finish(),
        }
    }
}

/// Size of a `VK_TO_WCHAR_TABLE` entry: a pointer and two bytes, padded.
pub fn vk_to_wchar_table_entry_size(width: PointerWidth) -> u64 {
    let mut c = FieldCursor::new(width);
    c.ptr();
    c.field(1, 1);
    c.field(1, 1);
    c.finish()
}

/// Size of a `VSC_LPWSTR` entry.
pub fn vsc_lpwstr_entry_size(width: PointerWidth) -> u64 {
    let mut c = FieldCursor::new(width);
    c.field(1, 1);
    c.ptr();
    c.finish()
}

pub const VK_TO_BIT_SIZE: u64 = 2;
pub const DEADKEY_SIZE: u64 = 8;
pub const VSC_VK_SIZE: u64 = 4;
/// Offset of `wch` in `VK_TO_WCHARSn`.
pub const VK_TO_WCHARS_HEADER: u64 = 2;
/// Offset of `wch` in `LIGATUREn`.
pub const LIGATURE_HEADER: u64 = 4;

/// Computes C struct field offsets with natural alignment.
struct FieldCursor {
    offset: u64,
    ptr: u64,
}

impl FieldCursor {
    fn new(width: PointerWidth) -> Self {
        Self { offset: 0, ptr: width.bytes() }
    }

    fn field(&mut self, size: u64, align: u64) -> u64 {
        self.offset = align_up(self.offset, align);
        let at = self.offset;
        self.offset += size;
        at
    }

    fn ptr(&mut self) -> u64 {
        let p = self.ptr;
        self.field(p, p)
    }

    fn finish(self) -> u64 {
        align_up(self.offset, self.ptr)
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

enum Step<T> {
    Entry(T),
    End,
}

/// Walk a terminated array of fixed-stride elements.
fn walk<T>(
    start: u64,
    stride: u64,
    limits: &DecodeLimits,
    what: &str,
    mut read: impl FnMut(u64) -> Option<Step<T>>,
) -> Located<Vec<T>> {
    let mut items = Vec::new();
    let mut cur = start;
    loop {
        if items.len() >= limits.max_entries {
            warn!("{} at 0x{:X}: more than {} entries, truncated", what, start, limits.max_entries);
            break;
        }
        match read(cur) {
            Some(Step::Entry(item)) => items.push(item),
            Some(Step::End) => {
                cur = cur.saturating_add(stride);
                break;
            }
            None => {
                warn!("{} at 0x{:X}: unreadable entry at 0x{:X}, truncated", what, start, cur);
                break;
            }
        }
        match cur.checked_add(stride) {
            Some(next) => cur = next,
            None => break,
        }
    }
    Located { address: start, size: cur - start, value: items }
}

fn non_null(ptr: Option<u64>) -> Option<u64> {
    ptr.filter(|p| *p != 0)
}

fn read_wstring(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Option<Located<Vec<u16>>> {
    let text = mem.read_wstr(address, limits.max_string_chars)?;
    let size = (text.len() as u64 + 1) * 2;
    Some(Located { address, size, value: text })
}

impl KbdTables {
    /// Decode the `KBDTABLES` structure at `address`.
    /// Returns `None` only when the root structure itself is unreadable.
    pub fn decode(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Option<KbdTables> {
        let width = mem.pointer_width();
        let layout = KbdTablesLayout::new(width);
        mem.read_bytes(address, usize::try_from(layout.size).ok()?)?;

        let field = |offset: u64| address.checked_add(offset);
        let ptr = |offset: u64| non_null(mem.read_ptr(field(offset)?));
        let max_vsc_to_vk = mem.read_u8(field(layout.max_vsc_to_vk)?)?;
        let lg_max = mem.read_u8(field(layout.lg_max)?)?;
        let cb_lg_entry = mem.read_u8(field(layout.cb_lg_entry)?)?;

        debug!("Decoding KBDTABLES at 0x{:X} ({:?})", address, width);

        let tables = KbdTables {
            address,
            size: layout.size,
            char_modifiers: ptr(layout.char_modifiers).map(|p| decode_modifiers(mem, p, limits)),
            vk_to_wchar: ptr(layout.vk_to_wchar).map(|p| decode_vk_to_wchar_table(mem, p, limits)),
            dead_keys: ptr(layout.dead_key).map(|p| decode_dead_keys(mem, p, limits)),
            key_names: ptr(layout.key_names).map(|p| decode_key_names(mem, p, limits)),
            key_names_ext: ptr(layout.key_names_ext).map(|p| decode_key_names(mem, p, limits)),
            key_names_dead: ptr(layout.key_names_dead).map(|p| decode_dead_key_names(mem, p, limits)),
            vsc_to_vk: ptr(layout.vsc_to_vk).map(|p| decode_scan_to_vk(mem, p, max_vsc_to_vk)),
            max_vsc_to_vk,
            vsc_to_vk_e0: ptr(layout.vsc_to_vk_e0).map(|p| decode_vsc_to_vk(mem, p, limits)),
            vsc_to_vk_e1: ptr(layout.vsc_to_vk_e1).map(|p| decode_vsc_to_vk(mem, p, limits)),
            locale_flags: mem.read_u32(field(layout.locale_flags)?)?,
            lg_max,
            cb_lg_entry,
            ligatures: ptr(layout.ligature)
                .map(|p| decode_ligatures(mem, p, usize::from(lg_max), u64::from(cb_lg_entry), limits)),
            kbd_type: mem.read_u32(field(layout.kbd_type)?)?,
            sub_type: mem.read_u32(field(layout.sub_type)?)?,
        };
        Some(tables)
    }
}

fn decode_modifiers(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Located<Modifiers> {
    let width = mem.pointer_width().bytes();
    let vk_to_bit = non_null(mem.read_ptr(address)).map(|p| {
        walk(p, VK_TO_BIT_SIZE, limits, "VK_TO_BIT", |at| {
            let vk = mem.read_u8(at)?;
            let mod_bits = mem.read_u8(at.checked_add(1)?)?;
            Some(if vk == 0 { Step::End } else { Step::Entry(VkToBit { vk, mod_bits }) })
        })
    });
    let Some(numbers) = address.checked_add(width + 2) else {
        warn!("MODIFIERS at 0x{:X}: beyond the address space", address);
        let value = Modifiers { vk_to_bit, max_mod_bits: 0, mod_number: Vec::new() };
        return Located { address, size: 0, value };
    };
    let max_mod_bits = mem.read_u16(address + width).unwrap_or(0);

    let count = (usize::from(max_mod_bits) + 1).min(limits.max_entries);
    let mut mod_number = Vec::with_capacity(count);
    for i in 0..count as u64 {
        match numbers.checked_add(i).and_then(|at| mem.read_u8(at)) {
            Some(n) => mod_number.push(n),
            None => {
                warn!("MODIFIERS at 0x{:X}: ModNumber truncated after {} entries", address, i);
                break;
            }
        }
    }

    Located {
        address,
        size: width + 2 + mod_number.len() as u64,
        value: Modifiers { vk_to_bit, max_mod_bits, mod_number },
    }
}

fn decode_vk_to_wchar_table(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Located<Vec<VkToWcharTable>> {
    let width = mem.pointer_width().bytes();
    let stride = vk_to_wchar_table_entry_size(mem.pointer_width());
    walk(address, stride, limits, "VK_TO_WCHAR_TABLE", |at| {
        let table = mem.read_ptr(at)?;
        if table == 0 {
            return Some(Step::End);
        }
        let modifications = mem.read_u8(at.checked_add(width)?)?;
        let entry_size = mem.read_u8(at.checked_add(width + 1)?)?;
        let entries = decode_vk_to_wchars(mem, table, modifications, entry_size, limits);
        Some(Step::Entry(VkToWcharTable { modifications, entry_size, entries }))
    })
}

fn decode_vk_to_wchars(
    mem: &dyn Memory,
    address: u64,
    count: u8,
    entry_size: u8,
    limits: &DecodeLimits,
) -> Located<Vec<VkToWchars>> {
    if u64::from(entry_size) < VK_TO_WCHARS_HEADER {
        warn!("VK_TO_WCHARS{} at 0x{:X}: invalid entry size {}", count, address, entry_size);
        return Located { address, size: 0, value: Vec::new() };
    }
    walk(address, u64::from(entry_size), limits, "VK_TO_WCHARS", |at| {
        let virtual_key = mem.read_u8(at)?;
        if virtual_key == 0 {
            return Some(Step::End);
        }
        let attributes = mem.read_u8(at.checked_add(1)?)?;
        let wch = read_wchars(mem, at.checked_add(VK_TO_WCHARS_HEADER)?, usize::from(count))?;
        Some(Step::Entry(VkToWchars { virtual_key, attributes, wch }))
    })
}

fn read_wchars(mem: &dyn Memory, address: u64, count: usize) -> Option<Vec<u16>> {
    (0..count as u64).map(|i| mem.read_u16(address.checked_add(2 * i)?)).collect()
}

fn decode_dead_keys(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Located<Vec<DeadKey>> {
    walk(address, DEADKEY_SIZE, limits, "DEADKEY", |at| {
        let both = mem.read_u32(at)?;
        if both == 0 {
            return Some(Step::End);
        }
        Some(Step::Entry(DeadKey {
            both,
            composed: mem.read_u16(at.checked_add(4)?)?,
            flags: mem.read_u16(at.checked_add(6)?)?,
        }))
    })
}

fn decode_key_names(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Located<Vec<KeyName>> {
    let width = mem.pointer_width();
    walk(address, vsc_lpwstr_entry_size(width), limits, "VSC_LPWSTR", |at| {
        let vsc = mem.read_u8(at)?;
        if vsc == 0 {
            return Some(Step::End);
        }
        let name = non_null(mem.read_ptr(at.checked_add(width.bytes())?)).and_then(|p| read_wstring(mem, p, limits));
        Some(Step::Entry(KeyName { vsc, name }))
    })
}

fn decode_dead_key_names(
    mem: &dyn Memory,
    address: u64,
    limits: &DecodeLimits,
) -> Located<Vec<Option<Located<Vec<u16>>>>> {
    walk(address, mem.pointer_width().bytes(), limits, "DEADKEY_LPWSTR", |at| {
        let name = mem.read_ptr(at)?;
        if name == 0 {
            return Some(Step::End);
        }
        Some(Step::Entry(read_wstring(mem, name, limits)))
    })
}

fn decode_scan_to_vk(mem: &dyn Memory, address: u64, count: u8) -> Located<Vec<u16>> {
    let mut vks = Vec::with_capacity(usize::from(count));
    for i in 0..u64::from(count) {
        match address.checked_add(2 * i).and_then(|at| mem.read_u16(at)) {
            Some(vk) => vks.push(vk),
            None => {
                warn!("Scan code table at 0x{:X}: truncated after {} entries", address, i);
                break;
            }
        }
    }
    Located { address, size: 2 * vks.len() as u64, value: vks }
}

fn decode_vsc_to_vk(mem: &dyn Memory, address: u64, limits: &DecodeLimits) -> Located<Vec<VscVk>> {
    walk(address, VSC_VK_SIZE, limits, "VSC_VK", |at| {
        let vsc = mem.read_u8(at)?;
        if vsc == 0 {
            return Some(Step::End);
        }
        Some(Step::Entry(VscVk { vsc, vk: mem.read_u16(at.checked_add(2)?)? }))
    })
}

fn decode_ligatures(
    mem: &dyn Memory,
    address: u64,
    count: usize,
    entry_size: u64,
    limits: &DecodeLimits,
) -> Located<Vec<Ligature>> {
    if entry_size < LIGATURE_HEADER {
        warn!("LIGATURE{} at 0x{:X}: invalid entry size {}", count, address, entry_size);
        return Located { address, size: 0, value: Vec::new() };
    }
    walk(address, entry_size, limits, "LIGATURE", |at| {
        let virtual_key = mem.read_u8(at)?;
        if virtual_key == 0 {
            return Some(Step::End);
        }
        Some(Step::Entry(Ligature {
            virtual_key,
            modification_number: mem.read_u16(at.checked_add(2)?)?,
            wch: read_wchars(mem, at.checked_add(LIGATURE_HEADER)?, count)?,
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ImageBuffer;

    #[test]
    fn kbdtables_layout_matches_the_c_compiler() {
        let l64 = KbdTablesLayout::new(PointerWidth::Bits64);
        assert_eq!(l64.max_vsc_to_vk, 56);
        assert_eq!(l64.vsc_to_vk_e0, 64);
        assert_eq!(l64.locale_flags, 80);
        assert_eq!(l64.cb_lg_entry, 85);
        assert_eq!(l64.ligature, 88);
        assert_eq!(l64.sub_type, 100);
        assert_eq!(l64.size, 104);

        let l32 = KbdTablesLayout::new(PointerWidth::Bits32);
        assert_eq!(l32.max_vsc_to_vk, 28);
        assert_eq!(l32.vsc_to_vk_e0, 32);
        assert_eq!(l32.ligature, 48);
        assert_eq!(l32.size, 60);

        assert_eq!(vk_to_wchar_table_entry_size(PointerWidth::Bits64), 16);
        assert_eq!(vk_to_wchar_table_entry_size(PointerWidth::Bits32), 8);
        assert_eq!(vsc_lpwstr_entry_size(PointerWidth::Bits64), 16);
        assert_eq!(vsc_lpwstr_entry_size(PointerWidth::Bits32), 8);
    }

    #[test]
    fn unreadable_root_is_none() {
        let img = ImageBuffer::new(0x1000, vec![0; 64], PointerWidth::Bits64);
        assert!(KbdTables::decode(&img, 0x1000, &DecodeLimits::default()).is_none());
        assert!(KbdTables::decode(&img, 0x2000, &DecodeLimits::default()).is_none());
    }

    #[test]
    fn all_null_root_decodes_to_empty_tables() {
        let img = ImageBuffer::new(0x1000, vec![0; 104], PointerWidth::Bits64);
        let tables = KbdTables::decode(&img, 0x1000, &DecodeLimits::default()).unwrap();
        assert!(tables.char_modifiers.is_none());
        assert!(tables.vk_to_wchar.is_none());
        assert!(tables.ligatures.is_none());
        assert_eq!(tables.size, 104);
    }

    #[test]
    fn unterminated_array_is_cut_at_end_of_memory() {
        // Root with only pVSCtoVK_E0 set, pointing to two entries and no terminator.
        let mut data = vec![0u8; 104 + 8];
        data[64..72].copy_from_slice(&(0x1000u64 + 104).to_le_bytes());
        data[104..108].copy_from_slice(&[0x1C, 0, 0x0D, 0x01]);
        data[108..112].copy_from_slice(&[0x1D, 0, 0xA3, 0x01]);
        let img = ImageBuffer::new(0x1000, data, PointerWidth::Bits64);

        let tables = KbdTables::decode(&img, 0x1000, &DecodeLimits::default()).unwrap();
        let e0 = tables.vsc_to_vk_e0.unwrap();
        assert_eq!(e0.value, vec![VscVk { vsc: 0x1C, vk: 0x010D }, VscVk { vsc: 0x1D, vk: 0x01A3 }]);
        assert_eq!(e0.size, 8);
    }

    #[test]
    fn entry_limit_truncates_walks() {
        let mut data = vec![0u8; 104 + 40];
        data[64..72].copy_from_slice(&(0x1000u64 + 104).to_le_bytes());
        for i in 0..10 {
            data[104 + 4 * i] = 0x10 + i as u8;
        }
        let img = ImageBuffer::new(0x1000, data, PointerWidth::Bits64);
        let limits = DecodeLimits { max_entries: 3, ..DecodeLimits::default() };

        let tables = KbdTables::decode(&img, 0x1000, &limits).unwrap();
        assert_eq!(tables.vsc_to_vk_e0.unwrap().value.len(), 3);
    }

    fn decode_sample(width: PointerWidth) -> KbdTables {
        let (img, at) = crate::fixture::sample_layout(width);
        KbdTables::decode(&img, at.tables, &DecodeLimits::default()).unwrap()
    }

    #[test]
    fn decodes_sample_layout_in_both_widths() {
        for width in [PointerWidth::Bits64, PointerWidth::Bits32] {
            let tables = decode_sample(width);

            let mods = tables.char_modifiers.as_ref().unwrap();
            assert_eq!(mods.value.max_mod_bits, 7);
            assert_eq!(mods.value.mod_number, vec![0, 1, 2, 4, 0x0F, 0x0F, 3, 5]);
            assert_eq!(mods.size, width.bytes() + 2 + 8);
            assert_eq!(mods.value.vk_to_bit.as_ref().unwrap().value.len(), 3);

            let vtw = tables.vk_to_wchar.as_ref().unwrap();
            let counts: Vec<u8> = vtw.value.iter().map(|t| t.modifications).collect();
            assert_eq!(counts, vec![2, 3, 4]);
            assert_eq!(vtw.size, 4 * vk_to_wchar_table_entry_size(width));
            let wchar3 = &vtw.value[1].entries;
            assert_eq!(wchar3.value.len(), 4);
            assert_eq!(wchar3.size, 5 * 8);
            assert_eq!(wchar3.value[1].virtual_key, 0xFF);

            let names = tables.key_names.as_ref().unwrap();
            let first = names.value[0].name.as_ref().unwrap();
            assert_eq!(String::from_utf16_lossy(&first.value), "ECHAP");
            assert_eq!(first.size, 12);

            let dead_names = tables.key_names_dead.as_ref().unwrap();
            assert_eq!(dead_names.value.len(), 1);
            assert_eq!(dead_names.size, 2 * width.bytes());

            assert_eq!(tables.vsc_to_vk.as_ref().unwrap().value.len(), 0x3A);
            assert_eq!(tables.max_vsc_to_vk, 0x3A);
            assert_eq!(tables.vsc_to_vk_e0.as_ref().unwrap().value.len(), 2);
            assert_eq!(tables.vsc_to_vk_e1.as_ref().unwrap().value[0], VscVk { vsc: 0x1D, vk: 0x13 });
            assert_eq!(tables.dead_keys.as_ref().unwrap().value.len(), 2);
            assert_eq!(tables.dead_keys.as_ref().unwrap().size, 24);

            let ligatures = tables.ligatures.as_ref().unwrap();
            assert_eq!(ligatures.value[0].wch, vec![0x7A, 0x7A]);
            assert_eq!(ligatures.value[0].modification_number, 3);

            assert_eq!(tables.locale_flags, 0x0001_0001);
            assert_eq!(tables.kbd_type, 4);
        }
    }

    #[test]
    fn wrong_pointer_width_does_not_panic() {
        let (mut img, at) = crate::fixture::sample_layout(PointerWidth::Bits32);
        img.set_pointer_width(PointerWidth::Bits64);
        // Garbage pointers must only produce empty or partial tables.
        let _ = KbdTables::decode(&img, at.tables, &DecodeLimits::default());
    }

    #[test]
    fn pointers_at_the_end_of_the_address_space() {
        let layout = KbdTablesLayout::new(PointerWidth::Bits64);
        let mut data = vec![0u8; 104];
        for offset in [
            layout.char_modifiers,
            layout.vk_to_wchar,
            layout.dead_key,
            layout.key_names,
            layout.key_names_ext,
            layout.key_names_dead,
            layout.vsc_to_vk,
            layout.vsc_to_vk_e0,
            layout.vsc_to_vk_e1,
            layout.ligature,
        ] {
            let at = offset as usize;
            data[at..at + 8].copy_from_slice(&(u64::MAX - 3).to_le_bytes());
        }
        data[layout.max_vsc_to_vk as usize] = 0xFF;
        data[layout.lg_max as usize] = 2;
        data[layout.cb_lg_entry as usize] = 8;
        let img = ImageBuffer::new(0x1000, data, PointerWidth::Bits64);

        let tables = KbdTables::decode(&img, 0x1000, &DecodeLimits::default()).unwrap();
        let mods = tables.char_modifiers.unwrap();
        assert_eq!(mods.address, u64::MAX - 3);
        assert_eq!(mods.size, 0);
        assert!(mods.value.vk_to_bit.is_none());
        assert!(mods.value.mod_number.is_empty());
        assert!(tables.vk_to_wchar.unwrap().value.is_empty());
        assert!(tables.vsc_to_vk.unwrap().value.is_empty());
        assert!(tables.ligatures.unwrap().value.is_empty());
        assert!(tables.key_names_dead.unwrap().value.is_empty());
    }

    #[test]
    fn root_at_the_end_of_the_address_space() {
        let img = ImageBuffer::new(0x1000, vec![0; 104], PointerWidth::Bits64);
        assert!(KbdTables::decode(&img, u64::MAX - 8, &DecodeLimits::default()).is_none());
    }

    #[test]
    fn dead_key_halves() {
        let dk = DeadKey { both: 0x005E_0061, composed: 0x00E2, flags: 0 };
        assert_eq!(dk.base(), u16::from(b'a'));
        assert_eq!(dk.accent(), u16::from(b'^'));
    }
}
