use serde::{Deserialize, Serialize};

/// Size of the pointers stored inside the keyboard tables.
///
/// Native x64 and ARM64 layouts use 8-byte pointers, native x86 layouts 4-byte
/// pointers. The x86 layouts shipped for WOW64 are built with 64-bit pointers
/// although their code is 32-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bytes(self) -> u64 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(PointerWidth::Bits32),
            64 => Some(PointerWidth::Bits64),
            _ => None,
        }
    }
}

/// Read-only view of a virtual address space containing keyboard tables.
///
/// All reads are bounds-checked: an address range which is not entirely
/// readable returns `None`, never panics.
pub trait Memory {
    fn read_bytes(&self, address: u64, len: usize) -> Option<&[u8]>;

    fn pointer_width(&self) -> PointerWidth;

    fn read_u8(&self, address: u64) -> Option<u8> {
        self.read_bytes(address, 1).map(|b| b[0])
    }

    fn read_u16(&self, address: u64) -> Option<u16> {
        self.read_bytes(address, 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&self, address: u64) -> Option<u32> {
        self.read_bytes(address, 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&self, address: u64) -> Option<u64> {
        self.read_bytes(address, 8).map(|b| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            u64::from_le_bytes(raw)
        })
    }

    /// Read a pointer. A null pointer is `Some(0)`.
    fn read_ptr(&self, address: u64) -> Option<u64> {
        match self.pointer_width() {
            PointerWidth::Bits32 => self.read_u32(address).map(u64::from),
            PointerWidth::Bits64 => self.read_u64(address),
        }
    }

    /// Read a nul-terminated UTF-16 string of at most `max_chars` characters.
    /// The terminator is not included in the result.
    fn read_wstr(&self, address: u64, max_chars: usize) -> Option<Vec<u16>> {
        let mut text = Vec::new();
        let mut cur = address;
        while text.len() < max_chars {
            match self.read_u16(cur)? {
                0 => return Some(text),
                c => text.push(c),
            }
            cur = cur.checked_add(2)?;
        }
        None
    }

    /// True when `start < end` and all bytes in between are readable zeroes.
    fn is_zero(&self, start: u64, end: u64) -> bool {
        if start >= end {
            return false;
        }
        usize::try_from(end - start)
            .ok()
            .and_then(|len| self.read_bytes(start, len))
            .is_some_and(|bytes| bytes.iter().all(|b| *b == 0))
    }
}

/// Contiguous memory image mapped at a fixed base address.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    base: u64,
    data: Vec<u8>,
    width: PointerWidth,
}

impl ImageBuffer {
    pub fn new(base: u64, data: Vec<u8>, width: PointerWidth) -> Self {
        Self { base, data, width }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.data.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_pointer_width(&mut self, width: PointerWidth) {
        self.width = width;
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

impl Memory for ImageBuffer {
    fn read_bytes(&self, address: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        self.data.get(start..end)
    }

    fn pointer_width(&self) -> PointerWidth {
        self.width
    }
}
