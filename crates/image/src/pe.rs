//! Minimal PE loader: maps the headers and sections of a DLL at its
//! preferred image base, without relocations nor imports.

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};
use wkl_core::{ImageBuffer, Memory, PointerWidth};

/// Largest `SizeOfImage` we accept. Keyboard layouts are a few pages.
pub const MAX_IMAGE_SIZE: u32 = 64 * 1024 * 1024;

const DOS_MAGIC: &[u8] = b"MZ";
const PE_SIGNATURE: &[u8] = b"PE\0\0";
const OPTIONAL_MAGIC_PE32: u16 = 0x010B;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x020B;
const SECTION_HEADER_SIZE: u64 = 40;
const EXPORT_DIRECTORY_SIZE: usize = 40;
const MAX_EXPORT_NAME: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    X86,
    X64,
    Arm64,
}

impl Machine {
    pub fn from_coff(value: u16) -> Option<Self> {
        match value {
            0x014C => Some(Machine::X86),
            0x8664 => Some(Machine::X64),
            0xAA64 => Some(Machine::Arm64),
            _ => None,
        }
    }

    /// Pointer width of the native code for this machine.
    pub fn pointer_width(self) -> PointerWidth {
        match self {
            Machine::X86 => PointerWidth::Bits32,
            Machine::X64 | Machine::Arm64 => PointerWidth::Bits64,
        }
    }
}

/// Raw file content, addressed by file offset.
struct FileView<'a>(&'a [u8]);

impl Memory for FileView<'_> {
    fn read_bytes(&self, address: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(address).ok()?;
        self.0.get(start..start.checked_add(len)?)
    }

    fn pointer_width(&self) -> PointerWidth {
        PointerWidth::Bits64
    }
}

/// A PE file mapped in memory.
#[derive(Debug, Clone)]
pub struct PeImage {
    pub machine: Machine,
    pub image: ImageBuffer,
    export_rva: u32,
    export_size: u32,
}

impl PeImage {
    /// Map the content of a PE file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let file = FileView(bytes);
        let field = |offset: u64, what: &str| -> Result<u32> {
            file.read_u32(offset).ok_or_else(|| anyhow!("Truncated PE file, cannot read {}", what))
        };
        let field16 = |offset: u64, what: &str| -> Result<u16> {
            file.read_u16(offset).ok_or_else(|| anyhow!("Truncated PE file, cannot read {}", what))
        };

        if file.read_bytes(0, 2) != Some(DOS_MAGIC) {
            bail!("Not an executable file, missing MZ header");
        }
        let pe = u64::from(field(0x3C, "e_lfanew")?);
        if file.read_bytes(pe, 4) != Some(PE_SIGNATURE) {
            bail!("Not a PE file, missing PE signature at 0x{:X}", pe);
        }

        let coff = pe + 4;
        let machine_id = field16(coff, "machine")?;
        let machine = Machine::from_coff(machine_id)
            .ok_or_else(|| anyhow!("Unsupported machine type 0x{:04X}", machine_id))?;
        let section_count = field16(coff + 2, "NumberOfSections")?;
        let optional_size = field16(coff + 16, "SizeOfOptionalHeader")?;

        let optional = coff + 20;
        let (image_base, directories, directory_count_at) = match field16(optional, "optional header magic")? {
            OPTIONAL_MAGIC_PE32 => (u64::from(field(optional + 28, "ImageBase")?), optional + 96, optional + 92),
            OPTIONAL_MAGIC_PE32_PLUS => {
                let base = file.read_u64(optional + 24).context("Truncated PE file, cannot read ImageBase")?;
                (base, optional + 112, optional + 108)
            }
            magic => bail!("Invalid optional header magic 0x{:04X}", magic),
        };
        let image_size = field(optional + 56, "SizeOfImage")?;
        let headers_size = field(optional + 60, "SizeOfHeaders")?;
        if image_size == 0 || image_size > MAX_IMAGE_SIZE {
            bail!("Invalid image size {} bytes", image_size);
        }
        image_base
            .checked_add(u64::from(image_size))
            .ok_or_else(|| anyhow!("Image base 0x{:X} too high", image_base))?;

        let (export_rva, export_size) = if field(directory_count_at, "NumberOfRvaAndSizes")? > 0 {
            (field(directories, "export directory")?, field(directories + 4, "export directory")?)
        } else {
            (0, 0)
        };

        debug!(
            "PE {:?}, base 0x{:X}, size 0x{:X}, {} sections",
            machine, image_base, image_size, section_count
        );

        let mut data = vec![0u8; image_size as usize];
        let headers = (headers_size as usize).min(bytes.len()).min(data.len());
        data[..headers].copy_from_slice(&bytes[..headers]);

        let sections = optional + u64::from(optional_size);
        for index in 0..u64::from(section_count) {
            let header = sections + index * SECTION_HEADER_SIZE;
            let name = file.read_bytes(header, 8).context("Truncated section table")?;
            let name = String::from_utf8_lossy(name).trim_end_matches('\0').to_string();
            let virtual_size = field(header + 8, "section VirtualSize")?;
            let virtual_address = field(header + 12, "section VirtualAddress")?;
            let raw_size = field(header + 16, "section SizeOfRawData")?;
            let raw_pointer = field(header + 20, "section PointerToRawData")?;

            let wanted = if virtual_size == 0 { raw_size } else { raw_size.min(virtual_size) } as usize;
            let src = raw_pointer as usize;
            let dst = virtual_address as usize;
            let len = wanted.min(bytes.len().saturating_sub(src)).min(data.len().saturating_sub(dst));
            if len < wanted {
                warn!("Section {} truncated from {} to {} bytes", name, wanted, len);
            }
            if len == 0 {
                continue;
            }
            debug!("Section {}: RVA 0x{:X}, {} bytes", name, virtual_address, len);
            data[dst..dst + len].copy_from_slice(&bytes[src..src + len]);
        }

        Ok(Self {
            machine,
            image: ImageBuffer::new(image_base, data, machine.pointer_width()),
            export_rva,
            export_size,
        })
    }

    /// Virtual address of an exported symbol.
    pub fn export(&self, name: &str) -> Result<u64> {
        if self.export_rva == 0 {
            bail!("No export directory");
        }
        let base = self.image.base();
        let img = &self.image;
        let dir = base.checked_add(u64::from(self.export_rva)).context("Export directory outside of image")?;
        img.read_bytes(dir, EXPORT_DIRECTORY_SIZE).context("Export directory outside of image")?;
        let at = |table: u64, offset: u64| table.checked_add(offset).context("Export table outside of image");
        let read = |address: u64| img.read_u32(address).context("Export table outside of image");

        let function_count = read(dir + 20)?;
        let name_count = read(dir + 24)?;
        let functions = at(base, u64::from(read(dir + 28)?))?;
        let names = at(base, u64::from(read(dir + 32)?))?;
        let ordinals = at(base, u64::from(read(dir + 36)?))?;

        for i in 0..u64::from(name_count) {
            let name_rva = read(at(names, 4 * i)?)?;
            let found = base.checked_add(u64::from(name_rva)).and_then(|address| read_cstr(img, address));
            if found.as_deref() != Some(name.as_bytes()) {
                continue;
            }
            let ordinal = img.read_u16(at(ordinals, 2 * i)?).context("Export ordinals outside of image")?;
            if u32::from(ordinal) >= function_count {
                bail!("Invalid ordinal {} for export {}", ordinal, name);
            }
            let rva = read(at(functions, 4 * u64::from(ordinal))?)?;
            if rva >= self.export_rva && rva < self.export_rva.saturating_add(self.export_size) {
                bail!("Export {} is forwarded to another DLL", name);
            }
            return at(base, u64::from(rva));
        }
        bail!("Cannot find {} in exported symbols", name)
    }
}

fn read_cstr(mem: &dyn Memory, address: u64) -> Option<Vec<u8>> {
    let mut text = Vec::new();
    for offset in 0..MAX_EXPORT_NAME as u64 {
        match mem.read_u8(address.checked_add(offset)?)? {
            0 => return Some(text),
            c => text.push(c),
        }
    }
    None
}

/// Builds small PE files around a data section, for tests.
#[cfg(test)]
pub(crate) mod builder {
    use super::*;
    use wkl_core::fixture::ImageWriter;

    pub const SECTION_RVA: u64 = 0x1000;
    const HEADERS_SIZE: usize = 0x1000;

    pub fn machine_id(machine: Machine) -> u16 {
        match machine {
            Machine::X86 => 0x014C,
            Machine::X64 => 0x8664,
            Machine::Arm64 => 0xAA64,
        }
    }

    /// Append an export directory with a single function, returns its RVA and size.
    pub fn write_exports(w: &mut ImageWriter, base: u64, name: &str, function: u64) -> (u32, u32) {
        let rva = |address: u64| (address - base) as u32;
        let mut cname = name.as_bytes().to_vec();
        cname.push(0);
        let name_at = w.bytes(&cname);
        let functions = w.reserve(4, 4);
        w.put_u32(functions, rva(function));
        let names = w.reserve(4, 4);
        w.put_u32(names, rva(name_at));
        let ordinals = w.reserve(2, 2);
        let dir = w.reserve(EXPORT_DIRECTORY_SIZE as u64, 4);
        w.put_u32(dir + 20, 1);
        w.put_u32(dir + 24, 1);
        w.put_u32(dir + 28, rva(functions));
        w.put_u32(dir + 32, rva(names));
        w.put_u32(dir + 36, rva(ordinals));
        (rva(dir), (w.address() - dir) as u32)
    }

    /// Headers plus one section holding `section` at `SECTION_RVA`.
    pub fn build(machine: Machine, base: u64, section: Vec<u8>, exports: (u32, u32)) -> Vec<u8> {
        let pe32_plus = machine != Machine::X86;
        let optional_size: u16 = if pe32_plus { 0xF0 } else { 0xE0 };
        let image_size = (SECTION_RVA as usize + section.len()).div_ceil(0x1000) * 0x1000;

        let mut file = vec![0u8; HEADERS_SIZE];
        let mut put = |at: usize, bytes: &[u8]| file[at..at + bytes.len()].copy_from_slice(bytes);
        put(0, b"MZ");
        put(0x3C, &0x80u32.to_le_bytes());
        put(0x80, b"PE\0\0");
        put(0x84, &machine_id(machine).to_le_bytes());
        put(0x86, &1u16.to_le_bytes());
        put(0x94, &optional_size.to_le_bytes());
        let opt = 0x98;
        if pe32_plus {
            put(opt, &OPTIONAL_MAGIC_PE32_PLUS.to_le_bytes());
            put(opt + 24, &base.to_le_bytes());
            put(opt + 108, &16u32.to_le_bytes());
            put(opt + 112, &exports.0.to_le_bytes());
            put(opt + 116, &exports.1.to_le_bytes());
        } else {
            put(opt, &OPTIONAL_MAGIC_PE32.to_le_bytes());
            put(opt + 28, &(base as u32).to_le_bytes());
            put(opt + 92, &16u32.to_le_bytes());
            put(opt + 96, &exports.0.to_le_bytes());
            put(opt + 100, &exports.1.to_le_bytes());
        }
        put(opt + 56, &(image_size as u32).to_le_bytes());
        put(opt + 60, &(HEADERS_SIZE as u32).to_le_bytes());

        let sect = opt + usize::from(optional_size);
        put(sect, b".rdata\0\0");
        put(sect + 8, &(section.len() as u32).to_le_bytes());
        put(sect + 12, &(SECTION_RVA as u32).to_le_bytes());
        put(sect + 16, &(section.len() as u32).to_le_bytes());
        put(sect + 20, &(HEADERS_SIZE as u32).to_le_bytes());

        file.extend_from_slice(&section);
        file
    }
}
