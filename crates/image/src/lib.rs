pub mod entry;
pub mod pe;

pub use pe::{Machine, PeImage};

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use wkl_core::kbd::KBD_DLL_ENTRY_NAME;
use wkl_core::{ImageBuffer, Memory, PointerWidth};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Width of the pointers inside the tables, default from the machine type.
    pub pointer_width: Option<PointerWidth>,
}

/// A keyboard layout DLL mapped in memory.
#[derive(Debug, Clone)]
pub struct LoadedLayout {
    pub machine: Machine,
    pub image: ImageBuffer,
    /// Address of the `KBDTABLES` structure.
    pub tables: u64,
}

impl LoadedLayout {
    pub fn pointer_width(&self) -> PointerWidth {
        self.image.pointer_width()
    }
}

/// Map a keyboard layout DLL and locate its tables.
pub fn load_layout(path: &Path, options: &LoadOptions) -> Result<LoadedLayout> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // Read-only mapping, copied into the image before being dropped.
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map {}", path.display()))?;
    let layout = map_layout(&map, options).with_context(|| format!("Invalid keyboard layout {}", path.display()))?;
    info!("Loaded {} ({:?}), KBDTABLES at 0x{:X}", path.display(), layout.machine, layout.tables);
    Ok(layout)
}

/// Same as `load_layout` on the content of a file.
pub fn map_layout(bytes: &[u8], options: &LoadOptions) -> Result<LoadedLayout> {
    let pe = PeImage::parse(bytes)?;
    let entry = pe.export(KBD_DLL_ENTRY_NAME)?;
    debug!("{} at 0x{:X}", KBD_DLL_ENTRY_NAME, entry);

    let tables = entry::returned_address(&pe.image, pe.machine, entry)?;
    if !pe.image.contains(tables) {
        bail!("{}() returns 0x{:X}, outside of the image", KBD_DLL_ENTRY_NAME, tables);
    }

    let PeImage { machine, mut image, .. } = pe;
    let width = options.pointer_width.unwrap_or_else(|| machine.pointer_width());
    if width != machine.pointer_width() {
        debug!("Reading tables of {:?} image with {:?} pointers", machine, width);
    }
    image.set_pointer_width(width);
    Ok(LoadedLayout { machine, image, tables })
}

/// File name of a keyboard layout. A plain name such as `fr` designates
/// `%SYSTEMROOT%\System32\kbdfr.dll`, anything else is a file path.
pub fn resolve_input(name: &str) -> PathBuf {
    resolve_input_in(name, std::env::var("SYSTEMROOT").ok().as_deref())
}

fn resolve_input_in(name: &str, system_root: Option<&str>) -> PathBuf {
    if name.contains(&[':', '\\', '/', '.'][..]) {
        PathBuf::from(name)
    } else {
        let root = system_root.unwrap_or(r"C:\Windows");
        PathBuf::from(format!(r"{}\System32\kbd{}.dll", root, name))
    }
}

#[cfg(test)]
mod tests {
    use super::pe::builder;
    use super::*;
    use wkl_core::fixture::{write_sample_layout, ImageWriter, BASE_32, BASE_64};
    use wkl_core::{DecodeLimits, KbdTables};

    /// A complete layout DLL: the sample tables, the entry point and its export.
    fn layout_dll(machine: Machine, width: PointerWidth) -> (Vec<u8>, u64) {
        let base = if machine == Machine::X86 { BASE_32 } else { BASE_64 };
        let mut w = ImageWriter::new(base + builder::SECTION_RVA, width);
        let tables = write_sample_layout(&mut w).tables;
        w.align(16);
        let function = w.address();
        w.bytes(&entry::encode_return(machine, function, tables));
        let exports = builder::write_exports(&mut w, base, KBD_DLL_ENTRY_NAME, function);
        (builder::build(machine, base, w.into_bytes(), exports), tables)
    }

    #[test]
    fn maps_native_layouts() {
        for (machine, width) in [
            (Machine::X64, PointerWidth::Bits64),
            (Machine::Arm64, PointerWidth::Bits64),
            (Machine::X86, PointerWidth::Bits32),
        ] {
            let (dll, tables) = layout_dll(machine, width);
            let layout = map_layout(&dll, &LoadOptions::default()).unwrap();
            assert_eq!(layout.machine, machine);
            assert_eq!(layout.tables, tables);
            assert_eq!(layout.pointer_width(), width);

            let decoded = KbdTables::decode(&layout.image, layout.tables, &DecodeLimits::default()).unwrap();
            assert_eq!(decoded.kbd_type, 4);
            assert_eq!(decoded.vk_to_wchar.unwrap().value.len(), 3);
        }
    }

    #[test]
    fn pointer_width_can_be_forced() {
        // x86 code with 64-bit tables, as for WOW64 layouts.
        let (dll, tables) = layout_dll(Machine::X86, PointerWidth::Bits64);
        let options = LoadOptions { pointer_width: Some(PointerWidth::Bits64) };
        let layout = map_layout(&dll, &options).unwrap();
        assert_eq!(layout.pointer_width(), PointerWidth::Bits64);
        let decoded = KbdTables::decode(&layout.image, tables, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded.char_modifiers.unwrap().value.max_mod_bits, 7);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_layout(Path::new("/nonexistent/kbdxx.dll"), &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to open /nonexistent/kbdxx.dll"));
    }

    #[test]
    fn layout_names_and_file_names() {
        assert_eq!(resolve_input_in("fr", None), PathBuf::from(r"C:\Windows\System32\kbdfr.dll"));
        assert_eq!(resolve_input_in("us", Some(r"D:\WINNT")), PathBuf::from(r"D:\WINNT\System32\kbdus.dll"));
        assert_eq!(resolve_input_in("kbdfr.dll", None), PathBuf::from("kbdfr.dll"));
        assert_eq!(resolve_input_in("./kbdfr", None), PathBuf::from("./kbdfr"));
        assert_eq!(resolve_input_in(r"C:\x\y", None), PathBuf::from(r"C:\x\y"));
    }
}
