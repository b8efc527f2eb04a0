//! Generation of a C source file which rebuilds the keyboard tables.

use crate::grid::Grid;
use crate::regions::{page_size, RegionList};
use crate::symbols::{
    pointer, wstring_literal, Formatter, DEAD_KEY_FLAGS_SYMBOLS, MODIFIER_COMMENTS, MODIFIER_HEADERS,
    SHFT_INVALID_SYMBOLS, SHIFT_STATE_SYMBOLS, VK_ATTR_SYMBOLS, VK_FLAGS_SYMBOLS, VK_SYMBOLS,
};
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};
use wkl_core::kbd::{KBD_DLL_ENTRY_NAME, LIG_MAX_PREDEFINED};
use wkl_core::{
    DeadKey, KbdTables, KeyName, Ligature, Located, Memory, Modifiers, ReverseConfig, VkToBit, VkToWcharTable,
    VscVk,
};

const KEY_NAMES: &str = "key_names";
const KEY_NAMES_EXT: &str = "key_names_ext";
const KEY_NAMES_DEAD: &str = "key_names_dead";
const SCANCODE_TO_VK: &str = "scancode_to_vk";
const SCANCODE_TO_VK_E0: &str = "scancode_to_vk_e0";
const SCANCODE_TO_VK_E1: &str = "scancode_to_vk_e1";
const VK_TO_BITS: &str = "vk_to_bits";
const CHAR_MODIFIERS: &str = "char_modifiers";
const VK_TO_WCHAR: &str = "vk_to_wchar";
const DEAD_KEYS: &str = "dead_keys";
const LIGATURES: &str = "ligatures";
const KBD_TABLES: &str = "kbd_tables";

/// Keyboard types are usually below 42. Older layouts leave garbage in `dwType`.
const MAX_KBD_TYPE: u32 = 48;

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Name of the input file, for the generated header.
    pub input_name: String,
    /// Header comment lines replacing the generated header.
    pub headers: Vec<String>,
    /// Forced keyboard type.
    pub kbd_type: Option<u32>,
    /// Append a hexadecimal dump of all data structures.
    pub hexa_dump: bool,
}

pub struct SourceGenerator<'a> {
    config: &'a ReverseConfig,
    options: SourceOptions,
    fmt: Formatter,
    rule: String,
    regions: RegionList,
}

impl<'a> SourceGenerator<'a> {
    pub fn new(config: &'a ReverseConfig, options: SourceOptions) -> Self {
        Self {
            config,
            options,
            fmt: Formatter::new(config.output.numeric_only),
            rule: "-".repeat(config.output.rule_width),
            regions: RegionList::new(),
        }
    }

    /// Memory regions of the structures generated so far.
    pub fn regions(&self) -> &RegionList {
        &self.regions
    }

    pub fn kbd_type(&self, tables: &KbdTables) -> u32 {
        match self.options.kbd_type {
            Some(kbd_type) if kbd_type > 0 => kbd_type,
            _ if tables.kbd_type > 0 && tables.kbd_type < MAX_KBD_TYPE => tables.kbd_type,
            _ => self.config.output.default_kbd_type,
        }
    }

    pub fn generate(&mut self, out: &mut dyn Write, tables: &KbdTables, mem: &dyn Memory) -> io::Result<()> {
        self.regions = RegionList::new();
        self.gen_header(out, tables)?;

        if let Some(names) = &tables.key_names {
            self.gen_vsc_to_string(out, names, KEY_NAMES, "")?;
        }
        if let Some(names) = &tables.key_names_ext {
            self.gen_vsc_to_string(out, names, KEY_NAMES_EXT, " (extended keypad)")?;
        }
        if let Some(names) = &tables.key_names_dead {
            self.gen_dead_key_names(out, names)?;
        }
        if let Some(vks) = &tables.vsc_to_vk {
            self.gen_scan_to_vk(out, vks)?;
        }
        if let Some(table) = &tables.vsc_to_vk_e0 {
            self.gen_vsc_to_vk(out, table, SCANCODE_TO_VK_E0, " (scancodes with E0 prefix)")?;
        }
        if let Some(table) = &tables.vsc_to_vk_e1 {
            self.gen_vsc_to_vk(out, table, SCANCODE_TO_VK_E1, " (scancodes with E1 prefix)")?;
        }
        let mods = tables.char_modifiers.as_ref();
        if let Some(mods) = mods {
            self.gen_char_modifiers(out, mods)?;
        }
        if let Some(table) = &tables.vk_to_wchar {
            self.gen_vk_to_wchar(out, table, mods.map(|m| &m.value))?;
        }
        if let Some(dead_keys) = &tables.dead_keys {
            self.gen_dead_keys(out, dead_keys)?;
        }
        if let Some(ligatures) = &tables.ligatures {
            self.gen_ligatures(out, ligatures, usize::from(tables.lg_max), mods.map(|m| &m.value))?;
        }
        self.gen_kbd_tables(out, tables)?;

        if self.options.hexa_dump {
            self.regions.sort_and_merge(mem);
            let page = page_size(self.config.dump.page_size);
            self.regions.write_dump(out, mem, page, &self.rule)?;
        }
        Ok(())
    }

    fn section(&self, out: &mut dyn Write, title: &str) -> io::Result<()> {
        writeln!(out, "//{}", self.rule)?;
        writeln!(out, "// {}", title)?;
        writeln!(out, "//{}", self.rule)?;
        writeln!(out)
    }

    fn gen_header(&self, out: &mut dyn Write, tables: &KbdTables) -> io::Result<()> {
        if self.options.headers.is_empty() {
            writeln!(out, "//{}", self.rule)?;
            writeln!(out, "// {}", self.config.output.comment)?;
            writeln!(out, "// Automatically generated from {}", file_name(&self.options.input_name))?;
            writeln!(out, "//{}", self.rule)?;
        } else {
            for line in &self.options.headers {
                writeln!(out, "{}", line)?;
            }
        }
        writeln!(out)?;
        writeln!(out, "#define KBD_TYPE {}", self.kbd_type(tables))?;
        writeln!(out)?;
        writeln!(out, "#include <windows.h>")?;
        writeln!(out, "#include <kbd.h>")?;
        writeln!(out, "#include <dontuse.h>")?;
        writeln!(out)
    }

    fn gen_vsc_to_string(
        &mut self,
        out: &mut dyn Write,
        names: &Located<Vec<KeyName>>,
        name: &str,
        comment: &str,
    ) -> io::Result<()> {
        let mut grid = Grid::new();
        for entry in &names.value {
            grid.add_line([
                format!("{{0x{:02X},", entry.vsc),
                format!("{}}},", wstring_literal(entry.name.as_ref().map(|s| s.value.as_slice()))),
            ]);
            if let Some(text) = &entry.name {
                self.regions.push_located(format!("Strings in {}", name), text);
            }
        }
        grid.add_line(["{0x00,", "NULL}"]);
        self.regions.push_located(name, names);

        self.section(out, &format!("Scan codes to key names{}", comment))?;
        writeln!(out, "static VSC_LPWSTR {}[] = {{", name)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_dead_key_names(
        &mut self,
        out: &mut dyn Write,
        names: &Located<Vec<Option<Located<Vec<u16>>>>>,
    ) -> io::Result<()> {
        let mut grid = Grid::new();
        for entry in &names.value {
            let Some(text) = entry else {
                warn!("Unreadable dead key name in {}", KEY_NAMES_DEAD);
                continue;
            };
            // First character is the dead key, the rest is its name.
            if let Some((first, rest)) = text.value.split_first() {
                grid.add_line([
                    wstring_literal(Some(std::slice::from_ref(first))),
                    format!("{},", wstring_literal(Some(rest))),
                ]);
                self.regions.push_located(format!("Strings in {}", KEY_NAMES_DEAD), text);
            }
        }
        self.regions.push_located(KEY_NAMES_DEAD, names);

        self.section(out, "Names of dead keys")?;
        writeln!(out, "static DEADKEY_LPWSTR {}[] = {{", KEY_NAMES_DEAD)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "    NULL")?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_scan_to_vk(&mut self, out: &mut dyn Write, vks: &Located<Vec<u16>>) -> io::Result<()> {
        self.regions.push_located(SCANCODE_TO_VK, vks);

        self.section(out, "Scan code to virtual key conversion table")?;
        writeln!(out, "static USHORT {}[] = {{", SCANCODE_TO_VK)?;
        for (sc, &vk) in vks.value.iter().enumerate() {
            writeln!(
                out,
                "    /* {:02X} */ {},",
                sc,
                self.fmt.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, u32::from(vk), 4)
            )?;
        }
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_vsc_to_vk(
        &mut self,
        out: &mut dyn Write,
        table: &Located<Vec<VscVk>>,
        name: &str,
        comment: &str,
    ) -> io::Result<()> {
        let mut grid = Grid::new();
        for entry in &table.value {
            grid.add_line([
                format!("{{0x{:02X},", entry.vsc),
                format!("{}}},", self.fmt.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, u32::from(entry.vk), 4)),
            ]);
        }
        grid.add_line(["{0x00,", "0x0000}"]);
        self.regions.push_located(name, table);

        self.section(out, &format!("Scan code to virtual key conversion table{}", comment))?;
        writeln!(out, "static VSC_VK {}[] = {{", name)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_vk_to_bits(&mut self, out: &mut dyn Write, table: &Located<Vec<VkToBit>>) -> io::Result<()> {
        let mut grid = Grid::new();
        for entry in &table.value {
            grid.add_line([
                format!("{{{},", self.fmt.symbol(VK_SYMBOLS, u32::from(entry.vk), 2)),
                format!("{}}},", self.fmt.bit_mask(SHIFT_STATE_SYMBOLS, u32::from(entry.mod_bits), 4)),
            ]);
        }
        grid.add_line(["{0,", "0}"]);
        self.regions.push_located(VK_TO_BITS, table);

        self.section(out, "Associate a virtual key with a modifier bitmask")?;
        writeln!(out, "static VK_TO_BIT {}[] = {{", VK_TO_BITS)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_char_modifiers(&mut self, out: &mut dyn Write, mods: &Located<Modifiers>) -> io::Result<()> {
        if let Some(vk_to_bit) = &mods.value.vk_to_bit {
            self.gen_vk_to_bits(out, vk_to_bit)?;
        }

        let mut grid = Grid::new();
        for (i, &number) in mods.value.mod_number.iter().enumerate() {
            grid.add_line([format!("{},", self.fmt.symbol(SHFT_INVALID_SYMBOLS, u32::from(number), 0))]);
            if !self.fmt.numeric_only {
                if let Some(comment) = MODIFIER_COMMENTS.get(i) {
                    grid.add_column(format!("// {}", comment));
                }
            }
        }
        self.regions.push_located(CHAR_MODIFIERS, mods);

        self.section(out, "Map character modifier bits to modification number")?;
        writeln!(out, "static MODIFIERS {} = {{", CHAR_MODIFIERS)?;
        writeln!(out, "    .pVkToBit    = {},", pointer(mods.value.vk_to_bit.is_some(), VK_TO_BITS))?;
        writeln!(out, "    .wMaxModBits = {},", mods.value.max_mod_bits)?;
        writeln!(out, "    .ModNumber   = {{")?;
        grid.set_margin(8);
        grid.write_to(out)?;
        writeln!(out, "    }}")?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_vk_to_wchar(
        &mut self,
        out: &mut dyn Write,
        table: &Located<Vec<VkToWcharTable>>,
        mods: Option<&Modifiers>,
    ) -> io::Result<()> {
        let mut grid = Grid::new();
        for sub in &table.value {
            let name = format!("{}{}", VK_TO_WCHAR, sub.modifications);
            self.gen_sub_vk_to_wchar(out, sub, &name, mods)?;
            grid.add_line([
                format!("{{(PVK_TO_WCHARS1){},", name),
                format!("{},", sub.modifications),
                format!("sizeof({}[0])}},", name),
            ]);
        }
        grid.add_line(["{NULL,", "0,", "0}"]);
        self.regions.push_located(VK_TO_WCHAR, table);

        self.section(out, "Virtual Key to WCHAR translations with shift states")?;
        writeln!(out, "static VK_TO_WCHAR_TABLE {}[] = {{", VK_TO_WCHAR)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    /// Column titles for the characters of an entry, from the modifiers.
    fn modifier_titles(&self, mods: Option<&Modifiers>, count: usize) -> Option<Vec<String>> {
        let mods = mods.filter(|_| !self.fmt.numeric_only)?;
        let mut titles = vec![String::new(); count];
        let mut found = false;
        for (mask, &number) in mods.mod_number.iter().enumerate().take(MODIFIER_HEADERS.len()) {
            if let Some(title) = titles.get_mut(usize::from(number)) {
                *title = MODIFIER_HEADERS[mask].to_string();
                found = true;
            }
        }
        found.then_some(titles)
    }

    fn wchars_columns(&self, grid: &mut Grid, wch: &[u16]) {
        for (i, &wc) in wch.iter().enumerate() {
            let mut text = self.fmt.wchar(wc);
            if i == 0 {
                text.insert(0, '{');
            }
            text.push_str(if i + 1 == wch.len() { "}}," } else { "," });
            grid.add_column(text);
        }
    }

    fn gen_sub_vk_to_wchar(
        &mut self,
        out: &mut dyn Write,
        table: &VkToWcharTable,
        name: &str,
        mods: Option<&Modifiers>,
    ) -> io::Result<()> {
        let count = usize::from(table.modifications);
        let mut grid = Grid::new();

        if let Some(titles) = self.modifier_titles(mods, count) {
            grid.add_line(["//".to_string(), String::new()].into_iter().chain(titles));
            grid.add_underlines(&["//"], '-');
        }
        for entry in &table.entries.value {
            grid.add_line([
                format!("{{{},", self.fmt.symbol(VK_SYMBOLS, u32::from(entry.virtual_key), 2)),
                format!("{},", self.fmt.bit_mask(VK_ATTR_SYMBOLS, u32::from(entry.attributes), 2)),
            ]);
            self.wchars_columns(&mut grid, &entry.wch);
        }
        grid.add_line(std::iter::once("{0,").chain(std::iter::repeat("0,").take(count)).chain(["0}"]));
        self.regions.push_located(name, &table.entries);

        self.section(out, &format!("Virtual Key to WCHAR translations for {} shift states", count))?;
        writeln!(out, "static VK_TO_WCHARS{} {}[] = {{", count, name)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_dead_keys(&mut self, out: &mut dyn Write, dead_keys: &Located<Vec<DeadKey>>) -> io::Result<()> {
        let mut grid = Grid::new();
        grid.add_line(["//", "Accent", "Composed", "Flags"]);
        grid.add_underlines(&["//"], '-');
        for dk in &dead_keys.value {
            grid.add_line([
                format!("DEADTRANS({},", self.fmt.wchar(dk.base())),
                format!("{},", self.fmt.wchar(dk.accent())),
                format!("{},", self.fmt.wchar(dk.composed)),
                format!("{}),", self.fmt.bit_mask(DEAD_KEY_FLAGS_SYMBOLS, u32::from(dk.flags), 4)),
            ]);
        }
        self.regions.push_located(DEAD_KEYS, dead_keys);

        self.section(out, "Dead keys sequences translations")?;
        writeln!(out, "static DEADKEY {}[] = {{", DEAD_KEYS)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "    {{0, 0, 0}}")?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_ligatures(
        &mut self,
        out: &mut dyn Write,
        ligatures: &Located<Vec<Ligature>>,
        count: usize,
        mods: Option<&Modifiers>,
    ) -> io::Result<()> {
        let mut grid = Grid::new();
        for lg in &ligatures.value {
            grid.add_line([
                format!("{{{},", self.fmt.symbol(VK_SYMBOLS, u32::from(lg.virtual_key), 2)),
                format!("{},", lg.modification_number),
            ]);
            self.wchars_columns(&mut grid, &lg.wch);

            // Name of the modifiers for this modification number.
            let title = mods.filter(|_| !self.fmt.numeric_only).and_then(|mods| {
                mods.mod_number
                    .iter()
                    .take(MODIFIER_HEADERS.len())
                    .position(|&n| u16::from(n) == lg.modification_number)
                    .map(|mask| MODIFIER_HEADERS[mask])
            });
            if let Some(title) = title {
                grid.add_column(format!("// {}", title));
            }
        }

        let mut last: Vec<String> = vec!["{0,".into(), "0,".into()];
        match count {
            0 => last.push("}".into()),
            1 => last.push("{0}}".into()),
            _ => {
                last.push("{0, ".into());
                last.extend(std::iter::repeat("0,".to_string()).take(count - 2));
                last.push("0}}".into());
            }
        }
        grid.add_line(last);
        self.regions.push_located(LIGATURES, ligatures);

        self.section(out, "Ligatures to WCHAR translations")?;
        if count > LIG_MAX_PREDEFINED {
            writeln!(out, "TYPEDEF_LIGATURE({})", count)?;
            writeln!(out)?;
        }
        writeln!(out, "static LIGATURE{} {}[] = {{", count, LIGATURES)?;
        grid.set_margin(4);
        grid.write_to(out)?;
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn gen_kbd_tables(&mut self, out: &mut dyn Write, tables: &KbdTables) -> io::Result<()> {
        self.regions.push(KBD_TABLES, tables.address, tables.size);
        debug!("Generating {} at 0x{:X}", KBD_TABLES, tables.address);

        let char_modifiers = format!("&{}", CHAR_MODIFIERS);
        let ligatures = format!("(PLIGATURE1){}", LIGATURES);
        let max_vsc_to_vk = match tables.vsc_to_vk {
            Some(_) => format!("ARRAYSIZE({})", SCANCODE_TO_VK),
            None => "0".to_string(),
        };
        let cb_lg_entry = match tables.ligatures {
            Some(_) => format!("sizeof({}[0])", LIGATURES),
            None => "0".to_string(),
        };

        self.section(out, "Main keyboard layout structure, point to all tables")?;
        writeln!(out, "static KBDTABLES {} = {{", KBD_TABLES)?;
        writeln!(out, "    .pCharModifiers  = {},", pointer(tables.char_modifiers.is_some(), &char_modifiers))?;
        writeln!(out, "    .pVkToWcharTable = {},", pointer(tables.vk_to_wchar.is_some(), VK_TO_WCHAR))?;
        writeln!(out, "    .pDeadKey        = {},", pointer(tables.dead_keys.is_some(), DEAD_KEYS))?;
        writeln!(out, "    .pKeyNames       = {},", pointer(tables.key_names.is_some(), KEY_NAMES))?;
        writeln!(out, "    .pKeyNamesExt    = {},", pointer(tables.key_names_ext.is_some(), KEY_NAMES_EXT))?;
        writeln!(out, "    .pKeyNamesDead   = {},", pointer(tables.key_names_dead.is_some(), KEY_NAMES_DEAD))?;
        writeln!(out, "    .pusVSCtoVK      = {},", pointer(tables.vsc_to_vk.is_some(), SCANCODE_TO_VK))?;
        writeln!(out, "    .bMaxVSCtoVK     = {},", max_vsc_to_vk)?;
        writeln!(out, "    .pVSCtoVK_E0     = {},", pointer(tables.vsc_to_vk_e0.is_some(), SCANCODE_TO_VK_E0))?;
        writeln!(out, "    .pVSCtoVK_E1     = {},", pointer(tables.vsc_to_vk_e1.is_some(), SCANCODE_TO_VK_E1))?;
        writeln!(out, "    .fLocaleFlags    = {},", self.fmt.locale_flags(tables.locale_flags))?;
        writeln!(out, "    .nLgMax          = {},", tables.lg_max)?;
        writeln!(out, "    .cbLgEntry       = {},", cb_lg_entry)?;
        writeln!(out, "    .pLigature       = {},", pointer(tables.ligatures.is_some(), &ligatures))?;
        writeln!(out, "    .dwType          = {},", tables.kbd_type)?;
        writeln!(out, "    .dwSubType       = {},", tables.sub_type)?;
        writeln!(out, "}};")?;
        writeln!(out)?;

        self.section(out, "Keyboard layout entry point")?;
        writeln!(out, "__declspec(dllexport) PKBDTABLES {}(void)", KBD_DLL_ENTRY_NAME)?;
        writeln!(out, "{{")?;
        writeln!(out, "    return &{};", KBD_TABLES)?;
        writeln!(out, "}}")
    }
}

/// Leading `//` comment lines of an existing source file, to keep its header.
pub fn read_headers(input: &mut dyn BufRead) -> io::Result<Vec<String>> {
    let mut headers = Vec::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if input.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&raw);
        let line = text
            .trim_start_matches('\u{FEFF}')
            .trim_end_matches(|c: char| u32::from(c) < 0x20);
        if !line.starts_with("//") {
            break;
        }
        headers.push(line.to_string());
    }
    debug!("Kept {} header lines", headers.len());
    Ok(headers)
}

/// Last component of a Windows or Unix path.
fn file_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}
