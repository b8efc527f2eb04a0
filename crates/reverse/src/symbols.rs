//! Translation of numeric values into the macro names of `kbd.h` and
//! `winuser.h`, and C literals for characters and strings.

use wkl_core::kbd::{DKF_DEAD, KBD_VERSION, KLLF_ALTGR, KLLF_LRM_RLM, KLLF_SHIFTLOCK, SHFT_INVALID, WCH_DEAD, WCH_LGTR, WCH_NONE};

/// Value to symbol table, sorted by value.
#[derive(Debug, Clone, Copy)]
pub struct SymbolTable(&'static [(u32, &'static str)]);

impl SymbolTable {
    pub fn find(&self, value: u32) -> Option<&'static str> {
        self.0
            .binary_search_by_key(&value, |(v, _)| *v)
            .ok()
            .map(|index| self.0[index].1)
    }

    pub fn entries(&self) -> &'static [(u32, &'static str)] {
        self.0
    }

    /// All bits used by the symbols.
    pub fn mask(&self) -> u32 {
        self.0.iter().fold(0, |mask, (v, _)| mask | v)
    }
}

pub const SHIFT_STATE_SYMBOLS: SymbolTable = SymbolTable(&[
    (0x00, "KBDBASE"),
    (0x01, "KBDSHIFT"),
    (0x02, "KBDCTRL"),
    (0x04, "KBDALT"),
    (0x08, "KBDKANA"),
    (0x10, "KBDROYA"),
    (0x20, "KBDLOYA"),
    (0x80, "KBDGRPSELTAP"),
]);

pub const VK_SYMBOLS: SymbolTable = SymbolTable(&[
    (0x01, "VK_LBUTTON"),
    (0x02, "VK_RBUTTON"),
    (0x03, "VK_CANCEL"),
    (0x04, "VK_MBUTTON"),
    (0x05, "VK_XBUTTON1"),
    (0x06, "VK_XBUTTON2"),
    (0x08, "VK_BACK"),
    (0x09, "VK_TAB"),
    (0x0C, "VK_CLEAR"),
    (0x0D, "VK_RETURN"),
    (0x10, "VK_SHIFT"),
    (0x11, "VK_CONTROL"),
    (0x12, "VK_MENU"),
    (0x13, "VK_PAUSE"),
    (0x14, "VK_CAPITAL"),
    (0x15, "VK_KANA"),
    (0x16, "VK_IME_ON"),
    (0x17, "VK_JUNJA"),
    (0x18, "VK_FINAL"),
    (0x19, "VK_HANJA"),
    (0x1A, "VK_IME_OFF"),
    (0x1B, "VK_ESCAPE"),
    (0x1C, "VK_CONVERT"),
    (0x1D, "VK_NONCONVERT"),
    (0x1E, "VK_ACCEPT"),
    (0x1F, "VK_MODECHANGE"),
    (0x20, "VK_SPACE"),
    (0x21, "VK_PRIOR"),
    (0x22, "VK_NEXT"),
    (0x23, "VK_END"),
    (0x24, "VK_HOME"),
    (0x25, "VK_LEFT"),
    (0x26, "VK_UP"),
    (0x27, "VK_RIGHT"),
    (0x28, "VK_DOWN"),
    (0x29, "VK_SELECT"),
    (0x2A, "VK_PRINT"),
    (0x2B, "VK_EXECUTE"),
    (0x2C, "VK_SNAPSHOT"),
    (0x2D, "VK_INSERT"),
    (0x2E, "VK_DELETE"),
    (0x2F, "VK_HELP"),
    (0x30, "'0'"),
    (0x31, "'1'"),
    (0x32, "'2'"),
    (0x33, "'3'"),
    (0x34, "'4'"),
    (0x35, "'5'"),
    (0x36, "'6'"),
    (0x37, "'7'"),
    (0x38, "'8'"),
    (0x39, "'9'"),
    (0x41, "'A'"),
    (0x42, "'B'"),
    (0x43, "'C'"),
    (0x44, "'D'"),
    (0x45, "'E'"),
    (0x46, "'F'"),
    (0x47, "'G'"),
    (0x48, "'H'"),
    (0x49, "'I'"),
    (0x4A, "'J'"),
    (0x4B, "'K'"),
    (0x4C, "'L'"),
    (0x4D, "'M'"),
    (0x4E, "'N'"),
    (0x4F, "'O'"),
    (0x50, "'P'"),
    (0x51, "'Q'"),
    (0x52, "'R'"),
    (0x53, "'S'"),
    (0x54, "'T'"),
    (0x55, "'U'"),
    (0x56, "'V'"),
    (0x57, "'W'"),
    (0x58, "'X'"),
    (0x59, "'Y'"),
    (0x5A, "'Z'"),
    (0x5B, "VK_LWIN"),
    (0x5C, "VK_RWIN"),
    (0x5D, "VK_APPS"),
    (0x5F, "VK_SLEEP"),
    (0x60, "VK_NUMPAD0"),
    (0x61, "VK_NUMPAD1"),
    (0x62, "VK_NUMPAD2"),
    (0x63, "VK_NUMPAD3"),
    (0x64, "VK_NUMPAD4"),
    (0x65, "VK_NUMPAD5"),
    (0x66, "VK_NUMPAD6"),
    (0x67, "VK_NUMPAD7"),
    (0x68, "VK_NUMPAD8"),
    (0x69, "VK_NUMPAD9"),
    (0x6A, "VK_MULTIPLY"),
    (0x6B, "VK_ADD"),
    (0x6C, "VK_SEPARATOR"),
    (0x6D, "VK_SUBTRACT"),
    (0x6E, "VK_DECIMAL"),
    (0x6F, "VK_DIVIDE"),
    (0x70, "VK_F1"),
    (0x71, "VK_F2"),
    (0x72, "VK_F3"),
    (0x73, "VK_F4"),
    (0x74, "VK_F5"),
    (0x75, "VK_F6"),
    (0x76, "VK_F7"),
    (0x77, "VK_F8"),
    (0x78, "VK_F9"),
    (0x79, "VK_F10"),
    (0x7A, "VK_F11"),
    (0x7B, "VK_F12"),
    (0x7C, "VK_F13"),
    (0x7D, "VK_F14"),
    (0x7E, "VK_F15"),
    (0x7F, "VK_F16"),
    (0x80, "VK_F17"),
    (0x81, "VK_F18"),
    (0x82, "VK_F19"),
    (0x83, "VK_F20"),
    (0x84, "VK_F21"),
    (0x85, "VK_F22"),
    (0x86, "VK_F23"),
    (0x87, "VK_F24"),
    (0x88, "VK_NAVIGATION_VIEW"),
    (0x89, "VK_NAVIGATION_MENU"),
    (0x8A, "VK_NAVIGATION_UP"),
    (0x8B, "VK_NAVIGATION_DOWN"),
    (0x8C, "VK_NAVIGATION_LEFT"),
    (0x8D, "VK_NAVIGATION_RIGHT"),
    (0x8E, "VK_NAVIGATION_ACCEPT"),
    (0x8F, "VK_NAVIGATION_CANCEL"),
    (0x90, "VK_NUMLOCK"),
    (0x91, "VK_SCROLL"),
    (0x92, "VK_OEM_NEC_EQUAL"),
    (0x93, "VK_OEM_FJ_MASSHOU"),
    (0x94, "VK_OEM_FJ_TOUROKU"),
    (0x95, "VK_OEM_FJ_LOYA"),
    (0x96, "VK_OEM_FJ_ROYA"),
    (0xA0, "VK_LSHIFT"),
    (0xA1, "VK_RSHIFT"),
    (0xA2, "VK_LCONTROL"),
    (0xA3, "VK_RCONTROL"),
    (0xA4, "VK_LMENU"),
    (0xA5, "VK_RMENU"),
    (0xA6, "VK_BROWSER_BACK"),
    (0xA7, "VK_BROWSER_FORWARD"),
    (0xA8, "VK_BROWSER_REFRESH"),
    (0xA9, "VK_BROWSER_STOP"),
    (0xAA, "VK_BROWSER_SEARCH"),
    (0xAB, "VK_BROWSER_FAVORITES"),
    (0xAC, "VK_BROWSER_HOME"),
    (0xAD, "VK_VOLUME_MUTE"),
    (0xAE, "VK_VOLUME_DOWN"),
    (0xAF, "VK_VOLUME_UP"),
    (0xB0, "VK_MEDIA_NEXT_TRACK"),
    (0xB1, "VK_MEDIA_PREV_TRACK"),
    (0xB2, "VK_MEDIA_STOP"),
    (0xB3, "VK_MEDIA_PLAY_PAUSE"),
    (0xB4, "VK_LAUNCH_MAIL"),
    (0xB5, "VK_LAUNCH_MEDIA_SELECT"),
    (0xB6, "VK_LAUNCH_APP1"),
    (0xB7, "VK_LAUNCH_APP2"),
    (0xBA, "VK_OEM_1"),
    (0xBB, "VK_OEM_PLUS"),
    (0xBC, "VK_OEM_COMMA"),
    (0xBD, "VK_OEM_MINUS"),
    (0xBE, "VK_OEM_PERIOD"),
    (0xBF, "VK_OEM_2"),
    (0xC0, "VK_OEM_3"),
    (0xC3, "VK_GAMEPAD_A"),
    (0xC4, "VK_GAMEPAD_B"),
    (0xC5, "VK_GAMEPAD_X"),
    (0xC6, "VK_GAMEPAD_Y"),
    (0xC7, "VK_GAMEPAD_RIGHT_SHOULDER"),
    (0xC8, "VK_GAMEPAD_LEFT_SHOULDER"),
    (0xC9, "VK_GAMEPAD_LEFT_TRIGGER"),
    (0xCA, "VK_GAMEPAD_RIGHT_TRIGGER"),
    (0xCB, "VK_GAMEPAD_DPAD_UP"),
    (0xCC, "VK_GAMEPAD_DPAD_DOWN"),
    (0xCD, "VK_GAMEPAD_DPAD_LEFT"),
    (0xCE, "VK_GAMEPAD_DPAD_RIGHT"),
    (0xCF, "VK_GAMEPAD_MENU"),
    (0xD0, "VK_GAMEPAD_VIEW"),
    (0xD1, "VK_GAMEPAD_LEFT_THUMBSTICK_BUTTON"),
    (0xD2, "VK_GAMEPAD_RIGHT_THUMBSTICK_BUTTON"),
    (0xD3, "VK_GAMEPAD_LEFT_THUMBSTICK_UP"),
    (0xD4, "VK_GAMEPAD_LEFT_THUMBSTICK_DOWN"),
    (0xD5, "VK_GAMEPAD_LEFT_THUMBSTICK_RIGHT"),
    (0xD6, "VK_GAMEPAD_LEFT_THUMBSTICK_LEFT"),
    (0xD7, "VK_GAMEPAD_RIGHT_THUMBSTICK_UP"),
    (0xD8, "VK_GAMEPAD_RIGHT_THUMBSTICK_DOWN"),
    (0xD9, "VK_GAMEPAD_RIGHT_THUMBSTICK_RIGHT"),
    (0xDA, "VK_GAMEPAD_RIGHT_THUMBSTICK_LEFT"),
    (0xDB, "VK_OEM_4"),
    (0xDC, "VK_OEM_5"),
    (0xDD, "VK_OEM_6"),
    (0xDE, "VK_OEM_7"),
    (0xDF, "VK_OEM_8"),
    (0xE1, "VK_OEM_AX"),
    (0xE2, "VK_OEM_102"),
    (0xE3, "VK_ICO_HELP"),
    (0xE4, "VK_ICO_00"),
    (0xE5, "VK_PROCESSKEY"),
    (0xE6, "VK_ICO_CLEAR"),
    (0xE7, "VK_PACKET"),
    (0xE9, "VK_OEM_RESET"),
    (0xEA, "VK_OEM_JUMP"),
    (0xEB, "VK_OEM_PA1"),
    (0xEC, "VK_OEM_PA2"),
    (0xED, "VK_OEM_PA3"),
    (0xEE, "VK_OEM_WSCTRL"),
    (0xEF, "VK_OEM_CUSEL"),
    (0xF0, "VK_OEM_ATTN"),
    (0xF1, "VK_OEM_FINISH"),
    (0xF2, "VK_OEM_COPY"),
    (0xF3, "VK_OEM_AUTO"),
    (0xF4, "VK_OEM_ENLW"),
    (0xF5, "VK_OEM_BACKTAB"),
    (0xF6, "VK_ATTN"),
    (0xF7, "VK_CRSEL"),
    (0xF8, "VK_EXSEL"),
    (0xF9, "VK_EREOF"),
    (0xFA, "VK_PLAY"),
    (0xFB, "VK_ZOOM"),
    (0xFC, "VK_NONAME"),
    (0xFD, "VK_PA1"),
    (0xFE, "VK_OEM_CLEAR"),
    (0xFF, "VK__none_"),
]);

pub const VK_FLAGS_SYMBOLS: SymbolTable = SymbolTable(&[
    (0x0100, "KBDEXT"),
    (0x0200, "KBDMULTIVK"),
    (0x0400, "KBDSPECIAL"),
    (0x0800, "KBDNUMPAD"),
    (0x1000, "KBDUNICODE"),
    (0x2000, "KBDINJECTEDVK"),
    (0x4000, "KBDMAPPEDVK"),
    (0x8000, "KBDBREAK"),
]);

pub const VK_ATTR_SYMBOLS: SymbolTable = SymbolTable(&[
    (0x01, "CAPLOK"),
    (0x02, "SGCAPS"),
    (0x04, "CAPLOKALTGR"),
    (0x08, "KANALOK"),
    (0x80, "GRPSELTAP"),
]);

pub const WCHAR_SYMBOLS: SymbolTable = SymbolTable(&[
    (0x0009, r"L'\t'"),
    (0x000A, r"L'\n'"),
    (0x000D, r"L'\r'"),
    (0x0027, r"L'\''"),
    (0x005C, r"L'\\'"),
    (WCH_NONE as u32, "WCH_NONE"),
    (WCH_DEAD as u32, "WCH_DEAD"),
    (WCH_LGTR as u32, "WCH_LGTR"),
]);

pub const SHFT_INVALID_SYMBOLS: SymbolTable = SymbolTable(&[(SHFT_INVALID as u32, "SHFT_INVALID")]);

pub const DEAD_KEY_FLAGS_SYMBOLS: SymbolTable = SymbolTable(&[(DKF_DEAD as u32, "DKF_DEAD")]);

pub const LOCALE_FLAGS_SYMBOLS: SymbolTable = SymbolTable(&[
    (KLLF_ALTGR as u32, "KLLF_ALTGR"),
    (KLLF_SHIFTLOCK as u32, "KLLF_SHIFTLOCK"),
    (KLLF_LRM_RLM as u32, "KLLF_LRM_RLM"),
]);

pub const KBD_VERSION_SYMBOLS: SymbolTable = SymbolTable(&[(KBD_VERSION as u32, "KBD_VERSION")]);

/// Description of each modifier bitmask, for comments in `MODIFIERS`.
pub const MODIFIER_COMMENTS: [&str; 8] = [
    "000 = <none>",
    "001 = Shift",
    "010 = Control",
    "011 = Shift Control",
    "100 = Alt",
    "101 = Shift Alt",
    "110 = Control Alt (AltGr)",
    "111 = Shift Control Alt (Shift AltGr)",
];

/// Column title of each modifier bitmask.
pub const MODIFIER_HEADERS: [&str; 8] = [
    "Base",
    "Shift",
    "Ctrl",
    "Shift/Ctrl",
    "Alt",
    "Shift/Alt",
    "AltGr",
    "Shift/AltGr",
];

/// Formats values as they appear in a C source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    /// Never translate values into symbols.
    pub numeric_only: bool,
}

impl Formatter {
    pub fn new(numeric_only: bool) -> Self {
        Self { numeric_only }
    }

    /// Decimal when `hex_digits` is zero, hexadecimal otherwise.
    pub fn integer(value: u32, hex_digits: usize) -> String {
        if hex_digits == 0 {
            value.to_string()
        } else {
            format!("0x{:0width$X}", value, width = hex_digits)
        }
    }

    pub fn symbol(&self, symbols: SymbolTable, value: u32, hex_digits: usize) -> String {
        if !self.numeric_only {
            if let Some(name) = symbols.find(value) {
                return name.to_string();
            }
        }
        Self::integer(value, hex_digits)
    }

    /// `A | B | 0x..` for a combination of flags. Falls back to a number when
    /// no flag is recognized.
    pub fn bit_mask(&self, symbols: SymbolTable, value: u32, hex_digits: usize) -> String {
        if !self.numeric_only {
            let mut names = Vec::new();
            let mut bits = 0;
            for &(flag, name) in symbols.entries() {
                if flag == 0 && value == 0 {
                    return name.to_string();
                }
                if flag != 0 && value & flag == flag {
                    names.push(name.to_string());
                    bits |= flag;
                }
            }
            if bits != 0 {
                if value & !bits != 0 {
                    names.push(Self::integer(value & !bits, hex_digits.max(1)));
                }
                return names.join(" | ");
            }
        }
        Self::integer(value, hex_digits)
    }

    /// A base value followed by attribute flags, such as `VK_RETURN | KBDEXT`.
    pub fn attributes(&self, symbols: SymbolTable, attributes: SymbolTable, value: u32, hex_digits: usize) -> String {
        if self.numeric_only {
            return Self::integer(value, hex_digits);
        }
        let all = attributes.mask();
        let mut text = self.symbol(symbols, value & !all, hex_digits);
        if value & all != 0 {
            text.push_str(" | ");
            text.push_str(&self.bit_mask(attributes, value & all, hex_digits));
        }
        text
    }

    pub fn locale_flags(&self, flags: u32) -> String {
        if self.numeric_only {
            format!("0x{:08X}", flags)
        } else {
            format!(
                "MAKELONG({}, {})",
                self.bit_mask(LOCALE_FLAGS_SYMBOLS, flags & 0xFFFF, 4),
                self.symbol(KBD_VERSION_SYMBOLS, flags >> 16, 4)
            )
        }
    }

    /// A `WCHAR` as a character literal, a symbol or a number.
    pub fn wchar(&self, value: u16) -> String {
        if !self.numeric_only {
            if let Some(name) = WCHAR_SYMBOLS.find(u32::from(value)) {
                return name.to_string();
            }
        }
        match value {
            0x27 | 0x5C => format!("L'\\{}'", char::from(value as u8)),
            0x20..=0x7E => format!("L'{}'", char::from(value as u8)),
            _ => format!("0x{:04X}", value),
        }
    }
}

/// A string as a C wide string literal, `NULL` when absent.
pub fn wstring_literal(value: Option<&[u16]>) -> String {
    let Some(value) = value else {
        return "NULL".to_string();
    };
    let mut text = String::from("L\"");
    let mut after_hex = false;
    for &c in value {
        // Hex escapes are greedy: a following hex digit starts a new literal.
        if after_hex && char::from_u32(u32::from(c)).is_some_and(|ch| ch.is_ascii_hexdigit()) {
            text.push_str("\" L\"");
        }
        after_hex = !matches!(c, 0x09 | 0x0A | 0x0D | 0x20..=0x7E);
        match c {
            0x09 => text.push_str(r"\t"),
            0x0A => text.push_str(r"\n"),
            0x0D => text.push_str(r"\r"),
            0x22 => text.push_str("\\\""),
            0x5C => text.push_str(r"\\"),
            0x20..=0x7E => text.push(char::from(c as u8)),
            _ => text.push_str(&format!("\\x{:04x}", c)),
        }
    }
    text.push('"');
    text
}

/// A pointer field: the name of the table, or `NULL`.
pub fn pointer(present: bool, name: &str) -> String {
    if present {
        name.to_string()
    } else {
        "NULL".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkl_core::kbd::{ModBits, VkAttributes, VkFlags};

    const SYMBOLS: Formatter = Formatter { numeric_only: false };
    const NUMBERS: Formatter = Formatter { numeric_only: true };

    #[test]
    fn tables_are_sorted_and_match_flag_types() {
        for table in [SHIFT_STATE_SYMBOLS, VK_SYMBOLS, VK_FLAGS_SYMBOLS, VK_ATTR_SYMBOLS, WCHAR_SYMBOLS] {
            assert!(table.entries().windows(2).all(|w| w[0].0 < w[1].0));
        }
        assert_eq!(VK_FLAGS_SYMBOLS.mask(), u32::from(VkFlags::all().bits()));
        assert_eq!(VK_ATTR_SYMBOLS.mask(), u32::from(VkAttributes::all().bits()));
        assert_eq!(SHIFT_STATE_SYMBOLS.mask(), u32::from(ModBits::all().bits()));
    }

    #[test]
    fn symbols_and_numbers() {
        assert_eq!(SYMBOLS.symbol(VK_SYMBOLS, 0x1B, 2), "VK_ESCAPE");
        assert_eq!(SYMBOLS.symbol(VK_SYMBOLS, 0x41, 2), "'A'");
        assert_eq!(SYMBOLS.symbol(VK_SYMBOLS, 0x07, 2), "0x07");
        assert_eq!(NUMBERS.symbol(VK_SYMBOLS, 0x1B, 2), "0x1B");
        assert_eq!(SYMBOLS.symbol(SHFT_INVALID_SYMBOLS, 3, 0), "3");
        assert_eq!(SYMBOLS.symbol(SHFT_INVALID_SYMBOLS, 15, 0), "SHFT_INVALID");
    }

    #[test]
    fn bit_masks() {
        assert_eq!(SYMBOLS.bit_mask(SHIFT_STATE_SYMBOLS, 0, 4), "KBDBASE");
        assert_eq!(SYMBOLS.bit_mask(SHIFT_STATE_SYMBOLS, 6, 4), "KBDCTRL | KBDALT");
        assert_eq!(SYMBOLS.bit_mask(SHIFT_STATE_SYMBOLS, 0x41, 4), "KBDSHIFT | 0x0040");
        assert_eq!(SYMBOLS.bit_mask(VK_ATTR_SYMBOLS, 0, 2), "0x00");
        assert_eq!(SYMBOLS.bit_mask(VK_ATTR_SYMBOLS, 0x40, 2), "0x40");
        assert_eq!(SYMBOLS.bit_mask(DEAD_KEY_FLAGS_SYMBOLS, 1, 4), "DKF_DEAD");
        assert_eq!(NUMBERS.bit_mask(SHIFT_STATE_SYMBOLS, 6, 4), "0x0006");
    }

    #[test]
    fn virtual_keys_with_flags() {
        assert_eq!(SYMBOLS.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, 0x010D, 4), "VK_RETURN | KBDEXT");
        assert_eq!(
            SYMBOLS.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, 0x0C90, 4),
            "VK_NUMLOCK | KBDSPECIAL | KBDNUMPAD"
        );
        assert_eq!(SYMBOLS.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, 0x00FF, 4), "VK__none_");
        assert_eq!(NUMBERS.attributes(VK_SYMBOLS, VK_FLAGS_SYMBOLS, 0x010D, 4), "0x010D");
    }

    #[test]
    fn locale_flags() {
        assert_eq!(SYMBOLS.locale_flags(0x0001_0001), "MAKELONG(KLLF_ALTGR, KBD_VERSION)");
        assert_eq!(SYMBOLS.locale_flags(0x0001_0000), "MAKELONG(0x0000, KBD_VERSION)");
        assert_eq!(SYMBOLS.locale_flags(0x0002_0006), "MAKELONG(KLLF_SHIFTLOCK | KLLF_LRM_RLM, 0x0002)");
        assert_eq!(NUMBERS.locale_flags(0x0001_0001), "0x00010001");
    }

    #[test]
    fn characters() {
        assert_eq!(SYMBOLS.wchar(u16::from(b'a')), "L'a'");
        assert_eq!(SYMBOLS.wchar(u16::from(b'\'')), r"L'\''");
        assert_eq!(SYMBOLS.wchar(u16::from(b'\\')), r"L'\\'");
        assert_eq!(SYMBOLS.wchar(u16::from(b'\t')), r"L'\t'");
        assert_eq!(SYMBOLS.wchar(0xF001), "WCH_DEAD");
        assert_eq!(SYMBOLS.wchar(0x00E6), "0x00E6");
        assert_eq!(NUMBERS.wchar(u16::from(b'\t')), "0x0009");
        assert_eq!(NUMBERS.wchar(u16::from(b'\'')), r"L'\''");
        assert_eq!(NUMBERS.wchar(0xF000), "0xF000");
        assert_eq!(NUMBERS.wchar(0x007F), "0x007F");
    }

    #[test]
    fn string_literals() {
        let text: Vec<u16> = "Tab\t\"x\"\\ é".encode_utf16().collect();
        assert_eq!(wstring_literal(Some(&text)), r#"L"Tab\t\"x\"\\ \x00e9""#);
        assert_eq!(wstring_literal(None), "NULL");
        let entree: Vec<u16> = "ENTRÉE é.".encode_utf16().collect();
        assert_eq!(wstring_literal(Some(&entree)), r#"L"ENTR\x00c9" L"E \x00e9.""#);
        assert_eq!(pointer(false, "key_names"), "NULL");
    }
}
