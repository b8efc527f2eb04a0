//! Constants of the Windows keyboard layout interface (`kbd.h`).

/// Name of the function exported by every keyboard layout DLL.
pub const KBD_DLL_ENTRY_NAME: &str = "KbdLayerDescriptor";

/// Virtual key used as "no key" and as the wildcard row in `VK_TO_WCHARS`.
pub const VK_NONE: u8 = 0xFF;

/// Modification number meaning "this modifier combination produces nothing".
pub const SHFT_INVALID: u8 = 0x0F;

/// Number of Shift/Ctrl/Alt combinations.
pub const MODIFIER_COMBINATIONS: usize = 8;

// Special characters in VK_TO_WCHARS.
pub const WCH_NONE: u16 = 0xF000;
pub const WCH_DEAD: u16 = 0xF001;
pub const WCH_LGTR: u16 = 0xF002;

pub const DKF_DEAD: u16 = 0x0001;

pub const KLLF_ALTGR: u16 = 0x0001;
pub const KLLF_SHIFTLOCK: u16 = 0x0002;
pub const KLLF_LRM_RLM: u16 = 0x0004;
pub const KBD_VERSION: u16 = 1;

/// Largest ligature type predefined in `kbd.h`, longer ones need `TYPEDEF_LIGATURE`.
pub const LIG_MAX_PREDEFINED: usize = 5;

bitflags::bitflags! {
    /// Character modifier bits (`KBDSHIFT`, `KBDCTRL`, ...).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModBits: u16 {
        const SHIFT = 0x0001;
        const CTRL = 0x0002;
        const ALT = 0x0004;
        const KANA = 0x0008;
        const ROYA = 0x0010;
        const LOYA = 0x0020;
        const GRPSELTAP = 0x0080;
    }
}

bitflags::bitflags! {
    /// Flags in the high byte of a scan code to virtual key entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VkFlags: u16 {
        const EXT = 0x0100;
        const MULTIVK = 0x0200;
        const SPECIAL = 0x0400;
        const NUMPAD = 0x0800;
        const UNICODE = 0x1000;
        const INJECTEDVK = 0x2000;
        const MAPPEDVK = 0x4000;
        const BREAK = 0x8000;
    }
}

bitflags::bitflags! {
    /// `Attributes` field of a `VK_TO_WCHARS` entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VkAttributes: u8 {
        const CAPLOK = 0x01;
        const SGCAPS = 0x02;
        const CAPLOKALTGR = 0x04;
        const KANALOK = 0x08;
        const GRPSELTAP = 0x80;
    }
}

/// True for the values of a `wch[]` slot which are not real characters.
pub fn is_sentinel(wc: u16) -> bool {
    matches!(wc, 0 | WCH_NONE | WCH_DEAD | WCH_LGTR)
}
