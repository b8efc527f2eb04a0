//! Reconstruction of a normalized key map from decoded keyboard tables.

use crate::kbd::{is_sentinel, VkFlags, MODIFIER_COMBINATIONS, SHFT_INVALID, VK_NONE};
use crate::tables::KbdTables;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One virtual key and the characters it produces.
/// Index in `wc` is a bitmask of `ModBits::SHIFT`, `CTRL` and `ALT`.
/// Zero means unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VirtualKey {
    pub vk: u16,
    pub wc: [u16; MODIFIER_COMBINATIONS],
}

impl VirtualKey {
    pub fn is_used(&self) -> bool {
        self.vk != 0
    }
}

/// One physical key: the base record and the extended (E0-prefixed) record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WinKey {
    pub sc: u16,
    pub vk: VirtualKey,
    pub evk: VirtualKey,
}

impl WinKey {
    pub fn record(&self, extended: bool) -> &VirtualKey {
        if extended {
            &self.evk
        } else {
            &self.vk
        }
    }
}

/// A dead key sequence: `accent` then `base` produces `composed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadKeyPair {
    pub accent: u16,
    pub base: u16,
    pub composed: u16,
}

/// Dense, scan-code-indexed key map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyMap {
    pub keys: Vec<WinKey>,
    pub dead_keys: Vec<DeadKeyPair>,
}

impl KeyMap {
    /// The key for a scan code, when it was populated.
    pub fn get(&self, sc: u16) -> Option<&WinKey> {
        self.keys.get(usize::from(sc)).filter(|k| k.sc != 0)
    }
}

/// Conversion from "modification number" (index in `wch[]` of a
/// `VK_TO_WCHARS` entry) to a bitmask of Shift, Ctrl, Alt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierMap {
    masks: [u8; MODIFIER_COMBINATIONS],
}

impl ModifierMap {
    pub fn new(tables: &KbdTables) -> Self {
        let mut masks = [SHFT_INVALID; MODIFIER_COMBINATIONS];
        if let Some(mods) = &tables.char_modifiers {
            for (mask, &number) in mods.value.mod_number.iter().enumerate() {
                let Some(slot) = masks.get_mut(usize::from(number)) else {
                    continue;
                };
                if *slot != SHFT_INVALID {
                    debug!(
                        "Modification number {} used by bitmasks {} and {}, keeping {}",
                        number, slot, mask, mask
                    );
                }
                *slot = mask as u8;
            }
        }
        Self { masks }
    }

    /// Returns `SHFT_INVALID` (greater than 7) for an invalid number.
    pub fn mod_number_to_mask(&self, number: usize) -> u8 {
        self.masks.get(number).copied().unwrap_or(SHFT_INVALID)
    }
}

/// Key map reconstruction over one set of keyboard tables.
pub struct WinKeyMap<'a> {
    tables: &'a KbdTables,
    mods: ModifierMap,
}

impl<'a> WinKeyMap<'a> {
    pub fn new(tables: &'a KbdTables) -> Self {
        Self { tables, mods: ModifierMap::new(tables) }
    }

    /// Multimap of virtual key => (scan code, extended), in table order.
    fn scan_codes_by_vk(&self) -> BTreeMap<u8, Vec<(u16, bool)>> {
        let mut vk2sc: BTreeMap<u8, Vec<(u16, bool)>> = BTreeMap::new();
        let mut insert = |vk: u16, sc: u16| {
            let extended = VkFlags::from_bits_retain(vk).contains(VkFlags::EXT);
            vk2sc.entry((vk & 0xFF) as u8).or_default().push((sc, extended));
        };

        if let Some(vsc) = &self.tables.vsc_to_vk {
            for (sc, &vk) in vsc.value.iter().enumerate() {
                if (vk & 0xFF) as u8 != VK_NONE {
                    insert(vk, sc as u16);
                }
            }
        }
        for table in [&self.tables.vsc_to_vk_e0, &self.tables.vsc_to_vk_e1].into_iter().flatten() {
            for entry in &table.value {
                insert(entry.vk, u16::from(entry.vsc));
            }
        }
        vk2sc
    }

    /// Build the map of all scan codes. Missing tables give an empty map.
    pub fn build_key_map(&self) -> KeyMap {
        let mut map = KeyMap::default();
        let Some(vk_to_wchar) = &self.tables.vk_to_wchar else {
            return map;
        };
        let vk2sc = self.scan_codes_by_vk();

        for table in &vk_to_wchar.value {
            let mut previous_vk = VK_NONE;
            for entry in &table.entries.value {
                // The wildcard row continues the previous key.
                let vk = if entry.virtual_key != VK_NONE { entry.virtual_key } else { previous_vk };
                if vk == VK_NONE {
                    continue;
                }
                for &(sc, extended) in vk2sc.get(&vk).map(Vec::as_slice).unwrap_or_default() {
                    let index = usize::from(sc & 0xFF);
                    if index >= map.keys.len() {
                        map.keys.resize(index + 1, WinKey::default());
                    }
                    let key = &mut map.keys[index];
                    key.sc = index as u16;
                    let record = if extended { &mut key.evk } else { &mut key.vk };
                    record.vk = u16::from(vk);

                    for (number, &wc) in entry.wch.iter().enumerate() {
                        let mask = usize::from(self.mods.mod_number_to_mask(number));
                        if mask < record.wc.len() && !is_sentinel(wc) {
                            record.wc[mask] = wc;
                        }
                    }
                }
                previous_vk = vk;
            }
        }

        if let Some(dead_keys) = &self.tables.dead_keys {
            map.dead_keys = dead_keys
                .value
                .iter()
                .map(|dk| DeadKeyPair { accent: dk.accent(), base: dk.base(), composed: dk.composed })
                .collect();
        }

        debug!("Key map built: {} scan codes, {} dead keys", map.keys.len(), map.dead_keys.len());
        map
    }
}
