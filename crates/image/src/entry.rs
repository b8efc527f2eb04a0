//! Static decoding of the `KbdLayerDescriptor` function.
//!
//! The function of every keyboard layout DLL only returns the address of its
//! `KBDTABLES`. The few instructions of its body give that address without
//! running any code.

use crate::pe::Machine;
use anyhow::{bail, Context, Result};
use wkl_core::Memory;

const X64_LEA_RAX_RIP: [u8; 3] = [0x48, 0x8D, 0x05];
const X86_MOV_EAX: u8 = 0xB8;
const X86_RET: u8 = 0xC3;
const ARM64_RET: u32 = 0xD65F_03C0;

/// Address returned by the function at `address`.
pub fn returned_address(mem: &dyn Memory, machine: Machine, address: u64) -> Result<u64> {
    let code = mem
        .read_bytes(address, 12)
        .or_else(|| mem.read_bytes(address, 8))
        .with_context(|| format!("Entry point 0x{:X} outside of image", address))?;

    match machine {
        Machine::X64 => {
            // lea rax, [rip + disp32] ; ret
            if code.len() < 8 || code[..3] != X64_LEA_RAX_RIP || code[7] != X86_RET {
                bail!("Unexpected x64 code at entry point: {}", hex(code));
            }
            let disp = i32::from_le_bytes([code[3], code[4], code[5], code[6]]);
            Ok(address.wrapping_add(7).wrapping_add_signed(i64::from(disp)))
        }
        Machine::X86 => {
            // mov eax, imm32 ; ret
            if code[0] != X86_MOV_EAX || code[5] != X86_RET {
                bail!("Unexpected x86 code at entry point: {}", hex(code));
            }
            Ok(u64::from(u32::from_le_bytes([code[1], code[2], code[3], code[4]])))
        }
        Machine::Arm64 => {
            // adrp x0, page ; add x0, x0, #offset ; ret
            let word = |i: usize| u32::from_le_bytes([code[4 * i], code[4 * i + 1], code[4 * i + 2], code[4 * i + 3]]);
            if code.len() < 12 {
                bail!("Truncated ARM64 code at entry point");
            }
            let (adrp, add, ret) = (word(0), word(1), word(2));
            if adrp & 0x9F00_001F != 0x9000_0000 || add & 0xFF80_03FF != 0x9100_0000 || ret != ARM64_RET {
                bail!("Unexpected ARM64 code at entry point: {}", hex(code));
            }
            let pages = (((adrp >> 5) & 0x7_FFFF) << 2) | ((adrp >> 29) & 0x3);
            // Sign-extend the 21-bit page count.
            let pages = (i64::from(pages) << 43) >> 43;
            let offset = u64::from((add >> 10) & 0xFFF) << if add & 0x0040_0000 != 0 { 12 } else { 0 };
            Ok((address & !0xFFF).wrapping_add_signed(pages << 12).wrapping_add(offset))
        }
    }
}

fn hex(code: &[u8]) -> String {
    code.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Machine code of a function returning `target`, located at `address`.
#[cfg(test)]
pub(crate) fn encode_return(machine: Machine, address: u64, target: u64) -> Vec<u8> {
    match machine {
        Machine::X64 => {
            let disp = (target as i64 - (address as i64 + 7)) as i32;
            let mut code = X64_LEA_RAX_RIP.to_vec();
            code.extend_from_slice(&disp.to_le_bytes());
            code.push(X86_RET);
            code
        }
        Machine::X86 => {
            let mut code = vec![X86_MOV_EAX];
            code.extend_from_slice(&(target as u32).to_le_bytes());
            code.push(X86_RET);
            code
        }
        Machine::Arm64 => {
            let pages = ((target >> 12) as i64 - (address >> 12) as i64) as u32;
            let adrp = 0x9000_0000 | ((pages & 0x3) << 29) | (((pages >> 2) & 0x7_FFFF) << 5);
            let add = 0x9100_0000 | (((target & 0xFFF) as u32) << 10);
            [adrp, add, ARM64_RET].iter().flat_map(|w| w.to_le_bytes()).collect()
        }
    }
}
