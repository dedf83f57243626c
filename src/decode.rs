//! One-instruction disassembly, used only by the linker's `-v` output. Mirrors
//! the reference disassembler's operand rendering quirks exactly, since this is
//! diagnostic text rather than a load-bearing invariant.

use super::isa::{self, OperandSlot};
use super::register::{GeneralRegister, SpecialRegister};
use super::{constants, Word};

/// Renders one decoded instruction as `mnemonic\toperands`, or `???` if no
/// table entry matches.
pub fn decode(insn_address: u32, word: Word) -> String {
    let opcode = ((word >> constants::OPCODE_SHIFT) & 0xf) as u8;
    let func = ((word >> constants::FUNC_SHIFT) & 0xf) as u8;
    let rd = ((word >> constants::D_SHIFT) & 0xf) as u8;
    let rs = ((word >> constants::S_SHIFT) & 0xf) as u8;
    let rt = (word & 0xf) as u8;
    let immediate = word & constants::IMMEDIATE_MASK;
    let address = word & constants::ADDRESS_MASK;
    let signed_address = constants::sign_extend_20(address);

    let spec = match isa::lookup_by_bits(opcode, func) {
        Some(spec) => spec,
        None => return "???".to_string(),
    };

    let mut out = String::new();
    out.push_str(spec.mnemonic);
    out.push('\t');

    for slot in &spec.operands {
        match *slot {
            OperandSlot::GeneralReg { bit_offset } => {
                let reg = GeneralRegister::new(if bit_offset == constants::D_SHIFT {
                    rd
                } else if bit_offset == constants::S_SHIFT {
                    rs
                } else {
                    rt
                })
                .expect("register field is always 4 bits");
                out.push_str(&reg.display_name());
            }
            OperandSlot::SpecialReg { bit_offset } => {
                let id = if bit_offset == constants::D_SHIFT { rd } else { rs };
                match SpecialRegister::from_id(id) {
                    Some(reg) => out.push_str(&reg.display_name()),
                    None => out.push_str("$?"),
                }
            }
            OperandSlot::Offset => {
                if address == 0 {
                    out.push('0');
                } else if rs != 0 {
                    out.push_str(&signed_address.to_string());
                } else {
                    out.push_str(&format!("0x{:05x}", address));
                }
            }
            OperandSlot::Branch => {
                let target = ((((insn_address as i64) + (signed_address as i64)) as u32)
                    & constants::ADDRESS_MASK)
                    + 1;
                out.push_str(&format!("0x{:05x}", target));
            }
            OperandSlot::Immediate => {
                out.push_str(&format!("0x{:04x}", immediate));
            }
            OperandSlot::Jump => {
                out.push_str(&format!("0x{:05x}", address));
            }
            OperandSlot::Literal(c) => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_add_immediate() {
        // addi $1, $zero, 5 -> opcode 1, func 0, rd=1, rs=0, imm=5
        let word = 0x1100_0005;
        assert_eq!(decode(0, word), "addi\t$1,$0,0x0005");
    }

    #[test]
    fn decodes_unrecognized_as_placeholder() {
        // opcode 0xd has no table entry
        assert_eq!(decode(0, 0xd000_0000), "???");
    }

    #[test]
    fn decodes_absolute_jump() {
        let word = 0x4000_0100;
        assert_eq!(decode(0, word), "j\t0x00100");
    }
}
