//! Static instruction catalogue: mnemonic -> (opcode, func, shape, operand layout).
//!
//! Built once from a hand-written table mirroring the reference assembler's
//! `insn_table`, then parsed into [`OperandSlot`] vectors so each mnemonic's operand
//! layout is available as data rather than being re-walked as a format string on
//! every encode.

use super::{constants, Word};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Which of the three instruction shapes a mnemonic belongs to. `Directive` and
/// `Other` aren't instructions at all but share the catalogue for lookup purposes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    R,
    I,
    J,
    Directive,
    Other,
}

/// One parsed position in a mnemonic's operand-format string.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandSlot {
    /// General register, destination field (bits 27:24) or source field (23:20) or
    /// second-source field (3:0), depending on `bit_offset`.
    GeneralReg { bit_offset: u32 },
    /// Special register, destination (27:24) or source (23:20).
    SpecialReg { bit_offset: u32 },
    /// 16-bit immediate, bits 15:0.
    Immediate,
    /// 20-bit offset, bits 19:0. May come from a numeric literal or `symbol + const`.
    Offset,
    /// 20-bit PC-relative branch displacement, bits 19:0. Symbol-only.
    Branch,
    /// 20-bit absolute jump target, bits 19:0. Hex literal or symbol.
    Jump,
    /// A literal character (`,`, `(`, `)`) that must appear verbatim in the input.
    Literal(char),
}

pub struct InstructionSpec {
    pub mnemonic: &'static str,
    pub operand_format: &'static str,
    pub operands: Vec<OperandSlot>,
    pub opcode: u8,
    pub func: u8,
    pub shape: Shape,
}

impl InstructionSpec {
    /// The instruction word before any operand has been placed into it.
    pub fn base_word(&self) -> Word {
        let opcode = (self.opcode as Word) << constants::OPCODE_SHIFT;
        match self.shape {
            // J-shape instructions have no func field; those bits belong to the
            // 20-bit address/offset/branch operand instead.
            Shape::J => opcode,
            _ => opcode | ((self.func as Word) << constants::FUNC_SHIFT),
        }
    }
}

fn parse_operand_format(format: &'static str) -> Vec<OperandSlot> {
    format
        .chars()
        .map(|c| match c {
            'd' => OperandSlot::GeneralReg { bit_offset: constants::D_SHIFT },
            's' => OperandSlot::GeneralReg { bit_offset: constants::S_SHIFT },
            't' => OperandSlot::GeneralReg { bit_offset: constants::T_SHIFT },
            'D' => OperandSlot::SpecialReg { bit_offset: constants::D_SHIFT },
            'S' => OperandSlot::SpecialReg { bit_offset: constants::S_SHIFT },
            'i' => OperandSlot::Immediate,
            'o' => OperandSlot::Offset,
            'b' => OperandSlot::Branch,
            'j' => OperandSlot::Jump,
            literal => OperandSlot::Literal(literal),
        })
        .collect()
}

/// Places a single decoded operand value into its field of `word`, leaving the
/// rest of the word untouched. `value` must already be masked by the caller for
/// anything but general/special registers (those are masked here to 4 bits).
pub fn place_operand(word: Word, slot: OperandSlot, value: u32) -> Word {
    match slot {
        OperandSlot::GeneralReg { bit_offset } | OperandSlot::SpecialReg { bit_offset } => {
            word | ((value & 0xf) << bit_offset)
        }
        OperandSlot::Immediate => word | (value & constants::IMMEDIATE_MASK),
        OperandSlot::Offset | OperandSlot::Branch | OperandSlot::Jump => {
            word | (value & constants::ADDRESS_MASK)
        }
        OperandSlot::Literal(_) => word,
    }
}

macro_rules! insn {
    ($mnemonic:expr, $format:expr, $opcode:expr, $func:expr, $shape:expr) => {
        InstructionSpec {
            mnemonic: $mnemonic,
            operand_format: $format,
            operands: parse_operand_format($format),
            opcode: $opcode,
            func: $func,
            shape: $shape,
        }
    };
}

/// Directives recognized by the assembler. They carry no opcode/func/operand
/// encoding of their own; the assembler dispatches on the mnemonic by name.
pub const DIRECTIVES: &[&str] = &[
    ".word", ".ascii", ".asciiz", ".space", ".equ", ".global", ".extern", ".data", ".text",
    ".bss", ".frame", ".mask",
];

fn build_table() -> Vec<InstructionSpec> {
    use Shape::{J, R, I};
    vec![
        insn!("add", "d,s,t", 0x0, 0x0, R),
        insn!("addi", "d,s,i", 0x1, 0x0, I),
        insn!("addu", "d,s,t", 0x0, 0x1, R),
        insn!("addui", "d,s,i", 0x1, 0x1, I),
        insn!("sub", "d,s,t", 0x0, 0x2, R),
        insn!("subi", "d,s,i", 0x1, 0x2, I),
        insn!("subu", "d,s,t", 0x0, 0x3, R),
        insn!("subui", "d,s,i", 0x1, 0x3, I),
        insn!("mult", "d,s,t", 0x0, 0x4, R),
        insn!("multi", "d,s,i", 0x1, 0x4, I),
        insn!("multu", "d,s,t", 0x0, 0x5, R),
        insn!("multui", "d,s,i", 0x1, 0x5, I),
        insn!("div", "d,s,t", 0x0, 0x6, R),
        insn!("divi", "d,s,i", 0x1, 0x6, I),
        insn!("divu", "d,s,t", 0x0, 0x7, R),
        insn!("divui", "d,s,i", 0x1, 0x7, I),
        insn!("rem", "d,s,t", 0x0, 0x8, R),
        insn!("remi", "d,s,i", 0x1, 0x8, I),
        insn!("remu", "d,s,t", 0x0, 0x9, R),
        insn!("remui", "d,s,i", 0x1, 0x9, I),
        insn!("lhi", "d,i", 0x3, 0xe, I),
        insn!("la", "d,j", 0xc, 0x0, J),
        insn!("and", "d,s,t", 0x0, 0xb, R),
        insn!("andi", "d,s,i", 0x1, 0xb, I),
        insn!("or", "d,s,t", 0x0, 0xd, R),
        insn!("ori", "d,s,i", 0x1, 0xd, I),
        insn!("xor", "d,s,t", 0x0, 0xf, R),
        insn!("xori", "d,s,i", 0x1, 0xf, I),
        insn!("sll", "d,s,t", 0x0, 0xa, R),
        insn!("slli", "d,s,i", 0x1, 0xa, I),
        insn!("srl", "d,s,t", 0x0, 0xc, R),
        insn!("srli", "d,s,i", 0x1, 0xc, I),
        insn!("sra", "d,s,t", 0x0, 0xe, R),
        insn!("srai", "d,s,i", 0x1, 0xe, I),
        insn!("slt", "d,s,t", 0x2, 0x0, R),
        insn!("slti", "d,s,i", 0x3, 0x0, I),
        insn!("sltu", "d,s,t", 0x2, 0x1, R),
        insn!("sltui", "d,s,i", 0x3, 0x1, I),
        insn!("sgt", "d,s,t", 0x2, 0x2, R),
        insn!("sgti", "d,s,i", 0x3, 0x2, I),
        insn!("sgtu", "d,s,t", 0x2, 0x3, R),
        insn!("sgtui", "d,s,i", 0x3, 0x3, I),
        insn!("sle", "d,s,t", 0x2, 0x4, R),
        insn!("slei", "d,s,i", 0x3, 0x4, I),
        insn!("sleu", "d,s,t", 0x2, 0x5, R),
        insn!("sleui", "d,s,i", 0x3, 0x5, I),
        insn!("sge", "d,s,t", 0x2, 0x6, R),
        insn!("sgei", "d,s,i", 0x3, 0x6, I),
        insn!("sgeu", "d,s,t", 0x2, 0x7, R),
        insn!("sgeui", "d,s,i", 0x3, 0x7, I),
        insn!("seq", "d,s,t", 0x2, 0x8, R),
        insn!("seqi", "d,s,i", 0x3, 0x8, I),
        insn!("sequ", "d,s,t", 0x2, 0x9, R),
        insn!("sequi", "d,s,i", 0x3, 0x9, I),
        insn!("sne", "d,s,t", 0x2, 0xa, R),
        insn!("snei", "d,s,i", 0x3, 0xa, I),
        insn!("sneu", "d,s,t", 0x2, 0xb, R),
        insn!("sneui", "d,s,i", 0x3, 0xb, I),
        insn!("j", "j", 0x4, 0x0, J),
        insn!("jr", "s", 0x5, 0x0, J),
        insn!("jal", "j", 0x6, 0x0, J),
        insn!("jalr", "s", 0x7, 0x0, J),
        insn!("beqz", "s,b", 0xa, 0x0, J),
        insn!("bnez", "s,b", 0xb, 0x0, J),
        insn!("lw", "d,o(s)", 0x8, 0x0, J),
        insn!("sw", "d,o(s)", 0x9, 0x0, J),
        insn!("movgs", "D,s", 0x3, 0xc, I),
        insn!("movsg", "d,S", 0x3, 0xd, I),
        insn!("break", "", 0x2, 0xc, I),
        insn!("syscall", "", 0x2, 0xd, I),
        insn!("rfe", "", 0x2, 0xe, I),
    ]
}

pub static TABLE: Lazy<Vec<InstructionSpec>> = Lazy::new(build_table);

pub static BY_MNEMONIC: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    TABLE
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.mnemonic, i))
        .collect()
});

/// Looks up an instruction by mnemonic, case-insensitively.
pub fn lookup(mnemonic: &str) -> Option<&'static InstructionSpec> {
    let lower = mnemonic.to_ascii_lowercase();
    BY_MNEMONIC.get(lower.as_str()).map(|&i| &TABLE[i])
}

pub fn is_directive(mnemonic: &str) -> bool {
    DIRECTIVES.contains(&mnemonic)
}

/// Finds the table entry matching a decoded word's opcode/func, the way the
/// reference disassembler does: J-shape entries match on opcode alone, since
/// their "func" bits are actually part of the address operand.
pub fn lookup_by_bits(opcode: u8, func: u8) -> Option<&'static InstructionSpec> {
    TABLE
        .iter()
        .find(|spec| spec.opcode == opcode && (spec.shape == Shape::J || spec.func == func))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn looks_up_known_mnemonics_case_insensitively() {
        assert!(lookup("ADD").is_some());
        assert!(lookup("add").is_some());
        assert!(lookup("AdDi").is_some());
    }

    #[test]
    fn unknown_mnemonic_is_absent() {
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn j_shape_ignores_func_on_lookup() {
        let spec = lookup_by_bits(0x4, 0x7).unwrap();
        assert_eq!(spec.mnemonic, "j");
    }

    #[test]
    fn base_word_places_opcode_and_func() {
        let spec = lookup("addi").unwrap();
        assert_eq!(spec.base_word(), 0x1000_0000);
    }

    #[test]
    fn j_shape_base_word_has_no_func_bits() {
        let spec = lookup("la").unwrap();
        assert_eq!(spec.base_word(), 0xc000_0000);
    }

    #[test]
    fn directive_table_matches_spec_list() {
        assert!(is_directive(".word"));
        assert!(is_directive(".mask"));
        assert!(!is_directive(".unknown"));
    }
}
