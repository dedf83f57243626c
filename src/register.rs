use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use util::EnumFromStr;
use util_derive::EnumFromStr;

/// A general-purpose register, `r0..r15` (equivalently `$0..$15`).
///
/// `$zero`, `$sp` and `$ra` are accepted as aliases for 0, 14 and 15 when parsing,
/// matching the register names a WRAMP assembly programmer actually types.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeneralRegister(u8);

impl GeneralRegister {
    pub const ZERO: GeneralRegister = GeneralRegister(0);
    pub const SP: GeneralRegister = GeneralRegister(14);
    pub const RA: GeneralRegister = GeneralRegister(15);

    pub fn new(id: u8) -> Option<GeneralRegister> {
        if (id as usize) < super::constants::REG_COUNT {
            Some(GeneralRegister(id))
        } else {
            None
        }
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Parses `r<N>`, `R<N>`, `$<N>` or one of the named aliases.
    pub fn parse(token: &str) -> Option<GeneralRegister> {
        match token {
            "$zero" => return Some(GeneralRegister::ZERO),
            "$sp" => return Some(GeneralRegister::SP),
            "$ra" => return Some(GeneralRegister::RA),
            _ => {}
        }

        let digits = if let Some(rest) = token.strip_prefix('$') {
            rest
        } else if let Some(rest) = token.strip_prefix('r').or_else(|| token.strip_prefix('R')) {
            rest
        } else {
            return None;
        };

        digits.parse::<u8>().ok().and_then(GeneralRegister::new)
    }

    /// Renders the canonical `$N` spelling used by the linker's disassembly output.
    pub fn display_name(self) -> String {
        match self.0 {
            14 => "$sp".to_string(),
            15 => "$ra".to_string(),
            n => format!("${}", n),
        }
    }
}

/// A named special-purpose register. Unlike general registers these are only ever
/// addressed by name (there is no bare numeric special-register syntax).
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr,
)]
pub enum SpecialRegister {
    SPR0,
    SPR1,
    SPR2,
    SPR3,
    CCTRL,
    ESTAT,
    ICOUNT,
    CCOUNT,
    EVEC,
    EAR,
    ESP,
    ERS,
    PTABLE,
    RBASE,
    SPR14,
    SPR15,
}

impl SpecialRegister {
    pub fn id(self) -> u8 {
        self.to_u8().unwrap()
    }

    pub fn from_id(id: u8) -> Option<SpecialRegister> {
        num_traits::FromPrimitive::from_u8(id)
    }

    /// Parses a `$name` token such as `$cctrl`.
    pub fn parse(token: &str) -> Option<SpecialRegister> {
        let name = token.strip_prefix('$')?;
        EnumFromStr::from_str(&name.to_ascii_uppercase()).ok()
    }

    pub fn display_name(self) -> String {
        format!("${}", format!("{:?}", self).to_ascii_lowercase())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn general_register_numeric_and_dollar() {
        assert_eq!(GeneralRegister::parse("r3"), GeneralRegister::new(3));
        assert_eq!(GeneralRegister::parse("R3"), GeneralRegister::new(3));
        assert_eq!(GeneralRegister::parse("$3"), GeneralRegister::new(3));
    }

    #[test]
    fn general_register_aliases() {
        assert_eq!(GeneralRegister::parse("$zero"), Some(GeneralRegister::ZERO));
        assert_eq!(GeneralRegister::parse("$sp"), Some(GeneralRegister::SP));
        assert_eq!(GeneralRegister::parse("$ra"), Some(GeneralRegister::RA));
    }

    #[test]
    fn general_register_out_of_range() {
        assert_eq!(GeneralRegister::parse("$16"), None);
        assert_eq!(GeneralRegister::parse("r99"), None);
    }

    #[test]
    fn special_register_named_only() {
        assert_eq!(SpecialRegister::parse("$cctrl"), Some(SpecialRegister::CCTRL));
        assert_eq!(SpecialRegister::parse("$rbase"), Some(SpecialRegister::RBASE));
        assert_eq!(SpecialRegister::parse("4"), None);
    }

    #[test]
    fn special_register_id_roundtrip() {
        assert_eq!(SpecialRegister::CCTRL.id(), 4);
        assert_eq!(SpecialRegister::from_id(4), Some(SpecialRegister::CCTRL));
    }
}
