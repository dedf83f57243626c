//! Hand-rolled tokenizing helpers over a single source line.
//!
//! A PEG grammar can't drive this: which operand letters appear on a given
//! instruction line is decided by the per-mnemonic `operand_format` string in
//! [`wisa::isa`], which is data, not grammar. So assembling a line walks a
//! mutable cursor by hand instead, one helper per production, the same way
//! `assembler.cpp`'s line scanner does.

use crate::error::{AssemblerError, AssemblerErrorKind, Result};

const MAX_IDENTIFIER_LEN: usize = 29;
const MAX_STRING_LEN: usize = 10_000;

/// A cursor over one (already comment-stripped) source line.
pub struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    line_no: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str, line_no: u32) -> Self {
        Cursor { line, pos: 0, line_no }
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    fn err(&self, kind: AssemblerErrorKind) -> AssemblerError {
        AssemblerError::new(self.line_no, kind)
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Skips whitespace, then reports whether non-whitespace input remains.
    pub fn still_more(&mut self) -> bool {
        self.skip_whitespace();
        !self.rest().is_empty()
    }

    /// Fatal if input remains after whitespace-skipping.
    pub fn expect_end_of_line(&mut self) -> Result<()> {
        if self.still_more() {
            let tok = self.peek_token();
            Err(self.err(AssemblerErrorKind::TrailingCharacters(tok)))
        } else {
            Ok(())
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Grabs the next run of non-whitespace characters without consuming,
    /// purely to render in an error message.
    fn peek_token(&self) -> String {
        self.rest()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_owned()
    }

    /// A literal character required by an `operand_format` string (e.g. `,`,
    /// `(`, `)`). Whitespace before it is skipped; absence is fatal.
    pub fn expect_char(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.err(AssemblerErrorKind::ExpectedToken(expected))),
        }
    }

    /// Identifier: letter/underscore, then alphanumeric/underscore/dot, up
    /// to 29 characters.
    pub fn parse_identifier(&mut self) -> Result<String> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            Some(c) if c.is_ascii_digit() => {
                let tok = self.peek_token();
                return Err(self.err(AssemblerErrorKind::LabelStartsWithDigit(tok)));
            }
            _ => return Err(self.err(AssemblerErrorKind::LabelExpected)),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        let ident = &self.line[start..self.pos];
        if ident.len() > MAX_IDENTIFIER_LEN {
            return Err(self.err(AssemblerErrorKind::LabelTooLong(ident.to_owned())));
        }
        Ok(ident.to_owned())
    }

    /// Grabs a whitespace-delimited run, for a mnemonic or directive token.
    /// Case and leading `.` are left untouched; the caller normalizes.
    pub fn parse_bareword(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            self.bump();
        }
        self.line[start..self.pos].to_owned()
    }

    /// A register token: `$`-prefixed or bare alphanumeric run (`$2`, `r2`,
    /// `$zero`, `$cctrl`). Shared by general- and special-register operands;
    /// the caller hands the token to `GeneralRegister::parse` or
    /// `SpecialRegister::parse` and picks the matching error kind on failure.
    pub fn parse_register_token(&mut self) -> Result<String> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('$') {
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let tok = &self.line[start..self.pos];
        if tok.is_empty() || tok == "$" {
            return Err(self.err(AssemblerErrorKind::RegisterExpected(tok.to_owned())));
        }
        Ok(tok.to_owned())
    }

    fn decode_escape(&mut self) -> Result<u8> {
        match self.bump() {
            Some('n') => Ok(b'\n'),
            Some('t') => Ok(b'\t'),
            Some('r') => Ok(b'\r'),
            Some('a') => Ok(0x07),
            Some('\\') => Ok(b'\\'),
            Some('"') => Ok(b'"'),
            Some('\'') => Ok(b'\''),
            Some('0') => {
                let mut value: u32 = 0;
                for _ in 0..3 {
                    match self.peek() {
                        Some(c) if ('0'..='7').contains(&c) => {
                            value = value * 8 + c.to_digit(8).unwrap();
                            self.bump();
                        }
                        _ => break,
                    }
                }
                Ok((value & 0xff) as u8)
            }
            Some(other) => Err(self.err(AssemblerErrorKind::BadEscape(other))),
            None => Err(self.err(AssemblerErrorKind::UnterminatedString)),
        }
    }

    /// `'c'` or `'\e'`.
    pub fn parse_char_literal(&mut self) -> Result<u8> {
        self.skip_whitespace();
        self.expect_char('\'')?;
        let value = match self.peek() {
            Some('\\') => {
                self.bump();
                self.decode_escape()?
            }
            Some(c) => {
                self.bump();
                if c.is_ascii() {
                    c as u8
                } else {
                    return Err(self.err(AssemblerErrorKind::BadCharLiteral));
                }
            }
            None => return Err(self.err(AssemblerErrorKind::BadCharLiteral)),
        };
        match self.bump() {
            Some('\'') => Ok(value),
            _ => Err(self.err(AssemblerErrorKind::BadCharLiteral)),
        }
    }

    /// Double-quoted string, same escapes as character literals.
    pub fn parse_string_literal(&mut self) -> Result<String> {
        self.skip_whitespace();
        self.expect_char('"')?;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.err(AssemblerErrorKind::UnterminatedString)),
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    bytes.push(self.decode_escape()?);
                }
                Some(c) => {
                    self.bump();
                    bytes.push(c as u8);
                }
            }
            if bytes.len() > MAX_STRING_LEN {
                return Err(self.err(AssemblerErrorKind::ConstantTooLarge(
                    "<string literal>".to_owned(),
                )));
            }
        }
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    fn parse_raw_int(&mut self) -> Result<(bool, u64, String)> {
        self.skip_whitespace();
        let start = self.pos;
        let negative = self.peek() == Some('-');
        if negative {
            self.bump();
        }
        let digits_start = self.pos;
        let is_hex = self.rest().starts_with("0x") || self.rest().starts_with("0X");
        if is_hex {
            self.bump();
            self.bump();
            let hex_start = self.pos;
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    self.bump();
                } else {
                    break;
                }
            }
            let token = &self.line[start..self.pos];
            let digits = &self.line[hex_start..self.pos];
            if digits.is_empty() {
                return Err(self.err(AssemblerErrorKind::NumericValueExpected));
            }
            let value = u64::from_str_radix(digits, 16)
                .map_err(|_| self.err(AssemblerErrorKind::ConstantTooLarge(token.to_owned())))?;
            Ok((negative, value, token.to_owned()))
        } else {
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
            let digits = &self.line[digits_start..self.pos];
            let token = &self.line[start..self.pos];
            if digits.is_empty() {
                return Err(self.err(AssemblerErrorKind::NumericValueExpected));
            }
            let value = digits
                .parse::<u64>()
                .map_err(|_| self.err(AssemblerErrorKind::ConstantTooLarge(token.to_owned())))?;
            Ok((negative, value, token.to_owned()))
        }
    }

    /// 32-bit word: hex or decimal, optionally negative (folds via two's
    /// complement); out-of-range is fatal.
    pub fn parse_word(&mut self) -> Result<u32> {
        let (negative, magnitude, token) = self.parse_raw_int()?;
        let too_large = if negative {
            magnitude > (1u64 << 31)
        } else {
            magnitude > u32::MAX as u64
        };
        if too_large {
            return Err(self.err(AssemblerErrorKind::ConstantTooLarge(token)));
        }
        let value = if negative {
            (magnitude as i64).wrapping_neg() as u32
        } else {
            magnitude as u32
        };
        Ok(value)
    }

    /// 16-bit half: same literal syntax, masked to the low 16 bits.
    pub fn parse_half(&mut self) -> Result<u16> {
        let (negative, magnitude, token) = self.parse_raw_int()?;
        let too_large = if negative {
            magnitude > (1u64 << 15)
        } else {
            magnitude > 0xffff
        };
        if too_large {
            return Err(self.err(AssemblerErrorKind::ConstantTooLarge(token)));
        }
        let value = if negative {
            (magnitude as i64).wrapping_neg() as u32
        } else {
            magnitude as u32
        };
        Ok((value & 0xffff) as u16)
    }

    /// 20-bit address literal: hex only.
    pub fn parse_address(&mut self) -> Result<u32> {
        self.skip_whitespace();
        if !(self.rest().starts_with("0x") || self.rest().starts_with("0X")) {
            let tok = self.peek_token();
            return Err(self.err(AssemblerErrorKind::HexAddressExpected(tok)));
        }
        let (_, magnitude, token) = self.parse_raw_int()?;
        if magnitude > 0xfffff {
            return Err(self.err(AssemblerErrorKind::ConstantTooLarge(token)));
        }
        Ok(magnitude as u32)
    }

    /// `.space`'s count: historically decimal-only even though `parse_word`
    /// would accept hex. Preserved as observed behavior, not "fixed".
    pub fn parse_decimal_count(&mut self) -> Result<u32> {
        self.skip_whitespace();
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            let tok = self.peek_token();
            return Err(self.err(AssemblerErrorKind::SpaceCountNotDecimal(tok)));
        }
        let (negative, magnitude, token) = self.parse_raw_int()?;
        if negative || magnitude > u32::MAX as u64 {
            return Err(self.err(AssemblerErrorKind::SpaceCountNotDecimal(token)));
        }
        Ok(magnitude as u32)
    }
}

/// Tabs become spaces; trailing `\r`/`\n` are stripped.
pub fn clean_up_line(line: &str) -> String {
    line.trim_end_matches(['\r', '\n'])
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .collect()
}

/// Strips a `#`-to-end-of-line comment, but only outside a string or
/// character literal, matching `check_labels`'s string-aware scan in
/// `assembler.cpp`.
pub fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    let mut in_char = false;
    while let Some(c) = chars.next() {
        match c {
            '#' if !in_string && !in_char => break,
            '"' if !in_char => {
                in_string = !in_string;
                out.push(c);
            }
            '\'' if !in_string => {
                in_char = !in_char;
                out.push(c);
            }
            '\\' if in_string || in_char => {
                out.push(c);
                if let Some(&next) = chars.peek() {
                    out.push(next);
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Finds the byte offset of a label-defining `:`, skipping colons that fall
/// inside a string or character literal. Returns `None` if the line has no
/// label.
pub fn find_label_colon(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut in_char = false;
    let mut chars = line.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            '\\' if in_string || in_char => {
                chars.next();
            }
            ':' if !in_string && !in_char => return Some(idx),
            _ => {}
        }
    }
    None
}
