//! Two-pass core: walks source lines once building a symbol table and
//! per-segment word arenas with deferred fixups, then resolves whatever can
//! be resolved within the module before handing the result to `wobj` for
//! emission. Mirrors `assembler.cpp`'s `parse_line`/`resolve_labels` split,
//! but as methods on an explicit state value rather than file-scope globals.

use std::collections::HashMap;

use wisa::isa::{self, OperandSlot, Shape};
use wisa::register::{GeneralRegister, SpecialRegister};
use wisa::Segment;
use wobj::{ObjectModule, RelocationEntry, RelocationKind};

use crate::error::{AssemblerError, AssemblerErrorKind, Result, Warning};
use crate::lex::{clean_up_line, find_label_colon, strip_comment, Cursor};
use crate::symbol::{FixupKind, MemoryEntry, Symbol};

const MAX_LABEL_LEN: usize = 29;

/// Everything pass 1 accumulates, per module. Dropped once `finish` hands
/// its contents to the object writer.
pub struct AssemblerState {
    current_segment: Segment,
    current_line: u32,
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
    text: Vec<MemoryEntry>,
    data: Vec<MemoryEntry>,
    bss_words: u32,
    warnings: Vec<Warning>,
}

impl AssemblerState {
    pub fn new() -> Self {
        AssemblerState {
            current_segment: Segment::Text,
            current_line: 0,
            symbols: Vec::new(),
            by_name: HashMap::new(),
            text: Vec::new(),
            data: Vec::new(),
            bss_words: 0,
            warnings: Vec::new(),
        }
    }

    fn err(&self, kind: AssemblerErrorKind) -> AssemblerError {
        AssemblerError::new(self.current_line, kind)
    }

    fn segment_address(&self, segment: Segment) -> u32 {
        match segment {
            Segment::Text => self.text.len() as u32,
            Segment::Data => self.data.len() as u32,
            Segment::Bss => self.bss_words,
            Segment::None => 0,
        }
    }

    /// Looks up a symbol by name, creating an unresolved placeholder the
    /// first time it is mentioned (by a reference or by `.global`), mirroring
    /// `get_label`'s create-on-miss behavior.
    fn symbol_index(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.symbols.len();
        self.symbols
            .push(Symbol::unresolved(name.to_owned(), self.current_line));
        self.by_name.insert(name.to_owned(), idx);
        idx
    }

    fn define_label(&mut self, name: String) -> Result<()> {
        if name.len() > MAX_LABEL_LEN {
            return Err(self.err(AssemblerErrorKind::LabelTooLong(name)));
        }
        let segment = self.current_segment;
        let value = self.segment_address(segment);
        let line = self.current_line;
        if let Some(&idx) = self.by_name.get(&name) {
            let existing = &mut self.symbols[idx];
            if existing.resolved {
                return Err(AssemblerError::new(
                    line,
                    AssemblerErrorKind::DuplicateLabel {
                        name,
                        first_line: existing.line,
                    },
                ));
            }
            existing.value = value;
            existing.segment = segment;
            existing.resolved = true;
            existing.line = line;
        } else {
            let idx = self.symbols.len();
            self.symbols.push(Symbol {
                name: name.clone(),
                value,
                segment,
                resolved: true,
                global: false,
                line,
            });
            self.by_name.insert(name, idx);
        }
        Ok(())
    }

    /// Processes one already-read source line. `raw` still has its original
    /// line terminator, if any.
    pub fn process_line(&mut self, raw: &str) -> Result<()> {
        self.current_line += 1;
        let cleaned = clean_up_line(raw);
        let stripped = strip_comment(&cleaned);

        let mut rest: &str = &stripped;
        if let Some(colon) = find_label_colon(&stripped) {
            let (label_part, after) = stripped.split_at(colon);
            let mut cursor = Cursor::new(label_part, self.current_line);
            let name = cursor.parse_identifier()?;
            cursor.expect_end_of_line()?;
            self.define_label(name)?;
            rest = &after[1..];
        }

        let mut cursor = Cursor::new(rest, self.current_line);
        if !cursor.still_more() {
            return Ok(());
        }

        let token = cursor.parse_bareword();
        if token.starts_with('.') {
            self.process_directive(&token, &mut cursor)
        } else {
            self.process_instruction(&token, &mut cursor)
        }
    }

    fn process_directive(&mut self, directive: &str, cursor: &mut Cursor) -> Result<()> {
        match directive {
            ".text" => {
                self.current_segment = Segment::Text;
                cursor.expect_end_of_line()
            }
            ".data" => {
                self.current_segment = Segment::Data;
                cursor.expect_end_of_line()
            }
            ".bss" => {
                self.current_segment = Segment::Bss;
                cursor.expect_end_of_line()
            }
            ".extern" | ".frame" | ".mask" => Ok(()),
            ".global" => {
                let name = cursor.parse_identifier()?;
                cursor.expect_end_of_line()?;
                let idx = self.symbol_index(&name);
                self.symbols[idx].global = true;
                Ok(())
            }
            ".equ" => {
                let name = cursor.parse_identifier()?;
                cursor.expect_char(',')?;
                let value = self.parse_expr_value(cursor)?;
                cursor.expect_end_of_line()?;
                let line = self.current_line;
                if let Some(&idx) = self.by_name.get(&name) {
                    if self.symbols[idx].resolved {
                        return Err(AssemblerError::new(
                            line,
                            AssemblerErrorKind::DuplicateLabel {
                                name,
                                first_line: self.symbols[idx].line,
                            },
                        ));
                    }
                    let sym = &mut self.symbols[idx];
                    sym.value = value;
                    sym.segment = Segment::None;
                    sym.resolved = true;
                    sym.line = line;
                } else {
                    let idx = self.symbols.len();
                    self.symbols.push(Symbol {
                        name: name.clone(),
                        value,
                        segment: Segment::None,
                        resolved: true,
                        global: false,
                        line,
                    });
                    self.by_name.insert(name, idx);
                }
                Ok(())
            }
            ".space" => {
                if self.current_segment != Segment::Bss {
                    return Err(self.err(AssemblerErrorKind::SpaceOutsideBss));
                }
                let count = cursor.parse_decimal_count()?;
                cursor.expect_end_of_line()?;
                self.bss_words += count;
                Ok(())
            }
            ".ascii" | ".asciiz" => {
                if self.current_segment == Segment::Bss {
                    return Err(self.err(AssemblerErrorKind::StringInBss));
                }
                let text = cursor.parse_string_literal()?;
                cursor.expect_end_of_line()?;
                for byte in text.bytes() {
                    self.push_word(byte as u32);
                }
                if directive == ".asciiz" {
                    self.push_word(0);
                }
                Ok(())
            }
            ".word" => self.process_word_directive(cursor),
            other => Err(self.err(AssemblerErrorKind::UnknownDirective(other.to_owned()))),
        }
    }

    /// Parses `expr` for `.equ`/`.word`: a word literal, a character
    /// literal, or `symbol [+ const]`. Symbol forms aren't legal in `.equ`'s
    /// right-hand side per the original (only literals); callers that allow
    /// symbols use [`parse_word_operand`] instead.
    fn parse_expr_value(&mut self, cursor: &mut Cursor) -> Result<u32> {
        cursor.skip_whitespace();
        if cursor.peek() == Some('\'') {
            Ok(cursor.parse_char_literal()? as u32)
        } else {
            cursor.parse_word()
        }
    }

    fn process_word_directive(&mut self, cursor: &mut Cursor) -> Result<()> {
        if self.current_segment == Segment::Bss {
            let has_initializer = cursor.still_more();
            if has_initializer {
                // Consume and discard whatever was given; only its presence
                // matters.
                let _ = cursor.parse_bareword();
                self.warnings.push(Warning {
                    line: self.current_line,
                    message: ".word initializer ignored in .bss".to_owned(),
                });
            }
            self.bss_words += 1;
            return Ok(());
        }

        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                Some('\'') => {
                    let value = cursor.parse_char_literal()? as u32;
                    self.push_word(value);
                }
                Some(c) if c.is_ascii_digit() || c == '-' => {
                    let value = cursor.parse_word()?;
                    self.push_word(value);
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let name = cursor.parse_identifier()?;
                    cursor.skip_whitespace();
                    let mut addend: u32 = 0;
                    if cursor.peek() == Some('+') {
                        cursor.bump();
                        addend = cursor.parse_word()?;
                    }
                    self.push_word(addend);
                    let idx = self.memory_len(self.current_segment) - 1;
                    self.set_pending(self.current_segment, idx, name, FixupKind::Absolute);
                }
                _ => return Err(self.err(AssemblerErrorKind::NumericValueExpected)),
            }
            cursor.skip_whitespace();
            match cursor.peek() {
                Some(',') => {
                    cursor.bump();
                    cursor.skip_whitespace();
                    if !cursor.still_more() {
                        return Err(self.err(AssemblerErrorKind::TrailingComma));
                    }
                }
                _ => break,
            }
        }
        cursor.expect_end_of_line()
    }

    fn memory_len(&self, segment: Segment) -> usize {
        match segment {
            Segment::Text => self.text.len(),
            Segment::Data => self.data.len(),
            _ => 0,
        }
    }

    fn push_word(&mut self, word: u32) {
        let line = self.current_line;
        match self.current_segment {
            Segment::Text => self.text.push(MemoryEntry::plain(word, line)),
            Segment::Data => self.data.push(MemoryEntry::plain(word, line)),
            Segment::Bss | Segment::None => {}
        }
    }

    fn set_pending(&mut self, segment: Segment, index: usize, name: String, kind: FixupKind) {
        let entry = match segment {
            Segment::Text => &mut self.text[index],
            Segment::Data => &mut self.data[index],
            _ => return,
        };
        entry.pending = Some((name, kind));
    }

    fn process_instruction(&mut self, mnemonic: &str, cursor: &mut Cursor) -> Result<()> {
        let spec = isa::lookup(mnemonic)
            .ok_or_else(|| self.err(AssemblerErrorKind::UnknownMnemonic(mnemonic.to_owned())))?;
        if !matches!(spec.shape, Shape::R | Shape::I | Shape::J) {
            return Err(self.err(AssemblerErrorKind::UnknownMnemonic(mnemonic.to_owned())));
        }
        if self.current_segment != Segment::Text {
            return Err(self.err(AssemblerErrorKind::InstructionOutsideText));
        }

        let segment = self.current_segment;
        let index = self.memory_len(segment);
        self.push_word(spec.base_word());

        let mut pending: Option<(String, FixupKind)> = None;
        let mut word = spec.base_word();

        for slot in &spec.operands {
            match *slot {
                OperandSlot::GeneralReg { bit_offset } => {
                    let tok = cursor.parse_register_token()?;
                    let reg = GeneralRegister::parse(&tok)
                        .ok_or_else(|| self.err(AssemblerErrorKind::RegisterExpected(tok)))?;
                    word = isa::place_operand(word, *slot, reg.id() as u32);
                    let _ = bit_offset;
                }
                OperandSlot::SpecialReg { bit_offset } => {
                    let tok = cursor.parse_register_token()?;
                    let reg = SpecialRegister::parse(&tok).ok_or_else(|| {
                        self.err(AssemblerErrorKind::SpecialRegisterExpected(tok))
                    })?;
                    word = isa::place_operand(word, *slot, reg.id() as u32);
                    let _ = bit_offset;
                }
                OperandSlot::Immediate => {
                    let value = cursor.parse_half()?;
                    word = isa::place_operand(word, *slot, value as u32);
                }
                OperandSlot::Offset => {
                    cursor.skip_whitespace();
                    let is_numeric = matches!(cursor.peek(), Some(c) if c.is_ascii_digit() || c == '-');
                    if is_numeric {
                        let value = cursor.parse_word()?;
                        word = isa::place_operand(word, *slot, value);
                    } else {
                        let name = cursor.parse_identifier()?;
                        cursor.skip_whitespace();
                        let mut addend: u32 = 0;
                        if cursor.peek() == Some('+') {
                            cursor.bump();
                            addend = cursor.parse_word()?;
                        }
                        word = isa::place_operand(word, *slot, addend);
                        pending = Some((name, FixupKind::Absolute));
                    }
                }
                OperandSlot::Branch => {
                    let name = cursor.parse_identifier()?;
                    pending = Some((name, FixupKind::Relative));
                }
                OperandSlot::Jump => {
                    cursor.skip_whitespace();
                    if cursor.rest().starts_with("0x") || cursor.rest().starts_with("0X") {
                        let value = cursor.parse_address()?;
                        word = isa::place_operand(word, *slot, value);
                    } else {
                        let name = cursor.parse_identifier()?;
                        pending = Some((name, FixupKind::Absolute));
                    }
                }
                OperandSlot::Literal(c) => cursor.expect_char(c)?,
            }
        }
        cursor.expect_end_of_line()?;

        match segment {
            Segment::Text => {
                self.text[index].word = word;
                self.text[index].pending = pending;
            }
            Segment::Data => {
                self.data[index].word = word;
                self.data[index].pending = pending;
            }
            _ => unreachable!("instructions only ever land in .text"),
        }
        Ok(())
    }

    /// Pass 2: patches every pending fixup that this module can resolve on
    /// its own. Entries left pointing at an unresolved symbol become
    /// external references at emission time.
    pub fn resolve_labels(&mut self) -> Result<()> {
        for segment in [Segment::Text, Segment::Data] {
            let len = self.memory_len(segment);
            for index in 0..len {
                let pending = match segment {
                    Segment::Text => self.text[index].pending.clone(),
                    Segment::Data => self.data[index].pending.clone(),
                    _ => None,
                };
                let (name, kind) = match pending {
                    Some(p) => p,
                    None => continue,
                };
                let sym_idx = *self
                    .by_name
                    .get(&name)
                    .expect("pending reference names always have a symbol entry");
                let symbol = self.symbols[sym_idx].clone();
                if !symbol.resolved {
                    if matches!(kind, FixupKind::Relative) {
                        let line = self.text[index].line;
                        return Err(AssemblerError::new(
                            line,
                            AssemblerErrorKind::BranchToExternal(name),
                        ));
                    }
                    continue;
                }

                let site_addr = index as u32;
                let entry = match segment {
                    Segment::Text => &mut self.text[index],
                    Segment::Data => &mut self.data[index],
                    _ => unreachable!(),
                };
                match kind {
                    FixupKind::Absolute => {
                        let add = symbol.value & 0x000f_ffff;
                        entry.word = (entry.word & 0xfff0_0000) | ((entry.word + add) & 0x000f_ffff);
                    }
                    FixupKind::Relative => {
                        let disp = (symbol.value as i64) - (site_addr as i64 + 1);
                        entry.word |= (disp as u32) & 0x000f_ffff;
                    }
                    FixupKind::Immediate => {
                        entry.word |= symbol.value & 0xffff;
                    }
                }
            }
        }

        let unresolved: Vec<String> = self
            .symbols
            .iter()
            .filter(|s| s.global && !s.resolved)
            .map(|s| s.name.clone())
            .collect();
        if let Some(name) = unresolved.into_iter().next() {
            return Err(AssemblerError::new(
                self.current_line,
                AssemblerErrorKind::UnresolvedGlobal(name),
            ));
        }
        Ok(())
    }

    /// Builds the on-disk module: exports, then internal label refs, then
    /// external refs, per spec's mandated relocation-array ordering.
    pub fn into_object(self) -> ObjectModule {
        let mut module = ObjectModule::new();
        module.text = self.text.iter().map(|e| e.word).collect();
        module.data = self.data.iter().map(|e| e.word).collect();
        module.bss_words = self.bss_words;

        let mut name_ptr: HashMap<&str, u32> = HashMap::new();
        for symbol in &self.symbols {
            if symbol.global || !symbol.resolved {
                let ptr = module.symbols.intern(&symbol.name);
                name_ptr.insert(symbol.name.as_str(), ptr);
            }
        }

        for symbol in self
            .symbols
            .iter()
            .filter(|s| s.global && s.segment != Segment::None)
        {
            let kind = match symbol.segment {
                Segment::Text => RelocationKind::GlobalText,
                Segment::Data => RelocationKind::GlobalData,
                Segment::Bss => RelocationKind::GlobalBss,
                Segment::None => unreachable!(),
            };
            module.relocations.push(RelocationEntry {
                address: symbol.value,
                symbol_ptr: name_ptr[symbol.name.as_str()],
                kind,
                source_seg: symbol.segment,
            });
        }

        for (seg, entries) in [(Segment::Text, &self.text), (Segment::Data, &self.data)] {
            for (index, entry) in entries.iter().enumerate() {
                let name = match &entry.pending {
                    Some((name, FixupKind::Absolute)) => name,
                    _ => continue,
                };
                let symbol = &self.symbols[self.by_name[name]];
                if symbol.segment == Segment::None || !symbol.resolved {
                    continue;
                }
                let kind = match symbol.segment {
                    Segment::Text => RelocationKind::TextLabelRef,
                    Segment::Data => RelocationKind::DataLabelRef,
                    Segment::Bss => RelocationKind::BssLabelRef,
                    Segment::None => unreachable!(),
                };
                module.relocations.push(RelocationEntry {
                    address: index as u32,
                    symbol_ptr: 0,
                    kind,
                    source_seg: seg,
                });
            }
        }

        for (seg, entries) in [(Segment::Text, &self.text), (Segment::Data, &self.data)] {
            for (index, entry) in entries.iter().enumerate() {
                let name = match &entry.pending {
                    Some((name, FixupKind::Absolute)) => name,
                    _ => continue,
                };
                let symbol = &self.symbols[self.by_name[name]];
                if symbol.segment != Segment::None || symbol.resolved {
                    continue;
                }
                module.relocations.push(RelocationEntry {
                    address: index as u32,
                    symbol_ptr: name_ptr[name.as_str()],
                    kind: RelocationKind::ExternalRef,
                    source_seg: seg,
                });
            }
        }

        module
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl Default for AssemblerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles a whole source file, returning the object module and any
/// warnings collected along the way.
pub fn assemble(source: &str) -> Result<(ObjectModule, Vec<Warning>)> {
    let mut state = AssemblerState::new();
    for line in source.lines() {
        state.process_line(line)?;
    }
    state.resolve_labels()?;
    let warnings = state.warnings().to_vec();
    Ok((state.into_object(), warnings))
}


#[cfg(test)]
mod proptest_checks {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // spec invariant 7: target_pc == site_pc + 1 + sign_extend_20(disp)
        #[test]
        fn relative_fixup_satisfies_pc_relative_invariant(
            site_addr in 0u32..0xfff,
            target_addr in 0u32..0xfff,
        ) {
            let disp = (target_addr as i64) - (site_addr as i64 + 1);
            let masked = (disp as u32) & 0x000f_ffff;
            let recovered = (site_addr as i64 + 1) + wisa::constants::sign_extend_20(masked) as i64;
            prop_assert_eq!(recovered as u32, target_addr);
        }
    }
}
