//! Reads and writes WRAMP relocatable object modules, and formats Motorola
//! S-records from a linked image.
//!
//! The on-disk layout is a fixed 24-byte header, the text segment's words,
//! the data segment's words (the bss segment is never stored, only sized),
//! a flat array of 16-byte relocation entries, and a NUL-terminated symbol
//! name blob. Everything is little-endian.

pub mod error;
pub mod reloc;
pub mod srecord;

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use util::Endian;
use wisa::{Segment, Word};

pub use error::ObjectError;
pub use reloc::{RelocationEntry, RelocationKind};
pub use symtab::SymbolTable;

mod symtab;

const HEADER_LEN: usize = 24;
const RELOC_ENTRY_LEN: usize = 16;

fn magic() -> u32 {
    wisa::constants::OBJECT_MAGIC
}

/// A single relocatable module: the three segments' contents/sizes, the
/// relocations pass 2 (or the linker) must apply, and the names those
/// relocations refer to.
#[derive(Clone, PartialEq, Debug)]
pub struct ObjectModule {
    pub text: Vec<Word>,
    pub data: Vec<Word>,
    pub bss_words: u32,
    pub relocations: Vec<RelocationEntry>,
    pub symbols: SymbolTable,
}

impl ObjectModule {
    pub fn new() -> Self {
        ObjectModule {
            text: Vec::new(),
            data: Vec::new(),
            bss_words: 0,
            relocations: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn text_words(&self) -> u32 {
        self.text.len() as u32
    }

    pub fn data_words(&self) -> u32 {
        self.data.len() as u32
    }
}

impl Default for ObjectModule {
    fn default() -> Self {
        Self::new()
    }
}

fn segment_to_i32(seg: Segment) -> i32 {
    seg.to_i32()
}

fn segment_from_i32(value: i32) -> Result<Segment, ObjectError> {
    Segment::from_i32(value).ok_or(ObjectError::BadSegment(value))
}

fn reloc_kind_from_u32(value: u32) -> Result<RelocationKind, ObjectError> {
    use num_traits::FromPrimitive;
    RelocationKind::from_u32(value).ok_or(ObjectError::BadRelocationKind(value))
}

pub fn read<R: Read>(reader: &mut R) -> Result<ObjectModule, ObjectError> {
    let found_magic = reader.read_u32::<Endian>()?;
    if found_magic != magic() {
        return Err(ObjectError::BadMagic(found_magic));
    }

    let text_words = reader.read_u32::<Endian>()?;
    let data_words = reader.read_u32::<Endian>()?;
    let bss_words = reader.read_u32::<Endian>()?;
    let num_references = reader.read_u32::<Endian>()?;
    let symbol_table_len = reader.read_u32::<Endian>()?;

    let mut text = Vec::with_capacity(text_words as usize);
    for _ in 0..text_words {
        text.push(reader.read_u32::<Endian>()?);
    }

    let mut data = Vec::with_capacity(data_words as usize);
    for _ in 0..data_words {
        data.push(reader.read_u32::<Endian>()?);
    }

    let mut relocations = Vec::with_capacity(num_references as usize);
    for _ in 0..num_references {
        let address = reader.read_u32::<Endian>()?;
        let symbol_ptr = reader.read_u32::<Endian>()?;
        let kind = reloc_kind_from_u32(reader.read_u32::<Endian>()?)?;
        let source_seg = segment_from_i32(reader.read_i32::<Endian>()?)?;
        relocations.push(RelocationEntry {
            address,
            symbol_ptr,
            kind,
            source_seg,
        });
    }

    let mut symbol_bytes = vec![0u8; symbol_table_len as usize];
    reader.read_exact(&mut symbol_bytes)?;

    Ok(ObjectModule {
        text,
        data,
        bss_words,
        relocations,
        symbols: SymbolTable::from_bytes(symbol_bytes),
    })
}

pub fn write<W: Write>(writer: &mut W, module: &ObjectModule) -> Result<(), ObjectError> {
    writer.write_u32::<Endian>(magic())?;
    writer.write_u32::<Endian>(module.text_words())?;
    writer.write_u32::<Endian>(module.data_words())?;
    writer.write_u32::<Endian>(module.bss_words)?;
    writer.write_u32::<Endian>(module.relocations.len() as u32)?;
    writer.write_u32::<Endian>(module.symbols.byte_len() as u32)?;

    for word in &module.text {
        writer.write_u32::<Endian>(*word)?;
    }
    for word in &module.data {
        writer.write_u32::<Endian>(*word)?;
    }

    for entry in &module.relocations {
        writer.write_u32::<Endian>(entry.address)?;
        writer.write_u32::<Endian>(entry.symbol_ptr)?;
        use num_traits::ToPrimitive;
        writer.write_u32::<Endian>(entry.kind.to_u32().expect("reloc kind fits u32"))?;
        writer.write_i32::<Endian>(segment_to_i32(entry.source_seg))?;
    }

    writer.write_all(module.symbols.as_bytes())?;
    Ok(())
}

pub trait ReadObjectExt: Read + Sized {
    fn read_object(&mut self) -> Result<ObjectModule, ObjectError> {
        read(self)
    }
}

impl<R: Read + Sized> ReadObjectExt for R {}

pub trait WriteObjectExt: Write + Sized {
    fn write_object(&mut self, module: &ObjectModule) -> Result<(), ObjectError> {
        write(self, module)
    }
}

impl<W: Write + Sized> WriteObjectExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ObjectModule, ObjectError> {
    BufReader::new(File::open(path).map_err(io::Error::from)?).read_object()
}

pub fn write_file<P: AsRef<Path>>(path: P, module: &ObjectModule) -> Result<(), ObjectError> {
    BufWriter::new(File::create(path)?).write_object(module)
}

/// The on-disk byte size a module would occupy, header included. Used by
/// callers that need to size buffers before writing.
pub fn encoded_len(module: &ObjectModule) -> usize {
    HEADER_LEN
        + module.text.len() * 4
        + module.data.len() * 4
        + module.relocations.len() * RELOC_ENTRY_LEN
        + module.symbols.byte_len()
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_module() -> ObjectModule {
        let mut module = ObjectModule::new();
        module.text = vec![0x1010_0005, 0x4000_0000];
        module.data = vec![0x0000_002a];
        module.bss_words = 3;
        let ptr = module.symbols.intern("main");
        module.relocations.push(RelocationEntry {
            address: 1,
            symbol_ptr: ptr,
            kind: RelocationKind::GlobalText,
            source_seg: Segment::Text,
        });
        module
    }

    #[test]
    fn write_read_roundtrip() {
        let module = sample_module();
        let mut buf = Vec::new();
        write(&mut buf, &module).unwrap();
        let read_back = read(&mut &buf[..]).unwrap();
        assert_eq!(module, read_back);
    }

    #[test]
    fn encoded_len_matches_actual_bytes() {
        let module = sample_module();
        let mut buf = Vec::new();
        write(&mut buf, &module).unwrap();
        assert_eq!(buf.len(), encoded_len(&module));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; HEADER_LEN];
        let err = read(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, ObjectError::BadMagic(0)));
        buf.clear();
    }

    #[test]
    fn relocation_symbol_resolves_through_blob() {
        let module = sample_module();
        let entry = module.relocations[0];
        assert_eq!(module.symbols.name_at(entry.symbol_ptr).unwrap(), "main");
    }
}

#[cfg(test)]
mod proptest_checks {
    use super::*;
    use proptest::prelude::*;

    fn arb_segment() -> impl Strategy<Value = Segment> {
        prop_oneof![
            Just(Segment::None),
            Just(Segment::Text),
            Just(Segment::Data),
            Just(Segment::Bss),
        ]
    }

    fn arb_kind() -> impl Strategy<Value = RelocationKind> {
        prop_oneof![
            Just(RelocationKind::GlobalData),
            Just(RelocationKind::GlobalText),
            Just(RelocationKind::GlobalBss),
            Just(RelocationKind::TextLabelRef),
            Just(RelocationKind::DataLabelRef),
            Just(RelocationKind::BssLabelRef),
            Just(RelocationKind::ExternalRef),
        ]
    }

    /// Builds an arbitrary but self-consistent module: every relocation that
    /// carries a symbol points at a name actually interned in the blob, so
    /// the round trip is meaningful rather than vacuous.
    fn arb_module() -> impl Strategy<Value = ObjectModule> {
        (
            proptest::collection::vec(any::<Word>(), 0..8),
            proptest::collection::vec(any::<Word>(), 0..8),
            0u32..1000,
            proptest::collection::vec(
                ("[a-z][a-z0-9_]{0,10}", arb_kind(), arb_segment(), any::<u32>()),
                0..6,
            ),
        )
            .prop_map(|(text, data, bss_words, raw_relocs)| {
                let mut module = ObjectModule::new();
                module.text = text;
                module.data = data;
                module.bss_words = bss_words;
                for (name, kind, source_seg, address) in raw_relocs {
                    let symbol_ptr = if kind.carries_symbol() {
                        module.symbols.intern(&name)
                    } else {
                        0
                    };
                    module.relocations.push(RelocationEntry {
                        address,
                        symbol_ptr,
                        kind,
                        source_seg,
                    });
                }
                module
            })
    }

    proptest! {
        // Invariant 1: header's num_references matches the relocation array
        // written, and a write/read cycle is byte-exact.
        #[test]
        fn write_read_roundtrips_arbitrary_modules(module in arb_module()) {
            let mut buf = Vec::new();
            write(&mut buf, &module).unwrap();
            let read_back = read(&mut &buf[..]).unwrap();
            prop_assert_eq!(&module, &read_back);
            prop_assert_eq!(module.relocations.len(), read_back.relocations.len());
        }

        // Invariant 2: every symbol-carrying relocation's symbol_ptr lands on
        // a NUL-terminated name inside the blob.
        #[test]
        fn symbol_pointers_resolve_to_terminated_names(module in arb_module()) {
            for entry in &module.relocations {
                if entry.kind.carries_symbol() {
                    prop_assert!(module.symbols.name_at(entry.symbol_ptr).is_ok());
                }
            }
            if !module.symbols.as_bytes().is_empty() {
                prop_assert_eq!(*module.symbols.as_bytes().last().unwrap(), 0u8);
            }
        }
    }
}
