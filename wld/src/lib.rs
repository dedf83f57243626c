//! One-pass linker: merges relocatable WRAMP object modules into an absolute
//! S-record load image. Grounded directly on the reference toolchain's
//! `linker.cpp` pipeline (read modules, build a global symbol table, assign
//! segment bases, patch references, check for overlap, emit S-records), but
//! restated over owned Rust structures instead of a fixed-size `file_type`
//! array walked with raw pointers.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use wisa::Segment;
use wobj::{ObjectError, ObjectModule, RelocationKind};

mod overlap;
pub mod srecord_emit;

pub use overlap::{segments_overlap, Span};

/// Command-line layout flags, parsed by the `ld` binary and handed to
/// [`link`] as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flags {
    pub text_base: Option<u32>,
    pub data_base: Option<u32>,
    pub bss_base: Option<u32>,
    pub bss_end: Option<u32>,
    pub verbose: bool,
}

/// One collected or immediately-fatal linker failure.
#[derive(Debug)]
pub enum LinkError {
    Io { path: PathBuf, err: std::io::Error },
    BadObject { path: PathBuf, err: ObjectError },
    DuplicateGlobal { name: String, first_file: String, second_file: String },
    UndefinedExternal { name: String, file: String },
    MissingMain,
    SegmentOverlap { a: &'static str, b: &'static str },
}

impl LinkError {
    /// `true` for errors the original linker accumulates and keeps going
    /// past (duplicate symbol, undefined external); `false` for errors that
    /// abort immediately (bad magic, missing `main`, overlap).
    pub fn is_collectable(&self) -> bool {
        matches!(
            self,
            LinkError::DuplicateGlobal { .. } | LinkError::UndefinedExternal { .. }
        )
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkError::Io { path, err } => {
                write!(f, "could not open file for input: {}: {}", path.display(), err)
            }
            LinkError::BadObject { path, err } => {
                write!(f, "{}: {}", path.display(), err)
            }
            LinkError::DuplicateGlobal { name, first_file, second_file } => write!(
                f,
                "duplicate label in file {}. '{}' already declared in file {}",
                second_file, name, first_file
            ),
            LinkError::UndefinedExternal { name, file } => {
                write!(f, "undefined label '{}', referenced from file {}", name, file)
            }
            LinkError::MissingMain => write!(
                f,
                "can not find program entry point 'main', does a '.global main' directive exist?"
            ),
            LinkError::SegmentOverlap { a, b } => write!(f, "{} and {} segments overlap", a, b),
        }
    }
}

impl std::error::Error for LinkError {}

/// A loaded module plus the per-segment absolute base assigned to it.
struct LoadedModule {
    name: String,
    module: ObjectModule,
    base: [u32; 3], // indexed by Segment::{Text,Data,Bss}.to_i32()
}

impl LoadedModule {
    fn base_of(&self, segment: Segment) -> u32 {
        self.base[segment.to_i32() as usize]
    }
}

#[derive(Clone, Copy)]
enum GlobalOwner {
    Module(usize),
    Reserved,
}

struct GlobalSymbol {
    owner: GlobalOwner,
    segment: Segment,
    local_addr: u32,
    defining_file: String,
}

/// A pending fixup against one module's text or data word.
struct PendingRef {
    source_seg: Segment,
    address: u32,
    target: RefTarget,
}

enum RefTarget {
    Internal(Segment),
    External(String),
}

/// The final, fully linked image: patched module contents plus the entry
/// point, ready for S-record emission.
pub struct LinkedImage {
    pub modules: Vec<LinkedModule>,
    pub entry_point: u32,
    pub text_base: u32,
    pub text_size: u32,
    pub data_base: u32,
    pub data_size: u32,
    pub bss_base: u32,
    pub bss_size: u32,
}

pub struct LinkedModule {
    pub name: String,
    pub text_base: u32,
    pub text: Vec<u32>,
    pub data_base: u32,
    pub data: Vec<u32>,
    pub bss_base: u32,
    pub bss_words: u32,
}

/// Reads every module, builds the global symbol table, assigns segment
/// bases, patches all references, checks for overlap, and resolves the
/// entry point. Mirrors `linker.cpp`'s `main` end to end.
pub fn link(paths: &[PathBuf], flags: &Flags) -> Result<LinkedImage, Vec<LinkError>> {
    let mut modules = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).map_err(|err| {
            vec![LinkError::Io {
                path: path.clone(),
                err,
            }]
        })?;
        let module = wobj::read(&mut &bytes[..]).map_err(|err| {
            vec![LinkError::BadObject {
                path: path.clone(),
                err,
            }]
        })?;
        modules.push(LoadedModule {
            name: path.display().to_string(),
            module,
            base: [0; 3],
        });
    }

    let mut globals: HashMap<String, GlobalSymbol> = HashMap::new();
    for reserved in ["text_size", "data_size", "bss_size"] {
        globals.insert(
            reserved.to_owned(),
            GlobalSymbol {
                owner: GlobalOwner::Reserved,
                segment: Segment::None,
                local_addr: 0,
                defining_file: String::new(),
            },
        );
    }

    let mut refs: Vec<Vec<PendingRef>> = modules.iter().map(|_| Vec::new()).collect();
    let mut collected: Vec<LinkError> = Vec::new();

    for (idx, loaded) in modules.iter().enumerate() {
        for reloc in &loaded.module.relocations {
            if reloc.kind.is_export() {
                let segment = reloc.kind.exported_segment().unwrap();
                let name = loaded
                    .module
                    .symbols
                    .name_at(reloc.symbol_ptr)
                    .expect("export relocation always names a symbol")
                    .to_owned();
                match globals.get(&name) {
                    Some(existing) if matches!(existing.owner, GlobalOwner::Module(_)) => {
                        collected.push(LinkError::DuplicateGlobal {
                            name: name.clone(),
                            first_file: existing.defining_file.clone(),
                            second_file: loaded.name.clone(),
                        });
                    }
                    _ => {
                        globals.insert(
                            name,
                            GlobalSymbol {
                                owner: GlobalOwner::Module(idx),
                                segment,
                                local_addr: reloc.address,
                                defining_file: loaded.name.clone(),
                            },
                        );
                    }
                }
            } else if reloc.kind == RelocationKind::ExternalRef {
                let name = loaded
                    .module
                    .symbols
                    .name_at(reloc.symbol_ptr)
                    .expect("external relocation always names a symbol")
                    .to_owned();
                refs[idx].push(PendingRef {
                    source_seg: reloc.source_seg,
                    address: reloc.address,
                    target: RefTarget::External(name),
                });
            } else if let Some(target_seg) = reloc.kind.label_ref_segment() {
                refs[idx].push(PendingRef {
                    source_seg: reloc.source_seg,
                    address: reloc.address,
                    target: RefTarget::Internal(target_seg),
                });
            }
        }
    }

    if !collected.is_empty() {
        return Err(collected);
    }

    // Segment base assignment: text first, then data, then bss, each in
    // command-line order, per spec.md §4.4's layout rules.
    let mut text_cursor = flags.text_base.unwrap_or(0);
    let starting_text_address = text_cursor;
    for loaded in modules.iter_mut() {
        loaded.base[Segment::Text.to_i32() as usize] = text_cursor;
        text_cursor += loaded.module.text_words();
    }
    let text_size = text_cursor - starting_text_address;

    let mut data_cursor = match flags.data_base {
        Some(base) => base,
        None => text_cursor,
    };
    let data_start = data_cursor;
    for loaded in modules.iter_mut() {
        loaded.base[Segment::Data.to_i32() as usize] = data_cursor;
        data_cursor += loaded.module.data_words();
    }
    let data_size = data_cursor - data_start;

    let total_bss: u32 = modules.iter().map(|m| m.module.bss_words).sum();
    let mut bss_cursor = if let Some(end) = flags.bss_end {
        end - total_bss
    } else {
        match flags.bss_base {
            Some(base) => base,
            None if flags.data_base.is_none() => data_cursor,
            None => text_cursor,
        }
    };
    let bss_start = bss_cursor;
    for loaded in modules.iter_mut() {
        loaded.base[Segment::Bss.to_i32() as usize] = bss_cursor;
        bss_cursor += loaded.module.bss_words;
    }
    let bss_size = bss_cursor - bss_start;

    if let Some(reserved) = globals.get_mut("text_size") {
        reserved.local_addr = text_size;
    }
    if let Some(reserved) = globals.get_mut("data_size") {
        reserved.local_addr = data_size;
    }
    if let Some(reserved) = globals.get_mut("bss_size") {
        reserved.local_addr = bss_size;
    }

    if flags.verbose {
        print_verbose_layout(
            &modules,
            starting_text_address,
            data_start,
            bss_start,
            text_size,
            data_size,
            bss_size,
        );
    }

    // Second pass: resolve and patch every pending reference.
    let mut collected: Vec<LinkError> = Vec::new();
    for (idx, module_refs) in refs.iter().enumerate() {
        for pending in module_refs {
            let resolved = match &pending.target {
                RefTarget::Internal(target_seg) => Some(modules[idx].base_of(*target_seg)),
                RefTarget::External(name) => match globals.get(name) {
                    Some(symbol) => Some(match symbol.owner {
                        GlobalOwner::Reserved => symbol.local_addr,
                        GlobalOwner::Module(owner_idx) => {
                            symbol.local_addr + modules[owner_idx].base_of(symbol.segment)
                        }
                    }),
                    None => {
                        collected.push(LinkError::UndefinedExternal {
                            name: name.clone(),
                            file: modules[idx].name.clone(),
                        });
                        None
                    }
                },
            };
            let resolved = match resolved {
                Some(r) => r,
                None => continue,
            };

            let words = match pending.source_seg {
                Segment::Text => &mut modules[idx].module.text,
                Segment::Data => &mut modules[idx].module.data,
                _ => unreachable!("references only ever target text or data"),
            };
            let word = &mut words[pending.address as usize];
            *word = (*word & 0xfff0_0000) | ((*word + resolved) & 0x000f_ffff);
        }
    }

    if !collected.is_empty() {
        return Err(collected);
    }

    let entry_point = match globals.get("main") {
        Some(symbol) => match symbol.owner {
            GlobalOwner::Reserved => return Err(vec![LinkError::MissingMain]),
            GlobalOwner::Module(owner_idx) => {
                symbol.local_addr + modules[owner_idx].base_of(symbol.segment)
            }
        },
        None => return Err(vec![LinkError::MissingMain]),
    };

    let text_span = Span { start: starting_text_address, len: text_size };
    let data_span = Span { start: data_start, len: data_size };
    let bss_span = Span { start: bss_start, len: bss_size };
    if segments_overlap(text_span, bss_span) {
        return Err(vec![LinkError::SegmentOverlap { a: ".text", b: ".bss" }]);
    }
    if segments_overlap(text_span, data_span) {
        return Err(vec![LinkError::SegmentOverlap { a: ".text", b: ".data" }]);
    }
    if segments_overlap(data_span, bss_span) {
        return Err(vec![LinkError::SegmentOverlap { a: ".data", b: ".bss" }]);
    }

    let linked_modules = modules
        .into_iter()
        .map(|loaded| LinkedModule {
            name: loaded.name,
            text_base: loaded.base_of(Segment::Text),
            text: loaded.module.text,
            data_base: loaded.base_of(Segment::Data),
            data: loaded.module.data,
            bss_base: loaded.base_of(Segment::Bss),
            bss_words: loaded.module.bss_words,
        })
        .collect();

    Ok(LinkedImage {
        modules: linked_modules,
        entry_point,
        text_base: starting_text_address,
        text_size,
        data_base: data_start,
        data_size,
        bss_base: bss_start,
        bss_size,
    })
}

fn print_verbose_layout(
    modules: &[LoadedModule],
    text_start: u32,
    data_start: u32,
    bss_start: u32,
    text_size: u32,
    data_size: u32,
    bss_size: u32,
) {
    for segment in [Segment::Text, Segment::Data, Segment::Bss] {
        for loaded in modules {
            let base = loaded.base_of(segment);
            match segment {
                Segment::Text => {
                    println!(
                        "file '{}', starting: 0x{:05x}, .text",
                        loaded.name, base
                    );
                    let mut addr = base;
                    for word in &loaded.module.text {
                        println!(
                            "0x{:05x} : {:08x}    {}",
                            addr,
                            word,
                            wisa::decode::decode(addr, *word)
                        );
                        addr += 1;
                    }
                }
                Segment::Data => {
                    println!(
                        "file '{}', starting: 0x{:05x}, .data",
                        loaded.name, base
                    );
                    let mut addr = base;
                    for word in &loaded.module.data {
                        println!("0x{:05x} : {:08x}", addr, word);
                        addr += 1;
                    }
                }
                Segment::Bss => {
                    println!(
                        "file '{}', starting: 0x{:05x}, .bss : {} words.",
                        loaded.name, base, loaded.module.bss_words
                    );
                }
                Segment::None => {}
            }
        }
    }

    println!(
        ".text segment start = 0x{:06x}, segment end = 0x{:06x}",
        text_start,
        text_start + text_size
    );
    println!(
        ".data segment start = 0x{:06x}, segment end = 0x{:06x}",
        data_start,
        data_start + data_size
    );
    println!(
        ".bss  segment start = 0x{:06x}, segment end = 0x{:06x}",
        bss_start,
        bss_start + bss_size
    );
}

#[cfg(test)]
mod test;
