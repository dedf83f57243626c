use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use wisa::Segment;
use wobj::{ObjectModule, RelocationEntry, RelocationKind};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn write_temp_object(module: &ObjectModule) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("wld-test-{}-{}.o", std::process::id(), id));
    wobj::write_file(&path, module).unwrap();
    path
}

/// `main: j main` — a single self-contained module exporting and jumping to
/// its own entry point. Mirrors spec.md's S1 scenario.
fn module_with_main() -> ObjectModule {
    let mut module = ObjectModule::new();
    module.text = vec![0x0000_0000, 0x4000_0000];
    let ptr = module.symbols.intern("main");
    module.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr,
        kind: RelocationKind::GlobalText,
        source_seg: Segment::Text,
    });
    module.relocations.push(RelocationEntry {
        address: 1,
        symbol_ptr: 0,
        kind: RelocationKind::TextLabelRef,
        source_seg: Segment::Text,
    });
    module
}

#[test]
fn default_text_base_patches_self_jump_and_entry_point() {
    let path = write_temp_object(&module_with_main());
    let image = link(&[path.clone()], &Flags::default()).unwrap();
    assert_eq!(image.entry_point, 0);
    assert_eq!(image.modules[0].text[1], 0x4000_0000);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn ttext_offset_is_added_to_entry_point_and_patched_word() {
    let path = write_temp_object(&module_with_main());
    let flags = Flags {
        text_base: Some(0x100),
        ..Flags::default()
    };
    let image = link(&[path.clone()], &flags).unwrap();
    assert_eq!(image.entry_point, 0x100);
    assert_eq!(image.modules[0].text[1], 0x4000_0100);
    std::fs::remove_file(path).unwrap();
}

/// Module `a` exports `foo`; module `b` references it externally. Mirrors
/// spec.md's S3 cross-module scenario.
#[test]
fn cross_module_external_reference_resolves_to_exporters_base() {
    let mut a = ObjectModule::new();
    a.text = vec![0x0000_0000];
    let ptr = a.symbols.intern("foo");
    a.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr,
        kind: RelocationKind::GlobalText,
        source_seg: Segment::Text,
    });
    // module `a` also needs a `main` so linking succeeds end to end.
    let ptr_main = a.symbols.intern("main");
    a.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr_main,
        kind: RelocationKind::GlobalText,
        source_seg: Segment::Text,
    });

    let mut b = ObjectModule::new();
    b.text = vec![0x4000_0000];
    let ptr = b.symbols.intern("foo");
    b.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr,
        kind: RelocationKind::ExternalRef,
        source_seg: Segment::Text,
    });

    let path_a = write_temp_object(&a);
    let path_b = write_temp_object(&b);
    let flags = Flags {
        text_base: Some(0x10),
        ..Flags::default()
    };
    let image = link(&[path_a.clone(), path_b.clone()], &flags).unwrap();
    // `foo` is defined in `a` at local address 0, so it resolves to a's base (0x10).
    assert_eq!(image.modules[1].text[0], 0x4000_0010);
    std::fs::remove_file(path_a).unwrap();
    std::fs::remove_file(path_b).unwrap();
}

#[test]
fn missing_main_is_fatal() {
    let mut m = ObjectModule::new();
    m.text = vec![0x0000_0000];
    let path = write_temp_object(&m);
    let err = link(&[path.clone()], &Flags::default()).unwrap_err();
    assert!(matches!(err.as_slice(), [LinkError::MissingMain]));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn duplicate_global_across_modules_is_collected() {
    let mut a = module_with_main();
    a.relocations.retain(|r| r.kind != RelocationKind::TextLabelRef);

    let mut b = ObjectModule::new();
    b.text = vec![0x0000_0000];
    let ptr = b.symbols.intern("main");
    b.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr,
        kind: RelocationKind::GlobalText,
        source_seg: Segment::Text,
    });

    let path_a = write_temp_object(&a);
    let path_b = write_temp_object(&b);
    let err = link(&[path_a.clone(), path_b.clone()], &Flags::default()).unwrap_err();
    assert!(matches!(err.as_slice(), [LinkError::DuplicateGlobal { .. }]));
    std::fs::remove_file(path_a).unwrap();
    std::fs::remove_file(path_b).unwrap();
}

#[test]
fn undefined_external_is_collected() {
    let mut b = ObjectModule::new();
    b.text = vec![0x4000_0000];
    let ptr = b.symbols.intern("nowhere");
    b.relocations.push(RelocationEntry {
        address: 0,
        symbol_ptr: ptr,
        kind: RelocationKind::ExternalRef,
        source_seg: Segment::Text,
    });
    let path = write_temp_object(&b);
    let err = link(&[path.clone()], &Flags::default()).unwrap_err();
    assert!(matches!(err.as_slice(), [LinkError::UndefinedExternal { .. }]));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn overlapping_explicit_bases_are_rejected() {
    let mut module = module_with_main();
    module.data = vec![0x0000_0000];
    let path = write_temp_object(&module);
    let flags = Flags {
        text_base: Some(0),
        data_base: Some(1), // falls inside the 2-word text segment [0, 2)
        ..Flags::default()
    };
    let err = link(&[path.clone()], &flags).unwrap_err();
    assert!(matches!(err.as_slice(), [LinkError::SegmentOverlap { .. }]));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn default_bss_base_chains_after_data_not_after_text() {
    let mut module = module_with_main();
    module.data = vec![0x1, 0x2, 0x3];
    module.bss_words = 4;
    let path = write_temp_object(&module);
    let image = link(&[path.clone()], &Flags::default()).unwrap();
    // text is 2 words at 0, so data defaults to base 2; bss must chain after
    // data (base 5), not collide with it at base 2.
    assert_eq!(image.data_base, 2);
    assert_eq!(image.bss_base, 5);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn explicit_tdata_leaves_default_bss_based_on_end_of_text() {
    let mut module = module_with_main();
    module.data = vec![0x1, 0x2, 0x3];
    module.bss_words = 4;
    let path = write_temp_object(&module);
    let flags = Flags {
        data_base: Some(0x100),
        ..Flags::default()
    };
    let image = link(&[path.clone()], &flags).unwrap();
    assert_eq!(image.data_base, 0x100);
    // text is 2 words at 0; with -Tdata given explicitly, default bss still
    // chains from end-of-text rather than end-of-data.
    assert_eq!(image.bss_base, 2);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn bad_magic_is_fatal() {
    let path = std::env::temp_dir().join(format!("wld-test-badmagic-{}.o", std::process::id()));
    std::fs::write(&path, [0u8; 24]).unwrap();
    let err = link(&[path.clone()], &Flags::default()).unwrap_err();
    assert!(matches!(err.as_slice(), [LinkError::BadObject { .. }]));
    std::fs::remove_file(path).unwrap();
}

#[cfg(test)]
mod proptest_checks {
    use proptest::prelude::*;

    // spec invariant 3, isolated from file I/O: the linker's patch only ever
    // touches the low 20 bits of a word, regardless of the opcode/register
    // bits already occupying the top 12.
    proptest! {
        #[test]
        fn patch_preserves_high_twelve_bits(word: u32, addend: u32) {
            let high_bits_before = word & 0xfff0_0000;
            let patched = (word & 0xfff0_0000) | ((word + addend) & 0x000f_ffff);
            prop_assert_eq!(patched & 0xfff0_0000, high_bits_before);
            prop_assert!(patched & 0x000f_ffff < (1 << 20));
        }
    }
}
