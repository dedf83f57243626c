use num_derive::{FromPrimitive, ToPrimitive};
use wisa::Segment;

/// One of the seven on-disk relocation kinds. Numeric order matters: it is the
/// on-disk representation (0..=6), exactly matching the reference toolchain's
/// `reference_type` enum.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum RelocationKind {
    GlobalData,
    GlobalText,
    GlobalBss,
    TextLabelRef,
    DataLabelRef,
    BssLabelRef,
    ExternalRef,
}

impl RelocationKind {
    /// `Global*` records are exports; everything else is a fixup the linker
    /// must apply, and only `Global*`/`ExternalRef` carry a symbol name.
    pub fn carries_symbol(self) -> bool {
        matches!(
            self,
            RelocationKind::GlobalData
                | RelocationKind::GlobalText
                | RelocationKind::GlobalBss
                | RelocationKind::ExternalRef
        )
    }

    pub fn is_export(self) -> bool {
        matches!(
            self,
            RelocationKind::GlobalData | RelocationKind::GlobalText | RelocationKind::GlobalBss
        )
    }

    pub fn exported_segment(self) -> Option<Segment> {
        match self {
            RelocationKind::GlobalText => Some(Segment::Text),
            RelocationKind::GlobalData => Some(Segment::Data),
            RelocationKind::GlobalBss => Some(Segment::Bss),
            _ => None,
        }
    }

    pub fn label_ref_segment(self) -> Option<Segment> {
        match self {
            RelocationKind::TextLabelRef => Some(Segment::Text),
            RelocationKind::DataLabelRef => Some(Segment::Data),
            RelocationKind::BssLabelRef => Some(Segment::Bss),
            _ => None,
        }
    }
}

/// A fixed-width relocation record: `address` is a word index within
/// `source_seg`; `symbol_ptr` is a byte offset into the symbol name blob
/// (meaningless unless `kind.carries_symbol()`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RelocationEntry {
    pub address: u32,
    pub symbol_ptr: u32,
    pub kind: RelocationKind,
    pub source_seg: Segment,
}
