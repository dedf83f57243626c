//! Turns a [`crate::LinkedImage`] into the final sequence of S-record lines.
//!
//! Text and data are each contiguous by construction (segment bases are
//! assigned by a running cursor with no gaps between modules), so each
//! segment is exactly one region: concatenate its words across modules in
//! command-line order, then split into `S3` lines of at most ten words.
//! `bss` is sized but never emitted, since it is zero-initialized by the
//! loader, not loaded from the image.

use crate::LinkedImage;

pub fn emit(image: &LinkedImage) -> Vec<String> {
    let mut lines = Vec::new();

    let text_words: Vec<u32> = image.modules.iter().flat_map(|m| m.text.iter().copied()).collect();
    if !text_words.is_empty() {
        lines.extend(wobj::srecord::emit_region(image.text_base, &text_words));
    }

    let data_words: Vec<u32> = image.modules.iter().flat_map(|m| m.data.iter().copied()).collect();
    if !data_words.is_empty() {
        lines.extend(wobj::srecord::emit_region(image.data_base, &data_words));
    }

    lines.push(wobj::srecord::s7(image.entry_point));
    lines
}
