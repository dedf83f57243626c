//! Two-pass assembler for WRAMP assembly source, emitting relocatable
//! object modules in the format [`wobj`] reads and writes.
//!
//! The library has no knowledge of file paths or stdio; it takes a string of
//! source and hands back either an [`wobj::ObjectModule`] plus any
//! [`Warning`]s, or the first fatal [`AssemblerError`] encountered. The `as`
//! binary (`src/main.rs`) owns reading the input file, naming the output,
//! and printing diagnostics.

pub mod assembler;
pub mod error;
pub mod lex;
pub mod symbol;

pub use assembler::{assemble, AssemblerState};
pub use error::{AssemblerError, AssemblerErrorKind, Result, Warning};
