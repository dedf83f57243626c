use std::{error::Error, fmt, io};

/// Failures reading or writing an object module. A magic mismatch or a
/// relocation entry with an out-of-range `source_seg`/`kind` is a semantic
/// problem with the file's contents, not a plain I/O failure, so it gets its
/// own variant rather than being folded into `Io`.
#[derive(Debug)]
pub enum ObjectError {
    Io(io::Error),
    BadMagic(u32),
    BadSegment(i32),
    BadRelocationKind(u32),
    BadSymbolPointer(u32),
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectError::Io(err) => write!(f, "{}", err),
            ObjectError::BadMagic(found) => {
                write!(f, "not a WRAMP object file (magic was 0x{:08x})", found)
            }
            ObjectError::BadSegment(value) => write!(f, "invalid segment tag {}", value),
            ObjectError::BadRelocationKind(value) => {
                write!(f, "invalid relocation kind {}", value)
            }
            ObjectError::BadSymbolPointer(ptr) => {
                write!(f, "symbol pointer {} is out of range", ptr)
            }
        }
    }
}

impl Error for ObjectError {}

impl From<io::Error> for ObjectError {
    fn from(err: io::Error) -> Self {
        ObjectError::Io(err)
    }
}
