//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is an invalid map container
    #[error("file is an invalid map container")]
    Format(#[from] FormatError),

    /// lump index {0} is out of range
    #[error("lump index {0} is out of range")]
    Index(usize),

    /// lump {id} is not the last region of the file
    #[error("lump {id} ends at {end} but the file is {len} bytes, resizing it would corrupt the lumps behind it")]
    #[diagnostic(help("only the last lump of a file can change size"))]
    UnsafeSplice {
        /// Lump being replaced
        id: usize,
        /// End of the lump region
        end: u64,
        /// Length of the container
        len: u64,
    },

    /// invalid lzma frame
    #[error("invalid lzma frame")]
    Frame(#[from] FrameError),

    /// {0}
    #[error("{0}")]
    Codec(String),

    /// unable to edit entities
    #[error("unable to edit entities")]
    Entity(#[from] EntityError),
}

/// Error type to provide further information on a malformed container
#[derive(Error, Diagnostic, Debug)]
pub enum FormatError {
    /// expected magic {expected:#010X}, found {found:#010X}
    #[error("expected magic {expected:#010X}, found {found:#010X}")]
    Magic {
        /// Magic every container starts with
        expected: u32,
        /// Magic found in the data
        found: u32,
    },

    /// needs at least {expected} bytes, found {actual}
    #[error("needs at least {expected} bytes, found {actual}")]
    Truncated {
        /// Minimum size of a container
        expected: usize,
        /// Size of the data
        actual: usize,
    },

    /// lump {id} spans {start}..{end} beyond the end of the file ({len} bytes)
    #[error("lump {id} spans {start}..{end} beyond the end of the file ({len} bytes)")]
    OutOfBounds {
        /// Lump index
        id: usize,
        /// Start of the lump region
        start: u64,
        /// End of the lump region
        end: u64,
        /// Length of the container
        len: u64,
    },

    /// {0} bytes do not fit in a 32 bit lump directory
    #[error("{0} bytes do not fit in a 32 bit lump directory")]
    TooLarge(usize),
}

/// Error type to provide further information on a malformed LZMA frame
#[derive(Error, Diagnostic, Debug)]
pub enum FrameError {
    /// expected "LZMA", found {0:02X?}
    #[error("expected \"LZMA\", found {0:02X?}")]
    Magic(Vec<u8>),

    /// frame header needs 17 bytes, found {0}
    #[error("frame header needs 17 bytes, found {0}")]
    Truncated(usize),
}

/// Error type to provide further information when editing entity text fails
#[derive(Error, Diagnostic, Debug)]
pub enum EntityError {
    /// no value found for key {0}
    #[error("no value found for key {0}")]
    KeyNotFound(String),

    /// value {0:?} can not be stored in entity text
    #[error("value {0:?} can not be stored in entity text")]
    InvalidValue(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
