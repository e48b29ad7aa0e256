//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::compression::CompressionMethod;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`serde_json::Error`]
    #[cfg(feature = "serde")]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// pakfile is an invalid zip archive
    #[error("pakfile is an invalid zip archive: {0}")]
    #[diagnostic(help("the trailing directory of the archive could not be read, the lump is likely truncated"))]
    InvalidArchive(String),

    /// pakfile exceeds the limits of the zip format
    #[error("pakfile exceeds the limits of the zip format: {0}")]
    TooLarge(String),

    /// unable to process entry data
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Error type to provide further information when entry data cannot be processed
#[derive(Error, Diagnostic, Debug)]
pub enum CodecError {
    /// no implementation is available for the method
    #[error("{0} is not supported")]
    Unsupported(CompressionMethod),

    /// entry is encrypted
    #[error("entry is encrypted")]
    Encrypted,

    /// the data could not be decompressed
    #[error("{method} data is corrupt: {reason}")]
    Corrupt {
        method: CompressionMethod,
        reason: String,
    },

    /// the data could not be compressed
    #[error("{method} compression failed: {reason}")]
    Compress {
        method: CompressionMethod,
        reason: String,
    },

    /// decompressed data does not match the directory record
    #[error("checksum mismatch: expected {expected:#010x}, found {found:#010x}")]
    Checksum { expected: u32, found: u32 },

    /// entry data lies outside of the archive
    #[error("entry data at {offset} extends beyond the archive")]
    OutOfBounds { offset: u64 },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
