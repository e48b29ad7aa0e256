//! This library handles reading and rewriting the **pakfile**, the ZIP archive of loose assets
//! embedded in lump 40 of *Source* engine VBSP maps.
//!
//! # Pakfile Format Documentation
//!
//! A pakfile is a regular ZIP archive. Only the subset of the format used by map tools is
//! supported: a single disk, no ZIP64 and no encryption.
//!
//! ## File Structure
//!
//! Every entry is stored as a local file header followed by its data. The central directory
//! follows the last entry and the archive ends with the end of central directory record.
//!
//! ### Local File Header
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: `PK\x03\x04`                                      |
//! | 0x0004         | Version needed         | 2 bytes: Minimum ZIP version to extract                    |
//! | 0x0006         | Flags                  | 2 bytes: General purpose flags                             |
//! | 0x0008         | Compression            | 2 bytes: Compression method                                |
//! | 0x000A         | Modification time      | 2 bytes: MS-DOS time                                       |
//! | 0x000C         | Modification date      | 2 bytes: MS-DOS date                                       |
//! | 0x000E         | CRC32                  | 4 bytes: CRC-32 of the uncompressed data                   |
//! | 0x0012         | Compressed size        | 4 bytes: Size of the data in the archive                   |
//! | 0x0016         | Uncompressed size      | 4 bytes: Size of the data once decompressed                |
//! | 0x001A         | Name length            | 2 bytes: Length of the entry name                          |
//! | 0x001C         | Extra length           | 2 bytes: Length of the extra field                         |
//! | 0x001E         | Name                   | Entry name, `/` separated, directories end with `/`        |
//!
//! The central directory repeats these fields for every entry, adding the host system, the
//! entry comment, the external attributes and the offset of the local file header.
//!
//! ### Compression Methods
//!
//! - `0`: Stored
//! - `8`: Deflate
//! - `12`: BZIP2 (requires the `bzip2` feature)
//! - `14`: LZMA, the data starts with the LZMA SDK version (2 bytes), the size of the properties
//!   block (2 bytes, always 5) and the properties block, followed by the LZMA stream
//!
//! Entries using any other method are kept as [`CompressionMethod::Unknown`]; their data cannot
//! be read but the method is remembered.
//!
//! # Preserving entries
//!
//! Reading an archive with [`PakReader`] produces an [`ArchiveModel`] that remembers how every
//! entry was stored. [`PakWriter`] writes each entry back with its method, timestamp,
//! attributes and comment, reusing the compressed data of entries that were not modified. When
//! a method is unavailable the entry is written with a fallback and a [`DegradedEncoding`] is
//! reported.

pub mod compression;
pub mod error;
pub mod metadata;
pub mod model;
pub mod read;
pub mod types;
pub mod write;

pub use crate::compression::{Capabilities, CompressionMethod};
pub use crate::metadata::MetadataStore;
#[cfg(feature = "serde")]
pub use crate::metadata::JsonMetadataStore;
pub use crate::model::{ArchiveEntry, ArchiveModel, EntryMetadata, MetadataMap};
pub use crate::read::{decode, DecodeWarning, DecodedArchive, PakReader, PakReaderOptions};
pub use crate::types::DosDateTime;
pub use crate::write::{encode, DegradedEncoding, EncodedArchive, PakWriter, PakWriterOptions};
