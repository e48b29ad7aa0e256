//! This library handles reading and splicing the lumps of **VBSP** map files used by *Source* engine games.
//!
//! # VBSP Container Format Documentation
//!
//! A VBSP map file is a fixed header followed by a directory of 64 lumps and the lump data itself.
//! Every lump is addressed by an absolute offset and a length, so one lump can be replaced without
//! touching any other as long as its region does not need to move the ones behind it.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x50534256 ("VBSP")                               |
//! | 0x0004         | Version                | 4 bytes: Map format version                                |
//! | 0x0008         | Lump Directory         | 64 * 16 bytes: One record per lump                         |
//! | 0x0408         | Lump Data              | Variable: The data regions referenced by the directory     |
//!
//! ### Lump Directory
//!
//! Each record in the directory has the following structure:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Offset                 | 4 bytes: Offset of the lump data from the file start    |
//! | 0x0004         | Length                 | 4 bytes: Size of the lump data                          |
//! | 0x0008         | Version                | 4 bytes: Format version of the lump                     |
//! | 0x000C         | Uncompressed Length    | 4 bytes: Size of the lump once decompressed, or 0       |
//!
//! A record with both offset and length set to `0` describes an absent lump.
//!
//! Two lumps are of special interest here:
//!
//! - **Entities** (`0`): the key/value text describing every entity of the map. It may be compressed
//!   with an LZMA frame (see [`lzma`]).
//! - **Pakfile** (`40`): a ZIP archive of loose assets embedded in the map. It is normally the last
//!   region of the file.
//!
//! ### LZMA Frame
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "LZMA"                                         |
//! | 0x0004         | Uncompressed Size      | 4 bytes: Size of the data when decompressed             |
//! | 0x0008         | Compressed Size        | 4 bytes: Size of the raw LZMA payload                   |
//! | 0x000C         | Properties             | 5 bytes: Raw LZMA properties block                      |
//! | 0x0011         | Payload                | Compressed Size bytes: Raw LZMA stream                  |
//!
//! ## Additional Information
//!
//! - **File Extension**: `.bsp`
//! - **Endianness**: Little-endian for all multi-byte integers
//!

pub mod container;
pub mod directory;
pub mod entities;
pub mod error;
pub mod lzma;
pub mod types;

pub use container::Container;
pub use directory::{LumpDirectory, LumpUpdate};
pub use entities::EntityLump;
pub use types::LumpEntry;

/// Lump holding the entity key/value text
pub const LUMP_ENTITIES: usize = 0;

/// Lump holding the embedded pakfile archive
pub const LUMP_PAKFILE: usize = 40;
