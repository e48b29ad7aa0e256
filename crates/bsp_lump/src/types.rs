//! Base types for structure of VBSP file.

use binrw::{BinRead, BinWrite};

/// Number of records in the lump directory
pub const LUMP_COUNT: usize = 64;

/// Size of a single lump directory record
pub const LUMP_ENTRY_SIZE: usize = 16;

/// Size of the magic and version preceding the lump directory
pub const PREAMBLE_SIZE: usize = 8;

/// Size of the magic, version and the full lump directory
pub const HEADER_SIZE: usize = PREAMBLE_SIZE + LUMP_COUNT * LUMP_ENTRY_SIZE;

/// "VBSP" read as a little endian integer
pub const BSP_MAGIC: u32 = 0x5053_4256;

/// VBSP file header
///
/// Defines the header of the VBSP file which always starts with "VBSP" and then a version.
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"VBSP", little)]
pub struct BspHeader {
    /// The map format version
    pub version: u32,

    /// Every lump directory record, absent lumps included
    pub lumps: [LumpEntry; LUMP_COUNT],
}

/// VBSP lump directory record
///
/// Defines where a lump lives in the file
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct LumpEntry {
    /// The offset from the beginning of the file where the lump data starts
    pub offset: u32,

    /// The size of the lump data in the file
    pub length: u32,

    /// The format version of the lump data
    pub version: u32,

    /// The size of the lump data once decompressed, `0` for uncompressed lumps
    pub uncompressed_length: u32,
}

impl LumpEntry {
    /// Whether this record describes a lump that is not present in the file
    pub const fn is_absent(&self) -> bool {
        self.offset == 0 && self.length == 0
    }

    /// Offset of the first byte after the lump data
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }
}
