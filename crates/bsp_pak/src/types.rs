//! Base types for structure of the pakfile ZIP archive.

use binrw::binrw;
use std::fmt;

use crate::compression::CompressionMethod;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of a local file header without its name and extra field
pub const LOCAL_HEADER_SIZE: usize = 30;

/// Size of an end of central directory record without its comment
pub const END_OF_CENTRAL_DIRECTORY_SIZE: usize = 22;

/// General purpose flag: the entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// General purpose flag: the LZMA stream ends with an end of stream marker
pub const FLAG_LZMA_EOS: u16 = 0x0002;

/// General purpose flags 1 and 2, which describe the compression options of the entry
pub const FLAG_COMPRESSION_OPTIONS: u16 = 0x0006;

/// General purpose flag: the entry name is UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// MS-DOS date and time, as stored for every ZIP entry
///
/// The two words are kept exactly as read so an entry is written back with the timestamp it came
/// with. The format has a resolution of two seconds and cannot describe dates before 1980.
#[binrw]
#[brw(little)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[u16; 6]", into = "[u16; 6]"))]
pub struct DosDateTime {
    /// Hour, minute and second/2 packed as `hhhhhmmmmmmsssss`
    pub time: u16,

    /// Year since 1980, month and day packed as `yyyyyyymmmmddddd`
    pub date: u16,
}

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable time
    fn default() -> Self {
        Self {
            time: 0,
            date: (1 << 5) | 1,
        }
    }
}

impl DosDateTime {
    /// Pack a calendar date and time, clamping years outside of 1980..=2107
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        if year < 1980 {
            return Self::default();
        }

        let year = year.min(2107) - 1980;
        Self {
            time: ((hour as u16 & 0x1F) << 11)
                | ((minute as u16 & 0x3F) << 5)
                | ((second as u16 / 2) & 0x1F),
            date: (year << 9) | ((month as u16 & 0x0F) << 5) | (day as u16 & 0x1F),
        }
    }

    /// Calendar year
    pub fn year(&self) -> u16 {
        (self.date >> 9) + 1980
    }

    /// Month, 1 based
    pub fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    /// Day of the month, 1 based
    pub fn day(&self) -> u8 {
        (self.date & 0x1F) as u8
    }

    /// Hour of the day
    pub fn hour(&self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute of the hour
    pub fn minute(&self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    /// Second of the minute, always even
    pub fn second(&self) -> u8 {
        ((self.time & 0x1F) * 2) as u8
    }
}

impl From<[u16; 6]> for DosDateTime {
    fn from(value: [u16; 6]) -> Self {
        let [year, month, day, hour, minute, second] = value;
        Self::from_parts(
            year,
            month as u8,
            day as u8,
            hour as u8,
            minute as u8,
            second as u8,
        )
    }
}

impl From<DosDateTime> for [u16; 6] {
    fn from(value: DosDateTime) -> Self {
        [
            value.year(),
            value.month() as u16,
            value.day() as u16,
            value.hour() as u16,
            value.minute() as u16,
            value.second() as u16,
        ]
    }
}

impl fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

/// ZIP local file header
///
/// Precedes the data of every entry
#[binrw]
#[brw(magic = b"PK\x03\x04", little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Minimum ZIP version needed to extract the entry
    pub version_needed: u16,

    /// General purpose flags
    pub flags: u16,

    /// Compression method of the entry data
    #[br(map = |raw: u16| CompressionMethod::from(raw))]
    #[bw(map = |method: &CompressionMethod| u16::from(*method))]
    pub compression: CompressionMethod,

    /// Last modification time
    pub modified: DosDateTime,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Size of the entry data in the archive
    pub compressed_size: u32,

    /// Size of the entry data once decompressed
    pub uncompressed_size: u32,

    #[br(temp)]
    #[bw(calc = file_name.len() as u16)]
    file_name_length: u16,

    #[br(temp)]
    #[bw(calc = extra.len() as u16)]
    extra_length: u16,

    /// Raw entry name
    #[br(count = file_name_length)]
    pub file_name: Vec<u8>,

    /// Raw extra field
    #[br(count = extra_length)]
    pub extra: Vec<u8>,
}

/// ZIP central directory header
///
/// Describes one entry in the directory at the end of the archive
#[binrw]
#[brw(magic = b"PK\x01\x02", little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Host system (high byte) and ZIP version (low byte) that wrote the entry
    pub version_made_by: u16,

    /// Minimum ZIP version needed to extract the entry
    pub version_needed: u16,

    /// General purpose flags
    pub flags: u16,

    /// Compression method of the entry data
    #[br(map = |raw: u16| CompressionMethod::from(raw))]
    #[bw(map = |method: &CompressionMethod| u16::from(*method))]
    pub compression: CompressionMethod,

    /// Last modification time
    pub modified: DosDateTime,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Size of the entry data in the archive
    pub compressed_size: u32,

    /// Size of the entry data once decompressed
    pub uncompressed_size: u32,

    #[br(temp)]
    #[bw(calc = file_name.len() as u16)]
    file_name_length: u16,

    #[br(temp)]
    #[bw(calc = extra.len() as u16)]
    extra_length: u16,

    #[br(temp)]
    #[bw(calc = comment.len() as u16)]
    comment_length: u16,

    /// Disk the entry starts on, always `0` for pakfiles
    pub disk_number_start: u16,

    /// Internal attributes
    pub internal_attributes: u16,

    /// Host specific attributes, unix mode bits in the high word for unix hosts
    pub external_attributes: u32,

    /// Offset of the local file header from the start of the archive
    pub local_header_offset: u32,

    /// Raw entry name
    #[br(count = file_name_length)]
    pub file_name: Vec<u8>,

    /// Raw extra field
    #[br(count = extra_length)]
    pub extra: Vec<u8>,

    /// Raw entry comment
    #[br(count = comment_length)]
    pub comment: Vec<u8>,
}

/// ZIP end of central directory record
#[binrw]
#[brw(magic = b"PK\x05\x06", little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk
    pub disk_number: u16,

    /// Disk where the central directory starts
    pub central_directory_disk: u16,

    /// Number of central directory records on this disk
    pub disk_entries: u16,

    /// Total number of central directory records
    pub total_entries: u16,

    /// Size of the central directory
    pub central_directory_size: u32,

    /// Offset of the central directory from the start of the archive
    pub central_directory_offset: u32,

    #[br(temp)]
    #[bw(calc = comment.len() as u16)]
    comment_length: u16,

    /// Archive comment
    #[br(count = comment_length)]
    pub comment: Vec<u8>,
}
