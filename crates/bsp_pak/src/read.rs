//! Types for reading pakfile archives
//!

use std::fmt;
use std::io::Cursor;

use binrw::BinRead;
use bon::Builder;
use byteorder::{ByteOrder, LittleEndian};
use tracing::{info, instrument, warn};

use crate::compression::{decompress, Capabilities, ZIP_CRC};
use crate::error::{CodecError, Error, Result};
use crate::model::{ArchiveEntry, ArchiveModel, EntryMetadata, PackedData, RawName};
use crate::types::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader,
    END_OF_CENTRAL_DIRECTORY_SIZE, FLAG_UTF8, LOCAL_HEADER_SIZE,
};

const END_OF_CENTRAL_DIRECTORY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// An entry that was left out of the decoded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Path of the entry
    pub path: String,

    /// Why it was left out
    pub reason: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// The result of decoding a pakfile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedArchive {
    /// Every entry that could be read
    pub model: ArchiveModel,

    /// Entries that were skipped or read with a problem
    pub warnings: Vec<DecodeWarning>,
}

/// Options for how a pakfile is read
#[derive(Debug, Clone, Copy, Builder)]
pub struct PakReaderOptions {
    /// The methods entries can be decompressed with
    #[builder(default)]
    pub capabilities: Capabilities,

    /// Whether decompressed entries are checked against their stored CRC-32
    #[builder(default = true)]
    pub verify_checksums: bool,
}

impl Default for PakReaderOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Pakfile reader
///
/// Reading never stops at a single bad entry: entries that cannot be decompressed are left out
/// and reported as [`DecodeWarning`]s. Only an archive whose central directory cannot be read
/// fails as a whole.
///
/// ```no_run
/// fn list_pakfile(lump: &[u8]) -> bsp_pak::error::Result<()> {
///     let decoded = bsp_pak::PakReader::default().decode(lump)?;
///
///     for entry in decoded.model.entries() {
///         println!("{} ({} bytes)", entry.path(), entry.content().len());
///     }
///     for warning in decoded.warnings {
///         eprintln!("skipped {warning}");
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PakReader {
    options: PakReaderOptions,
}

impl PakReader {
    pub fn new(options: PakReaderOptions) -> Self {
        Self { options }
    }

    /// Read every entry of a pakfile
    ///
    /// Empty data, as stored for a map without a pakfile, is an empty archive.
    #[instrument(skip_all, fields(size = data.len()), err)]
    pub fn decode(&self, data: &[u8]) -> Result<DecodedArchive> {
        if data.is_empty() {
            return Ok(DecodedArchive::default());
        }

        let (eocd_start, eocd) = find_end_of_central_directory(data)?;
        let headers = read_central_directory(data, eocd_start, &eocd)?;

        let mut decoded = DecodedArchive::default();
        decoded.model.set_comment(eocd.comment.clone());

        for header in headers {
            let (path, lossy) = decode_name(&header);
            if lossy {
                decoded.warnings.push(DecodeWarning {
                    path: path.clone(),
                    reason: "name is not valid UTF-8".to_owned(),
                });
            }

            if decoded.model.contains(&path) {
                decoded.warnings.push(DecodeWarning {
                    path,
                    reason: "duplicate entry, the first one is kept".to_owned(),
                });
                continue;
            }

            match self.read_entry(data, &header, path.clone()) {
                Ok(entry) => {
                    decoded.model.insert(entry);
                }
                Err(e) => decoded.warnings.push(DecodeWarning {
                    path,
                    reason: e.to_string(),
                }),
            }
        }

        for warning in &decoded.warnings {
            warn!("{warning}");
        }
        info!(
            entries = decoded.model.len(),
            warnings = decoded.warnings.len(),
            "decoded pakfile"
        );

        Ok(decoded)
    }

    fn read_entry(
        &self,
        data: &[u8],
        header: &CentralDirectoryHeader,
        path: String,
    ) -> Result<ArchiveEntry> {
        let header_start = header.local_header_offset as usize;
        let local = data
            .get(header_start..)
            .filter(|rest| rest.len() >= LOCAL_HEADER_SIZE)
            .ok_or(CodecError::OutOfBounds {
                offset: header_start as u64,
            })?;
        let local = LocalFileHeader::read(&mut Cursor::new(local))?;

        let data_start = header_start + LOCAL_HEADER_SIZE + local.file_name.len() + local.extra.len();
        let packed = data
            .get(data_start..data_start + header.compressed_size as usize)
            .ok_or(CodecError::OutOfBounds {
                offset: data_start as u64,
            })?;

        let content = if path.ends_with('/') {
            Vec::new()
        } else {
            decompress(
                packed,
                header.compression,
                header.flags,
                header.uncompressed_size as u64,
                self.options.capabilities,
            )?
        };

        if content.len() != header.uncompressed_size as usize {
            return Err(CodecError::Corrupt {
                method: header.compression,
                reason: format!(
                    "expected {} bytes, decompressed {}",
                    header.uncompressed_size,
                    content.len()
                ),
            }
            .into());
        }

        if self.options.verify_checksums {
            let found = ZIP_CRC.checksum(&content);
            if found != header.crc32 {
                return Err(CodecError::Checksum {
                    expected: header.crc32,
                    found,
                }
                .into());
            }
        }

        let metadata = EntryMetadata {
            compression_method: Some(header.compression),
            modified: header.modified,
            external_attributes: header.external_attributes,
            comment: (!header.comment.is_empty()).then(|| header.comment.clone()),
        };

        Ok(ArchiveEntry::from_archive(
            path,
            RawName {
                bytes: header.file_name.clone(),
                utf8: header.flags & FLAG_UTF8 != 0,
            },
            metadata,
            header.version_made_by,
            content,
            PackedData {
                method: header.compression,
                flags: header.flags,
                crc32: header.crc32,
                data: packed.to_vec(),
            },
        ))
    }
}

/// Read every entry of a pakfile with every available method
pub fn decode(data: &[u8]) -> Result<DecodedArchive> {
    PakReader::default().decode(data)
}

/// Find the end of central directory record, searching backwards past a possible comment
fn find_end_of_central_directory(data: &[u8]) -> Result<(usize, EndOfCentralDirectory)> {
    if data.len() < END_OF_CENTRAL_DIRECTORY_SIZE {
        return Err(Error::InvalidArchive(format!(
            "{} bytes cannot hold an end of central directory record",
            data.len()
        )));
    }

    let last = data.len() - END_OF_CENTRAL_DIRECTORY_SIZE;
    let first = last.saturating_sub(u16::MAX as usize);
    for start in (first..=last).rev() {
        if &data[start..start + 4] != END_OF_CENTRAL_DIRECTORY_MAGIC {
            continue;
        }

        let comment_length = LittleEndian::read_u16(&data[start + 20..start + 22]) as usize;
        if start + END_OF_CENTRAL_DIRECTORY_SIZE + comment_length > data.len() {
            continue;
        }

        let record = EndOfCentralDirectory::read(&mut Cursor::new(&data[start..]))?;
        return Ok((start, record));
    }

    Err(Error::InvalidArchive(
        "no end of central directory record".to_owned(),
    ))
}

fn read_central_directory(
    data: &[u8],
    eocd_start: usize,
    eocd: &EndOfCentralDirectory,
) -> Result<Vec<CentralDirectoryHeader>> {
    if eocd.disk_number != 0 || eocd.central_directory_disk != 0 {
        return Err(Error::InvalidArchive(
            "multi-disk archives are not supported".to_owned(),
        ));
    }

    let start = eocd.central_directory_offset as usize;
    let end = start + eocd.central_directory_size as usize;
    if end > eocd_start {
        return Err(Error::InvalidArchive(format!(
            "central directory at {start}..{end} overlaps its end record at {eocd_start}"
        )));
    }

    let mut reader = Cursor::new(&data[start..end]);
    (0..eocd.total_entries)
        .map(|i| {
            CentralDirectoryHeader::read(&mut reader).map_err(|e| {
                Error::InvalidArchive(format!("central directory record {i} is unreadable: {e}"))
            })
        })
        .collect()
}

/// Entry name as a string, and whether it had to be decoded lossily
///
/// Names without the UTF-8 flag are IBM code page 437.
fn decode_name(header: &CentralDirectoryHeader) -> (String, bool) {
    if header.flags & FLAG_UTF8 == 0 {
        return (decode_cp437(&header.file_name), false);
    }

    match String::from_utf8(header.file_name.clone()) {
        Ok(name) => (name, false),
        Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
    }
}

#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{A0}',
];

fn decode_cp437(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F => b as char,
            _ => CP437_HIGH[(b - 0x80) as usize],
        })
        .collect()
}
