//! Types for writing pakfile archives
//!

use std::fmt;
use std::io::{Cursor, Write};

use binrw::BinWrite;
use bon::Builder;
use tracing::{info, instrument, warn};

use crate::compression::{compress, Capabilities, CompressionMethod, ZIP_CRC};
use crate::error::{Error, Result};
use crate::model::{ArchiveEntry, ArchiveModel};
use crate::types::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, FLAG_COMPRESSION_OPTIONS,
    FLAG_UTF8,
};

/// Host system written for entries that do not remember one, unix
const HOST_UNIX: u16 = 3 << 8;

/// An entry that could not be written with the method it asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedEncoding {
    /// Path of the entry
    pub path: String,

    /// The method the entry asked for
    pub requested: CompressionMethod,

    /// The method it was written with
    pub used: CompressionMethod,

    /// Why the requested method was not used
    pub reason: String,
}

impl fmt::Display for DegradedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: written with {} instead of {} ({})",
            self.path, self.used, self.requested, self.reason
        )
    }
}

/// The result of encoding a pakfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArchive {
    /// The archive bytes
    pub data: Vec<u8>,

    /// Entries written with a different method than requested
    pub degraded: Vec<DegradedEncoding>,
}

/// Options for how the pakfile should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct PakWriterOptions {
    /// The methods entries can be compressed with
    #[builder(default)]
    pub capabilities: Capabilities,

    /// Whether entries read from an archive keep their compressed data when written with the same
    /// method
    #[builder(default = true)]
    pub reuse_packed: bool,
}

impl Default for PakWriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct PreparedData {
    method: CompressionMethod,
    flags: u16,
    crc32: u32,
    data: Vec<u8>,
}

/// Pakfile generator
///
/// Directories are written first, then files, each sorted by path. Every entry is written with
/// the method it remembers when an encoder for it is available, falling back to Deflate for LZMA
/// and to Stored for anything else.
///
/// ```
/// # fn doit() -> bsp_pak::error::Result<()>
/// # {
/// use bsp_pak::{ArchiveEntry, ArchiveModel, PakWriter};
///
/// let mut model = ArchiveModel::new();
/// model.insert(ArchiveEntry::directory("materials"));
/// model.insert(ArchiveEntry::file("materials/wall.vmt", b"\"LightmappedGeneric\" {}".to_vec()));
///
/// let encoded = PakWriter::default().encode(&model)?;
/// assert!(encoded.degraded.is_empty());
///
/// let decoded = bsp_pak::decode(&encoded.data)?;
/// assert_eq!(decoded.model.len(), 2);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PakWriter {
    options: PakWriterOptions,
}

impl PakWriter {
    pub fn new(options: PakWriterOptions) -> Self {
        Self { options }
    }

    /// Write every entry of the model into a new archive
    #[instrument(skip_all, fields(entries = model.len()), err)]
    pub fn encode(&self, model: &ArchiveModel) -> Result<EncodedArchive> {
        let entries = model.write_order();
        let count = u16::try_from(entries.len())
            .map_err(|_| Error::TooLarge(format!("{} entries", entries.len())))?;
        if model.comment().len() > u16::MAX as usize {
            return Err(Error::TooLarge("archive comment".to_owned()));
        }

        let mut out = Cursor::new(Vec::new());
        let mut central = Vec::with_capacity(entries.len());
        let mut degraded = Vec::new();

        for entry in entries {
            let prepared = self.prepare(entry, &mut degraded)?;
            let (name, utf8) = match entry.raw_name() {
                Some(raw) => (raw.bytes.clone(), raw.utf8),
                None => (entry.path().as_bytes().to_vec(), !entry.path().is_ascii()),
            };
            if name.len() > u16::MAX as usize {
                return Err(Error::TooLarge(format!("name of {}", entry.path())));
            }
            let comment = entry.comment().map(<[u8]>::to_vec).unwrap_or_default();
            if comment.len() > u16::MAX as usize {
                return Err(Error::TooLarge(format!("comment of {}", entry.path())));
            }

            let flags = prepared.flags | if utf8 { FLAG_UTF8 } else { 0 };
            let version_needed = prepared.method.version_needed();
            let offset = checked_u32(out.position() as usize, "archive")?;
            let compressed_size = checked_u32(prepared.data.len(), entry.path())?;
            let uncompressed_size = checked_u32(entry.content().len(), entry.path())?;

            LocalFileHeader {
                version_needed,
                flags,
                compression: prepared.method,
                modified: entry.modified(),
                crc32: prepared.crc32,
                compressed_size,
                uncompressed_size,
                file_name: name.clone(),
                extra: Vec::new(),
            }
            .write(&mut out)?;
            out.write_all(&prepared.data)?;

            central.push(CentralDirectoryHeader {
                version_made_by: entry
                    .version_made_by()
                    .unwrap_or(HOST_UNIX | version_needed),
                version_needed,
                flags,
                compression: prepared.method,
                modified: entry.modified(),
                crc32: prepared.crc32,
                compressed_size,
                uncompressed_size,
                disk_number_start: 0,
                internal_attributes: 0,
                external_attributes: entry.external_attributes(),
                local_header_offset: offset,
                file_name: name,
                extra: Vec::new(),
                comment,
            });
        }

        let central_directory_offset = checked_u32(out.position() as usize, "archive")?;
        for header in &central {
            header.write(&mut out)?;
        }
        let central_directory_size =
            checked_u32(out.position() as usize, "archive")? - central_directory_offset;

        EndOfCentralDirectory {
            disk_number: 0,
            central_directory_disk: 0,
            disk_entries: count,
            total_entries: count,
            central_directory_size,
            central_directory_offset,
            comment: model.comment().to_vec(),
        }
        .write(&mut out)?;

        for event in &degraded {
            warn!("{event}");
        }
        let data = out.into_inner();
        info!(
            size = data.len(),
            degraded = degraded.len(),
            "encoded pakfile"
        );

        Ok(EncodedArchive { data, degraded })
    }

    fn prepare(
        &self,
        entry: &ArchiveEntry,
        degraded: &mut Vec<DegradedEncoding>,
    ) -> Result<PreparedData> {
        if entry.is_directory() {
            if let Some(requested) = entry
                .compression_method()
                .filter(|m| *m != CompressionMethod::Stored)
            {
                degraded.push(DegradedEncoding {
                    path: entry.path().to_owned(),
                    requested,
                    used: CompressionMethod::Stored,
                    reason: "directories carry no data and are always stored".to_owned(),
                });
            }
            return Ok(PreparedData {
                method: CompressionMethod::Stored,
                flags: 0,
                crc32: 0,
                data: Vec::new(),
            });
        }

        let (method, reason) = self.options.capabilities.select(entry.compression_method());
        if let (Some(reason), Some(requested)) = (reason, entry.compression_method()) {
            degraded.push(DegradedEncoding {
                path: entry.path().to_owned(),
                requested,
                used: method,
                reason,
            });
        }

        if self.options.reuse_packed {
            if let Some(packed) = entry.packed().filter(|p| p.method == method) {
                return Ok(PreparedData {
                    method,
                    flags: packed.flags & FLAG_COMPRESSION_OPTIONS,
                    crc32: packed.crc32,
                    data: packed.data.clone(),
                });
            }
        }

        let crc32 = ZIP_CRC.checksum(entry.content());
        match compress(entry.content(), method) {
            Ok((data, flags)) => Ok(PreparedData {
                method,
                flags,
                crc32,
                data,
            }),
            Err(e) if method != CompressionMethod::Stored => {
                degraded.push(DegradedEncoding {
                    path: entry.path().to_owned(),
                    requested: method,
                    used: CompressionMethod::Stored,
                    reason: e.to_string(),
                });
                Ok(PreparedData {
                    method: CompressionMethod::Stored,
                    flags: 0,
                    crc32,
                    data: entry.content().to_vec(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Write every entry of the model with every available method
pub fn encode(model: &ArchiveModel) -> Result<EncodedArchive> {
    PakWriter::default().encode(model)
}

fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge(format!("{what} exceeds 4 GiB")))
}
