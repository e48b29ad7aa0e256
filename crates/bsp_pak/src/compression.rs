//! Entry compression and decompression handling.

use std::fmt;
use std::io::{self, Read, Write};

use bon::Builder;
use byteorder::{ByteOrder, LittleEndian};
use crc::{Crc, CRC_32_ISO_HDLC};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::types::{FLAG_ENCRYPTED, FLAG_LZMA_EOS};

/// Checksum stored with every ZIP entry
pub(crate) const ZIP_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Version of the LZMA SDK written in front of method 14 data
const LZMA_SDK_VERSION: [u8; 2] = [9, 4];

/// Size of the properties block of method 14 data
const LZMA_PROPERTIES_SIZE: usize = 5;

/// Output space reserved up front per compressed byte, the declared size is not trusted beyond it
const MAX_PREALLOCATION_RATIO: usize = 8;

/// Identifies the storage format used to compress an entry inside the pakfile
///
/// Methods without an implementation here are kept as [`CompressionMethod::Unknown`] so their
/// code survives being read and written back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u16", into = "u16"))]
pub enum CompressionMethod {
    /// Stores the data as it is
    Stored,

    /// Compress the data using raw Deflate
    Deflate,

    /// Compress the data using BZIP2
    Bzip2,

    /// Compress the data using LZMA
    Lzma,

    /// Any other method code
    Unknown(u16),
}

impl CompressionMethod {
    /// Minimum ZIP version needed to extract data stored with this method
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored | CompressionMethod::Deflate => 20,
            CompressionMethod::Bzip2 => 46,
            CompressionMethod::Lzma => 63,
            CompressionMethod::Unknown(_) => 20,
        }
    }
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            other => CompressionMethod::Unknown(other),
        }
    }
}

impl From<CompressionMethod> for u16 {
    fn from(value: CompressionMethod) -> Self {
        match value {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Lzma => 14,
            CompressionMethod::Unknown(other) => other,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => write!(f, "stored"),
            CompressionMethod::Deflate => write!(f, "deflate"),
            CompressionMethod::Bzip2 => write!(f, "bzip2"),
            CompressionMethod::Lzma => write!(f, "lzma"),
            CompressionMethod::Unknown(code) => write!(f, "method {code}"),
        }
    }
}

/// The compression methods available for reading and writing entries
///
/// Stored and Deflate are always available. LZMA and BZIP2 can be turned off to reproduce the
/// output of a more limited toolchain; BZIP2 additionally requires the `bzip2` feature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Builder)]
pub struct Capabilities {
    /// Whether LZMA data can be read and written
    #[builder(default = true)]
    pub lzma: bool,

    /// Whether BZIP2 data can be read and written
    #[builder(default = cfg!(feature = "bzip2"))]
    pub bzip2: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

impl Capabilities {
    /// Every method compiled into this build
    pub fn detect() -> Self {
        Self::builder().build()
    }

    /// Stored and Deflate only
    pub fn minimal() -> Self {
        Self {
            lzma: false,
            bzip2: false,
        }
    }

    /// Whether data using `method` can be processed
    pub fn supports(&self, method: CompressionMethod) -> bool {
        match method {
            CompressionMethod::Stored | CompressionMethod::Deflate => true,
            CompressionMethod::Lzma => self.lzma,
            CompressionMethod::Bzip2 => self.bzip2 && cfg!(feature = "bzip2"),
            CompressionMethod::Unknown(_) => false,
        }
    }

    /// The method new entries are written with
    pub fn preferred(&self) -> CompressionMethod {
        if self.supports(CompressionMethod::Lzma) {
            CompressionMethod::Lzma
        } else {
            CompressionMethod::Deflate
        }
    }

    /// Pick the method to write an entry with, given the method it remembers
    ///
    /// Returns the method and, when it differs from the remembered one, the reason why.
    pub fn select(&self, remembered: Option<CompressionMethod>) -> (CompressionMethod, Option<String>) {
        match remembered {
            None => (self.preferred(), None),
            Some(method) if self.supports(method) => (method, None),
            Some(CompressionMethod::Lzma) => (
                CompressionMethod::Deflate,
                Some("no lzma encoder is available".to_owned()),
            ),
            Some(method) => (
                CompressionMethod::Stored,
                Some(format!("no {method} encoder is available")),
            ),
        }
    }
}

pub(crate) enum PakBlockReader<'a> {
    Stored(&'a [u8]),
    Deflate(Box<DeflateDecoder<&'a [u8]>>),
    #[cfg(feature = "bzip2")]
    Bzip2(Box<bzip2::read::BzDecoder<&'a [u8]>>),
    Lzma(Box<lzma_rust2::LzmaReader<&'a [u8]>>),
}

impl<'a> PakBlockReader<'a> {
    #[instrument(skip(data), fields(size = data.len()), err)]
    pub fn new(
        data: &'a [u8],
        method: CompressionMethod,
        flags: u16,
        uncompressed_size: u64,
        capabilities: Capabilities,
    ) -> Result<Self> {
        if flags & FLAG_ENCRYPTED != 0 {
            return Err(CodecError::Encrypted.into());
        }
        if !capabilities.supports(method) {
            return Err(CodecError::Unsupported(method).into());
        }

        Ok(match method {
            CompressionMethod::Stored => PakBlockReader::Stored(data),
            CompressionMethod::Deflate => PakBlockReader::Deflate(Box::new(DeflateDecoder::new(data))),
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => {
                PakBlockReader::Bzip2(Box::new(bzip2::read::BzDecoder::new(data)))
            }
            CompressionMethod::Lzma => {
                PakBlockReader::Lzma(Box::new(lzma_reader(data, uncompressed_size)?))
            }
            other => return Err(CodecError::Unsupported(other).into()),
        })
    }
}

impl Read for PakBlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PakBlockReader::Stored(r) => r.read(buf),
            PakBlockReader::Deflate(r) => r.read(buf),
            #[cfg(feature = "bzip2")]
            PakBlockReader::Bzip2(r) => r.read(buf),
            PakBlockReader::Lzma(r) => r.read(buf),
        }
    }
}

/// Method 14 data: SDK version, properties size, properties, then the raw LZMA stream
fn lzma_reader(data: &[u8], uncompressed_size: u64) -> Result<lzma_rust2::LzmaReader<&[u8]>> {
    let corrupt = |reason: String| CodecError::Corrupt {
        method: CompressionMethod::Lzma,
        reason,
    };

    if data.len() < 4 {
        return Err(corrupt("missing lzma header".into()).into());
    }

    let properties_size = LittleEndian::read_u16(&data[2..4]) as usize;
    if properties_size != LZMA_PROPERTIES_SIZE || data.len() < 4 + properties_size {
        return Err(corrupt(format!("invalid properties size {properties_size}")).into());
    }

    let properties = &data[4..4 + LZMA_PROPERTIES_SIZE];
    let dict_size = LittleEndian::read_u32(&properties[1..]);

    lzma_rust2::LzmaReader::new_with_props(
        &data[4 + LZMA_PROPERTIES_SIZE..],
        uncompressed_size,
        properties[0],
        dict_size,
        None,
    )
    .map_err(|e| corrupt(e.to_string()).into())
}

/// Decompress the data of an entry
pub(crate) fn decompress(
    data: &[u8],
    method: CompressionMethod,
    flags: u16,
    uncompressed_size: u64,
    capabilities: Capabilities,
) -> Result<Vec<u8>> {
    let reader = PakBlockReader::new(data, method, flags, uncompressed_size, capabilities)?;

    let capacity = data.len().saturating_mul(MAX_PREALLOCATION_RATIO);
    let mut out = Vec::with_capacity((uncompressed_size as usize).min(capacity));
    reader
        .take(uncompressed_size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Corrupt {
            method,
            reason: e.to_string(),
        })?;

    Ok(out)
}

/// Compress the data of an entry, returning the compressed bytes and the general purpose flags
/// describing them
#[instrument(skip(data), fields(size = data.len()), err)]
pub(crate) fn compress(data: &[u8], method: CompressionMethod) -> Result<(Vec<u8>, u16)> {
    let failed = |e: io::Error| CodecError::Compress {
        method,
        reason: e.to_string(),
    };

    let (out, flags) = match method {
        CompressionMethod::Stored => (data.to_vec(), 0),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(failed)?;
            (encoder.finish().map_err(failed)?, 0)
        }
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(data).map_err(failed)?;
            (encoder.finish().map_err(failed)?, 0)
        }
        CompressionMethod::Lzma => (compress_lzma(data).map_err(failed)?, FLAG_LZMA_EOS),
        other => return Err(CodecError::Unsupported(other).into()),
    };

    debug!(compressed = out.len(), "compressed entry with {method}");
    Ok((out, flags))
}

fn compress_lzma(data: &[u8]) -> io::Result<Vec<u8>> {
    let options = lzma_rust2::LzmaOptions::with_preset(6);

    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.extend_from_slice(&LZMA_SDK_VERSION);
    out.extend_from_slice(&(LZMA_PROPERTIES_SIZE as u16).to_le_bytes());
    out.push(options.get_props());
    out.extend_from_slice(&options.dict_size.to_le_bytes());

    {
        let mut writer = lzma_rust2::LzmaWriter::new_no_header(&mut out, &options, true)
            .map_err(|e| io::Error::other(e.to_string()))?;
        writer.write_all(data)?;
        writer
            .finish()
            .map_err(|e| io::Error::other(e.to_string()))?;
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::{compress, decompress, Capabilities, CompressionMethod};
    use crate::error::{CodecError, Error, Result};
    use crate::types::FLAG_ENCRYPTED;

    const DATA: &[u8] = b"\"VertexLitGeneric\"\n{\n\t\"$basetexture\" \"custom/wall01\"\n\t\"$surfaceprop\" \"concrete\"\n}\n";

    #[test]
    fn method_codes() {
        assert_eq!(CompressionMethod::from(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from(12), CompressionMethod::Bzip2);
        assert_eq!(CompressionMethod::from(14), CompressionMethod::Lzma);
        assert_eq!(CompressionMethod::from(99), CompressionMethod::Unknown(99));
        assert_eq!(u16::from(CompressionMethod::Unknown(99)), 99);
    }

    #[test]
    fn compress_then_decompress_every_method() -> Result<()> {
        let capabilities = Capabilities::detect();
        let mut methods = vec![
            CompressionMethod::Stored,
            CompressionMethod::Deflate,
            CompressionMethod::Lzma,
        ];
        if capabilities.supports(CompressionMethod::Bzip2) {
            methods.push(CompressionMethod::Bzip2);
        }

        let data = DATA.repeat(20);
        for method in methods {
            let (compressed, flags) = compress(&data, method)?;
            let decompressed =
                decompress(&compressed, method, flags, data.len() as u64, capabilities)?;
            assert_eq!(decompressed, data, "{method}");
        }

        Ok(())
    }

    #[test]
    fn lzma_data_layout() -> Result<()> {
        let (compressed, flags) = compress(DATA, CompressionMethod::Lzma)?;
        assert_eq!(&compressed[..4], &[9, 4, 5, 0]);
        assert_eq!(flags, 0x0002);

        Ok(())
    }

    #[test]
    fn decompress_without_capability() {
        let result = decompress(
            DATA,
            CompressionMethod::Lzma,
            0,
            DATA.len() as u64,
            Capabilities::minimal(),
        );
        assert!(matches!(
            result,
            Err(Error::Codec(CodecError::Unsupported(CompressionMethod::Lzma)))
        ));
    }

    #[test]
    fn decompress_encrypted() {
        let result = decompress(
            DATA,
            CompressionMethod::Stored,
            FLAG_ENCRYPTED,
            DATA.len() as u64,
            Capabilities::detect(),
        );
        assert!(matches!(result, Err(Error::Codec(CodecError::Encrypted))));
    }

    #[test]
    fn decompress_stops_past_declared_size() -> Result<()> {
        let (compressed, _) = compress(&[0x41; 4096], CompressionMethod::Deflate)?;
        let out = decompress(
            &compressed,
            CompressionMethod::Deflate,
            0,
            10,
            Capabilities::detect(),
        )?;
        assert_eq!(out.len(), 11);

        Ok(())
    }

    #[test]
    fn decompress_corrupt_deflate() {
        let result = decompress(
            &[0xFF; 16],
            CompressionMethod::Deflate,
            0,
            64,
            Capabilities::detect(),
        );
        assert!(matches!(result, Err(Error::Codec(CodecError::Corrupt { .. }))));
    }

    #[test]
    fn select_method_fallbacks() {
        let full = Capabilities::builder().lzma(true).bzip2(true).build();
        let minimal = Capabilities::minimal();

        assert_eq!(full.select(None), (CompressionMethod::Lzma, None));
        assert_eq!(minimal.select(None), (CompressionMethod::Deflate, None));
        assert_eq!(
            minimal.select(Some(CompressionMethod::Deflate)),
            (CompressionMethod::Deflate, None)
        );

        let (method, reason) = minimal.select(Some(CompressionMethod::Lzma));
        assert_eq!(method, CompressionMethod::Deflate);
        assert!(reason.is_some());

        let (method, reason) = minimal.select(Some(CompressionMethod::Bzip2));
        assert_eq!(method, CompressionMethod::Stored);
        assert!(reason.is_some());

        let (method, reason) = full.select(Some(CompressionMethod::Unknown(99)));
        assert_eq!(method, CompressionMethod::Stored);
        assert!(reason.is_some());
    }
}
