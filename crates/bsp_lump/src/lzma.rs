//! LZMA frame compression and decompression handling.
//!
//! Compressed lumps are not stored as `.lzma` or `.xz` streams but wrapped in a small frame of
//! their own: the `"LZMA"` magic, the decompressed and compressed sizes, the 5 byte LZMA
//! properties block and the raw LZMA stream without end marker.

use std::io::{self, Cursor, Read};

use binrw::{BinRead, BinWrite};
use tracing::{debug, instrument};

use crate::error::{Error, FrameError, Result};

/// Magic every LZMA frame starts with
pub const FRAME_MAGIC: [u8; 4] = *b"LZMA";

/// Size of the frame header preceding the payload
pub const FRAME_HEADER_SIZE: usize = 17;

/// Dictionary size used for every frame, regardless of the properties block
pub const DICTIONARY_SIZE: u32 = 1 << 24;

/// Output space reserved up front per payload byte, the declared size is not trusted beyond it
const MAX_PREALLOCATION_RATIO: usize = 8;

/// LZMA frame header
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"LZMA", little)]
pub struct FrameHeader {
    /// The size of the data once decompressed
    pub uncompressed_size: u32,

    /// The size of the raw LZMA payload following the header
    pub compressed_size: u32,

    /// The raw LZMA properties block, `lc`/`lp`/`pb` followed by the dictionary size
    pub properties: [u8; 5],
}

impl FrameHeader {
    /// Parse the header at the start of `data` without decompressing anything
    pub fn parse(data: &[u8]) -> Result<FrameHeader> {
        if !is_framed(data) {
            let found = data.iter().take(FRAME_MAGIC.len()).copied().collect();
            return Err(FrameError::Magic(found).into());
        }
        if data.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::Truncated(data.len()).into());
        }

        Ok(FrameHeader::read(&mut Cursor::new(&data[..FRAME_HEADER_SIZE]))?)
    }
}

/// Whether `data` starts with the LZMA frame magic
pub fn is_framed(data: &[u8]) -> bool {
    data.starts_with(&FRAME_MAGIC)
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count += read as u64;
        Ok(read)
    }
}

/// Decompress an LZMA frame, returning the data and the properties block it was stored with
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn decode(data: &[u8]) -> Result<(Vec<u8>, [u8; 5])> {
    let header = FrameHeader::parse(data)?;
    let compressed_size = header.compressed_size as usize;

    let payload = data
        .get(FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + compressed_size)
        .ok_or_else(|| {
            Error::Codec(format!(
                "frame declares {} payload bytes but only {} are present",
                compressed_size,
                data.len() - FRAME_HEADER_SIZE
            ))
        })?;

    let mut input = CountingReader {
        inner: payload,
        count: 0,
    };
    let capacity = compressed_size.saturating_mul(MAX_PREALLOCATION_RATIO);
    let mut output = Vec::with_capacity((header.uncompressed_size as usize).min(capacity));
    {
        let mut reader = lzma_rust2::LzmaReader::new_with_props(
            &mut input,
            header.uncompressed_size as u64,
            header.properties[0],
            DICTIONARY_SIZE,
            None,
        )
        .map_err(|e| Error::Codec(e.to_string()))?;

        reader
            .read_to_end(&mut output)
            .map_err(|e| Error::Codec(format!("lzma payload is corrupt: {e}")))?;
    }

    if output.len() != header.uncompressed_size as usize {
        return Err(Error::Codec(format!(
            "frame declares {} bytes but {} were decompressed",
            header.uncompressed_size,
            output.len()
        )));
    }

    let unread = compressed_size as u64 - input.count;
    if unread != 0 {
        return Err(Error::Codec(format!(
            "lzma stream ended {unread} bytes before the end of the payload"
        )));
    }

    debug!(
        compressed = compressed_size,
        uncompressed = output.len(),
        "decoded lzma frame"
    );

    Ok((output, header.properties))
}

/// Compress `data` into an LZMA frame
///
/// The frame always carries the properties the encoder actually used. `properties` taken from a
/// previously decoded frame are only compared against them, so a re-encoded frame decodes to the
/// same data but is not guaranteed to match the original frame byte for byte.
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn encode(data: &[u8], properties: Option<[u8; 5]>) -> Result<Vec<u8>> {
    let uncompressed_size =
        u32::try_from(data.len()).map_err(|_| Error::Codec("frame input exceeds 4 GiB".into()))?;

    let mut options = lzma_rust2::LzmaOptions::with_preset(6);
    options.dict_size = DICTIONARY_SIZE;

    let mut derived = [0u8; 5];
    derived[0] = options.get_props();
    derived[1..].copy_from_slice(&DICTIONARY_SIZE.to_le_bytes());

    if let Some(requested) = properties.filter(|p| *p != derived) {
        debug!(?requested, ?derived, "writing encoder properties in place of the requested ones");
    }

    let mut payload = Vec::new();
    {
        let mut writer = lzma_rust2::LzmaWriter::new_no_header(&mut payload, &options, false)
            .map_err(|e| Error::Codec(e.to_string()))?;
        io::Write::write_all(&mut writer, data)?;
        writer.finish().map_err(|e| Error::Codec(e.to_string()))?;
    }

    let header = FrameHeader {
        uncompressed_size,
        compressed_size: u32::try_from(payload.len())
            .map_err(|_| Error::Codec("frame payload exceeds 4 GiB".into()))?,
        properties: derived,
    };

    let mut out = Cursor::new(Vec::with_capacity(FRAME_HEADER_SIZE + payload.len()));
    header.write(&mut out)?;
    let mut out = out.into_inner();
    out.extend_from_slice(&payload);

    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, FrameError, Result};
    use crate::lzma::{decode, encode, is_framed, FrameHeader, DICTIONARY_SIZE, FRAME_HEADER_SIZE};

    const TEXT: &[u8] = b"{\n\"world_maxs\" \"2048 2048 512\"\n\"skyname\" \"sky_day01_01\"\n\"classname\" \"worldspawn\"\n}\n";

    #[traced_test]
    #[test]
    fn encode_then_decode() -> Result<()> {
        let frame = encode(TEXT, None)?;
        assert!(is_framed(&frame));

        let header = FrameHeader::parse(&frame)?;
        assert_eq!(header.uncompressed_size as usize, TEXT.len());
        assert_eq!(header.compressed_size as usize, frame.len() - FRAME_HEADER_SIZE);
        assert_eq!(header.properties[0], 0x5D);
        assert_eq!(&header.properties[1..], &DICTIONARY_SIZE.to_le_bytes());

        let (decoded, properties) = decode(&frame)?;
        assert_eq!(decoded, TEXT);
        assert_eq!(properties, header.properties);

        Ok(())
    }

    #[test]
    fn encode_then_decode_empty() -> Result<()> {
        let frame = encode(&[], None)?;
        let (decoded, _) = decode(&frame)?;
        assert!(decoded.is_empty());

        Ok(())
    }

    #[test]
    fn encode_then_decode_repetitive() -> Result<()> {
        let data = TEXT.repeat(500);
        let frame = encode(&data, Some([0x5D, 0, 0, 0, 1]))?;
        assert!(frame.len() < data.len() / 10);

        let (decoded, _) = decode(&frame)?;
        assert_eq!(decoded, data);

        Ok(())
    }

    #[test]
    fn decode_invalid_magic() {
        #[rustfmt::skip]
        let input = [
            0x4C, 0x5A, 0x4D, 0x42,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x5D, 0x00, 0x00, 0x00, 0x01,
        ];

        assert!(matches!(
            decode(&input),
            Err(Error::Frame(FrameError::Magic(_)))
        ));
    }

    #[test]
    fn decode_truncated_header() {
        assert!(matches!(
            decode(b"LZMA\x01\x00"),
            Err(Error::Frame(FrameError::Truncated(6)))
        ));
    }

    #[test]
    fn decode_truncated_payload() -> Result<()> {
        let frame = encode(TEXT, None)?;
        assert!(matches!(
            decode(&frame[..frame.len() - 4]),
            Err(Error::Codec(_))
        ));

        Ok(())
    }

    #[test]
    fn decode_size_mismatch() -> Result<()> {
        let mut frame = encode(TEXT, None)?;
        frame[4..8].copy_from_slice(&(TEXT.len() as u32 + 10).to_le_bytes());
        assert!(matches!(decode(&frame), Err(Error::Codec(_))));

        Ok(())
    }

    #[test]
    fn decode_one_trailing_byte() -> Result<()> {
        let mut frame = encode(TEXT, None)?;
        let compressed = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
        frame[8..12].copy_from_slice(&(compressed + 1).to_le_bytes());
        frame.push(0);

        assert!(matches!(decode(&frame), Err(Error::Codec(_))));

        Ok(())
    }

    #[test]
    fn decode_oversized_declaration() {
        #[rustfmt::skip]
        let input = [
            0x4C, 0x5A, 0x4D, 0x41,
            0xFF, 0xFF, 0xFF, 0xFF,
            0x00, 0x00, 0x00, 0x00,
            0x5D, 0x00, 0x00, 0x00, 0x01,
        ];

        assert!(matches!(decode(&input), Err(Error::Codec(_))));
    }

    #[test]
    fn decode_trailing_payload() -> Result<()> {
        let mut frame = encode(TEXT, None)?;
        let compressed = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
        frame[8..12].copy_from_slice(&(compressed + 8).to_le_bytes());
        frame.extend_from_slice(&[0u8; 8]);

        assert!(matches!(decode(&frame), Err(Error::Codec(_))));

        Ok(())
    }
}
