//! View over the lump directory of a VBSP file
//!

use std::io::Cursor;
use std::ops::Range;

use binrw::{BinRead, BinWrite};
use bon::Builder;
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument};

use crate::error::{Error, FormatError, Result};
use crate::types::{
    BspHeader, LumpEntry, BSP_MAGIC, HEADER_SIZE, LUMP_COUNT, LUMP_ENTRY_SIZE, PREAMBLE_SIZE,
};

/// Changes to apply to a lump directory record
///
/// `version` and `uncompressed_length` keep their previous value unless set.
///
/// ```
/// use bsp_lump::LumpUpdate;
///
/// let update = LumpUpdate::builder().offset(1040).length(100).build();
/// assert_eq!(update.version, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct LumpUpdate {
    /// New offset of the lump data
    pub offset: u32,

    /// New length of the lump data
    pub length: u32,

    /// New lump format version
    pub version: Option<u32>,

    /// New decompressed size of the lump data
    pub uncompressed_length: Option<u32>,
}

/// The lump directory of a VBSP file
///
/// This is a view into the buffer holding the file, every change made with
/// [`LumpDirectory::set_entry`] is written straight into that buffer.
#[derive(Debug)]
pub struct LumpDirectory<B> {
    buffer: B,
}

impl<B: AsRef<[u8]>> LumpDirectory<B> {
    /// Validate the header of `buffer` and provide access to its lump directory
    pub fn read(buffer: B) -> Result<Self> {
        let data = buffer.as_ref();
        if data.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            }
            .into());
        }

        let magic = LittleEndian::read_u32(&data[..4]);
        if magic != BSP_MAGIC {
            return Err(FormatError::Magic {
                expected: BSP_MAGIC,
                found: magic,
            }
            .into());
        }

        Ok(Self { buffer })
    }

    /// Wraps a buffer whose header has already been validated
    pub(crate) fn new_unchecked(buffer: B) -> Self {
        Self { buffer }
    }

    /// The map format version
    pub fn version(&self) -> u32 {
        LittleEndian::read_u32(&self.buffer.as_ref()[4..PREAMBLE_SIZE])
    }

    /// Get the directory record of a lump
    pub fn entry(&self, id: usize) -> Result<LumpEntry> {
        let range = Self::record_range(id)?;
        Ok(LumpEntry::read(&mut Cursor::new(
            &self.buffer.as_ref()[range],
        ))?)
    }

    /// Returns an iterator over every directory record and its lump index
    pub fn entries(&self) -> impl Iterator<Item = (usize, LumpEntry)> + '_ {
        (0..LUMP_COUNT).filter_map(|id| self.entry(id).ok().map(|entry| (id, entry)))
    }

    /// Parse the full header, magic included
    pub fn header(&self) -> Result<BspHeader> {
        Ok(BspHeader::read(&mut Cursor::new(
            &self.buffer.as_ref()[..HEADER_SIZE],
        ))?)
    }

    /// Unwrap and return the underlying buffer
    pub fn into_inner(self) -> B {
        self.buffer
    }

    fn record_range(id: usize) -> Result<Range<usize>> {
        if id >= LUMP_COUNT {
            return Err(Error::Index(id));
        }

        let start = PREAMBLE_SIZE + id * LUMP_ENTRY_SIZE;
        Ok(start..start + LUMP_ENTRY_SIZE)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LumpDirectory<B> {
    /// Overwrite the directory record of a lump, returning the record as written
    #[instrument(skip(self), err)]
    pub fn set_entry(&mut self, id: usize, update: LumpUpdate) -> Result<LumpEntry> {
        let previous = self.entry(id)?;
        let entry = LumpEntry {
            offset: update.offset,
            length: update.length,
            version: update.version.unwrap_or(previous.version),
            uncompressed_length: update
                .uncompressed_length
                .unwrap_or(previous.uncompressed_length),
        };

        let range = Self::record_range(id)?;
        entry.write(&mut Cursor::new(&mut self.buffer.as_mut()[range]))?;
        debug!(?previous, ?entry, "updated lump {id}");

        Ok(entry)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::directory::{LumpDirectory, LumpUpdate};
    use crate::error::{Error, FormatError, Result};
    use crate::types::{LumpEntry, HEADER_SIZE};

    fn empty_container() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..4].copy_from_slice(b"VBSP");
        data[4..8].copy_from_slice(&20u32.to_le_bytes());
        data
    }

    #[test]
    fn read_truncated() {
        let data = empty_container();
        let result = LumpDirectory::read(&data[..HEADER_SIZE - 1]);
        assert!(matches!(
            result,
            Err(Error::Format(FormatError::Truncated {
                expected: 1032,
                actual: 1031
            }))
        ));
    }

    #[test]
    fn read_invalid_magic() {
        let mut data = empty_container();
        data[0] = b'I';
        assert!(matches!(
            LumpDirectory::read(&data[..]),
            Err(Error::Format(FormatError::Magic { .. }))
        ));
    }

    #[test]
    fn read_entry() -> Result<()> {
        let mut data = empty_container();
        data[8 + 3 * 16..8 + 4 * 16].copy_from_slice(&[
            0x08, 0x04, 0, 0, 0x20, 0, 0, 0, 0x02, 0, 0, 0, 0x40, 0, 0, 0,
        ]);

        let directory = LumpDirectory::read(&data[..])?;
        assert_eq!(directory.version(), 20);
        assert_eq!(
            directory.entry(3)?,
            LumpEntry {
                offset: 1032,
                length: 32,
                version: 2,
                uncompressed_length: 64
            }
        );
        assert!(directory.entry(4)?.is_absent());
        assert_eq!(directory.entries().count(), 64);

        Ok(())
    }

    #[test]
    fn entry_out_of_range() -> Result<()> {
        let data = empty_container();
        let directory = LumpDirectory::read(&data[..])?;
        assert!(matches!(directory.entry(64), Err(Error::Index(64))));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn set_entry_preserves_version() -> Result<()> {
        let mut data = empty_container();
        data[8 + 40 * 16 + 8] = 1;
        data[8 + 40 * 16 + 12] = 7;

        let mut directory = LumpDirectory::read(&mut data[..])?;
        let written = directory.set_entry(40, LumpUpdate::builder().offset(1040).length(100).build())?;
        assert_eq!(
            written,
            LumpEntry {
                offset: 1040,
                length: 100,
                version: 1,
                uncompressed_length: 7
            }
        );

        assert_eq!(
            &data[8 + 40 * 16..8 + 41 * 16],
            &[0x10, 0x04, 0, 0, 0x64, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0]
        );

        Ok(())
    }

    #[test]
    fn set_entry_overrides_version() -> Result<()> {
        let mut data = empty_container();
        let mut directory = LumpDirectory::read(&mut data)?;
        directory.set_entry(
            0,
            LumpUpdate::builder()
                .offset(1032)
                .length(8)
                .version(3)
                .uncompressed_length(16)
                .build(),
        )?;

        assert_eq!(
            directory.entry(0)?,
            LumpEntry {
                offset: 1032,
                length: 8,
                version: 3,
                uncompressed_length: 16
            }
        );

        Ok(())
    }

    #[test]
    fn set_entry_out_of_range() -> Result<()> {
        let mut data = empty_container();
        let mut directory = LumpDirectory::read(&mut data)?;
        let result = directory.set_entry(64, LumpUpdate::builder().offset(0).length(0).build());
        assert!(matches!(result, Err(Error::Index(64))));

        Ok(())
    }
}
