//! Types for reading and rewriting VBSP files
//!

use std::fmt::{self, Debug};
use std::io::Read;

use tracing::{info, instrument};

use crate::directory::{LumpDirectory, LumpUpdate};
use crate::error::{Error, FormatError, Result};
use crate::types::LumpEntry;

/// A VBSP map file held in memory
///
/// ```no_run
/// use bsp_lump::{Container, LUMP_PAKFILE};
///
/// fn replace_pakfile(map: Vec<u8>, archive: &[u8]) -> bsp_lump::error::Result<Vec<u8>> {
///     let container = Container::new(map)?;
///     println!("old pakfile: {} bytes", container.read_lump(LUMP_PAKFILE)?.len());
///
///     Ok(container.splice_lump(LUMP_PAKFILE, archive)?.into_inner())
/// }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Container {
    data: Vec<u8>,
}

impl Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Container(version: {}, {} bytes)",
            self.version(),
            self.data.len()
        )
    }
}

impl Container {
    /// Take ownership of the bytes of a map file, validating its header
    pub fn new(data: Vec<u8>) -> Result<Container> {
        LumpDirectory::read(data.as_slice())?;
        Ok(Container { data })
    }

    /// Read a whole map file
    pub fn from_reader(mut reader: impl Read) -> Result<Container> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::new(data)
    }

    /// The lump directory of this file
    pub fn directory(&self) -> LumpDirectory<&[u8]> {
        LumpDirectory::new_unchecked(self.data.as_slice())
    }

    /// The lump directory of this file, writing through to the file bytes
    pub fn directory_mut(&mut self) -> LumpDirectory<&mut [u8]> {
        LumpDirectory::new_unchecked(self.data.as_mut_slice())
    }

    /// The map format version
    pub fn version(&self) -> u32 {
        self.directory().version()
    }

    /// Size of the file in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file holds no bytes, never true for a valid container
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw bytes of the file
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Unwrap and return the raw bytes of the file
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Get the directory record of a lump
    pub fn lump_entry(&self, id: usize) -> Result<LumpEntry> {
        self.directory().entry(id)
    }

    /// Whether the data of a present lump ends exactly at the end of the file
    pub fn is_terminal(&self, id: usize) -> Result<bool> {
        let entry = self.lump_entry(id)?;
        Ok(!entry.is_absent() && entry.end() == self.data.len() as u64)
    }

    /// Get the data of a lump
    ///
    /// An absent lump yields an empty slice.
    pub fn read_lump(&self, id: usize) -> Result<&[u8]> {
        let entry = self.lump_entry(id)?;
        if entry.is_absent() {
            return Ok(&[]);
        }

        let range = self.checked_range(id, &entry)?;
        Ok(&self.data[range])
    }

    /// Replace the data of a lump, returning the rewritten file
    ///
    /// An absent lump is appended at the end of the file. A present lump is replaced in place,
    /// which may only change its size when it is the last region of the file: the offsets of
    /// the other lumps are never rewritten.
    #[instrument(skip(self, data), fields(size = data.len()), err)]
    pub fn splice_lump(self, id: usize, data: &[u8]) -> Result<Container> {
        let entry = self.lump_entry(id)?;
        let new_length = Self::checked_length(data.len())?;

        if entry.is_absent() {
            let offset = Self::checked_length(self.data.len())?;
            info!("appending lump {id} at {offset}");

            let mut out = self.data;
            out.extend_from_slice(data);

            let mut container = Container { data: out };
            container.directory_mut().set_entry(
                id,
                LumpUpdate::builder().offset(offset).length(new_length).build(),
            )?;
            return Ok(container);
        }

        let range = self.checked_range(id, &entry)?;
        if new_length != entry.length && entry.end() != self.data.len() as u64 {
            return Err(Error::UnsafeSplice {
                id,
                end: entry.end(),
                len: self.data.len() as u64,
            });
        }

        info!(
            "replacing lump {id} at {} ({} -> {} bytes)",
            entry.offset, entry.length, new_length
        );

        let mut out = Vec::with_capacity(self.data.len() - range.len() + data.len());
        out.extend_from_slice(&self.data[..range.start]);
        out.extend_from_slice(data);
        out.extend_from_slice(&self.data[range.end..]);

        let mut container = Container { data: out };
        container.directory_mut().set_entry(
            id,
            LumpUpdate::builder()
                .offset(entry.offset)
                .length(new_length)
                .build(),
        )?;
        Ok(container)
    }

    /// Rewrite the data of a present lump inside the region it already occupies
    ///
    /// Unused bytes at the end of the region are zeroed. Data larger than the region can only be
    /// written to the last lump of the file, see [`Container::splice_lump`].
    #[instrument(skip(self, data), fields(size = data.len()), err)]
    pub fn overwrite_lump(
        mut self,
        id: usize,
        data: &[u8],
        uncompressed_length: Option<u32>,
    ) -> Result<Container> {
        let entry = self.lump_entry(id)?;
        let new_length = Self::checked_length(data.len())?;

        if entry.is_absent() || new_length > entry.length {
            if !entry.is_absent() && !self.is_terminal(id)? {
                return Err(Error::UnsafeSplice {
                    id,
                    end: entry.end(),
                    len: self.data.len() as u64,
                });
            }

            let mut container = self.splice_lump(id, data)?;
            if let Some(uncompressed_length) = uncompressed_length {
                let entry = container.lump_entry(id)?;
                container.directory_mut().set_entry(
                    id,
                    LumpUpdate::builder()
                        .offset(entry.offset)
                        .length(entry.length)
                        .uncompressed_length(uncompressed_length)
                        .build(),
                )?;
            }
            return Ok(container);
        }

        let range = self.checked_range(id, &entry)?;
        let (head, tail) = self.data[range].split_at_mut(data.len());
        head.copy_from_slice(data);
        tail.fill(0);

        self.directory_mut().set_entry(
            id,
            LumpUpdate::builder()
                .offset(entry.offset)
                .length(new_length)
                .maybe_uncompressed_length(uncompressed_length)
                .build(),
        )?;
        Ok(self)
    }

    fn checked_range(&self, id: usize, entry: &LumpEntry) -> Result<std::ops::Range<usize>> {
        if entry.end() > self.data.len() as u64 {
            return Err(FormatError::OutOfBounds {
                id,
                start: entry.offset as u64,
                end: entry.end(),
                len: self.data.len() as u64,
            }
            .into());
        }

        Ok(entry.offset as usize..entry.end() as usize)
    }

    fn checked_length(len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| FormatError::TooLarge(len).into())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::container::Container;
    use crate::directory::LumpUpdate;
    use crate::error::{Error, FormatError, Result};
    use crate::types::{LumpEntry, HEADER_SIZE};
    use crate::LUMP_PAKFILE;

    fn empty_container() -> Container {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..4].copy_from_slice(b"VBSP");
        data[4..8].copy_from_slice(&20u32.to_le_bytes());
        Container::new(data).expect("valid header")
    }

    /// Lump 1 holds `aaaa`, lump 2 holds `bbbbbb` and ends the file.
    fn two_lump_container() -> Result<Container> {
        let mut data = empty_container().into_inner();
        data.extend_from_slice(b"aaaabbbbbb");

        let mut container = Container::new(data)?;
        let mut directory = container.directory_mut();
        directory.set_entry(1, LumpUpdate::builder().offset(1032).length(4).build())?;
        directory.set_entry(2, LumpUpdate::builder().offset(1036).length(6).build())?;
        Ok(container)
    }

    #[test]
    fn read_absent_lump() -> Result<()> {
        let container = empty_container();
        assert!(container.read_lump(LUMP_PAKFILE)?.is_empty());

        Ok(())
    }

    #[test]
    fn read_present_lump() -> Result<()> {
        let container = two_lump_container()?;
        assert_eq!(container.read_lump(1)?, b"aaaa");
        assert_eq!(container.read_lump(2)?, b"bbbbbb");
        assert!(container.is_terminal(2)?);
        assert!(!container.is_terminal(1)?);

        Ok(())
    }

    #[test]
    fn read_lump_out_of_bounds() -> Result<()> {
        let mut container = two_lump_container()?;
        container
            .directory_mut()
            .set_entry(3, LumpUpdate::builder().offset(1040).length(100).build())?;

        assert!(matches!(
            container.read_lump(3),
            Err(Error::Format(FormatError::OutOfBounds { id: 3, .. }))
        ));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn splice_absent_lump_appends() -> Result<()> {
        let container = empty_container();
        assert_eq!(container.len(), 1032);

        let container = container.splice_lump(LUMP_PAKFILE, &[0xAB; 100])?;
        assert_eq!(container.len(), 1132);
        assert_eq!(
            container.lump_entry(LUMP_PAKFILE)?,
            LumpEntry {
                offset: 1032,
                length: 100,
                ..Default::default()
            }
        );
        assert_eq!(container.read_lump(LUMP_PAKFILE)?, &[0xAB; 100][..]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn splice_terminal_lump_resizes() -> Result<()> {
        let container = two_lump_container()?.splice_lump(2, b"cc")?;

        assert_eq!(container.len(), 1032 + 4 + 2);
        assert_eq!(container.read_lump(1)?, b"aaaa");
        assert_eq!(container.read_lump(2)?, b"cc");
        assert_eq!(container.lump_entry(2)?.offset, 1036);

        Ok(())
    }

    #[test]
    fn splice_same_size_anywhere() -> Result<()> {
        let container = two_lump_container()?.splice_lump(1, b"xxxx")?;

        assert_eq!(container.read_lump(1)?, b"xxxx");
        assert_eq!(container.read_lump(2)?, b"bbbbbb");

        Ok(())
    }

    #[test]
    fn splice_non_terminal_lump_fails() -> Result<()> {
        let result = two_lump_container()?.splice_lump(1, b"longer data");
        assert!(matches!(
            result,
            Err(Error::UnsafeSplice {
                id: 1,
                end: 1036,
                len: 1042
            })
        ));

        Ok(())
    }

    #[test]
    fn overwrite_smaller_keeps_layout() -> Result<()> {
        let before = two_lump_container()?;
        let after = before.clone().overwrite_lump(1, b"zz", Some(9))?;

        assert_eq!(after.len(), before.len());
        assert_eq!(after.read_lump(1)?, b"zz");
        assert_eq!(&after.as_bytes()[1032..1036], b"zz\0\0");
        assert_eq!(after.lump_entry(1)?.uncompressed_length, 9);
        assert_eq!(after.lump_entry(2)?, before.lump_entry(2)?);
        assert_eq!(after.read_lump(2)?, b"bbbbbb");

        Ok(())
    }

    #[test]
    fn overwrite_larger_non_terminal_fails() -> Result<()> {
        let result = two_lump_container()?.overwrite_lump(1, b"too long", None);
        assert!(matches!(result, Err(Error::UnsafeSplice { id: 1, .. })));

        Ok(())
    }

    #[test]
    fn overwrite_larger_terminal_splices() -> Result<()> {
        let container = two_lump_container()?.overwrite_lump(2, b"much longer", Some(42))?;

        assert_eq!(container.read_lump(2)?, b"much longer");
        assert_eq!(container.lump_entry(2)?.uncompressed_length, 42);
        assert_eq!(container.len(), 1032 + 4 + 11);

        Ok(())
    }
}
