//! Persisting entry metadata next to extracted pakfiles
//!
//! Files extracted to disk lose the attributes they had in the archive. The metadata of every
//! entry is saved with them, so rebuilding the pakfile from the directory writes each file with
//! its original method, timestamp, attributes and comment.

use crate::error::Result;
use crate::model::MetadataMap;

/// Name of the sidecar file written into an extraction directory
pub const SIDECAR_FILE_NAME: &str = "_pakfile_metadata.json";

/// Storage for the metadata of an archive's entries
pub trait MetadataStore {
    /// Load saved metadata, `None` when nothing has been saved
    fn load(&self) -> Result<Option<MetadataMap>>;

    /// Save metadata, replacing what was saved before
    fn save(&self, metadata: &MetadataMap) -> Result<()>;
}

#[cfg(feature = "serde")]
pub use json::JsonMetadataStore;

#[cfg(feature = "serde")]
mod json {
    use std::fs::File;
    use std::io::{BufReader, BufWriter, ErrorKind, Write};
    use std::path::{Path, PathBuf};

    use tracing::{debug, instrument};

    use super::{MetadataStore, SIDECAR_FILE_NAME};
    use crate::error::Result;
    use crate::model::MetadataMap;

    /// Metadata saved as a JSON object keyed by entry path
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct JsonMetadataStore {
        path: PathBuf,
    }

    impl JsonMetadataStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        /// The sidecar file inside an extraction directory
        pub fn in_directory(directory: impl AsRef<Path>) -> Self {
            Self::new(directory.as_ref().join(SIDECAR_FILE_NAME))
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl MetadataStore for JsonMetadataStore {
        #[instrument(skip(self), fields(path = %self.path.display()), err)]
        fn load(&self) -> Result<Option<MetadataMap>> {
            let file = match File::open(&self.path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            let metadata: MetadataMap = serde_json::from_reader(BufReader::new(file))?;
            debug!(entries = metadata.len(), "loaded metadata");
            Ok(Some(metadata))
        }

        #[instrument(skip_all, fields(path = %self.path.display()), err)]
        fn save(&self, metadata: &MetadataMap) -> Result<()> {
            let mut writer = BufWriter::new(File::create(&self.path)?);
            serde_json::to_writer_pretty(&mut writer, metadata)?;
            writer.flush()?;

            debug!(entries = metadata.len(), "saved metadata");
            Ok(())
        }
    }
}
