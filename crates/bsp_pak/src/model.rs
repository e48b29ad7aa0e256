//! In-memory model of a pakfile

use indexmap::IndexMap;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::compression::CompressionMethod;
use crate::types::DosDateTime;

/// Unix mode bits stored for new files, `-rw-r--r--`
pub const DEFAULT_FILE_MODE: u32 = 0o100644;

/// Unix mode bits stored for new directories, `drwxr-xr-x`
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o40755;

/// MS-DOS directory attribute
const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Entry data exactly as it was read from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackedData {
    pub method: CompressionMethod,
    pub flags: u16,
    pub crc32: u32,
    pub data: Vec<u8>,
}

/// Entry name exactly as it was read from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawName {
    pub bytes: Vec<u8>,
    pub utf8: bool,
}

/// Per entry attributes that survive a round trip through the archive
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryMetadata {
    /// The method the entry was stored with, `None` for entries that never were
    pub compression_method: Option<CompressionMethod>,

    /// Last modification time
    pub modified: DosDateTime,

    /// Host specific attributes
    pub external_attributes: u32,

    /// Raw entry comment
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub comment: Option<Vec<u8>>,
}

/// A single file or directory in a pakfile
///
/// Directory entries are the ones whose path ends with `/`, they never carry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    path: String,
    metadata: EntryMetadata,
    version_made_by: Option<u16>,
    raw_name: Option<RawName>,
    content: Vec<u8>,
    packed: Option<PackedData>,
}

impl ArchiveEntry {
    /// A new file entry
    pub fn file(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            metadata: EntryMetadata {
                compression_method: None,
                modified: DosDateTime::default(),
                external_attributes: DEFAULT_FILE_MODE << 16,
                comment: None,
            },
            version_made_by: None,
            raw_name: None,
            content: content.into(),
            packed: None,
        }
    }

    /// A new directory entry, a trailing `/` is added to the path when missing
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = normalize_path(&path.into());
        if !path.ends_with('/') {
            path.push('/');
        }

        Self {
            path,
            metadata: EntryMetadata {
                compression_method: None,
                modified: DosDateTime::default(),
                external_attributes: (DEFAULT_DIRECTORY_MODE << 16) | DOS_DIRECTORY_ATTRIBUTE,
                comment: None,
            },
            version_made_by: None,
            raw_name: None,
            content: Vec::new(),
            packed: None,
        }
    }

    pub(crate) fn from_archive(
        path: String,
        raw_name: RawName,
        metadata: EntryMetadata,
        version_made_by: u16,
        content: Vec<u8>,
        packed: PackedData,
    ) -> Self {
        Self {
            path,
            metadata,
            version_made_by: Some(version_made_by),
            raw_name: Some(raw_name),
            content,
            packed: Some(packed),
        }
    }

    /// Set the modification time
    pub fn with_modified(mut self, modified: DosDateTime) -> Self {
        self.metadata.modified = modified;
        self
    }

    /// Request a compression method for the next time the entry is written
    pub fn with_compression_method(mut self, method: CompressionMethod) -> Self {
        self.metadata.compression_method = Some(method);
        self
    }

    /// Set the host specific attributes
    pub fn with_external_attributes(mut self, attributes: u32) -> Self {
        self.metadata.external_attributes = attributes;
        self
    }

    /// Set the entry comment
    pub fn with_comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        let comment = comment.into();
        self.metadata.comment = (!comment.is_empty()).then_some(comment);
        self
    }

    /// Path of the entry inside the archive, using `/` separators
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Uncompressed content, always empty for directories
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Replace the content
    ///
    /// The data the entry was read with is dropped, so the entry is compressed again when
    /// written.
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
        self.packed = None;
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Replace the metadata, keeping the entry's data as read when the stored method is unchanged
    pub fn set_metadata(&mut self, metadata: EntryMetadata) {
        self.metadata = metadata;
    }

    pub fn compression_method(&self) -> Option<CompressionMethod> {
        self.metadata.compression_method
    }

    pub fn modified(&self) -> DosDateTime {
        self.metadata.modified
    }

    pub fn external_attributes(&self) -> u32 {
        self.metadata.external_attributes
    }

    pub fn comment(&self) -> Option<&[u8]> {
        self.metadata.comment.as_deref()
    }

    /// Host system and ZIP version the entry was written by, when read from an archive
    pub fn version_made_by(&self) -> Option<u16> {
        self.version_made_by
    }

    /// Size of the data in the archive the entry was read from
    pub fn packed_size(&self) -> Option<usize> {
        self.packed.as_ref().map(|p| p.data.len())
    }

    pub(crate) fn raw_name(&self) -> Option<&RawName> {
        self.raw_name.as_ref()
    }

    pub(crate) fn packed(&self) -> Option<&PackedData> {
        self.packed.as_ref()
    }
}

/// Convert `\` separators and strip leading `/` and `./`
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.as_str();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.to_owned()
}

/// Metadata of every entry of an archive, keyed by path
pub type MetadataMap = IndexMap<String, EntryMetadata>;

/// The entries of a pakfile in archive order, each path at most once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveModel {
    entries: IndexMap<String, ArchiveEntry>,
    comment: Vec<u8>,
}

impl ArchiveModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry, returning the one it replaced
    ///
    /// A replaced entry keeps its position in the archive order.
    pub fn insert(&mut self, entry: ArchiveEntry) -> Option<ArchiveEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    /// Add an entry unless its path is already taken
    ///
    /// Returns whether the entry was added.
    pub fn insert_if_absent(&mut self, entry: ArchiveEntry) -> bool {
        match self.entries.entry(entry.path.clone()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut ArchiveEntry> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove an entry, keeping the order of the others
    pub fn remove(&mut self, path: &str) -> Option<ArchiveEntry> {
        self.entries.shift_remove(path)
    }

    /// Entries in archive order
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Paths in archive order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// File entries in archive order
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries().filter(|e| !e.is_directory())
    }

    /// Total uncompressed size of every file
    pub fn content_size(&self) -> usize {
        self.files().map(|e| e.content.len()).sum()
    }

    /// Archive comment
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = comment.into();
    }

    /// Entries in the order they are written
    ///
    /// Directories come first, then files, each group sorted by path.
    pub fn write_order(&self) -> Vec<&ArchiveEntry> {
        let mut ordered: Vec<&ArchiveEntry> = self.entries().collect();
        ordered.sort_by(|a, b| {
            b.is_directory()
                .cmp(&a.is_directory())
                .then_with(|| a.path.cmp(&b.path))
        });
        ordered
    }

    /// Combine two archives, keeping `self`'s entry whenever both contain a path
    ///
    /// Entries of `self` come first in their order, followed by the new paths of `incoming` in
    /// theirs. The comment of `self` is kept.
    pub fn merge(&self, incoming: &ArchiveModel) -> ArchiveModel {
        let mut merged = self.clone();
        let mut skipped = 0;
        for entry in incoming.entries() {
            if !merged.insert_if_absent(entry.clone()) {
                skipped += 1;
            }
        }

        debug!(
            base = self.len(),
            added = incoming.len() - skipped,
            skipped,
            "merged archives"
        );
        merged
    }

    /// Metadata of every entry
    pub fn metadata(&self) -> MetadataMap {
        self.entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.metadata.clone()))
            .collect()
    }

    /// Restore metadata saved with [`ArchiveModel::metadata`]
    ///
    /// Only entries present in both are touched. Returns how many were updated.
    pub fn apply_metadata(&mut self, metadata: &MetadataMap) -> usize {
        let mut applied = 0;
        for (path, entry) in self.entries.iter_mut() {
            if let Some(saved) = metadata.get(path) {
                entry.metadata = saved.clone();
                applied += 1;
            }
        }
        applied
    }
}

impl FromIterator<ArchiveEntry> for ArchiveModel {
    /// Collect entries, the first entry of a path wins
    fn from_iter<T: IntoIterator<Item = ArchiveEntry>>(iter: T) -> Self {
        let mut model = ArchiveModel::new();
        for entry in iter {
            model.insert_if_absent(entry);
        }
        model
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionMethod;
    use crate::model::{ArchiveEntry, ArchiveModel};
    use crate::types::DosDateTime;

    fn model(entries: &[(&str, &str)]) -> ArchiveModel {
        entries
            .iter()
            .map(|(path, content)| ArchiveEntry::file(*path, content.as_bytes()))
            .collect()
    }

    #[test]
    fn normalized_paths() {
        assert_eq!(ArchiveEntry::file("materials\\a.vmt", "").path(), "materials/a.vmt");
        assert_eq!(ArchiveEntry::file("./sound/b.wav", "").path(), "sound/b.wav");
        assert_eq!(ArchiveEntry::directory("/models").path(), "models/");
        assert!(ArchiveEntry::directory("models").is_directory());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut model = model(&[("a", "1"), ("b", "2")]);
        let replaced = model.insert(ArchiveEntry::file("a", "3"));

        assert_eq!(replaced.map(|e| e.content().to_vec()), Some(b"1".to_vec()));
        assert_eq!(model.paths().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(model.get("a").map(|e| e.content()), Some(&b"3"[..]));
    }

    #[test]
    fn collect_keeps_first_duplicate() {
        let model = model(&[("a", "1"), ("a", "2")]);
        assert_eq!(model.len(), 1);
        assert_eq!(model.get("a").map(|e| e.content()), Some(&b"1"[..]));
    }

    #[test]
    fn merge_base_wins() {
        let base = model(&[("a", "1"), ("b", "2")]);
        let incoming = model(&[("b", "9"), ("c", "3")]);

        let merged = base.merge(&incoming);
        assert_eq!(merged.paths().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(merged.get("b").map(|e| e.content()), Some(&b"2"[..]));
        assert_eq!(merged.get("c").map(|e| e.content()), Some(&b"3"[..]));
    }

    #[test]
    fn merge_with_empty_and_self() {
        let base = model(&[("a", "1"), ("b", "2")]);

        assert_eq!(base.merge(&ArchiveModel::new()), base);
        assert_eq!(base.merge(&base), base);
        assert_eq!(ArchiveModel::new().merge(&base), base);
    }

    #[test]
    fn write_order_directories_first() {
        let mut model = model(&[("z.txt", ""), ("a/b.txt", "")]);
        model.insert(ArchiveEntry::directory("a"));

        let order: Vec<_> = model.write_order().iter().map(|e| e.path()).collect();
        assert_eq!(order, ["a/", "a/b.txt", "z.txt"]);
    }

    #[test]
    fn restore_metadata() {
        let mut original = model(&[("a", "1")]);
        original.insert(
            ArchiveEntry::file("b", "2")
                .with_compression_method(CompressionMethod::Deflate)
                .with_modified(DosDateTime::from_parts(2020, 2, 2, 2, 2, 2))
                .with_comment("note"),
        );
        let saved = original.metadata();

        let mut rebuilt = model(&[("b", "2"), ("c", "3")]);
        assert_eq!(rebuilt.apply_metadata(&saved), 1);

        let b = rebuilt.get("b").map(|e| e.metadata().clone());
        assert_eq!(b.as_ref(), saved.get("b"));
        assert_eq!(rebuilt.get("c").and_then(|e| e.compression_method()), None);
    }
}
