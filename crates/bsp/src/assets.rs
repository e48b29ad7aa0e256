//! Collecting loose asset files into an archive model

use std::path::Path;
use std::time::SystemTime;

use bsp_pak::{ArchiveEntry, ArchiveModel, DosDateTime};
use chrono::{DateTime, Datelike, Local, Timelike};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Files starting with this prefix belong to the tooling and are never packed
pub const RESERVED_PREFIX: &str = "_pakfile";

/// Convert a file time to the local MS-DOS time stored in archives
pub fn dos_time(time: SystemTime) -> DosDateTime {
    let local: DateTime<Local> = time.into();
    DosDateTime::from_parts(
        local.year().clamp(0, u16::MAX as i32) as u16,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
}

/// Read every file and directory below `root` into a model, paths relative to `root`
///
/// Entries are added in path order. Files whose name starts with [`RESERVED_PREFIX`] are
/// skipped.
pub fn read_asset_tree(root: &Path) -> Result<ArchiveModel> {
    let mut model = ArchiveModel::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry
            .into_diagnostic()
            .context(format!("walking {}", root.display()))?;

        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(RESERVED_PREFIX))
        {
            debug!("skipping {}", entry.path().display());
            continue;
        }

        let relative = entry.path().strip_prefix(root).into_diagnostic()?;
        let name = relative
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or(miette!("unable to convert {} to a string", relative.display()))
            })
            .collect::<Result<Vec<_>>>()?
            .join("/");

        let metadata = entry
            .metadata()
            .into_diagnostic()
            .context(format!("reading metadata of {}", entry.path().display()))?;

        let archive_entry = if metadata.is_dir() {
            ArchiveEntry::directory(name)
        } else {
            let content = std::fs::read(entry.path())
                .into_diagnostic()
                .context(format!("reading {}", entry.path().display()))?;
            ArchiveEntry::file(name, content)
        };

        let mut archive_entry = match metadata.modified() {
            Ok(modified) => archive_entry.with_modified(dos_time(modified)),
            Err(_) => archive_entry,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode() & 0xFFFF;
            let attributes = (mode << 16) | (archive_entry.external_attributes() & 0xFFFF);
            archive_entry = archive_entry.with_external_attributes(attributes);
        }

        model.insert(archive_entry);
    }

    info!(
        entries = model.len(),
        size = model.content_size(),
        "collected assets from {}",
        root.display()
    );
    Ok(model)
}
