use std::path::{Component, Path, PathBuf};

use bsp_pak::{JsonMetadataStore, MetadataStore};
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, warn};

use crate::commands::{read_map, write_file};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input map file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let container = read_map(&self.file)?;
        let decoded = super::read_pakfile(&container)?;

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", self.directory.display()))?;

        for entry in decoded.model.entries() {
            if !is_contained(Path::new(entry.path())) {
                warn!("skipping {}, it points outside of the target", entry.path());
                continue;
            }

            let p = self.directory.join(entry.path());
            if entry.is_directory() {
                std::fs::create_dir_all(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", p.display()))?;
                continue;
            }

            info!("writing {}", p.display());
            write_file(&p, entry.content(), self.overwrite)?;
        }

        let store = JsonMetadataStore::in_directory(&self.directory);
        store
            .save(&decoded.model.metadata())
            .context(format!("writing {}", store.path().display()))?;

        info!(
            "extracted {} entries, {} unreadable",
            decoded.model.len(),
            decoded.warnings.len()
        );
        Ok(())
    }
}

/// Whether a relative archive path stays below the directory it is joined to
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
