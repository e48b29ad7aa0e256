use std::path::{Path, PathBuf};
use std::sync::Arc;

use bsp_lump::LUMP_PAKFILE;
use bsp_pak::{ArchiveModel, PakWriter};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use rayon::prelude::*;
use tracing::{error, info, instrument};
use walkdir::WalkDir;

use crate::assets::read_asset_tree;
use crate::commands::{read_map, write_file};

#[derive(Args)]
pub struct MergeArgs {
    /// A directory of input map files
    #[arg(short, long, value_name = "DIR")]
    maps: PathBuf,

    /// A directory of assets to add to every map
    #[arg(short, long, value_name = "DIR")]
    assets: PathBuf,

    /// A target directory for the rewritten maps
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Allow overwriting the targets
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// Counts of a batch run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl MergeArgs {
    pub fn handle(&self) -> Result<()> {
        let assets = read_asset_tree(&self.assets)?;
        if assets.is_empty() {
            return Err(miette!("asset directory is empty"));
        }

        let report = self.merge_all(Arc::new(assets))?;
        info!(
            "merged {} maps, {} failed",
            report.succeeded, report.failed
        );

        if report.failed > 0 {
            return Err(miette!(
                "{} of {} maps could not be merged",
                report.failed,
                report.succeeded + report.failed
            ));
        }
        Ok(())
    }

    /// Merge `assets` into every map, one map per worker, continuing past failures
    pub fn merge_all(&self, assets: Arc<ArchiveModel>) -> Result<MergeReport> {
        let maps = WalkDir::new(&self.maps)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("bsp"))
            })
            .map(|e| e.into_path())
            .collect::<Vec<_>>();

        if maps.is_empty() {
            return Err(miette!("no maps found in {}", self.maps.display()));
        }
        info!("merging {} assets into {} maps", assets.len(), maps.len());

        let results = maps
            .par_iter()
            .map(|map| (map, self.merge_one(map, &assets)))
            .collect::<Vec<_>>();

        let mut report = MergeReport::default();
        for (map, result) in results {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!("{}: {e:?}", map.display());
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    #[instrument(skip(self, assets), fields(map = %map.display()))]
    fn merge_one(&self, map: &Path, assets: &ArchiveModel) -> Result<()> {
        let container = read_map(map)?;
        let decoded = super::read_pakfile(&container)?;

        let merged = decoded.model.merge(assets);
        let encoded = PakWriter::default()
            .encode(&merged)
            .context("writing the pakfile")?;
        let container = container
            .splice_lump(LUMP_PAKFILE, &encoded.data)
            .context("replacing the pakfile lump")?;

        let relative = map.strip_prefix(&self.maps).into_diagnostic()?;
        let target = self.output.join(relative);
        info!(
            "writing {} ({} -> {} entries)",
            target.display(),
            decoded.model.len(),
            merged.len()
        );
        write_file(&target, container.as_bytes(), self.overwrite)
    }
}
