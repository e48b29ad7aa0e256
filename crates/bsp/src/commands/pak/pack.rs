use std::path::PathBuf;

use bsp_lump::LUMP_PAKFILE;
use bsp_pak::{JsonMetadataStore, MetadataStore, PakWriter};
use clap::Args;
use miette::{miette, Context, Result};
use tracing::info;

use crate::assets::read_asset_tree;
use crate::commands::{read_map, write_file};

#[derive(Args)]
pub struct PackArgs {
    /// An input map file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A directory holding the pakfile contents, usually created by `pak extract`
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// The map file to write
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let container = read_map(&self.file)?;

        let mut model = read_asset_tree(&self.directory)?;
        if model.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let store = JsonMetadataStore::in_directory(&self.directory);
        match store
            .load()
            .context(format!("reading {}", store.path().display()))?
        {
            Some(metadata) => {
                let applied = model.apply_metadata(&metadata);
                info!("restored metadata of {applied} entries");
            }
            None => info!("no saved metadata, every entry is written as new"),
        }

        let encoded = PakWriter::default()
            .encode(&model)
            .context("writing the pakfile")?;
        let container = container
            .splice_lump(LUMP_PAKFILE, &encoded.data)
            .context("replacing the pakfile lump")?;

        info!(
            "writing {} ({} entries, {} degraded)",
            self.output.display(),
            model.len(),
            encoded.degraded.len()
        );
        write_file(&self.output, container.as_bytes(), self.overwrite)
    }
}
