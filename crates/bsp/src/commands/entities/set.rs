use std::path::PathBuf;

use bsp_lump::LUMP_ENTITIES;
use clap::Args;
use miette::{Context, Result};
use tracing::info;

use crate::commands::{read_map, write_file};

#[derive(Args)]
pub struct SetArgs {
    /// An input map file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The key to change
    #[arg(short, long)]
    key: String,

    /// The new value
    #[arg(long)]
    value: String,

    /// The map file to write
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl SetArgs {
    pub fn handle(&self) -> Result<()> {
        let container = read_map(&self.file)?;
        let mut entities = super::read_entities(&container)?;

        let previous = entities.replace_value(&self.key, &self.value)?;
        info!("{}: {previous:?} -> {:?}", self.key, self.value);

        let encoded = entities.encode()?;
        let uncompressed_length = entities.is_framed().then_some(encoded.uncompressed_length);
        let container = container
            .overwrite_lump(LUMP_ENTITIES, &encoded.data, uncompressed_length)
            .context("rewriting the entity lump")?;

        write_file(&self.output, container.as_bytes(), self.overwrite)
    }
}
