use bsp_lump::{Container, LUMP_PAKFILE};
use bsp_pak::{DecodedArchive, PakReader};
use miette::{Context, Result};

pub mod extract;
pub mod list;
pub mod merge;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum PakCommands {
    /// List the entries of a map's pakfile
    List(list::ListArgs),
    /// Extract a map's pakfile into a directory
    Extract(extract::ExtractArgs),
    /// Replace a map's pakfile with the contents of a directory
    Pack(pack::PackArgs),
    /// Add a directory of assets to the pakfile of every map in a directory
    Merge(merge::MergeArgs),
}

impl PakCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PakCommands::List(list) => list.handle(),
            PakCommands::Extract(extract) => extract.handle(),
            PakCommands::Pack(pack) => pack.handle(),
            PakCommands::Merge(merge) => merge.handle(),
        }
    }
}

/// Decode the pakfile lump of a map, an absent lump is an empty archive
pub(crate) fn read_pakfile(container: &Container) -> Result<DecodedArchive> {
    let lump = container.read_lump(LUMP_PAKFILE)?;
    PakReader::default()
        .decode(lump)
        .context("reading the pakfile lump")
}
