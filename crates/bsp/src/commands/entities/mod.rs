use bsp_lump::{Container, EntityLump, LUMP_ENTITIES};
use miette::{Context, Result};

pub mod set;
pub mod show;

#[derive(clap::Subcommand)]
pub enum EntitiesCommands {
    /// Summarize the entities of a map
    Show(show::ShowArgs),
    /// Change the first value stored for a key
    Set(set::SetArgs),
}

impl EntitiesCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            EntitiesCommands::Show(show) => show.handle(),
            EntitiesCommands::Set(set) => set.handle(),
        }
    }
}

pub(crate) fn read_entities(container: &Container) -> Result<EntityLump> {
    EntityLump::decode(container.read_lump(LUMP_ENTITIES)?).context("reading the entity lump")
}
