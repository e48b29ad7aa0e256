use std::fs::File;
use std::io::Write;
use std::path::Path;

use bsp_lump::Container;
use miette::{Context, IntoDiagnostic, Result};

pub mod entities;
pub mod pak;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle the pakfile embedded in map files
    Pak {
        #[command(subcommand)]
        command: pak::PakCommands,
    },
    /// Handle the entity text of map files
    Entities {
        #[command(subcommand)]
        command: entities::EntitiesCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Pak { command } => command.handle(),
            Commands::Entities { command } => command.handle(),
        }
    }
}

/// Read a whole map file
pub(crate) fn read_map(path: &Path) -> Result<Container> {
    let data = std::fs::read(path)
        .into_diagnostic()
        .context(format!("reading {}", path.display()))?;

    Container::new(data).context(format!("parsing {}", path.display()))
}

/// Write `data` to `path`, refusing to replace an existing file unless `overwrite` is set
pub(crate) fn write_file(path: &Path, data: &[u8], overwrite: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    let mut out = if !overwrite {
        File::create_new(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))?
    } else {
        File::create(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))?
    };

    out.write_all(data)
        .into_diagnostic()
        .context(format!("writing {}", path.display()))
}
