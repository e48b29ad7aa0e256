use std::path::PathBuf;

use clap::Args;
use miette::Result;
use owo_colors::{OwoColorize, Stream::Stdout};

use crate::commands::read_map;

#[derive(Args)]
pub struct ShowArgs {
    /// An input map file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print the value of this key instead of the summary
    #[arg(short, long, value_name = "KEY")]
    key: Option<String>,
}

impl ShowArgs {
    pub fn handle(&self) -> Result<()> {
        let container = read_map(&self.file)?;
        let entities = super::read_entities(&container)?;

        if let Some(key) = &self.key {
            match entities.value(key) {
                Some(value) => println!("{value}"),
                None => println!(
                    "{}",
                    format!("{key} is not set").if_supports_color(Stdout, |text| text.red())
                ),
            }
            return Ok(());
        }

        println!(
            "{} {} entities, {} bytes{}",
            "entities:".if_supports_color(Stdout, |text| text.green()),
            entities.entity_count(),
            entities.text().len(),
            if entities.is_framed() {
                ", lzma framed"
            } else {
                ""
            }
        );

        for (classname, count) in entities.classnames() {
            println!("{count:>6} {classname}");
        }

        Ok(())
    }
}
