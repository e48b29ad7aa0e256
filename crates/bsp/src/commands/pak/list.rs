use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::{OwoColorize, Stream::Stdout};

use crate::commands::read_map;

#[derive(Args)]
pub struct ListArgs {
    /// An input map file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let container = read_map(&self.file)?;
        let decoded = super::read_pakfile(&container)?;

        for entry in decoded.model.entries() {
            let method = entry
                .compression_method()
                .map(|m| m.to_string())
                .unwrap_or_default();

            println!(
                "{:>10} {:>10} {:<8} {} {}",
                entry.content().len(),
                entry.packed_size().unwrap_or_default(),
                method,
                entry.modified(),
                entry
                    .path()
                    .if_supports_color(Stdout, |text| text.bright_white())
            );
        }

        let methods = decoded
            .model
            .files()
            .filter_map(|e| e.compression_method())
            .counts()
            .into_iter()
            .sorted_by_key(|(method, _)| u16::from(*method))
            .map(|(method, count)| format!("{method}: {count}"))
            .join(", ");

        println!(
            "{} {} entries, {} bytes ({})",
            "total:".if_supports_color(Stdout, |text| text.green()),
            decoded.model.len(),
            decoded.model.content_size(),
            methods
        );

        for warning in &decoded.warnings {
            println!(
                "{} {warning}",
                "unreadable:".if_supports_color(Stdout, |text| text.red())
            );
        }

        Ok(())
    }
}
