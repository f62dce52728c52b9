//! Subcommand implementations.
//!
//! Each command reads its inputs from disk, hands complete buffers to
//! `bemt-formats` and writes the results back.

pub mod extract;
pub mod list;
pub mod pack;

use crate::config::Command;
use anyhow::Result;

/// Run `command`, returning a one-line summary for the user.
///
/// # Errors
///
/// Returns an error if the command fails or, for extraction, if any asset
/// could not be written.
pub fn run(command: &Command) -> Result<String> {
    match command {
        Command::BeaExtract(args) => {
            let summary = extract::run(args)?;
            if !summary.failed.is_empty() {
                anyhow::bail!(
                    "{} of {} assets failed to extract",
                    summary.failed.len(),
                    summary.failed.len() + summary.extracted
                );
            }
            Ok(format!(
                "Extracted {} assets from '{}'",
                summary.extracted, summary.archive_name
            ))
        }
        Command::BeaPack(args) => {
            let summary = pack::run(args)?;
            Ok(format!(
                "Packed {} assets into {} ({} bytes)",
                summary.asset_count,
                args.output.display(),
                summary.size
            ))
        }
        Command::BeaList(args) => {
            let mut stdout = std::io::stdout().lock();
            let count = list::run(args, &mut stdout)?;
            Ok(format!("Listed {count} assets"))
        }
    }
}
