//! `bea-list`: print the asset table of an archive.

use crate::config::ListArgs;
use anyhow::{Context, Result};
use bemt_formats::bea::BeaArchive;
use std::fs;
use std::io::Write;

/// Write one line per asset of the archive in `data` to `out`.
///
/// Returns the number of assets listed.
///
/// # Errors
///
/// Returns an error if the archive is invalid or `out` cannot be written.
pub fn list_archive(data: &[u8], out: &mut impl Write) -> Result<usize> {
    let archive = BeaArchive::parse(data).context("Failed to parse archive")?;

    writeln!(
        out,
        "{} ({} assets)",
        archive.archive_name()?,
        archive.asset_count()
    )?;
    writeln!(
        out,
        "{:>5}  {:<6}  {:>10}  {:>10}  {:>5}  name",
        "index", "codec", "stored", "size", "align"
    )?;

    for asset in archive.assets() {
        let asset = asset?;
        let codec = asset
            .compression_type()
            .map_or_else(|_| format!("#{}", asset.compression), |c| c.to_string());
        writeln!(
            out,
            "{:>5}  {:<6}  {:>10}  {:>10}  {:>5}  {}",
            asset.index,
            codec,
            asset.compressed_size,
            asset.decompressed_size,
            asset.alignment_shift,
            asset.name
        )?;
    }

    Ok(archive.asset_count())
}

/// Run `bea-list`.
///
/// # Errors
///
/// Returns an error if the input cannot be read or is not a valid archive.
pub fn run(args: &ListArgs, out: &mut impl Write) -> Result<usize> {
    let data = fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    list_archive(&data, out)
}
