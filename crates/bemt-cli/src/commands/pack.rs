//! `bea-pack`: build an archive from a directory tree.

use crate::config::PackArgs;
use anyhow::{Context, Result, bail};
use bemt_formats::bea::{AssetEntry, BeaBuilder, Codecs};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Outcome of packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    /// Assets written
    pub asset_count: usize,
    /// Archive size in bytes
    pub size: usize,
}

/// Collect every regular file below `input_dir` as `(name, contents)`.
///
/// Names are relative to `input_dir`, `/`-separated and sorted.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked, a file cannot be read or a
/// path is not valid UTF-8.
pub fn collect_assets(input_dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut assets = Vec::new();

    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", input_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(input_dir)
            .with_context(|| format!("{} is outside the input", entry.path().display()))?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component.as_os_str().to_str() {
                Some(part) => parts.push(part),
                None => bail!("Path is not valid UTF-8: {}", relative.display()),
            }
        }
        let name = parts.join("/");

        let data = fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        debug!("Collected {} ({} bytes)", name, data.len());
        assets.push((name, data));
    }

    Ok(assets)
}

/// Build an archive from `assets` using the settings in `args`.
///
/// # Errors
///
/// Returns an error if the archive cannot be built.
pub fn pack_assets(args: &PackArgs, assets: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let archive_name = args.archive_name()?;
    let codecs = Codecs::new()
        .with_zlib_level(args.zlib_level)
        .with_zstd_level(args.zstd_level);

    let mut builder = BeaBuilder::new(archive_name).with_codecs(codecs);
    for (name, data) in assets {
        builder.push_asset(
            AssetEntry::new(name, data)
                .with_compression(args.compression)
                .with_alignment_shift(args.alignment_shift),
        );
    }

    builder.build().context("Failed to build archive")
}

/// Run `bea-pack`.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the archive cannot be built
/// or the output cannot be written.
pub fn run(args: &PackArgs) -> Result<PackSummary> {
    let assets = collect_assets(&args.input_dir)?;
    let asset_count = assets.len();
    info!(
        "Packing {} files from {} with {}",
        asset_count,
        args.input_dir.display(),
        args.compression
    );

    let data = pack_assets(args, assets)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&args.output, &data)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    Ok(PackSummary {
        asset_count,
        size: data.len(),
    })
}
