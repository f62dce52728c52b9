//! `bea-extract`: write every asset of an archive to disk.

use crate::config::ExtractArgs;
use crate::error::ExtractError;
use anyhow::{Context, Result};
use bemt_formats::bea::BeaArchive;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of an extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    /// Archive name, used as the top-level output directory
    pub archive_name: String,
    /// Assets written
    pub extracted: usize,
    /// Assets skipped, with the reason
    pub failed: Vec<(String, String)>,
}

/// Turn a slash-separated stored name into a relative path.
///
/// # Errors
///
/// Returns `ExtractError::UnsafePath` for empty, absolute or parent-relative
/// names.
pub fn safe_relative_path(name: &str) -> Result<PathBuf, ExtractError> {
    let unsafe_path = || ExtractError::UnsafePath {
        name: name.to_string(),
    };

    let mut path = PathBuf::new();
    for part in name.split('/') {
        if part.is_empty() || part.contains('\\') {
            return Err(unsafe_path());
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(normal)), None) => path.push(normal),
            _ => return Err(unsafe_path()),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(path)
}

/// Extract the archive in `data` below `output_dir`.
///
/// Assets land in `<output_dir>/<archive name>/<asset name>`. An asset that
/// fails to decompress or write is logged and skipped.
///
/// # Errors
///
/// Returns an error if the archive header is invalid or the archive name is
/// not a safe path.
pub fn extract_archive(data: &[u8], output_dir: &Path) -> Result<ExtractSummary> {
    let archive = BeaArchive::parse(data).context("Failed to parse archive")?;
    let archive_name = archive.archive_name().context("Failed to read archive name")?;
    let root = output_dir.join(safe_relative_path(archive_name)?);

    info!(
        "Extracting '{}' ({} assets) to {}",
        archive_name,
        archive.asset_count(),
        root.display()
    );

    let mut summary = ExtractSummary {
        archive_name: archive_name.to_string(),
        ..ExtractSummary::default()
    };

    for index in 0..archive.asset_count() {
        let asset = match archive.asset(index) {
            Ok(asset) => asset,
            Err(e) => {
                warn!("Asset {}: {}", index, e);
                summary.failed.push((format!("#{index}"), e.to_string()));
                continue;
            }
        };

        match extract_one(&archive, index, asset.name, &root) {
            Ok(path) => {
                debug!("Extracted {} to {}", asset.name, path.display());
                summary.extracted += 1;
            }
            Err(e) => {
                warn!("Extracting {} failed: {:#}", asset.name, e);
                summary.failed.push((asset.name.to_string(), format!("{e:#}")));
            }
        }
    }

    Ok(summary)
}

fn extract_one(archive: &BeaArchive<'_>, index: usize, name: &str, root: &Path) -> Result<PathBuf> {
    let path = root.join(safe_relative_path(name)?);
    let data = archive.decompressed_data(index)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Run `bea-extract`.
///
/// # Errors
///
/// Returns an error if the input cannot be read or is not a valid archive.
pub fn run(args: &ExtractArgs) -> Result<ExtractSummary> {
    let data = fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    extract_archive(&data, &args.output_dir)
}
