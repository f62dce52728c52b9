//! Command-line configuration.
//!
//! Arguments can be provided on the command line or through environment
//! variables:
//!
//! - `BEMT_OUTPUT_DIR`: extraction target directory
//! - `BEMT_COMPRESSION`: codec used by `bea-pack` (`none`, `zlib`, `zstd`)
//! - `BEMT_ALIGNMENT_SHIFT`: alignment shift stored for packed assets
//!
//! # Example
//!
//! ```no_run
//! use bemt_cli::Cli;
//!
//! let cli = Cli::from_args();
//! cli.validate().expect("Invalid configuration");
//! ```

use crate::error::ConfigError;
use bemt_formats::bea::{CompressionType, MAX_ALIGNMENT_SHIFT, ZlibCodec, ZstdCodec};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Highest Zstandard level; negative levels select the fast modes
const MAX_ZSTD_LEVEL: i32 = 22;

/// Top-level command line.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bemt",
    about = "Bezel Engine multitool: extract, pack and inspect BEA archives",
    version
)]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, env = "BEMT_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Extract every asset of an archive
    BeaExtract(ExtractArgs),
    /// Pack a directory into an archive
    BeaPack(PackArgs),
    /// List the assets of an archive
    BeaList(ListArgs),
}

/// Arguments of `bea-extract`.
#[derive(Debug, Clone, clap::Args)]
pub struct ExtractArgs {
    /// Archive to extract
    pub input: PathBuf,

    /// Directory receiving `<archive name>/<asset name>` files
    #[arg(short, long, env = "BEMT_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Arguments of `bea-pack`.
#[derive(Debug, Clone, clap::Args)]
pub struct PackArgs {
    /// Directory whose files become assets
    pub input_dir: PathBuf,

    /// Archive file to write
    pub output: PathBuf,

    /// Archive name; defaults to the input directory's name
    #[arg(long)]
    pub name: Option<String>,

    /// Codec applied to every asset
    #[arg(
        short,
        long,
        env = "BEMT_COMPRESSION",
        default_value = "zstd",
        value_parser = parse_compression
    )]
    pub compression: CompressionType,

    /// Alignment shift stored for every asset
    #[arg(long, env = "BEMT_ALIGNMENT_SHIFT", default_value_t = 0)]
    pub alignment_shift: u16,

    /// zlib compression level
    #[arg(long, default_value_t = ZlibCodec::DEFAULT_LEVEL)]
    pub zlib_level: u32,

    /// Zstandard compression level
    #[arg(long, default_value_t = ZstdCodec::DEFAULT_LEVEL, allow_negative_numbers = true)]
    pub zstd_level: i32,
}

/// Arguments of `bea-list`.
#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
    /// Archive to list
    pub input: PathBuf,
}

fn parse_compression(value: &str) -> Result<CompressionType, String> {
    value.parse().map_err(|e| format!("{e}"))
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate the selected subcommand's arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an input is missing or a numeric option is out
    /// of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.command {
            Command::BeaExtract(args) => require_file(&args.input),
            Command::BeaList(args) => require_file(&args.input),
            Command::BeaPack(args) => args.validate(),
        }
    }
}

fn require_file(path: &std::path::Path) -> Result<(), ConfigError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConfigError::MissingInput(path.to_path_buf()))
    }
}

impl PackArgs {
    /// Validate pack arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a missing input directory, an alignment
    /// shift above 63, an out-of-range level or an unusable archive name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_file(&self.input_dir)?;
        if !self.input_dir.is_dir() {
            return Err(ConfigError::NotADirectory(self.input_dir.clone()));
        }

        if self.alignment_shift > MAX_ALIGNMENT_SHIFT {
            return Err(ConfigError::InvalidAlignmentShift(self.alignment_shift));
        }

        if self.zlib_level > 9 {
            return Err(ConfigError::InvalidLevel {
                codec: "zlib",
                level: i64::from(self.zlib_level),
                reason: "must be between 0 and 9".to_string(),
            });
        }

        if self.zstd_level > MAX_ZSTD_LEVEL {
            return Err(ConfigError::InvalidLevel {
                codec: "zstd",
                level: i64::from(self.zstd_level),
                reason: format!("must be at most {MAX_ZSTD_LEVEL}"),
            });
        }

        let name = self.archive_name()?;
        if name.contains('\0') {
            return Err(ConfigError::InvalidArchiveName(name));
        }
        Ok(())
    }

    /// Archive name: `--name`, else the input directory's final component.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidArchiveName` when no name can be derived.
    pub fn archive_name(&self) -> Result<String, ConfigError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        self.input_dir
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(&self.input_dir)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::InvalidArchiveName(self.input_dir.display().to_string()))
    }
}
