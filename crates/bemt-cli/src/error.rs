//! Error types for the command-line tool.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input path does not exist
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Pack input is not a directory
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Alignment shift outside 0..=63
    #[error("Invalid alignment shift {0}: must be at most 63")]
    InvalidAlignmentShift(u16),

    /// Compression level outside the codec's range
    #[error("Invalid {codec} level {level}: {reason}")]
    InvalidLevel {
        /// Codec name
        codec: &'static str,
        /// Requested level
        level: i64,
        /// Accepted range
        reason: String,
    },

    /// Archive name cannot be derived or stored
    #[error("Invalid archive name: {0}")]
    InvalidArchiveName(String),
}

/// Errors raised while extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Asset or archive name would escape the output directory
    #[error("Refusing to write '{name}': path escapes the output directory")]
    UnsafePath {
        /// Offending name
        name: String,
    },
}
