//! Command-line front end for Bezel Engine archives.
//!
//! The `bemt` binary is a thin wrapper around this library:
//!
//! - [`config`]: argument parsing and validation
//! - [`commands`]: `bea-extract`, `bea-pack` and `bea-list`
//! - [`error`]: configuration and extraction errors
//!
//! All filesystem access happens here; `bemt-formats` only sees buffers.

#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;

pub use config::{Cli, Command, ExtractArgs, ListArgs, LogFormat, PackArgs};
pub use error::{ConfigError, ExtractError};
