//! Binary formats of the Bezel Engine
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format identifiers don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate provides symmetric (parser and builder) implementations of the
//! binary containers used by the engine's asset pipeline.
//!
//! # Modules
//!
//! - **ptrie**: PATRICIA trie used to build name dictionaries
//! - **nn**: Relocatable binary substrate (file header, block chain, string
//!   pool, dictionary, relocation table)
//! - **bea**: Archive container (`SCNE`) holding named, compressed assets
//!
//! # Example
//!
//! ```rust
//! use bemt_formats::bea::{AssetEntry, BeaArchive, BeaBuilder, CompressionType};
//!
//! let data = BeaBuilder::new("level01")
//!     .add_asset(
//!         AssetEntry::new("model.bfres", vec![0u8; 256])
//!             .with_compression(CompressionType::Zlib),
//!     )
//!     .build()
//!     .expect("Failed to build archive");
//!
//! let archive = BeaArchive::parse(&data).expect("Failed to parse archive");
//! let index = archive.find_asset_index("model.bfres").expect("asset exists");
//! assert_eq!(archive.decompressed_data(index).expect("Failed to decompress").len(), 256);
//! ```
//!
//! Nothing in this crate touches the filesystem; callers hand in complete
//! buffers and receive owned results.

#![warn(missing_docs)]

pub mod bea;
pub mod nn;
pub mod ptrie;
