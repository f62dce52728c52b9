//! Archive error types

use crate::nn::NnError;
use thiserror::Error;

/// Failure reported by a [`Codec`](super::Codec)
#[derive(Debug, Error)]
pub enum CodecError {
    /// Compression failed
    #[error("compression failed: {0}")]
    Compression(String),

    /// Decompression failed
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Decompressed output does not match the declared size
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressedSizeMismatch {
        /// Size declared by the asset block
        expected: usize,
        /// Bytes actually produced (a lower bound when output overran)
        actual: usize,
    },
}

/// Archive-specific error type
#[derive(Debug, Error)]
pub enum BeaError {
    /// Substrate-level parse or layout failure
    #[error(transparent)]
    Nn(#[from] NnError),

    /// Archive buffer has been relocated and no longer holds file offsets
    #[error("archive has already been relocated")]
    ArchiveRelocated,

    /// Compression tag is not one of the known values
    #[error("unknown compression type: {0}")]
    UnknownCompression(u8),

    /// Compression name is not recognized
    #[error("unknown compression name: {0}")]
    UnknownCompressionName(String),

    /// Asset index is not below the asset count
    #[error("asset index {index} out of range (archive holds {count} assets)")]
    AssetIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of assets in the archive
        count: usize,
    },

    /// Asset block identifier is wrong
    #[error("asset {index} has an invalid block identifier {actual:02X?}")]
    InvalidAssetBlock {
        /// Asset index
        index: usize,
        /// Identifier found
        actual: [u8; 4],
    },

    /// Codec failure for one asset
    #[error("asset {index} ({name}): {source}")]
    AssetCodec {
        /// Asset index
        index: usize,
        /// Asset name
        name: String,
        /// Underlying codec failure
        source: CodecError,
    },

    /// More assets than the 16-bit count field can hold
    #[error("too many assets: {0} (maximum 65535)")]
    TooManyAssets(usize),

    /// Dictionary for this many assets needs more nodes than 16-bit links address
    #[error("{count} assets need {nodes} dictionary nodes (maximum 65535)")]
    DictionaryOverflow {
        /// Number of assets
        count: usize,
        /// Dictionary nodes required
        nodes: usize,
    },

    /// Alignment shift above 63
    #[error("asset {index} ({name}): alignment shift {shift} exceeds 63")]
    AlignmentShiftTooLarge {
        /// Asset index
        index: usize,
        /// Asset name
        name: String,
        /// Requested shift
        shift: u16,
    },

    /// Raw or compressed payload does not fit a 32-bit size field
    #[error("asset {index} ({name}): {size} bytes exceeds the 32-bit size limit")]
    AssetTooLarge {
        /// Asset index
        index: usize,
        /// Asset name
        name: String,
        /// Offending size
        size: usize,
    },

    /// Asset name contains a NUL byte
    #[error("asset {index}: name {name:?} contains a NUL byte")]
    InvalidAssetName {
        /// Asset index
        index: usize,
        /// Asset name
        name: String,
    },

    /// Asset name does not fit the 16-bit length field
    #[error("asset {index}: name of {len} bytes exceeds 65535 bytes")]
    AssetNameTooLong {
        /// Asset index
        index: usize,
        /// Name length in bytes
        len: usize,
    },

    /// Two assets share a name
    #[error("asset {index} ({name}): name already used by asset {first}")]
    DuplicateAssetName {
        /// Asset index of the repeat
        index: usize,
        /// Asset name
        name: String,
        /// Asset index of the first use
        first: usize,
    },

    /// Archive name cannot be stored
    #[error("invalid archive name {0:?}")]
    InvalidArchiveName(String),

    /// Archive does not fit the 32-bit size fields
    #[error("archive of {0} bytes exceeds the 32-bit size limit")]
    ArchiveTooLarge(u64),

    /// Relocation entries written differ from the computed count
    #[error("relocation entry count mismatch: computed {expected}, wrote {actual}")]
    RelocationCountMismatch {
        /// Count computed from the layout
        expected: usize,
        /// Entries actually written
        actual: usize,
    },

    /// A name resolved to the wrong slot in the built dictionary
    #[error("dictionary self-test failed for asset {index} ({name}): found {found:?}")]
    DictionarySelfTestFailed {
        /// Asset index
        index: usize,
        /// Asset name
        name: String,
        /// Index the lookup returned
        found: Option<usize>,
    },
}

/// Result type for archive operations
pub type BeaResult<T> = Result<T, BeaError>;
