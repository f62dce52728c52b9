//! Relocatable binary error types

use super::header::NnVersion;
use thiserror::Error;

/// Error type for the relocatable binary substrate
#[derive(Debug, Error)]
pub enum NnError {
    /// Record identifier does not match the expected magic
    #[error("invalid identifier: expected {expected:02X?}, got {actual:02X?}")]
    InvalidMagic {
        /// Expected identifier
        expected: [u8; 4],
        /// Identifier found in the data
        actual: [u8; 4],
    },

    /// File header signature is not zero
    #[error("invalid file signature: 0x{0:08X}")]
    InvalidSignature(u32),

    /// Byte-order mark is neither native nor foreign
    #[error("invalid byte order mark: 0x{0:04X}")]
    InvalidByteOrderMark(u16),

    /// Data was written with the foreign byte order
    #[error("foreign byte order is not supported")]
    UnsupportedByteOrder,

    /// File version rejected by the version policy
    #[error("unsupported version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version stored in the file
        found: NnVersion,
        /// Version requested by the reader
        expected: NnVersion,
    },

    /// A record extends past the end of the buffer
    #[error("record at offset 0x{offset:X} ({len} bytes) is outside the {size}-byte buffer")]
    OutOfBounds {
        /// Offset of the record
        offset: u64,
        /// Length of the record
        len: usize,
        /// Size of the buffer
        size: usize,
    },

    /// String is not valid UTF-8
    #[error("string at offset 0x{offset:X} is not valid UTF-8")]
    InvalidString {
        /// Offset of the string record
        offset: u64,
    },

    /// String does not fit the 16-bit length field
    #[error("string of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),

    /// Dictionary header carries a negative node count
    #[error("invalid dictionary node count: {0}")]
    InvalidNodeCount(i32),

    /// Dictionary has more nodes than 16-bit indices can address
    #[error("dictionary of {0} nodes cannot be addressed with 16-bit indices")]
    DictionaryTooLarge(usize),

    /// Trie bit position does not fit the signed 32-bit field
    #[error("reference bit {0} does not fit the dictionary node")]
    RefBitOutOfRange(u64),

    /// An offset does not fit its 32-bit field
    #[error("offset 0x{0:X} does not fit a 32-bit field")]
    OffsetOutOfRange(u64),

    /// Relocation table self offset disagrees with the file header
    #[error("relocation table at 0x{header:X} records self offset 0x{table:X}")]
    RelocationSelfOffsetMismatch {
        /// Offset stored in the file header
        header: u32,
        /// Offset stored in the table itself
        table: u32,
    },

    /// Relocation section refers to entries outside the table
    #[error("relocation section {section} refers to entries outside the table")]
    InvalidRelocationSection {
        /// Section index
        section: usize,
    },

    /// Relocations were already applied to this buffer
    #[error("relocations have already been applied")]
    AlreadyRelocated,

    /// Rebasing a pointer overflowed 64 bits
    #[error("relocating the pointer at 0x{offset:X} overflows")]
    RelocationOverflow {
        /// Offset of the pointer field
        offset: u64,
    },

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for relocatable binary operations
pub type NnResult<T> = Result<T, NnError>;
