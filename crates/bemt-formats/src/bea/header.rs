//! Archive file header

use super::error::{BeaError, BeaResult};
use crate::nn::{NnFileHeader, NnRecord, NnVersion, VersionPolicy};
use binrw::{BinRead, BinWrite};

/// Archive identifier
pub const BEA_MAGIC: [u8; 4] = *b"SCNE";
/// Archive format version
pub const BEA_VERSION: NnVersion = NnVersion::new(1, 1, 0);
/// Size of [`BeaFileHeader`] in bytes
pub const BEA_HEADER_SIZE: usize = 0x48;

/// Offset of the asset-pointer table pointer
pub const ASSET_POINTERS_PTR_OFFSET: u64 = 0x28;
/// Offset of the dictionary pointer
pub const DIC_PTR_OFFSET: u64 = 0x30;
/// Offset of the archive name pointer
pub const ARCHIVE_NAME_PTR_OFFSET: u64 = 0x40;

/// Archive header (0x48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct BeaFileHeader {
    /// Substrate header, identifier `SCNE`
    pub file: NnFileHeader,
    /// Number of assets
    pub asset_count: u16,
    /// Reserved
    pub reserved_22: u16,
    /// Reserved
    pub reserved_24: u32,
    /// Offset of the asset-pointer table
    pub asset_pointers_ptr: u64,
    /// Offset of the name dictionary
    pub dic_ptr: u64,
    /// Reserved
    pub reserved_38: u64,
    /// Offset of the archive name string record
    pub archive_name_ptr: u64,
}

impl NnRecord for BeaFileHeader {
    const SIZE: usize = BEA_HEADER_SIZE;
}

impl BeaFileHeader {
    /// Create a header for an archive of `asset_count` assets
    pub fn new(asset_count: u16) -> Self {
        Self {
            file: NnFileHeader::new(BEA_MAGIC, BEA_VERSION),
            asset_count,
            reserved_22: 0,
            reserved_24: 0,
            asset_pointers_ptr: 0,
            dic_ptr: 0,
            reserved_38: 0,
            archive_name_ptr: 0,
        }
    }

    /// Check identifier, signature, byte order, version and relocation state
    pub fn validate(&self, policy: VersionPolicy) -> BeaResult<()> {
        self.file.validate_identity(BEA_MAGIC)?;
        self.file.require_version(BEA_VERSION, policy)?;
        if self.file.is_relocated() {
            return Err(BeaError::ArchiveRelocated);
        }
        Ok(())
    }
}
