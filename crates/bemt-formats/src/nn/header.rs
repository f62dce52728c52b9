//! Relocatable binary file header

use crate::nn::error::{NnError, NnResult};
use crate::nn::record::NnRecord;
use binrw::{BinRead, BinWrite};
use std::fmt;

/// Byte-order mark of data written in the reader's byte order
pub const BOM_NATIVE: u16 = 0xFEFF;
/// Byte-order mark of data written in the opposite byte order
pub const BOM_FOREIGN: u16 = 0xFFFE;
/// Header flag set once relocations have been applied
pub const FLAG_RELOCATED: u16 = 1 << 0;
/// Size of [`NnFileHeader`] in bytes
pub const FILE_HEADER_SIZE: usize = 0x20;
/// Offset of the flags field inside [`NnFileHeader`]
pub const FLAGS_FIELD_OFFSET: u64 = 0x14;

/// Three-part file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NnVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u8,
    /// Bugfix version
    pub bugfix: u8,
}

impl NnVersion {
    /// Create a version
    pub const fn new(major: u16, minor: u8, bugfix: u8) -> Self {
        Self {
            major,
            minor,
            bugfix,
        }
    }
}

impl fmt::Display for NnVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
    }
}

/// How strictly a reader matches the stored version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Major, minor and bugfix must all match
    Exact,
    /// Same major version and a minor version no newer than requested
    #[default]
    Compatible,
}

/// Byte order a file was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Same byte order as the reader
    Native,
    /// Opposite byte order
    Foreign,
}

/// Generic header at the start of every relocatable binary (0x20 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnFileHeader {
    /// Format identifier
    pub identifier: [u8; 4],
    /// Always zero
    pub signature: u32,
    /// Bugfix version
    pub version_bugfix: u8,
    /// Minor version
    pub version_minor: u8,
    /// Major version, stored in the file's byte order
    pub version_major: u16,
    /// Compare against [`BOM_NATIVE`] and [`BOM_FOREIGN`]
    pub byte_order_mark: u16,
    /// File alignment is `1 << alignment_shift`
    pub alignment_shift: u8,
    /// Pointer width of the target in bits
    pub target_addr_size: u8,
    /// Offset to a NUL-terminated file name, zero when absent
    pub filename_offset: u32,
    /// Bit 0: relocated
    pub flags: u16,
    /// Offset to the first block, zero when there is no block chain
    pub first_block_offset: u16,
    /// Offset to the relocation table
    pub relocation_table_offset: u32,
    /// Number of bytes loaded into memory
    pub memory_load_size: u32,
}

impl NnRecord for NnFileHeader {
    const SIZE: usize = FILE_HEADER_SIZE;
}

impl NnFileHeader {
    /// Create a native-order header stamped with `version`
    pub fn new(identifier: [u8; 4], version: NnVersion) -> Self {
        Self {
            identifier,
            signature: 0,
            version_bugfix: version.bugfix,
            version_minor: version.minor,
            version_major: version.major,
            byte_order_mark: BOM_NATIVE,
            alignment_shift: 3,
            target_addr_size: 64,
            filename_offset: 0,
            flags: 0,
            first_block_offset: 0,
            relocation_table_offset: 0,
            memory_load_size: 0,
        }
    }

    /// Interpret the byte-order mark
    pub fn byte_order(&self) -> NnResult<ByteOrder> {
        match self.byte_order_mark {
            BOM_NATIVE => Ok(ByteOrder::Native),
            BOM_FOREIGN => Ok(ByteOrder::Foreign),
            other => Err(NnError::InvalidByteOrderMark(other)),
        }
    }

    /// Stored version, with the major field swapped for foreign files
    pub fn version(&self) -> NnVersion {
        let major = if self.byte_order_mark == BOM_FOREIGN {
            self.version_major.swap_bytes()
        } else {
            self.version_major
        };
        NnVersion::new(major, self.version_minor, self.version_bugfix)
    }

    /// Check the stored version against `expected` under `policy`
    pub fn check_version(&self, expected: NnVersion, policy: VersionPolicy) -> bool {
        let found = self.version();
        match policy {
            VersionPolicy::Exact => found == expected,
            VersionPolicy::Compatible => {
                found.major == expected.major && found.minor <= expected.minor
            }
        }
    }

    /// Like [`Self::check_version`] but reports the mismatch
    pub fn require_version(&self, expected: NnVersion, policy: VersionPolicy) -> NnResult<()> {
        if self.check_version(expected, policy) {
            Ok(())
        } else {
            Err(NnError::UnsupportedVersion {
                found: self.version(),
                expected,
            })
        }
    }

    /// Check identifier, zero signature and native byte order
    pub fn validate_identity(&self, identifier: [u8; 4]) -> NnResult<()> {
        if self.identifier != identifier {
            return Err(NnError::InvalidMagic {
                expected: identifier,
                actual: self.identifier,
            });
        }
        if self.signature != 0 {
            return Err(NnError::InvalidSignature(self.signature));
        }
        match self.byte_order()? {
            ByteOrder::Native => Ok(()),
            ByteOrder::Foreign => Err(NnError::UnsupportedByteOrder),
        }
    }

    /// File alignment in bytes
    pub fn alignment(&self) -> u64 {
        1u64 << (self.alignment_shift & 63)
    }

    /// Whether relocations have been applied
    pub fn is_relocated(&self) -> bool {
        self.flags & FLAG_RELOCATED != 0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::nn::record::{read_at, write_at};

    #[test]
    fn test_header_layout() {
        let mut header = NnFileHeader::new(*b"SCNE", NnVersion::new(1, 1, 0));
        header.filename_offset = 0x1234;
        header.flags = FLAG_RELOCATED;
        header.relocation_table_offset = 0xAABB;

        let mut data = vec![0u8; FILE_HEADER_SIZE];
        write_at(&mut data, 0, &header).expect("header fits");

        assert_eq!(&data[0..4], b"SCNE");
        assert_eq!(&data[8..12], &[0, 1, 1, 0]);
        assert_eq!(&data[0x0C..0x0E], &[0xFF, 0xFE]);
        assert_eq!(data[0x0F], 64);
        assert_eq!(&data[0x10..0x14], &[0x34, 0x12, 0, 0]);
        assert_eq!(&data[0x14..0x16], &[1, 0]);
        assert_eq!(&data[0x18..0x1C], &[0xBB, 0xAA, 0, 0]);

        let parsed: NnFileHeader = read_at(&data, 0).expect("header fits");
        assert_eq!(parsed, header);
        assert!(parsed.is_relocated());
        assert_eq!(parsed.alignment(), 8);
    }

    #[test]
    fn test_version_policies() {
        let header = NnFileHeader::new(*b"TEST", NnVersion::new(1, 0, 3));

        assert!(header.check_version(NnVersion::new(1, 0, 3), VersionPolicy::Exact));
        assert!(!header.check_version(NnVersion::new(1, 1, 0), VersionPolicy::Exact));

        assert!(header.check_version(NnVersion::new(1, 1, 0), VersionPolicy::Compatible));
        assert!(header.check_version(NnVersion::new(1, 0, 0), VersionPolicy::Compatible));
        assert!(!header.check_version(NnVersion::new(0, 9, 0), VersionPolicy::Compatible));
        assert!(!header.check_version(NnVersion::new(2, 0, 0), VersionPolicy::Compatible));

        let newer = NnFileHeader::new(*b"TEST", NnVersion::new(1, 2, 0));
        assert!(matches!(
            newer.require_version(NnVersion::new(1, 1, 0), VersionPolicy::Compatible),
            Err(NnError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_foreign_major_is_swapped() {
        let mut header = NnFileHeader::new(*b"TEST", NnVersion::new(0, 5, 0));
        header.byte_order_mark = BOM_FOREIGN;
        header.version_major = 0x0400;

        assert_eq!(header.version(), NnVersion::new(4, 5, 0));
        assert!(header.check_version(NnVersion::new(4, 5, 0), VersionPolicy::Exact));
        assert_eq!(header.byte_order().expect("valid mark"), ByteOrder::Foreign);
    }

    #[test]
    fn test_identity_checks() {
        let header = NnFileHeader::new(*b"SCNE", NnVersion::new(1, 1, 0));
        assert!(header.validate_identity(*b"SCNE").is_ok());
        assert!(matches!(
            header.validate_identity(*b"BNTX"),
            Err(NnError::InvalidMagic { .. })
        ));

        let mut signed = header;
        signed.signature = 1;
        assert!(matches!(
            signed.validate_identity(*b"SCNE"),
            Err(NnError::InvalidSignature(1))
        ));

        let mut foreign = header;
        foreign.byte_order_mark = BOM_FOREIGN;
        assert!(matches!(
            foreign.validate_identity(*b"SCNE"),
            Err(NnError::UnsupportedByteOrder)
        ));

        let mut garbage = header;
        garbage.byte_order_mark = 0x1234;
        assert!(matches!(
            garbage.validate_identity(*b"SCNE"),
            Err(NnError::InvalidByteOrderMark(0x1234))
        ));
    }
}
