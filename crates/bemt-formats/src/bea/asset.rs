//! Asset blocks and build requests

use super::error::{BeaError, BeaResult};
use crate::nn::{NnBlockHeader, NnRecord};
use binrw::{BinRead, BinWrite};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Asset block identifier
pub const ASSET_MAGIC: [u8; 4] = *b"ASST";
/// Size of [`BeaAssetBlock`] in bytes
pub const ASSET_BLOCK_SIZE: usize = 0x30;
/// Offset of the data pointer inside [`BeaAssetBlock`]
pub const DATA_PTR_FIELD_OFFSET: u64 = 0x20;
/// Offset of the filename pointer inside [`BeaAssetBlock`]
pub const FILENAME_PTR_FIELD_OFFSET: u64 = 0x28;
/// Largest alignment shift an asset may carry
pub const MAX_ALIGNMENT_SHIFT: u16 = 63;

/// Per-asset compression tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// Stored as-is
    #[default]
    None = 0,
    /// zlib stream
    Zlib = 1,
    /// Zstandard frame
    Zstd = 2,
}

impl CompressionType {
    /// Parse a compression tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Zlib),
            2 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Get the byte representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Zstd => "zstd",
        }
    }
}

impl TryFrom<u8> for CompressionType {
    type Error = BeaError;

    fn try_from(byte: u8) -> BeaResult<Self> {
        Self::from_byte(byte).ok_or(BeaError::UnknownCompression(byte))
    }
}

impl FromStr for CompressionType {
    type Err = BeaError;

    fn from_str(s: &str) -> BeaResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "stored" => Ok(Self::None),
            "zlib" | "deflate" => Ok(Self::Zlib),
            "zstd" | "zstandard" => Ok(Self::Zstd),
            _ => Err(BeaError::UnknownCompressionName(s.to_string())),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Asset block (0x30 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct BeaAssetBlock {
    /// Block header, identifier `ASST`
    pub block: NnBlockHeader,
    /// Raw compression tag, see [`CompressionType`]
    pub compression: u8,
    /// Padding
    pub pad: u8,
    /// Payload alignment is `1 << alignment_shift`
    pub alignment_shift: u16,
    /// Stored payload size
    pub compressed_size: u32,
    /// Size after decompression
    pub decompressed_size: u32,
    /// Reserved
    pub reserved: u32,
    /// Offset of the payload
    pub data_ptr: u64,
    /// Offset of the asset's name string record
    pub filename_ptr: u64,
}

impl NnRecord for BeaAssetBlock {
    const SIZE: usize = ASSET_BLOCK_SIZE;
}

impl BeaAssetBlock {
    /// Interpret the compression tag
    pub fn compression_type(&self) -> BeaResult<CompressionType> {
        CompressionType::try_from(self.compression)
    }

    /// Payload alignment in bytes; zero for shifts past 63
    pub fn alignment(&self) -> u64 {
        1u64.checked_shl(u32::from(self.alignment_shift)).unwrap_or(0)
    }
}

/// An asset to be packed into an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry<'a> {
    /// Name used for dictionary lookup
    pub name: Cow<'a, str>,
    /// Uncompressed payload
    pub data: Cow<'a, [u8]>,
    /// Codec applied when packing
    pub compression: CompressionType,
    /// Stored alignment shift
    pub alignment_shift: u16,
}

impl<'a> AssetEntry<'a> {
    /// Create an uncompressed entry with byte alignment
    pub fn new(name: impl Into<Cow<'a, str>>, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            compression: CompressionType::None,
            alignment_shift: 0,
        }
    }

    /// Set the codec
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Set the alignment shift
    pub fn with_alignment_shift(mut self, shift: u16) -> Self {
        self.alignment_shift = shift;
        self
    }
}

/// Metadata of a parsed asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo<'a> {
    /// Position in the asset table
    pub index: usize,
    /// Asset name
    pub name: &'a str,
    /// Compression tag as stored
    pub compression: u8,
    /// Stored alignment shift
    pub alignment_shift: u16,
    /// Stored payload size
    pub compressed_size: u32,
    /// Size after decompression
    pub decompressed_size: u32,
    /// Offset of the payload
    pub data_offset: u64,
}

impl AssetInfo<'_> {
    /// Interpret the compression tag
    pub fn compression_type(&self) -> BeaResult<CompressionType> {
        CompressionType::try_from(self.compression)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::nn::{read_at, write_at};

    #[test]
    fn test_compression_tags() {
        assert_eq!(CompressionType::try_from(2).expect("known"), CompressionType::Zstd);
        assert!(matches!(
            CompressionType::try_from(3),
            Err(BeaError::UnknownCompression(3))
        ));
        assert_eq!("ZLIB".parse::<CompressionType>().expect("known"), CompressionType::Zlib);
        assert!("lz4".parse::<CompressionType>().is_err());
        assert_eq!(CompressionType::Zstd.to_string(), "zstd");
    }

    #[test]
    fn test_block_layout() {
        let block = BeaAssetBlock {
            block: NnBlockHeader::new(ASSET_MAGIC, ASSET_BLOCK_SIZE as u32),
            compression: 2,
            pad: 0,
            alignment_shift: 12,
            compressed_size: 0x10,
            decompressed_size: 0x20,
            reserved: 0,
            data_ptr: 0x300,
            filename_ptr: 0x200,
        };
        let mut data = vec![0u8; ASSET_BLOCK_SIZE];
        write_at(&mut data, 0, &block).expect("fits");

        assert_eq!(&data[..4], b"ASST");
        assert_eq!(data[0x10], 2);
        assert_eq!(&data[0x12..0x14], &[12, 0]);
        assert_eq!(&data[0x20..0x22], &[0x00, 0x03]);
        assert_eq!(&data[0x28..0x2A], &[0x00, 0x02]);

        let parsed: BeaAssetBlock = read_at(&data, 0).expect("fits");
        assert_eq!(parsed, block);
        assert_eq!(parsed.alignment(), 4096);
    }

    #[test]
    fn test_entry_builders() {
        let entry = AssetEntry::new("a.bin", &b"payload"[..])
            .with_compression(CompressionType::Zlib)
            .with_alignment_shift(3);
        assert_eq!(entry.name, "a.bin");
        assert_eq!(entry.compression, CompressionType::Zlib);
        assert_eq!(entry.alignment_shift, 3);

        let owned = AssetEntry::new(String::from("b.bin"), vec![1u8, 2, 3]);
        assert_eq!(owned.data.as_ref(), &[1, 2, 3]);
    }
}
