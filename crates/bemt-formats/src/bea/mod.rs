//! Bezel Engine archive (`.bea`) support
//!
//! Archives are relocatable binaries with identifier `SCNE` and version
//! 1.1.0. They hold named assets, each compressed independently with one of
//! three codecs, and a name dictionary for lookup.
//!
//! # Parsing
//!
//! [`BeaArchive`] borrows the archive bytes and reads assets on demand. The
//! buffer must still hold file offsets, so archives whose relocated flag is
//! set are rejected.
//!
//! ```rust
//! use bemt_formats::bea::{AssetEntry, BeaArchive, BeaBuilder};
//!
//! let data = BeaBuilder::new("demo")
//!     .add_asset(AssetEntry::new("readme.txt", &b"hi"[..]))
//!     .build()?;
//!
//! let archive = BeaArchive::parse(&data)?;
//! assert_eq!(archive.archive_name()?, "demo");
//! for asset in archive.assets() {
//!     let asset = asset?;
//!     println!("{} ({} bytes)", asset.name, asset.decompressed_size);
//! }
//! # Ok::<(), bemt_formats::bea::BeaError>(())
//! ```
//!
//! # Building
//!
//! See [`BeaBuilder`].

mod asset;
mod builder;
mod compression;
mod error;
mod header;

pub use asset::{
    ASSET_BLOCK_SIZE, ASSET_MAGIC, AssetEntry, AssetInfo, BeaAssetBlock, CompressionType,
    MAX_ALIGNMENT_SHIFT,
};
pub use builder::{ASSET_PADDING_SIZE, BeaBuilder};
pub use compression::{Codec, CodecResult, Codecs, StoredCodec, ZlibCodec, ZstdCodec};
pub use error::{BeaError, BeaResult, CodecError};
pub use header::{BEA_HEADER_SIZE, BEA_MAGIC, BEA_VERSION, BeaFileHeader};

use crate::nn::{NnDic, NnFile, NnString, VersionPolicy, read_at, read_u64, slice_at};
use tracing::debug;

/// Borrowed view of an archive
#[derive(Debug, Clone, Copy)]
pub struct BeaArchive<'a> {
    data: &'a [u8],
    header: BeaFileHeader,
    dic: NnDic<'a>,
}

impl<'a> BeaArchive<'a> {
    /// Parse an archive, accepting older minor versions
    pub fn parse(data: &'a [u8]) -> BeaResult<Self> {
        Self::parse_with_policy(data, VersionPolicy::Compatible)
    }

    /// Parse an archive, checking its version under `policy`
    pub fn parse_with_policy(data: &'a [u8], policy: VersionPolicy) -> BeaResult<Self> {
        let header: BeaFileHeader = read_at(data, 0)?;
        header.validate(policy)?;

        let count = usize::from(header.asset_count);
        slice_at(data, header.asset_pointers_ptr, 8 * count)?;
        let dic = NnDic::parse(data, header.dic_ptr)?;

        debug!(
            "Parsed archive header: {} assets, {} dictionary nodes",
            count,
            dic.node_count()
        );
        Ok(Self { data, header, dic })
    }

    /// The archive header
    pub const fn header(&self) -> &BeaFileHeader {
        &self.header
    }

    /// The archive as a generic relocatable binary
    pub fn nn_file(&self) -> BeaResult<NnFile<'a>> {
        Ok(NnFile::parse(self.data)?)
    }

    /// The name dictionary
    pub const fn dictionary(&self) -> &NnDic<'a> {
        &self.dic
    }

    /// Archive name
    pub fn archive_name(&self) -> BeaResult<&'a str> {
        Ok(NnString::read(self.data, self.header.archive_name_ptr)?.to_str()?)
    }

    /// Number of assets
    pub fn asset_count(&self) -> usize {
        usize::from(self.header.asset_count)
    }

    /// Index of the asset named `name`
    pub fn find_asset_index(&self, name: &str) -> Option<usize> {
        self.dic
            .find_index(name)
            .filter(|&index| index < self.asset_count())
    }

    /// Raw asset block of asset `index`
    pub fn asset_block(&self, index: usize) -> BeaResult<BeaAssetBlock> {
        let count = self.asset_count();
        if index >= count {
            return Err(BeaError::AssetIndexOutOfRange { index, count });
        }

        let pointer = read_u64(self.data, self.header.asset_pointers_ptr + 8 * index as u64)?;
        let block: BeaAssetBlock = read_at(self.data, pointer)?;
        if block.block.identifier != ASSET_MAGIC {
            return Err(BeaError::InvalidAssetBlock {
                index,
                actual: block.block.identifier,
            });
        }
        Ok(block)
    }

    fn asset_name(&self, block: &BeaAssetBlock) -> BeaResult<&'a str> {
        Ok(NnString::read(self.data, block.filename_ptr)?.to_str()?)
    }

    /// Metadata of asset `index`
    pub fn asset(&self, index: usize) -> BeaResult<AssetInfo<'a>> {
        let block = self.asset_block(index)?;
        Ok(AssetInfo {
            index,
            name: self.asset_name(&block)?,
            compression: block.compression,
            alignment_shift: block.alignment_shift,
            compressed_size: block.compressed_size,
            decompressed_size: block.decompressed_size,
            data_offset: block.data_ptr,
        })
    }

    /// Iterate over asset metadata in index order
    pub fn assets(&self) -> impl Iterator<Item = BeaResult<AssetInfo<'a>>> + '_ {
        (0..self.asset_count()).map(|index| self.asset(index))
    }

    /// Stored payload of asset `index`
    pub fn compressed_data(&self, index: usize) -> BeaResult<&'a [u8]> {
        let block = self.asset_block(index)?;
        Ok(slice_at(
            self.data,
            block.data_ptr,
            block.compressed_size as usize,
        )?)
    }

    /// Decompressed payload of asset `index` using the default codecs
    pub fn decompressed_data(&self, index: usize) -> BeaResult<Vec<u8>> {
        self.decompressed_data_with(index, &Codecs::default())
    }

    /// Decompressed payload of asset `index`
    pub fn decompressed_data_with(&self, index: usize, codecs: &Codecs) -> BeaResult<Vec<u8>> {
        let block = self.asset_block(index)?;
        let compression = block.compression_type()?;
        let stored = slice_at(self.data, block.data_ptr, block.compressed_size as usize)?;

        codecs
            .get(compression)
            .decompress(stored, block.decompressed_size as usize)
            .map_err(|source| BeaError::AssetCodec {
                index,
                name: self
                    .asset_name(&block)
                    .map_or_else(|_| String::from("<unnamed>"), str::to_string),
                source,
            })
    }
}
