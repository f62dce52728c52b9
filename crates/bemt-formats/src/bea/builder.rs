//! Builder for archives
//!
//! [`BeaBuilder`] compresses every asset, builds the name dictionary and lays
//! out the archive in one pass:
//!
//! ```text
//! header (0x48)
//! asset-pointer table      8 bytes per asset
//! reserved padding        40 bytes per asset
//! dictionary               header + (nodes + 1) * 0x10
//! asset blocks          0x30 bytes per asset
//! string pool              empty string, asset names, archive name
//! relocation table         8-byte aligned, one section
//! payloads                 back to back
//! ```
//!
//! Alignment shifts are stored in the asset blocks but payloads are not
//! padded to them.
//!
//! The header's first-block field is 16 bits wide. When the asset blocks
//! start past 0xFFFF the field is written as zero, so the archive carries no
//! block chain; every asset stays reachable through the asset-pointer table.
//!
//! # Example
//!
//! ```rust
//! use bemt_formats::bea::{AssetEntry, BeaArchive, BeaBuilder, CompressionType};
//!
//! let data = BeaBuilder::new("sample")
//!     .add_asset(AssetEntry::new("A", &b"hello"[..]))
//!     .add_asset(
//!         AssetEntry::new("B", &b"world world world world"[..])
//!             .with_compression(CompressionType::Zstd),
//!     )
//!     .build()
//!     .expect("Failed to build archive");
//!
//! let archive = BeaArchive::parse(&data).expect("Failed to parse archive");
//! assert_eq!(archive.find_asset_index("B"), Some(1));
//! assert_eq!(archive.decompressed_data(0).expect("Failed to decompress"), b"hello");
//! ```

use super::asset::{
    ASSET_BLOCK_SIZE, ASSET_MAGIC, AssetEntry, BeaAssetBlock, DATA_PTR_FIELD_OFFSET,
    FILENAME_PTR_FIELD_OFFSET, MAX_ALIGNMENT_SHIFT,
};
use super::compression::Codecs;
use super::error::{BeaError, BeaResult};
use super::header::{
    ARCHIVE_NAME_PTR_OFFSET, ASSET_POINTERS_PTR_OFFSET, BEA_HEADER_SIZE, BeaFileHeader,
    DIC_PTR_OFFSET,
};
use crate::nn::{
    NnBlockHeader, NnDic, RelocTableBuilder, StringPoolBuilder, align_up,
    dictionary_size, name_ptr_offset, offset_u32, write_at, write_dictionary, write_u64,
};
use crate::ptrie::Ptrie;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Zero-filled bytes reserved per asset after the pointer table
pub const ASSET_PADDING_SIZE: u64 = 40;

/// Dictionary nodes, excluding the sentinel, that 16-bit links can address
const MAX_DICTIONARY_NODES: usize = u16::MAX as usize;

/// Header pointer fields that take a relocation entry
const HEADER_POINTER_COUNT: usize = 3;

/// A compressed asset waiting to be laid out
struct Packed<'e> {
    name: &'e str,
    compression: u8,
    alignment_shift: u16,
    decompressed_size: u32,
    data: Vec<u8>,
}

/// Builder for archives
#[derive(Debug, Clone)]
pub struct BeaBuilder<'a> {
    archive_name: Cow<'a, str>,
    assets: Vec<AssetEntry<'a>>,
    codecs: Codecs,
}

impl<'a> BeaBuilder<'a> {
    /// Start an archive named `archive_name`
    pub fn new(archive_name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            archive_name: archive_name.into(),
            assets: Vec::new(),
            codecs: Codecs::default(),
        }
    }

    /// Append an asset
    pub fn add_asset(mut self, entry: AssetEntry<'a>) -> Self {
        self.assets.push(entry);
        self
    }

    /// Append an asset in place
    pub fn push_asset(&mut self, entry: AssetEntry<'a>) {
        self.assets.push(entry);
    }

    /// Use `codecs` for compression
    pub fn with_codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    /// Number of assets added so far
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Check counts, names and alignment shifts before any compression
    fn validate(&self) -> BeaResult<u16> {
        let count = u16::try_from(self.assets.len())
            .map_err(|_| BeaError::TooManyAssets(self.assets.len()))?;

        // One leaf per asset plus one branch between each pair
        let nodes = (2 * self.assets.len()).saturating_sub(1);
        if nodes > MAX_DICTIONARY_NODES {
            return Err(BeaError::DictionaryOverflow {
                count: self.assets.len(),
                nodes,
            });
        }

        if self.archive_name.contains('\0') || u16::try_from(self.archive_name.len()).is_err() {
            return Err(BeaError::InvalidArchiveName(self.archive_name.to_string()));
        }

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(self.assets.len());
        for (index, asset) in self.assets.iter().enumerate() {
            let name = asset.name.as_ref();
            if name.contains('\0') {
                return Err(BeaError::InvalidAssetName {
                    index,
                    name: name.to_string(),
                });
            }
            if u16::try_from(name.len()).is_err() {
                return Err(BeaError::AssetNameTooLong {
                    index,
                    len: name.len(),
                });
            }
            if let Some(&first) = seen.get(name) {
                return Err(BeaError::DuplicateAssetName {
                    index,
                    name: name.to_string(),
                    first,
                });
            }
            seen.insert(name, index);

            if asset.alignment_shift > MAX_ALIGNMENT_SHIFT {
                return Err(BeaError::AlignmentShiftTooLarge {
                    index,
                    name: name.to_string(),
                    shift: asset.alignment_shift,
                });
            }
        }
        Ok(count)
    }

    fn compress(&self) -> BeaResult<Vec<Packed<'_>>> {
        self.assets
            .iter()
            .enumerate()
            .map(|(index, asset)| {
                let name = asset.name.as_ref();
                let too_large = |size: usize| BeaError::AssetTooLarge {
                    index,
                    name: name.to_string(),
                    size,
                };

                let decompressed_size =
                    u32::try_from(asset.data.len()).map_err(|_| too_large(asset.data.len()))?;
                let data = self
                    .codecs
                    .get(asset.compression)
                    .compress(&asset.data)
                    .map_err(|source| BeaError::AssetCodec {
                        index,
                        name: name.to_string(),
                        source,
                    })?;
                if u32::try_from(data.len()).is_err() {
                    return Err(too_large(data.len()));
                }

                trace!(
                    "Packed asset {} ({}): {} -> {} bytes with {}",
                    index,
                    name,
                    asset.data.len(),
                    data.len(),
                    asset.compression
                );
                Ok(Packed {
                    name,
                    compression: asset.compression.as_byte(),
                    alignment_shift: asset.alignment_shift,
                    decompressed_size,
                    data,
                })
            })
            .collect()
    }

    /// Encode the archive
    pub fn build(&self) -> BeaResult<Vec<u8>> {
        let count = self.validate()?;
        let packed = self.compress()?;
        let n = packed.len() as u64;

        // Dictionary with slot i + 1 naming asset i
        let names: Vec<&str> = packed.iter().map(|asset| asset.name).collect();
        let mut trie = Ptrie::new();
        for name in &names {
            trie.insert(name);
        }
        let mut flat = trie.flatten();
        flat.arrange(&names)
            .map_err(|index| BeaError::DictionarySelfTestFailed {
                index,
                name: names[index].to_string(),
                found: None,
            })?;
        let node_count = flat.node_count();

        // Layout
        let asset_pointers_offset = BEA_HEADER_SIZE as u64;
        let padding_offset = asset_pointers_offset + 8 * n;
        let dic_offset = padding_offset + ASSET_PADDING_SIZE * n;
        let blocks_offset = dic_offset + dictionary_size(node_count);
        let pool_offset = blocks_offset + ASSET_BLOCK_SIZE as u64 * n;

        let mut pool = StringPoolBuilder::new();
        let mut name_ptrs = Vec::with_capacity(names.len());
        for name in &names {
            name_ptrs.push(pool_offset + pool.push(name)?);
        }
        let archive_name_ptr = pool_offset + pool.push(self.archive_name.as_bytes())?;
        let empty_name_ptr = pool_offset + StringPoolBuilder::EMPTY_STRING_OFFSET;

        let reloc_offset = align_up(pool_offset + pool.size(), 8);
        let expected_relocs = HEADER_POINTER_COUNT + 3 * names.len() + node_count + 1;
        let payload_offset = reloc_offset + RelocTableBuilder::size_for(expected_relocs);

        let mut payload_ptrs = Vec::with_capacity(packed.len());
        let mut total = payload_offset;
        for asset in &packed {
            payload_ptrs.push(total);
            total += asset.data.len() as u64;
        }
        let memory_load_size = u32::try_from(total).map_err(|_| BeaError::ArchiveTooLarge(total))?;

        debug!(
            "Laying out archive '{}': {} assets, {} dictionary nodes, {} bytes",
            self.archive_name, count, node_count, total
        );

        let mut data = vec![0u8; memory_load_size as usize];
        let mut relocs = RelocTableBuilder::new();

        // Header
        let first_block = if packed.is_empty() {
            pool_offset
        } else {
            blocks_offset
        };
        let mut header = BeaFileHeader::new(count);
        header.file.filename_offset = offset_u32(archive_name_ptr + 2)?;
        header.file.first_block_offset = u16::try_from(first_block).unwrap_or_else(|_| {
            debug!(
                "First block at 0x{:X} does not fit the 16-bit field; block chain not recorded",
                first_block
            );
            0
        });
        header.file.relocation_table_offset = offset_u32(reloc_offset)?;
        header.file.memory_load_size = memory_load_size;
        header.asset_pointers_ptr = asset_pointers_offset;
        header.dic_ptr = dic_offset;
        header.archive_name_ptr = archive_name_ptr;
        write_at(&mut data, 0, &header)?;
        for field in [
            ASSET_POINTERS_PTR_OFFSET,
            DIC_PTR_OFFSET,
            ARCHIVE_NAME_PTR_OFFSET,
        ] {
            relocs.push_pointer(field)?;
        }

        // Asset-pointer table
        for i in 0..n {
            let slot = asset_pointers_offset + 8 * i;
            write_u64(&mut data, slot, blocks_offset + ASSET_BLOCK_SIZE as u64 * i)?;
            relocs.push_pointer(slot)?;
        }

        // Dictionary
        write_dictionary(&mut data, dic_offset, &flat, |slot, _| {
            slot.checked_sub(1)
                .and_then(|index| name_ptrs.get(index))
                .copied()
                .unwrap_or(empty_name_ptr)
        })?;
        for slot in 0..=node_count {
            relocs.push_pointer(name_ptr_offset(dic_offset, slot))?;
        }

        // Asset blocks, chained into the string pool
        for (i, asset) in packed.iter().enumerate() {
            let block_offset = blocks_offset + (ASSET_BLOCK_SIZE * i) as u64;
            let mut block_header = NnBlockHeader::new(ASSET_MAGIC, ASSET_BLOCK_SIZE as u32);
            block_header.offset_to_next = offset_u32(if i + 1 < packed.len() {
                ASSET_BLOCK_SIZE as u64
            } else {
                pool_offset - block_offset
            })?;

            let block = BeaAssetBlock {
                block: block_header,
                compression: asset.compression,
                pad: 0,
                alignment_shift: asset.alignment_shift,
                compressed_size: asset.data.len() as u32,
                decompressed_size: asset.decompressed_size,
                reserved: 0,
                data_ptr: payload_ptrs[i],
                filename_ptr: name_ptrs[i],
            };
            write_at(&mut data, block_offset, &block)?;
            relocs.push_pointer(block_offset + DATA_PTR_FIELD_OFFSET)?;
            relocs.push_pointer(block_offset + FILENAME_PTR_FIELD_OFFSET)?;
        }

        pool.write(&mut data, pool_offset)?;

        if relocs.len() != expected_relocs {
            return Err(BeaError::RelocationCountMismatch {
                expected: expected_relocs,
                actual: relocs.len(),
            });
        }
        relocs.write(&mut data, reloc_offset)?;

        for (asset, &ptr) in packed.iter().zip(&payload_ptrs) {
            let start = ptr as usize;
            data[start..start + asset.data.len()].copy_from_slice(&asset.data);
        }

        verify_dictionary(&data, dic_offset, &names)?;

        debug!(
            "Built archive '{}': {} relocation entries, {} bytes",
            self.archive_name,
            relocs.len(),
            data.len()
        );
        Ok(data)
    }
}

/// Look every name up in the written dictionary
fn verify_dictionary(data: &[u8], dic_offset: u64, names: &[&str]) -> BeaResult<()> {
    let dic = NnDic::parse(data, dic_offset)?;
    for (index, name) in names.iter().enumerate() {
        let found = dic.find_index(name);
        if found != Some(index) {
            return Err(BeaError::DictionarySelfTestFailed {
                index,
                name: (*name).to_string(),
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bea::CompressionType;
    use crate::nn::{NnFile, NnRelocTable, read_at, read_u64};

    fn sample() -> BeaBuilder<'static> {
        BeaBuilder::new("sample")
            .add_asset(AssetEntry::new("A", &b"hello"[..]))
            .add_asset(
                AssetEntry::new("B", "world ".repeat(20).into_bytes())
                    .with_compression(CompressionType::Zstd),
            )
    }

    #[test]
    fn test_layout_offsets() {
        let data = sample().build().expect("valid archive");
        let header: BeaFileHeader = read_at(&data, 0).expect("header");

        // 2 assets, 3 dictionary nodes
        assert_eq!(header.asset_pointers_ptr, 0x48);
        assert_eq!(header.dic_ptr, 0x48 + 16 + 80);
        let blocks = header.dic_ptr + dictionary_size(3);
        assert_eq!(u64::from(header.file.first_block_offset), blocks);
        assert_eq!(read_u64(&data, 0x48).expect("slot 0"), blocks);
        assert_eq!(read_u64(&data, 0x50).expect("slot 1"), blocks + 0x30);

        // Reserved padding stays zero
        assert!(data[0x58..0x58 + 80].iter().all(|&b| b == 0));

        assert_eq!(header.file.relocation_table_offset % 8, 0);
        assert_eq!(header.file.memory_load_size as usize, data.len());
        assert_eq!(header.file.alignment_shift, 3);
    }

    #[test]
    fn test_relocation_entries_cover_every_pointer() {
        let data = sample().build().expect("valid archive");
        let file = NnFile::parse(&data).expect("header");
        let table: NnRelocTable<'_> = file.relocation_table().expect("table");
        let pointers: Vec<u64> = table
            .pointer_offsets()
            .expect("entries")
            .into_iter()
            .map(|(_, offset)| offset)
            .collect();

        // 3 header fields + 3 per asset + (3 nodes + sentinel)
        assert_eq!(pointers.len(), 3 + 3 * 2 + 4);
        assert_eq!(&pointers[..3], &[0x28, 0x30, 0x40]);
        assert_eq!(&pointers[3..5], &[0x48, 0x50]);

        let header: BeaFileHeader = read_at(&data, 0).expect("header");
        let sections = table.sections().expect("sections");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data_size, header.file.relocation_table_offset);
    }

    #[test]
    fn test_payloads_are_packed_back_to_back() {
        let data = BeaBuilder::new("aligned")
            .add_asset(AssetEntry::new("x", &b"abc"[..]).with_alignment_shift(12))
            .add_asset(AssetEntry::new("y", &b"defg"[..]).with_alignment_shift(12))
            .build()
            .expect("valid archive");
        let header: BeaFileHeader = read_at(&data, 0).expect("header");
        let blocks = u64::from(header.file.first_block_offset);

        let x: BeaAssetBlock = read_at(&data, blocks).expect("block x");
        let y: BeaAssetBlock = read_at(&data, blocks + 0x30).expect("block y");
        assert_eq!(x.alignment_shift, 12);
        assert_eq!(y.data_ptr, x.data_ptr + 3);
        assert_eq!(data.len() as u64, y.data_ptr + 4);
        assert_eq!(&data[x.data_ptr as usize..][..7], b"abcdefg");
    }

    #[test]
    fn test_validation_errors() {
        let shift = BeaBuilder::new("a")
            .add_asset(AssetEntry::new("x", &b""[..]).with_alignment_shift(64))
            .build();
        assert!(matches!(
            shift,
            Err(BeaError::AlignmentShiftTooLarge { index: 0, shift: 64, .. })
        ));

        let duplicate = BeaBuilder::new("a")
            .add_asset(AssetEntry::new("x", &b"1"[..]))
            .add_asset(AssetEntry::new("x", &b"2"[..]))
            .build();
        assert!(matches!(
            duplicate,
            Err(BeaError::DuplicateAssetName { index: 1, first: 0, .. })
        ));

        let nul = BeaBuilder::new("a").add_asset(AssetEntry::new("x\0y", &b""[..])).build();
        assert!(matches!(nul, Err(BeaError::InvalidAssetName { index: 0, .. })));

        let long = BeaBuilder::new("a")
            .add_asset(AssetEntry::new("n".repeat(0x1_0000), &b""[..]))
            .build();
        assert!(matches!(long, Err(BeaError::AssetNameTooLong { len: 0x1_0000, .. })));

        let archive = BeaBuilder::new("bad\0name").build();
        assert!(matches!(archive, Err(BeaError::InvalidArchiveName(_))));
    }

    #[test]
    fn test_dictionary_node_limit_checked_before_compression() {
        let mut builder = BeaBuilder::new("many");
        for i in 0..32_769 {
            builder.push_asset(
                AssetEntry::new(format!("{i}"), &b"payload"[..])
                    .with_compression(CompressionType::Zstd),
            );
        }
        assert!(matches!(
            builder.build(),
            Err(BeaError::DictionaryOverflow {
                count: 32_769,
                nodes: 65_537
            })
        ));
    }

    #[test]
    fn test_first_block_past_16_bits_drops_chain() {
        // About 0x50 bytes of pointers, padding and dictionary per asset
        let mut builder = BeaBuilder::new("far");
        for i in 0..1000 {
            builder.push_asset(AssetEntry::new(format!("asset{i}"), &b""[..]));
        }
        let data = builder.build().expect("valid archive");
        let header: BeaFileHeader = read_at(&data, 0).expect("header");
        assert_eq!(header.file.first_block_offset, 0);

        let file = NnFile::parse(&data).expect("header");
        assert_eq!(file.blocks().count(), 0);

        let archive = crate::bea::BeaArchive::parse(&data).expect("valid archive");
        assert_eq!(archive.asset(999).expect("asset").name, "asset999");
    }

    #[test]
    fn test_too_many_assets() {
        let mut builder = BeaBuilder::new("many");
        for i in 0..=usize::from(u16::MAX) {
            builder.push_asset(AssetEntry::new(format!("{i}"), &b""[..]));
        }
        assert_eq!(builder.asset_count(), 65536);
        assert!(matches!(builder.build(), Err(BeaError::TooManyAssets(65536))));
    }
}
