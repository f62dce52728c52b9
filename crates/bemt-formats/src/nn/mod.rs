//! Relocatable binary substrate
//!
//! Container formats built on this substrate share a common skeleton:
//!
//! - a 0x20-byte [`NnFileHeader`] with identifier, version, byte-order mark
//!   and the offsets of the first block and the relocation table
//! - a forward chain of blocks, each opened by an [`NnBlockHeader`]
//! - a string pool (`_STR`) of length-prefixed [`NnString`] records
//! - name dictionaries (`_DIC`) laid out as a flattened PATRICIA trie
//! - a relocation table (`_RLT`) listing every 64-bit pointer field
//!
//! Pointer fields hold file offsets until [`apply_relocations`] rebases them.
//! All records are little-endian and tightly packed; every read is bounds
//! checked against the buffer.
//!
//! ```rust
//! use bemt_formats::nn::{NnFileHeader, NnVersion, VersionPolicy};
//!
//! let header = NnFileHeader::new(*b"SCNE", NnVersion::new(1, 1, 0));
//! assert!(header.check_version(NnVersion::new(1, 1, 0), VersionPolicy::Exact));
//! assert!(!header.is_relocated());
//! ```

mod block;
mod dic;
mod error;
mod header;
mod record;
mod reloc;
mod string;

pub use block::{BLOCK_HEADER_SIZE, Blocks, NnBlockHeader};
pub use dic::{
    DIC_HEADER_SIZE, DIC_MAGIC, DIC_NODE_SIZE, DIC_NPOS, NnDic, NnDicHeader, NnDicNode,
    dictionary_size, name_ptr_offset, write_dictionary,
};
pub use error::{NnError, NnResult};
pub use header::{
    BOM_FOREIGN, BOM_NATIVE, ByteOrder, FILE_HEADER_SIZE, FLAG_RELOCATED, NnFileHeader, NnVersion,
    VersionPolicy,
};
pub use record::{NnRecord, align_up, offset_u32, read_at, read_u64, slice_at, write_at, write_u64};
pub use reloc::{
    NnRelocEntry, NnRelocSection, NnRelocTable, NnRelocTableHeader, RELOC_MAGIC, RelocTableBuilder,
    apply_relocations,
};
pub use string::{
    NnString, NnStringPoolHeader, STRING_POOL_HEADER_SIZE, STRING_POOL_MAGIC, StringPoolBuilder,
    string_record_size,
};

/// Borrowed view of a relocatable binary
#[derive(Debug, Clone, Copy)]
pub struct NnFile<'a> {
    data: &'a [u8],
    header: NnFileHeader,
}

impl<'a> NnFile<'a> {
    /// Read the file header
    ///
    /// Only the header's bounds are checked; identity and version checks are
    /// left to the container format.
    pub fn parse(data: &'a [u8]) -> NnResult<Self> {
        let header = read_at(data, 0)?;
        Ok(Self { data, header })
    }

    /// The file header
    pub const fn header(&self) -> &NnFileHeader {
        &self.header
    }

    /// The underlying buffer
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Iterate over the block chain
    pub fn blocks(&self) -> Blocks<'a> {
        Blocks::new(self.data, u64::from(self.header.first_block_offset))
    }

    /// File name stored in the header, if any
    ///
    /// The header points at the string's characters, two bytes past the
    /// start of its length-prefixed record.
    pub fn filename(&self) -> NnResult<Option<NnString<'a>>> {
        match self.header.filename_offset {
            0 | 1 => Ok(None),
            offset => NnString::read(self.data, u64::from(offset) - 2).map(Some),
        }
    }

    /// The relocation table
    pub fn relocation_table(&self) -> NnResult<NnRelocTable<'a>> {
        NnRelocTable::parse(self.data, u64::from(self.header.relocation_table_offset))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_points_past_length_prefix() {
        let mut pool = StringPoolBuilder::new();
        let name = pool.push("scene").expect("short name");

        let pool_offset = FILE_HEADER_SIZE as u64;
        let mut data = vec![0u8; FILE_HEADER_SIZE + pool.size() as usize];
        let mut header = NnFileHeader::new(*b"TEST", NnVersion::new(1, 0, 0));
        header.filename_offset = (pool_offset + name + 2) as u32;
        header.first_block_offset = pool_offset as u16;
        write_at(&mut data, 0, &header).expect("fits");
        pool.write(&mut data, pool_offset).expect("fits");

        let file = NnFile::parse(&data).expect("header fits");
        let filename = file.filename().expect("readable").expect("present");
        assert_eq!(filename.to_str().expect("utf-8"), "scene");

        let blocks: Vec<_> = file.blocks().collect::<NnResult<_>>().expect("valid chain");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].1.identifier, STRING_POOL_MAGIC);
    }

    #[test]
    fn test_no_filename() {
        let mut data = vec![0u8; FILE_HEADER_SIZE];
        write_at(&mut data, 0, &NnFileHeader::new(*b"TEST", NnVersion::new(1, 0, 0)))
            .expect("fits");
        let file = NnFile::parse(&data).expect("header fits");
        assert!(file.filename().expect("readable").is_none());
        assert_eq!(file.blocks().count(), 0);
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            NnFile::parse(&[0u8; 0x10]),
            Err(NnError::OutOfBounds { .. })
        ));
    }
}
