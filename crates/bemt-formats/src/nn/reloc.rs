//! Pointer relocation table
//!
//! Pointer fields in a relocatable binary hold file offsets until the loader
//! rebases them. The table lists every such field as runs of `u64` slots:
//! each entry names `pointer_list_count` lists of `pointers_per_list`
//! consecutive pointers, successive lists `pointers_per_list +
//! inter_list_skip` slots apart.

use crate::nn::error::{NnError, NnResult};
use crate::nn::header::{FLAG_RELOCATED, FLAGS_FIELD_OFFSET, NnFileHeader};
use crate::nn::record::{NnRecord, read_at, read_u64, slice_at_mut, write_at, write_u64};
use binrw::{BinRead, BinWrite};
use tracing::debug;

/// Relocation table identifier
pub const RELOC_MAGIC: [u8; 4] = *b"_RLT";
/// Size of [`NnRelocTableHeader`] in bytes
pub const RELOC_HEADER_SIZE: usize = 0x10;
/// Size of [`NnRelocSection`] in bytes
pub const RELOC_SECTION_SIZE: usize = 0x18;
/// Size of [`NnRelocEntry`] in bytes
pub const RELOC_ENTRY_SIZE: usize = 0x08;

/// Relocation table header (0x10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnRelocTableHeader {
    /// Identifier, `_RLT`
    pub identifier: [u8; 4],
    /// Offset of this table in the file
    pub self_offset: u32,
    /// Number of sections
    pub section_count: u32,
    /// Keeps sections 8-byte aligned
    pub reserved: u32,
}

impl NnRecord for NnRelocTableHeader {
    const SIZE: usize = RELOC_HEADER_SIZE;
}

/// Relocation section (0x18 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnRelocSection {
    /// Runtime address of the section, zero on disk
    pub data_address: u64,
    /// Offset of the section's data
    pub data_offset: u32,
    /// Size of the section's data
    pub data_size: u32,
    /// First entry belonging to this section
    pub first_entry_index: i32,
    /// Number of entries
    pub entry_count: u32,
}

impl NnRecord for NnRelocSection {
    const SIZE: usize = RELOC_SECTION_SIZE;
}

/// Relocation entry (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnRelocEntry {
    /// File offset of the first pointer
    pub offset: u32,
    /// Number of pointer lists
    pub pointer_list_count: u16,
    /// Consecutive pointers per list
    pub pointers_per_list: u8,
    /// Slots skipped between lists
    pub inter_list_skip: u8,
}

impl NnRecord for NnRelocEntry {
    const SIZE: usize = RELOC_ENTRY_SIZE;
}

impl NnRelocEntry {
    /// An entry covering a single pointer field
    pub const fn single(offset: u32) -> Self {
        Self {
            offset,
            pointer_list_count: 1,
            pointers_per_list: 1,
            inter_list_skip: 0,
        }
    }

    /// File offsets of every pointer field the entry covers
    pub fn pointer_offsets(self) -> impl Iterator<Item = u64> {
        let stride = (u64::from(self.pointers_per_list) + u64::from(self.inter_list_skip)) * 8;
        let base = u64::from(self.offset);
        (0..u64::from(self.pointer_list_count)).flat_map(move |list| {
            (0..u64::from(self.pointers_per_list)).map(move |slot| base + list * stride + slot * 8)
        })
    }
}

/// Borrowed view of a relocation table
#[derive(Debug, Clone)]
pub struct NnRelocTable<'a> {
    data: &'a [u8],
    offset: u64,
    header: NnRelocTableHeader,
}

impl<'a> NnRelocTable<'a> {
    /// Parse the table at `offset`
    pub fn parse(data: &'a [u8], offset: u64) -> NnResult<Self> {
        let header: NnRelocTableHeader = read_at(data, offset)?;
        if header.identifier != RELOC_MAGIC {
            return Err(NnError::InvalidMagic {
                expected: RELOC_MAGIC,
                actual: header.identifier,
            });
        }
        if u64::from(header.self_offset) != offset {
            return Err(NnError::RelocationSelfOffsetMismatch {
                header: offset as u32,
                table: header.self_offset,
            });
        }
        Ok(Self {
            data,
            offset,
            header,
        })
    }

    /// Table header
    pub const fn header(&self) -> &NnRelocTableHeader {
        &self.header
    }

    /// Offset of the first entry
    fn entries_offset(&self) -> u64 {
        self.offset
            + RELOC_HEADER_SIZE as u64
            + u64::from(self.header.section_count) * RELOC_SECTION_SIZE as u64
    }

    /// Sections in table order
    pub fn sections(&self) -> NnResult<Vec<NnRelocSection>> {
        (0..u64::from(self.header.section_count))
            .map(|i| {
                read_at(
                    self.data,
                    self.offset + RELOC_HEADER_SIZE as u64 + i * RELOC_SECTION_SIZE as u64,
                )
            })
            .collect()
    }

    /// Entries belonging to section `index`
    pub fn entries(&self, index: usize) -> NnResult<Vec<NnRelocEntry>> {
        let sections = self.sections()?;
        let section = sections
            .get(index)
            .ok_or(NnError::InvalidRelocationSection { section: index })?;
        let first = u64::try_from(section.first_entry_index)
            .map_err(|_| NnError::InvalidRelocationSection { section: index })?;

        let base = self.entries_offset();
        (first..first + u64::from(section.entry_count))
            .map(|i| read_at(self.data, base + i * RELOC_ENTRY_SIZE as u64))
            .collect()
    }

    /// File offsets of every pointer field, with the section each belongs to
    pub fn pointer_offsets(&self) -> NnResult<Vec<(usize, u64)>> {
        let mut offsets = Vec::new();
        for section in 0..self.header.section_count as usize {
            for entry in self.entries(section)? {
                offsets.extend(entry.pointer_offsets().map(|offset| (section, offset)));
            }
        }
        Ok(offsets)
    }
}

/// Rebase every pointer listed in the relocation table by `base`
///
/// Each non-zero field gains `base` plus its section's data offset, and the
/// header's relocated flag is set. Returns the number of fields rebased.
/// Refuses to run twice on the same buffer.
pub fn apply_relocations(data: &mut [u8], base: u64) -> NnResult<usize> {
    let header: NnFileHeader = read_at(data, 0)?;
    if header.is_relocated() {
        return Err(NnError::AlreadyRelocated);
    }

    let table_offset = u64::from(header.relocation_table_offset);
    let (sections, pointers) = {
        let table = NnRelocTable::parse(data, table_offset).map_err(|e| match e {
            NnError::RelocationSelfOffsetMismatch { table, .. } => {
                NnError::RelocationSelfOffsetMismatch {
                    header: header.relocation_table_offset,
                    table,
                }
            }
            other => other,
        })?;
        (table.sections()?, table.pointer_offsets()?)
    };

    // Check every field before writing any, so a failure leaves the buffer untouched
    let mut updates = Vec::with_capacity(pointers.len());
    for (section, offset) in pointers {
        let value = read_u64(data, offset)?;
        if value == 0 {
            continue;
        }
        let rebased = base
            .checked_add(u64::from(sections[section].data_offset))
            .and_then(|shift| value.checked_add(shift))
            .ok_or(NnError::RelocationOverflow { offset })?;
        updates.push((offset, rebased));
    }

    for &(offset, value) in &updates {
        write_u64(data, offset, value)?;
    }
    let rebased = updates.len();

    let flags = header.flags | FLAG_RELOCATED;
    slice_at_mut(data, FLAGS_FIELD_OFFSET, 2)?.copy_from_slice(&flags.to_le_bytes());

    debug!("Relocated {} pointers against base 0x{:X}", rebased, base);
    Ok(rebased)
}

/// Collects pointer fields into a single-section relocation table
#[derive(Debug, Clone, Default)]
pub struct RelocTableBuilder {
    entries: Vec<NnRelocEntry>,
}

impl RelocTableBuilder {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pointer field at file offset `offset`
    pub fn push_pointer(&mut self, offset: u64) -> NnResult<()> {
        let offset = u32::try_from(offset).map_err(|_| NnError::OffsetOutOfRange(offset))?;
        self.entries.push(NnRelocEntry::single(offset));
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pointer has been registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table size in bytes for `entry_count` entries
    pub const fn size_for(entry_count: usize) -> u64 {
        (RELOC_HEADER_SIZE + RELOC_SECTION_SIZE + RELOC_ENTRY_SIZE * entry_count) as u64
    }

    /// Table size in bytes
    pub const fn size(&self) -> u64 {
        Self::size_for(self.entries.len())
    }

    /// Write the table at `offset`; its section covers `0..offset`
    pub fn write(&self, data: &mut [u8], offset: u64) -> NnResult<()> {
        let self_offset = u32::try_from(offset).map_err(|_| NnError::OffsetOutOfRange(offset))?;
        let entry_count = u32::try_from(self.entries.len())
            .map_err(|_| NnError::OffsetOutOfRange(self.entries.len() as u64))?;

        write_at(
            data,
            offset,
            &NnRelocTableHeader {
                identifier: RELOC_MAGIC,
                self_offset,
                section_count: 1,
                reserved: 0,
            },
        )?;
        write_at(
            data,
            offset + RELOC_HEADER_SIZE as u64,
            &NnRelocSection {
                data_address: 0,
                data_offset: 0,
                data_size: self_offset,
                first_entry_index: 0,
                entry_count,
            },
        )?;

        let mut cursor = offset + (RELOC_HEADER_SIZE + RELOC_SECTION_SIZE) as u64;
        for entry in &self.entries {
            write_at(data, cursor, entry)?;
            cursor += RELOC_ENTRY_SIZE as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::nn::header::NnVersion;
    use pretty_assertions::assert_eq;

    /// Header, three pointer slots at 0x20..0x38, relocation table at 0x38
    fn sample() -> Vec<u8> {
        let mut relocs = RelocTableBuilder::new();
        for offset in [0x20, 0x28, 0x30] {
            relocs.push_pointer(offset).expect("small offset");
        }

        let table_offset = 0x38u64;
        let mut data = vec![0u8; (table_offset + relocs.size()) as usize];
        let mut header = NnFileHeader::new(*b"TEST", NnVersion::new(1, 0, 0));
        header.relocation_table_offset = table_offset as u32;
        header.memory_load_size = data.len() as u32;
        write_at(&mut data, 0, &header).expect("fits");

        write_u64(&mut data, 0x20, 0x10).expect("fits");
        write_u64(&mut data, 0x28, 0).expect("fits");
        write_u64(&mut data, 0x30, table_offset).expect("fits");
        relocs.write(&mut data, table_offset).expect("fits");
        data
    }

    #[test]
    fn test_table_layout() {
        let data = sample();
        let table = NnRelocTable::parse(&data, 0x38).expect("valid table");

        assert_eq!(table.header().section_count, 1);
        let sections = table.sections().expect("sections");
        assert_eq!(sections[0].data_size, 0x38);
        assert_eq!(sections[0].entry_count, 3);
        assert_eq!(
            table.pointer_offsets().expect("entries"),
            vec![(0, 0x20), (0, 0x28), (0, 0x30)]
        );
    }

    #[test]
    fn test_apply_rebases_non_zero_pointers() {
        let mut data = sample();
        let rebased = apply_relocations(&mut data, 0x1000).expect("first application");

        assert_eq!(rebased, 2);
        assert_eq!(read_u64(&data, 0x20).expect("fits"), 0x1010);
        assert_eq!(read_u64(&data, 0x28).expect("fits"), 0);
        assert_eq!(read_u64(&data, 0x30).expect("fits"), 0x1038);

        let header: NnFileHeader = read_at(&data, 0).expect("header");
        assert!(header.is_relocated());
    }

    #[test]
    fn test_apply_twice_is_refused() {
        let mut data = sample();
        apply_relocations(&mut data, 0x1000).expect("first application");
        let snapshot = data.clone();

        assert!(matches!(
            apply_relocations(&mut data, 0x1000),
            Err(NnError::AlreadyRelocated)
        ));
        assert_eq!(data, snapshot);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut data = sample();
        assert!(matches!(
            apply_relocations(&mut data, u64::MAX),
            Err(NnError::RelocationOverflow { offset: 0x20 })
        ));
    }

    fn sample_with_pointers(pointers: &[u64]) -> Vec<u8> {
        let mut relocs = RelocTableBuilder::new();
        for &offset in pointers {
            relocs.push_pointer(offset).expect("small offset");
        }

        let table_offset = 0x38u64;
        let mut data = vec![0u8; (table_offset + relocs.size()) as usize];
        let mut header = NnFileHeader::new(*b"TEST", NnVersion::new(1, 0, 0));
        header.relocation_table_offset = table_offset as u32;
        write_at(&mut data, 0, &header).expect("fits");
        write_u64(&mut data, 0x20, 0x10).expect("fits");
        write_u64(&mut data, 0x30, table_offset).expect("fits");
        relocs.write(&mut data, table_offset).expect("fits");
        data
    }

    #[test]
    fn test_failed_apply_leaves_buffer_untouched() {
        // Second pointer lies past the end of the buffer
        let mut data = sample_with_pointers(&[0x20, 0x1000]);
        let snapshot = data.clone();

        assert!(matches!(
            apply_relocations(&mut data, 0x1000),
            Err(NnError::OutOfBounds { offset: 0x1000, .. })
        ));
        assert_eq!(data, snapshot);

        // Only the last field overflows
        let mut data = sample_with_pointers(&[0x20, 0x30]);
        let snapshot = data.clone();
        assert!(matches!(
            apply_relocations(&mut data, u64::MAX - 0x20),
            Err(NnError::RelocationOverflow { offset: 0x30 })
        ));
        assert_eq!(data, snapshot);

        // A later successful run rebases each field exactly once
        let rebased = apply_relocations(&mut data, 0x1000).expect("valid table");
        assert_eq!(rebased, 2);
        assert_eq!(read_u64(&data, 0x20).expect("fits"), 0x1010);
    }

    #[test]
    fn test_self_offset_mismatch() {
        let mut data = sample();
        data[0x38 + 4..0x38 + 8].copy_from_slice(&0x40u32.to_le_bytes());
        assert!(matches!(
            apply_relocations(&mut data, 0),
            Err(NnError::RelocationSelfOffsetMismatch { header: 0x38, table: 0x40 })
        ));
    }

    #[test]
    fn test_strided_entry() {
        let entry = NnRelocEntry {
            offset: 0x100,
            pointer_list_count: 2,
            pointers_per_list: 2,
            inter_list_skip: 1,
        };
        let offsets: Vec<u64> = entry.pointer_offsets().collect();
        assert_eq!(offsets, vec![0x100, 0x108, 0x118, 0x120]);
    }
}
