//! On-disk name dictionary
//!
//! The dictionary is a [`FlatPtrie`] written as an array of fixed-size nodes.
//! Slot 0 is the sentinel; every other slot stores the bit it tests, two child
//! slots and a pointer to its name in the string pool.

use crate::nn::error::{NnError, NnResult};
use crate::nn::record::{NnRecord, read_at, slice_at, write_at};
use crate::nn::string::NnString;
use crate::ptrie::{FlatNode, FlatPtrie, NPOS, key_bit};
use binrw::{BinRead, BinWrite};

/// Dictionary block identifier
pub const DIC_MAGIC: [u8; 4] = *b"_DIC";
/// Size of [`NnDicHeader`] in bytes
pub const DIC_HEADER_SIZE: usize = 0x08;
/// Size of [`NnDicNode`] in bytes
pub const DIC_NODE_SIZE: usize = 0x10;
/// Offset of the name pointer inside [`NnDicNode`]
pub const NAME_PTR_FIELD_OFFSET: u64 = 0x08;
/// Stored bit position of leaves and the sentinel
pub const DIC_NPOS: i32 = -1;

/// Dictionary header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnDicHeader {
    /// Identifier, `_DIC`
    pub identifier: [u8; 4],
    /// Nodes following the sentinel
    pub node_count: i32,
}

impl NnRecord for NnDicHeader {
    const SIZE: usize = DIC_HEADER_SIZE;
}

/// Dictionary node (0x10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnDicNode {
    /// Tested bit position, [`DIC_NPOS`] for leaves and the sentinel
    pub ref_bit_pos: i32,
    /// Slot followed when the tested bit is clear
    pub left: u16,
    /// Slot followed when the tested bit is set
    pub right: u16,
    /// Offset of the node's name string
    pub name_ptr: u64,
}

impl NnRecord for NnDicNode {
    const SIZE: usize = DIC_NODE_SIZE;
}

impl NnDicNode {
    /// Bit position in trie terms; negative positions are leaves
    pub fn ref_bit(&self) -> u64 {
        u64::try_from(self.ref_bit_pos).unwrap_or(NPOS)
    }
}

/// Bytes occupied by a dictionary with `node_count` nodes plus the sentinel
pub const fn dictionary_size(node_count: usize) -> u64 {
    (DIC_HEADER_SIZE + DIC_NODE_SIZE * (node_count + 1)) as u64
}

/// Offset of the name pointer of `slot` in a dictionary at `offset`
pub const fn name_ptr_offset(offset: u64, slot: usize) -> u64 {
    offset + DIC_HEADER_SIZE as u64 + (DIC_NODE_SIZE * slot) as u64 + NAME_PTR_FIELD_OFFSET
}

/// Write `flat` as a dictionary at `offset`
///
/// `name_ptr` supplies the name pointer stored in each slot.
pub fn write_dictionary<F>(
    data: &mut [u8],
    offset: u64,
    flat: &FlatPtrie,
    mut name_ptr: F,
) -> NnResult<()>
where
    F: FnMut(usize, &FlatNode) -> u64,
{
    let node_count = flat.node_count();
    let count = i32::try_from(node_count)
        .ok()
        .filter(|_| u16::try_from(node_count).is_ok())
        .ok_or(NnError::DictionaryTooLarge(node_count))?;

    write_at(
        data,
        offset,
        &NnDicHeader {
            identifier: DIC_MAGIC,
            node_count: count,
        },
    )?;

    let slot_index =
        |index: usize| u16::try_from(index).map_err(|_| NnError::DictionaryTooLarge(node_count));

    for (slot, node) in flat.nodes().iter().enumerate() {
        let ref_bit_pos = if node.ref_bit == NPOS {
            DIC_NPOS
        } else {
            i32::try_from(node.ref_bit).map_err(|_| NnError::RefBitOutOfRange(node.ref_bit))?
        };
        let record = NnDicNode {
            ref_bit_pos,
            left: slot_index(node.left_index)?,
            right: slot_index(node.right_index)?,
            name_ptr: name_ptr(slot, node),
        };
        let at = offset + DIC_HEADER_SIZE as u64 + (DIC_NODE_SIZE * slot) as u64;
        write_at(data, at, &record)?;
    }
    Ok(())
}

/// Borrowed view of a dictionary inside a buffer
#[derive(Debug, Clone, Copy)]
pub struct NnDic<'a> {
    data: &'a [u8],
    offset: u64,
    node_count: usize,
}

impl<'a> NnDic<'a> {
    /// Parse the dictionary at `offset`
    pub fn parse(data: &'a [u8], offset: u64) -> NnResult<Self> {
        let header: NnDicHeader = read_at(data, offset)?;
        if header.identifier != DIC_MAGIC {
            return Err(NnError::InvalidMagic {
                expected: DIC_MAGIC,
                actual: header.identifier,
            });
        }
        let node_count = usize::try_from(header.node_count)
            .map_err(|_| NnError::InvalidNodeCount(header.node_count))?;

        // All nodes must be addressable before any lookup
        let size = dictionary_size(node_count);
        slice_at(data, offset, size as usize)?;

        Ok(Self {
            data,
            offset,
            node_count,
        })
    }

    /// Offset of the dictionary header
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Nodes excluding the sentinel
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Node stored in `slot`
    pub fn node(&self, slot: usize) -> NnResult<NnDicNode> {
        if slot > self.node_count {
            return Err(NnError::OutOfBounds {
                offset: self.offset,
                len: DIC_NODE_SIZE * (slot + 1),
                size: DIC_NODE_SIZE * (self.node_count + 1),
            });
        }
        read_at(
            self.data,
            self.offset + DIC_HEADER_SIZE as u64 + (DIC_NODE_SIZE * slot) as u64,
        )
    }

    /// Name of the node in `slot`
    pub fn node_name(&self, slot: usize) -> NnResult<NnString<'a>> {
        let node = self.node(slot)?;
        NnString::read(self.data, node.name_ptr)
    }

    /// Find the slot whose name equals `key`
    ///
    /// Descends like [`FlatPtrie::search`], comparing the stored signed bit
    /// positions. Out-of-range links and unreadable names are misses.
    pub fn find(&self, key: impl AsRef<[u8]>) -> Option<usize> {
        let key = key.as_ref();
        let mut index = usize::from(self.node(0).ok()?.left);

        loop {
            let prev = self.node(index).ok()?;
            index = usize::from(if key_bit(key, prev.ref_bit()) {
                prev.right
            } else {
                prev.left
            });

            if index == 0 {
                return None;
            }
            if self.node(index).ok()?.ref_bit_pos <= prev.ref_bit_pos {
                break;
            }
        }

        let name = self.node_name(index).ok()?;
        (name.as_bytes() == key).then_some(index)
    }

    /// Find the asset index of `key`: its slot minus the sentinel
    pub fn find_index(&self, key: impl AsRef<[u8]>) -> Option<usize> {
        self.find(key).map(Self::node_index)
    }

    /// Convert a dictionary slot to the index of the entry it names
    pub const fn node_index(slot: usize) -> usize {
        slot.saturating_sub(1)
    }
}
