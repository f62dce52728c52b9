//! Chained block headers

use crate::nn::error::NnResult;
use crate::nn::record::{NnRecord, read_at};
use binrw::{BinRead, BinWrite};

/// Size of [`NnBlockHeader`] in bytes
pub const BLOCK_HEADER_SIZE: usize = 0x10;

/// Header opening every block in a relocatable binary (0x10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnBlockHeader {
    /// Block identifier
    pub identifier: [u8; 4],
    /// Offset from this header to the next one, zero for the last block
    pub offset_to_next: u32,
    /// Size of the block in bytes
    pub block_size: u32,
    /// Reserved
    pub reserved: u32,
}

impl NnRecord for NnBlockHeader {
    const SIZE: usize = BLOCK_HEADER_SIZE;
}

impl NnBlockHeader {
    /// Create a terminal block header
    pub const fn new(identifier: [u8; 4], block_size: u32) -> Self {
        Self {
            identifier,
            offset_to_next: 0,
            block_size,
            reserved: 0,
        }
    }

    /// Whether this block is the last in the chain
    pub const fn is_last(&self) -> bool {
        self.offset_to_next == 0
    }
}

/// Iterator over a block chain, yielding each header with its offset
///
/// Next offsets are unsigned and relative, so the chain only moves forward.
/// Iteration stops after the terminal block or after the first error.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    data: &'a [u8],
    next: Option<u64>,
}

impl<'a> Blocks<'a> {
    /// Walk the chain starting at `first`; zero means no chain
    pub fn new(data: &'a [u8], first: u64) -> Self {
        Self {
            data,
            next: (first != 0).then_some(first),
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = NnResult<(u64, NnBlockHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        match read_at::<NnBlockHeader>(self.data, offset) {
            Ok(header) => {
                if !header.is_last() {
                    self.next = offset.checked_add(u64::from(header.offset_to_next));
                }
                Some(Ok((offset, header)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
