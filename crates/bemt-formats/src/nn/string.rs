//! Length-prefixed strings and the string pool block

use crate::nn::block::NnBlockHeader;
use crate::nn::error::{NnError, NnResult};
use crate::nn::record::{NnRecord, align_up, read_at, slice_at, slice_at_mut, write_at};
use binrw::{BinRead, BinWrite};
use std::fmt;

/// String pool block identifier
pub const STRING_POOL_MAGIC: [u8; 4] = *b"_STR";
/// Size of [`NnStringPoolHeader`] in bytes
pub const STRING_POOL_HEADER_SIZE: usize = 0x14;

/// Bytes occupied by a string record holding `len` bytes
pub const fn string_record_size(len: usize) -> u64 {
    align_up(2 + len as u64 + 1, 2)
}

/// A string record: u16 length, bytes, NUL terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NnString<'a> {
    offset: u64,
    bytes: &'a [u8],
}

impl<'a> NnString<'a> {
    /// Read the string record at `offset`
    pub fn read(data: &'a [u8], offset: u64) -> NnResult<Self> {
        let prefix = slice_at(data, offset, 2)?;
        let len = usize::from(u16::from_le_bytes([prefix[0], prefix[1]]));
        let bytes = slice_at(data, offset + 2, len)?;
        Ok(Self { offset, bytes })
    }

    /// Offset of the length prefix
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Raw string bytes, without the terminator
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The string as UTF-8
    pub fn to_str(&self) -> NnResult<&'a str> {
        std::str::from_utf8(self.bytes).map_err(|_| NnError::InvalidString {
            offset: self.offset,
        })
    }

    /// Whether the string is empty
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for NnString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.bytes))
    }
}

/// Header of the string pool block (0x14 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct NnStringPoolHeader {
    /// Block header, identifier `_STR`
    pub block: NnBlockHeader,
    /// Number of strings, not counting the leading empty string
    pub string_count: u32,
}

impl NnRecord for NnStringPoolHeader {
    const SIZE: usize = STRING_POOL_HEADER_SIZE;
}

impl NnStringPoolHeader {
    /// Read a pool header and check its identifier
    pub fn read(data: &[u8], offset: u64) -> NnResult<Self> {
        let header: Self = read_at(data, offset)?;
        if header.block.identifier != STRING_POOL_MAGIC {
            return Err(NnError::InvalidMagic {
                expected: STRING_POOL_MAGIC,
                actual: header.block.identifier,
            });
        }
        Ok(header)
    }
}

/// Accumulates strings for a pool block
///
/// The pool always starts with the empty string, which unnamed records
/// point at.
#[derive(Debug, Clone)]
pub struct StringPoolBuilder {
    strings: Vec<Vec<u8>>,
    size: u64,
}

impl Default for StringPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPoolBuilder {
    /// Offset of the empty string relative to the pool start
    pub const EMPTY_STRING_OFFSET: u64 = STRING_POOL_HEADER_SIZE as u64;

    /// Create a pool holding only the empty string
    pub fn new() -> Self {
        Self {
            strings: vec![Vec::new()],
            size: Self::EMPTY_STRING_OFFSET + string_record_size(0),
        }
    }

    /// Append a string, returning its offset relative to the pool start
    pub fn push(&mut self, value: impl AsRef<[u8]>) -> NnResult<u64> {
        let value = value.as_ref();
        if u16::try_from(value.len()).is_err() {
            return Err(NnError::StringTooLong(value.len()));
        }
        let offset = self.size;
        self.size += string_record_size(value.len());
        self.strings.push(value.to_vec());
        Ok(offset)
    }

    /// Strings written, not counting the empty string
    pub fn len(&self) -> usize {
        self.strings.len() - 1
    }

    /// Whether only the empty string is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total block size in bytes
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Write the pool block at `offset`
    ///
    /// `offset_to_next` is left at zero; callers chaining further blocks
    /// patch it afterwards.
    pub fn write(&self, data: &mut [u8], offset: u64) -> NnResult<()> {
        let size = u32::try_from(self.size).map_err(|_| NnError::OffsetOutOfRange(self.size))?;
        let count =
            u32::try_from(self.len()).map_err(|_| NnError::OffsetOutOfRange(self.len() as u64))?;
        let header = NnStringPoolHeader {
            block: NnBlockHeader::new(STRING_POOL_MAGIC, size),
            string_count: count,
        };
        write_at(data, offset, &header)?;

        let mut cursor = offset + Self::EMPTY_STRING_OFFSET;
        for value in &self.strings {
            let record_size = string_record_size(value.len());
            let record = slice_at_mut(data, cursor, record_size as usize)?;
            // Length checked in push
            let len = value.len() as u16;
            record[..2].copy_from_slice(&len.to_le_bytes());
            record[2..2 + value.len()].copy_from_slice(value);
            record[2 + value.len()..].fill(0);
            cursor += record_size;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_sizes() {
        assert_eq!(string_record_size(0), 4);
        assert_eq!(string_record_size(1), 4);
        assert_eq!(string_record_size(2), 6);
        assert_eq!(string_record_size(5), 8);
    }

    #[test]
    fn test_pool_layout() {
        let mut pool = StringPoolBuilder::new();
        let a = pool.push("A").expect("short string");
        let name = pool.push("archive").expect("short string");
        assert_eq!(a, 0x18);
        assert_eq!(name, 0x1C);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.size(), 0x1C + 10);

        let mut data = vec![0xAAu8; 0x08 + pool.size() as usize];
        pool.write(&mut data, 0x08).expect("pool fits");

        let header = NnStringPoolHeader::read(&data, 0x08).expect("valid pool");
        assert_eq!(header.string_count, 2);
        assert_eq!(u64::from(header.block.block_size), pool.size());
        assert!(header.block.is_last());

        let empty = NnString::read(&data, 0x08 + StringPoolBuilder::EMPTY_STRING_OFFSET)
            .expect("empty string");
        assert!(empty.is_empty());

        let a = NnString::read(&data, 0x08 + a).expect("string A");
        assert_eq!(a.to_str().expect("utf-8"), "A");
        // NUL terminator and padding
        assert_eq!(&data[0x08 + 0x18 + 3..0x08 + 0x18 + 4], &[0]);

        let name = NnString::read(&data, 0x08 + name).expect("archive name");
        assert_eq!(name.to_string(), "archive");
        assert_eq!(data[0x08 + 0x1C + 2 + 7], 0);
    }

    #[test]
    fn test_rejects_long_strings() {
        let mut pool = StringPoolBuilder::new();
        let long = vec![b'x'; 0x1_0000];
        assert!(matches!(pool.push(&long), Err(NnError::StringTooLong(0x1_0000))));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_invalid_strings() {
        let data = [2u8, 0, 0xFF, 0xFE, 0];
        let string = NnString::read(&data, 0).expect("in bounds");
        assert!(matches!(string.to_str(), Err(NnError::InvalidString { offset: 0 })));

        let truncated = [9u8, 0, b'a'];
        assert!(matches!(
            NnString::read(&truncated, 0),
            Err(NnError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_wrong_pool_magic() {
        let mut data = vec![0u8; STRING_POOL_HEADER_SIZE];
        data[..4].copy_from_slice(b"_DIC");
        assert!(matches!(
            NnStringPoolHeader::read(&data, 0),
            Err(NnError::InvalidMagic { .. })
        ));
    }
}
