//! Bounds-checked access to fixed-size records inside a buffer

use crate::nn::error::{NnError, NnResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, Endian};
use std::ops::Range;

/// A tightly packed, little-endian on-disk record of fixed size
pub trait NnRecord: for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()> {
    /// Serialized size in bytes
    const SIZE: usize;
}

fn range_at(offset: u64, len: usize, size: usize) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

/// Borrow `len` bytes at `offset`
pub fn slice_at(data: &[u8], offset: u64, len: usize) -> NnResult<&[u8]> {
    match range_at(offset, len, data.len()) {
        Some(range) => Ok(&data[range]),
        None => Err(NnError::OutOfBounds {
            offset,
            len,
            size: data.len(),
        }),
    }
}

/// Mutably borrow `len` bytes at `offset`
pub fn slice_at_mut(data: &mut [u8], offset: u64, len: usize) -> NnResult<&mut [u8]> {
    match range_at(offset, len, data.len()) {
        Some(range) => Ok(&mut data[range]),
        None => Err(NnError::OutOfBounds {
            offset,
            len,
            size: data.len(),
        }),
    }
}

/// Read a record at `offset`
pub fn read_at<T: NnRecord>(data: &[u8], offset: u64) -> NnResult<T> {
    let bytes = slice_at(data, offset, T::SIZE)?;
    Ok(T::read_options(&mut Cursor::new(bytes), Endian::Little, ())?)
}

/// Write a record at `offset`
pub fn write_at<T: NnRecord>(data: &mut [u8], offset: u64, record: &T) -> NnResult<()> {
    let bytes = slice_at_mut(data, offset, T::SIZE)?;
    record.write_options(&mut Cursor::new(bytes), Endian::Little, ())?;
    Ok(())
}

/// Read a little-endian u64 pointer field
pub fn read_u64(data: &[u8], offset: u64) -> NnResult<u64> {
    let bytes = slice_at(data, offset, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

/// Write a little-endian u64 pointer field
pub fn write_u64(data: &mut [u8], offset: u64, value: u64) -> NnResult<()> {
    slice_at_mut(data, offset, 8)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Convert an offset to a 32-bit field
pub fn offset_u32(offset: u64) -> NnResult<u32> {
    u32::try_from(offset).map_err(|_| NnError::OffsetOutOfRange(offset))
}
