//! Bounds-checked big-endian field access shared by the decoders.

use crate::error::WireError;

pub(crate) fn array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], WireError> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or(WireError::Truncated {
            needed: offset.saturating_add(N),
            available: bytes.len(),
        })
}

pub(crate) fn be_u8(bytes: &[u8], offset: usize) -> Result<u8, WireError> {
    array::<1>(bytes, offset).map(|[value]| value)
}

pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> Result<u16, WireError> {
    array(bytes, offset).map(u16::from_be_bytes)
}

pub(crate) fn be_u32(bytes: &[u8], offset: usize) -> Result<u32, WireError> {
    array(bytes, offset).map(u32::from_be_bytes)
}

pub(crate) fn be_u64(bytes: &[u8], offset: usize) -> Result<u64, WireError> {
    array(bytes, offset).map(u64::from_be_bytes)
}

/// Returns `bytes[start..end]`, reporting truncation when the range overruns.
pub(crate) fn range(bytes: &[u8], start: usize, end: usize) -> Result<&[u8], WireError> {
    bytes.get(start..end).ok_or(WireError::Truncated {
        needed: end,
        available: bytes.len(),
    })
}

/// Returns everything from `start` onwards; an empty slice when `start`
/// equals the length.
pub(crate) fn tail(bytes: &[u8], start: usize) -> Result<&[u8], WireError> {
    bytes.get(start..).ok_or(WireError::Truncated {
        needed: start,
        available: bytes.len(),
    })
}

pub(crate) const fn align8(len: usize) -> usize {
    len.div_ceil(8) * 8
}

pub(crate) fn pad_to_8(buffer: &mut Vec<u8>, start: usize) {
    let written = buffer.len().saturating_sub(start);
    buffer.resize(start + align8(written), 0);
}

/// Converts a body length into the 16-bit length field carried on the wire.
pub(crate) fn wire_len(len: usize) -> Result<u16, WireError> {
    u16::try_from(len).map_err(|_| WireError::TooLarge { len })
}
