//! Little-endian, alignment-free primitive codec.
//!
//! Every multi-byte integer and float on disk is little-endian regardless
//! of host endianness (spec §4.1). Decoders never read past a
//! caller-supplied length; they return `None` instead of panicking on a
//! truncated buffer so callers can turn that into [`crate::error::Error::Corrupt`]
//! or [`crate::error::Error::InvalidBlob`] with the right context.

/// Reads a little-endian `u16` at `offset`, or `None` if out of bounds.
#[must_use]
pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

/// Reads a little-endian `u32` at `offset`, or `None` if out of bounds.
#[must_use]
pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Reads a little-endian `u64` at `offset`, or `None` if out of bounds.
#[must_use]
pub fn read_u64(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Reads a little-endian `f32` (bit-cast `u32`) at `offset`, or `None` if
/// out of bounds.
#[must_use]
pub fn read_f32(buf: &[u8], offset: usize) -> Option<f32> {
    read_u32(buf, offset).map(f32::from_bits)
}

/// Writes a little-endian `u16` at `offset`. Panics if `offset + 2 > buf.len()`,
/// which indicates a programming error in the caller (block layout is
/// always pre-sized).
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Writes a little-endian `u32` at `offset`.
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Writes a little-endian `u64` at `offset`.
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Writes a little-endian `f32` at `offset`.
pub fn write_f32(buf: &mut [u8], offset: usize, value: f32) {
    write_u32(buf, offset, value.to_bits());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_widths() {
        let mut buf = vec![0u8; 32];
        write_u16(&mut buf, 0, 0xABCD);
        write_u32(&mut buf, 2, 0xDEAD_BEEF);
        write_u64(&mut buf, 6, 0x0123_4567_89AB_CDEF);
        write_f32(&mut buf, 14, 3.5);

        assert_eq!(read_u16(&buf, 0), Some(0xABCD));
        assert_eq!(read_u32(&buf, 2), Some(0xDEAD_BEEF));
        assert_eq!(read_u64(&buf, 6), Some(0x0123_4567_89AB_CDEF));
        assert_eq!(read_f32(&buf, 14), Some(3.5));
    }

    #[test]
    fn reads_are_little_endian_on_any_host() {
        let buf = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(read_u32(&buf, 0), Some(1));
    }

    #[test]
    fn out_of_bounds_reads_return_none() {
        let buf = [0u8; 3];
        assert_eq!(read_u32(&buf, 0), None);
        assert_eq!(read_u16(&buf, 2), None);
        assert_eq!(read_u64(&buf, 0), None);
    }
}
