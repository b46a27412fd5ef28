//! Position-tracking reader over a byte slice, used by the RIFF parser.

use byteorder_lite::{ByteOrder, LittleEndian};
use core::fmt;

use crate::mux::MuxError;

/// A reader that wraps a byte slice and tracks the current position.
///
/// All reads borrow from the underlying slice; nothing is copied. Reading
/// past the end yields [`MuxError::Truncated`].
#[derive(Clone)]
pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    /// Create a new SliceReader wrapping the given byte slice.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the slice.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes remaining from the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Take a slice of n bytes from the current position and advance position.
    #[inline]
    pub fn take_slice(&mut self, n: usize) -> Result<&'a [u8], MuxError> {
        let end = self.pos.checked_add(n).ok_or(MuxError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(MuxError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    /// Advance by `n` bytes, clamping at the end of the data.
    #[inline]
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }

    /// Read a four-character code.
    #[inline]
    pub fn read_fourcc(&mut self) -> Result<[u8; 4], MuxError> {
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(self.take_slice(4)?);
        Ok(fourcc)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, MuxError> {
        Ok(self.take_slice(1)?[0])
    }

    /// Read a u16 in little-endian byte order.
    #[inline]
    pub fn read_u16_le(&mut self) -> Result<u16, MuxError> {
        Ok(LittleEndian::read_u16(self.take_slice(2)?))
    }

    /// Read a u24 in little-endian byte order (as u32).
    #[inline]
    pub fn read_u24_le(&mut self) -> Result<u32, MuxError> {
        Ok(LittleEndian::read_u24(self.take_slice(3)?))
    }

    /// Read a u32 in little-endian byte order.
    #[inline]
    pub fn read_u32_le(&mut self) -> Result<u32, MuxError> {
        Ok(LittleEndian::read_u32(self.take_slice(4)?))
    }

    /// Read one RIFF chunk: fourcc, size, payload. The padding byte of an
    /// odd-sized chunk is skipped when present.
    pub fn read_chunk(&mut self) -> Result<([u8; 4], &'a [u8]), MuxError> {
        let fourcc = self.read_fourcc()?;
        let size = self.read_u32_le()? as usize;
        let payload = self.take_slice(size)?;
        if size & 1 == 1 {
            self.skip(1);
        }
        Ok((fourcc, payload))
    }
}

impl fmt::Debug for SliceReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReader")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut r = SliceReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16_le().unwrap(), 0x0302);
        assert_eq!(r.read_u24_le().unwrap(), 0x060504);
        assert_eq!(r.read_u32_le().unwrap(), 0x0A090807);
        assert_eq!(r.remaining(), 0);
        assert!(matches!(r.read_u8(), Err(MuxError::Truncated)));
    }

    #[test]
    fn test_read_chunk_skips_padding() {
        let mut data = Vec::new();
        data.extend_from_slice(b"ABCD");
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[7, 8, 9, 0]);
        data.extend_from_slice(b"WXYZ");
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut r = SliceReader::new(&data);
        let (id, payload) = r.read_chunk().unwrap();
        assert_eq!(&id, b"ABCD");
        assert_eq!(payload, &[7, 8, 9]);
        let (id, payload) = r.read_chunk().unwrap();
        assert_eq!(&id, b"WXYZ");
        assert!(payload.is_empty());
        assert!(r.read_chunk().is_err());
    }

    #[test]
    fn test_truncated_chunk() {
        let mut data = Vec::new();
        data.extend_from_slice(b"ABCD");
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0; 10]);
        let mut r = SliceReader::new(&data);
        assert!(matches!(r.read_chunk(), Err(MuxError::Truncated)));
    }
}
