//! Little-endian append helpers for building RIFF containers in memory.

/// Extension trait for writing little-endian values into a `Vec<u8>`.
pub(crate) trait VecWriter {
    /// Append a slice to the buffer.
    fn write_all(&mut self, data: &[u8]);

    /// Write a u8.
    fn write_u8(&mut self, v: u8);

    /// Write a u16 in little-endian.
    fn write_u16_le(&mut self, v: u16);

    /// Write a u24 (3 bytes) in little-endian.
    fn write_u24_le(&mut self, v: u32);

    /// Write a u32 in little-endian.
    fn write_u32_le(&mut self, v: u32);

    /// Write a complete chunk: fourcc, payload size, payload and a zero pad
    /// byte when the payload length is odd.
    fn write_chunk(&mut self, fourcc: &[u8; 4], data: &[u8]);
}

impl VecWriter for Vec<u8> {
    #[inline]
    fn write_all(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }

    #[inline]
    fn write_u8(&mut self, v: u8) {
        self.push(v);
    }

    #[inline]
    fn write_u16_le(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn write_u24_le(&mut self, v: u32) {
        let bytes = v.to_le_bytes();
        self.extend_from_slice(&bytes[..3]);
    }

    #[inline]
    fn write_u32_le(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn write_chunk(&mut self, fourcc: &[u8; 4], data: &[u8]) {
        self.write_all(fourcc);
        self.write_u32_le(data.len() as u32);
        self.write_all(data);
        if data.len() % 2 == 1 {
            self.push(0);
        }
    }
}

/// Total on-disk size of a chunk with `payload` bytes: header plus padding.
#[inline]
pub(crate) const fn chunk_size(payload: usize) -> u32 {
    (8 + payload + (payload & 1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_chunk_pads_odd_payload() {
        let mut buf = Vec::new();
        buf.write_chunk(b"TEST", &[1, 2, 3]);
        assert_eq!(buf, [b'T', b'E', b'S', b'T', 3, 0, 0, 0, 1, 2, 3, 0]);
        assert_eq!(chunk_size(3), buf.len() as u32);
    }

    #[test]
    fn test_write_chunk_even_payload() {
        let mut buf = Vec::new();
        buf.write_chunk(b"EVEN", &[9, 9]);
        assert_eq!(buf.len(), 10);
        assert_eq!(chunk_size(2), 10);
    }

    #[test]
    fn test_u24() {
        let mut buf = Vec::new();
        buf.write_u24_le(0x00ABCDEF);
        assert_eq!(buf, [0xEF, 0xCD, 0xAB]);
    }
}
