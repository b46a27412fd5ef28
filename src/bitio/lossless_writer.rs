//! VP8L bit writer.
//!
//! Writes bits LSB-first into a 64-bit accumulator and spills it as
//! little-endian 32-bit words.

/// VP8L bit writer - writes bits LSB-first.
#[derive(Debug, Clone, Default)]
pub struct LosslessWriter {
    /// Output buffer.
    buffer: Vec<u8>,
    /// Pending bits, LSB first.
    bits: u64,
    /// Number of pending bits (0-63).
    used: u32,
}

impl LosslessWriter {
    /// Create a new bit writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(cap),
            bits: 0,
            used: 0,
        }
    }

    /// Write the low `n_bits` (at most 32) of `value`.
    #[inline]
    pub fn write_bits(&mut self, value: u32, n_bits: u32) {
        debug_assert!(n_bits <= 32);
        if n_bits == 0 {
            return;
        }
        if self.used >= 32 {
            self.buffer
                .extend_from_slice(&(self.bits as u32).to_le_bytes());
            self.bits >>= 32;
            self.used -= 32;
        }
        let mask = (1u64 << n_bits) - 1;
        self.bits |= (u64::from(value) & mask) << self.used;
        self.used += n_bits;
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(u32::from(bit), 1);
    }

    /// Bytes [`finish`](Self::finish) would return.
    pub fn num_bytes(&self) -> usize {
        self.buffer.len() + self.used.div_ceil(8) as usize
    }

    /// Flush pending bits (zero padded) and return the output.
    pub fn finish(mut self) -> Vec<u8> {
        while self.used >= 32 {
            self.buffer
                .extend_from_slice(&(self.bits as u32).to_le_bytes());
            self.bits >>= 32;
            self.used -= 32;
        }
        while self.used > 0 {
            self.buffer.push(self.bits as u8);
            self.bits >>= 8;
            self.used = self.used.saturating_sub(8);
        }
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::LosslessReader;

    #[test]
    fn test_write_bits() {
        let mut w = LosslessWriter::new();
        // LSB first: 0b101 in bits 0-2, 0b11 in bits 3-4, 0b111 in bits 5-7
        w.write_bits(0b101, 3);
        w.write_bits(0b11, 2);
        w.write_bits(0b111, 3);
        assert_eq!(w.finish(), vec![0xFD]);
    }

    #[test]
    fn test_write_14_bits() {
        let mut w = LosslessWriter::new();
        w.write_bits(1023, 14);
        assert_eq!(w.finish(), vec![0xFF, 0x03]);
    }

    #[test]
    fn test_nibble_scenario() {
        let mut w = LosslessWriter::new();
        w.write_bits(0x05, 4);
        w.write_bits(0x0A, 4);
        w.write_bits(0xFF, 8);
        let data = w.finish();
        assert_eq!(data, vec![0xA5, 0xFF]);
        let mut r = LosslessReader::new(&data);
        assert_eq!(r.read_bits(4), 0x05);
        assert_eq!(r.read_bits(4), 0x0A);
        assert_eq!(r.read_bits(8), 0xFF);
    }

    #[test]
    fn test_extra_high_bits_masked() {
        let mut w = LosslessWriter::new();
        w.write_bits(0xFFFF_FFF1, 4);
        w.write_bits(0, 4);
        assert_eq!(w.finish(), vec![0x01]);
    }

    #[test]
    fn test_word_spill() {
        let mut w = LosslessWriter::new();
        w.write_bits(0xDEAD_BEEF, 32);
        w.write_bits(0x1, 1);
        assert_eq!(w.num_bytes(), 5);
        assert_eq!(w.finish(), vec![0xEF, 0xBE, 0xAD, 0xDE, 0x01]);
    }

    #[test]
    fn test_num_bytes() {
        let mut w = LosslessWriter::new();
        assert_eq!(w.num_bytes(), 0);
        w.write_bits(1, 1);
        assert_eq!(w.num_bytes(), 1);
        w.write_bits(0, 8);
        assert_eq!(w.num_bytes(), 2);
        for _ in 0..10 {
            w.write_bits(0x3FF, 10);
        }
        let expected = w.num_bytes();
        assert_eq!(w.finish().len(), expected);
    }
}
