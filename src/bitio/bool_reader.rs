// VP8 boolean arithmetic decoder.
//
// - 56-bit look-ahead register on 64-bit targets (7 bytes per load)
// - range stored as range-1, always in [127, 254] between calls
// - table-driven renormalization, plus a leading_zeros variant

use byteorder_lite::{BigEndian, ByteOrder};

use super::tables::{NEW_RANGE, NORM};

/// BITS can be any multiple of 8 from 8 to 56 (inclusive).
#[cfg(target_pointer_width = "64")]
const BITS: i32 = 56;
#[cfg(not(target_pointer_width = "64"))]
const BITS: i32 = 24;

#[cfg(target_pointer_width = "64")]
const BYTES_PER_LOAD: usize = 7;
#[cfg(not(target_pointer_width = "64"))]
const BYTES_PER_LOAD: usize = 3;

/// VP8 boolean decoder borrowing its input.
///
/// Reading past the end of the data never fails: zeros are shifted in and
/// [`is_eof`](Self::is_eof) becomes (and stays) true.
#[derive(Debug, Clone)]
pub struct BoolReader<'a> {
    value: u64,
    /// Range minus one, in [127, 254].
    range: u32,
    /// Number of valid bits left in `value`.
    bits: i32,
    buf: &'a [u8],
    eof: bool,
}

impl<'a> BoolReader<'a> {
    /// Create a reader and prime the value register.
    pub fn new(data: &'a [u8]) -> Self {
        let mut br = Self {
            value: 0,
            range: 255 - 1,
            bits: -8,
            buf: data,
            eof: false,
        };
        br.load_new_bytes();
        br
    }

    #[cold]
    fn load_final_bytes(&mut self) {
        if let Some((&first, rest)) = self.buf.split_first() {
            self.bits += 8;
            self.value = u64::from(first) | (self.value << 8);
            self.buf = rest;
        } else if !self.eof {
            self.value <<= 8;
            self.bits += 8;
            self.eof = true;
        } else {
            // keeps shift amounts in range once the input is gone
            self.bits = 0;
        }
    }

    #[inline(always)]
    fn load_new_bytes(&mut self) {
        if self.buf.len() >= BYTES_PER_LOAD {
            let bits = if self.buf.len() >= 8 {
                BigEndian::read_u64(&self.buf[..8]) >> (64 - BITS)
            } else {
                self.buf[..BYTES_PER_LOAD]
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
            };
            self.value = bits | (self.value << BITS);
            self.bits += BITS;
            self.buf = &self.buf[BYTES_PER_LOAD..];
        } else {
            self.load_final_bytes();
        }
    }

    /// Decode one symbol whose probability of being zero is `prob / 256`.
    #[inline(always)]
    pub fn get_bit(&mut self, prob: u8) -> bool {
        if self.bits < 0 {
            self.load_new_bytes();
        }
        let mut range = self.range;
        let pos = self.bits;
        let split = (range * u32::from(prob)) >> 8;
        let value = (self.value >> pos) as u32;
        let bit = value > split;
        if bit {
            range -= split + 1;
            self.value = self
                .value
                .wrapping_sub((u64::from(split) + 1) << pos);
        } else {
            range = split;
        }
        if range < 0x7f {
            let r = range as usize;
            self.bits -= i32::from(NORM[r]);
            range = u32::from(NEW_RANGE[r]);
        }
        self.range = range;
        bit
    }

    /// Same result as [`get_bit`](Self::get_bit), normalizing with
    /// `leading_zeros` instead of the lookup tables.
    #[inline(always)]
    pub fn get_bit_alt(&mut self, prob: u8) -> bool {
        if self.bits < 0 {
            self.load_new_bytes();
        }
        let mut range = self.range;
        let pos = self.bits;
        let split = (range * u32::from(prob)) >> 8;
        let value = (self.value >> pos) as u32;
        let bit = value > split;
        if bit {
            range -= split;
            self.value = self
                .value
                .wrapping_sub((u64::from(split) + 1) << pos);
        } else {
            range = split + 1;
        }
        let shift = 7 ^ (31 ^ range.leading_zeros() as i32);
        range <<= shift;
        self.bits -= shift;
        self.range = range - 1;
        bit
    }

    /// Read a bit with probability 128.
    #[inline(always)]
    pub fn get_flag(&mut self) -> bool {
        self.get_bit(0x80)
    }

    /// Apply a uniformly coded sign to `v`.
    #[inline(always)]
    pub fn get_signed(&mut self, v: i32) -> i32 {
        if self.bits < 0 {
            self.load_new_bytes();
        }
        let pos = self.bits;
        let split = self.range >> 1;
        let value = (self.value >> pos) as u32;
        // -1 when the coded bit is one
        let mask = (split.wrapping_sub(value) as i32) >> 31;

        self.bits -= 1;
        self.range = self.range.wrapping_add(mask as u32) | 1;
        let term = (u64::from(split) + 1) & u64::from(mask as u32);
        self.value = self.value.wrapping_sub(term << pos);

        (v ^ mask) - mask
    }

    /// Read `n` bits MSB first, each with probability 128.
    #[inline]
    pub fn get_value(&mut self, n: u8) -> u32 {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | u32::from(self.get_flag());
        }
        v
    }

    /// Read an `n`-bit magnitude followed by a sign bit.
    #[inline]
    pub fn get_signed_value(&mut self, n: u8) -> i32 {
        let value = self.get_value(n) as i32;
        if self.get_flag() {
            -value
        } else {
            value
        }
    }

    /// Read a presence flag, then a signed value if present.
    #[inline]
    pub fn get_optional_signed_value(&mut self, n: u8) -> i32 {
        if !self.get_flag() {
            return 0;
        }
        self.get_signed_value(n)
    }

    /// True once the reader has consumed past the end of its input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_range() {
        let br = BoolReader::new(&[0x12, 0x34]);
        assert_eq!(br.range, 254);
        assert!(!br.is_eof());
    }

    #[test]
    fn test_all_zero_data() {
        let data = [0u8; 16];
        let mut br = BoolReader::new(&data);
        for _ in 0..20 {
            assert!(!br.get_flag());
        }
    }

    #[test]
    fn test_all_ones_data() {
        let data = [0xFFu8; 16];
        let mut br = BoolReader::new(&data);
        for _ in 0..20 {
            assert!(br.get_flag());
        }
        assert!(!br.is_eof());
    }

    #[test]
    fn test_get_value_in_range() {
        let data: Vec<u8> = (0..64).map(|i| (i * 37 + 11) as u8).collect();
        let mut br = BoolReader::new(&data);
        for n in 1..=16u8 {
            assert!(br.get_value(n) < (1u32 << n));
        }
    }

    #[test]
    fn test_empty_data_is_eof() {
        let br = BoolReader::new(&[]);
        assert!(br.is_eof());
    }

    #[test]
    fn test_single_byte_reaches_eof() {
        let mut br = BoolReader::new(&[0xA5]);
        assert!(!br.is_eof());
        for _ in 0..64 {
            br.get_flag();
        }
        assert!(br.is_eof());
        // sticky
        br.get_bit(200);
        assert!(br.is_eof());
    }

    #[test]
    fn test_table_and_lzcnt_agree() {
        let data: Vec<u8> = (0..512).map(|i| (i * 13 + 7) as u8).collect();
        let mut a = BoolReader::new(&data);
        let mut b = BoolReader::new(&data);
        let probs = [1u8, 10, 50, 100, 128, 150, 200, 240, 254, 255];
        for i in 0..2000 {
            let p = probs[i % probs.len()];
            assert_eq!(a.get_bit(p), b.get_bit_alt(p), "symbol {i}");
            assert_eq!(a.range, b.range);
            assert_eq!(a.bits, b.bits);
        }
    }
}
