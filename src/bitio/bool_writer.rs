//! VP8 boolean arithmetic encoder.
//!
//! The exact inverse of [`BoolReader`](super::BoolReader): bytes written
//! here decode to the same symbols when read back with matching
//! probabilities. Carries out of the low register are propagated through a
//! run of pending `0xFF` bytes, which is only materialized once the next
//! non-`0xFF` byte settles it.

use super::tables::{NEW_RANGE, NORM};

/// VP8 boolean encoder producing an owned byte buffer.
#[derive(Debug, Clone)]
pub struct BoolWriter {
    /// Range minus one.
    range: i32,
    value: i32,
    /// Number of pending 0xFF bytes.
    run: usize,
    nb_bits: i32,
    buf: Vec<u8>,
}

impl Default for BoolWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BoolWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty writer with a pre-allocated output buffer.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            range: 255 - 1,
            value: 0,
            run: 0,
            nb_bits: -8,
            buf: Vec::with_capacity(cap),
        }
    }

    fn flush(&mut self) {
        let s = 8 + self.nb_bits;
        let bits = self.value >> s;
        self.value -= bits << s;
        self.nb_bits -= 8;
        if bits & 0xff != 0xff {
            if bits & 0x100 != 0 {
                if let Some(last) = self.buf.last_mut() {
                    *last = last.wrapping_add(1);
                }
            }
            let fill = if bits & 0x100 != 0 { 0x00 } else { 0xff };
            self.buf.extend(std::iter::repeat(fill).take(self.run));
            self.run = 0;
            self.buf.push((bits & 0xff) as u8);
        } else {
            self.run += 1;
        }
    }

    /// Encode `bit` with a zero-probability of `prob / 256`. Returns `bit`.
    #[inline]
    pub fn put_bit(&mut self, bit: bool, prob: u8) -> bool {
        let split = (self.range * i32::from(prob)) >> 8;
        if bit {
            self.value += split + 1;
            self.range -= split + 1;
        } else {
            self.range = split;
        }
        if self.range < 127 {
            let r = self.range as usize;
            let shift = i32::from(NORM[r]);
            self.range = i32::from(NEW_RANGE[r]);
            self.value <<= shift;
            self.nb_bits += shift;
            if self.nb_bits > 0 {
                self.flush();
            }
        }
        bit
    }

    /// Encode `bit` with probability one half.
    #[inline]
    pub fn put_bit_uniform(&mut self, bit: bool) -> bool {
        let split = self.range >> 1;
        if bit {
            self.value += split + 1;
            self.range -= split + 1;
        } else {
            self.range = split;
        }
        if self.range < 127 {
            self.range = i32::from(NEW_RANGE[self.range as usize]);
            self.value <<= 1;
            self.nb_bits += 1;
            if self.nb_bits > 0 {
                self.flush();
            }
        }
        bit
    }

    /// Encode a sequence of `(bit, prob)` pairs.
    ///
    /// Equivalent to calling [`put_bit`](Self::put_bit) for each pair, with
    /// the coder registers held in locals between flushes.
    pub fn put_bit_batch(&mut self, bits: &[(bool, u8)]) {
        let mut range = self.range;
        let mut value = self.value;
        let mut nb_bits = self.nb_bits;
        for &(bit, prob) in bits {
            let split = (range * i32::from(prob)) >> 8;
            if bit {
                value += split + 1;
                range -= split + 1;
            } else {
                range = split;
            }
            if range < 127 {
                let r = range as usize;
                let shift = i32::from(NORM[r]);
                range = i32::from(NEW_RANGE[r]);
                value <<= shift;
                nb_bits += shift;
                if nb_bits > 0 {
                    self.range = range;
                    self.value = value;
                    self.nb_bits = nb_bits;
                    self.flush();
                    value = self.value;
                    nb_bits = self.nb_bits;
                }
            }
        }
        self.range = range;
        self.value = value;
        self.nb_bits = nb_bits;
    }

    /// Write the low `n` bits of `value`, MSB first, at probability one half.
    pub fn put_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        for i in (0..n).rev() {
            self.put_bit_uniform((value >> i) & 1 != 0);
        }
    }

    /// Write a presence flag, then magnitude and sign when non-zero.
    pub fn put_signed_bits(&mut self, value: i32, n: u32) {
        if !self.put_bit_uniform(value != 0) {
            return;
        }
        let magnitude = value.unsigned_abs();
        let sign = u32::from(value < 0);
        self.put_bits((magnitude << 1) | sign, n + 1);
    }

    /// Bytes emitted so far, not counting the pending `0xFF` run.
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    /// Rough output size including pending bits.
    pub fn size_estimate(&self) -> usize {
        self.buf.len() + self.run + ((self.nb_bits + 8 + 7) >> 3).max(0) as usize
    }

    /// Pad and flush the coder, returning the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.put_bits(0, (9 - self.nb_bits) as u32);
        self.nb_bits = 0;
        self.flush();
        self.buf
    }
}
