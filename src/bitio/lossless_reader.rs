//! VP8L bit reader.
//!
//! Reads bits LSB-first from a 64-bit little-endian window. Running out of
//! input sets a sticky end-of-stream flag instead of failing.

use byteorder_lite::{ByteOrder, LittleEndian};

/// Maximum bits a single [`LosslessReader::read_bits`] call may return.
pub const MAX_READ_BITS: u32 = 24;

/// Bit width of the look-ahead window.
const LBITS: u32 = 64;

/// VP8L bit reader borrowing its input.
#[derive(Debug, Clone)]
pub struct LosslessReader<'a> {
    data: &'a [u8],
    val: u64,
    pos: usize,
    bit_pos: u32,
    eos: bool,
}

impl<'a> LosslessReader<'a> {
    /// Create a reader, loading up to eight bytes into the window.
    pub fn new(data: &'a [u8]) -> Self {
        let n = data.len().min(8);
        let val = data[..n]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        Self {
            data,
            val,
            pos: n,
            bit_pos: 0,
            eos: false,
        }
    }

    fn is_end_of_stream_now(&self) -> bool {
        self.eos || (self.pos == self.data.len() && self.bit_pos > LBITS)
    }

    fn set_end_of_stream(&mut self) {
        self.eos = true;
        self.bit_pos = 0;
    }

    fn shift_bytes(&mut self) {
        while self.bit_pos >= 8 && self.pos < self.data.len() {
            self.val >>= 8;
            self.val |= u64::from(self.data[self.pos]) << (LBITS - 8);
            self.pos += 1;
            self.bit_pos -= 8;
        }
        if self.is_end_of_stream_now() {
            self.set_end_of_stream();
        }
    }

    /// Read `n_bits` (at most 24). Larger requests mark end of stream and
    /// return 0.
    #[inline]
    pub fn read_bits(&mut self, n_bits: u32) -> u32 {
        if !self.eos && n_bits <= MAX_READ_BITS {
            let mask = (1u32 << n_bits) - 1;
            let v = self.prefetch_bits() & mask;
            self.bit_pos += n_bits;
            self.shift_bytes();
            v
        } else {
            self.set_end_of_stream();
            0
        }
    }

    /// Peek at the next 32 bits without consuming them.
    #[inline]
    pub fn prefetch_bits(&self) -> u32 {
        (self.val >> (self.bit_pos & (LBITS - 1))) as u32
    }

    /// Consume bits previously inspected with [`prefetch_bits`](Self::prefetch_bits).
    #[inline]
    pub fn set_bit_pos(&mut self, bit_pos: u32) {
        self.bit_pos = bit_pos;
    }

    /// Bits consumed from the current window.
    #[inline]
    pub fn bit_pos(&self) -> u32 {
        self.bit_pos
    }

    /// Refill the window once at least 32 bits have been consumed.
    #[inline]
    pub fn fill_bit_window(&mut self) {
        if self.bit_pos >= 32 {
            self.do_fill_bit_window();
        }
    }

    fn do_fill_bit_window(&mut self) {
        if self.pos + 4 <= self.data.len() {
            self.val >>= 32;
            self.bit_pos -= 32;
            self.val |= u64::from(LittleEndian::read_u32(&self.data[self.pos..])) << 32;
            self.pos += 4;
            return;
        }
        self.shift_bytes();
    }

    /// True once a read went past the end of the data.
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        self.eos
    }
}
