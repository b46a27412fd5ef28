//! Entropy-coder bit I/O.
//!
//! - [`BoolReader`] / [`BoolWriter`]: the VP8 boolean arithmetic coder.
//! - [`LosslessReader`] / [`LosslessWriter`]: the VP8L LSB-first bit packer.
//!
//! Each writer is the exact inverse of its reader.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_core::bitio::{BoolReader, BoolWriter};
//!
//! let mut w = BoolWriter::new();
//! w.put_bit(true, 200);
//! w.put_bits(0x2A, 6);
//! let data = w.finish();
//!
//! let mut r = BoolReader::new(&data);
//! assert!(r.get_bit(200));
//! assert_eq!(r.get_value(6), 0x2A);
//! ```

mod bool_reader;
mod bool_writer;
mod lossless_reader;
mod lossless_writer;
pub mod tables;

pub use bool_reader::BoolReader;
pub use bool_writer::BoolWriter;
pub use lossless_reader::{LosslessReader, MAX_READ_BITS};
pub use lossless_writer::LosslessWriter;
