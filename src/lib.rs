//! Core building blocks of a pure-Rust WebP codec.
//!
//! This crate holds the pieces shared by the lossy and lossless codecs and
//! the animation engine that drives them:
//!
//! - [`bitio`]: the VP8 boolean coder and the VP8L bit packer, reader and
//!   writer for each.
//! - [`sharpyuv`]: RGB to YUV 4:2:0 conversion with iterative chroma
//!   refinement.
//! - [`pool`]: a thread-safe scratch-buffer pool.
//! - [`anim`]: canvas reconstruction for decoding and sub-frame
//!   optimization for encoding animations.
//! - [`mux`]: the container traits the engine talks to, with a RIFF muxer
//!   and demuxer.
//! - [`codec`]: the per-frame encode and decode callbacks.
//!
//! # Features
//!
//! - `parallel` (default): decode animation frames on the rayon thread pool
//!   in [`Animation::decode_frames_parallel`](anim::Animation::decode_frames_parallel).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zenwebp_core::anim::{AnimDecoder, Animation, RgbaImage};
//! use zenwebp_core::BoxError;
//!
//! # fn run(webp: &[u8]) -> Result<(), zenwebp_core::Error> {
//! let decoder = |_bitstream: &[u8], _alpha: Option<&[u8]>| -> Result<RgbaImage, BoxError> {
//!     // hand the bitstream to a VP8/VP8L decoder here
//!     Ok(RgbaImage::new(1, 1))
//! };
//!
//! let mut anim = Animation::decode_bytes(webp)?.with_frame_decoder(Arc::new(decoder));
//! anim.decode_frames_parallel()?;
//! for frame in AnimDecoder::new(&anim) {
//!     let frame = frame?;
//!     println!("{}ms: {}x{}", frame.timestamp_ms, frame.image.width(), frame.image.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Diagnostics go through the [`log`] facade: `debug` for per-call summaries,
//! `trace` for per-frame decisions. Nothing is logged unless the application
//! installs a logger.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod anim;
pub mod bitio;
pub mod codec;
mod error;
pub mod mux;
pub mod pool;
pub mod sharpyuv;

// Slice reader utility (used by the demuxer)
mod slice_reader;

pub use error::{BoxError, Error, Result};

// Re-export the pixel type crate used in the public API
pub use rgb;
