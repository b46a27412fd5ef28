//! Codec capabilities plugged into the animation engine.
//!
//! The engine never runs VP8 or VP8L kernels itself. Per-frame encoding and
//! decoding are delegated to these traits, attached to an
//! [`Animation`](crate::anim::Animation) or
//! [`AnimEncoder`](crate::anim::AnimEncoder) at construction time.
//!
//! Closures with the matching signature implement each trait, so a decoder
//! can be attached as
//!
//! ```rust
//! use std::sync::Arc;
//! use zenwebp_core::anim::{Animation, RgbaImage};
//! use zenwebp_core::codec::FrameDecoder;
//! use zenwebp_core::BoxError;
//!
//! let decoder = |_bitstream: &[u8], _alpha: Option<&[u8]>| -> Result<RgbaImage, BoxError> {
//!     Ok(RgbaImage::new(1, 1))
//! };
//! let anim = Animation::new(1, 1).with_frame_decoder(Arc::new(decoder));
//! # let _ = anim;
//! ```

use crate::anim::RgbaImage;
use crate::error::BoxError;

/// Decodes one frame bitstream into non-premultiplied RGBA.
pub trait FrameDecoder: Send + Sync {
    /// Decode a VP8 or VP8L bitstream with its optional ALPH payload.
    fn decode_frame(&self, bitstream: &[u8], alpha: Option<&[u8]>)
        -> Result<RgbaImage, BoxError>;
}

/// Encodes one frame into a raw VP8 or VP8L bitstream.
///
/// Lossy output with transparency may be prefixed with a complete `ALPH`
/// chunk; the muxer splits it off.
pub trait FrameEncoder: Send + Sync {
    /// Encode `image`. `quality` is in `0..=100`.
    fn encode_frame(
        &self,
        image: &RgbaImage,
        lossless: bool,
        quality: u8,
    ) -> Result<Vec<u8>, BoxError>;
}

/// Encodes a still image into a complete WebP file.
///
/// Used to check whether a one-frame animation is smaller as a still image.
pub trait SimpleEncoder: Send + Sync {
    /// Encode `image` as a full RIFF/WEBP byte sequence.
    fn encode_simple(
        &self,
        image: &RgbaImage,
        lossless: bool,
        quality: f32,
    ) -> Result<Vec<u8>, BoxError>;
}

impl<F> FrameDecoder for F
where
    F: Fn(&[u8], Option<&[u8]>) -> Result<RgbaImage, BoxError> + Send + Sync,
{
    fn decode_frame(
        &self,
        bitstream: &[u8],
        alpha: Option<&[u8]>,
    ) -> Result<RgbaImage, BoxError> {
        self(bitstream, alpha)
    }
}

impl<F> FrameEncoder for F
where
    F: Fn(&RgbaImage, bool, u8) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn encode_frame(
        &self,
        image: &RgbaImage,
        lossless: bool,
        quality: u8,
    ) -> Result<Vec<u8>, BoxError> {
        self(image, lossless, quality)
    }
}

impl<F> SimpleEncoder for F
where
    F: Fn(&RgbaImage, bool, f32) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn encode_simple(
        &self,
        image: &RgbaImage,
        lossless: bool,
        quality: f32,
    ) -> Result<Vec<u8>, BoxError> {
        self(image, lossless, quality)
    }
}
