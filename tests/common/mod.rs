//! Shared fakes for the integration tests.
//!
//! The fake codec writes a real VP8 or VP8L header followed by the raw RGBA
//! pixels, so the container layer sees well-formed bitstreams and decoding
//! is exact.

#![allow(dead_code)]

use std::sync::Arc;

use zenwebp_core::anim::RgbaImage;
use zenwebp_core::bitio::{LosslessReader, LosslessWriter};
use zenwebp_core::codec::{FrameDecoder, FrameEncoder, SimpleEncoder};
use zenwebp_core::rgb::RGBA8;
use zenwebp_core::BoxError;

pub const RED: RGBA8 = RGBA8 {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};
pub const BLUE: RGBA8 = RGBA8 {
    r: 0,
    g: 0,
    b: 255,
    a: 255,
};
pub const TRANSPARENT: RGBA8 = RGBA8 {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

const VP8L_HEADER_LEN: usize = 5;
const VP8_HEADER_LEN: usize = 10;

/// Install a test logger once. Controlled by `RUST_LOG`.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn solid(width: u32, height: u32, color: RGBA8) -> RgbaImage {
    RgbaImage::filled(width, height, color)
}

fn has_alpha(img: &RgbaImage) -> bool {
    img.pixels().iter().any(|p| p.a != 255)
}

/// VP8L signature and header, then the pixels.
pub fn vp8l_frame(img: &RgbaImage) -> Vec<u8> {
    let mut w = LosslessWriter::new();
    w.write_bits(0x2f, 8);
    w.write_bits(img.width() - 1, 14);
    w.write_bits(img.height() - 1, 14);
    w.write_bit(has_alpha(img));
    w.write_bits(0, 3);
    let mut out = w.finish();
    out.extend_from_slice(img.as_bytes());
    out
}

/// VP8 keyframe header, then the pixels.
pub fn vp8_frame(img: &RgbaImage) -> Vec<u8> {
    let mut out = vec![0x10, 0x00, 0x00, 0x9d, 0x01, 0x2a];
    out.extend_from_slice(&(img.width() as u16).to_le_bytes());
    out.extend_from_slice(&(img.height() as u16).to_le_bytes());
    out.extend_from_slice(img.as_bytes());
    out
}

fn decode(bitstream: &[u8]) -> Result<RgbaImage, BoxError> {
    let (width, height, pixels) = if bitstream.first() == Some(&0x2f) {
        let mut r = LosslessReader::new(bitstream);
        r.read_bits(8);
        let w = r.read_bits(14) + 1;
        let h = r.read_bits(14) + 1;
        (w, h, bitstream.get(VP8L_HEADER_LEN..))
    } else {
        if bitstream.len() < VP8_HEADER_LEN {
            return Err("truncated VP8 header".into());
        }
        let w = u32::from(u16::from_le_bytes([bitstream[6], bitstream[7]]) & 0x3fff);
        let h = u32::from(u16::from_le_bytes([bitstream[8], bitstream[9]]) & 0x3fff);
        (w, h, bitstream.get(VP8_HEADER_LEN..))
    };
    let pixels = pixels.ok_or("missing pixel data")?;
    Ok(RgbaImage::from_raw(width, height, pixels.to_vec())?)
}

/// Encoder emitting [`vp8l_frame`] when lossless and [`vp8_frame`] otherwise.
pub fn fake_encoder() -> Arc<dyn FrameEncoder> {
    Arc::new(
        |img: &RgbaImage, lossless: bool, _quality: u8| -> Result<Vec<u8>, BoxError> {
            Ok(if lossless {
                vp8l_frame(img)
            } else {
                vp8_frame(img)
            })
        },
    )
}

/// Decoder for the output of [`fake_encoder`].
pub fn fake_decoder() -> Arc<dyn FrameDecoder> {
    Arc::new(
        |bitstream: &[u8], _alpha: Option<&[u8]>| -> Result<RgbaImage, BoxError> {
            decode(bitstream)
        },
    )
}

/// Still-image encoder producing a fixed, tiny RIFF file.
pub fn tiny_still_encoder() -> Arc<dyn SimpleEncoder> {
    Arc::new(
        |_img: &RgbaImage, _lossless: bool, _quality: f32| -> Result<Vec<u8>, BoxError> {
            Ok(b"RIFF\x04\x00\x00\x00WEBP".to_vec())
        },
    )
}
