//! Zero-copy WebP demuxer.
//!
//! Parses a WebP file at the chunk level, exposing frame metadata and raw
//! bitstream data without decoding pixels.
//!
//! # Example
//!
//! ```rust,no_run
//! use zenwebp_core::mux::{Demuxer, WebPDemuxer};
//!
//! let data: &[u8] = &[]; // your WebP data
//! let demuxer = WebPDemuxer::new(data)?;
//! let features = demuxer.features();
//! println!("{}x{}, {} frame(s)", features.width, features.height, demuxer.num_frames());
//!
//! for frame in demuxer.frames() {
//!     println!("  frame {}: {}x{} at ({},{}) duration={}ms",
//!         frame.index, frame.width, frame.height,
//!         frame.offset_x, frame.offset_y, frame.duration_ms);
//! }
//! # Ok::<(), zenwebp_core::mux::MuxError>(())
//! ```

use log::{debug, trace};

use super::bitstream::{is_vp8l, vp8_dimensions, vp8l_header};
use super::{BlendMethod, DemuxFrame, Demuxer, DisposeMethod, Features, MuxError};
use crate::slice_reader::SliceReader;

const VP8X_FLAG_ANIMATION: u8 = 1 << 1;
const VP8X_FLAG_ALPHA: u8 = 1 << 4;

/// Zero-copy WebP demuxer.
///
/// Accepts simple lossy, simple lossless and extended (VP8X) files. All
/// frames are located eagerly at construction; bitstreams stay borrowed from
/// the input.
#[derive(Debug, Clone)]
pub struct WebPDemuxer<'a> {
    features: Features,
    loop_count: u16,
    background_color: u32,
    frames: Vec<DemuxFrame<'a>>,
    icc_profile: Option<&'a [u8]>,
    exif: Option<&'a [u8]>,
    xmp: Option<&'a [u8]>,
}

impl<'a> WebPDemuxer<'a> {
    /// Parse a WebP file from a byte slice.
    pub fn new(data: &'a [u8]) -> Result<Self, MuxError> {
        if data.len() < 12 {
            return Err(MuxError::InvalidFormat("File too small".into()));
        }

        let mut r = SliceReader::new(data);
        if &r.read_fourcc()? != b"RIFF" {
            return Err(MuxError::InvalidFormat("Missing RIFF signature".into()));
        }
        let riff_size = r.read_u32_le()? as usize;
        if &r.read_fourcc()? != b"WEBP" {
            return Err(MuxError::InvalidFormat("Missing WEBP signature".into()));
        }
        // Ignore trailing bytes past the RIFF payload, tolerate short files.
        let start = r.position();
        let end = riff_size.saturating_add(8).clamp(start, data.len());
        let body = &data[start..end];

        let mut demuxer = Self {
            features: Features {
                width: 0,
                height: 0,
                has_alpha: false,
                has_animation: false,
            },
            loop_count: 0,
            background_color: 0,
            frames: Vec::new(),
            icc_profile: None,
            exif: None,
            xmp: None,
        };

        let mut chunks = SliceReader::new(body);
        let (fourcc, payload) = chunks.read_chunk()?;
        match &fourcc {
            b"VP8 " => demuxer.parse_simple(payload, false)?,
            b"VP8L" => demuxer.parse_simple(payload, true)?,
            b"VP8X" => demuxer.parse_extended(payload, &mut chunks)?,
            other => {
                return Err(MuxError::InvalidFormat(format!(
                    "unexpected first chunk {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        }

        if demuxer.frames.is_empty() {
            return Err(MuxError::InvalidFormat("no image data".into()));
        }
        debug!(
            "demuxed {}x{} canvas, {} frame(s), animated: {}",
            demuxer.features.width,
            demuxer.features.height,
            demuxer.frames.len(),
            demuxer.features.has_animation
        );
        Ok(demuxer)
    }

    /// Iterate over all frames in order.
    pub fn frames(&self) -> impl Iterator<Item = &DemuxFrame<'a>> + '_ {
        self.frames.iter()
    }

    /// ICC profile, if present.
    pub fn icc_profile(&self) -> Option<&'a [u8]> {
        self.icc_profile
    }

    /// EXIF metadata, if present.
    pub fn exif(&self) -> Option<&'a [u8]> {
        self.exif
    }

    /// XMP metadata, if present.
    pub fn xmp(&self) -> Option<&'a [u8]> {
        self.xmp
    }

    fn parse_simple(&mut self, payload: &'a [u8], lossless: bool) -> Result<(), MuxError> {
        let (width, height, has_alpha) = if lossless {
            vp8l_header(payload)?
        } else {
            let (w, h) = vp8_dimensions(payload)?;
            (w, h, false)
        };
        self.features = Features {
            width,
            height,
            has_alpha,
            has_animation: false,
        };
        self.frames.push(DemuxFrame {
            index: 0,
            offset_x: 0,
            offset_y: 0,
            width,
            height,
            duration_ms: 0,
            dispose: DisposeMethod::None,
            blend: BlendMethod::Overwrite,
            is_keyframe: true,
            has_alpha,
            is_lossless: lossless,
            bitstream: payload,
            alpha_data: None,
        });
        Ok(())
    }

    fn parse_extended(
        &mut self,
        vp8x: &'a [u8],
        chunks: &mut SliceReader<'a>,
    ) -> Result<(), MuxError> {
        let mut r = SliceReader::new(vp8x);
        let flags = r.read_u8()?;
        r.skip(3);
        let width = r.read_u24_le()? + 1;
        let height = r.read_u24_le()? + 1;
        self.features = Features {
            width,
            height,
            has_alpha: flags & VP8X_FLAG_ALPHA != 0,
            has_animation: flags & VP8X_FLAG_ANIMATION != 0,
        };

        // Alpha of a still image precedes its image chunk.
        let mut pending_alpha = None;
        while chunks.remaining() >= 8 {
            let (fourcc, payload) = match chunks.read_chunk() {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!("stopping at truncated chunk: {e}");
                    break;
                }
            };
            trace!("chunk {:?} ({} bytes)", String::from_utf8_lossy(&fourcc), payload.len());
            match &fourcc {
                b"ICCP" => self.icc_profile = Some(payload),
                b"EXIF" => self.exif = Some(payload),
                b"XMP " => self.xmp = Some(payload),
                b"ANIM" => {
                    let mut a = SliceReader::new(payload);
                    self.background_color = a.read_u32_le()?;
                    self.loop_count = a.read_u16_le()?;
                }
                b"ANMF" => self.parse_anmf(payload)?,
                b"ALPH" if !self.features.has_animation => pending_alpha = Some(payload),
                b"VP8 " | b"VP8L" if !self.features.has_animation && self.frames.is_empty() => {
                    self.push_still(payload, pending_alpha.take());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_still(&mut self, bitstream: &'a [u8], alpha_data: Option<&'a [u8]>) {
        let is_lossless = is_vp8l(bitstream);
        self.frames.push(DemuxFrame {
            index: 0,
            offset_x: 0,
            offset_y: 0,
            width: self.features.width,
            height: self.features.height,
            duration_ms: 0,
            dispose: DisposeMethod::None,
            blend: BlendMethod::Overwrite,
            is_keyframe: true,
            has_alpha: alpha_data.is_some() || vp8l_alpha(bitstream),
            is_lossless,
            bitstream,
            alpha_data,
        });
    }

    fn parse_anmf(&mut self, payload: &'a [u8]) -> Result<(), MuxError> {
        let mut r = SliceReader::new(payload);
        let offset_x = r.read_u24_le()? * 2;
        let offset_y = r.read_u24_le()? * 2;
        let width = r.read_u24_le()? + 1;
        let height = r.read_u24_le()? + 1;
        let duration_ms = r.read_u24_le()?;
        let flags = r.read_u8()?;

        let mut bitstream = None;
        let mut alpha_data = None;
        while r.remaining() >= 8 {
            let Ok((fourcc, sub)) = r.read_chunk() else {
                break;
            };
            match &fourcc {
                b"ALPH" => alpha_data = Some(sub),
                b"VP8 " | b"VP8L" => bitstream = Some(sub),
                _ => {}
            }
        }
        let Some(bitstream) = bitstream else {
            return Err(MuxError::InvalidFormat(format!(
                "ANMF frame {} has no image data",
                self.frames.len()
            )));
        };

        let index = self.frames.len();
        self.frames.push(DemuxFrame {
            index,
            offset_x,
            offset_y,
            width,
            height,
            duration_ms,
            dispose: if flags & 0x01 != 0 {
                DisposeMethod::Background
            } else {
                DisposeMethod::None
            },
            blend: if flags & 0x02 != 0 {
                BlendMethod::Overwrite
            } else {
                BlendMethod::AlphaBlend
            },
            is_keyframe: index == 0,
            has_alpha: alpha_data.is_some() || vp8l_alpha(bitstream),
            is_lossless: is_vp8l(bitstream),
            bitstream,
            alpha_data,
        });
        Ok(())
    }
}

fn vp8l_alpha(bitstream: &[u8]) -> bool {
    is_vp8l(bitstream) && vp8l_header(bitstream).is_ok_and(|(_, _, alpha)| alpha)
}

impl Demuxer for WebPDemuxer<'_> {
    fn features(&self) -> Features {
        self.features
    }

    fn loop_count(&self) -> u16 {
        self.loop_count
    }

    fn background_color(&self) -> u32 {
        self.background_color
    }

    fn chunk(&self, fourcc: &[u8; 4]) -> Option<&[u8]> {
        match fourcc {
            b"ICCP" => self.icc_profile,
            b"EXIF" => self.exif,
            b"XMP " => self.xmp,
            _ => None,
        }
    }

    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<DemuxFrame<'_>, MuxError> {
        self.frames
            .get(index)
            .copied()
            .ok_or(MuxError::FrameOutOfBounds {
                index,
                total: self.frames.len(),
            })
    }
}
