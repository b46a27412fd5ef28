//! WebP container assembler.
//!
//! Collects frame bitstreams and metadata, then writes either the simple
//! layout (one `VP8 `/`VP8L` chunk) or the extended VP8X layout.

use log::{debug, trace};

use super::bitstream::{bitstream_info, split_alpha, BitstreamInfo};
use super::vec_writer::{chunk_size, VecWriter};
use super::{
    BlendMethod, DisposeMethod, FrameOptions, MuxError, Muxer, MAX_DURATION, MAX_LOOP_COUNT,
};

const VP8X_FLAG_ANIMATION: u8 = 1 << 1;
const VP8X_FLAG_XMP: u8 = 1 << 2;
const VP8X_FLAG_EXIF: u8 = 1 << 3;
const VP8X_FLAG_ALPHA: u8 = 1 << 4;
const VP8X_FLAG_ICC: u8 = 1 << 5;

/// ANMF header: x, y, width, height, duration (u24 each) plus a flag byte.
const ANMF_HEADER_SIZE: usize = 16;

/// A frame queued for assembly.
#[derive(Debug, Clone)]
struct MuxFrame {
    bitstream: Vec<u8>,
    alpha_data: Option<Vec<u8>>,
    options: FrameOptions,
    info: BitstreamInfo,
}

impl MuxFrame {
    fn image_fourcc(&self) -> &'static [u8; 4] {
        if self.info.lossless {
            b"VP8L"
        } else {
            b"VP8 "
        }
    }

    fn has_alpha(&self) -> bool {
        self.alpha_data.is_some() || self.info.has_alpha
    }

    /// Size of the ALPH and image chunks together.
    fn sub_chunks_size(&self) -> u32 {
        let alpha = self.alpha_data.as_ref().map_or(0, |a| chunk_size(a.len()));
        alpha + chunk_size(self.bitstream.len())
    }

    fn write_sub_chunks(&self, out: &mut Vec<u8>) {
        if let Some(alpha) = &self.alpha_data {
            out.write_chunk(b"ALPH", alpha);
        }
        out.write_chunk(self.image_fourcc(), &self.bitstream);
    }
}

/// WebP container assembler.
///
/// Builds a complete WebP file from pre-encoded frame data and optional
/// metadata. A single frame with zero duration and no metadata produces the
/// simple layout; everything else produces the extended layout.
#[derive(Debug, Clone, Default)]
pub struct WebPMux {
    canvas: Option<(u32, u32)>,
    loop_count: u16,
    background_color: u32,
    frames: Vec<MuxFrame>,
    icc_profile: Option<Vec<u8>>,
    exif: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
}

impl WebPMux {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// ICC profile, if set.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }

    /// EXIF metadata, if set.
    pub fn exif(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    /// XMP metadata, if set.
    pub fn xmp(&self) -> Option<&[u8]> {
        self.xmp.as_deref()
    }

    /// Loop count after clamping.
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Options of a frame, including any changes made after it was added.
    pub fn frame_options(&self, index: usize) -> Result<FrameOptions, MuxError> {
        Ok(self.frame_at(index)?.options)
    }

    /// Assemble into a new buffer.
    pub fn assemble_to_vec(&self) -> Result<Vec<u8>, MuxError> {
        self.validate()?;
        let out = if self.needs_vp8x() {
            self.assemble_extended()
        } else {
            self.assemble_simple()
        };
        debug!(
            "assembled {} frame(s) into {} bytes",
            self.frames.len(),
            out.len()
        );
        Ok(out)
    }

    fn frame_at(&self, index: usize) -> Result<&MuxFrame, MuxError> {
        self.frames.get(index).ok_or(MuxError::FrameOutOfBounds {
            index,
            total: self.frames.len(),
        })
    }

    fn frame_at_mut(&mut self, index: usize) -> Result<&mut MuxFrame, MuxError> {
        let total = self.frames.len();
        self.frames
            .get_mut(index)
            .ok_or(MuxError::FrameOutOfBounds { index, total })
    }

    fn is_animated(&self) -> bool {
        self.frames.len() > 1 || self.frames.iter().any(|f| f.options.duration_ms > 0)
    }

    fn needs_vp8x(&self) -> bool {
        self.is_animated()
            || self.icc_profile.is_some()
            || self.exif.is_some()
            || self.xmp.is_some()
    }

    fn has_alpha(&self) -> bool {
        self.frames.iter().any(MuxFrame::has_alpha)
    }

    /// Explicit canvas size, otherwise the extent of all frames.
    fn canvas_size(&self) -> (u32, u32) {
        if let Some((w, h)) = self.canvas {
            if w > 0 && h > 0 {
                return (w, h);
            }
        }
        let (w, h) = self.frames.iter().fold((0u32, 0u32), |(w, h), f| {
            (
                w.max(f.options.offset_x.saturating_add(f.info.width)),
                h.max(f.options.offset_y.saturating_add(f.info.height)),
            )
        });
        (w.max(1), h.max(1))
    }

    fn validate(&self) -> Result<(), MuxError> {
        if self.frames.is_empty() {
            return Err(MuxError::NoFrames);
        }
        if !self.is_animated() && self.frames.len() != 1 {
            return Err(MuxError::TooManyStillFrames(self.frames.len()));
        }
        let (canvas_width, canvas_height) = self.canvas_size();
        for frame in &self.frames {
            let o = &frame.options;
            let end_x = o.offset_x.checked_add(frame.info.width);
            let end_y = o.offset_y.checked_add(frame.info.height);
            let fits = matches!(
                (end_x, end_y),
                (Some(x), Some(y)) if x <= canvas_width && y <= canvas_height
            );
            if !fits {
                return Err(MuxError::FrameOutsideCanvas {
                    x: o.offset_x,
                    y: o.offset_y,
                    width: frame.info.width,
                    height: frame.info.height,
                    canvas_width,
                    canvas_height,
                });
            }
        }
        Ok(())
    }

    fn assemble_simple(&self) -> Vec<u8> {
        let frame = &self.frames[0];
        let image_size = chunk_size(frame.bitstream.len());
        let mut out = Vec::with_capacity(image_size as usize + 12);
        out.write_all(b"RIFF");
        out.write_u32_le(4 + image_size);
        out.write_all(b"WEBP");
        out.write_chunk(frame.image_fourcc(), &frame.bitstream);
        out
    }

    fn assemble_extended(&self) -> Vec<u8> {
        let animated = self.is_animated();
        let (canvas_width, canvas_height) = self.canvas_size();

        let mut total = 4 + chunk_size(10);
        if let Some(icc) = &self.icc_profile {
            total += chunk_size(icc.len());
        }
        if animated {
            total += chunk_size(6);
            for frame in &self.frames {
                total += chunk_size(ANMF_HEADER_SIZE + frame.sub_chunks_size() as usize);
            }
        } else {
            total += self.frames[0].sub_chunks_size();
        }
        if let Some(exif) = &self.exif {
            total += chunk_size(exif.len());
        }
        if let Some(xmp) = &self.xmp {
            total += chunk_size(xmp.len());
        }

        let mut out = Vec::with_capacity(total as usize + 8);
        out.write_all(b"RIFF");
        out.write_u32_le(total);
        out.write_all(b"WEBP");

        let mut flags = 0u8;
        if animated {
            flags |= VP8X_FLAG_ANIMATION;
        }
        if self.xmp.is_some() {
            flags |= VP8X_FLAG_XMP;
        }
        if self.exif.is_some() {
            flags |= VP8X_FLAG_EXIF;
        }
        if self.has_alpha() {
            flags |= VP8X_FLAG_ALPHA;
        }
        if self.icc_profile.is_some() {
            flags |= VP8X_FLAG_ICC;
        }

        let mut vp8x = Vec::with_capacity(10);
        vp8x.write_u8(flags);
        vp8x.write_all(&[0; 3]);
        vp8x.write_u24_le(canvas_width - 1);
        vp8x.write_u24_le(canvas_height - 1);
        out.write_chunk(b"VP8X", &vp8x);

        if let Some(icc) = &self.icc_profile {
            out.write_chunk(b"ICCP", icc);
        }

        if animated {
            let mut anim = Vec::with_capacity(6);
            anim.write_u32_le(self.background_color);
            anim.write_u16_le(self.loop_count);
            out.write_chunk(b"ANIM", &anim);
            for frame in &self.frames {
                write_anmf(&mut out, frame);
            }
        } else {
            self.frames[0].write_sub_chunks(&mut out);
        }

        if let Some(exif) = &self.exif {
            out.write_chunk(b"EXIF", exif);
        }
        if let Some(xmp) = &self.xmp {
            out.write_chunk(b"XMP ", xmp);
        }
        out
    }
}

fn write_anmf(out: &mut Vec<u8>, frame: &MuxFrame) {
    let o = &frame.options;
    let payload = ANMF_HEADER_SIZE as u32 + frame.sub_chunks_size();

    out.write_all(b"ANMF");
    out.write_u32_le(payload);
    out.write_u24_le(o.offset_x / 2);
    out.write_u24_le(o.offset_y / 2);
    out.write_u24_le(frame.info.width - 1);
    out.write_u24_le(frame.info.height - 1);
    out.write_u24_le(o.duration_ms);

    let mut flags = 0u8;
    if o.dispose == DisposeMethod::Background {
        flags |= 0x01;
    }
    if o.blend == BlendMethod::Overwrite {
        flags |= 0x02;
    }
    out.write_u8(flags);
    frame.write_sub_chunks(out);
}

impl Muxer for WebPMux {
    fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas = Some((width, height));
    }

    fn set_loop_count(&mut self, loop_count: u32) {
        self.loop_count = loop_count.min(MAX_LOOP_COUNT) as u16;
    }

    fn set_background_color(&mut self, argb: u32) {
        self.background_color = argb;
    }

    fn set_icc_profile(&mut self, data: Vec<u8>) {
        self.icc_profile = Some(data);
    }

    fn set_exif(&mut self, data: Vec<u8>) {
        self.exif = Some(data);
    }

    fn set_xmp(&mut self, data: Vec<u8>) {
        self.xmp = Some(data);
    }

    fn add_frame(
        &mut self,
        bitstream: Vec<u8>,
        mut options: FrameOptions,
    ) -> Result<usize, MuxError> {
        if bitstream.is_empty() {
            return Err(MuxError::EmptyFrame);
        }
        if options.offset_x % 2 != 0 || options.offset_y % 2 != 0 {
            return Err(MuxError::OddFrameOffset {
                x: options.offset_x,
                y: options.offset_y,
            });
        }
        options.duration_ms = options.duration_ms.min(MAX_DURATION);

        let (alpha_data, bitstream) = match split_alpha(&bitstream)? {
            (Some(alpha), image) => (Some(alpha.to_vec()), image.to_vec()),
            (None, _) => (None, bitstream),
        };
        if bitstream.is_empty() {
            return Err(MuxError::EmptyFrame);
        }
        let info = bitstream_info(&bitstream)?;

        let index = self.frames.len();
        trace!(
            "mux frame {index}: {}x{} at ({}, {}) {}ms {}",
            info.width,
            info.height,
            options.offset_x,
            options.offset_y,
            options.duration_ms,
            if info.lossless { "VP8L" } else { "VP8" }
        );
        self.frames.push(MuxFrame {
            bitstream,
            alpha_data,
            options,
            info,
        });
        Ok(index)
    }

    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn frame_duration(&self, index: usize) -> Result<u32, MuxError> {
        Ok(self.frame_at(index)?.options.duration_ms)
    }

    fn set_frame_duration(&mut self, index: usize, duration_ms: u32) -> Result<(), MuxError> {
        self.frame_at_mut(index)?.options.duration_ms = duration_ms.min(MAX_DURATION);
        Ok(())
    }

    fn set_frame_dispose_mode(
        &mut self,
        index: usize,
        dispose: DisposeMethod,
    ) -> Result<(), MuxError> {
        self.frame_at_mut(index)?.options.dispose = dispose;
        Ok(())
    }

    fn assemble(&self, out: &mut dyn std::io::Write) -> Result<(), MuxError> {
        let data = self.assemble_to_vec()?;
        std::io::Write::write_all(out, &data)?;
        Ok(())
    }
}
