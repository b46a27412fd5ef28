//! Animated WebP encoder with sub-frame optimization.
//!
//! Each added canvas is compared against the previous one. Unchanged canvases
//! extend the previous frame's duration; changed canvases are cropped to the
//! changed rectangle and encoded under two dispose assumptions, keeping the
//! smaller result. Frames are committed to the muxer immediately; choosing
//! dispose-to-background for the new frame rewrites the dispose mode of the
//! frame before it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zenwebp_core::anim::{AnimEncoder, EncodeOptions, RgbaImage};
//! use zenwebp_core::BoxError;
//!
//! // A stand-in codec: emits a VP8L header of the right size.
//! let encoder = |img: &RgbaImage, _lossless: bool, _quality: u8| -> Result<Vec<u8>, BoxError> {
//!     let bits = (img.width() - 1) | ((img.height() - 1) << 14);
//!     let mut out = vec![0x2f];
//!     out.extend_from_slice(&bits.to_le_bytes());
//!     Ok(out)
//! };
//!
//! let mut out = Vec::new();
//! let mut enc = AnimEncoder::new(&mut out, 4, 4, EncodeOptions::default())
//!     .with_frame_encoder(Arc::new(encoder));
//! enc.add_frame(&RgbaImage::new(4, 4), 100)?;
//! enc.close()?;
//! drop(enc);
//! assert_eq!(&out[..4], b"RIFF");
//! # Ok::<(), zenwebp_core::Error>(())
//! ```

use std::io::Write;
use std::sync::Arc;

use log::{debug, trace};
use rgb::RGBA8;

use super::canvas::{
    fill_rect, find_changed_rect, is_lossless_blending_possible, is_lossy_blending_possible,
    snap_to_even,
};
use super::{rgba_to_argb, Rect, RgbaImage};
use crate::codec::{FrameEncoder, SimpleEncoder};
use crate::error::{Error, Result};
use crate::mux::{
    BlendMethod, DisposeMethod, FrameOptions, Muxer, WebPMux, MAX_DURATION, MAX_LOOP_COUNT,
};
use crate::pool;

/// Upper bound on the spread between `kmin` and `kmax`.
const MAX_CACHED_FRAMES: usize = 30;

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Number of loops, 0 for infinite. Clamped to `0..=65535`.
    pub loop_count: u32,
    /// Background color hint written to the container.
    pub background_color: RGBA8,
    /// Lossy quality, `0..=100`.
    pub quality: u8,
    /// Encode frames losslessly.
    pub lossless: bool,
    /// Try both codecs for every frame and keep the smaller bitstream.
    pub allow_mixed: bool,
    /// Minimum distance between keyframes.
    pub kmin: i32,
    /// Maximum distance between keyframes. Zero or less disables keyframe
    /// insertion after the first frame; one makes every frame a keyframe.
    pub kmax: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            loop_count: 0,
            background_color: RGBA8::default(),
            quality: 75,
            lossless: false,
            allow_mixed: false,
            kmin: 0,
            kmax: 0,
        }
    }
}

/// Keyframe distances after sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeBounds {
    /// Minimum distance between keyframes.
    pub kmin: usize,
    /// Frames since the last keyframe that force a new one.
    pub kmax: usize,
}

/// Bring user keyframe distances into a consistent range.
///
/// * `kmax <= 0`: keyframes disabled (`kmax = usize::MAX`, `kmin = kmax - 1`).
/// * `kmax == 1`: every frame is a keyframe (`kmin = kmax = 0`).
/// * `kmin >= kmax`: `kmin = kmax - 1`; otherwise `kmin` is raised to
///   `kmax / 2 + 1` when that lies strictly between them.
/// * `kmax - kmin` is capped at 30.
pub fn sanitize_keyframe_options(kmin: i32, kmax: i32) -> KeyframeBounds {
    if kmax <= 0 {
        return KeyframeBounds {
            kmin: usize::MAX - 1,
            kmax: usize::MAX,
        };
    }
    if kmax == 1 {
        return KeyframeBounds { kmin: 0, kmax: 0 };
    }
    let kmax = kmax as usize;
    let mut kmin = kmin.max(0) as usize;
    if kmin >= kmax {
        kmin = kmax - 1;
    } else {
        let limit = kmax / 2 + 1;
        if kmin < limit && limit < kmax {
            kmin = limit;
        }
    }
    if kmax - kmin > MAX_CACHED_FRAMES {
        kmin = kmax - MAX_CACHED_FRAMES;
    }
    KeyframeBounds { kmin, kmax }
}

/// One encoded sub-frame candidate.
struct Candidate {
    bitstream: Vec<u8>,
    rect: Rect,
    blend: BlendMethod,
}

/// Animated WebP encoder writing to `W` on [`AnimEncoder::close`].
pub struct AnimEncoder<W: Write, M: Muxer = WebPMux> {
    sink: W,
    muxer: M,
    width: u32,
    height: u32,
    opts: EncodeOptions,
    keyframes: KeyframeBounds,
    encoder: Option<Arc<dyn FrameEncoder>>,
    simple_encoder: Option<Arc<dyn SimpleEncoder>>,
    closed: bool,

    prev_canvas: Option<RgbaImage>,
    prev_rect: Rect,
    prev_mux_index: usize,
    frame_count: usize,
    count_since_keyframe: usize,
}

impl<W: Write> AnimEncoder<W> {
    /// Create an encoder for a `width` x `height` canvas backed by [`WebPMux`].
    pub fn new(sink: W, width: u32, height: u32, options: EncodeOptions) -> Self {
        Self::with_muxer(sink, WebPMux::new(), width, height, options)
    }
}

impl<W: Write, M: Muxer> AnimEncoder<W, M> {
    /// Create an encoder that assembles through `muxer`.
    pub fn with_muxer(
        sink: W,
        mut muxer: M,
        width: u32,
        height: u32,
        mut options: EncodeOptions,
    ) -> Self {
        options.loop_count = options.loop_count.min(MAX_LOOP_COUNT);
        let keyframes = sanitize_keyframe_options(options.kmin, options.kmax);
        muxer.set_canvas_size(width, height);
        muxer.set_loop_count(options.loop_count);
        muxer.set_background_color(rgba_to_argb(options.background_color));
        debug!(
            "animation encoder {width}x{height}, lossless={} quality={} kmin={} kmax={}",
            options.lossless, options.quality, keyframes.kmin, keyframes.kmax
        );
        Self {
            sink,
            muxer,
            width,
            height,
            opts: options,
            keyframes,
            encoder: None,
            simple_encoder: None,
            closed: false,
            prev_canvas: None,
            prev_rect: Rect::default(),
            prev_mux_index: 0,
            frame_count: 0,
            count_since_keyframe: 0,
        }
    }

    /// Attach the per-frame encoder used by [`AnimEncoder::add_frame`].
    pub fn with_frame_encoder(mut self, encoder: Arc<dyn FrameEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Attach a still-image encoder for the single-frame check in
    /// [`AnimEncoder::close`].
    pub fn with_simple_encoder(mut self, encoder: Arc<dyn SimpleEncoder>) -> Self {
        self.simple_encoder = Some(encoder);
        self
    }

    /// Attach an ICC profile.
    pub fn set_icc_profile(&mut self, data: Vec<u8>) {
        self.muxer.set_icc_profile(data);
    }

    /// Attach EXIF metadata.
    pub fn set_exif(&mut self, data: Vec<u8>) {
        self.muxer.set_exif(data);
    }

    /// Attach XMP metadata.
    pub fn set_xmp(&mut self, data: Vec<u8>) {
        self.muxer.set_xmp(data);
    }

    /// Frames committed so far, counting duration-cap filler frames.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Keyframe distances in effect.
    pub fn keyframe_bounds(&self) -> KeyframeBounds {
        self.keyframes
    }

    /// The muxer frames are committed to.
    pub fn muxer(&self) -> &M {
        &self.muxer
    }

    /// Consume the encoder and return the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Append a pre-encoded VP8 or VP8L bitstream without any optimization.
    pub fn add_raw_frame(&mut self, bitstream: Vec<u8>, options: FrameOptions) -> Result<()> {
        if self.closed {
            return Err(Error::EncoderClosed);
        }
        self.muxer.add_frame(bitstream, options)?;
        self.frame_count += 1;
        Ok(())
    }

    /// Add a canvas shown for `duration_ms` milliseconds.
    ///
    /// Images whose size differs from the canvas are placed at (0, 0) on a
    /// transparent canvas.
    pub fn add_frame(&mut self, image: &RgbaImage, duration_ms: u32) -> Result<()> {
        if self.closed {
            return Err(Error::EncoderClosed);
        }
        if self.encoder.is_none() {
            return Err(Error::NoEncoder);
        }
        let resized;
        let curr = if image.width() != self.width || image.height() != self.height {
            resized = image.placed_on_canvas(self.width, self.height);
            &resized
        } else {
            image
        };

        let Some(prev) = self.prev_canvas.as_ref() else {
            trace!("frame 0: keyframe");
            return self.encode_keyframe(curr, duration_ms);
        };
        if prev == curr {
            return self.increase_previous_duration(duration_ms);
        }

        self.count_since_keyframe += 1;
        if self.count_since_keyframe >= self.keyframes.kmax {
            trace!(
                "frame {}: forced keyframe after {} frames",
                self.frame_count,
                self.count_since_keyframe
            );
            return self.encode_keyframe(curr, duration_ms);
        }
        self.encode_sub_frame(curr, duration_ms)
    }

    /// Assemble the file and write it to the sink. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut data = Vec::new();
        self.muxer.assemble(&mut data)?;

        if self.frame_count == 1 {
            if let (Some(simple), Some(canvas)) = (&self.simple_encoder, &self.prev_canvas) {
                match simple.encode_simple(canvas, self.opts.lossless, f32::from(self.opts.quality))
                {
                    Ok(still) if !still.is_empty() && still.len() < data.len() => {
                        debug!(
                            "single frame written as still image ({} < {} bytes)",
                            still.len(),
                            data.len()
                        );
                        data = still;
                    }
                    Ok(_) => {}
                    Err(e) => trace!("still image encode failed, keeping animation: {e}"),
                }
            }
        }

        self.sink.write_all(&data)?;
        self.sink.flush()?;
        Ok(())
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let encoder = self.encoder.as_ref().ok_or(Error::NoEncoder)?;
        let (lossless, quality) = (self.opts.lossless, self.opts.quality);
        let primary = encoder
            .encode_frame(image, lossless, quality)
            .map_err(Error::CodecFailure)?;
        if !self.opts.allow_mixed {
            return Ok(primary);
        }
        match encoder.encode_frame(image, !lossless, quality) {
            Ok(alt) if alt.len() < primary.len() => Ok(alt),
            Ok(_) => Ok(primary),
            Err(e) => {
                trace!("alternate codec failed, using primary: {e}");
                Ok(primary)
            }
        }
    }

    fn encode_keyframe(&mut self, curr: &RgbaImage, duration_ms: u32) -> Result<()> {
        let bitstream = self.encode(curr)?;
        self.commit_keyframe(bitstream, curr, duration_ms)
    }

    fn commit_keyframe(
        &mut self,
        bitstream: Vec<u8>,
        curr: &RgbaImage,
        duration_ms: u32,
    ) -> Result<()> {
        let index = self.muxer.add_frame(
            bitstream,
            FrameOptions {
                duration_ms,
                blend: BlendMethod::Overwrite,
                dispose: DisposeMethod::None,
                ..Default::default()
            },
        )?;
        self.prev_canvas = Some(curr.clone());
        self.prev_rect = curr.bounds();
        self.prev_mux_index = index;
        self.frame_count += 1;
        self.count_since_keyframe = 0;
        Ok(())
    }

    /// Merge an identical canvas into the previous frame.
    ///
    /// Durations past the 24-bit limit cap the previous frame and carry the
    /// remainder on a transparent 1x1 frame.
    fn increase_previous_duration(&mut self, duration_ms: u32) -> Result<()> {
        let prev = self.muxer.frame_duration(self.prev_mux_index)?;
        let total = u64::from(prev) + u64::from(duration_ms);
        if total <= u64::from(MAX_DURATION) {
            trace!("identical frame, previous duration now {total}ms");
            self.muxer
                .set_frame_duration(self.prev_mux_index, total as u32)?;
            return Ok(());
        }

        self.muxer
            .set_frame_duration(self.prev_mux_index, MAX_DURATION)?;
        let remainder = (total - u64::from(MAX_DURATION)) as u32;
        debug!("duration cap reached, adding filler frame for {remainder}ms");
        let filler = self.encode(&RgbaImage::new(1, 1))?;
        let index = self.muxer.add_frame(
            filler,
            FrameOptions {
                duration_ms: remainder,
                blend: BlendMethod::AlphaBlend,
                dispose: DisposeMethod::None,
                ..Default::default()
            },
        )?;
        self.prev_mux_index = index;
        self.prev_rect = Rect::new(0, 0, 1, 1);
        self.frame_count += 1;
        self.count_since_keyframe += 1;
        Ok(())
    }

    /// Pick the rectangle and blend mode for `curr` drawn over `base`.
    fn sub_frame_rect(&self, base: &[u8], curr: &RgbaImage) -> (Rect, BlendMethod) {
        let (w, h) = (self.width, self.height);
        let mut rect = find_changed_rect(base, curr.as_bytes(), w, h);
        if rect.is_empty() {
            rect = Rect::new(0, 0, 1, 1);
        }
        let rect = snap_to_even(rect).intersect(&curr.bounds());
        let blendable = if self.opts.lossless {
            is_lossless_blending_possible(base, curr.as_bytes(), w, rect)
        } else {
            is_lossy_blending_possible(base, curr.as_bytes(), w, rect, self.opts.quality)
        };
        let blend = if blendable {
            BlendMethod::AlphaBlend
        } else {
            BlendMethod::Overwrite
        };
        (rect, blend)
    }

    fn encode_sub_frame(&mut self, curr: &RgbaImage, duration_ms: u32) -> Result<()> {
        let Some(prev) = self.prev_canvas.as_ref() else {
            return self.encode_keyframe(curr, duration_ms);
        };

        // Previous frame left in place.
        let (rect, blend) = self.sub_frame_rect(prev.as_bytes(), curr);
        let keep = Candidate {
            bitstream: self.encode(&curr.sub_image(rect))?,
            rect,
            blend,
        };

        // Previous frame rectangle cleared to transparent.
        let cleared = {
            let mut scratch = pool::global().scoped(prev.as_bytes().len());
            scratch.copy_from_slice(prev.as_bytes());
            fill_rect(
                &mut scratch,
                self.width,
                self.height,
                self.prev_rect,
                RGBA8::default(),
            );
            let (rect, blend) = self.sub_frame_rect(&scratch, curr);
            match self.encode(&curr.sub_image(rect)) {
                Ok(bitstream) => Some(Candidate {
                    bitstream,
                    rect,
                    blend,
                }),
                Err(e) => {
                    trace!("dispose-background candidate failed: {e}");
                    None
                }
            }
        };

        let (best, dispose_prev) = match cleared {
            Some(c) if c.bitstream.len() < keep.bitstream.len() => (c, true),
            _ => (keep, false),
        };

        let canvas_area = u64::from(self.width) * u64::from(self.height);
        if best.rect.area() > canvas_area * 9 / 10 {
            if let Ok(full) = self.encode(curr) {
                if full.len() < best.bitstream.len() {
                    trace!(
                        "frame {}: full canvas smaller than sub-frame",
                        self.frame_count
                    );
                    return self.commit_keyframe(full, curr, duration_ms);
                }
            }
        }

        if dispose_prev {
            self.muxer
                .set_frame_dispose_mode(self.prev_mux_index, DisposeMethod::Background)?;
        }
        trace!(
            "frame {}: sub-frame {}x{} at ({}, {}) {:?} dispose_prev={dispose_prev}",
            self.frame_count,
            best.rect.width,
            best.rect.height,
            best.rect.x,
            best.rect.y,
            best.blend
        );
        let index = self.muxer.add_frame(
            best.bitstream,
            FrameOptions {
                duration_ms,
                offset_x: best.rect.x,
                offset_y: best.rect.y,
                blend: best.blend,
                dispose: DisposeMethod::None,
            },
        )?;
        self.prev_canvas = Some(curr.clone());
        self.prev_rect = best.rect;
        self.prev_mux_index = index;
        self.frame_count += 1;
        Ok(())
    }
}

impl<W: Write, M: Muxer + core::fmt::Debug> core::fmt::Debug for AnimEncoder<W, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AnimEncoder")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("options", &self.opts)
            .field("keyframes", &self.keyframes)
            .field("frame_count", &self.frame_count)
            .field("closed", &self.closed)
            .field("muxer", &self.muxer)
            .finish_non_exhaustive()
    }
}
