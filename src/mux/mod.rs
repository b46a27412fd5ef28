//! WebP container contracts and the built-in RIFF muxer/demuxer.
//!
//! The animation engine never touches container bytes directly. It talks to
//! a [`Demuxer`] when decoding and a [`Muxer`] when encoding, so callers can
//! substitute their own container handling. [`WebPDemuxer`] and [`WebPMux`]
//! are the implementations used by default.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_core::mux::{Demuxer, FrameOptions, Muxer, WebPDemuxer, WebPMux};
//!
//! // A minimal VP8L header for a 2x2 image.
//! let bitstream = vec![0x2f, 0x01, 0x40, 0x00, 0x00, 0x00];
//!
//! let mut mux = WebPMux::new();
//! mux.set_canvas_size(2, 2);
//! mux.add_frame(bitstream.clone(), FrameOptions::default())?;
//! let mut file = Vec::new();
//! mux.assemble(&mut file)?;
//!
//! let demux = WebPDemuxer::new(&file)?;
//! assert_eq!(demux.num_frames(), 1);
//! assert_eq!(demux.frame(0)?.bitstream, &bitstream[..]);
//! # Ok::<(), zenwebp_core::mux::MuxError>(())
//! ```

mod assemble;
pub(crate) mod bitstream;
mod demux;
mod error;
mod vec_writer;

use std::io::Write;

pub use assemble::WebPMux;
pub use demux::WebPDemuxer;
pub use error::MuxError;

/// Largest frame duration the container can store (24 bits).
pub const MAX_DURATION: u32 = 0xFF_FFFF;

/// Largest loop count the container can store (16 bits).
pub const MAX_LOOP_COUNT: u32 = 0xFFFF;

/// How the frame area is disposed after rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposeMethod {
    /// Do not dispose. The frame remains on the canvas.
    #[default]
    None,
    /// Clear the frame rectangle to transparent before the next frame.
    Background,
}

/// How the frame is blended with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMethod {
    /// Use alpha blending with the existing canvas content.
    #[default]
    AlphaBlend,
    /// Overwrite the canvas region with the frame data.
    Overwrite,
}

/// Per-frame parameters passed to [`Muxer::add_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOptions {
    /// Display duration in milliseconds. Clamped to [`MAX_DURATION`].
    pub duration_ms: u32,
    /// Horizontal offset on the canvas. Must be even.
    pub offset_x: u32,
    /// Vertical offset on the canvas. Must be even.
    pub offset_y: u32,
    /// How the frame is blended onto the canvas.
    pub blend: BlendMethod,
    /// How the frame area is disposed after it is shown.
    pub dispose: DisposeMethod,
}

/// Image-level features reported by a [`Demuxer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Whether any frame carries alpha.
    pub has_alpha: bool,
    /// Whether the file is an animation.
    pub has_animation: bool,
}

/// One frame as stored in the container. Borrowed from the input data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxFrame<'a> {
    /// 0-based frame index.
    pub index: usize,
    /// Horizontal offset of the frame on the canvas (always even).
    pub offset_x: u32,
    /// Vertical offset of the frame on the canvas (always even).
    pub offset_y: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame duration in milliseconds.
    pub duration_ms: u32,
    /// How the frame area is disposed after rendering.
    pub dispose: DisposeMethod,
    /// How the frame is blended onto the canvas.
    pub blend: BlendMethod,
    /// True for the first frame.
    pub is_keyframe: bool,
    /// An ALPH chunk is present or the VP8L header sets the alpha bit.
    pub has_alpha: bool,
    /// The bitstream is VP8L.
    pub is_lossless: bool,
    /// Raw VP8 or VP8L bitstream data for this frame.
    pub bitstream: &'a [u8],
    /// Raw ALPH chunk payload, if present.
    pub alpha_data: Option<&'a [u8]>,
}

/// Read access to a parsed WebP container.
pub trait Demuxer {
    /// Canvas size and global flags.
    fn features(&self) -> Features;

    /// Animation loop count, 0 meaning infinite.
    fn loop_count(&self) -> u16;

    /// Background color as packed ARGB.
    fn background_color(&self) -> u32;

    /// Payload of a metadata chunk (`ICCP`, `EXIF` or `XMP `).
    fn chunk(&self, fourcc: &[u8; 4]) -> Option<&[u8]>;

    /// Number of frames in the file.
    fn num_frames(&self) -> usize;

    /// Frame at a 0-based index.
    fn frame(&self, index: usize) -> Result<DemuxFrame<'_>, MuxError>;
}

/// Write access to a WebP container under construction.
///
/// Frames are committed in call order. Duration and dispose mode of frames
/// already added can still be changed until [`Muxer::assemble`] runs.
pub trait Muxer {
    /// Set the canvas size written to the VP8X chunk.
    fn set_canvas_size(&mut self, width: u32, height: u32);

    /// Set the loop count. Values above [`MAX_LOOP_COUNT`] are clamped.
    fn set_loop_count(&mut self, loop_count: u32);

    /// Set the background color as packed ARGB.
    fn set_background_color(&mut self, argb: u32);

    /// Attach an ICC profile.
    fn set_icc_profile(&mut self, data: Vec<u8>);

    /// Attach EXIF metadata.
    fn set_exif(&mut self, data: Vec<u8>);

    /// Attach XMP metadata.
    fn set_xmp(&mut self, data: Vec<u8>);

    /// Append a frame bitstream and return its index.
    ///
    /// A leading `ALPH` chunk in `bitstream` is split off and stored as the
    /// frame's alpha data.
    fn add_frame(&mut self, bitstream: Vec<u8>, options: FrameOptions)
        -> Result<usize, MuxError>;

    /// Number of frames added so far.
    fn num_frames(&self) -> usize;

    /// Duration of a frame in milliseconds.
    fn frame_duration(&self, index: usize) -> Result<u32, MuxError>;

    /// Change the duration of a frame. Clamped to [`MAX_DURATION`].
    fn set_frame_duration(&mut self, index: usize, duration_ms: u32) -> Result<(), MuxError>;

    /// Change the dispose mode of a frame.
    fn set_frame_dispose_mode(
        &mut self,
        index: usize,
        dispose: DisposeMethod,
    ) -> Result<(), MuxError>;

    /// Validate and write the complete file to `out`.
    fn assemble(&self, out: &mut dyn Write) -> Result<(), MuxError>;
}
