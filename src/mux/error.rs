//! Error types for mux/demux operations.

use thiserror::Error;

/// Errors that can occur during mux/demux operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MuxError {
    /// The data is not a valid WebP file.
    #[error("Invalid WebP format: {0}")]
    InvalidFormat(String),

    /// A chunk or header ends past the end of the data.
    #[error("WebP data truncated")]
    Truncated,

    /// Canvas or frame dimensions are invalid.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// The invalid width.
        width: u32,
        /// The invalid height.
        height: u32,
    },

    /// A frame index is out of bounds.
    #[error("Frame {index} out of bounds (total: {total})")]
    FrameOutOfBounds {
        /// The requested frame index.
        index: usize,
        /// The total number of frames.
        total: usize,
    },

    /// No frames were added before assembly.
    #[error("No frames to assemble")]
    NoFrames,

    /// A frame was added with an empty bitstream.
    #[error("Frame data is empty")]
    EmptyFrame,

    /// A still image must consist of exactly one frame.
    #[error("Still image must have exactly one frame, found {0}")]
    TooManyStillFrames(usize),

    /// Frame offset is not a multiple of 2.
    #[error("Frame offset must be even: ({x}, {y})")]
    OddFrameOffset {
        /// The invalid x offset.
        x: u32,
        /// The invalid y offset.
        y: u32,
    },

    /// Frame extends beyond the canvas boundary.
    #[error(
        "Frame at ({x}, {y}) size {width}x{height} exceeds canvas {canvas_width}x{canvas_height}"
    )]
    FrameOutsideCanvas {
        /// Frame x offset.
        x: u32,
        /// Frame y offset.
        y: u32,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
        /// Canvas width.
        canvas_width: u32,
        /// Canvas height.
        canvas_height: u32,
    },

    /// Writing the container failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
