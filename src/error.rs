//! Error types for the animation engine and conversion routines.

use thiserror::Error;

use crate::mux::MuxError;

/// Boxed error returned by codec callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate-wide result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors produced by the animation engine and SharpYUV.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Null/empty input, zero dimensions, undersized buffers or a bad format
    /// combination.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Frames need decoding but no frame decoder is attached.
    #[error("No frame decoder attached")]
    NoDecoder,

    /// A frame was added but no frame encoder is attached.
    #[error("No frame encoder attached")]
    NoEncoder,

    /// The animation is exhausted or empty.
    #[error("No more frames")]
    NoFrames,

    /// A frame reached the compositor without decoded pixels.
    #[error("Frame {index} has no decoded pixels")]
    MissingPixels {
        /// Index of the offending frame.
        index: usize,
    },

    /// The encoder was already finalized.
    #[error("Encoder is closed")]
    EncoderClosed,

    /// A codec callback reported a failure.
    #[error("Codec failure: {0}")]
    CodecFailure(#[source] BoxError),

    /// The muxer or demuxer rejected the data.
    #[error(transparent)]
    Mux(#[from] MuxError),

    /// Writing the assembled container failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
