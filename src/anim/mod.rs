//! Animation engine.
//!
//! - [`Animation`]: frames plus canvas parameters, parsed from a container
//!   through a [`Demuxer`](crate::mux::Demuxer).
//! - [`AnimDecoder`]: replays frames onto a canvas, honoring blend and
//!   dispose modes.
//! - [`AnimEncoder`]: turns full canvases into an optimized sequence of
//!   sub-frames and commits them to a [`Muxer`](crate::mux::Muxer).
//!
//! Per-frame pixel coding is delegated to the traits in [`crate::codec`].

mod animation;
mod canvas;
mod decoder;
mod encoder;
mod frame;
mod image;

pub use animation::{argb_to_rgba, rgba_to_argb, Animation};
pub use canvas::{
    alpha_blend, fill_rect, find_changed_rect, is_lossless_blending_possible,
    is_lossy_blending_possible, pixels_are_similar, quality_to_max_diff, snap_to_even,
};
pub use decoder::{AnimDecoder, AnimFrame};
pub use encoder::{sanitize_keyframe_options, AnimEncoder, EncodeOptions, KeyframeBounds};
pub use frame::{Frame, Rect};
pub use image::RgbaImage;

pub use crate::mux::{BlendMethod, DisposeMethod};
