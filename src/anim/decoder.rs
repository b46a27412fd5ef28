//! Canvas reconstruction for decoded animations.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_core::anim::{AnimDecoder, Animation, Frame, RgbaImage};
//! use zenwebp_core::rgb::RGBA8;
//!
//! let mut anim = Animation::new(2, 2);
//! anim.frames.push(Frame {
//!     image: Some(RgbaImage::filled(2, 2, RGBA8::new(255, 0, 0, 255))),
//!     duration_ms: 100,
//!     ..Default::default()
//! });
//!
//! let mut decoder = AnimDecoder::new(&anim);
//! while decoder.has_next() {
//!     let frame = decoder.next_frame()?;
//!     println!("frame at {}ms, duration {}ms", frame.timestamp_ms, frame.duration_ms);
//! }
//! # Ok::<(), zenwebp_core::Error>(())
//! ```

use log::trace;

use super::canvas::{composite, fill_rect};
use super::{Animation, Frame, Rect, RgbaImage};
use crate::error::{Error, Result};
use crate::mux::{BlendMethod, DisposeMethod};

/// One reconstructed canvas snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimFrame {
    /// Full canvas after this frame was drawn.
    pub image: RgbaImage,
    /// Presentation time of the frame, the sum of earlier durations.
    pub timestamp_ms: u64,
    /// Display duration of this frame in milliseconds.
    pub duration_ms: u32,
}

/// Frame-by-frame canvas reconstruction.
///
/// Keeps two canvases: the one being composed and the previous canvas with
/// its dispose method already applied. Each frame starts from the latter
/// unless it is a keyframe, which starts from a transparent canvas.
#[derive(Debug)]
pub struct AnimDecoder<'a> {
    anim: &'a Animation,
    curr: RgbaImage,
    prev_disposed: RgbaImage,
    pos: usize,
    timestamp_ms: u64,
    prev_was_keyframe: bool,
    prev_dispose: DisposeMethod,
    prev_bounds: Rect,
}

impl<'a> AnimDecoder<'a> {
    /// Start at the first frame with a transparent canvas.
    pub fn new(anim: &'a Animation) -> Self {
        Self {
            anim,
            curr: RgbaImage::new(anim.canvas_width, anim.canvas_height),
            prev_disposed: RgbaImage::new(anim.canvas_width, anim.canvas_height),
            pos: 0,
            timestamp_ms: 0,
            prev_was_keyframe: false,
            prev_dispose: DisposeMethod::None,
            prev_bounds: Rect::default(),
        }
    }

    /// Whether another frame is available.
    pub fn has_next(&self) -> bool {
        self.pos < self.anim.frames.len()
    }

    /// Number of frames returned so far.
    pub fn frames_read(&self) -> usize {
        self.pos
    }

    /// The canvas as composed by the last call to [`AnimDecoder::next_frame`].
    pub fn canvas(&self) -> &RgbaImage {
        &self.curr
    }

    /// Rewind to the first frame and clear both canvases.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.timestamp_ms = 0;
        self.curr.as_bytes_mut().fill(0);
        self.prev_disposed.as_bytes_mut().fill(0);
        self.prev_was_keyframe = false;
        self.prev_dispose = DisposeMethod::None;
        self.prev_bounds = Rect::default();
    }

    fn is_keyframe(&self, index: usize, frame: &Frame) -> bool {
        if index == 0 {
            return true;
        }
        let (w, h) = (self.anim.canvas_width, self.anim.canvas_height);
        if frame.bounds().is_full(w, h)
            && (!frame.has_alpha || frame.blend == BlendMethod::Overwrite)
        {
            return true;
        }
        self.prev_dispose == DisposeMethod::Background
            && (self.prev_bounds.is_full(w, h) || self.prev_was_keyframe)
    }

    /// Compose the next frame and return a snapshot of the canvas.
    pub fn next_frame(&mut self) -> Result<AnimFrame> {
        let index = self.pos;
        let frame = self.anim.frames.get(index).ok_or(Error::NoFrames)?;
        let image = frame
            .image
            .as_ref()
            .ok_or(Error::MissingPixels { index })?;

        let keyframe = self.is_keyframe(index, frame);
        if keyframe {
            self.curr.as_bytes_mut().fill(0);
        } else {
            self.curr
                .as_bytes_mut()
                .copy_from_slice(self.prev_disposed.as_bytes());
        }

        if !composite(
            &mut self.curr,
            image,
            frame.offset_x,
            frame.offset_y,
            frame.blend,
        ) {
            trace!("frame {index} lies outside the canvas, nothing drawn");
        }
        let snapshot = self.curr.clone();

        self.prev_disposed
            .as_bytes_mut()
            .copy_from_slice(self.curr.as_bytes());
        let bounds = frame.bounds();
        if frame.dispose == DisposeMethod::Background {
            let (w, h) = (self.prev_disposed.width(), self.prev_disposed.height());
            fill_rect(
                self.prev_disposed.as_bytes_mut(),
                w,
                h,
                bounds,
                Default::default(),
            );
        }

        self.prev_was_keyframe = keyframe;
        self.prev_dispose = frame.dispose;
        self.prev_bounds = bounds;
        self.pos += 1;

        let timestamp_ms = self.timestamp_ms;
        self.timestamp_ms += u64::from(frame.duration_ms);
        trace!("frame {index}: keyframe={keyframe} t={timestamp_ms}ms");
        Ok(AnimFrame {
            image: snapshot,
            timestamp_ms,
            duration_ms: frame.duration_ms,
        })
    }

    /// Rewind and compose every frame.
    pub fn decode_all(&mut self) -> Result<Vec<AnimFrame>> {
        self.reset();
        let mut frames = Vec::with_capacity(self.anim.frames.len());
        while self.has_next() {
            frames.push(self.next_frame()?);
        }
        Ok(frames)
    }
}

impl Iterator for AnimDecoder<'_> {
    type Item = Result<AnimFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.next_frame())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA8;

    const RED: RGBA8 = RGBA8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };
    const BLUE: RGBA8 = RGBA8 {
        r: 0,
        g: 0,
        b: 255,
        a: 255,
    };

    fn frame(img: RgbaImage, x: u32, y: u32) -> Frame {
        Frame {
            width: img.width(),
            height: img.height(),
            image: Some(img),
            offset_x: x,
            offset_y: y,
            duration_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_exhausted_and_missing_pixels() {
        let mut anim = Animation::new(2, 2);
        anim.frames.push(Frame::default());
        let mut dec = AnimDecoder::new(&anim);
        assert!(matches!(
            dec.next_frame(),
            Err(Error::MissingPixels { index: 0 })
        ));

        let empty = Animation::new(2, 2);
        let mut dec = AnimDecoder::new(&empty);
        assert!(matches!(dec.next_frame(), Err(Error::NoFrames)));
        assert!(dec.next().is_none());
    }

    #[test]
    fn test_alpha_blend_over_previous() {
        let mut anim = Animation::new(4, 4);
        anim.frames.push(frame(RgbaImage::filled(4, 4, BLUE), 0, 0));
        let mut f = frame(RgbaImage::filled(2, 2, RGBA8::new(255, 0, 0, 0)), 2, 2);
        f.has_alpha = true;
        anim.frames.push(f);
        let snaps: Vec<_> = AnimDecoder::new(&anim).map(|r| r.unwrap()).collect();
        // A fully transparent blended frame leaves the canvas unchanged.
        assert_eq!(snaps[1].image, snaps[0].image);
        assert_eq!(snaps[1].timestamp_ms, 10);
    }

    #[test]
    fn test_keyframe_after_full_dispose() {
        let mut anim = Animation::new(4, 4);
        let mut first = frame(RgbaImage::filled(4, 4, RED), 0, 0);
        first.dispose = DisposeMethod::Background;
        anim.frames.push(first);
        let mut second = frame(RgbaImage::filled(2, 2, BLUE), 0, 0);
        second.has_alpha = true;
        anim.frames.push(second);

        let mut dec = AnimDecoder::new(&anim);
        dec.next_frame().unwrap();
        let snap = dec.next_frame().unwrap();
        assert_eq!(snap.image.pixel(1, 1), BLUE);
        assert_eq!(snap.image.pixel(3, 3).a, 0);
    }

    #[test]
    fn test_partial_dispose_keeps_rest() {
        let mut anim = Animation::new(4, 4);
        anim.frames.push(frame(RgbaImage::filled(4, 4, RED), 0, 0));
        let mut patch = frame(RgbaImage::filled(2, 2, BLUE), 2, 0);
        patch.dispose = DisposeMethod::Background;
        anim.frames.push(patch);
        let mut third = frame(RgbaImage::filled(2, 2, RED), 0, 2);
        third.blend = BlendMethod::AlphaBlend;
        anim.frames.push(third);

        let snaps = AnimDecoder::new(&anim).decode_all_frames();
        assert_eq!(snaps[1].image.pixel(3, 0), BLUE);
        // The patch area was cleared after frame 1.
        assert_eq!(snaps[2].image.pixel(3, 0).a, 0);
        assert_eq!(snaps[2].image.pixel(0, 0), RED);
    }

    #[test]
    fn test_reset_replays() {
        let mut anim = Animation::new(2, 2);
        anim.frames.push(frame(RgbaImage::filled(2, 2, RED), 0, 0));
        anim.frames.push(frame(RgbaImage::filled(2, 2, BLUE), 0, 0));
        let mut dec = AnimDecoder::new(&anim);
        let first = dec.decode_all().unwrap();
        assert_eq!(dec.frames_read(), 2);
        assert_eq!(dec.canvas().pixel(0, 0), BLUE);
        dec.reset();
        assert_eq!(dec.frames_read(), 0);
        let second = dec.decode_all().unwrap();
        assert_eq!(first, second);
    }

    impl AnimDecoder<'_> {
        fn decode_all_frames(mut self) -> Vec<AnimFrame> {
            self.decode_all().unwrap()
        }
    }
}
