//! Frame and rectangle types.

use super::RgbaImage;
use crate::mux::{BlendMethod, DisposeMethod};

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// True when the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Overlap of two rectangles. Disjoint inputs give an empty rectangle.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return Rect::default();
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// True if the rectangle is exactly the `width` x `height` canvas.
    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// One frame of an animation.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Decoded pixels. `None` until the frame is decoded.
    pub image: Option<RgbaImage>,
    /// Display duration in milliseconds, at most 2^24 - 1.
    pub duration_ms: u32,
    /// Horizontal offset on the canvas (even).
    pub offset_x: u32,
    /// Vertical offset on the canvas (even).
    pub offset_y: u32,
    /// Width declared by the container.
    pub width: u32,
    /// Height declared by the container.
    pub height: u32,
    /// What happens to the frame rectangle after display.
    pub dispose: DisposeMethod,
    /// How the frame is composited.
    pub blend: BlendMethod,
    /// True if the frame does not depend on earlier canvas state.
    pub is_keyframe: bool,
    /// The bitstream signals alpha (ALPH chunk or VP8L alpha bit).
    pub has_alpha: bool,
    /// Raw VP8 or VP8L bitstream.
    pub bitstream: Vec<u8>,
    /// Raw ALPH payload for lossy frames with transparency.
    pub alpha: Option<Vec<u8>>,
}

impl Frame {
    /// Frame rectangle on the canvas, sized from the decoded image when
    /// present and from the container otherwise.
    pub fn bounds(&self) -> Rect {
        let (w, h) = match &self.image {
            Some(img) => (img.width(), img.height()),
            None => (self.width, self.height),
        };
        Rect::new(self.offset_x, self.offset_y, w, h)
    }

    /// True once the frame has pixels.
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub(crate) fn needs_decode(&self) -> bool {
        self.image.is_none() && !self.bitstream.is_empty()
    }
}
