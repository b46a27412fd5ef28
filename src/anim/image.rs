//! Owned RGBA raster used for frames and canvases.

use rgb::{AsPixels, RGBA8};

use super::Rect;
use crate::error::{Error, Result};

/// Non-premultiplied RGBA8 image, row-major with a stride of `width * 4`.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Create a fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Create an image filled with one color.
    pub fn filled(width: u32, height: u32, color: RGBA8) -> Self {
        let mut img = Self::new(width, height);
        img.fill(color);
        img
    }

    /// Wrap an existing RGBA buffer. `data` must hold exactly
    /// `width * height * 4` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::invalid(format!(
                "RGBA buffer for {width}x{height} must be {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Raw RGBA bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw RGBA bytes.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the image and return its buffer.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Pixels as typed values.
    pub fn pixels(&self) -> &[RGBA8] {
        self.data.as_pixels()
    }

    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinates are outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> RGBA8 {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.pixels()[y as usize * self.width as usize + x as usize]
    }

    /// Set the pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinates are outside the image.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: RGBA8) {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = y as usize * self.width as usize + x as usize;
        let px: &mut [RGBA8] = self.data.as_pixels_mut();
        px[idx] = color;
    }

    /// Fill the whole image with one color.
    pub fn fill(&mut self, color: RGBA8) {
        let px: &mut [RGBA8] = self.data.as_pixels_mut();
        px.fill(color);
    }

    /// Full-image rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Copy out the pixels inside `rect`, which is clipped to the image.
    /// An empty result becomes a transparent 1x1 image.
    pub fn sub_image(&self, rect: Rect) -> RgbaImage {
        let rect = rect.intersect(&self.bounds());
        if rect.is_empty() {
            return RgbaImage::new(1, 1);
        }
        let row_len = rect.width as usize * 4;
        let mut data = Vec::with_capacity(row_len * rect.height as usize);
        for y in rect.y..rect.bottom() {
            let start = y as usize * self.stride() + rect.x as usize * 4;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        RgbaImage {
            width: rect.width,
            height: rect.height,
            data,
        }
    }

    /// Copy this image onto a transparent `width` x `height` canvas at (0, 0),
    /// cropping whatever does not fit.
    pub fn placed_on_canvas(&self, width: u32, height: u32) -> RgbaImage {
        let mut canvas = RgbaImage::new(width, height);
        let copy_w = self.width.min(width) as usize * 4;
        for y in 0..self.height.min(height) as usize {
            let src = y * self.stride();
            let dst = y * canvas.stride();
            canvas.data[dst..dst + copy_w].copy_from_slice(&self.data[src..src + copy_w]);
        }
        canvas
    }
}

impl core::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
