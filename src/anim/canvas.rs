//! Canvas operations shared by the animation decoder and encoder.
//!
//! All buffers are non-premultiplied RGBA8 with a stride of `width * 4`.

use rgb::RGBA8;

use super::{Rect, RgbaImage};
use crate::mux::BlendMethod;

/// Composite `src` over `dst` in non-premultiplied space.
///
/// Integer-only; matches the reference blender bit for bit:
/// `dst_factor = dst_a * (256 - src_a) >> 8`,
/// `out_a = src_a + dst_factor`,
/// `out_c = (src_c * src_a + dst_c * dst_factor) * ((1 << 24) / out_a) >> 24`.
#[inline]
pub fn alpha_blend(src: RGBA8, dst: RGBA8) -> RGBA8 {
    if src.a == 0 {
        return dst;
    }
    if src.a == 255 || dst.a == 0 {
        return src;
    }
    let src_a = u32::from(src.a);
    let dst_factor = (u32::from(dst.a) * (256 - src_a)) >> 8;
    let out_a = src_a + dst_factor;
    let scale = (1u32 << 24) / out_a;
    let channel = |s: u8, d: u8| -> u8 {
        let v = ((u32::from(s) * src_a + u32::from(d) * dst_factor) * scale) >> 24;
        v.min(255) as u8
    };
    RGBA8::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        out_a.min(255) as u8,
    )
}

/// Draw `src` onto `canvas` at `(offset_x, offset_y)`, clipped to the canvas.
///
/// Returns `false` when nothing of the frame lands on the canvas.
pub(crate) fn composite(
    canvas: &mut RgbaImage,
    src: &RgbaImage,
    offset_x: u32,
    offset_y: u32,
    blend: BlendMethod,
) -> bool {
    let rect =
        Rect::new(offset_x, offset_y, src.width(), src.height()).intersect(&canvas.bounds());
    if rect.is_empty() {
        return false;
    }
    let stride = canvas.stride();
    let src_stride = src.stride();
    let row_len = rect.width as usize * 4;
    let src_bytes = src.as_bytes();
    let dst_bytes = canvas.as_bytes_mut();
    for y in rect.y..rect.bottom() {
        let s = (y - offset_y) as usize * src_stride + (rect.x - offset_x) as usize * 4;
        let d = y as usize * stride + rect.x as usize * 4;
        let src_row = &src_bytes[s..s + row_len];
        let dst_row = &mut dst_bytes[d..d + row_len];
        match blend {
            BlendMethod::Overwrite => dst_row.copy_from_slice(src_row),
            BlendMethod::AlphaBlend => {
                for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                    let out = alpha_blend(
                        RGBA8::new(sp[0], sp[1], sp[2], sp[3]),
                        RGBA8::new(dp[0], dp[1], dp[2], dp[3]),
                    );
                    dp.copy_from_slice(&[out.r, out.g, out.b, out.a]);
                }
            }
        }
    }
    true
}

/// Fill `rect` (clipped to the canvas) with one color.
pub fn fill_rect(buf: &mut [u8], width: u32, height: u32, rect: Rect, color: RGBA8) {
    let rect = rect.intersect(&Rect::new(0, 0, width, height));
    if rect.is_empty() {
        return;
    }
    let stride = width as usize * 4;
    let px = [color.r, color.g, color.b, color.a];
    for y in rect.y..rect.bottom() {
        let start = y as usize * stride + rect.x as usize * 4;
        for dst in buf[start..start + rect.width as usize * 4].chunks_exact_mut(4) {
            dst.copy_from_slice(&px);
        }
    }
}

/// Bounding rectangle of the pixels that differ between two canvases of the
/// same size. Identical canvases give an empty rectangle.
pub fn find_changed_rect(prev: &[u8], curr: &[u8], width: u32, height: u32) -> Rect {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return Rect::default();
    }
    let stride = w * 4;
    fn row(buf: &[u8], stride: usize, y: usize) -> &[u8] {
        &buf[y * stride..(y + 1) * stride]
    }
    let row_differs = |y: usize| row(prev, stride, y) != row(curr, stride, y);

    let Some(min_y) = (0..h).find(|&y| row_differs(y)) else {
        return Rect::default();
    };
    let max_y = (min_y + 1..h).rev().find(|&y| row_differs(y)).unwrap_or(min_y) + 1;

    // Narrow the x range progressively; later rows only scan outside it.
    let mut min_x = w;
    let mut max_x = 0;
    for y in min_y..max_y {
        let (p, c) = (row(prev, stride, y), row(curr, stride, y));
        let px_differs = |x: usize| p[x * 4..x * 4 + 4] != c[x * 4..x * 4 + 4];
        if let Some(x) = (0..min_x).find(|&x| px_differs(x)) {
            min_x = x;
        }
        if let Some(x) = (max_x..w).rev().find(|&x| px_differs(x)) {
            max_x = x + 1;
        }
        if min_x == 0 && max_x == w {
            break;
        }
    }
    if max_x <= min_x {
        return Rect::default();
    }
    Rect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x) as u32,
        (max_y - min_y) as u32,
    )
}

/// Move odd offsets down to even ones, widening the rectangle by the same
/// amount so it still covers the original pixels.
#[inline]
pub fn snap_to_even(rect: Rect) -> Rect {
    Rect::new(
        rect.x & !1,
        rect.y & !1,
        rect.width + (rect.x & 1),
        rect.height + (rect.y & 1),
    )
}

/// Per-channel difference tolerated by lossy blending at a given quality:
/// `round(31 * (1 - sqrt(q)) + sqrt(q))` with `q = quality / 100`.
pub fn quality_to_max_diff(quality: u8) -> u32 {
    let val = (f64::from(quality) / 100.0).sqrt();
    let max_diff = 31.0 * (1.0 - val) + val;
    (max_diff + 0.5) as u32
}

/// True if two pixels are interchangeable for lossy blending: equal alpha
/// and every color channel within `max_diff` once weighted by alpha.
#[inline]
pub fn pixels_are_similar(src: RGBA8, dst: RGBA8, max_diff: u32) -> bool {
    if src.a != dst.a {
        return false;
    }
    let dst_a = u32::from(dst.a);
    let threshold = max_diff * 255;
    let close = |a: u8, b: u8| u32::from(a.abs_diff(b)) * dst_a <= threshold;
    close(src.r, dst.r) && close(src.g, dst.g) && close(src.b, dst.b)
}

#[inline]
fn pixel_at(buf: &[u8], stride: usize, x: u32, y: u32) -> RGBA8 {
    let i = y as usize * stride + x as usize * 4;
    RGBA8::new(buf[i], buf[i + 1], buf[i + 2], buf[i + 3])
}

fn blending_possible(
    src: &[u8],
    dst: &[u8],
    width: u32,
    rect: Rect,
    same: impl Fn(RGBA8, RGBA8) -> bool,
) -> bool {
    let stride = width as usize * 4;
    (rect.y..rect.bottom()).all(|y| {
        (rect.x..rect.right()).all(|x| {
            let d = pixel_at(dst, stride, x, y);
            d.a == 0xFF || same(pixel_at(src, stride, x, y), d)
        })
    })
}

/// Whether encoding `rect` of `dst` with alpha blending over `src`
/// reproduces `dst` exactly.
///
/// `src` is the canvas the frame will be drawn over, `dst` the target.
/// Every pixel must be opaque in `dst` or already equal in both.
pub fn is_lossless_blending_possible(src: &[u8], dst: &[u8], width: u32, rect: Rect) -> bool {
    blending_possible(src, dst, width, rect, |s, d| s == d)
}

/// Lossy variant of [`is_lossless_blending_possible`]: non-opaque target
/// pixels need only be similar within the quality-derived threshold.
pub fn is_lossy_blending_possible(
    src: &[u8],
    dst: &[u8],
    width: u32,
    rect: Rect,
    quality: u8,
) -> bool {
    let max_diff = quality_to_max_diff(quality);
    blending_possible(src, dst, width, rect, |s, d| {
        pixels_are_similar(s, d, max_diff)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: RGBA8 = RGBA8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    #[test]
    fn test_alpha_blend_shortcuts() {
        let dst = RGBA8::new(10, 20, 30, 200);
        assert_eq!(alpha_blend(RGBA8::new(1, 2, 3, 0), dst), dst);
        assert_eq!(alpha_blend(RED, dst), RED);
        let src = RGBA8::new(50, 60, 70, 100);
        assert_eq!(alpha_blend(src, RGBA8::new(0, 0, 0, 0)), src);
    }

    #[test]
    fn test_alpha_blend_formula() {
        // dst_factor = 255 * 128 >> 8 = 127, out_a = 255,
        // scale = 65793, r = (200*128 + 100*127) * 65793 >> 24 = 150.
        let out = alpha_blend(RGBA8::new(200, 0, 0, 128), RGBA8::new(100, 0, 255, 255));
        assert_eq!(out.a, 255);
        assert_eq!(out.r, 150);
        assert_eq!(out.b, 126);
    }

    #[test]
    fn test_find_changed_rect() {
        let a = RgbaImage::new(8, 8);
        let mut b = a.clone();
        assert!(find_changed_rect(a.as_bytes(), b.as_bytes(), 8, 8).is_empty());
        b.set_pixel(3, 2, RED);
        b.set_pixel(5, 6, RED);
        assert_eq!(
            find_changed_rect(a.as_bytes(), b.as_bytes(), 8, 8),
            Rect::new(3, 2, 3, 5)
        );
        b.set_pixel(0, 4, RED);
        assert_eq!(
            find_changed_rect(a.as_bytes(), b.as_bytes(), 8, 8),
            Rect::new(0, 2, 6, 5)
        );
    }

    #[test]
    fn test_snap_to_even_covers_input() {
        for x in 0..5u32 {
            for y in 0..5u32 {
                let r = Rect::new(x, y, 3, 2);
                let s = snap_to_even(r);
                assert_eq!(s.x % 2, 0);
                assert_eq!(s.y % 2, 0);
                assert!(s.x <= r.x && s.y <= r.y);
                assert_eq!(s.right(), r.right());
                assert_eq!(s.bottom(), r.bottom());
            }
        }
    }

    #[test]
    fn test_quality_to_max_diff() {
        assert_eq!(quality_to_max_diff(0), 31);
        assert_eq!(quality_to_max_diff(100), 1);
        // sqrt(0.25) = 0.5 -> 15.5 + 0.5 = 16
        assert_eq!(quality_to_max_diff(25), 16);
    }

    #[test]
    fn test_pixels_are_similar() {
        let a = RGBA8::new(100, 100, 100, 255);
        assert!(pixels_are_similar(a, RGBA8::new(104, 97, 100, 255), 4));
        assert!(!pixels_are_similar(a, RGBA8::new(106, 100, 100, 255), 4));
        assert!(!pixels_are_similar(a, RGBA8::new(100, 100, 100, 254), 4));
        // Fully transparent pixels always match in color.
        let t = RGBA8::new(0, 0, 0, 0);
        assert!(pixels_are_similar(t, RGBA8::new(255, 255, 255, 0), 1));
    }

    #[test]
    fn test_blending_possible() {
        let src = RgbaImage::filled(4, 4, RGBA8::new(0, 0, 0, 0));
        let mut dst = RgbaImage::filled(4, 4, RED);
        let full = Rect::new(0, 0, 4, 4);
        assert!(is_lossless_blending_possible(src.as_bytes(), dst.as_bytes(), 4, full));

        dst.set_pixel(1, 1, RGBA8::new(0, 0, 255, 128));
        assert!(!is_lossless_blending_possible(src.as_bytes(), dst.as_bytes(), 4, full));
        assert!(is_lossless_blending_possible(
            src.as_bytes(),
            dst.as_bytes(),
            4,
            Rect::new(2, 2, 2, 2)
        ));
        assert!(!is_lossy_blending_possible(src.as_bytes(), dst.as_bytes(), 4, full, 75));
    }

    #[test]
    fn test_composite_clips_and_blends() {
        let mut canvas = RgbaImage::filled(4, 4, RGBA8::new(0, 0, 255, 255));
        let frame = RgbaImage::filled(4, 4, RED);
        assert!(composite(&mut canvas, &frame, 2, 2, BlendMethod::Overwrite));
        assert_eq!(canvas.pixel(3, 3), RED);
        assert_eq!(canvas.pixel(1, 1), RGBA8::new(0, 0, 255, 255));
        assert!(!composite(&mut canvas, &frame, 4, 0, BlendMethod::Overwrite));

        let clear = RgbaImage::new(2, 2);
        composite(&mut canvas, &clear, 0, 0, BlendMethod::AlphaBlend);
        assert_eq!(canvas.pixel(0, 0), RGBA8::new(0, 0, 255, 255));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut img = RgbaImage::filled(4, 4, RED);
        fill_rect(img.as_bytes_mut(), 4, 4, Rect::new(2, 2, 10, 10), RGBA8::default());
        assert_eq!(img.pixel(3, 3).a, 0);
        assert_eq!(img.pixel(1, 3), RED);
    }
}
