//! Sharp RGB to YUV 4:2:0 conversion.
//!
//! Plain 4:2:0 conversion averages each 2x2 block before computing chroma,
//! which smears color edges. The sharp path instead iterates: it upsamples
//! its current chroma estimate, measures the luminance error against the
//! source in linear light, and feeds the error back into both planes.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_core::sharpyuv::{convert, SharpYuvOptions, YuvPlanes};
//!
//! let rgb = vec![128u8; 4 * 4 * 3];
//! let mut planes = YuvPlanes::new_420(4, 4);
//! convert(&rgb, 4, 4, 4 * 3, &mut planes, &SharpYuvOptions::default())?;
//! assert_eq!(planes.u.len(), 4);
//! # Ok::<(), zenwebp_core::Error>(())
//! ```

mod csp;
mod gamma;

pub use csp::{ColorSpace, ConversionMatrix, MatrixType, YuvRange, YUV_FIX};
pub use gamma::{gamma_to_linear, linear_to_gamma, TransferFunction};

use csp::{rgb_to_component, YUV_HALF};
use gamma::shift_val;
use log::trace;

use crate::error::{Error, Result};

/// Maximum refinement passes.
const NUM_ITERATIONS: usize = 4;
const MAX_BIT_DEPTH: u32 = 14;

/// Chroma layout of a [`YuvPlanes`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// Chroma at half resolution in both directions.
    Yuv420,
    /// Chroma at half horizontal resolution.
    Yuv422,
    /// Chroma at full resolution.
    Yuv444,
}

/// Planar YUV output buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvPlanes {
    /// Luma plane (full resolution).
    pub y: Vec<u8>,
    /// Chroma blue plane.
    pub u: Vec<u8>,
    /// Chroma red plane.
    pub v: Vec<u8>,
    /// Width of the luma plane in pixels.
    pub y_width: u32,
    /// Height of the luma plane in pixels.
    pub y_height: u32,
    /// Width of each chroma plane in pixels.
    pub uv_width: u32,
    /// Height of each chroma plane in pixels.
    pub uv_height: u32,
    /// Chroma layout.
    pub subsampling: ChromaSubsampling,
}

impl YuvPlanes {
    /// Allocate zeroed 4:2:0 planes for a `width` x `height` image.
    pub fn new_420(width: u32, height: u32) -> Self {
        let uv_width = width.div_ceil(2);
        let uv_height = height.div_ceil(2);
        let y_len = width as usize * height as usize;
        let uv_len = uv_width as usize * uv_height as usize;
        Self {
            y: vec![0; y_len],
            u: vec![0; uv_len],
            v: vec![0; uv_len],
            y_width: width,
            y_height: height,
            uv_width,
            uv_height,
            subsampling: ChromaSubsampling::Yuv420,
        }
    }

    /// Row stride of the luma plane.
    pub fn y_stride(&self) -> usize {
        self.y_width as usize
    }

    /// Row stride of the chroma planes.
    pub fn uv_stride(&self) -> usize {
        self.uv_width as usize
    }
}

/// Conversion settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpYuvOptions {
    /// RGB to YUV matrix. `None` is rejected by [`convert`].
    pub matrix: Option<ConversionMatrix>,
    /// Transfer function of the input RGB.
    pub transfer: TransferFunction,
    /// Use iterative sharp downsampling instead of 2x2 averaging.
    pub sharp: bool,
}

impl Default for SharpYuvOptions {
    fn default() -> Self {
        Self {
            matrix: Some(ConversionMatrix::predefined(MatrixType::WebP)),
            transfer: TransferFunction::Srgb,
            sharp: true,
        }
    }
}

/// Convert packed 8-bit RGB into 4:2:0 YUV.
///
/// `rgb` holds `height` rows of `width * 3` bytes, `stride` bytes apart.
/// `out` must be 4:2:0 planes sized for `width` x `height`.
pub fn convert(
    rgb: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    out: &mut YuvPlanes,
    options: &SharpYuvOptions,
) -> Result<()> {
    if width == 0 || height == 0 || stride == 0 {
        return Err(Error::invalid("sharpyuv: invalid dimensions"));
    }
    if out.subsampling != ChromaSubsampling::Yuv420 {
        return Err(Error::invalid("sharpyuv: output must be YUV 4:2:0"));
    }
    let Some(matrix) = options.matrix.as_ref() else {
        return Err(Error::invalid("sharpyuv: missing conversion matrix"));
    };
    let (w, h) = (width as usize, height as usize);
    let needed = (h as u64 - 1) * stride as u64 + w as u64 * 3;
    if needed > rgb.len() as u64 {
        return Err(Error::invalid("sharpyuv: rgb buffer too small"));
    }
    let uv_w = w.div_ceil(2);
    let uv_h = h.div_ceil(2);
    if out.y.len() < out.y_stride() * (h - 1) + w
        || out.y_stride() < w
        || out.uv_stride() < uv_w
        || out.u.len() < out.uv_stride() * (uv_h - 1) + uv_w
        || out.v.len() < out.uv_stride() * (uv_h - 1) + uv_w
    {
        return Err(Error::invalid("sharpyuv: output planes too small"));
    }

    trace!("sharpyuv: {width}x{height} sharp={}", options.sharp);
    if options.sharp {
        convert_sharp(rgb, w, h, stride, out, matrix, options.transfer);
    } else {
        convert_standard(rgb, w, h, stride, out, matrix);
    }
    Ok(())
}

#[inline]
fn clip_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

fn convert_standard(
    rgb: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    out: &mut YuvPlanes,
    matrix: &ConversionMatrix,
) {
    let y_stride = out.y_stride();
    for j in 0..height {
        let row = &rgb[j * stride..];
        for (i, px) in row.chunks_exact(3).take(width).enumerate() {
            let y = rgb_to_component(
                i32::from(px[0]),
                i32::from(px[1]),
                i32::from(px[2]),
                &matrix.rgb_to_y,
            );
            out.y[j * y_stride + i] = clip_u8(y);
        }
    }

    let uv_stride = out.uv_stride();
    for j in 0..height.div_ceil(2) {
        for i in 0..width.div_ceil(2) {
            let (mut sum, mut count) = ([0i32; 3], 0i32);
            for yy in (j * 2..j * 2 + 2).filter(|&yy| yy < height) {
                for xx in (i * 2..i * 2 + 2).filter(|&xx| xx < width) {
                    let off = yy * stride + xx * 3;
                    for c in 0..3 {
                        sum[c] += i32::from(rgb[off + c]);
                    }
                    count += 1;
                }
            }
            let [r, g, b] = sum.map(|s| (s + count / 2) / count);
            out.u[j * uv_stride + i] = clip_u8(rgb_to_component(r, g, b, &matrix.rgb_to_u));
            out.v[j * uv_stride + i] = clip_u8(rgb_to_component(r, g, b, &matrix.rgb_to_v));
        }
    }
}

/// Extra internal precision bits for `bit_depth` input.
fn precision_shift(bit_depth: u32) -> u32 {
    if bit_depth + 2 <= MAX_BIT_DEPTH {
        2
    } else {
        MAX_BIT_DEPTH - bit_depth
    }
}

#[inline]
fn rgb_to_gray(r: i64, g: i64, b: i64) -> i32 {
    ((13933 * r + 46871 * g + 4732 * b + YUV_HALF) >> YUV_FIX) as i32
}

#[inline]
fn clip_bit_depth(y: i32, bit_depth: u32) -> u16 {
    y.clamp(0, (1 << bit_depth) - 1) as u16
}

/// Average a 2x2 block in linear light.
fn scale_down(a: u16, b: u16, c: u16, d: u16, bit_depth: u32, tf: TransferFunction) -> i32 {
    let la = gamma_to_linear(a, bit_depth, tf);
    let lb = gamma_to_linear(b, bit_depth, tf);
    let lc = gamma_to_linear(c, bit_depth, tf);
    let ld = gamma_to_linear(d, bit_depth, tf);
    i32::from(linear_to_gamma((la + lb + lc + ld + 2) >> 2, bit_depth, tf))
}

/// Working buffers of the sharp path. Rows are planar: `[R.., G.., B..]`.
struct SharpState {
    w: usize,
    uv_w: usize,
    bit_depth: u32,
    tf: TransferFunction,
    tmp1: Vec<u16>,
    tmp2: Vec<u16>,
    best_y: Vec<u16>,
    target_y: Vec<u16>,
    best_uv: Vec<i16>,
    target_uv: Vec<i16>,
    best_rgb_y: Vec<u16>,
    best_rgb_uv: Vec<i16>,
}

fn import_one_row(rgb: &[u8], row: usize, stride: usize, pic_width: usize, w: usize, sfix: u32, dst: &mut [u16]) {
    let src = &rgb[row * stride..];
    for (i, px) in src.chunks_exact(3).take(pic_width).enumerate() {
        for c in 0..3 {
            dst[i + c * w] = u16::from(px[c]) << sfix;
        }
    }
    if pic_width < w {
        for c in 0..3 {
            dst[pic_width + c * w] = dst[pic_width - 1 + c * w];
        }
    }
}

fn store_gray(src: &[u16], dst: &mut [u16], w: usize) {
    for i in 0..w {
        let gray = rgb_to_gray(
            i64::from(src[i]),
            i64::from(src[i + w]),
            i64::from(src[i + 2 * w]),
        );
        dst[i] = gray as u16;
    }
}

/// Luminance of each pixel, computed in linear light.
fn update_w(src: &[u16], dst: &mut [u16], w: usize, bit_depth: u32, tf: TransferFunction) {
    for i in 0..w {
        let r = gamma_to_linear(src[i], bit_depth, tf);
        let g = gamma_to_linear(src[i + w], bit_depth, tf);
        let b = gamma_to_linear(src[i + 2 * w], bit_depth, tf);
        let y = rgb_to_gray(i64::from(r), i64::from(g), i64::from(b));
        dst[i] = linear_to_gamma(y as u32, bit_depth, tf);
    }
}

/// Chroma residual (channel minus gray) of each 2x2 block.
fn update_chroma(
    src1: &[u16],
    src2: &[u16],
    dst: &mut [i16],
    uv_w: usize,
    bit_depth: u32,
    tf: TransferFunction,
) {
    let w = uv_w * 2;
    for i in 0..uv_w {
        let i2 = i * 2;
        let [r, g, b] = [0, w, 2 * w].map(|o| {
            scale_down(
                src1[o + i2],
                src1[o + i2 + 1],
                src2[o + i2],
                src2[o + i2 + 1],
                bit_depth,
                tf,
            )
        });
        let gray = rgb_to_gray(i64::from(r), i64::from(g), i64::from(b));
        dst[i] = (r - gray) as i16;
        dst[i + uv_w] = (g - gray) as i16;
        dst[i + 2 * uv_w] = (b - gray) as i16;
    }
}

#[inline]
fn filter2(a: i32, b: i32, w0: i32, bit_depth: u32) -> u16 {
    let v0 = (a * 3 + b + 2) >> 2;
    clip_bit_depth(v0 + w0, bit_depth)
}

/// Upsample chroma for one pair of rows and add it to the luminance.
#[allow(clippy::too_many_arguments)]
fn interpolate_two_rows(
    best_y: &[u16],
    prev_uv: &[i16],
    cur_uv: &[i16],
    next_uv: &[i16],
    w: usize,
    out1: &mut [u16],
    out2: &mut [u16],
    bit_depth: u32,
) {
    let uv_w = w >> 1;
    let filter_len = (w - 1) >> 1;
    let y = |i: usize| i32::from(best_y[i]);

    for k in 0..3 {
        let k_uv = k * uv_w;
        let k_w = k * w;
        let cur = |i: usize| i32::from(cur_uv[k_uv + i]);
        let prev = |i: usize| i32::from(prev_uv[k_uv + i]);
        let next = |i: usize| i32::from(next_uv[k_uv + i]);

        out1[k_w] = filter2(cur(0), prev(0), y(0), bit_depth);
        out2[k_w] = filter2(cur(0), next(0), y(w), bit_depth);

        for i in 0..filter_len {
            let (a0, a1) = (cur(i), cur(i + 1));
            let (b0, b1) = (prev(i), prev(i + 1));
            let v0 = (a0 * 9 + a1 * 3 + b0 * 3 + b1 + 8) >> 4;
            let v1 = (a1 * 9 + a0 * 3 + b1 * 3 + b0 + 8) >> 4;
            out1[k_w + 2 * i + 1] = clip_bit_depth(y(2 * i + 1) + v0, bit_depth);
            out1[k_w + 2 * i + 2] = clip_bit_depth(y(2 * i + 2) + v1, bit_depth);

            let (n0, n1) = (next(i), next(i + 1));
            let v0 = (a0 * 9 + a1 * 3 + n0 * 3 + n1 + 8) >> 4;
            let v1 = (a1 * 9 + a0 * 3 + n1 * 3 + n0 + 8) >> 4;
            out2[k_w + 2 * i + 1] = clip_bit_depth(y(w + 2 * i + 1) + v0, bit_depth);
            out2[k_w + 2 * i + 2] = clip_bit_depth(y(w + 2 * i + 2) + v1, bit_depth);
        }

        if w & 1 == 0 {
            let last = uv_w - 1;
            out1[k_w + w - 1] = filter2(cur(last), prev(last), y(w - 1), bit_depth);
            out2[k_w + w - 1] = filter2(cur(last), next(last), y(2 * w - 1), bit_depth);
        }
    }
}

/// Move `dst` toward `target` by the error of `src`; returns the absolute error sum.
fn update_y(target: &[u16], src: &[u16], dst: &mut [u16], len: usize, bit_depth: u32) -> u64 {
    let max_y = (1i32 << bit_depth) - 1;
    let mut diff = 0u64;
    for i in 0..len {
        let diff_y = i32::from(target[i]) - i32::from(src[i]);
        let new_y = i32::from(dst[i]) + diff_y;
        dst[i] = new_y.clamp(0, max_y) as u16;
        diff += u64::from(diff_y.unsigned_abs());
    }
    diff
}

fn update_rgb(target: &[i16], src: &[i16], dst: &mut [i16], len: usize) {
    for i in 0..len {
        let diff_uv = target[i].wrapping_sub(src[i]);
        dst[i] = dst[i].wrapping_add(diff_uv);
    }
}

fn convert_sharp(
    rgb: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    out: &mut YuvPlanes,
    matrix: &ConversionMatrix,
    tf: TransferFunction,
) {
    let w = (width + 1) & !1;
    let h = (height + 1) & !1;
    let uv_w = w >> 1;
    let uv_h = h >> 1;
    let sfix = precision_shift(8);
    let bit_depth = 8 + sfix;

    let mut st = SharpState {
        w,
        uv_w,
        bit_depth,
        tf,
        tmp1: vec![0; 3 * w],
        tmp2: vec![0; 3 * w],
        best_y: vec![0; w * h],
        target_y: vec![0; w * h],
        best_uv: vec![0; 3 * uv_w * uv_h],
        target_uv: vec![0; 3 * uv_w * uv_h],
        best_rgb_y: vec![0; 2 * w],
        best_rgb_uv: vec![0; 3 * uv_w],
    };

    // Initial luminance and chroma from the source rows.
    for j in (0..height).step_by(2) {
        import_one_row(rgb, j, stride, width, w, sfix, &mut st.tmp1);
        if j + 1 < height {
            import_one_row(rgb, j + 1, stride, width, w, sfix, &mut st.tmp2);
        } else {
            st.tmp2.copy_from_slice(&st.tmp1);
        }
        let y_off = j * w;
        let uv_off = (j / 2) * 3 * uv_w;

        store_gray(&st.tmp1, &mut st.best_y[y_off..], w);
        store_gray(&st.tmp2, &mut st.best_y[y_off + w..], w);
        update_w(&st.tmp1, &mut st.target_y[y_off..], w, bit_depth, tf);
        update_w(&st.tmp2, &mut st.target_y[y_off + w..], w, bit_depth, tf);
        update_chroma(&st.tmp1, &st.tmp2, &mut st.target_uv[uv_off..], uv_w, bit_depth, tf);
        st.best_uv[uv_off..uv_off + 3 * uv_w]
            .copy_from_slice(&st.target_uv[uv_off..uv_off + 3 * uv_w]);
    }

    let threshold = (3 * w * h) as u64;
    let mut prev_diff = u64::MAX;
    for iter in 0..NUM_ITERATIONS {
        let diff = st.refine(h);
        trace!("sharpyuv: pass {iter} diff {diff}");
        if iter > 0 && (diff < threshold || diff > prev_diff) {
            break;
        }
        prev_diff = diff;
    }

    convert_wrgb_to_yuv(&st, width, height, uv_h, sfix, matrix, out);
}

impl SharpState {
    /// One refinement pass over all row pairs.
    fn refine(&mut self, h: usize) -> u64 {
        let (w, uv_w, bit_depth, tf) = (self.w, self.uv_w, self.bit_depth, self.tf);
        let row_uv = 3 * uv_w;
        let mut diff = 0u64;
        for j in (0..h).step_by(2) {
            let j_uv = j / 2;
            let cur = j_uv * row_uv;
            let prev = if j_uv > 0 { cur - row_uv } else { cur };
            let next = if j + 2 < h { cur + row_uv } else { cur };
            let y_off = j * w;

            interpolate_two_rows(
                &self.best_y[y_off..],
                &self.best_uv[prev..],
                &self.best_uv[cur..],
                &self.best_uv[next..],
                w,
                &mut self.tmp1,
                &mut self.tmp2,
                bit_depth,
            );
            let (y1, y2) = self.best_rgb_y.split_at_mut(w);
            update_w(&self.tmp1, y1, w, bit_depth, tf);
            update_w(&self.tmp2, y2, w, bit_depth, tf);
            update_chroma(&self.tmp1, &self.tmp2, &mut self.best_rgb_uv, uv_w, bit_depth, tf);

            diff += update_y(
                &self.target_y[y_off..],
                &self.best_rgb_y,
                &mut self.best_y[y_off..],
                2 * w,
                bit_depth,
            );
            update_rgb(
                &self.target_uv[cur..],
                &self.best_rgb_uv,
                &mut self.best_uv[cur..],
                row_uv,
            );
        }
        diff
    }
}

fn convert_wrgb_to_yuv(
    st: &SharpState,
    width: usize,
    height: usize,
    uv_h: usize,
    sfix: u32,
    matrix: &ConversionMatrix,
    out: &mut YuvPlanes,
) {
    let (w, uv_w) = (st.w, st.uv_w);
    let out_shift = YUV_FIX + sfix;
    let rounder = 1i64 << (out_shift - 1);
    // coefficient products carry sfix extra bits; the offsets must match
    let y_off = shift_val(i64::from(matrix.rgb_to_y[3]), sfix as i32);
    let u_off = shift_val(i64::from(matrix.rgb_to_u[3]), sfix as i32);
    let v_off = shift_val(i64::from(matrix.rgb_to_v[3]), sfix as i32);
    let apply = |c: &[i32; 4], off: i64, r: i64, g: i64, b: i64| {
        let sum = i64::from(c[0]) * r + i64::from(c[1]) * g + i64::from(c[2]) * b + off + rounder;
        clip_u8((sum >> out_shift) as i32)
    };

    let y_stride = out.y_stride();
    for j in 0..height {
        for i in 0..width {
            let uv = (j / 2) * 3 * uv_w + (i >> 1);
            let wv = i64::from(st.best_y[j * w + i]);
            let r = i64::from(st.best_uv[uv]) + wv;
            let g = i64::from(st.best_uv[uv + uv_w]) + wv;
            let b = i64::from(st.best_uv[uv + 2 * uv_w]) + wv;
            out.y[j * y_stride + i] = apply(&matrix.rgb_to_y, y_off, r, g, b);
        }
    }

    let uv_stride = out.uv_stride();
    for j in 0..uv_h {
        for i in 0..uv_w {
            let uv = j * 3 * uv_w + i;
            let r = i64::from(st.best_uv[uv]);
            let g = i64::from(st.best_uv[uv + uv_w]);
            let b = i64::from(st.best_uv[uv + 2 * uv_w]);
            out.u[j * uv_stride + i] = apply(&matrix.rgb_to_u, u_off, r, g, b);
            out.v[j * uv_stride + i] = apply(&matrix.rgb_to_v, v_off, r, g, b);
        }
    }
}
