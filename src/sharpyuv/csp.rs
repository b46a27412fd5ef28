//! RGB to YUV conversion matrices.

/// Fixed-point precision of the matrix coefficients.
pub const YUV_FIX: u32 = 16;
pub(crate) const YUV_HALF: i64 = 1 << (YUV_FIX - 1);

/// Range of the produced YUV samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvRange {
    /// `[0, 255]` for 8-bit output.
    Full,
    /// Y in `[16, 235]`, U/V in `[16, 240]` for 8-bit output.
    Limited,
}

/// Luma coefficients and quantization parameters of a YUV color space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSpace {
    /// Red luma weight.
    pub kr: f64,
    /// Blue luma weight.
    pub kb: f64,
    /// Output bit depth (8, 10 or 12).
    pub bit_depth: u32,
    /// Output range.
    pub range: YuvRange,
}

impl ColorSpace {
    /// Rec. 601, limited range.
    pub const BT601: Self = Self::new(0.2990, 0.1140, YuvRange::Limited);
    /// Rec. 709, limited range.
    pub const BT709: Self = Self::new(0.2126, 0.0722, YuvRange::Limited);
    /// Rec. 601, full range.
    pub const BT601_FULL: Self = Self::new(0.2990, 0.1140, YuvRange::Full);
    /// Rec. 709, full range.
    pub const BT709_FULL: Self = Self::new(0.2126, 0.0722, YuvRange::Full);

    const fn new(kr: f64, kb: f64, range: YuvRange) -> Self {
        Self {
            kr,
            kb,
            bit_depth: 8,
            range,
        }
    }

    /// Derive the 16-bit fixed-point matrix for this color space.
    pub fn conversion_matrix(&self) -> ConversionMatrix {
        let kr = self.kr;
        let kb = self.kb;
        let kg = 1.0 - kr - kb;
        let cb = 0.5 / (1.0 - kb);
        let cr = 0.5 / (1.0 - kr);

        let shift = self.bit_depth.saturating_sub(8);
        let denom = ((1u64 << self.bit_depth) - 1) as f64;

        let mut scale_y = 1.0;
        let mut add_y = 0.0;
        let mut scale_u = cb;
        let mut scale_v = cr;
        let add_uv = f64::from(128u32 << shift);

        if self.range == YuvRange::Limited {
            scale_y *= f64::from(219u32 << shift) / denom;
            scale_u *= f64::from(224u32 << shift) / denom;
            scale_v *= f64::from(224u32 << shift) / denom;
            add_y = f64::from(16u32 << shift);
        }

        ConversionMatrix {
            rgb_to_y: [
                to_fixed16(kr * scale_y),
                to_fixed16(kg * scale_y),
                to_fixed16(kb * scale_y),
                to_fixed16(add_y),
            ],
            rgb_to_u: [
                to_fixed16(-kr * scale_u),
                to_fixed16(-kg * scale_u),
                to_fixed16((1.0 - kb) * scale_u),
                to_fixed16(add_uv),
            ],
            rgb_to_v: [
                to_fixed16((1.0 - kr) * scale_v),
                to_fixed16(-kg * scale_v),
                to_fixed16(-kb * scale_v),
                to_fixed16(add_uv),
            ],
        }
    }
}

fn to_fixed16(f: f64) -> i32 {
    (f * f64::from(1u32 << 16) + 0.5).floor() as i32
}

/// RGB to YUV coefficients in 16-bit fixed point.
///
/// Each row computes `(c[0]*r + c[1]*g + c[2]*b + c[3] + (1 << 15)) >> 16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionMatrix {
    /// Luma row.
    pub rgb_to_y: [i32; 4],
    /// Blue-difference row.
    pub rgb_to_u: [i32; 4],
    /// Red-difference row.
    pub rgb_to_v: [i32; 4],
}

/// Predefined conversion matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixType {
    /// WebP's matrix, close to but not identical to Rec. 601 limited.
    WebP,
    /// Rec. 601, limited range.
    Rec601Limited,
    /// Rec. 601, full range.
    Rec601Full,
    /// Rec. 709, limited range.
    Rec709Limited,
    /// Rec. 709, full range.
    Rec709Full,
}

impl ConversionMatrix {
    /// Look up a predefined matrix.
    pub const fn predefined(kind: MatrixType) -> Self {
        match kind {
            MatrixType::WebP => Self {
                rgb_to_y: [16839, 33059, 6420, 16 << 16],
                rgb_to_u: [-9719, -19081, 28800, 128 << 16],
                rgb_to_v: [28800, -24116, -4684, 128 << 16],
            },
            MatrixType::Rec601Limited => Self {
                rgb_to_y: [16829, 33039, 6416, 16 << 16],
                rgb_to_u: [-9714, -19071, 28784, 128 << 16],
                rgb_to_v: [28784, -24103, -4681, 128 << 16],
            },
            MatrixType::Rec601Full => Self {
                rgb_to_y: [19595, 38470, 7471, 0],
                rgb_to_u: [-11058, -21710, 32768, 128 << 16],
                rgb_to_v: [32768, -27439, -5329, 128 << 16],
            },
            MatrixType::Rec709Limited => Self {
                rgb_to_y: [11966, 40254, 4064, 16 << 16],
                rgb_to_u: [-6596, -22189, 28784, 128 << 16],
                rgb_to_v: [28784, -26145, -2639, 128 << 16],
            },
            MatrixType::Rec709Full => Self {
                rgb_to_y: [13933, 46871, 4732, 0],
                rgb_to_u: [-7509, -25259, 32768, 128 << 16],
                rgb_to_v: [32768, -29763, -3005, 128 << 16],
            },
        }
    }
}

/// Apply one matrix row to an RGB triple.
#[inline]
pub(crate) fn rgb_to_component(r: i32, g: i32, b: i32, coeffs: &[i32; 4]) -> i32 {
    let sum = i64::from(coeffs[0]) * i64::from(r)
        + i64::from(coeffs[1]) * i64::from(g)
        + i64::from(coeffs[2]) * i64::from(b)
        + i64::from(coeffs[3])
        + YUV_HALF;
    (sum >> YUV_FIX) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[i32; 4], b: &[i32; 4]) {
        for i in 0..4 {
            assert!((a[i] - b[i]).abs() <= 1, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_computed_bt601_limited() {
        let computed = ColorSpace::BT601.conversion_matrix();
        let predefined = ConversionMatrix::predefined(MatrixType::Rec601Limited);
        assert_close(&computed.rgb_to_y, &predefined.rgb_to_y);
        assert_close(&computed.rgb_to_u, &predefined.rgb_to_u);
        assert_close(&computed.rgb_to_v, &predefined.rgb_to_v);
    }

    #[test]
    fn test_computed_bt709_full() {
        let computed = ColorSpace::BT709_FULL.conversion_matrix();
        let predefined = ConversionMatrix::predefined(MatrixType::Rec709Full);
        assert_close(&computed.rgb_to_y, &predefined.rgb_to_y);
        assert_close(&computed.rgb_to_u, &predefined.rgb_to_u);
        assert_close(&computed.rgb_to_v, &predefined.rgb_to_v);
    }

    #[test]
    fn test_full_range_gray_is_neutral() {
        let m = ConversionMatrix::predefined(MatrixType::Rec601Full);
        assert_eq!(rgb_to_component(128, 128, 128, &m.rgb_to_y), 128);
        assert_eq!(rgb_to_component(128, 128, 128, &m.rgb_to_u), 128);
        assert_eq!(rgb_to_component(128, 128, 128, &m.rgb_to_v), 128);
    }
}
