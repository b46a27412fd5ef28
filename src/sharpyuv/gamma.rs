//! Transfer functions (H.273) and the sRGB gamma lookup tables.

use std::sync::OnceLock;

/// Transfer characteristics, numbered as in ITU-T H.273.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TransferFunction {
    Bt709 = 1,
    Bt470M = 4,
    Bt470Bg = 5,
    Bt601 = 6,
    Smpte240 = 7,
    Linear = 8,
    Log100 = 9,
    Log100Sqrt10 = 10,
    Iec61966 = 11,
    Bt1361 = 12,
    Srgb = 13,
    Bt2020_10 = 14,
    Bt2020_12 = 15,
    Pq = 16,
    Smpte428 = 17,
    Hlg = 18,
}

impl TryFrom<u8> for TransferFunction {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        use TransferFunction::*;
        Ok(match code {
            1 => Bt709,
            4 => Bt470M,
            5 => Bt470Bg,
            6 => Bt601,
            7 => Smpte240,
            8 => Linear,
            9 => Log100,
            10 => Log100Sqrt10,
            11 => Iec61966,
            12 => Bt1361,
            13 => Srgb,
            14 => Bt2020_10,
            15 => Bt2020_12,
            16 => Pq,
            17 => Smpte428,
            18 => Hlg,
            other => return Err(other),
        })
    }
}

const GAMMA_TO_LINEAR_TAB_BITS: i32 = 10;
const GAMMA_TO_LINEAR_TAB_SIZE: usize = 1 << GAMMA_TO_LINEAR_TAB_BITS;
const LINEAR_TO_GAMMA_TAB_BITS: i32 = 9;
const LINEAR_TO_GAMMA_TAB_SIZE: usize = 1 << LINEAR_TO_GAMMA_TAB_BITS;
/// Precision of linear values.
const GAMMA_TO_LINEAR_BITS: i32 = 16;

const BT709_A: f64 = 0.09929682680944;
const BT709_THRESH: f64 = 0.018053968510807;

struct GammaTables {
    to_linear: [u32; GAMMA_TO_LINEAR_TAB_SIZE + 2],
    to_gamma: [u32; LINEAR_TO_GAMMA_TAB_SIZE + 2],
}

fn tables() -> &'static GammaTables {
    static TABLES: OnceLock<GammaTables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> GammaTables {
    let final_scale = f64::from(1u32 << GAMMA_TO_LINEAR_BITS);
    let gamma = 1.0 / 0.45;

    let mut to_linear = [0u32; GAMMA_TO_LINEAR_TAB_SIZE + 2];
    let norm = 1.0 / GAMMA_TO_LINEAR_TAB_SIZE as f64;
    let a_rec = 1.0 / (1.0 + BT709_A);
    for (v, slot) in to_linear[..=GAMMA_TO_LINEAR_TAB_SIZE].iter_mut().enumerate() {
        let g = norm * v as f64;
        let value = if g <= BT709_THRESH * 4.5 {
            g / 4.5
        } else {
            (a_rec * (g + BT709_A)).powf(gamma)
        };
        *slot = (value * final_scale + 0.5) as u32;
    }
    to_linear[GAMMA_TO_LINEAR_TAB_SIZE + 1] = to_linear[GAMMA_TO_LINEAR_TAB_SIZE];

    let mut to_gamma = [0u32; LINEAR_TO_GAMMA_TAB_SIZE + 2];
    let scale = 1.0 / LINEAR_TO_GAMMA_TAB_SIZE as f64;
    for (v, slot) in to_gamma[..=LINEAR_TO_GAMMA_TAB_SIZE].iter_mut().enumerate() {
        let g = scale * v as f64;
        let value = if g <= BT709_THRESH {
            4.5 * g
        } else {
            (1.0 + BT709_A) * g.powf(1.0 / gamma) - BT709_A
        };
        *slot = (final_scale * value + 0.5) as u32;
    }
    to_gamma[LINEAR_TO_GAMMA_TAB_SIZE + 1] = to_gamma[LINEAR_TO_GAMMA_TAB_SIZE];

    GammaTables {
        to_linear,
        to_gamma,
    }
}

#[inline]
pub(crate) fn shift_val(v: i64, shift: i32) -> i64 {
    if shift >= 0 {
        v << shift
    } else {
        v >> -shift
    }
}

fn fixed_point_interpolation(v: i64, tab: &[u32], pos_shift_right: i32, value_shift: i32) -> u32 {
    let pos = shift_val(v, -pos_shift_right);
    let frac = (v - shift_val(pos, pos_shift_right)) as u32;
    let pos = pos as usize;
    let v0 = shift_val(i64::from(tab[pos]), value_shift) as u32;
    let v1 = shift_val(i64::from(tab[pos + 1]), value_shift) as u32;
    let v2 = v1.wrapping_sub(v0).wrapping_mul(frac);
    let half = if pos_shift_right > 0 {
        1u32 << (pos_shift_right - 1)
    } else {
        0
    };
    v0.wrapping_add(v2.wrapping_add(half) >> pos_shift_right)
}

fn to_linear_srgb(v: u16, bit_depth: u32) -> u32 {
    let shift = GAMMA_TO_LINEAR_TAB_BITS - bit_depth as i32;
    let tab = &tables().to_linear;
    if shift > 0 {
        tab[usize::from(v) << shift]
    } else {
        fixed_point_interpolation(i64::from(v), tab, -shift, 0)
    }
}

fn from_linear_srgb(value: u32, bit_depth: u32) -> u16 {
    fixed_point_interpolation(
        i64::from(value),
        &tables().to_gamma,
        GAMMA_TO_LINEAR_BITS - LINEAR_TO_GAMMA_TAB_BITS,
        bit_depth as i32 - GAMMA_TO_LINEAR_BITS,
    ) as u16
}

#[inline]
fn powf(base: f32, exp: f32) -> f32 {
    f64::from(base).powf(f64::from(exp)) as f32
}

fn to_linear_709(gamma: f32) -> f32 {
    if gamma < 0.0 {
        0.0
    } else if gamma < 4.5 * 0.018053968510807 {
        gamma / 4.5
    } else if gamma < 1.0 {
        powf((gamma + 0.09929682680944) / 1.09929682680944, 1.0 / 0.45)
    } else {
        1.0
    }
}

fn from_linear_709(linear: f32) -> f32 {
    if linear < 0.0 {
        0.0
    } else if linear < 0.018053968510807 {
        linear * 4.5
    } else if linear < 1.0 {
        1.09929682680944 * powf(linear, 0.45) - 0.09929682680944
    } else {
        1.0
    }
}

fn to_linear_smpte240(gamma: f32) -> f32 {
    if gamma < 0.0 {
        0.0
    } else if gamma < 4.0 * 0.022821585529445 {
        gamma / 4.0
    } else if gamma < 1.0 {
        powf((gamma + 0.111572195921731) / 1.111572195921731, 1.0 / 0.45)
    } else {
        1.0
    }
}

fn from_linear_smpte240(linear: f32) -> f32 {
    if linear < 0.0 {
        0.0
    } else if linear < 0.022821585529445 {
        linear * 4.0
    } else if linear < 1.0 {
        1.111572195921731 * powf(linear, 0.45) - 0.111572195921731
    } else {
        1.0
    }
}

fn to_linear_log100(gamma: f32) -> f32 {
    if gamma <= 0.0 {
        return 0.01 / 2.0;
    }
    powf(10.0, 2.0 * (gamma.min(1.0) - 1.0))
}

fn from_linear_log100(linear: f32) -> f32 {
    if linear < 0.01 {
        return 0.0;
    }
    1.0 + linear.min(1.0).log10() / 2.0
}

fn to_linear_log100_sqrt10(gamma: f32) -> f32 {
    if gamma <= 0.0 {
        return 0.00316227766 / 2.0;
    }
    powf(10.0, 2.5 * (gamma.min(1.0) - 1.0))
}

fn from_linear_log100_sqrt10(linear: f32) -> f32 {
    if linear < 0.00316227766 {
        return 0.0;
    }
    1.0 + linear.min(1.0).log10() / 2.5
}

fn to_linear_iec61966(gamma: f32) -> f32 {
    if gamma <= -4.5 * 0.018053968510807 {
        powf((-gamma + 0.09929682680944) / -1.09929682680944, 1.0 / 0.45)
    } else if gamma < 4.5 * 0.018053968510807 {
        gamma / 4.5
    } else {
        powf((gamma + 0.09929682680944) / 1.09929682680944, 1.0 / 0.45)
    }
}

fn from_linear_iec61966(linear: f32) -> f32 {
    if linear <= -0.018053968510807 {
        -1.09929682680944 * powf(-linear, 0.45) + 0.09929682680944
    } else if linear < 0.018053968510807 {
        linear * 4.5
    } else {
        1.09929682680944 * powf(linear, 0.45) - 0.09929682680944
    }
}

fn to_linear_bt1361(gamma: f32) -> f32 {
    if gamma < -0.25 {
        -0.25
    } else if gamma < 0.0 {
        powf((gamma - 0.02482420670236) / -0.27482420670236, 1.0 / 0.45) / -4.0
    } else if gamma < 4.5 * 0.018053968510807 {
        gamma / 4.5
    } else if gamma < 1.0 {
        powf((gamma + 0.09929682680944) / 1.09929682680944, 1.0 / 0.45)
    } else {
        1.0
    }
}

fn from_linear_bt1361(linear: f32) -> f32 {
    if linear < -0.25 {
        -0.25
    } else if linear < 0.0 {
        -0.27482420670236 * powf(-4.0 * linear, 0.45) + 0.02482420670236
    } else if linear < 0.018053968510807 {
        linear * 4.5
    } else if linear < 1.0 {
        1.09929682680944 * powf(linear, 0.45) - 0.09929682680944
    } else {
        1.0
    }
}

fn to_linear_pq(gamma: f32) -> f32 {
    if gamma <= 0.0 {
        return 0.0;
    }
    let pow_gamma = powf(gamma, 32.0 / 2523.0);
    let num = (pow_gamma - 107.0 / 128.0).max(0.0);
    // smallest positive subnormal keeps the division finite
    let den = (2413.0 / 128.0 - 2392.0 / 128.0 * pow_gamma).max(f32::from_bits(1));
    powf(num / den, 4096.0 / 653.0)
}

fn from_linear_pq(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }
    let pow_linear = powf(linear, 653.0 / 4096.0);
    let num = 107.0 / 128.0 + 2413.0 / 128.0 * pow_linear;
    let den = 1.0 + 2392.0 / 128.0 * pow_linear;
    powf(num / den, 2523.0 / 32.0)
}

fn to_linear_smpte428(gamma: f32) -> f32 {
    powf(gamma.max(0.0), 2.6) / 0.916_555_3
}

fn from_linear_smpte428(linear: f32) -> f32 {
    powf(0.916_555_3 * linear.max(0.0), 1.0 / 2.6)
}

fn to_linear_hlg(gamma: f32) -> f32 {
    if gamma < 0.0 {
        0.0
    } else if gamma <= 0.5 {
        powf((gamma * gamma) * (1.0 / 3.0), 1.2)
    } else {
        let e = f64::from((gamma - 0.559_910_73) / 0.178_832_77).exp() as f32;
        powf((e + 0.284_668_92) / 12.0, 1.2)
    }
}

fn from_linear_hlg(linear: f32) -> f32 {
    let linear = powf(linear, 1.0 / 1.2);
    if linear < 0.0 {
        0.0
    } else if linear <= 1.0 / 12.0 {
        f64::from(3.0 * linear).sqrt() as f32
    } else {
        0.178_832_77 * f64::from(12.0 * linear - 0.284_668_92).ln() as f32 + 0.559_910_73
    }
}

/// Convert a `bit_depth`-bit gamma-encoded sample to a 16-bit linear value.
pub fn gamma_to_linear(v: u16, bit_depth: u32, transfer: TransferFunction) -> u32 {
    use TransferFunction::*;
    let x = f32::from(v) / ((1u32 << bit_depth) - 1) as f32;
    let linear = match transfer {
        Srgb => return to_linear_srgb(v, bit_depth),
        Linear => return u32::from(v),
        Bt709 | Bt601 | Bt2020_10 | Bt2020_12 => to_linear_709(x),
        Bt470M => powf(x.clamp(0.0, 1.0), 2.2),
        Bt470Bg => powf(x.clamp(0.0, 1.0), 2.8),
        Smpte240 => to_linear_smpte240(x),
        Log100 => to_linear_log100(x),
        Log100Sqrt10 => to_linear_log100_sqrt10(x),
        Iec61966 => to_linear_iec61966(x),
        Bt1361 => to_linear_bt1361(x),
        Pq => to_linear_pq(x),
        Smpte428 => to_linear_smpte428(x),
        Hlg => to_linear_hlg(x),
    };
    (linear * 65535.0).round() as u32
}

/// Convert a 16-bit linear value to a `bit_depth`-bit gamma-encoded sample.
pub fn linear_to_gamma(v: u32, bit_depth: u32, transfer: TransferFunction) -> u16 {
    use TransferFunction::*;
    let x = v as f32 / 65535.0;
    let gamma = match transfer {
        Srgb => return from_linear_srgb(v, bit_depth),
        Linear => return v as u16,
        Bt709 | Bt601 | Bt2020_10 | Bt2020_12 => from_linear_709(x),
        Bt470M => powf(x.clamp(0.0, 1.0), 1.0 / 2.2),
        Bt470Bg => powf(x.clamp(0.0, 1.0), 1.0 / 2.8),
        Smpte240 => from_linear_smpte240(x),
        Log100 => from_linear_log100(x),
        Log100Sqrt10 => from_linear_log100_sqrt10(x),
        Iec61966 => from_linear_iec61966(x),
        Bt1361 => from_linear_bt1361(x),
        Pq => from_linear_pq(x),
        Smpte428 => from_linear_smpte428(x),
        Hlg => from_linear_hlg(x),
    };
    (gamma * ((1u32 << bit_depth) - 1) as f32).round() as u16
}
