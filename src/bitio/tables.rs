//! Range renormalization tables shared by the boolean reader and writer.
//!
//! Both tables are indexed by `range - 1` for ranges below 128.

/// Left shift that brings `r + 1` back to at least 128.
pub const NORM: [u8; 128] = build_norm();

/// `((r + 1) << NORM[r]) - 1`, the renormalized range in `range - 1` form.
pub const NEW_RANGE: [u8; 128] = build_new_range();

const fn build_norm() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut r = 0;
    while r < 128 {
        let v = (r + 1) as u32;
        let log2 = 31 - v.leading_zeros();
        table[r] = (7 - log2) as u8;
        r += 1;
    }
    table
}

const fn build_new_range() -> [u8; 128] {
    let norm = build_norm();
    let mut table = [0u8; 128];
    let mut r = 0;
    while r < 128 {
        table[r] = ((((r + 1) as u32) << norm[r]) - 1) as u8;
        r += 1;
    }
    table
}
