use half::f16;

/// Byte size of one packed scalar (f16).
pub const C_SIZE_FLOAT: usize = 2;

/// Scalar slots reserved per point in the 3D gaussian buffer.
/// Only the first [`GAUSSIAN_3D_USED_SLOTS`] are written.
pub const GAUSSIAN_3D_SLOTS: usize = 13;

/// x, y, z, opacity, 6 covariance terms.
pub const GAUSSIAN_3D_USED_SLOTS: usize = 3 + 1 + 6;

pub const C_SIZE_3D_GAUSSIAN: usize = GAUSSIAN_3D_SLOTS * C_SIZE_FLOAT;

pub const C_SIZE_2D_SPLAT: usize = 4 * C_SIZE_FLOAT // rotation
    + 2 * C_SIZE_FLOAT // screen space position
    + 4 * C_SIZE_FLOAT; // color (calculated by SH)

/// Bytes of SH coefficients per point: 3 channels times `num_coeffs`.
#[inline]
pub const fn c_size_sh_coef(num_coeffs: usize) -> usize {
    3 * num_coeffs * C_SIZE_FLOAT
}

#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub const fn n_sh_coeffs(degree: u32) -> usize {
    let d = degree as usize + 1;
    d * d
}

/// Degree whose basis has exactly `coeffs_per_channel + 1` terms, if any.
pub(crate) fn degree_for_rest_coeffs(coeffs_per_channel: usize) -> Option<u32> {
    let total = coeffs_per_channel + 1;
    let mut d = (total as f64).sqrt() as usize;
    // sqrt can land one off for large inputs
    while d * d > total {
        d -= 1;
    }
    while (d + 1) * (d + 1) <= total {
        d += 1;
    }
    if d * d == total {
        u32::try_from(d - 1).ok()
    } else {
        None
    }
}

#[inline]
pub(crate) fn float_to_half(x: f64) -> f16 {
    f16::from_f64(x)
}
