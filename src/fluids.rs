use glam::DVec2;
use std::f64::consts::PI;

use crate::config::EPSILON;

/// Poly6 smoothing kernel for SPH density estimation, 2D normalization.
///
/// Returns `W(r, h) = 4 / (PI * h^8) * (h^2 - r^2)^3` when `r < h`,
/// and `0.0` when `r >= h`.
#[inline]
pub fn poly6_kernel(r: f64, h: f64) -> f64 {
    if r >= h {
        return 0.0;
    }
    let h2 = h * h;
    let diff = h2 - r * r;
    let h8 = h2 * h2 * h2 * h2;
    let coeff = 4.0 / (PI * h8);
    coeff * diff * diff * diff
}

/// Spiky kernel gradient for SPH pressure correction, 2D normalization.
///
/// Returns `(r / r_len) * (-30 / (PI * h^5)) * (h - r_len)^2` when
/// `r_len < h` and `r_len` is non-degenerate, and `DVec2::ZERO` otherwise.
#[inline]
pub fn spiky_gradient(r: DVec2, r_len: f64, h: f64) -> DVec2 {
    if r_len >= h || r_len <= EPSILON {
        return DVec2::ZERO;
    }
    let h5 = h * h * h * h * h;
    let coeff = -30.0 / (PI * h5);
    let diff = h - r_len;
    (r / r_len) * (coeff * diff * diff)
}
