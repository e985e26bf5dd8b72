//! Contour level ladders.

/// Number of contour levels in every ladder.
pub const LEVEL_COUNT: usize = 30;
/// The top level sits 2^14 above the lowest one.
pub const LEVEL_SPAN_OCTAVES: f64 = 14.0;
/// Auxiliary survey contours start at this many sigma.
pub const AUXILIARY_SIGMA: f64 = 3.0;

/// `LEVEL_COUNT` geometrically spaced levels `base * 2^t`, `t` evenly spaced over `[0, 14]`.
pub fn geometric_levels(base: f64) -> Vec<f64> {
    let step = LEVEL_SPAN_OCTAVES / (LEVEL_COUNT - 1) as f64;
    (0..LEVEL_COUNT)
        .map(|i| base * (i as f64 * step).exp2())
        .collect()
}

/// Lowest primary contour: the larger of the dynamic-range floor and the noise floor.
///
/// A NaN on either side is ignored in favor of the other.
pub fn primary_base_level(peak: f64, dr_limit: f64, rms: f64, level_sigma: f64) -> f64 {
    (peak / dr_limit).max(rms * level_sigma)
}

/// Level ladder for the primary radio map.
pub fn primary_levels(peak: f64, dr_limit: f64, rms: f64, level_sigma: f64) -> Vec<f64> {
    geometric_levels(primary_base_level(peak, dr_limit, rms, level_sigma))
}

/// Level ladder for an auxiliary survey, starting at three times its local noise.
pub fn auxiliary_levels(rms: f64) -> Vec<f64> {
    geometric_levels(rms * AUXILIARY_SIGMA)
}
