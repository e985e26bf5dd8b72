//! Local noise statistics: iterative sigma clipping and region statistics
//! around a sky position.

use anyhow::Result;
use bumpalo::Bump;
use tracing::debug;

use crate::fits::SkyImage;

/// Clip threshold in standard deviations above the mean.
pub const CLIP_SIGMA: f64 = 5.0;
/// Clip passes; no convergence test is made.
pub const CLIP_ITERATIONS: usize = 10;

/// Mean of the non-NaN values, NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation of the non-NaN values, NaN when there are none.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sum_sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), &v| {
            (sum + (v - mean).powi(2), count + 1)
        });
    (sum_sq / count as f64).sqrt()
}

/// Median of the non-NaN values, NaN when there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    // Use arena for the temporary sorted copy
    let arena = Bump::new();
    let mut sorted = bumpalo::vec![in &arena];
    sorted.extend(values.iter().copied().filter(|v| !v.is_nan()));
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a: &f64, b: &f64| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Outcome of an iterative sigma clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaClip {
    /// Mean measured at the start of the final pass
    pub mean: f64,
    /// Standard deviation measured at the start of the final pass
    pub std_dev: f64,
    /// Survivor count after each pass
    pub kept_per_pass: Vec<usize>,
}

/// Iteratively discard values above `mean + sigma * std`.
///
/// Each pass measures the NaN-aware mean and standard deviation of the
/// working set, then keeps only values `<=` the threshold. NaN never
/// satisfies the comparison, so blanks leave the set on the first pass. An
/// emptied set keeps going and yields NaN statistics.
pub fn sigma_clip(values: &[f64], sigma: f64, iterations: usize) -> SigmaClip {
    let mut working: Vec<f64> = values.to_vec();
    let mut mean = nan_mean(&working);
    let mut std_dev = nan_std(&working);
    let mut kept_per_pass = Vec::with_capacity(iterations);

    for _ in 0..iterations {
        mean = nan_mean(&working);
        std_dev = nan_std(&working);
        let threshold = mean + sigma * std_dev;
        working.retain(|&v| v <= threshold);
        kept_per_pass.push(working.len());
    }

    SigmaClip {
        mean,
        std_dev,
        kept_per_pass,
    }
}

/// Background mean and noise of a pixel set by 5-sigma clipping over ten passes.
pub fn find_noise(values: &[f64]) -> (f64, f64) {
    let clip = sigma_clip(values, CLIP_SIGMA, CLIP_ITERATIONS);
    (clip.mean, clip.std_dev)
}

/// Statistics of the pixels around a sky position.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct NoiseStats {
    pub mean: f64,
    pub noise: f64,
    /// Median of the pixels above the highest useful significance cut
    pub peak: f64,
}

/// Pixel window clipped to the image, bounds inclusive of the clip range.
///
/// Extraction uses the half-open window `[x_min, x_max) x [y_min, y_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PixelBox {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl PixelBox {
    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }
}

/// Pixel bounding box of an axis-aligned sky box of half-size `size` degrees.
///
/// The four corners are offset independently in RA and Dec (no spherical
/// correction), projected, truncated toward zero and clamped to the image.
pub fn pixel_box(image: &SkyImage, ra: f64, dec: f64, size: f64) -> PixelBox {
    let corners = [
        (ra - size, dec - size),
        (ra - size, dec + size),
        (ra + size, dec - size),
        (ra + size, dec + size),
    ];

    let mut x_lo = f64::NAN;
    let mut x_hi = f64::NAN;
    let mut y_lo = f64::NAN;
    let mut y_hi = f64::NAN;
    for (corner_ra, corner_dec) in corners {
        let (x, y) = image.wcs.sky_to_pixel(corner_ra, corner_dec);
        x_lo = x_lo.min(x);
        x_hi = x_hi.max(x);
        y_lo = y_lo.min(y);
        y_hi = y_hi.max(y);
    }

    let clamp = |value: f64, len: usize| -> usize {
        // `as` truncates toward zero and maps NaN to 0
        (value.trunc() as i64).min(len as i64 - 1).max(0) as usize
    };

    PixelBox {
        x_min: clamp(x_lo, image.width),
        x_max: clamp(x_hi, image.width),
        y_min: clamp(y_lo, image.height),
        y_max: clamp(y_hi, image.height),
    }
}

/// Copy the pixels of `window` from one channel.
pub fn extract_window(image: &SkyImage, window: &PixelBox, channel: usize) -> Result<Vec<f64>> {
    let plane = image.plane(channel)?;
    let mut pixels = Vec::with_capacity(window.width() * window.height());
    for y in window.y_min..window.y_max {
        let row = y * image.width;
        pixels.extend_from_slice(&plane[row + window.x_min..row + window.x_max]);
    }
    Ok(pixels)
}

/// Median of the pixels above `mean + k * noise` for the largest k in 5..=1
/// that selects anything; the k = 1 result (possibly NaN) otherwise.
pub fn representative_peak(pixels: &[f64], mean: f64, noise: f64) -> f64 {
    let mut peak = f64::NAN;
    for multiplier in (1..=5).rev() {
        let threshold = mean + multiplier as f64 * noise;
        let bright: Vec<f64> = pixels.iter().copied().filter(|&v| v > threshold).collect();
        peak = nan_median(&bright);
        if !peak.is_nan() {
            break;
        }
    }
    peak
}

/// Mean, noise and representative peak of the pixels in a sky box.
///
/// `size` is the half-width of the box in degrees. An empty window gives NaN
/// statistics rather than an error; only an invalid channel fails.
pub fn find_noise_area(
    image: &SkyImage,
    ra: f64,
    dec: f64,
    size: f64,
    channel: usize,
) -> Result<NoiseStats> {
    let window = pixel_box(image, ra, dec, size);
    let pixels = extract_window(image, &window, channel)?;
    let (mean, noise) = find_noise(&pixels);
    let peak = representative_peak(&pixels, mean, noise);

    debug!(
        "Region stats at ({:.5}, {:.5}) channel {}: window {:?} ({} pixels), mean={:.4e} noise={:.4e} peak={:.4e}",
        ra,
        dec,
        channel,
        window,
        pixels.len(),
        mean,
        noise,
        peak
    );

    Ok(NoiseStats { mean, noise, peak })
}
