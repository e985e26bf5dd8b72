/// Logarithmic display stretch for optical base images
use bumpalo::Bump;
use tracing::warn;

/// Percentile used as the upper limit of each channel of a color composite.
pub const RGB_UPPER_PERCENTILE: f64 = 99.75;

/// Windowed logarithmic stretch: `log10(a*x + 1) / log10(a + 1)` of the
/// normalized value `x = (v - vmin) / (vmax - vmin)` clipped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogStretch {
    pub vmin: f64,
    pub vmax: f64,
    pub exponent: f64,
}

impl LogStretch {
    pub const DEFAULT_EXPONENT: f64 = 1000.0;

    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self {
            vmin,
            vmax,
            exponent: Self::DEFAULT_EXPONENT,
        }
    }

    /// Replace an unusable window (NaN bound or `vmax <= vmin`) by the data range.
    pub fn or_data_range(self, values: &[f64]) -> Self {
        if self.vmin.is_finite() && self.vmax.is_finite() && self.vmax > self.vmin {
            return self;
        }
        let (lo, hi) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        warn!(
            "Display window [{:.4e}, {:.4e}] unusable; falling back to data range [{:.4e}, {:.4e}]",
            self.vmin, self.vmax, lo, hi
        );
        Self {
            vmin: lo,
            vmax: hi,
            ..self
        }
    }

    /// Stretched value in `[0, 1]`, or `None` for blank pixels.
    pub fn apply(&self, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        let span = self.vmax - self.vmin;
        if span.is_nan() || span <= 0.0 {
            return Some(if value >= self.vmax { 1.0 } else { 0.0 });
        }
        let x = ((value - self.vmin) / span).clamp(0.0, 1.0);
        Some((self.exponent * x + 1.0).log10() / (self.exponent + 1.0).log10())
    }

    /// Stretched 8-bit intensity, or `None` for blank pixels.
    pub fn to_u8(&self, value: f64) -> Option<u8> {
        self.apply(value).map(|v| (v * 255.0).round() as u8)
    }
}

/// NaN-aware percentile with linear interpolation between ranks.
pub fn nan_percentile(values: &[f64], percentile: f64) -> f64 {
    let arena = Bump::new();
    let mut sorted = bumpalo::vec![in &arena];
    sorted.extend(values.iter().copied().filter(|v| !v.is_nan()));
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a: &f64, b: &f64| a.total_cmp(b));

    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
