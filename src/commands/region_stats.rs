use anyhow::Result;
use std::path::Path;

use crate::fits::SkyImage;
use crate::noise::{find_noise_area, pixel_box, NoiseStats, PixelBox};
use crate::retry::RetryPolicy;

#[derive(Debug, serde::Serialize)]
struct RegionReport<'a> {
    file: &'a str,
    ra: f64,
    dec: f64,
    size: f64,
    channel: usize,
    window: PixelBox,
    #[serde(flatten)]
    stats: NoiseStats,
}

/// Print mean, noise and representative peak of a sky box.
pub fn region_stats(
    path: &Path,
    ra: f64,
    dec: f64,
    size: f64,
    channel: usize,
    format: &str,
) -> Result<()> {
    println!("{}", region_report(path, ra, dec, size, channel, format)?);
    Ok(())
}

fn region_report(
    path: &Path,
    ra: f64,
    dec: f64,
    size: f64,
    channel: usize,
    format: &str,
) -> Result<String> {
    let image = SkyImage::open(path, &RetryPolicy::none())?;
    let window = pixel_box(&image, ra, dec, size);
    let stats = find_noise_area(&image, ra, dec, size, channel)?;

    let file = path.to_string_lossy();
    let report = RegionReport {
        file: &file,
        ra,
        dec,
        size,
        channel,
        window,
        stats,
    };

    Ok(match format.to_lowercase().as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => format_report(&report),
    })
}

fn format_report(report: &RegionReport) -> String {
    let w = &report.window;
    format!(
        "{}\n  Position: {:.6} {:.6} (half-size {:.6} deg, channel {})\n  \
         Window: x {}..{} y {}..{} ({} pixels)\n  \
         Mean:  {:.6e}\n  Noise: {:.6e}\n  Peak:  {:.6e}",
        report.file,
        report.ra,
        report.dec,
        report.size,
        report.channel,
        w.x_min,
        w.x_max,
        w.y_min,
        w.y_max,
        w.width() * w.height(),
        report.stats.mean,
        report.stats.noise,
        report.stats.peak
    )
}
