//! Overlay assembly: optical base image, radio contours and annotations,
//! saved to a file or handed to a viewer.

use anyhow::{bail, Result};
use image::Rgba;
use tracing::{debug, info, warn};

use crate::catalogue::{CatalogueEntry, MarkerGroup};
use crate::config::{Color, MarkerShape, OverlayConfig};
use crate::figure::Figure;
use crate::fits::SkyImage;
use crate::interact::{HandlerFactory, ReportClick, Viewer};
use crate::levels::{auxiliary_levels, primary_base_level, primary_levels};
use crate::noise::find_noise_area;
use crate::region::Region;
use crate::stretch::{nan_percentile, LogStretch, RGB_UPPER_PERCENTILE};

/// Marker area of the coordinate cross and legacy markers.
const CROSS_MARKER_SIZE: f64 = 1500.0;
/// Marker area and width of position group markers.
const GROUP_MARKER_SIZE: f64 = 750.0;
const GROUP_MARKER_WIDTH: f64 = 2.0;
const CIRCLE_WIDTH: f64 = 5.0;

/// Images and annotation data for one overlay.
#[derive(Debug, Clone)]
pub struct OverlayInputs {
    /// Primary radio map drawn as contours
    pub lofar: Option<SkyImage>,
    /// Base image: a plane, or a cube whose first three channels are R, G, B
    pub optical: SkyImage,
    pub first: Option<SkyImage>,
    pub vlass: Option<SkyImage>,
    pub ra: f64,
    pub dec: f64,
    /// Field width in degrees
    pub size: f64,
    pub positions: Vec<MarkerGroup>,
    pub catalogue: Option<Vec<CatalogueEntry>>,
    pub regions: Vec<Region>,
}

impl OverlayInputs {
    pub fn new(optical: SkyImage, ra: f64, dec: f64, size: f64) -> Self {
        Self {
            lofar: None,
            optical,
            first: None,
            vlass: None,
            ra,
            dec,
            size,
            positions: Vec::new(),
            catalogue: None,
            regions: Vec::new(),
        }
    }
}

fn ink(color: &Color) -> Option<Rgba<u8>> {
    (!color.is_none()).then(|| color.rgba())
}

/// Draw an overlay and present it.
///
/// With `config.save_name` the figure is written to that file; otherwise it
/// goes to `viewer`. When `config.interactive` is set a click handler is
/// connected before presenting: the one built by `handler_factory`, or a
/// [`ReportClick`]. The finished figure is returned either way.
pub fn show_overlay(
    inputs: &OverlayInputs,
    config: &OverlayConfig,
    viewer: Option<&mut dyn Viewer>,
    handler_factory: Option<HandlerFactory>,
) -> Result<Figure> {
    let (ra, dec, size) = (inputs.ra, inputs.dec, inputs.size);

    let lofar = match (&inputs.lofar, config.show_lofar) {
        (Some(lofar), true) => Some(lofar),
        (None, true) => {
            warn!("LOFAR map is missing, not showing it");
            None
        }
        (_, false) => None,
    };

    info!("Doing overlay at {:.6} {:.6} with size {:.6}", ra, dec, size);
    info!("Title is {}", config.title.as_deref().unwrap_or("(none)"));

    let lofar_levels = match lofar {
        Some(lofar) => {
            let peak = match config.peak {
                Some(peak) => {
                    info!("Using user-specified peak flux of {:.4e}", peak);
                    peak
                }
                None => lofar.nan_max(),
            };
            let rms = match config.rms {
                Some(rms) => rms,
                None => {
                    let rms = find_noise_area(lofar, ra, dec, size, 0)?.noise;
                    info!("Using LOFAR rms {:.4e}", rms);
                    rms
                }
            };
            debug!(
                "Lowest contour candidates: peak/dr_limit={:.4e} rms*level={:.4e} -> {:.4e}",
                peak / config.dr_limit,
                rms * config.lofar_level,
                primary_base_level(peak, config.dr_limit, rms, config.lofar_level)
            );
            Some(primary_levels(peak, config.dr_limit, rms, config.lofar_level))
        }
        None => None,
    };

    let mut figure = Figure::new((ra, dec), size, config.canvas_size)?;
    show_base_image(&mut figure, &inputs.optical, ra, dec, size, config.noise_thresh)?;

    if let (Some(lofar), Some(levels)) = (lofar, &lofar_levels) {
        if let Some(color) = ink(&config.lofar_color) {
            figure.show_contours(lofar, levels, color, config.lw)?;
        }
    }

    for (survey, image, color) in [
        ("FIRST", &inputs.first, &config.first_color),
        ("VLASS", &inputs.vlass, &config.vlass_color),
    ] {
        let Some(image) = image else {
            continue;
        };
        let rms = find_noise_area(image, ra, dec, size, 0)?.noise;
        info!("Using {} rms {:.4e}", survey, rms);
        if let Some(color) = ink(color) {
            figure.show_contours(image, &auxiliary_levels(rms), color, config.lw)?;
        }
    }

    if let Some(beam) = &config.beam {
        figure.show_beam(beam, Rgba([255, 0, 0, 255]), Rgba([255, 255, 255, 255]));
    }

    if config.plot_coords {
        let position = config.coords_position(ra, dec);
        let color = ink(&config.coords_color);
        figure.show_markers(
            &[position],
            MarkerShape::Plus,
            CROSS_MARKER_SIZE,
            config.coords_lw,
            color,
            color,
        );
    }

    if let Some(marker_ra) = &config.marker_ra {
        let marker_dec = config.marker_dec.as_deref().unwrap_or_default();
        if marker_ra.len() != marker_dec.len() {
            bail!(
                "marker_ra has {} entries but marker_dec has {}",
                marker_ra.len(),
                marker_dec.len()
            );
        }
        let positions: Vec<(f64, f64)> = marker_ra.iter().copied().zip(marker_dec.iter().copied()).collect();
        let color = ink(&config.marker_color);
        figure.show_markers(
            &positions,
            MarkerShape::Cross,
            CROSS_MARKER_SIZE,
            config.marker_lw,
            color,
            color,
        );
    }

    for group in &inputs.positions {
        if group.positions.is_empty() {
            continue;
        }
        let (face, edge) = group.colors();
        let positions: Vec<(f64, f64)> = group.positions.iter().map(|p| (p.ra, p.dec)).collect();
        let drawn = figure.show_markers(
            &positions,
            group.marker,
            GROUP_MARKER_SIZE,
            GROUP_MARKER_WIDTH,
            face.as_ref().and_then(ink),
            ink(&edge),
        );
        debug!(
            "Position group '{}': {} of {} markers on the plot",
            group.marker.code(),
            drawn,
            positions.len()
        );
    }

    if let Some(radius) = config.circle_radius {
        figure.show_circle((ra, dec), radius, Rgba([0, 255, 255, 255]), CIRCLE_WIDTH);
    }

    if let Some(catalogue) = &inputs.catalogue {
        for (i, entry) in catalogue.iter().enumerate() {
            let color = config.ellipse_color.get(i)?;
            let width = *config.lw_ellipse.get(i)?;
            let style = *config.ellipse_style.get(i)?;
            let Some(color) = ink(color) else {
                continue;
            };
            figure.show_ellipse(
                (entry.ra, entry.dec),
                entry.maj * 2.0 / config.overlay_scale,
                entry.min * 2.0 / config.overlay_scale,
                90.0 + entry.pa,
                color,
                width,
                style,
            );
        }
        debug!("Drew {} catalogue ellipses", catalogue.len());
    }

    for region in &inputs.regions {
        figure.show_region(region);
    }

    if config.no_labels {
        figure.set_axis_labels_visible(false);
        figure.set_tick_labels_visible(false);
    }
    if config.show_grid {
        if let Some(color) = ink(&config.grid_color) {
            figure.add_grid(config.grid_spacing, color)?;
        }
    }

    if let Some(title) = &config.title {
        figure.set_title(title);
    }

    if config.interactive {
        let handler = match handler_factory {
            Some(factory) => factory(&figure),
            None => Box::new(ReportClick::new()),
        };
        figure.connect_click(handler);
    }

    match (&config.save_name, viewer) {
        (Some(path), _) => figure.save(path)?,
        (None, Some(viewer)) => viewer.show(&figure, config.block)?,
        (None, None) => bail!("No output file given and no viewer available to show the overlay"),
    }

    Ok(figure)
}

/// Base layer: a log-stretched plane windowed to `[mean + noise_thresh * noise, peak]`
/// of the target area, or a color composite with per-channel windows.
fn show_base_image(
    figure: &mut Figure,
    image: &SkyImage,
    ra: f64,
    dec: f64,
    size: f64,
    noise_thresh: f64,
) -> Result<()> {
    if image.is_cube() {
        let mut stretches = [LogStretch::new(0.0, 1.0); 3];
        for (channel, stretch) in stretches.iter_mut().enumerate() {
            let stats = find_noise_area(image, ra, dec, size, channel)?;
            let plane = image.plane(channel)?;
            let vmin = stats.mean + noise_thresh * stats.noise;
            let vmax = nan_percentile(plane, RGB_UPPER_PERCENTILE);
            debug!("Channel {} window [{:.4e}, {:.4e}]", channel, vmin, vmax);
            *stretch = LogStretch::new(vmin, vmax).or_data_range(plane);
        }
        figure.show_rgb(image, &stretches)
    } else {
        let stats = find_noise_area(image, ra, dec, size, 0)?;
        info!(
            "Optical parameters are mean={:.4e} noise={:.4e} peak={:.4e}",
            stats.mean, stats.noise, stats.peak
        );
        let stretch = LogStretch::new(stats.mean + noise_thresh * stats.noise, stats.peak)
            .or_data_range(image.plane(0)?);
        figure.show_grayscale(image, &stretch)
    }
}
