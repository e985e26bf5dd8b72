//! The overlay figure: a square plot area with a north-up, east-left sky
//! projection that is drawn into in layers, then rendered inside a margin
//! carrying ticks, labels and the title.
//!
//! Plot coordinates are pixels of the plot area, x to the right and y down.

use anyhow::{bail, Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{LineStyle, MarkerShape};
use crate::contour::trace_levels;
use crate::draw::{draw_marker, draw_polyline, ellipse_points, fill_polygon};
use crate::fits::{Beam, SkyImage};
use crate::interact::{ClickEvent, ClickHandler};
use crate::region::{Region, RegionShape};
use crate::stretch::LogStretch;
use crate::text_render::{draw_char, draw_text, draw_text_centered, text_width, GLYPH_HEIGHT};
use crate::wcs::Wcs;

const MARGIN_LEFT: u32 = 150;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 70;
const LABEL_SCALE: u32 = 2;
const TITLE_SCALE: u32 = 3;
const TICK_LENGTH: f64 = 8.0;
const BEAM_PAD: f64 = 10.0;
const GRID_SAMPLES: usize = 64;
const MAX_GRID_LINES: f64 = 400.0;
const MAX_TICKS: f64 = 5.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Candidate tick spacings in degrees, fine to coarse.
const TICK_SPACINGS: [f64; 20] = [
    1.0 / 3600.0,
    2.0 / 3600.0,
    5.0 / 3600.0,
    10.0 / 3600.0,
    15.0 / 3600.0,
    30.0 / 3600.0,
    1.0 / 60.0,
    2.0 / 60.0,
    5.0 / 60.0,
    10.0 / 60.0,
    15.0 / 60.0,
    30.0 / 60.0,
    1.0,
    2.0,
    5.0,
    10.0,
    15.0,
    30.0,
    45.0,
    90.0,
];

/// Sky extent of the plot area. RA bounds are unwrapped around the centre
/// and may leave `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SkyBounds {
    ra_min: f64,
    ra_max: f64,
    dec_min: f64,
    dec_max: f64,
}

pub struct Figure {
    plot: RgbaImage,
    projection: Wcs,
    center: (f64, f64),
    field_size: f64,
    title: Option<String>,
    axis_labels_visible: bool,
    tick_labels_visible: bool,
    click_handler: Option<Box<dyn ClickHandler>>,
}

impl fmt::Debug for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Figure")
            .field("plot_size", &self.plot_size())
            .field("center", &self.center)
            .field("field_size", &self.field_size)
            .field("title", &self.title)
            .field("click_handler", &self.click_handler.is_some())
            .finish()
    }
}

impl Figure {
    /// A blank figure showing `field_size` degrees around `center` on a
    /// `plot_size` pixel square.
    pub fn new(center: (f64, f64), field_size: f64, plot_size: u32) -> Result<Self> {
        if !(field_size.is_finite() && field_size > 0.0) {
            bail!("Field size must be a positive number of degrees, got {}", field_size);
        }
        if plot_size < 2 {
            bail!("Plot size must be at least 2 pixels, got {}", plot_size);
        }
        let mid = (plot_size as f64 - 1.0) / 2.0;
        let projection = Wcs::north_up(center, (mid, mid), field_size / plot_size as f64)?;

        Ok(Self {
            plot: RgbaImage::from_pixel(plot_size, plot_size, BACKGROUND),
            projection,
            center,
            field_size,
            title: None,
            axis_labels_visible: true,
            tick_labels_visible: true,
            click_handler: None,
        })
    }

    pub fn plot_size(&self) -> u32 {
        self.plot.width()
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn field_size(&self) -> f64 {
        self.field_size
    }

    /// The plot area as drawn so far, without margins.
    pub fn plot(&self) -> &RgbaImage {
        &self.plot
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn set_axis_labels_visible(&mut self, visible: bool) {
        self.axis_labels_visible = visible;
    }

    pub fn set_tick_labels_visible(&mut self, visible: bool) {
        self.tick_labels_visible = visible;
    }

    fn flip(&self, y: f64) -> f64 {
        self.plot.height() as f64 - 1.0 - y
    }

    /// Plot position of a sky position, `None` on the far side of the sky.
    pub fn world_to_plot(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (x, y) = self.projection.sky_to_pixel(ra, dec);
        if x.is_nan() || y.is_nan() {
            return None;
        }
        Some((x, self.flip(y)))
    }

    /// Sky position (RA, Dec in degrees) under a plot position.
    pub fn plot_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        self.projection.pixel_to_sky(x, self.flip(y))
    }

    pub fn degrees_to_pixels(&self, degrees: f64) -> f64 {
        degrees * self.plot_size() as f64 / self.field_size
    }

    fn image_to_plot(&self, image: &SkyImage, pixel: (f64, f64)) -> Option<(f64, f64)> {
        let (ra, dec) = image.wcs.pixel_to_sky(pixel.0, pixel.1);
        self.world_to_plot(ra, dec)
    }

    /// Nearest image pixel under each plot pixel, row by row.
    fn sample_indices(&self, image: &SkyImage) -> Vec<Option<usize>> {
        let n = self.plot_size();
        let mut indices = Vec::with_capacity((n * n) as usize);
        for y in 0..n {
            for x in 0..n {
                let (ra, dec) = self.plot_to_world(x as f64, y as f64);
                let (ix, iy) = image.wcs.sky_to_pixel(ra, dec);
                let (ix, iy) = (ix.round(), iy.round());
                let inside = ix >= 0.0
                    && iy >= 0.0
                    && ix < image.width as f64
                    && iy < image.height as f64;
                indices.push(inside.then(|| iy as usize * image.width + ix as usize));
            }
        }
        indices
    }

    /// Paint the first plane of `image` as a grayscale base layer.
    pub fn show_grayscale(&mut self, image: &SkyImage, stretch: &LogStretch) -> Result<()> {
        let plane = image.plane(0)?;
        let indices = self.sample_indices(image);
        for (pixel, index) in self.plot.pixels_mut().zip(indices) {
            if let Some(gray) = index.and_then(|i| stretch.to_u8(plane[i])) {
                *pixel = Rgba([gray, gray, gray, 255]);
            }
        }
        debug!(
            "Grayscale base layer from {}x{} image, window [{:.4e}, {:.4e}]",
            image.width, image.height, stretch.vmin, stretch.vmax
        );
        Ok(())
    }

    /// Paint channels 0, 1, 2 of `image` as red, green, blue, each with its own stretch.
    pub fn show_rgb(&mut self, image: &SkyImage, stretches: &[LogStretch; 3]) -> Result<()> {
        if image.channels < 3 {
            bail!(
                "Color composite needs 3 channels, image has {}",
                image.channels
            );
        }
        let planes = [image.plane(0)?, image.plane(1)?, image.plane(2)?];
        let indices = self.sample_indices(image);
        for (pixel, index) in self.plot.pixels_mut().zip(indices) {
            let Some(i) = index else {
                continue;
            };
            let mut rgb = [0u8; 3];
            let mut any = false;
            for (channel, value) in rgb.iter_mut().enumerate() {
                if let Some(v) = stretches[channel].to_u8(planes[channel][i]) {
                    *value = v;
                    any = true;
                }
            }
            if any {
                *pixel = Rgba([rgb[0], rgb[1], rgb[2], 255]);
            }
        }
        debug!("Color composite base layer from {}x{} image", image.width, image.height);
        Ok(())
    }

    fn off_plot(&self, a: (f64, f64), b: (f64, f64), pad: f64) -> bool {
        let n = self.plot_size() as f64;
        (a.0 < -pad && b.0 < -pad)
            || (a.1 < -pad && b.1 < -pad)
            || (a.0 > n + pad && b.0 > n + pad)
            || (a.1 > n + pad && b.1 > n + pad)
    }

    /// Draw contours of the first plane of `image` at `levels`. Returns the
    /// number of segments drawn.
    pub fn show_contours(
        &mut self,
        image: &SkyImage,
        levels: &[f64],
        color: Rgba<u8>,
        width: f64,
    ) -> Result<usize> {
        let plane = image.plane(0)?;
        let isolines = trace_levels(plane, image.width, image.height, levels);

        let mut drawn = 0;
        for isoline in &isolines {
            for segment in &isoline.segments {
                let (Some(a), Some(b)) = (
                    self.image_to_plot(image, segment.start),
                    self.image_to_plot(image, segment.end),
                ) else {
                    continue;
                };
                if self.off_plot(a, b, width) {
                    continue;
                }
                draw_polyline(&mut self.plot, &[a, b], width, LineStyle::Solid, color);
                drawn += 1;
            }
        }
        debug!("Drew {} contour segments over {} levels", drawn, levels.len());
        Ok(drawn)
    }

    /// Beam ellipse in the bottom-left corner of the plot.
    pub fn show_beam(&mut self, beam: &Beam, edge: Rgba<u8>, face: Rgba<u8>) {
        let major = self.degrees_to_pixels(beam.major);
        let minor = self.degrees_to_pixels(beam.minor);
        let extent = major.max(minor) / 2.0;
        let corner = (BEAM_PAD + extent, self.flip(BEAM_PAD + extent));

        // Major axis along north at zero position angle, turning east
        let outline = ellipse_points(corner, minor, major, beam.angle, 72);
        fill_polygon(&mut self.plot, &outline, face);
        draw_polyline(&mut self.plot, &outline, 1.0, LineStyle::Solid, edge);
    }

    /// Markers of area `size` at sky positions. Returns how many landed on the plot.
    pub fn show_markers(
        &mut self,
        positions: &[(f64, f64)],
        shape: MarkerShape,
        size: f64,
        line_width: f64,
        face: Option<Rgba<u8>>,
        edge: Option<Rgba<u8>>,
    ) -> usize {
        let mut drawn = 0;
        for &(ra, dec) in positions {
            let Some(center) = self.world_to_plot(ra, dec) else {
                continue;
            };
            draw_marker(&mut self.plot, shape, center, size, line_width, face, edge);
            if !self.off_plot(center, center, 0.0) {
                drawn += 1;
            }
        }
        drawn
    }

    /// Circle of `radius` degrees.
    pub fn show_circle(&mut self, center: (f64, f64), radius: f64, color: Rgba<u8>, width: f64) {
        let diameter = 2.0 * self.degrees_to_pixels(radius);
        self.show_pixel_ellipse(center, diameter, diameter, 0.0, color, width, LineStyle::Solid);
    }

    /// Ellipse with full axes `width` x `height` in degrees, rotated `angle`
    /// degrees counter-clockwise from the plot x axis.
    #[allow(clippy::too_many_arguments)]
    pub fn show_ellipse(
        &mut self,
        center: (f64, f64),
        width: f64,
        height: f64,
        angle: f64,
        color: Rgba<u8>,
        line_width: f64,
        style: LineStyle,
    ) {
        let (w, h) = (self.degrees_to_pixels(width), self.degrees_to_pixels(height));
        self.show_pixel_ellipse(center, w, h, angle, color, line_width, style);
    }

    #[allow(clippy::too_many_arguments)]
    fn show_pixel_ellipse(
        &mut self,
        center: (f64, f64),
        width: f64,
        height: f64,
        angle: f64,
        color: Rgba<u8>,
        line_width: f64,
        style: LineStyle,
    ) {
        let Some(center) = self.world_to_plot(center.0, center.1) else {
            return;
        };
        let samples = (width.max(height) * 1.5).clamp(24.0, 720.0) as usize;
        let outline = ellipse_points(center, width, height, angle, samples);
        draw_polyline(&mut self.plot, &outline, line_width, style, color);
    }

    /// Straight-edged path through sky positions. Vertices without a plot
    /// position break the path.
    fn show_sky_path(&mut self, vertices: &[(f64, f64)], closed: bool, color: Rgba<u8>, width: f64) {
        let mut run: Vec<(f64, f64)> = Vec::with_capacity(vertices.len() + 1);
        let projected: Vec<Option<(f64, f64)>> = vertices
            .iter()
            .chain(closed.then_some(vertices.first()).flatten())
            .map(|&(ra, dec)| self.world_to_plot(ra, dec))
            .collect();

        for point in projected {
            match point {
                Some(p) => run.push(p),
                None => {
                    draw_polyline(&mut self.plot, &run, width, LineStyle::Solid, color);
                    run.clear();
                }
            }
        }
        draw_polyline(&mut self.plot, &run, width, LineStyle::Solid, color);
    }

    /// Draw one ds9 region in its own color and width.
    pub fn show_region(&mut self, region: &Region) {
        if region.color.is_none() {
            return;
        }
        let color = region.color.rgba();
        let width = region.width;

        match &region.shape {
            RegionShape::Circle { center, radius } => self.show_circle(*center, *radius, color, width),
            RegionShape::Ellipse {
                center,
                semi_major,
                semi_minor,
                angle,
            } => self.show_ellipse(
                *center,
                2.0 * semi_major,
                2.0 * semi_minor,
                *angle,
                color,
                width,
                LineStyle::Solid,
            ),
            RegionShape::Box {
                center,
                width: box_width,
                height: box_height,
                angle,
            } => {
                let Some(c) = self.world_to_plot(center.0, center.1) else {
                    return;
                };
                let hw = self.degrees_to_pixels(*box_width) / 2.0;
                let hh = self.degrees_to_pixels(*box_height) / 2.0;
                let (sin_a, cos_a) = angle.to_radians().sin_cos();
                let corners: Vec<(f64, f64)> = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh), (-hw, -hh)]
                    .iter()
                    .map(|&(u, v)| (c.0 + u * cos_a - v * sin_a, c.1 - (u * sin_a + v * cos_a)))
                    .collect();
                draw_polyline(&mut self.plot, &corners, width, LineStyle::Solid, color);
            }
            RegionShape::Point { center } => {
                self.show_markers(&[*center], MarkerShape::Square, 100.0, width, None, Some(color));
            }
            RegionShape::Line { start, end } => self.show_sky_path(&[*start, *end], false, color, width),
            RegionShape::Polygon { vertices } => self.show_sky_path(vertices, true, color, width),
        }
    }

    fn sky_bounds(&self) -> SkyBounds {
        let n = self.plot_size() as f64 - 1.0;
        let mut bounds = SkyBounds {
            ra_min: f64::INFINITY,
            ra_max: f64::NEG_INFINITY,
            dec_min: f64::INFINITY,
            dec_max: f64::NEG_INFINITY,
        };

        const STEPS: usize = 32;
        for i in 0..=STEPS {
            let t = n * i as f64 / STEPS as f64;
            for (x, y) in [(t, 0.0), (t, n), (0.0, t), (n, t)] {
                let (ra, dec) = self.plot_to_world(x, y);
                let ra = self.center.0 + wrap_degrees(ra - self.center.0);
                bounds.ra_min = bounds.ra_min.min(ra);
                bounds.ra_max = bounds.ra_max.max(ra);
                bounds.dec_min = bounds.dec_min.min(dec);
                bounds.dec_max = bounds.dec_max.max(dec);
            }
        }

        // A pole inside the field spans every right ascension
        for pole in [90.0, -90.0] {
            let Some((x, y)) = self.world_to_plot(0.0, pole) else {
                continue;
            };
            if (0.0..=n).contains(&x) && (0.0..=n).contains(&y) {
                bounds.ra_min = self.center.0 - 180.0;
                bounds.ra_max = self.center.0 + 180.0;
                if pole > 0.0 {
                    bounds.dec_max = 90.0;
                } else {
                    bounds.dec_min = -90.0;
                }
            }
        }
        bounds
    }

    /// Coordinate grid with lines every `spacing` degrees in RA and Dec.
    pub fn add_grid(&mut self, spacing: f64, color: Rgba<u8>) -> Result<()> {
        if !(spacing.is_finite() && spacing > 0.0) {
            bail!("Grid spacing must be a positive number of degrees, got {}", spacing);
        }
        let b = self.sky_bounds();
        let line_count = (b.ra_max - b.ra_min) / spacing + (b.dec_max - b.dec_min) / spacing;
        if line_count > MAX_GRID_LINES {
            warn!(
                "Grid spacing {:.4e} deg would need {:.0} lines; grid skipped",
                spacing, line_count
            );
            return Ok(());
        }

        let steps = |lo: f64, hi: f64| -> Vec<f64> {
            (0..=GRID_SAMPLES)
                .map(|i| lo + (hi - lo) * i as f64 / GRID_SAMPLES as f64)
                .collect()
        };
        let multiples = |lo: f64, hi: f64| (lo / spacing).ceil() as i64..=(hi / spacing).floor() as i64;

        let ra_samples = steps(b.ra_min, b.ra_max);
        let dec_samples = steps(b.dec_min, b.dec_max);
        for k in multiples(b.dec_min, b.dec_max) {
            let dec = k as f64 * spacing;
            let path: Vec<(f64, f64)> = ra_samples.iter().map(|&ra| (ra, dec)).collect();
            self.show_sky_path(&path, false, color, 1.0);
        }
        for k in multiples(b.ra_min, b.ra_max) {
            let ra = k as f64 * spacing;
            let path: Vec<(f64, f64)> = dec_samples.iter().map(|&dec| (ra, dec)).collect();
            self.show_sky_path(&path, false, color, 1.0);
        }
        debug!("Grid drawn every {:.4e} deg over {:?}", spacing, b);
        Ok(())
    }

    /// Tick positions along the bottom (RA) and left (Dec) edges of the plot,
    /// with their labels.
    fn ticks(&self) -> (Vec<(f64, String)>, Vec<(f64, String)>) {
        let b = self.sky_bounds();
        let pick = |span: f64| {
            TICK_SPACINGS
                .iter()
                .copied()
                .find(|s| span / s <= MAX_TICKS)
                .unwrap_or(90.0)
        };
        let ra_spacing = pick(b.ra_max - b.ra_min);
        let dec_spacing = pick(b.dec_max - b.dec_min);

        let n = self.plot_size();
        let bottom = n as f64 - 1.0;
        let mut ra_ticks = Vec::new();
        let mut dec_ticks = Vec::new();

        let mut previous: Option<(f64, f64)> = None;
        for x in 0..n {
            let x = x as f64;
            let (ra, _) = self.plot_to_world(x, bottom);
            let ra = self.center.0 + wrap_degrees(ra - self.center.0);
            if let Some(tick) = previous.and_then(|p| crossing(p, (x, ra), ra_spacing)) {
                ra_ticks.push((tick.0, format_ra(tick.1, ra_spacing)));
            }
            previous = Some((x, ra));
        }

        previous = None;
        for y in 0..n {
            let y = y as f64;
            let (_, dec) = self.plot_to_world(0.0, y);
            if let Some(tick) = previous.and_then(|p| crossing(p, (y, dec), dec_spacing)) {
                dec_ticks.push((tick.0, format_dec(tick.1)));
            }
            previous = Some((y, dec));
        }

        (ra_ticks, dec_ticks)
    }

    /// The full figure: plot area framed, with ticks, labels and title.
    pub fn render(&self) -> RgbaImage {
        let n = self.plot_size();
        let mut canvas = RgbaImage::from_pixel(
            n + MARGIN_LEFT + MARGIN_RIGHT,
            n + MARGIN_TOP + MARGIN_BOTTOM,
            BACKGROUND,
        );
        image::imageops::replace(&mut canvas, &self.plot, MARGIN_LEFT as i64, MARGIN_TOP as i64);
        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(MARGIN_LEFT as i32 - 1, MARGIN_TOP as i32 - 1).of_size(n + 2, n + 2),
            INK,
        );

        let left = MARGIN_LEFT as f64;
        let top = MARGIN_TOP as f64;
        let bottom = top + n as f64;
        let label_height = (GLYPH_HEIGHT * LABEL_SCALE) as i64;

        let (ra_ticks, dec_ticks) = self.ticks();
        for (x, label) in &ra_ticks {
            let x = left + x;
            draw_line_segment_mut(
                &mut canvas,
                (x as f32, bottom as f32),
                (x as f32, (bottom - TICK_LENGTH) as f32),
                INK,
            );
            if self.tick_labels_visible {
                draw_text_centered(&mut canvas, x.round() as i64, bottom as i64 + 8, label, INK, LABEL_SCALE);
            }
        }
        for (y, label) in &dec_ticks {
            let y = top + y;
            draw_line_segment_mut(
                &mut canvas,
                (left as f32, y as f32),
                ((left + TICK_LENGTH) as f32, y as f32),
                INK,
            );
            if self.tick_labels_visible {
                let width = text_width(label, LABEL_SCALE) as i64;
                draw_text(
                    &mut canvas,
                    left as i64 - 8 - width,
                    y.round() as i64 - label_height / 2,
                    label,
                    INK,
                    LABEL_SCALE,
                );
            }
        }

        if self.axis_labels_visible {
            let middle = (left + n as f64 / 2.0) as i64;
            draw_text_centered(&mut canvas, middle, bottom as i64 + 36, "RA (J2000)", INK, LABEL_SCALE);

            // Written top to bottom, one glyph per line
            let label = "Dec (J2000)";
            let line = label_height + 4;
            let y0 = top as i64 + (n as i64 - line * label.chars().count() as i64) / 2;
            for (i, c) in label.chars().enumerate() {
                draw_char(&mut canvas, 12, y0 + i as i64 * line, c, INK, LABEL_SCALE);
            }
        }

        if let Some(title) = &self.title {
            let middle = (left + n as f64 / 2.0) as i64;
            draw_text_centered(&mut canvas, middle, 14, title, INK, TITLE_SCALE);
        }

        canvas
    }

    /// Write the rendered figure. `.png` (or no extension) uses the PNG
    /// encoder with best compression; other extensions are encoded by the
    /// image crate from the extension, without alpha.
    pub fn save(&self, path: &Path) -> Result<()> {
        let canvas = self.render();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(true, |e| e.eq_ignore_ascii_case("png"));

        if is_png {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            let writer = BufWriter::new(file);
            let encoder = PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive);
            encoder
                .write_image(
                    &canvas,
                    canvas.width(),
                    canvas.height(),
                    ColorType::Rgba8.into(),
                )
                .with_context(|| format!("Failed to write PNG image to {}", path.display()))?;
        } else {
            DynamicImage::ImageRgba8(canvas)
                .to_rgb8()
                .save(path)
                .with_context(|| format!("Failed to write image to {}", path.display()))?;
        }

        info!("Saved overlay to {}", path.display());
        Ok(())
    }

    pub fn connect_click(&mut self, handler: Box<dyn ClickHandler>) {
        self.click_handler = Some(handler);
    }

    pub fn has_click_handler(&self) -> bool {
        self.click_handler.is_some()
    }

    /// Forward a click to the connected handler. Returns false when none is connected.
    pub fn dispatch_click(&mut self, event: &ClickEvent) -> bool {
        let Some(mut handler) = self.click_handler.take() else {
            return false;
        };
        handler.on_click(self, event);
        self.click_handler = Some(handler);
        true
    }
}

/// Angle folded into `[-180, 180)`.
fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Position and value of the multiple of `spacing` crossed between two
/// samples `(position, value)`, if any.
fn crossing(a: (f64, f64), b: (f64, f64), spacing: f64) -> Option<(f64, f64)> {
    let (ka, kb) = ((a.1 / spacing).floor(), (b.1 / spacing).floor());
    if ka == kb || !ka.is_finite() || !kb.is_finite() {
        return None;
    }
    let value = ka.max(kb) * spacing;
    let t = (value - a.1) / (b.1 - a.1);
    Some((a.0 + t * (b.0 - a.0), value))
}

/// Right ascension as `hh:mm:ss`, with tenths of a second for fine spacings.
pub fn format_ra(ra: f64, spacing: f64) -> String {
    let seconds = ra.rem_euclid(360.0) * 240.0;
    // One degree of RA is 240 seconds of time
    let tenths = spacing * 240.0 < 1.0;
    let scale: i64 = if tenths { 10 } else { 1 };
    let units = (seconds * scale as f64).round() as i64 % (24 * 3600 * scale);
    let hours = units / (3600 * scale);
    let minutes = (units / (60 * scale)) % 60;
    let secs = units % (60 * scale);
    if tenths {
        format!("{:02}:{:02}:{:02}.{}", hours, minutes, secs / 10, secs % 10)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

/// Declination as `+dd:mm:ss`.
pub fn format_dec(dec: f64) -> String {
    let units = (dec.abs() * 3600.0).round() as i64;
    let sign = if dec < 0.0 && units > 0 { '-' } else { '+' };
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        units / 3600,
        (units / 60) % 60,
        units % 60
    )
}
