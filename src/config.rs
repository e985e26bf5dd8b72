//! Overlay configuration and the small styling types it is made of.

use anyhow::{anyhow, bail, Context, Result};
use image::Rgba;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::fits::Beam;

/// An RGBA color parsed from a matplotlib-style name, a single-letter code,
/// `#rrggbb`, or `none`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    name: String,
    rgba: [u8; 4],
}

impl Color {
    pub fn rgba(&self) -> Rgba<u8> {
        Rgba(self.rgba)
    }

    /// `none` colors draw nothing.
    pub fn is_none(&self) -> bool {
        self.rgba[3] == 0
    }

    pub fn named(name: &str) -> Self {
        // Only used with the literal names below
        name.parse().unwrap_or_else(|_| Self {
            name: "white".to_string(),
            rgba: [255, 255, 255, 255],
        })
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        let rgb: [u8; 3] = match name.as_str() {
            "none" => {
                return Ok(Self {
                    name,
                    rgba: [0, 0, 0, 0],
                })
            }
            "white" | "w" => [255, 255, 255],
            "black" | "k" => [0, 0, 0],
            "red" | "r" => [255, 0, 0],
            "green" | "g" => [0, 128, 0],
            "lime" => [0, 255, 0],
            "blue" | "b" => [0, 0, 255],
            "yellow" | "y" => [255, 255, 0],
            "cyan" | "c" => [0, 255, 255],
            "magenta" | "m" => [255, 0, 255],
            "orange" => [255, 165, 0],
            "lightgreen" => [144, 238, 144],
            "lightblue" => [173, 216, 230],
            "salmon" => [250, 128, 114],
            "pink" => [255, 192, 203],
            "purple" => [128, 0, 128],
            "grey" | "gray" => [128, 128, 128],
            hex if hex.starts_with('#') && hex.len() == 7 => {
                let channel = |range: std::ops::Range<usize>| {
                    u8::from_str_radix(&hex[range], 16)
                        .map_err(|_| anyhow!("Invalid hex color: {}", s))
                };
                [channel(1..3)?, channel(3..5)?, channel(5..7)?]
            }
            _ => bail!("Unknown color: {}", s),
        };
        Ok(Self {
            name,
            rgba: [rgb[0], rgb[1], rgb[2], 255],
        })
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.name
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Marker glyphs, using matplotlib's single-character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MarkerShape {
    Plus,
    Cross,
    Circle,
    Square,
    Diamond,
    TriangleUp,
    TriangleDown,
    Star,
}

impl MarkerShape {
    pub fn code(&self) -> &'static str {
        match self {
            MarkerShape::Plus => "+",
            MarkerShape::Cross => "x",
            MarkerShape::Circle => "o",
            MarkerShape::Square => "s",
            MarkerShape::Diamond => "D",
            MarkerShape::TriangleUp => "^",
            MarkerShape::TriangleDown => "v",
            MarkerShape::Star => "*",
        }
    }
}

impl FromStr for MarkerShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "+" => MarkerShape::Plus,
            "x" | "X" => MarkerShape::Cross,
            "o" => MarkerShape::Circle,
            "s" => MarkerShape::Square,
            "D" | "d" => MarkerShape::Diamond,
            "^" => MarkerShape::TriangleUp,
            "v" => MarkerShape::TriangleDown,
            "*" => MarkerShape::Star,
            other => bail!("Unknown marker: {}. Use one of + x o s D ^ v *", other),
        })
    }
}

impl TryFrom<String> for MarkerShape {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MarkerShape> for String {
    fn from(shape: MarkerShape) -> Self {
        shape.code().to_string()
    }
}

/// Line dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineStyle {
    /// Alternating on/off run lengths in pixels per unit line width; empty means solid.
    pub fn dash_pattern(&self) -> &'static [f64] {
        match self {
            LineStyle::Solid => &[],
            LineStyle::Dashed => &[3.7, 1.6],
            LineStyle::Dotted => &[1.0, 1.65],
            LineStyle::DashDot => &[6.4, 1.6, 1.0, 1.6],
        }
    }
}

impl FromStr for LineStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "solid" | "-" => LineStyle::Solid,
            "dashed" | "--" => LineStyle::Dashed,
            "dotted" | ":" => LineStyle::Dotted,
            "dashdot" | "-." => LineStyle::DashDot,
            other => bail!("Unknown line style: {}", other),
        })
    }
}

impl TryFrom<String> for LineStyle {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LineStyle> for String {
    fn from(style: LineStyle) -> Self {
        match style {
            LineStyle::Solid => "solid",
            LineStyle::Dashed => "dashed",
            LineStyle::Dotted => "dotted",
            LineStyle::DashDot => "dashdot",
        }
        .to_string()
    }
}

/// A style shared by every catalogue ellipse, or one entry per ellipse.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PerEllipse<T> {
    Each(Vec<T>),
    All(T),
}

impl<T> PerEllipse<T> {
    /// Style for ellipse `index`; a list that is too short is an error.
    pub fn get(&self, index: usize) -> Result<&T> {
        match self {
            PerEllipse::All(value) => Ok(value),
            PerEllipse::Each(values) => values.get(index).ok_or_else(|| {
                anyhow!(
                    "Per-ellipse style list has {} entries but ellipse {} was requested",
                    values.len(),
                    index
                )
            }),
        }
    }
}

/// Every display option of an overlay. Each field controls one independent
/// draw step; nothing here is cross-validated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Title at the top of the plot
    pub title: Option<String>,
    /// Save to this file instead of handing the figure to a viewer
    pub save_name: Option<PathBuf>,
    /// Ask the viewer to wait until closed
    pub block: bool,
    /// Attach a click handler to the figure
    pub interactive: bool,
    /// Side length of the square plot area in pixels
    pub canvas_size: u32,

    /// Draw the primary (LOFAR) contours
    pub show_lofar: bool,
    pub lofar_color: Color,
    /// Contour line width
    pub lw: f64,
    /// Lowest primary contour in units of the local rms
    pub lofar_level: f64,
    /// Dynamic range limit: lowest contour is at least peak / dr_limit
    pub dr_limit: f64,
    /// Use this rms instead of estimating it around the target
    pub rms: Option<f64>,
    /// Use this peak flux density instead of the map maximum
    pub peak: Option<f64>,
    pub first_color: Color,
    pub vlass_color: Color,

    /// Lower display cutoff of the optical image at mean + noise_thresh * rms
    pub noise_thresh: f64,

    /// Restoring beam drawn in the bottom-left corner
    pub beam: Option<Beam>,

    /// Large cross at the target (or at coords_ra/coords_dec)
    pub plot_coords: bool,
    pub coords_ra: Option<f64>,
    pub coords_dec: Option<f64>,
    pub coords_color: Color,
    pub coords_lw: f64,

    /// Deprecated marker list; use position groups instead
    pub marker_ra: Option<Vec<f64>>,
    pub marker_dec: Option<Vec<f64>>,
    pub marker_color: Color,
    pub marker_lw: f64,

    /// Radius in degrees of a circle around the target
    pub circle_radius: Option<f64>,

    /// Catalogue Maj/Min are divided by this to get degrees
    pub overlay_scale: f64,
    pub ellipse_color: PerEllipse<Color>,
    pub lw_ellipse: PerEllipse<f64>,
    pub ellipse_style: PerEllipse<LineStyle>,

    /// Hide axis and tick labels
    pub no_labels: bool,
    pub show_grid: bool,
    /// Grid line spacing in degrees for both axes
    pub grid_spacing: f64,
    pub grid_color: Color,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            title: None,
            save_name: None,
            block: true,
            interactive: false,
            canvas_size: 800,
            show_lofar: true,
            lofar_color: Color::named("yellow"),
            lw: 1.0,
            lofar_level: 2.0,
            dr_limit: 500.0,
            rms: None,
            peak: None,
            first_color: Color::named("lightgreen"),
            vlass_color: Color::named("salmon"),
            noise_thresh: 1.0,
            beam: None,
            plot_coords: true,
            coords_ra: None,
            coords_dec: None,
            coords_color: Color::named("white"),
            coords_lw: 1.0,
            marker_ra: None,
            marker_dec: None,
            marker_color: Color::named("white"),
            marker_lw: 3.0,
            circle_radius: None,
            overlay_scale: 1.0,
            ellipse_color: PerEllipse::All(Color::named("red")),
            lw_ellipse: PerEllipse::All(3.0),
            ellipse_style: PerEllipse::All(LineStyle::Solid),
            no_labels: false,
            show_grid: true,
            grid_spacing: 1.0 / 60.0,
            grid_color: Color::named("white"),
        }
    }
}

impl OverlayConfig {
    /// Load a JSON configuration; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Cross position, defaulting to the overlay centre.
    pub fn coords_position(&self, ra: f64, dec: f64) -> (f64, f64) {
        match (self.coords_ra, self.coords_dec) {
            (Some(cra), Some(cdec)) => (cra, cdec),
            _ => (ra, dec),
        }
    }
}
