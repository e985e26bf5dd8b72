//! ds9 region files in celestial coordinates.
//!
//! Supports `circle`, `ellipse`, `box`, `point`, `line` and `polygon` in
//! fk5/icrs/j2000 frames, with positions in degrees or sexagesimal and sizes
//! in degrees (`d` or bare), arcminutes (`'`) or arcseconds (`"`). Shapes in
//! other frames are skipped with a warning.

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::config::Color;

static SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*[-+]?\s*(circle|ellipse|box|point|line|polygon)\s*\(([^)]*)\)\s*(?:#(.*))?$")
        .expect("static regex")
});
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcolor\s*=\s*(#[0-9a-f]{6}|\w+)").expect("static regex"));
static WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwidth\s*=\s*(\d+(?:\.\d*)?)").expect("static regex"));

/// Geometry of one region, sky positions in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionShape {
    Circle {
        center: (f64, f64),
        radius: f64,
    },
    Ellipse {
        center: (f64, f64),
        semi_major: f64,
        semi_minor: f64,
        /// Degrees counter-clockwise from west
        angle: f64,
    },
    Box {
        center: (f64, f64),
        width: f64,
        height: f64,
        angle: f64,
    },
    Point {
        center: (f64, f64),
    },
    Line {
        start: (f64, f64),
        end: (f64, f64),
    },
    Polygon {
        vertices: Vec<(f64, f64)>,
    },
}

/// A region with its drawing properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub shape: RegionShape,
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Celestial,
    Other,
}

/// Load and parse a region file.
pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read region file: {}", path.display()))?;
    parse_regions(&text).with_context(|| format!("Failed to parse region file: {}", path.display()))
}

/// Parse ds9 region text.
pub fn parse_regions(text: &str) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    let mut frame = Frame::Celestial;
    let mut default_color = Color::named("green");
    let mut default_width = 1.0;

    for (line_no, raw_line) in text.lines().enumerate() {
        // Several shapes may share a line separated by ';'
        for line in raw_line.split(';').map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let lower = line.to_lowercase();
            if lower.starts_with("global") {
                if let Some(color) = property_color(line)? {
                    default_color = color;
                }
                if let Some(width) = property_width(line) {
                    default_width = width;
                }
                continue;
            }
            if matches!(lower.as_str(), "fk5" | "icrs" | "j2000" | "fk4" | "b1950") {
                frame = Frame::Celestial;
                continue;
            }
            if matches!(
                lower.as_str(),
                "image" | "physical" | "galactic" | "ecliptic" | "linear" | "detector"
            ) {
                warn!("Region frame '{}' is not supported; its shapes are skipped", line);
                frame = Frame::Other;
                continue;
            }

            let Some(caps) = SHAPE_RE.captures(line) else {
                debug!("Skipping region line {}: {}", line_no + 1, line);
                continue;
            };
            if frame == Frame::Other {
                continue;
            }

            let kind = caps[1].to_lowercase();
            let args: Vec<&str> = caps[2].split(',').map(str::trim).collect();
            let shape = parse_shape(&kind, &args)
                .with_context(|| format!("Line {}: {}", line_no + 1, line))?;

            let properties = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            let color = property_color(properties)?.unwrap_or_else(|| default_color.clone());
            let width = property_width(properties).unwrap_or(default_width);

            regions.push(Region { shape, color, width });
        }
    }

    Ok(regions)
}

fn property_color(text: &str) -> Result<Option<Color>> {
    COLOR_RE
        .captures(text)
        .map(|caps| caps[1].parse::<Color>())
        .transpose()
}

fn property_width(text: &str) -> Option<f64> {
    WIDTH_RE.captures(text).and_then(|caps| caps[1].parse().ok())
}

fn parse_shape(kind: &str, args: &[&str]) -> Result<RegionShape> {
    let need = |n: usize| -> Result<()> {
        if args.len() < n {
            bail!("{} needs at least {} arguments, got {}", kind, n, args.len());
        }
        Ok(())
    };
    let position = |i: usize| -> Result<(f64, f64)> { Ok((parse_ra(args[i])?, parse_dec(args[i + 1])?)) };
    let angle = |i: usize| -> Result<f64> {
        match args.get(i) {
            Some(a) => a.parse().map_err(|_| anyhow!("Bad angle: {}", a)),
            None => Ok(0.0),
        }
    };

    Ok(match kind {
        "circle" => {
            need(3)?;
            RegionShape::Circle {
                center: position(0)?,
                radius: parse_size(args[2])?,
            }
        }
        "ellipse" => {
            need(4)?;
            RegionShape::Ellipse {
                center: position(0)?,
                semi_major: parse_size(args[2])?,
                semi_minor: parse_size(args[3])?,
                angle: angle(4)?,
            }
        }
        "box" => {
            need(4)?;
            RegionShape::Box {
                center: position(0)?,
                width: parse_size(args[2])?,
                height: parse_size(args[3])?,
                angle: angle(4)?,
            }
        }
        "point" => {
            need(2)?;
            RegionShape::Point {
                center: position(0)?,
            }
        }
        "line" => {
            need(4)?;
            RegionShape::Line {
                start: position(0)?,
                end: position(2)?,
            }
        }
        "polygon" => {
            if args.len() < 6 || args.len() % 2 != 0 {
                bail!("polygon needs an even number (>= 6) of coordinates");
            }
            RegionShape::Polygon {
                vertices: (0..args.len())
                    .step_by(2)
                    .map(position)
                    .collect::<Result<_>>()?,
            }
        }
        other => bail!("Unsupported region shape: {}", other),
    })
}

/// Parse `h:m:s` (hours) or decimal degrees.
pub fn parse_ra(text: &str) -> Result<f64> {
    if text.contains(':') || text.contains('h') {
        Ok(parse_sexagesimal(text)? * 15.0)
    } else {
        text.trim_end_matches('d')
            .parse()
            .map_err(|_| anyhow!("Bad RA: {}", text))
    }
}

/// Parse `±d:m:s`, `±XdYmZs` or decimal degrees.
pub fn parse_dec(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let unit_form = trimmed.contains(['m', 's'])
        || trimmed.find('d').is_some_and(|i| i + 1 < trimmed.len());
    if trimmed.contains(':') || unit_form {
        parse_sexagesimal(text)
    } else {
        text.trim_end_matches('d')
            .parse()
            .map_err(|_| anyhow!("Bad Dec: {}", text))
    }
}

fn parse_sexagesimal(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let negative = trimmed.starts_with('-');
    let parts: Vec<f64> = trimmed
        .trim_start_matches(['+', '-'])
        .split([':', 'h', 'm', 's', 'd'])
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().map_err(|_| anyhow!("Bad sexagesimal value: {}", text)))
        .collect::<Result<_>>()?;
    if parts.is_empty() || parts.len() > 3 {
        bail!("Bad sexagesimal value: {}", text);
    }
    let value = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, div)| v / div)
        .sum::<f64>();
    Ok(if negative { -value } else { value })
}

/// Parse a size with an optional unit suffix into degrees.
pub fn parse_size(text: &str) -> Result<f64> {
    let (number, divisor) = if let Some(n) = text.strip_suffix('"') {
        (n, 3600.0)
    } else if let Some(n) = text.strip_suffix('\'') {
        (n, 60.0)
    } else if let Some(n) = text.strip_suffix('d') {
        (n, 1.0)
    } else {
        (text, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .map(|v| v / divisor)
        .map_err(|_| anyhow!("Bad size: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = r#"# Region file format: DS9 version 4.1
global color=cyan dashlist=8 3 width=2 font="helvetica 10 normal roman"
fk5
circle(188.7,47.2,10")
ellipse(12:34:48.0,+47:12:00,30",15",45) # color=red width=3
box(188.7,47.2,1',0.5',0)
point(188.71,47.21) # point=x
image
circle(100,100,20)
icrs
polygon(188.7,47.2,188.72,47.2,188.71,47.22) # color=#ff8000
"#;

    #[test]
    fn test_parse_sample_file() {
        let regions = parse_regions(SAMPLE).unwrap();
        assert_eq!(regions.len(), 5);

        match &regions[0].shape {
            RegionShape::Circle { center, radius } => {
                assert_eq!(*center, (188.7, 47.2));
                assert_relative_eq!(*radius, 10.0 / 3600.0);
            }
            other => panic!("expected circle, got {:?}", other),
        }
        assert_eq!(regions[0].color.to_string(), "cyan");
        assert_eq!(regions[0].width, 2.0);

        match &regions[1].shape {
            RegionShape::Ellipse { center, semi_major, angle, .. } => {
                assert_relative_eq!(center.0, 188.7, epsilon = 1e-9);
                assert_relative_eq!(center.1, 47.2, epsilon = 1e-9);
                assert_relative_eq!(*semi_major, 30.0 / 3600.0);
                assert_eq!(*angle, 45.0);
            }
            other => panic!("expected ellipse, got {:?}", other),
        }
        assert_eq!(regions[1].color.to_string(), "red");
        assert_eq!(regions[1].width, 3.0);

        assert!(matches!(regions[2].shape, RegionShape::Box { width, .. } if (width - 1.0 / 60.0).abs() < 1e-12));
        assert!(matches!(regions[3].shape, RegionShape::Point { .. }));
        // The image-frame circle is skipped
        match &regions[4].shape {
            RegionShape::Polygon { vertices } => assert_eq!(vertices.len(), 3),
            other => panic!("expected polygon, got {:?}", other),
        }
        assert_eq!(regions[4].color.rgba(), image::Rgba([255, 128, 0, 255]));
    }

    #[test]
    fn test_sexagesimal() {
        assert_relative_eq!(parse_ra("12:30:00").unwrap(), 187.5);
        assert_relative_eq!(parse_dec("-00:30:00").unwrap(), -0.5);
        assert_relative_eq!(parse_dec("+47:12:36").unwrap(), 47.21);
        assert_relative_eq!(parse_ra("188.5").unwrap(), 188.5);
        assert!(parse_dec("12:xx:00").is_err());

        assert_relative_eq!(parse_ra("12h30m00s").unwrap(), 187.5);
        assert_relative_eq!(parse_dec("+47d12m36s").unwrap(), 47.21);
        assert_relative_eq!(parse_dec("-0d30m00s").unwrap(), -0.5);
        assert_relative_eq!(parse_dec("47.21d").unwrap(), 47.21);
        assert!(parse_dec("47d12x").is_err());
    }

    #[test]
    fn test_sizes() {
        assert_relative_eq!(parse_size("36\"").unwrap(), 0.01);
        assert_relative_eq!(parse_size("3'").unwrap(), 0.05);
        assert_relative_eq!(parse_size("0.2d").unwrap(), 0.2);
        assert_relative_eq!(parse_size("0.2").unwrap(), 0.2);
        assert!(parse_size("big").is_err());
    }

    #[test]
    fn test_semicolon_separated_shapes() {
        let regions = parse_regions("fk5;circle(1,2,3\");point(1,2)").unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].color.to_string(), "green");
    }

    #[test]
    fn test_malformed_shape_is_an_error() {
        let err = parse_regions("fk5\ncircle(1,2)\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Line 2"));
    }
}
