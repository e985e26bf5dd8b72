use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::catalogue::{read_table, CatalogueEntry, MarkerGroup, Position};
use crate::cli::StyleOptions;
use crate::config::{Color, MarkerShape, OverlayConfig};
use crate::fits::SkyImage;
use crate::overlay::{show_overlay, OverlayInputs};
use crate::region::load_regions;
use crate::retry::RetryPolicy;

/// Everything the `render` subcommand was given.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub optical: PathBuf,
    pub ra: f64,
    pub dec: f64,
    pub size: f64,
    pub lofar: Option<PathBuf>,
    pub first: Option<PathBuf>,
    pub vlass: Option<PathBuf>,
    pub catalogue: Option<PathBuf>,
    pub positions: Vec<String>,
    pub region: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub retries: u32,
    pub style: StyleOptions,
}

/// Load the inputs named in `request` and write the overlay.
pub fn render_overlay(request: RenderRequest) -> Result<()> {
    let mut config = match &request.config {
        Some(path) => OverlayConfig::from_json_file(path)?,
        None => OverlayConfig::default(),
    };
    request.style.apply_to(&mut config);
    if let Some(output) = &request.output {
        config.save_name = Some(output.clone());
    }
    if config.save_name.is_none() {
        bail!("No output file: pass --output or set save_name in the config");
    }

    let policy = RetryPolicy {
        max_attempts: request.retries.max(1),
        ..RetryPolicy::default()
    };
    let open = |path: &Option<PathBuf>| -> Result<Option<SkyImage>> {
        path.as_deref().map(|p| SkyImage::open(p, &policy)).transpose()
    };

    let optical = SkyImage::open(&request.optical, &policy)?;
    let lofar = open(&request.lofar)?;

    if config.beam.is_none() {
        if let Some(beam) = lofar.as_ref().and_then(|l| l.beam) {
            info!(
                "Using beam from radio map header: {:.2}\" x {:.2}\" PA {:.1}",
                beam.major * 3600.0,
                beam.minor * 3600.0,
                beam.angle
            );
            config.beam = Some(beam);
        }
    }

    let mut inputs = OverlayInputs::new(optical, request.ra, request.dec, request.size);
    inputs.lofar = lofar;
    inputs.first = open(&request.first)?;
    inputs.vlass = open(&request.vlass)?;

    if let Some(path) = &request.catalogue {
        let entries: Vec<CatalogueEntry> = read_table(path)?;
        info!("Loaded {} catalogue entries from {}", entries.len(), path.display());
        inputs.catalogue = Some(entries);
    }

    for spec in &request.positions {
        inputs.positions.push(load_position_group(spec)?);
    }

    if let Some(path) = &request.region {
        inputs.regions = load_regions(path)?;
        info!("Loaded {} regions from {}", inputs.regions.len(), path.display());
    }

    show_overlay(&inputs, &config, None, None)?;
    Ok(())
}

/// Split `FILE[:MARKER[:COLOR]]`; the marker defaults to `x`. A leading
/// drive letter (`C:\...`) belongs to the file name.
fn parse_position_spec(spec: &str) -> Result<(PathBuf, MarkerShape, Option<Color>)> {
    let bytes = spec.as_bytes();
    let drive = bytes.len() > 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/');
    let (prefix, rest) = spec.split_at(if drive { 2 } else { 0 });

    let mut parts = rest.splitn(3, ':');
    let path = match parts.next() {
        Some(p) if !p.is_empty() => PathBuf::from(format!("{}{}", prefix, p)),
        _ => bail!("Empty position file in '{}'", spec),
    };
    let marker = match parts.next() {
        Some(m) => m
            .parse::<MarkerShape>()
            .with_context(|| format!("Bad marker in position spec '{}'", spec))?,
        None => MarkerShape::Cross,
    };
    let color = parts
        .next()
        .map(|c| c.parse::<Color>())
        .transpose()
        .with_context(|| format!("Bad color in position spec '{}'", spec))?;
    Ok((path, marker, color))
}

fn load_position_group(spec: &str) -> Result<MarkerGroup> {
    let (path, marker, color) = parse_position_spec(spec)?;
    let positions: Vec<Position> = read_table(&path)?;
    info!(
        "Loaded {} positions from {} (marker '{}')",
        positions.len(),
        path.display(),
        marker.code()
    );
    let group = MarkerGroup::new(positions, marker);
    Ok(match color {
        Some(color) => group.outlined(color),
        None => group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_spec() {
        let (path, marker, color) = parse_position_spec("hosts.csv").unwrap();
        assert_eq!(path, PathBuf::from("hosts.csv"));
        assert_eq!(marker, MarkerShape::Cross);
        assert!(color.is_none());

        let (_, marker, color) = parse_position_spec("hosts.csv:o:cyan").unwrap();
        assert_eq!(marker, MarkerShape::Circle);
        assert_eq!(color.map(|c| c.to_string()).as_deref(), Some("cyan"));

        let (path, marker, color) = parse_position_spec(r"C:\data\hosts.csv:s:red").unwrap();
        assert_eq!(path, PathBuf::from(r"C:\data\hosts.csv"));
        assert_eq!(marker, MarkerShape::Square);
        assert!(color.is_some());
        let (path, marker, _) = parse_position_spec("D:/hosts.csv").unwrap();
        assert_eq!(path, PathBuf::from("D:/hosts.csv"));
        assert_eq!(marker, MarkerShape::Cross);

        assert!(parse_position_spec(":o").is_err());
        assert!(parse_position_spec("hosts.csv:?").is_err());
        assert!(parse_position_spec("hosts.csv:o:notacolor").is_err());
    }

    #[test]
    fn test_missing_output_is_an_error() {
        let request = RenderRequest {
            optical: PathBuf::from("does-not-matter.fits"),
            ra: 0.0,
            dec: 0.0,
            size: 0.1,
            lofar: None,
            first: None,
            vlass: None,
            catalogue: None,
            positions: Vec::new(),
            region: None,
            config: None,
            output: None,
            retries: 1,
            style: StyleOptions::default(),
        };
        let err = render_overlay(request).unwrap_err();
        assert!(err.to_string().contains("--output"));
    }

    #[test]
    fn test_position_group_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.csv");
        std::fs::write(&path, "ra,dec\n150.0,2.0\n150.01,2.01\n").unwrap();

        let group = load_position_group(&format!("{}:D:red", path.display())).unwrap();
        assert_eq!(group.positions.len(), 2);
        assert_eq!(group.marker, MarkerShape::Diamond);
        assert!(group.edge_color.is_some());
    }
}
