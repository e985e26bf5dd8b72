use anyhow::{anyhow, bail, Context, Result};
use fitrs::{Fits, FitsData, FitsDataArray, HeaderValue, Hdu};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::wcs::Wcs;

/// Restoring beam of a radio map, all values in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Beam {
    pub major: f64,
    pub minor: f64,
    /// Position angle, north through east
    pub angle: f64,
}

/// Image pixels plus the celestial transform they were observed with.
///
/// Pixels are stored in FITS order: x fastest, then y, then channel. Blank
/// pixels are NaN.
#[derive(Debug, Clone)]
pub struct SkyImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f64>,
    pub wcs: Wcs,
    pub beam: Option<Beam>,
    pub object: Option<String>,
}

impl SkyImage {
    /// Build a single-plane image from row-major pixels (row 0 is the bottom of the sky).
    pub fn from_plane(width: usize, height: usize, data: Vec<f64>, wcs: Wcs) -> Result<Self> {
        Self::from_cube(1, width, height, data, wcs)
    }

    /// Build an image with `channels` planes of `width * height` pixels each.
    pub fn from_cube(
        channels: usize,
        width: usize,
        height: usize,
        data: Vec<f64>,
        wcs: Wcs,
    ) -> Result<Self> {
        if data.len() != channels * width * height {
            bail!(
                "Data size mismatch: expected {} pixels ({}x{}x{}), got {}",
                channels * width * height,
                channels,
                height,
                width,
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            wcs,
            beam: None,
            object: None,
        })
    }

    /// Whether the image carries more than one plane.
    pub fn is_cube(&self) -> bool {
        self.channels > 1
    }

    /// Pixels of one channel.
    pub fn plane(&self, channel: usize) -> Result<&[f64]> {
        if channel >= self.channels {
            bail!(
                "Channel {} out of range for image with {} channels",
                channel,
                self.channels
            );
        }
        let size = self.width * self.height;
        Ok(&self.data[channel * size..(channel + 1) * size])
    }

    /// Largest finite pixel value over all channels, NaN for an all-blank image.
    pub fn nan_max(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }

    /// Load the primary HDU of a FITS file, retrying transient failures.
    pub fn open(path: &Path, policy: &RetryPolicy) -> Result<Self> {
        retry_with_backoff(policy, &format!("Loading {}", path.display()), || {
            Self::from_file(path)
        })
    }

    /// Load the primary HDU of a FITS file using fitrs.
    ///
    /// Degenerate trailing axes (frequency and Stokes axes of radio maps) are
    /// flattened. BSCALE/BZERO are applied to every data type, so values are
    /// physical; blank pixels become NaN.
    pub fn from_file(path: &Path) -> Result<Self> {
        let fits = Fits::open(path)
            .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;

        let hdu = fits
            .get(0)
            .ok_or_else(|| anyhow!("No primary HDU found in FITS file"))?;

        let naxis = header_int(&hdu, "NAXIS")
            .ok_or_else(|| anyhow!("Missing NAXIS header"))? as usize;
        if naxis < 2 {
            bail!("FITS file does not contain 2D image data (NAXIS={})", naxis);
        }

        let axes = (1..=naxis)
            .map(|i| {
                header_int(&hdu, &format!("NAXIS{}", i))
                    .map(|n| n as usize)
                    .ok_or_else(|| anyhow!("Missing NAXIS{} header", i))
            })
            .collect::<Result<Vec<_>>>()?;

        let width = axes[0];
        let height = axes[1];
        let channels = axes.get(2).copied().unwrap_or(1).max(1);
        if axes.iter().skip(3).any(|&n| n > 1) {
            warn!(
                "{}: axes beyond the third are not degenerate ({:?}); using the first slice",
                path.display(),
                axes
            );
        }

        let bscale = header_float(&hdu, "BSCALE").unwrap_or(1.0);
        let bzero = header_float(&hdu, "BZERO").unwrap_or(0.0);

        let physical = |raw: f64| raw * bscale + bzero;
        let mut data: Vec<f64> = match hdu.read_data() {
            FitsData::Characters(_) => {
                bail!("FITS file contains character data, not image data");
            }
            FitsData::IntegersI32(FitsDataArray { data, .. }) => data
                .iter()
                .map(|value| value.map_or(f64::NAN, |raw| physical(raw as f64)))
                .collect(),
            FitsData::IntegersU32(FitsDataArray { data, .. }) => data
                .iter()
                .map(|value| value.map_or(f64::NAN, |raw| physical(raw as f64)))
                .collect(),
            FitsData::FloatingPoint32(FitsDataArray { data, .. }) => {
                data.iter().map(|&value| physical(value as f64)).collect()
            }
            FitsData::FloatingPoint64(FitsDataArray { data, .. }) => {
                data.iter().map(|&value| physical(value)).collect()
            }
        };

        let expected = width * height * channels;
        if data.len() < expected {
            bail!(
                "Data size mismatch: expected {} pixels, got {}",
                expected,
                data.len()
            );
        }
        data.truncate(expected);

        let wcs = Wcs::from_header(|key| header_float(&hdu, key))?
            .ok_or_else(|| anyhow!("{} has no celestial WCS keywords", path.display()))?;

        for key in ["CTYPE1", "CTYPE2"] {
            if let Some(HeaderValue::CharacterString(ctype)) = hdu.value(key) {
                if !Wcs::is_tan_projection(ctype) {
                    warn!(
                        "{}: {} = '{}' is not a TAN projection; reading it as TAN",
                        path.display(),
                        key,
                        ctype.trim()
                    );
                }
            }
        }

        let beam = match (
            header_float(&hdu, "BMAJ"),
            header_float(&hdu, "BMIN"),
            header_float(&hdu, "BPA"),
        ) {
            (Some(major), Some(minor), angle) => Some(Beam {
                major,
                minor,
                angle: angle.unwrap_or(0.0),
            }),
            _ => None,
        };

        let object = match hdu.value("OBJECT") {
            Some(HeaderValue::CharacterString(s)) => Some(s.trim().to_string()),
            _ => None,
        };

        debug!(
            "Loaded {}: {}x{}x{} pixels, scale {:.3} arcsec/pixel, beam {:?}",
            path.display(),
            channels,
            height,
            width,
            wcs.pixel_scale() * 3600.0,
            beam
        );

        Ok(Self {
            width,
            height,
            channels,
            data,
            wcs,
            beam,
            object,
        })
    }
}

fn header_int(hdu: &Hdu, key: &str) -> Option<i64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(*n as i64),
        HeaderValue::RealFloatingNumber(f) => Some(*f as i64),
        _ => None,
    }
}

fn header_float(hdu: &Hdu, key: &str) -> Option<f64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(*n as f64),
        HeaderValue::RealFloatingNumber(f) => Some(*f),
        HeaderValue::CharacterString(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Metadata extracted from a FITS file
#[derive(Debug, serde::Serialize)]
pub struct FitsMetadata {
    pub filename: String,
    pub keywords: HashMap<String, String>,
    pub dimensions: Vec<usize>,
}

impl FitsMetadata {
    fn float(&self, key: &str) -> Option<f64> {
        self.keywords.get(key).and_then(|v| v.parse().ok())
    }
}

/// Read primary header metadata using plain FITS card parsing
pub fn read_fits_metadata(path: &Path) -> Result<FitsMetadata> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    // Read header blocks until we find END
    let mut header_data = Vec::new();
    loop {
        let mut block = vec![0u8; 2880];
        if file.read_exact(&mut block).is_err() {
            break;
        }
        let has_end = block
            .chunks(80)
            .any(|card| card.starts_with(b"END ") || card == b"END");
        header_data.extend_from_slice(&block);
        if has_end {
            break;
        }

        // Don't read more than 36 blocks (~100 KB) of header
        if header_data.len() > 36 * 2880 {
            break;
        }
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let keywords = parse_fits_header(&header_data);

    let naxis = keywords
        .get("NAXIS")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let dimensions = (1..=naxis)
        .filter_map(|i| {
            keywords
                .get(&format!("NAXIS{}", i))
                .and_then(|s| s.parse::<usize>().ok())
        })
        .collect();

    Ok(FitsMetadata {
        filename,
        keywords,
        dimensions,
    })
}

/// Parse 80-character header cards into keyword/value pairs
fn parse_fits_header(data: &[u8]) -> HashMap<String, String> {
    let mut keywords = HashMap::new();

    for chunk in data.chunks(80) {
        let Ok(card) = std::str::from_utf8(chunk) else {
            continue;
        };
        let card = card.trim_end();

        if card.starts_with("END") && card.trim() == "END" {
            break;
        }
        if card.is_empty() || card.starts_with("COMMENT") || card.starts_with("HISTORY") {
            continue;
        }

        // KEYWORD = VALUE / COMMENT
        if let Some(eq_pos) = card.find('=') {
            let keyword = card[..eq_pos].trim();
            let value_part = card[eq_pos + 1..].trim();

            let value = if let Some(quoted) = value_part.strip_prefix('\'') {
                // Strings may contain '/'; cut at the closing quote instead
                quoted.split('\'').next().unwrap_or("").trim().to_string()
            } else {
                value_part
                    .split('/')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };

            if !keyword.is_empty() {
                keywords.insert(keyword.to_string(), value);
            }
        }
    }

    keywords
}

/// Format FITS metadata for display
pub fn format_fits_metadata(metadata: &FitsMetadata, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("FITS File: {}\n", metadata.filename));
    if !metadata.dimensions.is_empty() {
        output.push_str(&format!("  Shape (NAXISn): {:?}\n", metadata.dimensions));
    }

    output.push_str("\nKey Metadata:\n");
    for (label, keys) in [
        ("Object", &["OBJECT", "OBJNAME"][..]),
        ("Telescope", &["TELESCOP"][..]),
        ("Instrument", &["INSTRUME"][..]),
        ("Units", &["BUNIT"][..]),
        ("Date", &["DATE-OBS"][..]),
    ] {
        if let Some(value) = keys.iter().find_map(|k| metadata.keywords.get(*k)) {
            output.push_str(&format!("  {}: {}\n", label, value));
        }
    }

    if let (Some(ra), Some(dec)) = (metadata.float("CRVAL1"), metadata.float("CRVAL2")) {
        output.push_str(&format!("  Reference RA/Dec: {:.6} / {:.6}\n", ra, dec));
    }
    if let Some(cdelt) = metadata.float("CDELT2").or_else(|| metadata.float("CD2_2")) {
        output.push_str(&format!("  Pixel scale: {:.3} arcsec\n", cdelt.abs() * 3600.0));
    }
    if let (Some(bmaj), Some(bmin)) = (metadata.float("BMAJ"), metadata.float("BMIN")) {
        output.push_str(&format!(
            "  Beam: {:.2}\" x {:.2}\" PA {:.1}\n",
            bmaj * 3600.0,
            bmin * 3600.0,
            metadata.float("BPA").unwrap_or(0.0)
        ));
    }

    if verbose {
        output.push_str("\nAll Keywords:\n");
        let mut sorted_keys: Vec<_> = metadata.keywords.iter().collect();
        sorted_keys.sort_by_key(|&(k, _)| k);
        for (key, value) in sorted_keys {
            output.push_str(&format!("  {:<16} = {}\n", key, value));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> Vec<u8> {
        format!("{:<80}", text).into_bytes()
    }

    fn header(cards: &[&str]) -> Vec<u8> {
        let mut data: Vec<u8> = cards.iter().flat_map(|c| card(c)).collect();
        data.extend(card("END"));
        data.resize(2880, b' ');
        data
    }

    fn test_wcs() -> Wcs {
        Wcs::north_up((150.0, 2.0), (1.0, 1.0), 1.0 / 3600.0).unwrap()
    }

    #[test]
    fn test_parse_header_cards() {
        let data = header(&[
            "SIMPLE  =                    T",
            "NAXIS   =                    2 / number of axes",
            "OBJECT  = 'ILTJ1000+0200/a'    / quoted slash",
            "BMAJ    =   0.0016666666666667",
            "HISTORY created by a pipeline",
        ]);
        let keywords = parse_fits_header(&data);
        assert_eq!(keywords.get("NAXIS").map(String::as_str), Some("2"));
        assert_eq!(
            keywords.get("OBJECT").map(String::as_str),
            Some("ILTJ1000+0200/a")
        );
        assert!(keywords.contains_key("BMAJ"));
        assert!(!keywords.contains_key("HISTORY"));
    }

    #[test]
    fn test_format_metadata_reports_beam() {
        let mut keywords = HashMap::new();
        keywords.insert("BMAJ".to_string(), "0.001666667".to_string());
        keywords.insert("BMIN".to_string(), "0.001666667".to_string());
        keywords.insert("BPA".to_string(), "90.0".to_string());
        keywords.insert("OBJECT".to_string(), "P10Hetdex".to_string());
        let metadata = FitsMetadata {
            filename: "mosaic.fits".to_string(),
            keywords,
            dimensions: vec![200, 200],
        };
        let text = format_fits_metadata(&metadata, false);
        assert!(text.contains("Object: P10Hetdex"));
        assert!(text.contains("Beam: 6.00\" x 6.00\" PA 90.0"));
        assert!(!text.contains("All Keywords"));
    }

    #[test]
    fn test_from_cube_checks_size() {
        assert!(SkyImage::from_cube(3, 4, 4, vec![0.0; 47], test_wcs()).is_err());
        let image = SkyImage::from_cube(3, 4, 4, vec![0.0; 48], test_wcs()).unwrap();
        assert!(image.is_cube());
        assert_eq!(image.plane(2).unwrap().len(), 16);
        assert!(image.plane(3).is_err());
    }

    #[test]
    fn test_scaled_float_data_is_physical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaled.fits");
        let mut hdu = Hdu::new(&[2, 2], vec![1.0f32, 2.0, f32::NAN, 4.0]);
        hdu.insert("CRPIX1", 1.5);
        hdu.insert("CRPIX2", 1.5);
        hdu.insert("CRVAL1", 150.0);
        hdu.insert("CRVAL2", 2.0);
        hdu.insert("CDELT1", -0.001);
        hdu.insert("CDELT2", 0.001);
        hdu.insert("BSCALE", 2.0);
        hdu.insert("BZERO", 100.0);
        Fits::create(&path, hdu).unwrap();

        let image = SkyImage::from_file(&path).unwrap();
        assert_eq!(image.data[0], 102.0);
        assert_eq!(image.data[1], 104.0);
        assert!(image.data[2].is_nan());
        assert_eq!(image.data[3], 108.0);
    }

    #[test]
    fn test_nan_max_ignores_blanks() {
        let image =
            SkyImage::from_plane(2, 2, vec![f64::NAN, 1.0, 7.5, -3.0], test_wcs()).unwrap();
        assert_eq!(image.nan_max(), 7.5);

        let blank = SkyImage::from_plane(1, 1, vec![f64::NAN], test_wcs()).unwrap();
        assert!(blank.nan_max().is_nan());
    }
}
