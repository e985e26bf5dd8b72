use crate::fits::{format_fits_metadata, read_fits_metadata, FitsMetadata};
use anyhow::{bail, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Print header metadata of a FITS file, or of every FITS file under a directory.
pub fn read_fits(path: &Path, all_keywords: bool, format: &str) -> Result<()> {
    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        let mut files = Vec::new();
        find_fits_files(path, &mut files)?;
        files.sort();
        files
    } else {
        bail!(
            "Path does not exist or is not accessible: {}",
            path.display()
        );
    };

    let mut metadata = Vec::with_capacity(files.len());
    let mut error_count = 0;
    for file in &files {
        match read_fits_metadata(file) {
            Ok(m) => metadata.push(m),
            Err(e) => {
                warn!("Skipping {}: {:#}", file.display(), e);
                error_count += 1;
            }
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format.to_lowercase().as_str() {
        "json" => {
            let json = if all_keywords {
                serde_json::to_string_pretty(&metadata)?
            } else {
                let summaries: Vec<_> = metadata.iter().map(summarize).collect();
                serde_json::to_string_pretty(&summaries)?
            };
            writeln!(out, "{}", json)?;
        }
        "csv" => write_csv(&mut out, &metadata, all_keywords)?,
        _ => {
            if path.is_dir() {
                writeln!(out, "Scanning directory: {}", path.display())?;
                writeln!(out, "Found {} FITS files\n", files.len())?;
            }
            for (index, m) in metadata.iter().enumerate() {
                if index > 0 {
                    writeln!(out, "{:-<60}", "")?;
                }
                writeln!(out, "{}", format_fits_metadata(m, all_keywords))?;
            }
            if error_count > 0 {
                writeln!(out, "Errors: {}", error_count)?;
            }
        }
    }

    Ok(())
}

fn find_fits_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_fits_files(&path, files)?;
        } else if is_fits_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_fits_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            ext == "fits" || ext == "fit" || ext == "fts"
        })
        .unwrap_or(false)
}

/// One row per file with the keywords that matter for overlays.
#[derive(Debug, PartialEq, serde::Serialize)]
struct CutoutSummary {
    filename: String,
    shape: String,
    object: Option<String>,
    telescope: Option<String>,
    units: Option<String>,
    crval1: Option<f64>,
    crval2: Option<f64>,
    pixel_scale_arcsec: Option<f64>,
    bmaj_arcsec: Option<f64>,
    bmin_arcsec: Option<f64>,
    bpa: Option<f64>,
}

fn summarize(metadata: &FitsMetadata) -> CutoutSummary {
    let text = |keys: &[&str]| keys.iter().find_map(|k| metadata.keywords.get(*k)).cloned();
    let float = |key: &str| metadata.keywords.get(key).and_then(|v| v.parse::<f64>().ok());
    let arcsec = |key: &str| float(key).map(|v| v * 3600.0);

    CutoutSummary {
        filename: metadata.filename.clone(),
        shape: metadata
            .dimensions
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("x"),
        object: text(&["OBJECT", "OBJNAME"]),
        telescope: text(&["TELESCOP"]),
        units: text(&["BUNIT"]),
        crval1: float("CRVAL1"),
        crval2: float("CRVAL2"),
        pixel_scale_arcsec: float("CDELT2")
            .or_else(|| float("CD2_2"))
            .map(|v| v.abs() * 3600.0),
        bmaj_arcsec: arcsec("BMAJ"),
        bmin_arcsec: arcsec("BMIN"),
        bpa: float("BPA"),
    }
}

fn write_csv<W: Write>(out: W, metadata: &[FitsMetadata], all_keywords: bool) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if all_keywords {
        writer.write_record(["filename", "key", "value"])?;
        for m in metadata {
            let mut keys: Vec<_> = m.keywords.iter().collect();
            keys.sort_by_key(|&(k, _)| k);
            for (key, value) in keys {
                writer.write_record([m.filename.as_str(), key.as_str(), value.as_str()])?;
            }
        }
    } else {
        for m in metadata {
            writer.serialize(summarize(m))?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metadata() -> FitsMetadata {
        let keywords: HashMap<String, String> = [
            ("OBJECT", "ILTJ100000+020000, field"),
            ("CRVAL1", "150.0"),
            ("CRVAL2", "2.0"),
            ("CDELT2", "0.0004166667"),
            ("BMAJ", "0.001666667"),
            ("BMIN", "0.001666667"),
            ("BPA", "90.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        FitsMetadata {
            filename: "mosaic.fits".to_string(),
            keywords,
            dimensions: vec![200, 200, 1, 1],
        }
    }

    #[test]
    fn test_summary_fields() {
        let summary = summarize(&metadata());
        assert_eq!(summary.shape, "200x200x1x1");
        assert_eq!(summary.object.as_deref(), Some("ILTJ100000+020000, field"));
        assert!((summary.pixel_scale_arcsec.unwrap() - 1.5).abs() < 1e-3);
        assert!((summary.bmaj_arcsec.unwrap() - 6.0).abs() < 1e-3);
        assert_eq!(summary.telescope, None);
    }

    #[test]
    fn test_csv_quotes_commas() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[metadata()], false).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("filename,shape,object"));
        assert!(lines.next().unwrap().contains("\"ILTJ100000+020000, field\""));
    }

    #[test]
    fn test_is_fits_file() {
        assert!(is_fits_file(Path::new("a/b/cutout.FITS")));
        assert!(is_fits_file(Path::new("cutout.fts")));
        assert!(!is_fits_file(Path::new("cutout.png")));
    }
}
