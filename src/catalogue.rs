//! Source catalogues and position lists read from CSV or JSON tables.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

use crate::config::{Color, MarkerShape};

/// One catalogue source drawn as an ellipse.
///
/// Column names follow the survey catalogues (`RA`, `DEC`, `Maj`, `Min`, `PA`);
/// Maj and Min are semi-axes in catalogue units, PA in degrees east of north.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatalogueEntry {
    #[serde(rename = "RA")]
    pub ra: f64,
    #[serde(rename = "DEC")]
    pub dec: f64,
    #[serde(rename = "Maj")]
    pub maj: f64,
    #[serde(rename = "Min")]
    pub min: f64,
    #[serde(rename = "PA")]
    pub pa: f64,
}

/// A sky position for a marker.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    #[serde(alias = "RA")]
    pub ra: f64,
    #[serde(alias = "DEC", alias = "Dec")]
    pub dec: f64,
}

/// Markers of one shape for a list of positions.
///
/// Without an edge color the markers are filled white; with one they are
/// outlined in that color and left unfilled.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerGroup {
    pub positions: Vec<Position>,
    pub marker: MarkerShape,
    pub edge_color: Option<Color>,
}

impl MarkerGroup {
    pub fn new(positions: Vec<Position>, marker: MarkerShape) -> Self {
        Self {
            positions,
            marker,
            edge_color: None,
        }
    }

    pub fn outlined(mut self, color: Color) -> Self {
        self.edge_color = Some(color);
        self
    }

    /// Face and edge colors as drawn.
    pub fn colors(&self) -> (Option<Color>, Color) {
        match &self.edge_color {
            Some(edge) => (None, edge.clone()),
            None => {
                let white = Color::named("white");
                (Some(white.clone()), white)
            }
        }
    }
}

/// Read a table of records from CSV (header row required) or, for a `.json`
/// extension, a JSON array of objects.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read table: {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON table: {}", path.display()));
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;
    parse_csv(file).with_context(|| format!("Failed to parse CSV table: {}", path.display()))
}

/// Parse CSV records; extra columns are ignored.
pub fn parse_csv<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, record) in csv_reader.deserialize().enumerate() {
        records.push(record.with_context(|| format!("Bad record on data row {}", row + 1))?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_catalogue_csv_with_extra_columns() {
        let csv = "Source_Name,RA,DEC,Total_flux,Maj,Min,PA\n\
                   ILTJ1,188.70,47.20,12.5,6.0,4.0,45.0\n\
                   # a comment line\n\
                   ILTJ2, 188.71 , 47.21 ,3.1,10.0,5.0,120.0\n";
        let entries: Vec<CatalogueEntry> = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].ra, 188.71);
        assert_eq!(entries[1].pa, 120.0);
    }

    #[test]
    fn test_bad_record_reports_row() {
        let csv = "RA,DEC,Maj,Min,PA\n1,2,3,4,5\n1,2,three,4,5\n";
        let err = parse_csv::<CatalogueEntry, _>(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("data row 2"));
    }

    #[test]
    fn test_positions_accept_either_case() {
        let lower: Vec<Position> = parse_csv("ra,dec\n1.5,2.5\n".as_bytes()).unwrap();
        let upper: Vec<Position> = parse_csv("RA,DEC\n1.5,2.5\n".as_bytes()).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_read_json_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"[{{"ra": 10.0, "dec": -5.0}}, {{"RA": 11.0, "DEC": -6.0}}]"#).unwrap();

        let positions: Vec<Position> = read_table(&path).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1], Position { ra: 11.0, dec: -6.0 });
    }

    #[test]
    fn test_marker_group_colors() {
        let filled = MarkerGroup::new(vec![], MarkerShape::Cross);
        let (face, edge) = filled.colors();
        assert_eq!(face.map(|c| c.to_string()).as_deref(), Some("white"));
        assert_eq!(edge.to_string(), "white");

        let outlined = filled.outlined(Color::named("cyan"));
        let (face, edge) = outlined.colors();
        assert!(face.is_none());
        assert_eq!(edge.to_string(), "cyan");
    }
}
