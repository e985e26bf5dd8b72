//! Contour lines (marching squares) over a pixel plane.
//!
//! Segments are produced in pixel coordinates of the input plane. Cells with
//! a NaN corner are skipped so blanked map edges produce no spurious lines.

/// A straight piece of an isoline, endpoints in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

/// Isoline segments of one level.
#[derive(Debug, Clone, PartialEq)]
pub struct Isoline {
    pub level: f64,
    pub segments: Vec<Segment>,
}

/// Trace every level over a `width x height` plane stored row-major.
pub fn trace_levels(plane: &[f64], width: usize, height: usize, levels: &[f64]) -> Vec<Isoline> {
    levels
        .iter()
        .map(|&level| Isoline {
            level,
            segments: trace_level(plane, width, height, level),
        })
        .collect()
}

/// Marching squares for a single level.
pub fn trace_level(plane: &[f64], width: usize, height: usize, level: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    if width < 2 || height < 2 || level.is_nan() || plane.len() < width * height {
        return segments;
    }

    for y in 0..height - 1 {
        for x in 0..width - 1 {
            // Corners counter-clockwise from bottom-left
            let v0 = plane[y * width + x];
            let v1 = plane[y * width + x + 1];
            let v2 = plane[(y + 1) * width + x + 1];
            let v3 = plane[(y + 1) * width + x];
            if v0.is_nan() || v1.is_nan() || v2.is_nan() || v3.is_nan() {
                continue;
            }

            let case = (v0 >= level) as u8
                | ((v1 >= level) as u8) << 1
                | ((v2 >= level) as u8) << 2
                | ((v3 >= level) as u8) << 3;
            if case == 0 || case == 15 {
                continue;
            }

            let (fx, fy) = (x as f64, y as f64);
            let bottom = || (fx + crossing(v0, v1, level), fy);
            let right = || (fx + 1.0, fy + crossing(v1, v2, level));
            let top = || (fx + crossing(v3, v2, level), fy + 1.0);
            let left = || (fx, fy + crossing(v0, v3, level));

            let mut push = |start: (f64, f64), end: (f64, f64)| {
                segments.push(Segment { start, end });
            };

            match case {
                1 | 14 => push(left(), bottom()),
                2 | 13 => push(bottom(), right()),
                3 | 12 => push(left(), right()),
                4 | 11 => push(right(), top()),
                6 | 9 => push(bottom(), top()),
                7 | 8 => push(left(), top()),
                5 | 10 => {
                    // Saddle: resolve with the cell-centre average
                    let centre = (v0 + v1 + v2 + v3) / 4.0;
                    let centre_high = centre >= level;
                    if (case == 5) == centre_high {
                        push(left(), top());
                        push(bottom(), right());
                    } else {
                        push(left(), bottom());
                        push(right(), top());
                    }
                }
                _ => {}
            }
        }
    }

    segments
}

/// Fractional position of `level` between two corner values.
fn crossing(a: f64, b: f64, level: f64) -> f64 {
    let delta = b - a;
    if delta.abs() < f64::EPSILON {
        0.5
    } else {
        ((level - a) / delta).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn radial(size: usize) -> Vec<f64> {
        let c = (size - 1) as f64 / 2.0;
        (0..size * size)
            .map(|i| {
                let x = (i % size) as f64 - c;
                let y = (i / size) as f64 - c;
                10.0 - (x * x + y * y).sqrt()
            })
            .collect()
    }

    #[test]
    fn test_flat_plane_has_no_contours() {
        let plane = vec![1.0; 25];
        assert!(trace_level(&plane, 5, 5, 0.5).is_empty());
        assert!(trace_level(&plane, 5, 5, 1.5).is_empty());
    }

    #[test]
    fn test_vertical_edge_crossing() {
        // Values increase along x: 0, 1, 2
        let plane = vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        let segments = trace_level(&plane, 3, 2, 1.5);
        assert_eq!(segments.len(), 1);
        let segment = segments[0];
        assert_relative_eq!(segment.start.0, 1.5);
        assert_relative_eq!(segment.end.0, 1.5);
    }

    #[test]
    fn test_circle_radius() {
        let plane = radial(41);
        let segments = trace_level(&plane, 41, 41, 5.0);
        assert!(!segments.is_empty());
        for segment in &segments {
            for (x, y) in [segment.start, segment.end] {
                let r = ((x - 20.0).powi(2) + (y - 20.0).powi(2)).sqrt();
                assert!((r - 5.0).abs() < 0.1, "point ({}, {}) at radius {}", x, y, r);
            }
        }
    }

    #[test]
    fn test_nan_cells_skipped() {
        let mut plane = vec![0.0, 2.0, 0.0, 2.0];
        assert_eq!(trace_level(&plane, 2, 2, 1.0).len(), 1);
        plane[0] = f64::NAN;
        assert!(trace_level(&plane, 2, 2, 1.0).is_empty());
    }

    #[test]
    fn test_trace_levels_keeps_order() {
        let plane = radial(21);
        let isolines = trace_levels(&plane, 21, 21, &[2.0, 4.0, 50.0]);
        assert_eq!(isolines.len(), 3);
        assert_eq!(isolines[1].level, 4.0);
        assert!(isolines[2].segments.is_empty());
        // Lower level encloses a larger circle
        assert!(isolines[0].segments.len() > isolines[1].segments.len());
    }

    #[test]
    fn test_degenerate_planes() {
        assert!(trace_level(&[1.0, 2.0], 2, 1, 1.5).is_empty());
        assert!(trace_level(&[], 0, 0, 1.0).is_empty());
    }
}
