//! Raster drawing helpers on top of imageproc: wide and dashed polylines,
//! filled polygons and marker glyphs.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::config::{LineStyle, MarkerShape};

/// Draw one segment `width` pixels wide with round ends.
pub fn draw_wide_segment(
    img: &mut RgbaImage,
    start: (f64, f64),
    end: (f64, f64),
    width: f64,
    color: Rgba<u8>,
) {
    if !(start.0.is_finite() && start.1.is_finite() && end.0.is_finite() && end.1.is_finite()) {
        return;
    }

    if width <= 1.5 {
        draw_line_segment_mut(
            img,
            (start.0 as f32, start.1 as f32),
            (end.0 as f32, end.1 as f32),
            color,
        );
        return;
    }

    let half = width / 2.0;
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length > 0.5 {
        let (nx, ny) = (-dy / length * half, dx / length * half);
        fill_polygon(
            img,
            &[
                (start.0 + nx, start.1 + ny),
                (end.0 + nx, end.1 + ny),
                (end.0 - nx, end.1 - ny),
                (start.0 - nx, start.1 - ny),
            ],
            color,
        );
    }
    let radius = (half - 0.5).round().max(0.0) as i32;
    for (x, y) in [start, end] {
        draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), radius, color);
    }
}

/// Draw a polyline with a dash pattern scaled by the line width.
pub fn draw_polyline(
    img: &mut RgbaImage,
    points: &[(f64, f64)],
    width: f64,
    style: LineStyle,
    color: Rgba<u8>,
) {
    let pattern: Vec<f64> = style
        .dash_pattern()
        .iter()
        .map(|run| run * width.max(1.0))
        .collect();

    if pattern.is_empty() {
        for pair in points.windows(2) {
            draw_wide_segment(img, pair[0], pair[1], width, color);
        }
        return;
    }

    // Walk the polyline, toggling pen state at each run boundary
    let mut run = 0;
    let mut remaining = pattern[0];
    for pair in points.windows(2) {
        let (mut from, to) = (pair[0], pair[1]);
        let mut length = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
        if !length.is_finite() {
            continue;
        }
        while length > 0.0 {
            let step = remaining.min(length);
            let t = step / length;
            let next = (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
            if run % 2 == 0 {
                draw_wide_segment(img, from, next, width, color);
            }
            remaining -= step;
            length -= step;
            from = next;
            if remaining <= 1e-9 {
                run = (run + 1) % pattern.len();
                remaining = pattern[run];
            }
        }
    }
}

/// Fill a polygon given in floating-point pixel coordinates.
pub fn fill_polygon(img: &mut RgbaImage, points: &[(f64, f64)], color: Rgba<u8>) {
    let mut vertices: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        let p = Point::new(x.round() as i32, y.round() as i32);
        if vertices.last() != Some(&p) {
            vertices.push(p);
        }
    }
    // imageproc rejects polygons whose first and last points coincide
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() >= 3 {
        draw_polygon_mut(img, &vertices, color);
    }
}

/// Points on an ellipse with full axes `width` x `height`, rotated `angle`
/// degrees counter-clockwise on screen (y down), closed.
pub fn ellipse_points(
    center: (f64, f64),
    width: f64,
    height: f64,
    angle: f64,
    samples: usize,
) -> Vec<(f64, f64)> {
    let (a, b) = (width / 2.0, height / 2.0);
    let (sin_t, cos_t) = angle.to_radians().sin_cos();
    (0..=samples)
        .map(|i| {
            let phi = i as f64 / samples as f64 * std::f64::consts::TAU;
            let (u, v) = (a * phi.cos(), b * phi.sin());
            (
                center.0 + u * cos_t - v * sin_t,
                center.1 - (u * sin_t + v * cos_t),
            )
        })
        .collect()
}

/// Closed outline of a marker glyph of overall `extent` pixels, or the two
/// strokes of an open glyph.
fn marker_outline(shape: MarkerShape, center: (f64, f64), extent: f64) -> Vec<Vec<(f64, f64)>> {
    let r = extent / 2.0;
    let (cx, cy) = center;
    let at = |angle_deg: f64, radius: f64| {
        let (s, c) = angle_deg.to_radians().sin_cos();
        (cx + radius * c, cy - radius * s)
    };
    let polygon = |angles: &[f64], radii: &[f64]| {
        let mut pts: Vec<(f64, f64)> = angles
            .iter()
            .zip(radii.iter().cycle())
            .map(|(&a, &rad)| at(a, rad))
            .collect();
        pts.push(pts[0]);
        vec![pts]
    };

    match shape {
        MarkerShape::Plus => vec![vec![(cx - r, cy), (cx + r, cy)], vec![(cx, cy - r), (cx, cy + r)]],
        MarkerShape::Cross => {
            let d = r / std::f64::consts::SQRT_2;
            vec![
                vec![(cx - d, cy - d), (cx + d, cy + d)],
                vec![(cx - d, cy + d), (cx + d, cy - d)],
            ]
        }
        MarkerShape::Circle => vec![ellipse_points(center, extent, extent, 0.0, 48)],
        MarkerShape::Square => polygon(&[45.0, 135.0, 225.0, 315.0], &[r]),
        MarkerShape::Diamond => polygon(&[0.0, 90.0, 180.0, 270.0], &[r]),
        MarkerShape::TriangleUp => polygon(&[90.0, 210.0, 330.0], &[r]),
        MarkerShape::TriangleDown => polygon(&[270.0, 30.0, 150.0], &[r]),
        MarkerShape::Star => {
            let angles: Vec<f64> = (0..10).map(|i| 90.0 + i as f64 * 36.0).collect();
            polygon(&angles[..], &[r, r * 0.4])
        }
    }
}

/// Draw a marker of area `size` (points squared, as matplotlib's `s`).
pub fn draw_marker(
    img: &mut RgbaImage,
    shape: MarkerShape,
    center: (f64, f64),
    size: f64,
    line_width: f64,
    face: Option<Rgba<u8>>,
    edge: Option<Rgba<u8>>,
) {
    let extent = size.max(0.0).sqrt();
    let strokes = marker_outline(shape, center, extent);
    let open = matches!(shape, MarkerShape::Plus | MarkerShape::Cross);

    if let (Some(face), false) = (face, open) {
        for outline in &strokes {
            fill_polygon(img, outline, face);
        }
    }
    // Open glyphs have no face; they take the face color when no edge is set
    let stroke_color = edge.or(if open { face } else { None });
    if let Some(color) = stroke_color {
        for outline in &strokes {
            draw_polyline(img, outline, line_width, LineStyle::Solid, color);
        }
    }
}
