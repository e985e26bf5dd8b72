//! World coordinate system support for FITS images.
//!
//! Implements the TAN (gnomonic) projection used by radio and optical survey
//! cutouts. Pixel coordinates are 0-indexed throughout.

use anyhow::{bail, Result};
use nalgebra::{Matrix2, Vector2};

/// Celestial TAN projection built from FITS header keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel (0-indexed)
    pub crpix: Vector2<f64>,
    /// Sky position of the reference pixel (RA, Dec in degrees)
    pub crval: (f64, f64),
    /// Linear transform from pixel offsets to intermediate world coordinates (degrees)
    pub cd: Matrix2<f64>,
    cd_inverse: Matrix2<f64>,
}

impl Wcs {
    /// Build a projection from its parts. Fails when the CD matrix is singular.
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: Matrix2<f64>) -> Result<Self> {
        let Some(cd_inverse) = cd.try_inverse() else {
            bail!("WCS CD matrix is singular: {:?}", cd);
        };
        if cd.determinant().abs() < 1e-30 {
            bail!("WCS CD matrix is singular: {:?}", cd);
        }
        Ok(Self {
            crpix: Vector2::new(crpix.0, crpix.1),
            crval,
            cd,
            cd_inverse,
        })
    }

    /// North-up, east-left projection with a square pixel scale (degrees per pixel).
    pub fn north_up(center: (f64, f64), reference_pixel: (f64, f64), scale: f64) -> Result<Self> {
        Self::new(
            reference_pixel,
            center,
            Matrix2::new(-scale, 0.0, 0.0, scale),
        )
    }

    /// Create a projection from header keywords.
    ///
    /// Reads CRPIX1/2 and CRVAL1/2 plus, in order of preference, the CD
    /// matrix, CDELT1/2 with a PC matrix, or CDELT1/2 + CROTA2. Returns `Ok(None)` when the celestial
    /// keywords are absent.
    pub fn from_header<F>(mut get_keyword: F) -> Result<Option<Self>>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let (Some(crpix1), Some(crpix2), Some(crval1), Some(crval2)) = (
            get_keyword("CRPIX1"),
            get_keyword("CRPIX2"),
            get_keyword("CRVAL1"),
            get_keyword("CRVAL2"),
        ) else {
            return Ok(None);
        };

        let cd = if let (Some(cd1_1), Some(cd2_2)) = (get_keyword("CD1_1"), get_keyword("CD2_2")) {
            Matrix2::new(
                cd1_1,
                get_keyword("CD1_2").unwrap_or(0.0),
                get_keyword("CD2_1").unwrap_or(0.0),
                cd2_2,
            )
        } else {
            let (Some(cdelt1), Some(cdelt2)) = (get_keyword("CDELT1"), get_keyword("CDELT2")) else {
                bail!("WCS header has CRPIX/CRVAL but neither CD nor CDELT keywords");
            };
            let pc = [
                get_keyword("PC1_1"),
                get_keyword("PC1_2"),
                get_keyword("PC2_1"),
                get_keyword("PC2_2"),
            ];
            if pc.iter().any(Option::is_some) {
                // Missing PC elements take their identity values
                let [pc1_1, pc1_2, pc2_1, pc2_2] = pc;
                return Self::new(
                    (crpix1 - 1.0, crpix2 - 1.0),
                    (crval1, crval2),
                    Matrix2::new(
                        cdelt1 * pc1_1.unwrap_or(1.0),
                        cdelt1 * pc1_2.unwrap_or(0.0),
                        cdelt2 * pc2_1.unwrap_or(0.0),
                        cdelt2 * pc2_2.unwrap_or(1.0),
                    ),
                )
                .map(Some);
            }
            let crota = get_keyword("CROTA2").unwrap_or(0.0).to_radians();
            let (sin_r, cos_r) = crota.sin_cos();
            Matrix2::new(
                cdelt1 * cos_r,
                -cdelt2 * sin_r,
                cdelt1 * sin_r,
                cdelt2 * cos_r,
            )
        };

        Self::new((crpix1 - 1.0, crpix2 - 1.0), (crval1, crval2), cd).map(Some)
    }

    /// Whether a CTYPE value (`RA---TAN`, `DEC--SIN`, ...) names the TAN projection.
    /// Other projections are read as TAN, which is close only near the reference pixel.
    pub fn is_tan_projection(ctype: &str) -> bool {
        ctype.trim().rsplit('-').next() == Some("TAN")
    }

    /// Convert pixel coordinates to sky coordinates (RA, Dec in degrees).
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let offset = Vector2::new(x, y) - self.crpix;
        let intermediate = self.cd * offset;
        let xi = intermediate.x.to_radians();
        let eta = intermediate.y.to_radians();
        let ra0 = self.crval.0.to_radians();
        let dec0 = self.crval.1.to_radians();

        let rho = (xi * xi + eta * eta).sqrt();
        let (ra, dec) = if rho < 1e-12 {
            (self.crval.0, self.crval.1)
        } else {
            let c = rho.atan();
            let (sin_c, cos_c) = c.sin_cos();
            let dec = (cos_c * dec0.sin() + eta * sin_c * dec0.cos() / rho).asin();
            let ra = ra0 + (xi * sin_c).atan2(rho * dec0.cos() * cos_c - eta * dec0.sin() * sin_c);
            (ra.to_degrees(), dec.to_degrees())
        };

        (ra.rem_euclid(360.0), dec)
    }

    /// Convert sky coordinates (RA, Dec in degrees) to pixel coordinates.
    ///
    /// Points on the hemisphere opposite the reference position have no
    /// gnomonic image and map to `(NaN, NaN)`.
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> (f64, f64) {
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.0).to_radians().sin_cos();

        let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if denom <= 0.0 {
            return (f64::NAN, f64::NAN);
        }

        let xi = (cos_dec * sin_dra / denom).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / denom).to_degrees();

        let pixel = self.cd_inverse * Vector2::new(xi, eta) + self.crpix;
        (pixel.x, pixel.y)
    }

    /// Mean pixel scale in degrees per pixel.
    pub fn pixel_scale(&self) -> f64 {
        let column_x = (self.cd[(0, 0)].powi(2) + self.cd[(1, 0)].powi(2)).sqrt();
        let column_y = (self.cd[(0, 1)].powi(2) + self.cd[(1, 1)].powi(2)).sqrt();
        (column_x + column_y) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arcsec_wcs() -> Wcs {
        // 1 arcsec/pixel, RA=180, Dec=45 at pixel (500, 500)
        Wcs::north_up((180.0, 45.0), (500.0, 500.0), 1.0 / 3600.0).unwrap()
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = arcsec_wcs();
        let (ra, dec) = wcs.pixel_to_sky(500.0, 500.0);
        assert_relative_eq!(ra, 180.0, epsilon = 1e-10);
        assert_relative_eq!(dec, 45.0, epsilon = 1e-10);

        let (x, y) = wcs.sky_to_pixel(180.0, 45.0);
        assert_relative_eq!(x, 500.0, epsilon = 1e-9);
        assert_relative_eq!(y, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pixel_sky_inverse() {
        let wcs = arcsec_wcs();
        for (x, y) in [(100.0, 120.0), (731.5, 42.0), (900.0, 900.0)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y);
            let (x2, y2) = wcs.sky_to_pixel(ra, dec);
            assert_relative_eq!(x, x2, epsilon = 1e-6);
            assert_relative_eq!(y, y2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_east_is_left() {
        let wcs = arcsec_wcs();
        let (x, _) = wcs.sky_to_pixel(180.01, 45.0);
        assert!(x < 500.0, "increasing RA should move to lower x, got {}", x);
        let (_, y) = wcs.sky_to_pixel(180.0, 45.01);
        assert!(y > 500.0);
    }

    #[test]
    fn test_far_hemisphere_is_nan() {
        let wcs = arcsec_wcs();
        let (x, y) = wcs.sky_to_pixel(0.0, -45.0);
        assert!(x.is_nan() && y.is_nan());
    }

    #[test]
    fn test_from_header_cd_matrix() {
        let wcs = Wcs::from_header(|key| match key {
            "CRPIX1" => Some(501.0),
            "CRPIX2" => Some(501.0),
            "CRVAL1" => Some(180.0),
            "CRVAL2" => Some(45.0),
            "CD1_1" => Some(-1.0 / 3600.0),
            "CD2_2" => Some(1.0 / 3600.0),
            _ => None,
        })
        .unwrap()
        .expect("celestial keywords present");

        assert_relative_eq!(wcs.crpix.x, 500.0);
        assert_relative_eq!(wcs.pixel_scale() * 3600.0, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_from_header_cdelt_rotation() {
        let wcs = Wcs::from_header(|key| match key {
            "CRPIX1" => Some(1.0),
            "CRPIX2" => Some(1.0),
            "CRVAL1" => Some(10.0),
            "CRVAL2" => Some(0.0),
            "CDELT1" => Some(-0.001),
            "CDELT2" => Some(0.001),
            "CROTA2" => Some(90.0),
            _ => None,
        })
        .unwrap()
        .unwrap();

        assert_relative_eq!(wcs.cd[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(0, 1)], -0.001, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(1, 0)], -0.001, epsilon = 1e-12);
    }

    #[test]
    fn test_from_header_pc_matrix() {
        let wcs = Wcs::from_header(|key| match key {
            "CRPIX1" => Some(1.0),
            "CRPIX2" => Some(1.0),
            "CRVAL1" => Some(10.0),
            "CRVAL2" => Some(0.0),
            "CDELT1" => Some(-0.001),
            "CDELT2" => Some(0.001),
            "PC1_2" => Some(1.0),
            "PC2_1" => Some(-1.0),
            "PC1_1" => Some(0.0),
            "PC2_2" => Some(0.0),
            // Ignored when a PC matrix is present
            "CROTA2" => Some(45.0),
            _ => None,
        })
        .unwrap()
        .unwrap();

        assert_relative_eq!(wcs.cd[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(0, 1)], -0.001, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(1, 0)], -0.001, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(1, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_code() {
        assert!(Wcs::is_tan_projection("RA---TAN"));
        assert!(Wcs::is_tan_projection(" DEC--TAN "));
        assert!(!Wcs::is_tan_projection("RA---SIN"));
        assert!(!Wcs::is_tan_projection("DEC--SIN"));
        assert!(!Wcs::is_tan_projection("FREQ"));
    }

    #[test]
    fn test_from_header_without_celestial_keywords() {
        let wcs = Wcs::from_header(|_| None).unwrap();
        assert!(wcs.is_none());
    }

    #[test]
    fn test_singular_matrix_rejected() {
        assert!(Wcs::new((0.0, 0.0), (0.0, 0.0), Matrix2::zeros()).is_err());
    }
}
