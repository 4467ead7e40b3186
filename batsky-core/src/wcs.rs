//! World coordinate transform for tangent-plane sky images.
//!
//! A gnomonic (TAN) projection described by the standard FITS keywords
//! CRPIX/CRVAL/CDELT. Pixel coordinates on the Rust side are 0-based array
//! indices; the 1-based FITS convention is applied when the keywords are
//! read or written.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gnomonic pixel <-> sky transform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wcs {
    /// Reference pixel (CRPIX1, CRPIX2), 1-based per the FITS convention.
    pub crpix: [f64; 2],
    /// Sky coordinates of the reference pixel (CRVAL1 = RA, CRVAL2 = Dec),
    /// in degrees.
    pub crval: [f64; 2],
    /// Pixel scale (CDELT1, CDELT2) in degrees per pixel.
    pub cdelt: [f64; 2],
}

impl Wcs {
    /// Creates a transform from the FITS keyword values.
    #[must_use]
    pub fn new(crpix: [f64; 2], crval: [f64; 2], cdelt: [f64; 2]) -> Self {
        Self {
            crpix,
            crval,
            cdelt,
        }
    }

    /// Converts a 0-based pixel position to (RA, Dec) in degrees.
    #[must_use]
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - (self.crpix[0] - 1.0);
        let dy = y - (self.crpix[1] - 1.0);

        // Intermediate tangent-plane coordinates, in radians.
        let xi = (self.cdelt[0] * dx).to_radians();
        let eta = (self.cdelt[1] * dy).to_radians();

        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let (sin_dec0, cos_dec0) = dec0.sin_cos();

        let denom = cos_dec0 - eta * sin_dec0;
        let ra = ra0 + xi.atan2(denom);
        let dec = ((sin_dec0 + eta * cos_dec0) / (xi * xi + denom * denom).sqrt()).atan();

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Converts (RA, Dec) in degrees to a 0-based pixel position.
    ///
    /// Returns `None` for directions on or behind the tangent plane's
    /// horizon, which have no gnomonic image.
    #[must_use]
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let (sin_dec0, cos_dec0) = dec0.sin_cos();

        let dra = ra.to_radians() - ra0;
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let cos_c = sin_dec0 * sin_dec + cos_dec0 * cos_dec * dra.cos();
        if cos_c <= 0.0 {
            return None;
        }

        let xi = cos_dec * dra.sin() / cos_c;
        let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * dra.cos()) / cos_c;

        let x = xi.to_degrees() / self.cdelt[0] + (self.crpix[0] - 1.0);
        let y = eta.to_degrees() / self.cdelt[1] + (self.crpix[1] - 1.0);
        Some((x, y))
    }
}

/// J2000 rotations between the equatorial (ICRS) and galactic frames.
pub mod frame {
    /// Equatorial-to-galactic rotation matrix, rows = galactic basis vectors.
    const EQ_TO_GAL: [[f64; 3]; 3] = [
        [-0.054_875_560_4, -0.873_437_090_2, -0.483_835_015_5],
        [0.494_109_427_9, -0.444_829_630_0, 0.746_982_244_5],
        [-0.867_666_149_0, -0.198_076_373_4, 0.455_983_776_2],
    ];

    fn to_xyz(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
    }

    fn to_lonlat(v: [f64; 3]) -> (f64, f64) {
        let lon = v[1].atan2(v[0]).to_degrees().rem_euclid(360.0);
        let lat = v[2].clamp(-1.0, 1.0).asin().to_degrees();
        (lon, lat)
    }

    /// Converts ICRS (RA, Dec) to galactic (l, b), all in degrees.
    #[must_use]
    pub fn icrs_to_galactic(ra: f64, dec: f64) -> (f64, f64) {
        let v = to_xyz(ra, dec);
        to_lonlat([
            EQ_TO_GAL[0][0] * v[0] + EQ_TO_GAL[0][1] * v[1] + EQ_TO_GAL[0][2] * v[2],
            EQ_TO_GAL[1][0] * v[0] + EQ_TO_GAL[1][1] * v[1] + EQ_TO_GAL[1][2] * v[2],
            EQ_TO_GAL[2][0] * v[0] + EQ_TO_GAL[2][1] * v[1] + EQ_TO_GAL[2][2] * v[2],
        ])
    }

    /// Converts galactic (l, b) to ICRS (RA, Dec), all in degrees.
    #[must_use]
    pub fn galactic_to_icrs(l: f64, b: f64) -> (f64, f64) {
        let v = to_xyz(l, b);
        // The rotation is orthogonal, so the inverse is the transpose.
        to_lonlat([
            EQ_TO_GAL[0][0] * v[0] + EQ_TO_GAL[1][0] * v[1] + EQ_TO_GAL[2][0] * v[2],
            EQ_TO_GAL[0][1] * v[0] + EQ_TO_GAL[1][1] * v[1] + EQ_TO_GAL[2][1] * v[2],
            EQ_TO_GAL[0][2] * v[0] + EQ_TO_GAL[1][2] * v[1] + EQ_TO_GAL[2][2] * v[2],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_wcs() -> Wcs {
        // 0.2 deg/pixel grid centred on (RA, Dec) = (244.0, -15.6).
        Wcs::new([101.0, 101.0], [244.0, -15.6], [-0.2, 0.2])
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = test_wcs();
        let (ra, dec) = wcs.pixel_to_sky(100.0, 100.0);
        assert_relative_eq!(ra, 244.0, epsilon = 1e-9);
        assert_relative_eq!(dec, -15.6, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip() {
        let wcs = test_wcs();
        for &(x, y) in &[(0.0, 0.0), (100.0, 100.0), (37.5, 150.25), (180.0, 10.0)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y);
            let (x2, y2) = wcs.sky_to_pixel(ra, dec).unwrap();
            assert_relative_eq!(x, x2, epsilon = 1e-6);
            assert_relative_eq!(y, y2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_antipode_has_no_image() {
        let wcs = test_wcs();
        assert!(wcs.sky_to_pixel(244.0 - 180.0, 15.6).is_none());
    }

    #[test]
    fn test_galactic_round_trip() {
        for &(ra, dec) in &[(0.0, 0.0), (244.0, -15.6), (266.4, -28.9), (10.7, 41.3)] {
            let (l, b) = frame::icrs_to_galactic(ra, dec);
            let (ra2, dec2) = frame::galactic_to_icrs(l, b);
            assert_relative_eq!(ra, ra2, epsilon = 1e-8);
            assert_relative_eq!(dec, dec2, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_north_galactic_pole() {
        let (_, b) = frame::icrs_to_galactic(192.85948, 27.12825);
        assert_relative_eq!(b, 90.0, epsilon = 1e-3);
    }
}
