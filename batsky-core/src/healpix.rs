//! HEALPix spatial axis support.
//!
//! Sky images can carry a HEALPix pixelization (RING ordering) as an
//! alternative spatial axis to the rectangular tangent-plane grid.

use crate::error::{Error, Result};
use scorus::coordinates::SphCoord;
use scorus::healpix::pix::pix2ang_ring;
use scorus::healpix::utils::nside2npix;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Celestial coordinate frame of a HEALPix pixelization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordFrame {
    /// Equatorial J2000.
    Icrs,
    /// Galactic.
    Galactic,
}

impl fmt::Display for CoordFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordFrame::Icrs => f.write_str("icrs"),
            CoordFrame::Galactic => f.write_str("galactic"),
        }
    }
}

impl FromStr for CoordFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "icrs" => Ok(CoordFrame::Icrs),
            "galactic" => Ok(CoordFrame::Galactic),
            _ => Err(Error::UnknownFrame(s.to_string())),
        }
    }
}

/// A HEALPix pixelization: resolution parameter plus coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HealpixAxis {
    nside: usize,
    frame: CoordFrame,
}

impl HealpixAxis {
    /// Creates a pixelization description.
    ///
    /// # Errors
    /// Fails unless `nside` is a nonzero power of two.
    pub fn new(nside: usize, frame: CoordFrame) -> Result<Self> {
        if nside == 0 || !nside.is_power_of_two() {
            return Err(Error::InvalidNside(nside));
        }
        Ok(Self { nside, frame })
    }

    /// The resolution parameter.
    #[must_use]
    pub fn nside(&self) -> usize {
        self.nside
    }

    /// The coordinate frame of the pixel centres.
    #[must_use]
    pub fn frame(&self) -> CoordFrame {
        self.frame
    }

    /// Number of pixels on the sphere (`12 * nside^2`).
    #[must_use]
    pub fn npix(&self) -> usize {
        nside2npix(self.nside)
    }

    /// Centre direction of pixel `ipix` as (longitude, latitude) in degrees,
    /// expressed in this pixelization's frame. RING ordering.
    #[must_use]
    pub fn pixel_direction(&self, ipix: usize) -> (f64, f64) {
        let dir: SphCoord<f64> = pix2ang_ring(self.nside, ipix);
        (dir.az.to_degrees(), 90.0 - dir.pol.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_parsing() {
        assert_eq!("galactic".parse::<CoordFrame>().unwrap(), CoordFrame::Galactic);
        assert_eq!("ICRS".parse::<CoordFrame>().unwrap(), CoordFrame::Icrs);
        assert!(matches!(
            "supergalactic".parse::<CoordFrame>(),
            Err(Error::UnknownFrame(_))
        ));
    }

    #[test]
    fn test_npix() {
        let axis = HealpixAxis::new(8, CoordFrame::Galactic).unwrap();
        assert_eq!(axis.npix(), 768);
    }

    #[test]
    fn test_rejects_bad_nside() {
        assert!(matches!(
            HealpixAxis::new(0, CoordFrame::Icrs),
            Err(Error::InvalidNside(0))
        ));
        assert!(matches!(
            HealpixAxis::new(12, CoordFrame::Icrs),
            Err(Error::InvalidNside(12))
        ));
    }

    #[test]
    fn test_pixel_directions_cover_both_hemispheres() {
        let axis = HealpixAxis::new(4, CoordFrame::Icrs).unwrap();
        let (_, lat_first) = axis.pixel_direction(0);
        let (_, lat_last) = axis.pixel_direction(axis.npix() - 1);
        assert!(lat_first > 0.0);
        assert!(lat_last < 0.0);
        for p in 0..axis.npix() {
            let (lon, lat) = axis.pixel_direction(p);
            assert!((0.0..360.0).contains(&lon) || (lon - 360.0).abs() < 1e-9);
            assert!((-90.0..=90.0).contains(&lat));
        }
    }
}
