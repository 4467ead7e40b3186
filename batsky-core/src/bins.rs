//! Derived time and energy bookkeeping for a sky image.

use crate::edges::BinEdges;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A contiguous span during which data are valid for analysis, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GoodTimeInterval {
    /// Interval start (mission elapsed time).
    pub start: f64,
    /// Interval stop (mission elapsed time).
    pub stop: f64,
}

impl GoodTimeInterval {
    /// Creates a good time interval.
    ///
    /// # Errors
    /// Fails if `start >= stop`.
    pub fn new(start: f64, stop: f64) -> Result<Self> {
        if start >= stop {
            return Err(Error::TimeBounds(format!(
                "interval start {start} must precede stop {stop}"
            )));
        }
        Ok(Self { start, stop })
    }

    /// Interval midpoint.
    #[must_use]
    pub fn centre(&self) -> f64 {
        0.5 * (self.start + self.stop)
    }

    /// Exposure duration (stop minus start).
    #[must_use]
    pub fn exposure(&self) -> f64 {
        self.stop - self.start
    }
}

/// One row of the per-bin energy table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyBand {
    /// 1-based bin index, matching the ground software's EBOUNDS convention.
    pub index: usize,
    /// Lower bin boundary in keV.
    pub e_min: f64,
    /// Upper bin boundary in keV.
    pub e_max: f64,
}

/// Derives the per-bin energy table from an edge sequence.
#[must_use]
pub fn energy_bands(edges: &BinEdges) -> Vec<EnergyBand> {
    edges
        .edges()
        .windows(2)
        .enumerate()
        .map(|(i, w)| EnergyBand {
            index: i + 1,
            e_min: w[0],
            e_max: w[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use approx::assert_relative_eq;

    #[test]
    fn test_gti_bookkeeping() {
        let gti = GoodTimeInterval::new(100.0, 160.0).unwrap();
        assert_relative_eq!(gti.centre(), 130.0);
        assert_relative_eq!(gti.exposure(), 60.0);
    }

    #[test]
    fn test_gti_rejects_inverted_interval() {
        assert!(GoodTimeInterval::new(160.0, 100.0).is_err());
        assert!(GoodTimeInterval::new(100.0, 100.0).is_err());
    }

    #[test]
    fn test_energy_bands_are_one_based() {
        let edges = BinEdges::new(vec![15.0, 25.0, 50.0], Unit::Kiloelectronvolt).unwrap();
        let bands = energy_bands(&edges);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].index, 1);
        assert_relative_eq!(bands[0].e_min, 15.0);
        assert_relative_eq!(bands[0].e_max, 25.0);
        assert_eq!(bands[1].index, 2);
        assert_relative_eq!(bands[1].e_max, 50.0);
    }
}
