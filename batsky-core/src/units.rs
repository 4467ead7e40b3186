//! Physical units for sky-image axes and contents.
//!
//! The instrument emits a narrow, closed set of quantities, so units are an
//! enum rather than a general unit system. Spellings follow the FITS header
//! conventions used by the ground software (`BUNIT`, `TUNITn`).

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Physical unit of an axis or of image contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Unit {
    /// No physical unit (partial-coding fractions, significance maps).
    Dimensionless,
    /// Seconds (mission elapsed time, exposure).
    Second,
    /// Kiloelectronvolts (energy bin boundaries).
    Kiloelectronvolt,
    /// Detector counts.
    Count,
    /// Detector count rate.
    CountPerSecond,
}

impl Unit {
    /// True for units that can tag a TIME axis.
    #[must_use]
    pub fn is_time(self) -> bool {
        self == Unit::Second
    }

    /// True for units that can tag an ENERGY axis.
    #[must_use]
    pub fn is_energy(self) -> bool {
        self == Unit::Kiloelectronvolt
    }

    /// The FITS header spelling of this unit.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Dimensionless => "",
            Unit::Second => "s",
            Unit::Kiloelectronvolt => "keV",
            Unit::Count => "count",
            Unit::CountPerSecond => "count/s",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Unit::Dimensionless),
            "s" | "sec" => Ok(Unit::Second),
            "kev" => Ok(Unit::Kiloelectronvolt),
            "count" | "counts" => Ok(Unit::Count),
            "count/s" | "counts/s" => Ok(Unit::CountPerSecond),
            _ => Err(Error::UnknownUnit(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_spellings() {
        for unit in [
            Unit::Dimensionless,
            Unit::Second,
            Unit::Kiloelectronvolt,
            Unit::Count,
            Unit::CountPerSecond,
        ] {
            assert_eq!(unit.as_str().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_header_spellings() {
        assert_eq!("keV".parse::<Unit>().unwrap(), Unit::Kiloelectronvolt);
        assert_eq!("KEV".parse::<Unit>().unwrap(), Unit::Kiloelectronvolt);
        assert_eq!("counts/s".parse::<Unit>().unwrap(), Unit::CountPerSecond);
        assert_eq!("NONE".parse::<Unit>().unwrap(), Unit::Dimensionless);
    }

    #[test]
    fn test_unknown_unit_is_fatal() {
        assert!(matches!(
            "furlong".parse::<Unit>(),
            Err(Error::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_physical_type_predicates() {
        assert!(Unit::Second.is_time());
        assert!(!Unit::Second.is_energy());
        assert!(Unit::Kiloelectronvolt.is_energy());
        assert!(!Unit::Count.is_time());
    }
}
