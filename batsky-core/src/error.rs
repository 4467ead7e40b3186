//! Error types for batsky-core.

use crate::axes::AxisLabel;
use crate::healpix::CoordFrame;
use crate::units::Unit;
use thiserror::Error;

/// Result type alias for batsky operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for sky-image operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No image contents were supplied at construction.
    #[error("no image data was provided; a sky image needs an array of contents")]
    MissingImageData,

    /// Malformed bin-edge specification.
    #[error("invalid bin edges: {0}")]
    InvalidEdges(String),

    /// A unit string that is not in the instrument vocabulary.
    #[error("unrecognized unit string: {0:?}")]
    UnknownUnit(String),

    /// A coordinate-frame string that is not in the vocabulary.
    #[error("unrecognized coordinate frame {0:?}; expected \"icrs\" or \"galactic\"")]
    UnknownFrame(String),

    /// A quantity carried the wrong physical unit.
    #[error("unit mismatch: expected {expected}, found {found}")]
    UnitMismatch { expected: Unit, found: Unit },

    /// Sky images hold exactly one time bin.
    #[error("a sky image holds exactly one time bin; this binning yields {0}")]
    MultipleTimeBins(usize),

    /// Inconsistent start/stop time specification.
    #[error("invalid time bounds: {0}")]
    TimeBounds(String),

    /// Contents have the wrong number of dimensions.
    #[error(
        "sky image contents must be 4-dimensional (TIME, IMY, IMX, ENERGY) or \
         3-dimensional with a healpix axis (TIME, HPX, ENERGY); got {0} dimensions"
    )]
    Dimensionality(usize),

    /// Contents do not match the shape implied by the axes.
    #[error("image shape {shape:?} does not match the axis shape {expected:?}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: Vec<usize>,
    },

    /// A requested axis label is not present on the histogram.
    #[error("no axis labeled {0}")]
    UnknownAxis(AxisLabel),

    /// Axes are present but not in a layout a sky image accepts.
    #[error("invalid axis layout: {0}")]
    AxisLayout(String),

    /// An axis label appears more than once.
    #[error("duplicate axis label {0}")]
    DuplicateAxis(AxisLabel),

    /// An aggregation request incompatible with the image's declared type.
    #[error("aggregation policy violation: {0}")]
    Policy(String),

    /// A healpix conversion was requested with a grid that differs from the stored one.
    #[error(
        "healpix grid mismatch: stored nside {stored_nside} in {stored_frame}, \
         requested nside {requested_nside} in {requested_frame}"
    )]
    HealpixMismatch {
        stored_nside: usize,
        stored_frame: CoordFrame,
        requested_nside: usize,
        requested_frame: CoordFrame,
    },

    /// A healpix conversion was requested on an image without a WCS.
    #[error("no world coordinate transform is attached to this sky image; healpix conversion is not possible")]
    MissingWcs,

    /// Healpix resolutions must be powers of two.
    #[error("invalid healpix nside {0}: must be a nonzero power of two")]
    InvalidNside(usize),
}
