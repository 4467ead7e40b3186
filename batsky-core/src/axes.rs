//! Labeled axes for the binned sky-image histogram.
//!
//! Each axis pairs a label with its binning: edge sequences for TIME and
//! ENERGY, plain pixel counts for the tangent-plane spatial axes, or a
//! HEALPix grid.

use crate::edges::BinEdges;
use crate::error::{Error, Result};
use crate::healpix::HealpixAxis;
use std::fmt;

/// The labels an axis of a sky image can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisLabel {
    /// The single good-time-interval axis.
    Time,
    /// Tangent-plane image rows.
    ImY,
    /// Tangent-plane image columns.
    ImX,
    /// Energy bins.
    Energy,
    /// HEALPix spatial pixels.
    Healpix,
}

impl fmt::Display for AxisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisLabel::Time => "TIME",
            AxisLabel::ImY => "IMY",
            AxisLabel::ImX => "IMX",
            AxisLabel::Energy => "ENERGY",
            AxisLabel::Healpix => "HPX",
        };
        f.write_str(name)
    }
}

/// How an axis is binned.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisBinning {
    /// Physical bin boundaries (TIME, ENERGY).
    Edges(BinEdges),
    /// Integer pixel index bins (IMY, IMX).
    Pixels(usize),
    /// A HEALPix pixelization (HPX).
    Grid(HealpixAxis),
}

impl AxisBinning {
    /// Number of bins along the axis.
    #[must_use]
    pub fn nbins(&self) -> usize {
        match self {
            AxisBinning::Edges(edges) => edges.nbins(),
            AxisBinning::Pixels(n) => *n,
            AxisBinning::Grid(axis) => axis.npix(),
        }
    }
}

/// One labeled axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// The axis label.
    pub label: AxisLabel,
    /// The axis binning.
    pub binning: AxisBinning,
}

impl Axis {
    /// Creates a labeled axis.
    #[must_use]
    pub fn new(label: AxisLabel, binning: AxisBinning) -> Self {
        Self { label, binning }
    }

    /// Number of bins along the axis.
    #[must_use]
    pub fn nbins(&self) -> usize {
        self.binning.nbins()
    }
}

/// An ordered list of labeled axes with unique labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    axes: Vec<Axis>,
}

impl Axes {
    /// Creates an axis list, rejecting duplicate labels.
    ///
    /// # Errors
    /// Fails if any label appears more than once.
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|a| a.label == axis.label) {
                return Err(Error::DuplicateAxis(axis.label));
            }
        }
        Ok(Self { axes })
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// The bin counts along each axis, in order.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::nbins).collect()
    }

    /// Position of the axis with the given label.
    ///
    /// # Errors
    /// Fails if no axis carries the label.
    pub fn index_of(&self, label: AxisLabel) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.label == label)
            .ok_or(Error::UnknownAxis(label))
    }

    /// The axis with the given label, if present.
    #[must_use]
    pub fn get(&self, label: AxisLabel) -> Option<&Axis> {
        self.axes.iter().find(|a| a.label == label)
    }

    /// Whether an axis with the given label is present.
    #[must_use]
    pub fn contains(&self, label: AxisLabel) -> bool {
        self.get(label).is_some()
    }

    /// Iterates over the axes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Axis> {
        self.axes.iter()
    }
}
