//! batsky-core: Core types for Swift/BAT sky-image data products.
//!
//! This crate provides the binned-axis model, the labeled multi-dimensional
//! histogram, and the sky-image container with its type-aware aggregation
//! policy, world-coordinate transform, and HEALPix projection support.
//!

pub mod axes;
pub mod bins;
pub mod edges;
pub mod error;
pub mod healpix;
pub mod histogram;
pub mod image;
pub mod units;
pub mod wcs;

pub use axes::{Axes, Axis, AxisBinning, AxisLabel};
pub use bins::{energy_bands, EnergyBand, GoodTimeInterval};
pub use edges::{BinEdges, ReconciledEdges};
pub use error::{Error, Result};
pub use healpix::{CoordFrame, HealpixAxis};
pub use histogram::Histogram;
pub use image::{EnergyReduction, ImageType, SkyImage, SkyImageBuilder};
pub use units::Unit;
pub use wcs::Wcs;
