//! The labeled multi-dimensional histogram backing a sky image.
//!
//! This is the policy-free primitive: collapsing axes always sums linearly.
//! Image-type-aware aggregation (quadrature, last-slice selection) is layered
//! on top by [`crate::image::SkyImage`].

use crate::axes::{Axes, AxisLabel};
use crate::error::{Error, Result};
use crate::units::Unit;
use ndarray::{ArrayD, Axis as NdAxis};

/// An N-dimensional array of binned contents with labeled axes and a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub(crate) axes: Axes,
    pub(crate) contents: ArrayD<f64>,
    pub(crate) unit: Unit,
}

impl Histogram {
    /// Creates a histogram, checking contents against the axis shape.
    ///
    /// # Errors
    /// Fails if the contents' shape differs from the axes' bin counts.
    pub fn new(axes: Axes, contents: ArrayD<f64>, unit: Unit) -> Result<Self> {
        let expected = axes.shape();
        if contents.shape() != expected.as_slice() {
            return Err(Error::ShapeMismatch {
                shape: contents.shape().to_vec(),
                expected,
            });
        }
        Ok(Self {
            axes,
            contents,
            unit,
        })
    }

    /// The labeled axes.
    #[must_use]
    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// The binned contents.
    #[must_use]
    pub fn contents(&self) -> &ArrayD<f64> {
        &self.contents
    }

    /// The physical unit of the contents.
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Collapses every axis not listed in `keep` by linear summation.
    ///
    /// The kept axes appear in the result in the order requested. An empty
    /// `keep` collapses the histogram to a zero-dimensional total.
    ///
    /// # Errors
    /// Fails on labels not present on this histogram or listed twice.
    pub fn project(&self, keep: &[AxisLabel]) -> Result<Histogram> {
        for (i, label) in keep.iter().enumerate() {
            if keep[..i].contains(label) {
                return Err(Error::DuplicateAxis(*label));
            }
        }
        let keep_positions = keep
            .iter()
            .map(|&label| self.axes.index_of(label))
            .collect::<Result<Vec<_>>>()?;

        // Sum away collapsed axes from the highest index down so the indices
        // of the axes still to visit stay valid.
        let mut contents = self.contents.clone();
        for axis in (0..self.axes.ndim()).rev() {
            if !keep_positions.contains(&axis) {
                contents = contents.sum_axis(NdAxis(axis));
            }
        }

        // The survivors sit in original order; permute into requested order.
        let perm: Vec<usize> = keep_positions
            .iter()
            .map(|&p| keep_positions.iter().filter(|&&q| q < p).count())
            .collect();
        let contents = contents.permuted_axes(perm);

        let axes = Axes::new(
            keep.iter()
                .filter_map(|&label| self.axes.get(label).cloned())
                .collect(),
        )?;
        Histogram::new(axes, contents, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axes::{Axis, AxisBinning};
    use crate::edges::BinEdges;
    use approx::assert_relative_eq;
    use ndarray::Array4;

    fn small_hist() -> Histogram {
        let axes = Axes::new(vec![
            Axis::new(
                AxisLabel::Time,
                AxisBinning::Edges(BinEdges::pair(0.0, 10.0, Unit::Second).unwrap()),
            ),
            Axis::new(AxisLabel::ImY, AxisBinning::Pixels(2)),
            Axis::new(AxisLabel::ImX, AxisBinning::Pixels(2)),
            Axis::new(
                AxisLabel::Energy,
                AxisBinning::Edges(
                    BinEdges::new(vec![15.0, 50.0, 150.0], Unit::Kiloelectronvolt).unwrap(),
                ),
            ),
        ])
        .unwrap();
        let mut contents = Array4::<f64>::zeros((1, 2, 2, 2));
        contents[[0, 0, 0, 0]] = 1.0;
        contents[[0, 0, 0, 1]] = 2.0;
        contents[[0, 1, 1, 0]] = 3.0;
        contents[[0, 1, 1, 1]] = 4.0;
        Histogram::new(axes, contents.into_dyn(), Unit::Count).unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let axes = Axes::new(vec![Axis::new(AxisLabel::ImY, AxisBinning::Pixels(3))]).unwrap();
        let contents = ndarray::Array1::<f64>::zeros(4).into_dyn();
        assert!(matches!(
            Histogram::new(axes, contents, Unit::Count),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_project_sums_collapsed_axes() {
        let hist = small_hist();
        let spatial = hist.project(&[AxisLabel::ImY, AxisLabel::ImX]).unwrap();
        assert_eq!(spatial.contents().shape(), &[2, 2]);
        assert_relative_eq!(spatial.contents()[[0, 0]], 3.0);
        assert_relative_eq!(spatial.contents()[[1, 1]], 7.0);
        assert_relative_eq!(spatial.contents()[[0, 1]], 0.0);
    }

    #[test]
    fn test_project_honours_requested_order() {
        let hist = small_hist();
        let yx = hist.project(&[AxisLabel::ImY, AxisLabel::ImX]).unwrap();
        let xy = hist.project(&[AxisLabel::ImX, AxisLabel::ImY]).unwrap();
        assert_relative_eq!(yx.contents()[[0, 1]], xy.contents()[[1, 0]]);
        assert_eq!(xy.axes().index_of(AxisLabel::ImX).unwrap(), 0);
    }

    #[test]
    fn test_project_to_total() {
        let hist = small_hist();
        let total = hist.project(&[]).unwrap();
        assert_eq!(total.contents().ndim(), 0);
        assert_relative_eq!(total.contents().sum(), 10.0);
    }

    #[test]
    fn test_project_unknown_axis() {
        let hist = small_hist();
        assert!(matches!(
            hist.project(&[AxisLabel::Healpix]),
            Err(Error::UnknownAxis(AxisLabel::Healpix))
        ));
    }

    #[test]
    fn test_project_duplicate_axis() {
        let hist = small_hist();
        assert!(matches!(
            hist.project(&[AxisLabel::ImY, AxisLabel::ImY]),
            Err(Error::DuplicateAxis(AxisLabel::ImY))
        ));
    }
}
