//! Bin-edge sequences and reconciliation of heterogeneous bin sets.
//!
//! A [`BinEdges`] is an ordered, strictly increasing boundary sequence tagged
//! with a physical unit. Two half-open interval sets that overlap, touch, or
//! leave gaps can be merged with [`BinEdges::from_bounds`], which also reports
//! where each original interval lands in the merged edge array so existing
//! bin contents can be redistributed.

use crate::error::{Error, Result};
use crate::units::Unit;

/// An ordered, strictly increasing sequence of bin boundaries with a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    edges: Vec<f64>,
    unit: Unit,
}

/// The outcome of merging interval bounds into a single edge sequence.
///
/// `placement[i]` is the bin index in `edges` at which the i-th original
/// interval starts; when the inputs were not contiguous, callers use it to
/// scatter existing contents into an enlarged zero-filled array.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledEdges {
    /// The merged edge sequence.
    pub edges: BinEdges,
    /// Destination bin index of each original interval.
    pub placement: Vec<usize>,
    /// Whether the inputs were already contiguous (`lo[1..] == hi[..n-1]`).
    pub contiguous: bool,
}

impl BinEdges {
    /// Creates a validated edge sequence.
    ///
    /// # Errors
    /// Fails unless there are at least two finite, strictly increasing edges.
    pub fn new(edges: Vec<f64>, unit: Unit) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidEdges(format!(
                "need at least 2 edges to define a bin, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::InvalidEdges("edges must be finite".to_string()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidEdges(format!(
                "edges must be strictly increasing, got {edges:?}"
            )));
        }
        Ok(Self { edges, unit })
    }

    /// Creates a single-bin edge sequence from one boundary pair.
    ///
    /// # Errors
    /// Fails if `lo >= hi` or either bound is not finite.
    pub fn pair(lo: f64, hi: f64, unit: Unit) -> Result<Self> {
        Self::new(vec![lo, hi], unit)
    }

    /// Merges half-open interval bounds into one edge sequence.
    ///
    /// Every `lo[i]` and `hi[i]` value appears as a boundary of the result.
    /// Contiguous inputs take a direct-concatenation fast path; otherwise the
    /// sorted union of unique boundaries is built and `placement` records
    /// where each original interval's contents belong. A single scalar bin is
    /// the one-element-slice case.
    ///
    /// # Errors
    /// Fails on empty or length-mismatched bounds, or any `lo[i] >= hi[i]`.
    pub fn from_bounds(lo: &[f64], hi: &[f64], unit: Unit) -> Result<ReconciledEdges> {
        if lo.is_empty() || lo.len() != hi.len() {
            return Err(Error::InvalidEdges(format!(
                "interval bounds must have equal nonzero lengths, got {} and {}",
                lo.len(),
                hi.len()
            )));
        }
        for (&l, &h) in lo.iter().zip(hi) {
            if !l.is_finite() || !h.is_finite() || l >= h {
                return Err(Error::InvalidEdges(format!(
                    "each interval needs finite bounds with lo < hi, got [{l}, {h})"
                )));
            }
        }

        let n = lo.len();
        let contiguous = lo[1..] == hi[..n - 1];
        if contiguous {
            // Direct concatenation of the unique boundaries.
            let mut edges = lo.to_vec();
            edges.push(hi[n - 1]);
            return Ok(ReconciledEdges {
                edges: BinEdges::new(edges, unit)?,
                placement: (0..n).collect(),
                contiguous,
            });
        }

        let mut edges: Vec<f64> = lo.iter().chain(hi.iter()).copied().collect();
        edges.sort_by(|a, b| a.total_cmp(b));
        edges.dedup();

        // Insertion point of each interval start among all but the final edge.
        let interior = &edges[..edges.len() - 1];
        let placement = lo
            .iter()
            .map(|&l| interior.partition_point(|&e| e < l))
            .collect();

        Ok(ReconciledEdges {
            edges: BinEdges::new(edges, unit)?,
            placement,
            contiguous,
        })
    }

    /// Merges this edge sequence with another into their sorted union.
    ///
    /// Reconciling an edge set with itself yields the same edge set.
    ///
    /// # Errors
    /// Fails if the units differ.
    pub fn reconcile(&self, other: &BinEdges) -> Result<BinEdges> {
        if self.unit != other.unit {
            return Err(Error::UnitMismatch {
                expected: self.unit,
                found: other.unit,
            });
        }
        let mut edges: Vec<f64> = self
            .edges
            .iter()
            .chain(other.edges.iter())
            .copied()
            .collect();
        edges.sort_by(|a, b| a.total_cmp(b));
        edges.dedup();
        BinEdges::new(edges, self.unit)
    }

    /// Number of bins (one fewer than the number of edges).
    #[must_use]
    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The boundary values.
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// The physical unit of the boundaries.
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// The lowest boundary.
    #[must_use]
    pub fn lo_lim(&self) -> f64 {
        self.edges[0]
    }

    /// The highest boundary.
    #[must_use]
    pub fn hi_lim(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin centres.
    #[must_use]
    pub fn centres(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Bin widths.
    #[must_use]
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Index of the bin containing `value`, with the final edge inclusive.
    #[must_use]
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        if value < self.lo_lim() || value > self.hi_lim() {
            return None;
        }
        let idx = self.edges.partition_point(|&e| e <= value);
        Some(idx.saturating_sub(1).min(self.nbins() - 1))
    }
}
