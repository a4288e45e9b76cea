//! Fixed-width transverse-momentum binning.
//!
//! Edges start at `floor(min(pt))` of the deriving dataset and advance by a
//! fixed step until the upper bound is covered. Bins are half-open
//! `[lo, hi)`. The same edges are reused for every dataset evaluated against
//! a working point; they are never recomputed per dataset.

use crate::error::{WpError, WpResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PT_STEP: f64 = 0.2;
pub const DEFAULT_PT_UPPER: f64 = 10.0;

/// Slack for floating-point edge counting, in units of `step`.
const EDGE_EPSILON: f64 = 1e-9;

/// Upper limit on the number of bins one binning may hold.
pub const MAX_PT_BINS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtBinning {
    edges: Vec<f64>,
}

impl PtBinning {
    /// Build edges `lo, lo + step, ...` where `lo = floor(min(pt))`.
    ///
    /// The last edge is the first grid point at or above `upper`. Non-finite
    /// pT values are ignored when taking the minimum. When `lo >= upper` the
    /// binning has a single edge and no bins. A non-finite `upper`, or a grid
    /// of more than [`MAX_PT_BINS`] bins, is an `InvalidRange` error.
    pub fn from_pt(pt: &[f64], step: f64, upper: f64) -> WpResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(WpError::InvalidStep { step });
        }
        if !upper.is_finite() {
            return Err(WpError::InvalidRange {
                what: format!("pT upper bound must be finite, got {upper}"),
            });
        }
        if pt.is_empty() {
            return Err(WpError::EmptyInput {
                what: "pT array has zero length".into(),
            });
        }
        let min = pt
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, f64::min);
        if !min.is_finite() {
            return Err(WpError::EmptyInput {
                what: "pT array has no finite values".into(),
            });
        }

        let lo = min.floor();
        if lo >= upper {
            return Ok(Self { edges: vec![lo] });
        }
        let k = ((upper - lo) / step - EDGE_EPSILON).ceil();
        if k > MAX_PT_BINS as f64 {
            return Err(WpError::InvalidRange {
                what: format!(
                    "pT range [{lo}, {upper}) with step {step} needs {k} bins, limit is {MAX_PT_BINS}"
                ),
            });
        }
        let k = k as usize;
        let edges = (0..=k).map(|i| lo + i as f64 * step).collect();
        Ok(Self { edges })
    }

    /// Wrap explicit edges. Callers guarantee they are strictly increasing.
    pub fn from_edges(edges: Vec<f64>) -> Self {
        Self { edges }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Lower edge of every bin (all edges but the last).
    pub fn lows(&self) -> &[f64] {
        &self.edges[..self.n_bins()]
    }

    pub fn bin(&self, i: usize) -> Option<(f64, f64)> {
        if i < self.n_bins() {
            Some((self.edges[i], self.edges[i + 1]))
        } else {
            None
        }
    }

    pub fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.edges.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bins().map(|(lo, hi)| 0.5 * (lo + hi)).collect()
    }

    /// Index of the bin with `lo <= pt < hi`, if any.
    pub fn find(&self, pt: f64) -> Option<usize> {
        let idx = self.edges.partition_point(|e| *e <= pt);
        if idx == 0 || idx >= self.edges.len() {
            None
        } else {
            Some(idx - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_ends_at_upper_bound() {
        let b = PtBinning::from_pt(&[1.3, 4.0, 7.5], DEFAULT_PT_STEP, DEFAULT_PT_UPPER).unwrap();
        assert_eq!(b.edges()[0], 1.0);
        assert_eq!(b.n_bins(), 45);
        assert!((b.edges().last().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(b.lows().len(), 45);
    }

    #[test]
    fn uneven_step_covers_upper_bound() {
        let b = PtBinning::from_pt(&[1.0], 0.7, 10.0).unwrap();
        let last = *b.edges().last().unwrap();
        assert!(last >= 10.0 && last < 10.7);
    }

    #[test]
    fn empty_input_is_error() {
        let err = PtBinning::from_pt(&[], 0.2, 10.0).unwrap_err();
        assert!(matches!(err, WpError::EmptyInput { .. }));
        let err = PtBinning::from_pt(&[f64::NAN], 0.2, 10.0).unwrap_err();
        assert!(matches!(err, WpError::EmptyInput { .. }));
    }

    #[test]
    fn non_positive_step_is_error() {
        assert!(matches!(
            PtBinning::from_pt(&[1.0], 0.0, 10.0),
            Err(WpError::InvalidStep { .. })
        ));
    }

    #[test]
    fn non_finite_upper_is_error() {
        for upper in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                PtBinning::from_pt(&[1.0], 0.2, upper),
                Err(WpError::InvalidRange { .. })
            ));
        }
    }

    #[test]
    fn oversized_grid_is_error() {
        assert!(matches!(
            PtBinning::from_pt(&[1.0], 1e-12, 10.0),
            Err(WpError::InvalidRange { .. })
        ));
        assert!(matches!(
            PtBinning::from_pt(&[0.0], 0.2, 1e300),
            Err(WpError::InvalidRange { .. })
        ));
        let b = PtBinning::from_pt(&[0.0], 1.0, MAX_PT_BINS as f64).unwrap();
        assert_eq!(b.n_bins(), MAX_PT_BINS);
    }

    #[test]
    fn all_above_upper_gives_no_bins() {
        let b = PtBinning::from_pt(&[12.0, 15.0], 0.2, 10.0).unwrap();
        assert_eq!(b.n_bins(), 0);
        assert_eq!(b.find(12.0), None);
    }

    #[test]
    fn find_is_half_open() {
        let b = PtBinning::from_edges(vec![0.0, 1.0, 2.0]);
        assert_eq!(b.find(0.0), Some(0));
        assert_eq!(b.find(0.999), Some(0));
        assert_eq!(b.find(1.0), Some(1));
        assert_eq!(b.find(2.0), None);
        assert_eq!(b.find(-0.1), None);
        assert_eq!(b.find(f64::NAN), None);
    }

    #[test]
    fn centers_are_midpoints() {
        let b = PtBinning::from_edges(vec![0.0, 1.0, 3.0]);
        assert_eq!(b.centers(), vec![0.5, 2.0]);
    }
}
