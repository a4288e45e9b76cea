//! Per-bin pass fractions against a cut curve.
//!
//! A record passes when its score is strictly greater than the bin's
//! threshold; ties fail. Bins with no threshold or no records report 0.

use crate::binning::PtBinning;
use crate::cut::scores_by_bin;
use crate::domain::{ElectronTable, IdVariant};
use crate::error::{WpError, WpResult};

/// Pass/total counts for one bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinCount {
    pub passed: usize,
    pub total: usize,
}

impl BinCount {
    pub fn efficiency(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Count passing and total records per bin.
pub fn bin_counts(
    table: &ElectronTable,
    id: IdVariant,
    thresholds: &[Option<f64>],
    binning: &PtBinning,
) -> WpResult<Vec<BinCount>> {
    if thresholds.len() != binning.n_bins() {
        return Err(WpError::BinMismatch {
            expected: binning.n_bins(),
            actual: thresholds.len(),
        });
    }
    let scores = table.score(id)?;

    let counts = scores_by_bin(table.pt(), scores, binning)
        .iter()
        .zip(thresholds)
        .map(|(bin, cut)| match cut {
            None => BinCount {
                passed: 0,
                total: bin.len(),
            },
            Some(cut) => BinCount {
                passed: bin.iter().filter(|s| **s > *cut).count(),
                total: bin.len(),
            },
        })
        .collect();
    Ok(counts)
}

/// Efficiency per bin, in [0, 1], aligned with `binning`.
pub fn efficiency(
    table: &ElectronTable,
    id: IdVariant,
    thresholds: &[Option<f64>],
    binning: &PtBinning,
) -> WpResult<Vec<f64>> {
    Ok(bin_counts(table, id, thresholds, binning)?
        .iter()
        .map(BinCount::efficiency)
        .collect())
}

/// Overall efficiency across every binned record.
pub fn integrated_efficiency(counts: &[BinCount]) -> f64 {
    let total = counts.iter().fold(BinCount::default(), |acc, c| BinCount {
        passed: acc.passed + c.passed,
        total: acc.total + c.total,
    });
    total.efficiency()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pt: Vec<f64>, scores: Vec<f64>) -> ElectronTable {
        ElectronTable::new(pt)
            .with_score(IdVariant::LowPt10Jun2025, scores)
            .unwrap()
    }

    #[test]
    fn ties_with_threshold_fail() {
        let t = table(vec![1.0, 1.1, 1.2], vec![0.5, 0.5, 0.6]);
        let binning = PtBinning::from_edges(vec![1.0, 2.0]);
        let eff = efficiency(&t, IdVariant::LowPt10Jun2025, &[Some(0.5)], &binning).unwrap();
        assert!((eff[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_cut_gives_zero() {
        let t = table(vec![1.0, 2.5], vec![5.0, 5.0]);
        let binning = PtBinning::from_edges(vec![1.0, 2.0, 3.0]);
        let eff =
            efficiency(&t, IdVariant::LowPt10Jun2025, &[None, Some(1.0)], &binning).unwrap();
        assert_eq!(eff, vec![0.0, 1.0]);
    }

    #[test]
    fn empty_bin_with_cut_gives_zero() {
        let t = table(vec![1.5], vec![5.0]);
        let binning = PtBinning::from_edges(vec![1.0, 2.0, 3.0]);
        let eff =
            efficiency(&t, IdVariant::LowPt10Jun2025, &[Some(0.0), Some(0.0)], &binning).unwrap();
        assert_eq!(eff, vec![1.0, 0.0]);
        assert!(!eff[1].is_nan());
    }

    #[test]
    fn threshold_count_must_match_bins() {
        let t = table(vec![1.5], vec![5.0]);
        let binning = PtBinning::from_edges(vec![1.0, 2.0, 3.0]);
        let err = efficiency(&t, IdVariant::LowPt10Jun2025, &[Some(0.0)], &binning).unwrap_err();
        assert_eq!(
            err,
            WpError::BinMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn integrated_efficiency_pools_bins() {
        let counts = [
            BinCount { passed: 1, total: 2 },
            BinCount { passed: 3, total: 6 },
            BinCount::default(),
        ];
        assert!((integrated_efficiency(&counts) - 0.5).abs() < 1e-12);
    }
}
