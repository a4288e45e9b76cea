//! Per-bin percentile cut derivation.
//!
//! For a target level `t`, the cut in each pT bin is the `(100 - t)`-th
//! percentile of the dataset's own score distribution in that bin. The
//! dataset is whatever the caller wants to characterize (normally the
//! signal subset of one reco category). Empty bins get no cut.

use crate::binning::PtBinning;
use crate::domain::{ElectronTable, IdVariant};
use crate::error::{WpError, WpResult};
use crate::percentile::percentile_sorted;
use serde::{Deserialize, Serialize};

/// Thresholds for one working point, aligned with a binning's bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutCurve {
    pub id: IdVariant,
    pub target: u32,
    /// Lower bin edges (the binning's edges without the last one).
    pub bin_lows: Vec<f64>,
    /// `None` where the bin holds no records.
    pub thresholds: Vec<Option<f64>>,
}

impl CutCurve {
    pub fn defined_bins(&self) -> usize {
        self.thresholds.iter().filter(|t| t.is_some()).count()
    }
}

pub(crate) fn check_target(target: u32) -> WpResult<()> {
    if target > 100 {
        return Err(WpError::InvalidTarget { target });
    }
    Ok(())
}

/// Scores grouped by pT bin. Records outside every bin are dropped.
pub(crate) fn scores_by_bin(pt: &[f64], scores: &[f64], binning: &PtBinning) -> Vec<Vec<f64>> {
    let mut grouped = vec![Vec::new(); binning.n_bins()];
    for (p, s) in pt.iter().zip(scores) {
        if let Some(i) = binning.find(*p) {
            grouped[i].push(*s);
        }
    }
    grouped
}

/// Derive a cut curve for an identification branch given by name.
///
/// Fails with `InvalidId` when `id_name` is not in the allow-list.
pub fn derive_cut(
    table: &ElectronTable,
    id_name: &str,
    target: u32,
    binning: &PtBinning,
) -> WpResult<CutCurve> {
    let id: IdVariant = id_name.parse()?;
    derive_cut_for(table, id, target, binning)
}

pub fn derive_cut_for(
    table: &ElectronTable,
    id: IdVariant,
    target: u32,
    binning: &PtBinning,
) -> WpResult<CutCurve> {
    check_target(target)?;
    let scores = table.score(id)?;
    let percentile = f64::from(100 - target);

    let thresholds = scores_by_bin(table.pt(), scores, binning)
        .into_iter()
        .map(|mut bin| {
            bin.sort_by(|a, b| a.total_cmp(b));
            percentile_sorted(&bin, percentile)
        })
        .collect();

    Ok(CutCurve {
        id,
        target,
        bin_lows: binning.lows().to_vec(),
        thresholds,
    })
}

/// Build the binning from the table's own pT and derive the cut in one step.
pub fn derive_cut_auto(
    table: &ElectronTable,
    id_name: &str,
    target: u32,
    pt_step: f64,
    pt_upper: f64,
) -> WpResult<(PtBinning, CutCurve)> {
    let binning = PtBinning::from_pt(table.pt(), pt_step, pt_upper)?;
    let curve = derive_cut(table, id_name, target, &binning)?;
    Ok((binning, curve))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINTER22: &str = "Electron_PFEleMvaID_Winter22NoIsoV1Value";

    fn ten_in_one_bin() -> ElectronTable {
        let pt: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.1).collect();
        let scores: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        ElectronTable::new(pt)
            .with_score(IdVariant::PfWinter22NoIsoV1, scores)
            .unwrap()
    }

    #[test]
    fn target_90_takes_tenth_percentile() {
        let table = ten_in_one_bin();
        let binning = PtBinning::from_pt(table.pt(), 1.0, 2.0).unwrap();
        assert_eq!(binning.n_bins(), 1);
        let curve = derive_cut(&table, WINTER22, 90, &binning).unwrap();
        let cut = curve.thresholds[0].unwrap();
        assert!((cut - 0.19).abs() < 1e-12);
        assert_eq!(curve.bin_lows, vec![1.0]);
    }

    #[test]
    fn empty_bins_have_no_cut() {
        let table = ten_in_one_bin();
        let binning = PtBinning::from_edges(vec![0.0, 1.0, 2.0, 3.0]);
        let curve = derive_cut(&table, WINTER22, 50, &binning).unwrap();
        assert_eq!(curve.thresholds[0], None);
        assert!(curve.thresholds[1].is_some());
        assert_eq!(curve.thresholds[2], None);
        assert_eq!(curve.defined_bins(), 1);
    }

    #[test]
    fn unknown_id_is_rejected() {
        let table = ten_in_one_bin();
        let binning = PtBinning::from_edges(vec![0.0, 2.0]);
        let err = derive_cut(&table, "Electron_mvaFall17V2Iso", 50, &binning).unwrap_err();
        assert!(matches!(err, WpError::InvalidId { .. }));
    }

    #[test]
    fn absent_score_column_is_missing_field() {
        let table = ten_in_one_bin();
        let binning = PtBinning::from_edges(vec![0.0, 2.0]);
        let err = derive_cut(&table, "Electron_lowPtID_10Jun2025", 50, &binning).unwrap_err();
        assert_eq!(err, WpError::missing("Electron_lowPtID_10Jun2025"));
    }

    #[test]
    fn target_above_100_is_rejected() {
        let table = ten_in_one_bin();
        let binning = PtBinning::from_edges(vec![0.0, 2.0]);
        assert_eq!(
            derive_cut(&table, WINTER22, 101, &binning).unwrap_err(),
            WpError::InvalidTarget { target: 101 }
        );
    }

    #[test]
    fn auto_binning_starts_at_floor_of_min() {
        let table = ten_in_one_bin();
        let (binning, curve) = derive_cut_auto(&table, WINTER22, 50, 0.2, 10.0).unwrap();
        assert_eq!(binning.edges()[0], 1.0);
        assert_eq!(curve.thresholds.len(), binning.n_bins());
    }
}
