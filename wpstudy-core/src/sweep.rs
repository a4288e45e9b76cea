//! Working-point sweep across target rejection levels.
//!
//! Bins are built once from the signal pT distribution and shared by every
//! level. Each level then derives its cut curve from the signal subset and
//! evaluates it on both subsets. Levels are independent: a failure in one is
//! recorded against that level and the others still run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::binning::{PtBinning, DEFAULT_PT_STEP, DEFAULT_PT_UPPER};
use crate::cut::derive_cut;
use crate::domain::ElectronTable;
use crate::efficiency::{bin_counts, integrated_efficiency, BinCount};
use crate::error::{WpError, WpResult};

/// Target levels 50, 55, ..., 90.
pub const DEFAULT_TARGETS: [u32; 9] = [50, 55, 60, 65, 70, 75, 80, 85, 90];

/// What to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    /// Identification branch name; validated per level.
    pub id: String,
    pub targets: Vec<u32>,
    pub pt_step: f64,
    pub pt_upper: f64,
}

impl SweepSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            targets: DEFAULT_TARGETS.to_vec(),
            pt_step: DEFAULT_PT_STEP,
            pt_upper: DEFAULT_PT_UPPER,
        }
    }

    pub fn with_targets(mut self, targets: Vec<u32>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_pt_step(mut self, step: f64) -> Self {
        self.pt_step = step;
        self
    }

    pub fn with_pt_upper(mut self, upper: f64) -> Self {
        self.pt_upper = upper;
        self
    }
}

/// Threshold curve plus signal/background efficiency curves for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingPointCurves {
    pub target: u32,
    pub bin_lows: Vec<f64>,
    pub thresholds: Vec<Option<f64>>,
    pub signal_efficiency: Vec<f64>,
    pub background_efficiency: Vec<f64>,
    /// Efficiency over all binned signal records.
    pub signal_integrated: f64,
    /// Efficiency over all binned background records.
    pub background_integrated: f64,
}

/// Executes a sweep, optionally in parallel over levels.
#[derive(Debug, Clone)]
pub struct WorkingPointSweep {
    parallel: bool,
}

impl Default for WorkingPointSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingPointSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(
        &self,
        spec: &SweepSpec,
        signal: &ElectronTable,
        background: &ElectronTable,
    ) -> SweepResults {
        self.run_with_progress(spec, signal, background, |_, _, _| {})
    }

    /// Run the sweep, invoking `progress(index, total, target)` after each
    /// level completes (in completion order when parallel).
    pub fn run_with_progress<F>(
        &self,
        spec: &SweepSpec,
        signal: &ElectronTable,
        background: &ElectronTable,
        progress: F,
    ) -> SweepResults
    where
        F: Fn(usize, usize, u32) + Send + Sync,
    {
        let binning = PtBinning::from_pt(signal.pt(), spec.pt_step, spec.pt_upper);
        let total = spec.targets.len();

        let evaluate = |(idx, target): (usize, &u32)| {
            let outcome = match &binning {
                Ok(b) => evaluate_level(&spec.id, *target, b, signal, background),
                Err(e) => Err(e.clone()),
            };
            if let Err(e) = &outcome {
                tracing::warn!(target_level = *target, kind = e.kind(), error = %e, "working point failed");
            } else {
                tracing::debug!(target_level = *target, "working point derived");
            }
            progress(idx, total, *target);
            (*target, outcome)
        };

        let outcomes: BTreeMap<u32, WpResult<WorkingPointCurves>> = if self.parallel {
            spec.targets.par_iter().enumerate().map(evaluate).collect()
        } else {
            spec.targets.iter().enumerate().map(evaluate).collect()
        };

        SweepResults {
            id: spec.id.clone(),
            binning: binning.ok(),
            outcomes,
        }
    }
}

fn evaluate_level(
    id_name: &str,
    target: u32,
    binning: &PtBinning,
    signal: &ElectronTable,
    background: &ElectronTable,
) -> WpResult<WorkingPointCurves> {
    let curve = derive_cut(signal, id_name, target, binning)?;
    let sig_counts = bin_counts(signal, curve.id, &curve.thresholds, binning)?;
    let bkg_counts = bin_counts(background, curve.id, &curve.thresholds, binning)?;

    Ok(WorkingPointCurves {
        target,
        bin_lows: curve.bin_lows,
        thresholds: curve.thresholds,
        signal_efficiency: sig_counts.iter().map(BinCount::efficiency).collect(),
        background_efficiency: bkg_counts.iter().map(BinCount::efficiency).collect(),
        signal_integrated: integrated_efficiency(&sig_counts),
        background_integrated: integrated_efficiency(&bkg_counts),
    })
}

/// Per-level outcomes of a sweep, keyed by target level.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResults {
    id: String,
    binning: Option<PtBinning>,
    outcomes: BTreeMap<u32, WpResult<WorkingPointCurves>>,
}

impl SweepResults {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared binning; `None` when it could not be built from the signal pT.
    pub fn binning(&self) -> Option<&PtBinning> {
        self.binning.as_ref()
    }

    pub fn outcomes(&self) -> &BTreeMap<u32, WpResult<WorkingPointCurves>> {
        &self.outcomes
    }

    pub fn get(&self, target: u32) -> Option<&WpResult<WorkingPointCurves>> {
        self.outcomes.get(&target)
    }

    /// Successful levels in increasing target order.
    pub fn curves(&self) -> impl Iterator<Item = &WorkingPointCurves> {
        self.outcomes.values().filter_map(|o| o.as_ref().ok())
    }

    /// Failed levels with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (u32, &WpError)> {
        self.outcomes
            .iter()
            .filter_map(|(t, o)| o.as_ref().err().map(|e| (*t, e)))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdVariant;

    const ID: &str = "Electron_PFEleMvaID_Run3CustomJpsitoEEValue";

    fn make_table(pt: Vec<f64>, scores: Vec<f64>) -> ElectronTable {
        ElectronTable::new(pt)
            .with_score(IdVariant::PfRun3CustomJpsiToEe, scores)
            .unwrap()
    }

    fn signal() -> ElectronTable {
        let pt: Vec<f64> = (0..40).map(|i| 1.0 + (i % 20) as f64 * 0.1).collect();
        let scores: Vec<f64> = (0..40).map(|i| (i as f64 / 40.0) * 2.0 - 1.0).collect();
        make_table(pt, scores)
    }

    fn background() -> ElectronTable {
        let pt: Vec<f64> = (0..30).map(|i| 1.05 + (i % 10) as f64 * 0.2).collect();
        let scores: Vec<f64> = (0..30).map(|i| -1.0 + i as f64 / 30.0).collect();
        make_table(pt, scores)
    }

    #[test]
    fn sweep_produces_one_outcome_per_target() {
        let spec = SweepSpec::new(ID).with_pt_upper(3.0);
        let results = WorkingPointSweep::new().run(&spec, &signal(), &background());
        assert_eq!(results.len(), DEFAULT_TARGETS.len());
        assert!(results.all_succeeded());
        let n_bins = results.binning().unwrap().n_bins();
        for c in results.curves() {
            assert_eq!(c.thresholds.len(), n_bins);
            assert_eq!(c.signal_efficiency.len(), n_bins);
            assert_eq!(c.background_efficiency.len(), n_bins);
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let spec = SweepSpec::new(ID).with_pt_upper(3.0);
        let par = WorkingPointSweep::new().run(&spec, &signal(), &background());
        let seq = WorkingPointSweep::new()
            .with_parallelism(false)
            .run(&spec, &signal(), &background());
        assert_eq!(par, seq);
    }

    #[test]
    fn invalid_id_fails_every_level_without_panicking() {
        let spec = SweepSpec::new("Electron_bogus").with_targets(vec![50, 90]);
        let results = WorkingPointSweep::new().run(&spec, &signal(), &background());
        assert_eq!(results.failures().count(), 2);
        for (_, err) in results.failures() {
            assert!(matches!(err, WpError::InvalidId { .. }));
        }
    }

    #[test]
    fn bad_level_is_isolated() {
        let spec = SweepSpec::new(ID)
            .with_targets(vec![60, 150, 80])
            .with_pt_upper(3.0);
        let results = WorkingPointSweep::new().run(&spec, &signal(), &background());
        assert!(results.get(60).unwrap().is_ok());
        assert!(results.get(80).unwrap().is_ok());
        assert_eq!(
            results.get(150).unwrap().as_ref().unwrap_err(),
            &WpError::InvalidTarget { target: 150 }
        );
    }

    #[test]
    fn empty_signal_reports_empty_input() {
        let empty = make_table(vec![], vec![]);
        let spec = SweepSpec::new(ID).with_targets(vec![70]);
        let results = WorkingPointSweep::new().run(&spec, &empty, &background());
        assert!(results.binning().is_none());
        assert!(matches!(
            results.get(70).unwrap(),
            Err(WpError::EmptyInput { .. })
        ));
    }

    #[test]
    fn background_without_score_fails_every_level_with_branch_name() {
        let pt: Vec<f64> = (0..30).map(|i| 1.05 + (i % 10) as f64 * 0.2).collect();
        let bare_background = ElectronTable::new(pt);
        let spec = SweepSpec::new(ID)
            .with_targets(vec![50, 70, 90])
            .with_pt_upper(3.0);
        let results = WorkingPointSweep::new().run(&spec, &signal(), &bare_background);
        assert!(results.binning().is_some());
        assert_eq!(results.failures().count(), 3);
        for (_, err) in results.failures() {
            assert_eq!(err, &WpError::missing(ID));
            assert_eq!(err.kind(), "MissingField");
        }
    }

    #[test]
    fn infinite_upper_bound_fails_levels_instead_of_panicking() {
        let spec = SweepSpec::new(ID)
            .with_targets(vec![60, 80])
            .with_pt_upper(f64::INFINITY);
        let results = WorkingPointSweep::new().run(&spec, &signal(), &background());
        assert!(results.binning().is_none());
        assert_eq!(results.failures().count(), 2);
        for (_, err) in results.failures() {
            assert!(matches!(err, WpError::InvalidRange { .. }));
        }
    }

    #[test]
    fn progress_is_reported_for_every_level() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let seen = AtomicUsize::new(0);
        let spec = SweepSpec::new(ID).with_pt_upper(3.0);
        WorkingPointSweep::new().run_with_progress(&spec, &signal(), &background(), |_, total, _| {
            assert_eq!(total, DEFAULT_TARGETS.len());
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), DEFAULT_TARGETS.len());
    }
}
