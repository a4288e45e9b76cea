//! wpstudy core: electron identification working points.
//!
//! This crate contains the computation, with no file or process I/O:
//! - Typed per-electron table with NanoAOD branch names
//! - Truth labeling (signal flavor set) and reco-category split
//! - pT binning, linear-interpolation percentiles
//! - Per-bin percentile cut derivation and efficiency evaluation
//! - Working-point sweep across target levels, isolated per level
//! - Histograms and flavor breakdowns for diagnostics
//! - Seeded synthetic samples and BLAKE3 fingerprints

pub mod binning;
pub mod cut;
pub mod domain;
pub mod efficiency;
pub mod error;
pub mod fingerprint;
pub mod histogram;
pub mod percentile;
pub mod sweep;
pub mod synthetic;

pub use binning::{PtBinning, DEFAULT_PT_STEP, DEFAULT_PT_UPPER};
pub use cut::{derive_cut, derive_cut_auto, derive_cut_for, CutCurve};
pub use domain::{
    split_lowpt_pf, ElectronTable, IdVariant, Partition, RecoCategory, SignalDefinition,
};
pub use efficiency::{bin_counts, efficiency, integrated_efficiency, BinCount};
pub use error::{WpError, WpResult};
pub use fingerprint::{dataset_hash, SweepFingerprint};
pub use sweep::{SweepResults, SweepSpec, WorkingPointCurves, WorkingPointSweep, DEFAULT_TARGETS};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn table_types_are_send_sync() {
        assert_send::<ElectronTable>();
        assert_sync::<ElectronTable>();
        assert_send::<Partition>();
        assert_sync::<Partition>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<SweepResults>();
        assert_sync::<SweepResults>();
        assert_send::<WorkingPointCurves>();
        assert_sync::<WorkingPointCurves>();
        assert_send::<WpError>();
        assert_sync::<WpError>();
    }
}
