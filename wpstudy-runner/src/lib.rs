//! wpstudy runner: everything around the core that touches files, ROOT
//! NTuples or external tools.
//!
//! This crate builds on `wpstudy-core` to provide:
//! - Sweep configuration (TOML) and sample manifests (YAML)
//! - NTuple ingestion from ROOT files into a Parquet dataset store
//! - Dataset loading with store/synthetic fallback
//! - Sweep runner, JSON/CSV/Markdown export and SVG plots
//! - `brilcalc` luminosity jobs with a CSV sanity check
//! - CRAB task configuration and submission
//! - Bounded retry for external commands

pub mod config;
pub mod crab;
pub mod data_loader;
pub mod export;
pub mod lumi;
pub mod ntuple;
pub mod plots;
pub mod retry;
pub mod runner;
pub mod samples;
pub mod store;

pub use config::{CategoryChoice, ConfigError, SweepConfig};
pub use crab::{build_tasks, submit_tasks, CrabError, CrabOptions, CrabSamples, CrabTask, Mode};
pub use data_loader::{load_dataset, DataSource, LoadError, LoadOptions, LoadedData};
pub use export::{
    export_json, export_working_points_csv, generate_report, import_json, load_artifacts,
    save_artifacts, SweepReport,
};
pub use lumi::{check_lumi_csv, check_lumi_file, LumiCheck, LumiConfig, LumiError, LumiJob, LumiVerdict};
pub use ntuple::{ingest_manifest, ingest_mass_point, IngestError, IngestedSample};
pub use retry::{CommandError, RetryPolicy};
pub use runner::{run_sweep, run_sweep_from_data, RunError, SweepRun};
pub use samples::{MassPointSource, SampleManifest};
pub use store::{DataError, DatasetStore, StoreMeta};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_is_send_sync() {
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
    }

    #[test]
    fn loaded_data_is_send_sync() {
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }

    #[test]
    fn crab_task_is_send_sync() {
        assert_send::<CrabTask>();
        assert_sync::<CrabTask>();
    }
}
