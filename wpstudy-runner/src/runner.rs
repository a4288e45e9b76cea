//! Sweep runner: wires dataset loading, reco selection, truth labeling and
//! the core working-point sweep.
//!
//! Two entry points:
//! - `run_sweep()`: loads the dataset from the store, then runs. Used by CLI.
//! - `run_sweep_from_data()`: takes a pre-loaded dataset. No I/O.

use thiserror::Error;
use wpstudy_core::{Partition, RecoCategory, SweepResults, WorkingPointSweep, WpError};

use crate::config::{ConfigError, SweepConfig};
use crate::data_loader::{load_dataset, LoadError, LoadOptions, LoadedData};
use crate::export::SweepReport;
use crate::store::DatasetStore;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("dataset error: {0}")]
    Table(#[from] WpError),
}

/// Outcome of one sweep over one dataset.
#[derive(Debug, Clone)]
pub struct SweepRun {
    pub category: RecoCategory,
    pub partition: Partition,
    pub results: SweepResults,
    pub report: SweepReport,
}

pub fn run_sweep(
    config: &SweepConfig,
    store: &DatasetStore,
    dataset: &str,
    opts: &LoadOptions,
    parallel: bool,
) -> Result<SweepRun, RunError> {
    config.validate()?;
    let loaded = load_dataset(store, dataset, opts)?;
    run_sweep_from_data(config, &loaded, parallel)
}

/// Select the configured reco category, split signal from background and
/// sweep every target level.
///
/// Per-level failures (bad id, target out of range) stay inside the
/// results; only dataset-wide problems such as a missing flavor column
/// fail the run.
pub fn run_sweep_from_data(
    config: &SweepConfig,
    loaded: &LoadedData,
    parallel: bool,
) -> Result<SweepRun, RunError> {
    let category = config.category();
    let selected = category.select(&loaded.table)?;
    let partition = config.signal_definition().partition(&selected)?;
    tracing::info!(
        dataset = %loaded.dataset,
        %category,
        signal = partition.signal().len(),
        background = partition.background().len(),
        "running sweep"
    );

    let results = WorkingPointSweep::new().with_parallelism(parallel).run(
        &config.sweep_spec(),
        partition.signal(),
        partition.background(),
    );
    let report = SweepReport::from_results(config, loaded, category, &partition, &results);

    Ok(SweepRun {
        category,
        partition,
        results,
        report,
    })
}
