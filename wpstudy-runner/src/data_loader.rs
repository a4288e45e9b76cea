//! Dataset resolution for sweeps and plots.
//!
//! Implements the fallback policy:
//! 1. If the dataset is in the store → use it
//! 2. If not stored and `synthetic` is set → generate a seeded sample (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Synthetic data is a developer-only debug mode. Results produced on it
//! carry the synthetic tag in every exported artifact.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wpstudy_core::synthetic::{generate, SyntheticSpec};
use wpstudy_core::{dataset_hash, ElectronTable, WpError};

use crate::store::{DataError, DatasetStore};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no stored data for '{dataset}' (use --synthetic for a synthetic sample)")]
    NotAvailable { dataset: String },

    #[error("store error: {0}")]
    Data(#[from] DataError),

    #[error("synthetic generation failed: {0}")]
    Synthetic(#[from] WpError),
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Generate a synthetic sample when the store has nothing.
    pub synthetic: bool,
    pub synthetic_spec: SyntheticSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Store,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: String,
    pub table: ElectronTable,
    /// Events behind the table (0 for synthetic samples).
    pub total_entries: u64,
    pub source: DataSource,
    /// BLAKE3 over the table contents.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

pub fn load_dataset(
    store: &DatasetStore,
    dataset: &str,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    match store.load_dataset(dataset) {
        Ok((table, total_entries)) => {
            tracing::info!(dataset, electrons = table.len(), events = total_entries, "loaded from store");
            return Ok(LoadedData {
                dataset: dataset.to_string(),
                dataset_hash: dataset_hash(&table),
                table,
                total_entries,
                source: DataSource::Store,
            });
        }
        Err(DataError::NotStored { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    if opts.synthetic {
        tracing::warn!(dataset, "generating synthetic sample; results will be tagged as synthetic");
        let table = generate(&opts.synthetic_spec)?;
        return Ok(LoadedData {
            dataset: dataset.to_string(),
            dataset_hash: dataset_hash(&table),
            table,
            total_entries: 0,
            source: DataSource::Synthetic,
        });
    }

    Err(LoadError::NotAvailable {
        dataset: dataset.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntuple::IngestedSample;

    #[test]
    fn store_takes_priority_over_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let table = ElectronTable::new(vec![1.0, 2.0, 3.0]);
        store
            .write(&IngestedSample {
                dataset: "DY".into(),
                mass_point: "incl".into(),
                table: table.clone(),
                total_entries: 3,
                files_read: 1,
                files_skipped: 0,
            })
            .unwrap();

        let opts = LoadOptions {
            synthetic: true,
            ..LoadOptions::default()
        };
        let loaded = load_dataset(&store, "DY", &opts).unwrap();
        assert_eq!(loaded.source, DataSource::Store);
        assert_eq!(loaded.table, table);
        assert_eq!(loaded.total_entries, 3);
    }

    #[test]
    fn synthetic_fallback_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let opts = LoadOptions {
            synthetic: true,
            synthetic_spec: SyntheticSpec {
                n_electrons: 100,
                ..SyntheticSpec::default()
            },
        };
        let loaded = load_dataset(&store, "HAHM", &opts).unwrap();
        assert!(loaded.is_synthetic());
        assert_eq!(loaded.table.len(), 100);
        assert_eq!(loaded.dataset_hash.len(), 64);
    }

    #[test]
    fn no_data_without_synthetic_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let err = load_dataset(&store, "HAHM", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::NotAvailable { .. }));
    }
}
