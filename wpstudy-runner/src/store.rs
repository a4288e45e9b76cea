//! Parquet dataset store with Hive-style partitioning.
//!
//! Layout: `{root}/dataset={NAME}/mass_point={MP}.parquet`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (required `Electron_pt` column, rows > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per dataset (event and electron counts, hash, timestamp)
//!
//! Columns are named after their NanoAOD branches. Optional columns are
//! written only when present in the table.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wpstudy_core::domain::electron::{
    ETA_BRANCH, FLAVOR_BRANCH, IS_LOW_PT_BRANCH, IS_PF_BRANCH, IS_PF_OVERLAP_BRANCH, PHI_BRANCH,
    PT_BRANCH,
};
use wpstudy_core::{dataset_hash, ElectronTable, IdVariant, WpError};

use crate::ntuple::IngestedSample;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no stored data for dataset '{dataset}' (run `ingest` first)")]
    NotStored { dataset: String },

    #[error("table error: {0}")]
    Table(#[from] WpError),
}

/// Per-mass-point metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassPointMeta {
    pub total_entries: u64,
    pub electrons: usize,
    pub data_hash: String,
    pub stored_at: chrono::NaiveDateTime,
}

/// Metadata sidecar for a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub dataset: String,
    pub mass_points: BTreeMap<String, MassPointMeta>,
}

impl StoreMeta {
    pub fn total_entries(&self) -> u64 {
        self.mass_points.values().map(|m| m.total_entries).sum()
    }

    pub fn electrons(&self) -> usize {
        self.mass_points.values().map(|m| m.electrons).sum()
    }
}

/// A mass point loaded back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub mass_point: String,
    pub table: ElectronTable,
    pub total_entries: u64,
}

pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/dataset={NAME}/`
    fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(format!("dataset={dataset}"))
    }

    /// `{root}/dataset={NAME}/mass_point={MP}.parquet`
    fn mass_point_path(&self, dataset: &str, mass_point: &str) -> PathBuf {
        self.dataset_dir(dataset)
            .join(format!("mass_point={mass_point}.parquet"))
    }

    fn meta_path(&self, dataset: &str) -> PathBuf {
        self.dataset_dir(dataset).join("meta.json")
    }

    /// Write one ingested mass point and update the dataset sidecar.
    ///
    /// Writes are atomic: write to .tmp then rename.
    pub fn write(&self, sample: &IngestedSample) -> Result<PathBuf, DataError> {
        if sample.table.is_empty() {
            return Err(DataError::StoreError(format!(
                "no electrons to store for {}/{}",
                sample.dataset, sample.mass_point
            )));
        }

        let dir = self.dataset_dir(&sample.dataset);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let mut df = table_to_dataframe(&sample.table)?;
        let path = self.mass_point_path(&sample.dataset, &sample.mass_point);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        let mut meta = self.get_meta(&sample.dataset).unwrap_or_else(|| StoreMeta {
            dataset: sample.dataset.clone(),
            mass_points: BTreeMap::new(),
        });
        meta.mass_points.insert(
            sample.mass_point.clone(),
            MassPointMeta {
                total_entries: sample.total_entries,
                electrons: sample.table.len(),
                data_hash: dataset_hash(&sample.table),
                stored_at: chrono::Local::now().naive_local(),
            },
        );
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(&sample.dataset), meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;

        tracing::info!(
            dataset = %sample.dataset,
            mass_point = %sample.mass_point,
            electrons = sample.table.len(),
            path = %path.display(),
            "stored"
        );
        Ok(path)
    }

    pub fn get_meta(&self, dataset: &str) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(dataset)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Names of every stored dataset.
    pub fn datasets(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("dataset="))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Mass points stored for a dataset, sorted.
    pub fn list(&self, dataset: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.dataset_dir(dataset)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("mass_point="))
                    .and_then(|n| n.strip_suffix(".parquet"))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Load one mass point.
    pub fn load(&self, dataset: &str, mass_point: &str) -> Result<StoredSample, DataError> {
        let path = self.mass_point_path(dataset, mass_point);
        if !path.exists() {
            return Err(DataError::NotStored {
                dataset: format!("{dataset}/{mass_point}"),
            });
        }
        let table = load_and_validate_parquet(&path)?;
        let total_entries = self
            .get_meta(dataset)
            .and_then(|m| m.mass_points.get(mass_point).map(|mp| mp.total_entries))
            .unwrap_or(0);
        Ok(StoredSample {
            mass_point: mass_point.to_string(),
            table,
            total_entries,
        })
    }

    /// Load every mass point of a dataset. Corrupt files are quarantined and
    /// skipped.
    pub fn load_all(&self, dataset: &str) -> Result<Vec<StoredSample>, DataError> {
        let mut samples = Vec::new();
        for mp in self.list(dataset) {
            match self.load(dataset, &mp) {
                Ok(s) => samples.push(s),
                Err(e) => {
                    let path = self.mass_point_path(dataset, &mp);
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt store file");
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }
        if samples.is_empty() {
            return Err(DataError::NotStored {
                dataset: dataset.to_string(),
            });
        }
        Ok(samples)
    }

    /// Concatenate every mass point of a dataset. Returns the table and the
    /// summed event count.
    pub fn load_dataset(&self, dataset: &str) -> Result<(ElectronTable, u64), DataError> {
        let samples = self.load_all(dataset)?;
        let tables: Vec<&ElectronTable> = samples.iter().map(|s| &s.table).collect();
        let entries = samples.iter().map(|s| s.total_entries).sum();
        Ok((ElectronTable::concat(&tables), entries))
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn table_to_dataframe(table: &ElectronTable) -> Result<DataFrame, DataError> {
    let mut columns = vec![Column::new(PT_BRANCH.into(), table.pt().to_vec())];
    for (name, values) in [(ETA_BRANCH, table.eta()), (PHI_BRANCH, table.phi())] {
        if let Ok(v) = values {
            columns.push(Column::new(name.into(), v.to_vec()));
        }
    }
    if let Ok(flav) = table.gen_part_flav() {
        columns.push(Column::new(FLAVOR_BRANCH.into(), flav.to_vec()));
    }
    for (name, flags) in [
        (IS_LOW_PT_BRANCH, table.is_low_pt()),
        (IS_PF_BRANCH, table.is_pf()),
        (IS_PF_OVERLAP_BRANCH, table.is_pf_overlap()),
    ] {
        if let Ok(f) = flags {
            columns.push(Column::new(name.into(), f.to_vec()));
        }
    }
    for id in table.score_variants() {
        columns.push(Column::new(id.branch().into(), table.score(id)?.to_vec()));
    }
    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<ElectronTable, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    if df.column(PT_BRANCH).is_err() {
        return Err(DataError::ValidationError(format!(
            "missing column '{PT_BRANCH}'"
        )));
    }
    dataframe_to_table(&df)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<f64>>, DataError> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let ca = col
        .f64()
        .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
    Ok(Some(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
}

fn bool_column(df: &DataFrame, name: &str) -> Result<Option<Vec<bool>>, DataError> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let ca = col
        .bool()
        .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
    Ok(Some(ca.into_iter().map(|v| v.unwrap_or(false)).collect()))
}

fn dataframe_to_table(df: &DataFrame) -> Result<ElectronTable, DataError> {
    let pt = float_column(df, PT_BRANCH)?
        .ok_or_else(|| DataError::ValidationError(format!("missing column '{PT_BRANCH}'")))?;
    let mut table = ElectronTable::new(pt);

    if let Some(eta) = float_column(df, ETA_BRANCH)? {
        table = table.with_eta(eta)?;
    }
    if let Some(phi) = float_column(df, PHI_BRANCH)? {
        table = table.with_phi(phi)?;
    }
    if let Ok(col) = df.column(FLAVOR_BRANCH) {
        let ca = col
            .i32()
            .map_err(|e| DataError::ParquetError(format!("{FLAVOR_BRANCH} column type: {e}")))?;
        // Null flavor reads as 0 (unmatched).
        table = table.with_gen_part_flav(ca.into_iter().map(|v| v.unwrap_or(0)).collect())?;
    }
    if let Some(f) = bool_column(df, IS_LOW_PT_BRANCH)? {
        table = table.with_is_low_pt(f)?;
    }
    if let Some(f) = bool_column(df, IS_PF_BRANCH)? {
        table = table.with_is_pf(f)?;
    }
    if let Some(f) = bool_column(df, IS_PF_OVERLAP_BRANCH)? {
        table = table.with_is_pf_overlap(f)?;
    }
    for id in IdVariant::ALL {
        if let Some(scores) = float_column(df, id.branch())? {
            table = table.with_score(id, scores)?;
        }
    }
    Ok(table)
}
