//! NanoAOD NTuple ingestion.
//!
//! Reads the `Events` tree of every `*.root` file in a directory with
//! oxyroot. Electron branches are jagged (one variable-length array per
//! event) and are flattened into one row per electron.
//!
//! Per-file failures never abort a directory:
//! - a file missing any required branch is skipped with a warning
//! - a file that cannot be opened or decoded is skipped with a warning
//!
//! All directories of a mass point are merged into a single table.

use oxyroot::{Branch, Named, RootFile, Slice};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wpstudy_core::domain::electron::{
    ETA_BRANCH, FLAVOR_BRANCH, IS_LOW_PT_BRANCH, IS_PF_BRANCH, IS_PF_OVERLAP_BRANCH, PHI_BRANCH,
    PT_BRANCH,
};
use wpstudy_core::{ElectronTable, IdVariant, WpError};

use crate::samples::{MassPointSource, SampleManifest};

pub const EVENTS_TREE: &str = "Events";

/// Branches every ingested file must carry.
pub fn required_branches() -> Vec<&'static str> {
    let mut branches = vec![
        PT_BRANCH,
        ETA_BRANCH,
        PHI_BRANCH,
        IS_LOW_PT_BRANCH,
        IS_PF_BRANCH,
        IS_PF_OVERLAP_BRANCH,
        FLAVOR_BRANCH,
    ];
    branches.extend(IdVariant::ALL.iter().map(|id| id.branch()));
    branches
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("{} is missing branches: {}", .path.display(), .missing.join(", "))]
    MissingBranches { path: PathBuf, missing: Vec<String> },

    #[error("{}: branch '{branch}' has unsupported type '{type_name}'", .path.display())]
    UnsupportedType {
        path: PathBuf,
        branch: String,
        type_name: String,
    },

    #[error("{}: failed to read branch '{branch}': {reason}", .path.display())]
    Read {
        path: PathBuf,
        branch: String,
        reason: String,
    },

    #[error("{}: {source}", .path.display())]
    Table { path: PathBuf, source: WpError },
}

// ── Event-level columns ─────────────────────────────────────────────

/// Per-event electron arrays as read from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventColumns {
    pub pt: Vec<Vec<f64>>,
    pub eta: Vec<Vec<f64>>,
    pub phi: Vec<Vec<f64>>,
    pub gen_part_flav: Vec<Vec<i32>>,
    pub is_low_pt: Vec<Vec<bool>>,
    pub is_pf: Vec<Vec<bool>>,
    pub is_pf_overlap: Vec<Vec<bool>>,
    pub scores: Vec<(IdVariant, Vec<Vec<f64>>)>,
}

fn flatten<T>(events: Vec<Vec<T>>) -> Vec<T> {
    events.into_iter().flatten().collect()
}

impl EventColumns {
    pub fn n_events(&self) -> usize {
        self.pt.len()
    }

    /// Flatten to one row per electron. Every branch must have the same
    /// electron multiplicity as `Electron_pt`.
    pub fn into_table(self) -> Result<ElectronTable, WpError> {
        let mut table = ElectronTable::new(flatten(self.pt))
            .with_eta(flatten(self.eta))?
            .with_phi(flatten(self.phi))?
            .with_gen_part_flav(flatten(self.gen_part_flav))?
            .with_is_low_pt(flatten(self.is_low_pt))?
            .with_is_pf(flatten(self.is_pf))?
            .with_is_pf_overlap(flatten(self.is_pf_overlap))?;
        for (id, scores) in self.scores {
            table = table.with_score(id, flatten(scores))?;
        }
        Ok(table)
    }
}

// ── Branch decoding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum LeafKind {
    F32,
    F64,
    Bool,
    U8,
    I8,
    I16,
    I32,
}

/// Leaf type of a counted array branch, from its ROOT type name.
fn leaf_kind(type_name: &str) -> Option<LeafKind> {
    let base = type_name.split('[').next().unwrap_or("").trim().to_ascii_lowercase();
    match base.as_str() {
        "float" | "float_t" | "float32_t" => Some(LeafKind::F32),
        "double" | "double_t" | "double32_t" => Some(LeafKind::F64),
        "bool" | "bool_t" => Some(LeafKind::Bool),
        "unsigned char" | "uchar_t" | "uint8_t" => Some(LeafKind::U8),
        "char" | "char_t" | "int8_t" => Some(LeafKind::I8),
        "short" | "short_t" | "int16_t" => Some(LeafKind::I16),
        "int" | "int_t" | "int32_t" => Some(LeafKind::I32),
        _ => None,
    }
}

struct BranchReader<'a> {
    path: &'a Path,
    branches: Vec<&'a Branch>,
}

impl<'a> BranchReader<'a> {
    fn find(&self, name: &str) -> Option<&'a Branch> {
        self.branches.iter().copied().find(|b| b.name() == name)
    }

    fn missing(&self, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .filter(|n| self.find(n).is_none())
            .map(|n| n.to_string())
            .collect()
    }

    fn branch(&self, name: &str) -> Result<(&'a Branch, LeafKind), IngestError> {
        let branch = self.find(name).ok_or_else(|| IngestError::MissingBranches {
            path: self.path.to_path_buf(),
            missing: vec![name.to_string()],
        })?;
        let type_name = branch.item_type_name();
        let kind = leaf_kind(&type_name).ok_or_else(|| IngestError::UnsupportedType {
            path: self.path.to_path_buf(),
            branch: name.to_string(),
            type_name: type_name.to_string(),
        })?;
        Ok((branch, kind))
    }

    fn read_err(&self, name: &str, err: impl std::fmt::Display) -> IngestError {
        IngestError::Read {
            path: self.path.to_path_buf(),
            branch: name.to_string(),
            reason: err.to_string(),
        }
    }

    fn unsupported(&self, name: &str, kind: LeafKind) -> IngestError {
        IngestError::UnsupportedType {
            path: self.path.to_path_buf(),
            branch: name.to_string(),
            type_name: format!("{kind:?}"),
        }
    }

    fn floats(&self, name: &str) -> Result<Vec<Vec<f64>>, IngestError> {
        let (branch, kind) = self.branch(name)?;
        match kind {
            LeafKind::F32 => Ok(branch
                .as_iter::<Slice<f32>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec().into_iter().map(f64::from).collect())
                .collect()),
            LeafKind::F64 => Ok(branch
                .as_iter::<Slice<f64>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec())
                .collect()),
            other => Err(self.unsupported(name, other)),
        }
    }

    fn flags(&self, name: &str) -> Result<Vec<Vec<bool>>, IngestError> {
        let (branch, kind) = self.branch(name)?;
        match kind {
            LeafKind::Bool => Ok(branch
                .as_iter::<Slice<bool>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec())
                .collect()),
            other => Err(self.unsupported(name, other)),
        }
    }

    fn integers(&self, name: &str) -> Result<Vec<Vec<i32>>, IngestError> {
        let (branch, kind) = self.branch(name)?;
        let events = match kind {
            LeafKind::U8 => branch
                .as_iter::<Slice<u8>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec().into_iter().map(i32::from).collect())
                .collect(),
            LeafKind::I8 => branch
                .as_iter::<Slice<i8>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec().into_iter().map(i32::from).collect())
                .collect(),
            LeafKind::I16 => branch
                .as_iter::<Slice<i16>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec().into_iter().map(i32::from).collect())
                .collect(),
            LeafKind::I32 => branch
                .as_iter::<Slice<i32>>()
                .map_err(|e| self.read_err(name, e))?
                .map(|s| s.into_vec())
                .collect(),
            other => return Err(self.unsupported(name, other)),
        };
        Ok(events)
    }
}

/// Read the electron branches of one NTuple file.
pub fn read_file(path: &Path) -> Result<EventColumns, IngestError> {
    let mut file = RootFile::open(path).map_err(|e| IngestError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tree = file.get_tree(EVENTS_TREE).map_err(|e| IngestError::Open {
        path: path.to_path_buf(),
        reason: format!("tree '{EVENTS_TREE}': {e}"),
    })?;

    let reader = BranchReader {
        path,
        branches: tree.branches().collect(),
    };
    let missing = reader.missing(&required_branches());
    if !missing.is_empty() {
        return Err(IngestError::MissingBranches {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut scores = Vec::with_capacity(IdVariant::ALL.len());
    for id in IdVariant::ALL {
        scores.push((id, reader.floats(id.branch())?));
    }

    Ok(EventColumns {
        pt: reader.floats(PT_BRANCH)?,
        eta: reader.floats(ETA_BRANCH)?,
        phi: reader.floats(PHI_BRANCH)?,
        gen_part_flav: reader.integers(FLAVOR_BRANCH)?,
        is_low_pt: reader.flags(IS_LOW_PT_BRANCH)?,
        is_pf: reader.flags(IS_PF_BRANCH)?,
        is_pf_overlap: reader.flags(IS_PF_OVERLAP_BRANCH)?,
        scores,
    })
}

// ── Directory and manifest ingestion ────────────────────────────────

/// Every `*.root` file directly inside `dir`, sorted by path.
pub fn find_root_files(dir: &Path) -> Vec<PathBuf> {
    let Some(dir_str) = dir.to_str() else {
        tracing::warn!(dir = %dir.display(), "directory path is not UTF-8, skipping");
        return Vec::new();
    };
    let pattern = format!("{}/*.root", glob::Pattern::escape(dir_str));
    let mut files: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "bad directory pattern");
            Vec::new()
        }
    };
    files.sort();
    files
}

/// One ingested mass point.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedSample {
    pub dataset: String,
    pub mass_point: String,
    pub table: ElectronTable,
    /// Events summed over every file read.
    pub total_entries: u64,
    pub files_read: usize,
    pub files_skipped: usize,
}

/// Merge every readable file of every directory into one sample.
pub fn ingest_mass_point(dataset: &str, source: &MassPointSource) -> IngestedSample {
    let mut tables = Vec::new();
    let mut total_entries = 0u64;
    let mut files_skipped = 0usize;

    for dir in &source.dirs {
        let files = find_root_files(dir);
        if files.is_empty() {
            tracing::warn!(dir = %dir.display(), "no ROOT files found");
        }
        for path in files {
            let outcome = read_file(&path).and_then(|cols| {
                let n_events = cols.n_events() as u64;
                cols.into_table()
                    .map(|t| (t, n_events))
                    .map_err(|source| IngestError::Table {
                        path: path.clone(),
                        source,
                    })
            });
            match outcome {
                Ok((table, n_events)) => {
                    tracing::debug!(file = %path.display(), events = n_events, electrons = table.len(), "read");
                    total_entries += n_events;
                    tables.push(table);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping file");
                    files_skipped += 1;
                }
            }
        }
    }

    let refs: Vec<&ElectronTable> = tables.iter().collect();
    let sample = IngestedSample {
        dataset: dataset.to_string(),
        mass_point: source.name.clone(),
        table: ElectronTable::concat(&refs),
        total_entries,
        files_read: tables.len(),
        files_skipped,
    };
    tracing::info!(
        dataset,
        mass_point = %source.name,
        events = total_entries,
        electrons = sample.table.len(),
        "mass point ingested"
    );
    sample
}

/// Ingest every mass point of every dataset in the manifest.
pub fn ingest_manifest(manifest: &SampleManifest) -> Vec<IngestedSample> {
    manifest
        .iter()
        .flat_map(|(dataset, mass_points)| {
            mass_points
                .iter()
                .map(move |mp| ingest_mass_point(dataset, mp))
        })
        .collect()
}
