//! Ingest sample manifest.
//!
//! YAML mapping dataset names to a list of mass points, each mass point
//! listing one or more NTuple directories:
//!
//! ```yaml
//! HAHM:
//!   - M5: [/eos/ntuples/HAHM_M5_part1, /eos/ntuples/HAHM_M5_part2]
//!   - M10: [/eos/ntuples/HAHM_M10]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{read_to_string, ConfigError};

/// One mass point and the directories holding its NTuples.
#[derive(Debug, Clone, PartialEq)]
pub struct MassPointSource {
    pub name: String,
    pub dirs: Vec<PathBuf>,
}

/// Dataset name → mass points, in file order within each dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleManifest {
    datasets: BTreeMap<String, Vec<MassPointSource>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawManifest(BTreeMap<String, Vec<BTreeMap<String, Vec<PathBuf>>>>);

impl SampleManifest {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_to_string(path)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawManifest = serde_yaml_ng::from_str(content).map_err(|e| ConfigError::Parse {
            what: "sample manifest YAML".into(),
            reason: e.to_string(),
        })?;

        let mut datasets = BTreeMap::new();
        for (dataset, entries) in raw.0 {
            let mut mass_points: Vec<MassPointSource> = Vec::new();
            for entry in entries {
                for (name, dirs) in entry {
                    // A mass point listed twice keeps every directory.
                    match mass_points.iter_mut().find(|m| m.name == name) {
                        Some(existing) => existing.dirs.extend(dirs),
                        None => mass_points.push(MassPointSource { name, dirs }),
                    }
                }
            }
            datasets.insert(dataset, mass_points);
        }
        Ok(Self { datasets })
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(|s| s.as_str())
    }

    pub fn mass_points(&self, dataset: &str) -> Option<&[MassPointSource]> {
        self.datasets.get(dataset).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MassPointSource])> {
        self.datasets
            .iter()
            .map(|(name, mps)| (name.as_str(), mps.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
