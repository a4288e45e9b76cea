//! Serializable sweep configuration.
//!
//! A TOML file with three sections:
//!
//! ```toml
//! [sweep]
//! id = "Electron_lowPtID_10Jun2025"
//! targets = [50, 55, 60, 65, 70, 75, 80, 85, 90]
//! pt_step = 0.2
//! pt_upper = 10.0
//! category = "auto"
//!
//! [truth]
//! flavors = [1, 5, 22]
//!
//! [output]
//! dir = "results"
//! plots = true
//! ```
//!
//! Every field has a default, so an empty `[sweep]` with only `id` is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wpstudy_core::binning::MAX_PT_BINS;
use wpstudy_core::domain::SIGNAL_FLAVORS;
use wpstudy_core::{
    IdVariant, RecoCategory, SignalDefinition, SweepSpec, DEFAULT_PT_STEP, DEFAULT_PT_UPPER,
    DEFAULT_TARGETS,
};

/// Errors reading or validating TOML and YAML configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn read(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Read a whole config file.
pub(crate) fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))
}

/// Which electrons a sweep runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryChoice {
    /// The identification variant's natural category.
    #[default]
    Auto,
    LowPt,
    Pf,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSection {
    pub id: String,
    #[serde(default = "default_targets")]
    pub targets: Vec<u32>,
    #[serde(default = "default_pt_step")]
    pub pt_step: f64,
    #[serde(default = "default_pt_upper")]
    pub pt_upper: f64,
    #[serde(default)]
    pub category: CategoryChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthSection {
    #[serde(default = "default_flavors")]
    pub flavors: Vec<i32>,
}

impl Default for TruthSection {
    fn default() -> Self {
        Self {
            flavors: default_flavors(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub plots: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            plots: true,
        }
    }
}

fn default_targets() -> Vec<u32> {
    DEFAULT_TARGETS.to_vec()
}

fn default_pt_step() -> f64 {
    DEFAULT_PT_STEP
}

fn default_pt_upper() -> f64 {
    DEFAULT_PT_UPPER
}

fn default_flavors() -> Vec<i32> {
    SIGNAL_FLAVORS.to_vec()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_true() -> bool {
    true
}

/// Complete sweep configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub sweep: SweepSection,
    #[serde(default)]
    pub truth: TruthSection,
    #[serde(default)]
    pub output: OutputSection,
}

impl SweepConfig {
    /// Default configuration for one identification variant.
    pub fn for_id(id: IdVariant) -> Self {
        Self {
            sweep: SweepSection {
                id: id.branch().to_string(),
                targets: default_targets(),
                pt_step: DEFAULT_PT_STEP,
                pt_upper: DEFAULT_PT_UPPER,
                category: CategoryChoice::Auto,
            },
            truth: TruthSection::default(),
            output: OutputSection::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&read_to_string(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            what: "sweep TOML".into(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            what: "sweep config".into(),
            reason: e.to_string(),
        })
    }

    /// Structural checks. Unknown ids and out-of-range targets are left to
    /// the sweep, which reports them per level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep.targets.is_empty() {
            return Err(ConfigError::Invalid("sweep.targets is empty".into()));
        }
        if !(self.sweep.pt_step.is_finite() && self.sweep.pt_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sweep.pt_step must be positive, got {}",
                self.sweep.pt_step
            )));
        }
        if !self.sweep.pt_upper.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "sweep.pt_upper must be finite, got {}",
                self.sweep.pt_upper
            )));
        }
        // pT is non-negative, so the grid starts at 0 or above.
        if self.sweep.pt_upper.max(0.0) / self.sweep.pt_step > MAX_PT_BINS as f64 {
            return Err(ConfigError::Invalid(format!(
                "sweep.pt_step {} is too fine for pt_upper {} (limit {MAX_PT_BINS} bins)",
                self.sweep.pt_step, self.sweep.pt_upper
            )));
        }
        if self.truth.flavors.is_empty() {
            return Err(ConfigError::Invalid("truth.flavors is empty".into()));
        }
        Ok(())
    }

    pub fn sweep_spec(&self) -> SweepSpec {
        SweepSpec::new(self.sweep.id.clone())
            .with_targets(self.sweep.targets.clone())
            .with_pt_step(self.sweep.pt_step)
            .with_pt_upper(self.sweep.pt_upper)
    }

    pub fn signal_definition(&self) -> SignalDefinition {
        SignalDefinition::new(self.truth.flavors.iter().copied())
    }

    /// Resolved reco category. `Auto` with an unknown id falls back to all
    /// electrons; the sweep itself reports the bad id.
    pub fn category(&self) -> RecoCategory {
        match self.sweep.category {
            CategoryChoice::LowPt => RecoCategory::LowPt,
            CategoryChoice::Pf => RecoCategory::Pf,
            CategoryChoice::All => RecoCategory::All,
            CategoryChoice::Auto => self
                .sweep
                .id
                .parse::<IdVariant>()
                .map(IdVariant::natural_category)
                .unwrap_or(RecoCategory::All),
        }
    }
}
