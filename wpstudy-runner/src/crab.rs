//! CRAB task configuration and submission for DoubleElectron NanoAOD
//! production.
//!
//! Samples come from a YAML file:
//!
//! ```yaml
//! common:
//!   data:
//!     lumiMask: /path/to/golden.json
//!     splitting: 10
//! samples:
//!   ParkingDoubleElectronLowMass_Run2023C:
//!     dataset: /ParkingDoubleElectronLowMass0/Run2023C-PromptReco-v1/MINIAOD
//!     isMC: false
//!   HAHM_M5:
//!     dataset: /HAHM.../MINIAODSIM
//!     isMC: true
//!     dbs: phys03
//! ```
//!
//! Every sample gets its own immutable [`CrabTask`]; nothing carries over
//! from one sample to the next.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{read_to_string, ConfigError};
use crate::retry::{CommandError, RetryPolicy};

pub const OUT_LFN_ROOT: &str = "/store/group/cmst3/group/xee/tree_v1";
pub const PSET_NAME: &str = "BParkingNano/test/run_nano_cfg.py";
pub const STORAGE_SITE: &str = "T2_CH_CERN";
const MAX_JOB_RUNTIME_MIN: u32 = 2000;
const MAX_MEMORY_MB: u32 = 3500;
const REPORT_EVERY: u32 = 5000;

#[derive(Debug, Error)]
pub enum CrabError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("LHC run must be 2 or 3, got {0}")]
    InvalidRun(u8),

    #[error("unknown mode '{0}' (expected reco, eff, trg or vbf)")]
    InvalidMode(String),

    #[error("invalid sample filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    #[error("sample '{sample}' is data but common.data.lumiMask is not set")]
    MissingLumiMask { sample: String },

    #[error("common.data.splitting is not set")]
    MissingSplitting,

    #[error("cannot write CRAB config {}: {reason}", .path.display())]
    WriteConfig { path: PathBuf, reason: String },

    #[error("submission of '{request}' failed: {source}")]
    Submit {
        request: String,
        source: CommandError,
    },
}

// ─── Sample file ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataCommon {
    #[serde(rename = "lumiMask", default)]
    pub lumi_mask: Option<String>,
    #[serde(default)]
    pub splitting: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommonSection {
    #[serde(default)]
    pub data: DataCommon,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleInfo {
    pub dataset: String,
    #[serde(rename = "isMC")]
    pub is_mc: bool,
    #[serde(default)]
    pub dbs: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "userInputFiles", default)]
    pub user_input_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrabSamples {
    pub common: CommonSection,
    /// In file order.
    pub samples: Vec<(String, SampleInfo)>,
}

#[derive(Deserialize)]
struct RawSamples {
    #[serde(default)]
    common: CommonSection,
    samples: serde_yaml_ng::Mapping,
}

impl CrabSamples {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_to_string(path)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let parse_err = |e: serde_yaml_ng::Error| ConfigError::Parse {
            what: "CRAB samples YAML".into(),
            reason: e.to_string(),
        };
        let raw: RawSamples = serde_yaml_ng::from_str(content).map_err(parse_err)?;
        let mut samples = Vec::with_capacity(raw.samples.len());
        for (name, info) in raw.samples {
            let name = name.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::Invalid(format!("sample name must be a string, got {name:?}"))
            })?;
            samples.push((name, serde_yaml_ng::from_value(info).map_err(parse_err)?));
        }
        Ok(Self {
            common: raw.common,
            samples,
        })
    }
}

// ─── Options ────────────────────────────────────────────────────────

/// Processing mode passed through to the NanoAOD configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Apply the skim.
    #[default]
    Reco,
    /// Disable all selections.
    Eff,
    Trg,
    /// Apply VBF triggers.
    Vbf,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reco => "reco",
            Self::Eff => "eff",
            Self::Trg => "trg",
            Self::Vbf => "vbf",
        })
    }
}

impl FromStr for Mode {
    type Err = CrabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reco" => Ok(Self::Reco),
            "eff" => Ok(Self::Eff),
            "trg" => Ok(Self::Trg),
            "vbf" => Ok(Self::Vbf),
            other => Err(CrabError::InvalidMode(other.to_string())),
        }
    }
}

/// Date tag used in work areas and output names, e.g. `2025Oct16`.
pub fn production_tag(date: NaiveDate) -> String {
    date.format("%Y%b%d").to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrabOptions {
    /// Shell-style glob on sample names.
    pub filter: String,
    pub lhc_run: u8,
    pub year: u32,
    pub mode: Mode,
    pub save_all_nano: bool,
    pub save_regression_vars: bool,
    pub tag: String,
}

impl Default for CrabOptions {
    fn default() -> Self {
        Self {
            filter: "*".into(),
            lhc_run: 3,
            year: 2023,
            mode: Mode::Reco,
            save_all_nano: true,
            save_regression_vars: false,
            tag: production_tag(chrono::Local::now().date_naive()),
        }
    }
}

impl CrabOptions {
    /// `DoubleElectronNANO_Run3_2023_mc[_noskim][_allNano][_withRegVars]_<tag>.root`
    pub fn output_file_name(&self, is_mc: bool) -> String {
        let mut parts = vec![
            "DoubleElectronNANO".to_string(),
            format!("Run{}", self.lhc_run),
            self.year.to_string(),
            if is_mc { "mc" } else { "data" }.to_string(),
        ];
        if self.mode == Mode::Eff {
            parts.push("noskim".into());
        }
        if self.save_all_nano {
            parts.push("allNano".into());
        }
        if self.save_regression_vars {
            parts.push("withRegVars".into());
        }
        parts.push(self.tag.clone());
        format!("{}.root", parts.join("_"))
    }

    /// Output LFN directory for one sample.
    pub fn out_lfn_dir_base(&self, sample: &str) -> String {
        let mut base = OUT_LFN_ROOT.to_string();
        if sample.contains("HAHM") {
            base.push_str("/signalSamples/HAHM_DarkPhoton_13p6TeV_Nov2024");
        } else if sample.contains("Run20") {
            base.push_str("/data");
        } else {
            base.push_str("/backgroundSamples");
        }

        let mut pieces = Vec::new();
        if self.mode == Mode::Eff {
            pieces.push("noskim");
        }
        if self.save_all_nano {
            pieces.push("allnanoColl");
        }
        if self.save_regression_vars {
            pieces.push("withRegVars");
        }
        if !pieces.is_empty() {
            base.push('/');
            base.push_str(&pieces.join("_"));
        }
        base
    }
}

// ─── Tasks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitting {
    FileBased,
    LumiBased,
}

impl fmt::Display for Splitting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileBased => "FileBased",
            Self::LumiBased => "LumiBased",
        })
    }
}

/// Fully resolved configuration of one CRAB task.
#[derive(Debug, Clone, PartialEq)]
pub struct CrabTask {
    pub request_name: String,
    pub work_area: String,
    pub input_dataset: String,
    pub input_dbs: String,
    pub splitting: Splitting,
    /// Empty for simulation.
    pub lumi_mask: String,
    pub units_per_job: u32,
    pub user_input_files: Vec<String>,
    pub py_cfg_params: Vec<String>,
    pub output_file: String,
    pub out_lfn_dir_base: String,
}

/// Build one task per sample whose name matches the filter.
pub fn build_tasks(samples: &CrabSamples, opts: &CrabOptions) -> Result<Vec<CrabTask>, CrabError> {
    if !matches!(opts.lhc_run, 2 | 3) {
        return Err(CrabError::InvalidRun(opts.lhc_run));
    }
    let pattern = glob::Pattern::new(&opts.filter).map_err(|e| CrabError::InvalidFilter {
        pattern: opts.filter.clone(),
        reason: e.to_string(),
    })?;
    let units_per_job = samples
        .common
        .data
        .splitting
        .ok_or(CrabError::MissingSplitting)?;

    let mut tasks = Vec::new();
    for (name, info) in &samples.samples {
        if !pattern.matches(name) {
            tracing::debug!(sample = %name, filter = %opts.filter, "sample filtered out");
            continue;
        }

        let (splitting, lumi_mask) = if info.is_mc {
            (Splitting::FileBased, String::new())
        } else {
            let mask = samples
                .common
                .data
                .lumi_mask
                .clone()
                .ok_or_else(|| CrabError::MissingLumiMask {
                    sample: name.clone(),
                })?;
            (Splitting::LumiBased, mask)
        };

        let version = info.version.as_deref().unwrap_or("Z");
        let py_cfg_params = vec![
            format!("isMC={}", u8::from(info.is_mc)),
            format!("reportEvery={REPORT_EVERY}"),
            format!("tag={}", opts.tag),
            format!("lhcRun={}", opts.lhc_run),
            format!("year={}", opts.year),
            format!("mode={}", opts.mode),
            format!("saveAllNanoContent={}", u8::from(opts.save_all_nano)),
            format!("saveRegressionVars={}", u8::from(opts.save_regression_vars)),
            format!("version={version}"),
        ];

        tasks.push(CrabTask {
            request_name: name.clone(),
            work_area: format!("DoubleElectronNANO_{}", opts.tag),
            input_dataset: info.dataset.clone(),
            input_dbs: info.dbs.clone().unwrap_or_else(|| "global".into()),
            splitting,
            lumi_mask,
            units_per_job,
            user_input_files: info.user_input_files.clone().unwrap_or_default(),
            py_cfg_params,
            output_file: opts.output_file_name(info.is_mc),
            out_lfn_dir_base: opts.out_lfn_dir_base(name),
        });
    }
    Ok(tasks)
}

/// Python string literal.
fn py_str(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn py_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| py_str(s)).collect();
    format!("[{}]", quoted.join(", "))
}

impl CrabTask {
    /// Render as a CRAB client configuration file.
    pub fn render(&self) -> String {
        let mut py = String::with_capacity(1536);
        py.push_str("from CRABClient.UserUtilities import config\n\n");
        py.push_str("config = config()\n\n");

        py.push_str("config.section_('General')\n");
        py.push_str(&format!("config.General.requestName = {}\n", py_str(&self.request_name)));
        py.push_str(&format!("config.General.workArea = {}\n", py_str(&self.work_area)));
        py.push_str("config.General.transferOutputs = True\n");
        py.push_str("config.General.transferLogs = True\n\n");

        py.push_str("config.section_('Data')\n");
        py.push_str("config.Data.publication = False\n");
        py.push_str(&format!("config.Data.inputDataset = {}\n", py_str(&self.input_dataset)));
        py.push_str(&format!("config.Data.inputDBS = {}\n", py_str(&self.input_dbs)));
        py.push_str(&format!("config.Data.splitting = {}\n", py_str(&self.splitting.to_string())));
        py.push_str(&format!("config.Data.lumiMask = {}\n", py_str(&self.lumi_mask)));
        py.push_str(&format!("config.Data.unitsPerJob = {}\n", self.units_per_job));
        if !self.user_input_files.is_empty() {
            py.push_str(&format!(
                "config.Data.userInputFiles = {}\n",
                py_list(&self.user_input_files)
            ));
        }
        py.push_str(&format!("config.Data.outLFNDirBase = {}\n\n", py_str(&self.out_lfn_dir_base)));

        py.push_str("config.section_('JobType')\n");
        py.push_str("config.JobType.pluginName = 'Analysis'\n");
        py.push_str(&format!("config.JobType.psetName = {}\n", py_str(PSET_NAME)));
        py.push_str(&format!("config.JobType.maxJobRuntimeMin = {MAX_JOB_RUNTIME_MIN}\n"));
        py.push_str(&format!("config.JobType.maxMemoryMB = {MAX_MEMORY_MB}\n"));
        py.push_str("config.JobType.allowUndistributedCMSSW = True\n");
        py.push_str(&format!("config.JobType.pyCfgParams = {}\n", py_list(&self.py_cfg_params)));
        py.push_str(&format!(
            "config.JobType.outputFiles = {}\n\n",
            py_list(std::slice::from_ref(&self.output_file))
        ));

        py.push_str("config.section_('User')\n");
        py.push_str("config.section_('Site')\n");
        py.push_str(&format!("config.Site.storageSite = {}\n", py_str(STORAGE_SITE)));
        py
    }

    pub fn config_file_name(&self) -> String {
        format!("crab_{}.py", self.request_name)
    }
}

// ─── Submission ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SubmitOutcome {
    pub request_name: String,
    /// Path of the written config on success.
    pub result: Result<PathBuf, CrabError>,
}

/// Write every task's config under `config_dir`.
pub fn write_configs(tasks: &[CrabTask], config_dir: &Path) -> Result<Vec<PathBuf>, CrabError> {
    std::fs::create_dir_all(config_dir).map_err(|e| CrabError::WriteConfig {
        path: config_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    tasks
        .iter()
        .map(|task| {
            let path = config_dir.join(task.config_file_name());
            std::fs::write(&path, task.render()).map_err(|e| CrabError::WriteConfig {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(path)
        })
        .collect()
}

/// Write configs and run `crab submit -c <file>` for each task. A failed
/// submission is recorded and the remaining tasks are still submitted.
pub fn submit_tasks(
    tasks: &[CrabTask],
    config_dir: &Path,
    policy: &RetryPolicy,
) -> Result<Vec<SubmitOutcome>, CrabError> {
    let paths = write_configs(tasks, config_dir)?;
    let outcomes = tasks
        .iter()
        .zip(paths)
        .map(|(task, path)| {
            let args = vec!["submit".to_string(), "-c".to_string(), path.display().to_string()];
            let result = policy
                .run_command("crab", &args)
                .map(|()| path)
                .map_err(|source| CrabError::Submit {
                    request: task.request_name.clone(),
                    source,
                });
            match &result {
                Ok(_) => tracing::info!(request = %task.request_name, "task submitted"),
                Err(e) => tracing::warn!(request = %task.request_name, error = %e, "submission failed"),
            }
            SubmitOutcome {
                request_name: task.request_name.clone(),
                result,
            }
        })
        .collect();
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &str = r#"
common:
  data:
    lumiMask: /certs/golden.json
    splitting: 10
samples:
  HAHM_M5:
    dataset: /HAHM_M5/Run3Summer23/MINIAODSIM
    isMC: true
    dbs: phys03
    userInputFiles: [/store/user/a.root]
  DYto2L:
    dataset: /DYto2L/Run3Summer23/MINIAODSIM
    isMC: true
  ParkingDoubleElectron_Run2023C:
    dataset: /ParkingDoubleElectronLowMass0/Run2023C/MINIAOD
    isMC: false
    version: C
"#;

    fn opts() -> CrabOptions {
        CrabOptions {
            tag: production_tag(NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()),
            ..CrabOptions::default()
        }
    }

    #[test]
    fn tag_format() {
        assert_eq!(opts().tag, "2025Oct16");
    }

    #[test]
    fn samples_keep_file_order() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let names: Vec<_> = s.samples.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["HAHM_M5", "DYto2L", "ParkingDoubleElectron_Run2023C"]);
        assert_eq!(s.common.data.splitting, Some(10));
    }

    #[test]
    fn tasks_are_independent_per_sample() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let tasks = build_tasks(&s, &opts()).unwrap();
        assert_eq!(tasks.len(), 3);

        let hahm = &tasks[0];
        assert_eq!(hahm.splitting, Splitting::FileBased);
        assert_eq!(hahm.lumi_mask, "");
        assert_eq!(hahm.input_dbs, "phys03");
        assert_eq!(hahm.user_input_files.len(), 1);
        assert_eq!(
            hahm.out_lfn_dir_base,
            "/store/group/cmst3/group/xee/tree_v1/signalSamples/HAHM_DarkPhoton_13p6TeV_Nov2024/allnanoColl"
        );

        let dy = &tasks[1];
        assert!(dy.user_input_files.is_empty());
        assert_eq!(dy.input_dbs, "global");
        assert!(dy.out_lfn_dir_base.ends_with("/backgroundSamples/allnanoColl"));
        assert!(dy.py_cfg_params.contains(&"version=Z".to_string()));

        let data = &tasks[2];
        assert_eq!(data.splitting, Splitting::LumiBased);
        assert_eq!(data.lumi_mask, "/certs/golden.json");
        assert_eq!(data.output_file, "DoubleElectronNANO_Run3_2023_data_allNano_2025Oct16.root");
        assert!(data.out_lfn_dir_base.contains("/data/"));
        assert_eq!(data.work_area, "DoubleElectronNANO_2025Oct16");
        assert_eq!(data.py_cfg_params[0], "isMC=0");
    }

    #[test]
    fn filter_selects_samples() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let o = CrabOptions {
            filter: "HAHM*".into(),
            ..opts()
        };
        let tasks = build_tasks(&s, &o).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].request_name, "HAHM_M5");
    }

    #[test]
    fn output_name_flags() {
        let o = CrabOptions {
            mode: Mode::Eff,
            save_all_nano: false,
            save_regression_vars: true,
            lhc_run: 2,
            year: 2018,
            ..opts()
        };
        assert_eq!(
            o.output_file_name(true),
            "DoubleElectronNANO_Run2_2018_mc_noskim_withRegVars_2025Oct16.root"
        );
        assert!(o.out_lfn_dir_base("QCD").ends_with("/backgroundSamples/noskim_withRegVars"));

        let bare = CrabOptions {
            save_all_nano: false,
            ..opts()
        };
        assert_eq!(bare.out_lfn_dir_base("QCD"), format!("{OUT_LFN_ROOT}/backgroundSamples"));
    }

    #[test]
    fn invalid_inputs() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let bad_run = CrabOptions { lhc_run: 4, ..opts() };
        assert!(matches!(build_tasks(&s, &bad_run), Err(CrabError::InvalidRun(4))));
        assert!(matches!("skim".parse::<Mode>(), Err(CrabError::InvalidMode(_))));

        let no_mask = CrabSamples::from_yaml(
            "common: {data: {splitting: 5}}\nsamples:\n  Run2023C: {dataset: /x, isMC: false}\n",
        )
        .unwrap();
        assert!(matches!(
            build_tasks(&no_mask, &opts()),
            Err(CrabError::MissingLumiMask { .. })
        ));
    }

    #[test]
    fn render_contains_job_settings() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let tasks = build_tasks(&s, &opts()).unwrap();
        let py = tasks[0].render();
        assert!(py.contains("config.General.requestName = 'HAHM_M5'"));
        assert!(py.contains("config.Data.splitting = 'FileBased'"));
        assert!(py.contains("config.Data.userInputFiles = ['/store/user/a.root']"));
        assert!(py.contains("config.JobType.maxMemoryMB = 3500"));
        assert!(py.contains("'reportEvery=5000'"));
        assert!(!tasks[1].render().contains("userInputFiles"));
        assert_eq!(py_str("it's"), "'it\\'s'");
    }

    #[test]
    fn configs_are_written_per_task() {
        let s = CrabSamples::from_yaml(SAMPLES).unwrap();
        let tasks = build_tasks(&s, &opts()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let paths = write_configs(&tasks, dir.path()).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("crab_HAHM_M5.py"));
        assert!(std::fs::read_to_string(&paths[2]).unwrap().contains("LumiBased"));
    }
}
