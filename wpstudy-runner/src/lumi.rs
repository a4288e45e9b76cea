//! Integrated luminosity via `brilcalc`, with a sanity check of its CSV.
//!
//! The run-range file is YAML keyed by year:
//!
//! ```yaml
//! 2023:
//!   Lumi: /path/to/Cert_Collisions2023_golden.json
//!   era:
//!     C: [367080, 367515]
//!     D: [369927, 370790]
//! ```
//!
//! Each era becomes one `brilcalc lumi` invocation writing
//! `{year}_{era}_lumi.csv`. The per-run recorded values in that CSV are then
//! summed and compared with brilcalc's own summary line.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use thiserror::Error;

use crate::config::{read_to_string, ConfigError};
use crate::retry::{CommandError, RetryPolicy};

pub const DEFAULT_NORMTAG: &str =
    "/cvmfs/cms-bril.cern.ch/cms-lumi-pog/Normtags/normtag_PHYSICS.json";

const SUMMARY_HEADER: &str = "#nfill,nrun,nls,ncms,totdelivered(/fb),totrecorded(/fb)";

#[derive(Debug, Error)]
pub enum LumiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("brilcalc failed for {year} {era}: {source}")]
    Command {
        year: String,
        era: String,
        source: CommandError,
    },

    #[error("cannot read lumi CSV {}: {reason}", .path.display())]
    Csv { path: PathBuf, reason: String },

    #[error("cannot create output dir {}: {reason}", .path.display())]
    OutputDir { path: PathBuf, reason: String },
}

// ─── Run-range configuration ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EraRange {
    pub name: String,
    /// Run numbers as listed; valid ranges have exactly two.
    pub runs: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearRanges {
    pub year: String,
    pub lumi_json: Option<PathBuf>,
    pub eras: Vec<EraRange>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LumiConfig {
    pub years: Vec<YearRanges>,
}

#[derive(Deserialize)]
struct RawYear {
    #[serde(rename = "Lumi", default)]
    lumi: Option<String>,
    #[serde(default)]
    era: serde_yaml_ng::Mapping,
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}

/// Run numbers of an era; anything that is not a list of integers is empty.
fn run_numbers(value: &Value) -> Vec<u64> {
    match value {
        Value::Sequence(items) => {
            let runs: Option<Vec<u64>> = items.iter().map(Value::as_u64).collect();
            runs.unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

impl LumiConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_to_string(path)?)
    }

    /// Parse the run-range YAML, preserving year and era order.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let parse_err = |e: serde_yaml_ng::Error| ConfigError::Parse {
            what: "run-range YAML".into(),
            reason: e.to_string(),
        };
        let root: serde_yaml_ng::Mapping = serde_yaml_ng::from_str(content).map_err(parse_err)?;

        let mut years = Vec::with_capacity(root.len());
        for (key, value) in root {
            let raw: RawYear = serde_yaml_ng::from_value(value).map_err(parse_err)?;
            let eras = raw
                .era
                .iter()
                .map(|(name, runs)| EraRange {
                    name: key_string(name),
                    runs: run_numbers(runs),
                })
                .collect();
            years.push(YearRanges {
                year: key_string(&key),
                lumi_json: raw.lumi.filter(|s| !s.is_empty()).map(PathBuf::from),
                eras,
            });
        }
        Ok(Self { years })
    }

    /// One job per valid era. Years without a lumi JSON and eras without
    /// exactly two run numbers are skipped with a warning.
    pub fn plan(&self, output_dir: &Path) -> Vec<LumiJob> {
        let mut jobs = Vec::new();
        for year in &self.years {
            let Some(lumi_json) = &year.lumi_json else {
                tracing::warn!(year = %year.year, "skipping year: no Lumi JSON");
                continue;
            };
            for era in &year.eras {
                let &[run_start, run_end] = era.runs.as_slice() else {
                    tracing::warn!(year = %year.year, era = %era.name, runs = ?era.runs, "skipping era: invalid run range");
                    continue;
                };
                jobs.push(LumiJob {
                    year: year.year.clone(),
                    era: era.name.clone(),
                    lumi_json: lumi_json.clone(),
                    run_start,
                    run_end,
                    output: output_dir.join(format!("{}_{}_lumi.csv", year.year, era.name)),
                });
            }
        }
        jobs
    }
}

/// One `brilcalc lumi` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LumiJob {
    pub year: String,
    pub era: String,
    pub lumi_json: PathBuf,
    pub run_start: u64,
    pub run_end: u64,
    pub output: PathBuf,
}

impl LumiJob {
    /// Arguments after the `brilcalc` program name.
    pub fn args(&self, normtag: &str) -> Vec<String> {
        vec![
            "lumi".into(),
            "--normtag".into(),
            normtag.into(),
            "-u".into(),
            "/fb".into(),
            "-i".into(),
            self.lumi_json.display().to_string(),
            "-o".into(),
            self.output.display().to_string(),
            "--begin".into(),
            self.run_start.to_string(),
            "--end".into(),
            self.run_end.to_string(),
        ]
    }
}

// ─── CSV check ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LumiVerdict {
    /// Relative difference below 1e-6.
    Match,
    /// Relative difference below 1e-4.
    Rounding,
    Mismatch,
    NoData,
    NoSummary,
}

impl LumiVerdict {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Match | Self::Rounding)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LumiCheck {
    /// Sum of the last column over data rows, in /fb.
    pub computed_sum: f64,
    pub summary: Option<f64>,
    pub diff: f64,
    pub rel_diff: f64,
    pub verdict: LumiVerdict,
}

/// Every number on a line, in order. Signs bind only to decimals.
fn extract_numbers(line: &str) -> Vec<f64> {
    static NUMBER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[-+]?\d*\.\d+|\d+").expect("valid number regex")
    });
    NUMBER
        .find_iter(line)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

pub fn check_lumi_csv(text: &str) -> LumiCheck {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    // Data rows: every non-comment line with more than one field.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut n_rows = 0usize;
    let mut computed_sum = 0.0;
    for record in rdr.records().filter_map(Result::ok) {
        if record.len() < 2 {
            continue;
        }
        n_rows += 1;
        if let Some(v) = record.get(record.len() - 1).and_then(|v| v.parse::<f64>().ok()) {
            computed_sum += v;
        }
    }

    if n_rows == 0 {
        return LumiCheck {
            computed_sum,
            summary: None,
            diff: 0.0,
            rel_diff: 0.0,
            verdict: LumiVerdict::NoData,
        };
    }

    let summary = lines
        .iter()
        .position(|l| l.starts_with(SUMMARY_HEADER))
        .and_then(|i| lines.get(i + 1))
        .map(|l| extract_numbers(l))
        .filter(|nums| nums.len() >= 6)
        .and_then(|nums| nums.last().copied());

    let Some(summary_value) = summary else {
        return LumiCheck {
            computed_sum,
            summary: None,
            diff: 0.0,
            rel_diff: 0.0,
            verdict: LumiVerdict::NoSummary,
        };
    };

    let diff = (computed_sum - summary_value).abs();
    let rel_diff = if summary_value != 0.0 {
        diff / summary_value
    } else {
        0.0
    };
    let verdict = if rel_diff < 1e-6 {
        LumiVerdict::Match
    } else if rel_diff < 1e-4 {
        LumiVerdict::Rounding
    } else {
        LumiVerdict::Mismatch
    };

    LumiCheck {
        computed_sum,
        summary: Some(summary_value),
        diff,
        rel_diff,
        verdict,
    }
}

pub fn check_lumi_file(path: &Path) -> Result<LumiCheck, LumiError> {
    let text = std::fs::read_to_string(path).map_err(|e| LumiError::Csv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(check_lumi_csv(&text))
}

// ─── Execution ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LumiOutcome {
    pub job: LumiJob,
    pub result: Result<LumiCheck, LumiError>,
}

/// Run every job through the retry policy, then check its CSV.
///
/// A failing era is recorded and the remaining eras still run.
pub fn run_jobs(
    jobs: &[LumiJob],
    normtag: &str,
    policy: &RetryPolicy,
) -> Result<Vec<LumiOutcome>, LumiError> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        if let Some(dir) = job.output.parent() {
            std::fs::create_dir_all(dir).map_err(|e| LumiError::OutputDir {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let result = policy
            .run_command("brilcalc", &job.args(normtag))
            .map_err(|source| LumiError::Command {
                year: job.year.clone(),
                era: job.era.clone(),
                source,
            })
            .and_then(|()| check_lumi_file(&job.output));

        match &result {
            Ok(check) => tracing::info!(
                year = %job.year,
                era = %job.era,
                verdict = ?check.verdict,
                rel_diff = check.rel_diff,
                "lumi checked"
            ),
            Err(e) => tracing::warn!(year = %job.year, era = %job.era, error = %e, "lumi job failed"),
        }
        outcomes.push(LumiOutcome {
            job: job.clone(),
            result,
        });
    }
    Ok(outcomes)
}
