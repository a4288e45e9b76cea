//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for a working-point sweep:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: one row per target level and pT bin
//! - **Markdown**: human-readable summary report
//!
//! All persisted artifacts include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use wpstudy_core::{Partition, RecoCategory, SweepFingerprint, SweepResults, WorkingPointCurves};

use crate::config::SweepConfig;
use crate::data_loader::LoadedData;

pub const SCHEMA_VERSION: u32 = 1;

/// Why a target level produced no curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curves: Option<WorkingPointCurves>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LevelError>,
}

/// Everything needed to reproduce and review one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub schema_version: u32,
    pub run_id: String,
    pub dataset: String,
    pub category: RecoCategory,
    pub config: SweepConfig,
    pub fingerprint: SweepFingerprint,
    pub has_synthetic: bool,
    pub created_at: chrono::NaiveDateTime,
    pub signal_electrons: usize,
    pub background_electrons: usize,
    /// Shared bin edges; empty when they could not be built.
    pub bin_edges: Vec<f64>,
    pub levels: Vec<LevelReport>,
}

impl SweepReport {
    pub fn from_results(
        config: &SweepConfig,
        loaded: &LoadedData,
        category: RecoCategory,
        partition: &Partition,
        results: &SweepResults,
    ) -> Self {
        let fingerprint = SweepFingerprint::new(
            &config.sweep_spec(),
            partition.signal(),
            partition.background(),
        );
        let levels = results
            .outcomes()
            .iter()
            .map(|(target, outcome)| match outcome {
                Ok(curves) => LevelReport {
                    target: *target,
                    curves: Some(curves.clone()),
                    error: None,
                },
                Err(e) => LevelReport {
                    target: *target,
                    curves: None,
                    error: Some(LevelError {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }),
                },
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            run_id: fingerprint.run_id(),
            dataset: loaded.dataset.clone(),
            category,
            config: config.clone(),
            fingerprint,
            has_synthetic: loaded.is_synthetic(),
            created_at: chrono::Local::now().naive_local(),
            signal_electrons: partition.signal().len(),
            background_electrons: partition.background().len(),
            bin_edges: results
                .binning()
                .map(|b| b.edges().to_vec())
                .unwrap_or_default(),
            levels,
        }
    }

    /// Successful levels in target order.
    pub fn curves(&self) -> impl Iterator<Item = &WorkingPointCurves> {
        self.levels.iter().filter_map(|l| l.curves.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &LevelError)> {
        self.levels
            .iter()
            .filter_map(|l| l.error.as_ref().map(|e| (l.target, e)))
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &SweepReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SweepReport to JSON")
}

/// Deserialize a `SweepReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<SweepReport> {
    let report: SweepReport =
        serde_json::from_str(json).context("failed to deserialize SweepReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per successful target level and pT bin.
///
/// Columns: target, pt_lo, pt_hi, threshold, sig_eff, bkg_eff. Bins
/// without a cut leave `threshold` empty.
pub fn export_working_points_csv(report: &SweepReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["target", "pt_lo", "pt_hi", "threshold", "sig_eff", "bkg_eff"])?;

    for c in report.curves() {
        for (i, lo) in c.bin_lows.iter().enumerate() {
            let hi = report.bin_edges.get(i + 1).copied().unwrap_or(f64::NAN);
            wtr.write_record([
                c.target.to_string(),
                format!("{lo:.4}"),
                format!("{hi:.4}"),
                c.thresholds[i].map(|t| format!("{t:.6}")).unwrap_or_default(),
                format!("{:.6}", c.signal_efficiency[i]),
                format!("{:.6}", c.background_efficiency[i]),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a sweep.
///
/// Creates a directory named `{dataset}_{category}_{timestamp}/` under
/// `output_dir` containing:
/// - `manifest.json`: the full `SweepReport`
/// - `working_points.csv`: per-bin thresholds and efficiencies
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &SweepReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}_{}",
        report.dataset,
        report.category,
        report.created_at.format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(report)?)?;
    std::fs::write(
        run_dir.join("working_points.csv"),
        export_working_points_csv(report)?,
    )?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;

    Ok(run_dir)
}

/// Load a `SweepReport` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<SweepReport> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(report: &SweepReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Working Point Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Dataset | {} |\n", report.dataset));
    md.push_str(&format!("| Identification | `{}` |\n", report.config.sweep.id));
    md.push_str(&format!("| Category | {} |\n", report.category));
    md.push_str(&format!(
        "| Signal flavors | {:?} |\n",
        report.config.truth.flavors
    ));
    md.push_str(&format!(
        "| Electrons (sig / bkg) | {} / {} |\n",
        report.signal_electrons, report.background_electrons
    ));
    md.push_str(&format!(
        "| pT bins | {} (step {}) |\n",
        report.bin_edges.len().saturating_sub(1),
        report.config.sweep.pt_step
    ));
    md.push_str(&format!("| Run ID | {} |\n", report.run_id));
    if report.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Working Points\n\n");
    md.push_str("| Target | Bins with cut | Signal eff | Background eff |\n");
    md.push_str("| ---: | ---: | ---: | ---: |\n");
    for c in report.curves() {
        let defined = c.thresholds.iter().filter(|t| t.is_some()).count();
        md.push_str(&format!(
            "| {} | {}/{} | {:.3} | {:.4} |\n",
            c.target,
            defined,
            c.thresholds.len(),
            c.signal_integrated,
            c.background_integrated
        ));
    }
    md.push('\n');

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        md.push_str("## Failed Levels\n\n");
        for (target, err) in failures {
            md.push_str(&format!("- {target}: {} ({})\n", err.message, err.kind));
        }
        md.push('\n');
    }

    md
}
