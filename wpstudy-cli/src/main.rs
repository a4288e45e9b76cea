//! wpstudy CLI: electron ID working points, from NTuples to plots.
//!
//! Commands:
//! - `ingest`: read ROOT NTuples listed in a sample manifest into the Parquet store
//! - `derive`: sweep working points for one dataset and save artifacts
//! - `plot-kinematics`: signal vs background kinematic and ID score plots
//! - `count`: electron counts per generator flavor, with a pT plot for one flavor
//! - `lumi`: run brilcalc per era and check the CSV sums
//! - `crab`: build, render and submit CRAB NanoAOD production tasks

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use wpstudy_core::histogram::FlavorBreakdown;
use wpstudy_core::SignalDefinition;
use wpstudy_runner::crab::{build_tasks, submit_tasks, write_configs, CrabOptions, CrabSamples, Mode};
use wpstudy_runner::lumi::{run_jobs, LumiConfig, DEFAULT_NORMTAG};
use wpstudy_runner::plots::{plot_distributions, plot_flavor_counts, plot_sweep};
use wpstudy_runner::{
    ingest_manifest, load_dataset, run_sweep, save_artifacts, DatasetStore, LoadOptions,
    RetryPolicy, SampleManifest, SweepConfig, SweepRun,
};

#[derive(Parser)]
#[command(
    name = "wpstudy",
    about = "wpstudy CLI: electron identification working points",
    version
)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read ROOT NTuples listed in a sample manifest into the Parquet store.
    Ingest {
        /// YAML manifest: dataset -> mass point -> NTuple directories.
        #[arg(long)]
        samples: PathBuf,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        store: PathBuf,
    },
    /// Sweep working points for one dataset and save the artifact set.
    Derive {
        /// Path to a TOML sweep config.
        #[arg(long)]
        config: PathBuf,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        store: PathBuf,

        /// Dataset name as ingested.
        #[arg(long)]
        dataset: String,

        /// Use a synthetic sample when the dataset is not stored.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Evaluate target levels one after another.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory. Overrides `[output].dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Signal vs background kinematic and ID score distributions.
    PlotKinematics {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        store: PathBuf,

        /// Dataset name as ingested.
        #[arg(long)]
        dataset: String,

        /// Use a synthetic sample when the dataset is not stored.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Count tau-decay electrons (flavor 15) as signal instead of b (5).
        #[arg(long, default_value_t = false)]
        with_tau: bool,

        /// Plot directory.
        #[arg(long, default_value = "plots")]
        output_dir: PathBuf,
    },
    /// Electron counts per generator flavor, with a pT plot for one flavor.
    Count {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        store: PathBuf,

        /// Dataset name as ingested.
        #[arg(long)]
        dataset: String,

        /// genPartFlav code to compare against all others.
        #[arg(long, allow_hyphen_values = true)]
        flavor: i32,

        /// Use a synthetic sample when the dataset is not stored.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Plot directory.
        #[arg(long, default_value = "plots")]
        output_dir: PathBuf,
    },
    /// Run brilcalc for every era in a run-range file and check the sums.
    Lumi {
        /// YAML run ranges: year -> {Lumi, era: {name: [start, end]}}.
        #[arg(long)]
        config: PathBuf,

        /// Directory for the per-era CSV files.
        #[arg(long, default_value = "lumi_outputs")]
        output_dir: PathBuf,

        /// brilcalc normtag.
        #[arg(long, default_value = DEFAULT_NORMTAG)]
        normtag: String,
    },
    /// Build, render and submit CRAB NanoAOD production tasks.
    Crab {
        /// YAML sample file with `common` and `samples` sections.
        #[arg(long)]
        samples: PathBuf,

        /// Glob on sample names.
        #[arg(long, default_value = "*")]
        filter: String,

        /// LHC run: 2 or 3.
        #[arg(long, default_value_t = 3)]
        lhc_run: u8,

        /// Data-taking year.
        #[arg(long, default_value_t = 2023)]
        year: u32,

        /// reco (skim), eff (no selection), trg or vbf.
        #[arg(long, default_value = "reco")]
        mode: String,

        /// Keep the full NanoAOD content.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        save_all_nano: bool,

        /// Add electron regression variables.
        #[arg(long, default_value_t = false)]
        save_regression_vars: bool,

        /// Where rendered CRAB configs are written.
        #[arg(long, default_value = "crab_configs")]
        config_dir: PathBuf,

        /// Render configs without submitting.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Submit without asking for confirmation.
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ingest { samples, store } => run_ingest(&samples, &store),
        Commands::Derive {
            config,
            store,
            dataset,
            synthetic,
            sequential,
            output_dir,
        } => run_derive(&config, &store, &dataset, synthetic, !sequential, output_dir),
        Commands::PlotKinematics {
            store,
            dataset,
            synthetic,
            with_tau,
            output_dir,
        } => run_plot_kinematics(&store, &dataset, synthetic, with_tau, &output_dir),
        Commands::Count {
            store,
            dataset,
            flavor,
            synthetic,
            output_dir,
        } => run_count(&store, &dataset, flavor, synthetic, &output_dir),
        Commands::Lumi {
            config,
            output_dir,
            normtag,
        } => run_lumi(&config, &output_dir, &normtag),
        Commands::Crab {
            samples,
            filter,
            lhc_run,
            year,
            mode,
            save_all_nano,
            save_regression_vars,
            config_dir,
            dry_run,
            yes,
        } => {
            let opts = CrabOptions {
                filter,
                lhc_run,
                year,
                mode: mode.parse::<Mode>()?,
                save_all_nano,
                save_regression_vars,
                ..CrabOptions::default()
            };
            run_crab(&samples, &opts, &config_dir, dry_run, yes)
        }
    }
}

fn load_options(synthetic: bool) -> LoadOptions {
    LoadOptions {
        synthetic,
        ..LoadOptions::default()
    }
}

fn run_ingest(samples: &Path, store_dir: &Path) -> Result<()> {
    let manifest = SampleManifest::from_file(samples)?;
    if manifest.is_empty() {
        bail!("sample manifest {} lists no datasets", samples.display());
    }
    let store = DatasetStore::new(store_dir);

    println!(
        "{:<20} {:<16} {:>8} {:>8} {:>12} {:>10}",
        "Dataset", "Mass point", "Files", "Skipped", "Events", "Electrons"
    );
    println!("{}", "-".repeat(79));

    let mut empty = 0;
    for sample in ingest_manifest(&manifest) {
        println!(
            "{:<20} {:<16} {:>8} {:>8} {:>12} {:>10}",
            sample.dataset,
            sample.mass_point,
            sample.files_read,
            sample.files_skipped,
            sample.total_entries,
            sample.table.len()
        );
        if sample.table.is_empty() {
            empty += 1;
            continue;
        }
        store.write(&sample)?;
    }

    println!();
    println!("Store: {}", store.root().display());
    if empty > 0 {
        eprintln!("{empty} mass point(s) produced no electrons and were not stored");
    }
    Ok(())
}

fn run_derive(
    config_path: &Path,
    store_dir: &Path,
    dataset: &str,
    synthetic: bool,
    parallel: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = SweepConfig::from_file(config_path)?;
    let store = DatasetStore::new(store_dir);

    let run = run_sweep(&config, &store, dataset, &load_options(synthetic), parallel)?;
    print_summary(&run);

    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let run_dir = save_artifacts(&run.report, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    if config.output.plots {
        let curves: Vec<_> = run.results.curves().cloned().collect();
        match run.results.binning() {
            Some(binning) if !curves.is_empty() => {
                match plot_sweep(&curves, binning, &config.sweep.id, &run_dir.join("plots")) {
                    Ok(paths) => println!("Plots: {} written", paths.len()),
                    Err(e) => eprintln!("Plotting failed: {e:#}"),
                }
            }
            _ => eprintln!("No working points to plot"),
        }
    }

    if run.results.curves().next().is_none() {
        bail!("every target level failed");
    }
    Ok(())
}

fn print_summary(run: &SweepRun) {
    let report = &run.report;
    println!();
    println!("=== Working Point Sweep ===");
    println!("Dataset:        {}", report.dataset);
    println!("ID:             {}", report.config.sweep.id);
    println!("Category:       {}", run.category);
    println!(
        "Electrons:      {} signal / {} background",
        report.signal_electrons, report.background_electrons
    );
    println!("pT bins:        {}", report.bin_edges.len().saturating_sub(1));
    println!("Run ID:         {}", &report.run_id[..12.min(report.run_id.len())]);
    println!();
    println!("{:>6} {:>10} {:>12} {:>12}", "WP", "Cut bins", "Sig eff", "Bkg eff");
    println!("{}", "-".repeat(43));
    for c in run.results.curves() {
        let defined = c.thresholds.iter().filter(|t| t.is_some()).count();
        println!(
            "{:>6} {:>10} {:>12.4} {:>12.5}",
            c.target,
            format!("{defined}/{}", c.thresholds.len()),
            c.signal_integrated,
            c.background_integrated
        );
    }
    for (target, err) in run.results.failures() {
        println!("WP{target} failed: {err}");
    }
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn run_plot_kinematics(
    store_dir: &Path,
    dataset: &str,
    synthetic: bool,
    with_tau: bool,
    output_dir: &Path,
) -> Result<()> {
    let store = DatasetStore::new(store_dir);
    let loaded = load_dataset(&store, dataset, &load_options(synthetic))?;
    let truth = if with_tau {
        SignalDefinition::with_tau()
    } else {
        SignalDefinition::default()
    };
    let partition = truth.partition(&loaded.table)?;

    let dir = output_dir.join(dataset);
    let written = plot_distributions(&partition, dataset, &dir)?;
    println!(
        "{} signal / {} background electrons",
        partition.signal().len(),
        partition.background().len()
    );
    for path in &written {
        println!("the plot was saved in {}", path.display());
    }
    Ok(())
}

fn run_count(
    store_dir: &Path,
    dataset: &str,
    flavor: i32,
    synthetic: bool,
    output_dir: &Path,
) -> Result<()> {
    let store = DatasetStore::new(store_dir);
    let loaded = load_dataset(&store, dataset, &load_options(synthetic))?;
    let breakdown = FlavorBreakdown::from_table(&loaded.table)?;

    println!("=== {dataset}: electrons per genPartFlav ===");
    println!("Events:         {}", loaded.total_entries);
    println!("Electrons:      {}", breakdown.total());
    println!();
    println!("{:>12} {:>12} {:>8}", "genPartFlav", "Electrons", "Share");
    println!("{}", "-".repeat(34));
    let total = breakdown.total().max(1) as f64;
    for f in breakdown.flavors() {
        let n = breakdown.count(f);
        println!("{:>12} {:>12} {:>7.2}%", f, n, n as f64 / total * 100.0);
    }

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{dataset}_genPartFlav{flavor}.svg"));
    plot_flavor_counts(&breakdown, flavor, loaded.total_entries, dataset, &path)?;
    println!();
    println!("the plot was saved in {}", path.display());
    Ok(())
}

fn run_lumi(config_path: &Path, output_dir: &Path, normtag: &str) -> Result<()> {
    let config = LumiConfig::from_file(config_path)?;
    let jobs = config.plan(output_dir);
    if jobs.is_empty() {
        bail!("no valid eras in {}", config_path.display());
    }

    let outcomes = run_jobs(&jobs, normtag, &RetryPolicy::default())?;

    println!();
    println!(
        "{:<6} {:<6} {:>14} {:>14} {:>10} {:<10}",
        "Year", "Era", "Sum (/fb)", "Summary (/fb)", "Rel diff", "Verdict"
    );
    println!("{}", "-".repeat(66));
    let mut failed = 0;
    for o in &outcomes {
        match &o.result {
            Ok(check) => {
                println!(
                    "{:<6} {:<6} {:>14.9} {:>14} {:>10.3e} {:<10}",
                    o.job.year,
                    o.job.era,
                    check.computed_sum,
                    check
                        .summary
                        .map(|s| format!("{s:.9}"))
                        .unwrap_or_else(|| "-".into()),
                    check.rel_diff,
                    format!("{:?}", check.verdict)
                );
                if !check.verdict.is_ok() {
                    failed += 1;
                }
            }
            Err(e) => {
                failed += 1;
                println!("{:<6} {:<6} error: {e}", o.job.year, o.job.era);
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} era(s) failed or did not match their summary");
        std::process::exit(1);
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{prompt} (y/n)");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

fn run_crab(
    samples_path: &Path,
    opts: &CrabOptions,
    config_dir: &Path,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let samples = CrabSamples::from_file(samples_path)?;
    let tasks = build_tasks(&samples, opts)?;
    if tasks.is_empty() {
        bail!("no samples match filter '{}'", opts.filter);
    }

    for task in &tasks {
        println!("submitting -- {}", task.request_name);
        println!("  dataset:   {}", task.input_dataset);
        println!("  splitting: {} ({} per job)", task.splitting, task.units_per_job);
        println!("  output:    {}/{}", task.out_lfn_dir_base, task.output_file);
    }
    println!();

    if dry_run {
        let paths = write_configs(&tasks, config_dir)?;
        println!("{} config(s) written to {}", paths.len(), config_dir.display());
        return Ok(());
    }

    if !yes && !confirm("Do you want to submit all tasks?")? {
        println!("Nothing submitted.");
        return Ok(());
    }

    let outcomes = submit_tasks(&tasks, config_dir, &RetryPolicy::default())?;
    let mut failed = 0;
    for o in &outcomes {
        match &o.result {
            Ok(_) => println!("submitted: {}", o.request_name),
            Err(e) => {
                failed += 1;
                eprintln!("Failed submitting task: {e}");
            }
        }
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_flavor_is_accepted() {
        let cli =
            Cli::try_parse_from(["wpstudy", "count", "--dataset", "DY", "--flavor", "-11"]).unwrap();
        assert!(matches!(cli.command, Commands::Count { flavor: -11, .. }));
    }
}
