//! Store → load → sweep → export, end to end on synthetic electrons.

use std::path::PathBuf;

use wpstudy_core::synthetic::{generate, SyntheticSpec};
use wpstudy_core::{ElectronTable, RecoCategory};
use wpstudy_runner::config::SweepConfig;
use wpstudy_runner::data_loader::{DataSource, LoadOptions, LoadedData};
use wpstudy_runner::export::{export_working_points_csv, load_artifacts, save_artifacts};
use wpstudy_runner::ntuple::IngestedSample;
use wpstudy_runner::runner::{run_sweep, run_sweep_from_data};
use wpstudy_runner::store::DatasetStore;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn sample(mass_point: &str, seed: u64, n: usize, events: u64) -> IngestedSample {
    let table = generate(&SyntheticSpec {
        n_electrons: n,
        signal_fraction: 0.4,
        seed,
    })
    .unwrap();
    IngestedSample {
        dataset: "HAHM".into(),
        mass_point: mass_point.into(),
        table,
        total_entries: events,
        files_read: 1,
        files_skipped: 0,
    }
}

#[test]
fn stored_mass_points_are_swept_together() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("store"));
    let m5 = sample("M5", 1, 3_000, 1_000);
    let m10 = sample("M10", 2, 2_000, 700);
    store.write(&m5).unwrap();
    store.write(&m10).unwrap();

    let meta = store.get_meta("HAHM").unwrap();
    assert_eq!(meta.total_entries(), 1_700);
    assert_eq!(meta.electrons(), 5_000);

    let config = SweepConfig::from_file(&fixture("sweep_lowpt.toml")).unwrap();
    let from_store = run_sweep(&config, &store, "HAHM", &LoadOptions::default(), true).unwrap();
    assert_eq!(from_store.category, RecoCategory::LowPt);
    assert!(!from_store.report.has_synthetic);
    assert!(from_store.results.all_succeeded());

    // Same electrons held in memory give the same working points.
    let table = ElectronTable::concat(&[&m5.table, &m10.table]);
    let loaded = LoadedData {
        dataset: "HAHM".into(),
        dataset_hash: wpstudy_core::dataset_hash(&table),
        table,
        total_entries: 1_700,
        source: DataSource::Store,
    };
    let in_memory = run_sweep_from_data(&config, &loaded, false).unwrap();
    assert_eq!(from_store.results, in_memory.results);
}

#[test]
fn signal_efficiency_tracks_target() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    store.write(&sample("M5", 7, 20_000, 5_000)).unwrap();

    let config = SweepConfig::from_file(&fixture("sweep_lowpt.toml")).unwrap();
    let run = run_sweep(&config, &store, "HAHM", &LoadOptions::default(), true).unwrap();

    let integrated: Vec<(u32, f64)> = run
        .results
        .curves()
        .map(|c| (c.target, c.signal_integrated))
        .collect();
    for (target, eff) in &integrated {
        let expected = *target as f64 / 100.0;
        assert!(
            (eff - expected).abs() < 0.05,
            "target {target}: signal efficiency {eff}"
        );
    }
    for pair in integrated.windows(2) {
        assert!(pair[1].1 >= pair[0].1);
    }
    for c in run.results.curves() {
        assert!(c.background_integrated < c.signal_integrated);
    }
}

#[test]
fn artifacts_roundtrip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("store"));
    store.write(&sample("M5", 3, 4_000, 1_000)).unwrap();

    let config = SweepConfig::from_file(&fixture("sweep_lowpt.toml")).unwrap();
    let run = run_sweep(&config, &store, "HAHM", &LoadOptions::default(), false).unwrap();

    let run_dir = save_artifacts(&run.report, &dir.path().join("results")).unwrap();
    assert!(run_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("HAHM_lowpt_"));
    for f in ["manifest.json", "working_points.csv", "report.md"] {
        assert!(run_dir.join(f).exists(), "{f} missing");
    }

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.run_id, run.report.run_id);
    assert_eq!(loaded.levels.len(), 5);

    let csv = export_working_points_csv(&loaded).unwrap();
    let n_bins = loaded.bin_edges.len() - 1;
    assert_eq!(csv.lines().count(), 1 + 5 * n_bins);
}

#[test]
fn unknown_dataset_without_synthetic_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = DatasetStore::new(dir.path());
    let config = SweepConfig::from_file(&fixture("sweep_lowpt.toml")).unwrap();
    assert!(run_sweep(&config, &store, "DY", &LoadOptions::default(), true).is_err());
}
