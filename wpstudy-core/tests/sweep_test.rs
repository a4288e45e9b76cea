//! End-to-end working-point derivation on small hand-checked samples.

use wpstudy_core::synthetic::{generate, SyntheticSpec};
use wpstudy_core::{
    derive_cut, derive_cut_auto, efficiency, split_lowpt_pf, ElectronTable, IdVariant, PtBinning,
    RecoCategory, SignalDefinition, SweepFingerprint, SweepSpec, WorkingPointSweep, WpError,
};

const LOW_PT: &str = "Electron_lowPtID_10Jun2025";

fn ten_electrons() -> ElectronTable {
    let pt: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 / 10.0).collect();
    let scores: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
    ElectronTable::new(pt)
        .with_score(IdVariant::LowPt10Jun2025, scores)
        .unwrap()
}

#[test]
fn single_bin_ninety_percent_working_point() {
    let table = ten_electrons();
    let binning = PtBinning::from_pt(table.pt(), 1.0, 2.0).unwrap();
    assert_eq!(binning.edges(), &[1.0, 2.0]);

    let curve = derive_cut(&table, LOW_PT, 90, &binning).unwrap();
    assert_eq!(curve.bin_lows, vec![1.0]);
    let cut = curve.thresholds[0].unwrap();
    assert!((cut - 0.19).abs() < 1e-12);

    let eff = efficiency(&table, IdVariant::LowPt10Jun2025, &curve.thresholds, &binning).unwrap();
    assert!((eff[0] - 0.9).abs() < 1e-12);
}

#[test]
fn background_without_records_in_bin_has_zero_efficiency() {
    let signal = ten_electrons();
    let background = ElectronTable::new(vec![5.0, 6.0])
        .with_score(IdVariant::LowPt10Jun2025, vec![3.0, 4.0])
        .unwrap();

    let spec = SweepSpec::new(LOW_PT)
        .with_targets(vec![90])
        .with_pt_step(1.0)
        .with_pt_upper(2.0);
    let results = WorkingPointSweep::new().run(&spec, &signal, &background);
    let curves = results.get(90).unwrap().as_ref().unwrap();
    assert_eq!(curves.background_efficiency, vec![0.0]);
    assert_eq!(curves.background_integrated, 0.0);
    assert!((curves.signal_efficiency[0] - 0.9).abs() < 1e-12);
}

#[test]
fn auto_binning_matches_explicit_binning() {
    let table = ten_electrons();
    let (binning, curve) = derive_cut_auto(&table, LOW_PT, 70, 1.0, 2.0).unwrap();
    let explicit = derive_cut(&table, LOW_PT, 70, &binning).unwrap();
    assert_eq!(curve, explicit);
}

#[test]
fn unknown_identification_is_rejected() {
    let err = derive_cut_auto(&ten_electrons(), "Electron_mvaFall17V2Iso", 70, 1.0, 2.0).unwrap_err();
    assert!(matches!(err, WpError::InvalidId { .. }));
}

#[test]
fn full_pipeline_on_synthetic_sample() {
    let table = generate(&SyntheticSpec {
        n_electrons: 5_000,
        ..SyntheticSpec::default()
    })
    .unwrap();
    let (lowpt, pf) = split_lowpt_pf(&table).unwrap();
    assert_eq!(lowpt, RecoCategory::LowPt.select(&table).unwrap());

    let truth = SignalDefinition::default();
    for (category, id) in [
        (&lowpt, IdVariant::LowPt10Jun2025),
        (&pf, IdVariant::PfWinter22NoIsoV1),
    ] {
        let parts = truth.partition(category).unwrap();
        let spec = SweepSpec::new(id.branch());
        let results = WorkingPointSweep::new().run(&spec, parts.signal(), parts.background());
        assert!(results.all_succeeded());

        // A discriminating ID keeps more signal than background.
        for c in results.curves() {
            assert!(c.signal_integrated > c.background_integrated);
        }

        let fp = SweepFingerprint::new(&spec, parts.signal(), parts.background());
        assert_eq!(fp.run_id().len(), 64);
    }
}
