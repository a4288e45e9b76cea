//! SVG plots for working points and diagnostic distributions.
//!
//! Every plot writes one file. Chart geometry is shared: 900x540 canvas,
//! 20pt caption, 45/60 label areas. Working points are colored along a
//! dark-blue to yellow gradient ordered by target.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use wpstudy_core::domain::electron::{ETA_BRANCH, PHI_BRANCH, PT_BRANCH};
use wpstudy_core::histogram::{mean, FlavorBreakdown, Histogram};
use wpstudy_core::{IdVariant, Partition, PtBinning, WorkingPointCurves};

const SIZE: (u32, u32) = (900, 540);
const KINEMATIC_BINS: usize = 49;
const SCORE_BINS: usize = 50;

/// NanoAOD fill value for electrons an ID was not evaluated on.
pub const SCORE_SENTINEL: f64 = -999.0;

const GRADIENT_START: (f64, f64, f64) = (0.0, 32.0, 77.0);
const GRADIENT_END: (f64, f64, f64) = (253.0, 231.0, 55.0);

const SIGNAL_COLOR: RGBColor = RGBColor(230, 140, 0);
const BACKGROUND_COLOR: RGBColor = RGBColor(31, 90, 180);

/// Color of the `index`-th of `count` working points.
pub fn wp_color(index: usize, count: usize) -> RGBColor {
    let t = if count <= 1 {
        0.0
    } else {
        index.min(count - 1) as f64 / (count - 1) as f64
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(
        lerp(GRADIENT_START.0, GRADIENT_END.0),
        lerp(GRADIENT_START.1, GRADIENT_END.1),
        lerp(GRADIENT_START.2, GRADIENT_END.2),
    )
}

/// Points drawable on a log axis: bins without a cut and non-positive
/// cuts are dropped.
pub fn log_points(bin_lows: &[f64], thresholds: &[Option<f64>]) -> Vec<(f64, f64)> {
    bin_lows
        .iter()
        .zip(thresholds)
        .filter_map(|(x, t)| t.filter(|v| *v > 0.0 && v.is_finite()).map(|v| (*x, v)))
        .collect()
}

/// Log-axis y range padded by half a decade on either side.
pub fn log_range(values: &[f64]) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .iter()
        .filter(|v| **v > 0.0 && v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !lo.is_finite() {
        return None;
    }
    Some((lo / 10f64.sqrt(), hi * 10f64.sqrt()))
}

/// Outline of a histogram as a step line.
pub fn step_points(hist: &Histogram) -> Vec<(f64, f64)> {
    let edges = hist.edges();
    let mut pts = Vec::with_capacity(hist.counts().len() * 2 + 2);
    pts.push((edges[0], 0.0));
    for (i, c) in hist.counts().iter().enumerate() {
        pts.push((edges[i], *c as f64));
        pts.push((edges[i + 1], *c as f64));
    }
    pts.push((edges[edges.len() - 1], 0.0));
    pts
}

/// Legend entry carrying the stats box text.
pub fn stats_label(name: &str, values: &[f64]) -> String {
    match mean(values) {
        Some(m) => format!("{name}: {} ele, avg {m:.2}", values.len()),
        None => format!("{name}: {} ele", values.len()),
    }
}

/// Visible range of an identification score histogram.
pub fn score_range(id: IdVariant) -> (f64, f64) {
    if id.is_bounded() {
        (-1.0, 1.0)
    } else {
        (-10.0, 15.0)
    }
}

fn x_extent(binning: &PtBinning) -> Result<(f64, f64)> {
    let edges = binning.edges();
    match (edges.first(), edges.last()) {
        (Some(lo), Some(hi)) if hi > lo => Ok((*lo, *hi)),
        _ => bail!("binning has no bins to plot"),
    }
}

// ─── Working-point curves ───────────────────────────────────────────

/// Threshold versus pT bin per working point, log-scaled y.
pub fn plot_cut_curves(
    curves: &[WorkingPointCurves],
    binning: &PtBinning,
    id: &str,
    path: &Path,
) -> Result<()> {
    let series: Vec<(u32, Vec<(f64, f64)>)> = curves
        .iter()
        .map(|c| (c.target, log_points(&c.bin_lows, &c.thresholds)))
        .collect();
    let ys: Vec<f64> = series.iter().flat_map(|(_, p)| p.iter().map(|q| q.1)).collect();
    let Some((y_lo, y_hi)) = log_range(&ys) else {
        bail!("no positive thresholds to plot for {id}");
    };
    let (x_lo, x_hi) = x_extent(binning)?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{id} cut per pT bin"), ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, (y_lo..y_hi).log_scale())?;
    chart
        .configure_mesh()
        .x_desc("pT bin low edge (GeV)")
        .y_desc("Score threshold")
        .draw()?;

    let n = series.len();
    for (i, (target, pts)) in series.into_iter().enumerate() {
        let color = wp_color(i, n);
        chart
            .draw_series(LineSeries::new(pts.clone(), color.stroke_width(2)))?
            .label(format!("WP{target}"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        chart.draw_series(pts.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
    }
    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfficiencyKind {
    Signal,
    Background,
}

impl EfficiencyKind {
    fn label(self) -> &'static str {
        match self {
            Self::Signal => "Signal",
            Self::Background => "Background",
        }
    }
}

/// Efficiency versus pT bin center per working point, y in [0, 1].
pub fn plot_efficiency(
    curves: &[WorkingPointCurves],
    binning: &PtBinning,
    kind: EfficiencyKind,
    id: &str,
    path: &Path,
) -> Result<()> {
    let (x_lo, x_hi) = x_extent(binning)?;
    let centers = binning.centers();

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} efficiency: {id}", kind.label()),
            ("sans-serif", 20).into_font(),
        )
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, 0f64..1.05f64)?;
    chart
        .configure_mesh()
        .x_desc("pT (GeV)")
        .y_desc(format!("{} efficiency", kind.label()))
        .draw()?;

    let n = curves.len();
    for (i, c) in curves.iter().enumerate() {
        let color = wp_color(i, n);
        let effs = match kind {
            EfficiencyKind::Signal => &c.signal_efficiency,
            EfficiencyKind::Background => &c.background_efficiency,
        };
        let pts: Vec<(f64, f64)> = centers.iter().copied().zip(effs.iter().copied()).collect();
        chart
            .draw_series(LineSeries::new(pts.clone(), color.stroke_width(2)))?
            .label(format!("WP{}", c.target))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        chart.draw_series(pts.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
    }
    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}

/// Cut, signal efficiency and background efficiency plots for one sweep.
pub fn plot_sweep(
    curves: &[WorkingPointCurves],
    binning: &PtBinning,
    id: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create plot dir: {}", dir.display()))?;
    let cut = dir.join(format!("{id}_cuts.svg"));
    let sig = dir.join(format!("{id}_sig_eff.svg"));
    let bkg = dir.join(format!("{id}_bkg_eff.svg"));

    plot_cut_curves(curves, binning, id, &cut)?;
    plot_efficiency(curves, binning, EfficiencyKind::Signal, id, &sig)?;
    plot_efficiency(curves, binning, EfficiencyKind::Background, id, &bkg)?;
    tracing::info!(dir = %dir.display(), id, "sweep plots written");
    Ok(vec![cut, sig, bkg])
}

// ─── Distributions ──────────────────────────────────────────────────

fn draw_step_histograms(
    path: &Path,
    caption: &str,
    x_desc: &str,
    x_range: (f64, f64),
    layers: &[(&Histogram, String, RGBColor)],
    sentinel_width: Option<f64>,
) -> Result<()> {
    let y_max = layers
        .iter()
        .map(|(h, _, _)| h.max_count())
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.15;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, 0f64..y_max)?;
    chart.configure_mesh().x_desc(x_desc).y_desc("Count").draw()?;

    for (hist, label, color) in layers {
        let color = *color;
        chart
            .draw_series(LineSeries::new(step_points(hist), color.stroke_width(2)))?
            .label(label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        if let Some(w) = sentinel_width {
            let x0 = hist.hi();
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x0, 0.0), (x0 + w, hist.sentinel_count() as f64)],
                color.mix(0.5).filled(),
            )))?;
        }
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Signal versus background distribution of one kinematic variable.
pub fn plot_kinematic(
    var: &str,
    signal: &[f64],
    background: &[f64],
    range: (f64, f64),
    dataset: &str,
    path: &Path,
) -> Result<()> {
    let mut sig = Histogram::new(range.0, range.1, KINEMATIC_BINS)?;
    sig.fill_all(signal);
    let mut bkg = Histogram::new(range.0, range.1, KINEMATIC_BINS)?;
    bkg.fill_all(background);

    draw_step_histograms(
        path,
        &format!("{var} distribution: {dataset}"),
        var,
        range,
        &[
            (&sig, stats_label("Signal", signal), SIGNAL_COLOR),
            (&bkg, stats_label("Background", background), BACKGROUND_COLOR),
        ],
        None,
    )
}

/// Signal versus background score distribution, with the sentinel count
/// drawn as an extra bar past the upper edge.
pub fn plot_score(
    id: IdVariant,
    signal: &[f64],
    background: &[f64],
    dataset: &str,
    path: &Path,
) -> Result<()> {
    let (lo, hi) = score_range(id);
    let mut sig = Histogram::new(lo, hi, SCORE_BINS)?.with_sentinel(SCORE_SENTINEL);
    sig.fill_all(signal);
    let mut bkg = Histogram::new(lo, hi, SCORE_BINS)?.with_sentinel(SCORE_SENTINEL);
    bkg.fill_all(background);
    let w = sig.bin_width();

    draw_step_histograms(
        path,
        &format!("{} distribution: {dataset}", id.branch()),
        &format!("{} (last bar: unset)", id.branch()),
        (lo, hi + 2.0 * w),
        &[
            (&sig, format!("Signal ({} unset)", sig.sentinel_count()), SIGNAL_COLOR),
            (&bkg, format!("Background ({} unset)", bkg.sentinel_count()), BACKGROUND_COLOR),
        ],
        Some(w),
    )
}

/// pT of electrons with one flavor code against every other flavor.
pub fn plot_flavor_counts(
    breakdown: &FlavorBreakdown,
    flavor: i32,
    total_entries: u64,
    dataset: &str,
    path: &Path,
) -> Result<()> {
    let range = (0.0, 15.0);
    let (selected, rest) = breakdown.split(flavor);
    let mut sel = Histogram::new(range.0, range.1, KINEMATIC_BINS)?;
    sel.fill_all(&selected);
    let mut other = Histogram::new(range.0, range.1, KINEMATIC_BINS)?;
    other.fill_all(&rest);

    draw_step_histograms(
        path,
        &format!("Electron pT, genPartFlav {flavor}: {dataset} ({total_entries} events)"),
        "Electron_pt (GeV)",
        range,
        &[
            (&sel, format!("genPartFlav = {flavor}: {}", selected.len()), SIGNAL_COLOR),
            (&other, format!("other flavors: {}", rest.len()), BACKGROUND_COLOR),
        ],
        None,
    )
}

/// Kinematic and score distributions for a labeled dataset.
///
/// Variables missing from the table are skipped with a warning.
pub fn plot_distributions(partition: &Partition, dataset: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create plot dir: {}", dir.display()))?;
    let (sig, bkg) = (partition.signal(), partition.background());
    let mut written = Vec::new();

    let kinematics: [(&str, (f64, f64)); 3] = [
        (PT_BRANCH, (0.0, 20.0)),
        (ETA_BRANCH, (-3.0, 3.0)),
        (PHI_BRANCH, (-3.0, 3.0)),
    ];
    for (var, range) in kinematics {
        match (sig.float_column(var), bkg.float_column(var)) {
            (Ok(s), Ok(b)) => {
                let path = dir.join(format!("{var}.svg"));
                plot_kinematic(var, s, b, range, dataset, &path)?;
                written.push(path);
            }
            (Err(e), _) | (_, Err(e)) => tracing::warn!(var, error = %e, "skipping kinematic plot"),
        }
    }

    for id in IdVariant::ALL {
        match (sig.score(id), bkg.score(id)) {
            (Ok(s), Ok(b)) => {
                let path = dir.join(format!("{}.svg", id.branch()));
                plot_score(id, s, b, dataset, &path)?;
                written.push(path);
            }
            (Err(e), _) | (_, Err(e)) => tracing::warn!(id = id.branch(), error = %e, "skipping score plot"),
        }
    }

    tracing::info!(dir = %dir.display(), plots = written.len(), "distribution plots written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_runs_dark_to_light() {
        let first = wp_color(0, 9);
        let last = wp_color(8, 9);
        assert_eq!((first.0, first.1, first.2), (0, 32, 77));
        assert_eq!((last.0, last.1, last.2), (253, 231, 55));
        let single = wp_color(0, 1);
        assert_eq!(single.0, 0);
    }

    #[test]
    fn log_points_drop_missing_and_non_positive() {
        let pts = log_points(
            &[1.0, 1.2, 1.4, 1.6],
            &[Some(0.5), None, Some(-0.1), Some(0.0)],
        );
        assert_eq!(pts, vec![(1.0, 0.5)]);
    }

    #[test]
    fn log_range_pads_around_data() {
        let (lo, hi) = log_range(&[0.1, 1.0, -3.0]).unwrap();
        assert!(lo < 0.1 && lo > 0.0);
        assert!(hi > 1.0);
        assert!(log_range(&[-1.0, 0.0]).is_none());
    }

    #[test]
    fn step_outline_closes_at_zero() {
        let mut h = Histogram::new(0.0, 2.0, 2).unwrap();
        h.fill_all(&[0.5, 1.5, 1.6]);
        let pts = step_points(&h);
        assert_eq!(pts.first(), Some(&(0.0, 0.0)));
        assert_eq!(pts.last(), Some(&(2.0, 0.0)));
        assert!(pts.contains(&(1.0, 2.0)));
    }

    #[test]
    fn stats_label_reports_count_and_mean() {
        assert_eq!(stats_label("Signal", &[1.0, 3.0]), "Signal: 2 ele, avg 2.00");
        assert_eq!(stats_label("Background", &[]), "Background: 0 ele");
    }

    #[test]
    fn unbounded_score_gets_wide_range() {
        assert_eq!(score_range(IdVariant::PfWinter22NoIsoV1), (-1.0, 1.0));
        let (lo, hi) = score_range(IdVariant::LowPt10Jun2025);
        assert!(lo < -1.0 && hi > 1.0);
    }

    #[test]
    fn empty_binning_is_rejected() {
        let b = PtBinning::from_edges(vec![10.0]);
        assert!(x_extent(&b).is_err());
    }
}
