//! Fixed-width histograms and per-flavor electron breakdowns for the
//! diagnostic plots.

use crate::domain::electron::ElectronTable;
use crate::error::{WpError, WpResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-width histogram over `[lo, hi)`.
///
/// Values equal to the optional sentinel are counted separately (ID scores
/// use a sentinel for electrons the ID was not evaluated on) and excluded
/// from the mean. Non-finite values are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    lo: f64,
    hi: f64,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    sentinel: Option<f64>,
    sentinel_count: u64,
    sum: f64,
    entries: u64,
}

impl Histogram {
    pub fn new(lo: f64, hi: f64, n_bins: usize) -> WpResult<Self> {
        if n_bins == 0 {
            return Err(WpError::InvalidRange {
                what: "histogram needs at least one bin".into(),
            });
        }
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(WpError::InvalidRange {
                what: format!("histogram range [{lo}, {hi}) is empty or not finite"),
            });
        }
        Ok(Self {
            lo,
            hi,
            counts: vec![0; n_bins],
            underflow: 0,
            overflow: 0,
            sentinel: None,
            sentinel_count: 0,
            sum: 0.0,
            entries: 0,
        })
    }

    pub fn with_sentinel(mut self, value: f64) -> Self {
        self.sentinel = Some(value);
        self
    }

    pub fn fill(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        if self.sentinel == Some(x) {
            self.sentinel_count += 1;
            return;
        }
        self.entries += 1;
        self.sum += x;
        if x < self.lo {
            self.underflow += 1;
        } else if x >= self.hi {
            self.overflow += 1;
        } else {
            let i = ((x - self.lo) / self.bin_width()) as usize;
            let i = i.min(self.counts.len() - 1);
            self.counts[i] += 1;
        }
    }

    pub fn fill_all(&mut self, xs: &[f64]) {
        for x in xs {
            self.fill(*x);
        }
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.counts.len() as f64
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn edges(&self) -> Vec<f64> {
        (0..=self.counts.len())
            .map(|i| self.lo + i as f64 * self.bin_width())
            .collect()
    }

    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    pub fn sentinel_count(&self) -> u64 {
        self.sentinel_count
    }

    /// Entries excluding sentinel values (includes under/overflow).
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn mean(&self) -> Option<f64> {
        (self.entries > 0).then(|| self.sum / self.entries as f64)
    }

    pub fn max_count(&self) -> u64 {
        self.counts
            .iter()
            .copied()
            .chain(std::iter::once(self.sentinel_count))
            .max()
            .unwrap_or(0)
    }
}

/// Electron pT values grouped by generator flavor code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavorBreakdown {
    pt_by_flavor: BTreeMap<i32, Vec<f64>>,
}

impl FlavorBreakdown {
    pub fn from_table(table: &ElectronTable) -> WpResult<Self> {
        let mut pt_by_flavor: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for (pt, flav) in table.pt().iter().zip(table.gen_part_flav()?) {
            pt_by_flavor.entry(*flav).or_default().push(*pt);
        }
        Ok(Self { pt_by_flavor })
    }

    pub fn merge(&mut self, other: FlavorBreakdown) {
        for (flav, pts) in other.pt_by_flavor {
            self.pt_by_flavor.entry(flav).or_default().extend(pts);
        }
    }

    pub fn flavors(&self) -> impl Iterator<Item = i32> + '_ {
        self.pt_by_flavor.keys().copied()
    }

    pub fn count(&self, flavor: i32) -> usize {
        self.pt_by_flavor.get(&flavor).map_or(0, |v| v.len())
    }

    pub fn total(&self) -> usize {
        self.pt_by_flavor.values().map(|v| v.len()).sum()
    }

    /// pT of the chosen flavor and pT of every other flavor.
    pub fn split(&self, flavor: i32) -> (Vec<f64>, Vec<f64>) {
        let selected = self.pt_by_flavor.get(&flavor).cloned().unwrap_or_default();
        let rest = self
            .pt_by_flavor
            .iter()
            .filter(|(f, _)| **f != flavor)
            .flat_map(|(_, v)| v.iter().copied())
            .collect();
        (selected, rest)
    }
}

/// Arithmetic mean of finite values.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_bins_and_overflow() {
        let mut h = Histogram::new(0.0, 10.0, 5).unwrap();
        h.fill_all(&[-1.0, 0.0, 1.9, 2.0, 9.99, 10.0, f64::NAN]);
        assert_eq!(h.counts(), &[2, 1, 0, 0, 1]);
        assert_eq!(h.underflow(), 1);
        assert_eq!(h.overflow(), 1);
        assert_eq!(h.entries(), 6);
    }

    #[test]
    fn sentinel_is_counted_apart() {
        let mut h = Histogram::new(-1.0, 1.0, 4).unwrap().with_sentinel(-999.0);
        h.fill_all(&[-999.0, -999.0, 0.5]);
        assert_eq!(h.sentinel_count(), 2);
        assert_eq!(h.entries(), 1);
        assert_eq!(h.mean(), Some(0.5));
        assert_eq!(h.max_count(), 2);
    }

    #[test]
    fn rejects_degenerate_range() {
        for (lo, hi, n) in [(1.0, 1.0, 10), (0.0, 1.0, 0), (0.0, f64::INFINITY, 10)] {
            assert!(matches!(
                Histogram::new(lo, hi, n),
                Err(WpError::InvalidRange { .. })
            ));
        }
    }

    #[test]
    fn edges_span_range() {
        let h = Histogram::new(0.0, 15.0, 3).unwrap();
        assert_eq!(h.edges(), vec![0.0, 5.0, 10.0, 15.0]);
    }

    #[test]
    fn flavor_breakdown_splits_one_against_rest() {
        let table = ElectronTable::new(vec![1.0, 2.0, 3.0, 4.0])
            .with_gen_part_flav(vec![0, 1, 0, 22])
            .unwrap();
        let fb = FlavorBreakdown::from_table(&table).unwrap();
        assert_eq!(fb.count(0), 2);
        assert_eq!(fb.total(), 4);
        let (sel, rest) = fb.split(0);
        assert_eq!(sel, vec![1.0, 3.0]);
        assert_eq!(rest, vec![2.0, 4.0]);
    }

    #[test]
    fn mean_skips_non_finite() {
        assert_eq!(mean(&[1.0, 3.0, f64::NAN]), Some(2.0));
        assert_eq!(mean(&[]), None);
    }
}
