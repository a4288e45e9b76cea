//! Generator-level truth labeling.
//!
//! An electron is signal when its `genPartFlav` code is in the signal flavor
//! set, background otherwise. NanoAOD codes: 1 prompt electron, 5 from b,
//! 15 from tau, 22 prompt photon conversion, 0 unmatched.

use crate::domain::electron::ElectronTable;
use crate::error::WpResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default signal flavors: prompt electron, electron from b, photon conversion.
pub const SIGNAL_FLAVORS: [i32; 3] = [1, 5, 22];

/// Alternative set counting electrons from tau decays as signal.
pub const SIGNAL_FLAVORS_WITH_TAU: [i32; 3] = [1, 15, 22];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDefinition {
    flavors: BTreeSet<i32>,
}

impl Default for SignalDefinition {
    fn default() -> Self {
        Self::new(SIGNAL_FLAVORS)
    }
}

impl SignalDefinition {
    pub fn new(flavors: impl IntoIterator<Item = i32>) -> Self {
        Self {
            flavors: flavors.into_iter().collect(),
        }
    }

    pub fn with_tau() -> Self {
        Self::new(SIGNAL_FLAVORS_WITH_TAU)
    }

    pub fn flavors(&self) -> impl Iterator<Item = i32> + '_ {
        self.flavors.iter().copied()
    }

    pub fn is_signal(&self, flavor: i32) -> bool {
        self.flavors.contains(&flavor)
    }

    /// Boolean mask over a sequence of flavor codes.
    pub fn mask(&self, flavors: &[i32]) -> Vec<bool> {
        flavors.iter().map(|f| self.is_signal(*f)).collect()
    }

    /// Label every electron in the table; fails if the flavor column is absent.
    pub fn label(&self, table: &ElectronTable) -> WpResult<Vec<bool>> {
        Ok(self.mask(table.gen_part_flav()?))
    }

    pub fn partition(&self, table: &ElectronTable) -> WpResult<Partition> {
        let mask = self.label(table)?;
        let inverse: Vec<bool> = mask.iter().map(|m| !m).collect();
        Ok(Partition {
            signal: table.select(&mask)?,
            background: table.select(&inverse)?,
        })
    }
}

/// Disjoint signal/background split of one dataset. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    signal: ElectronTable,
    background: ElectronTable,
}

impl Partition {
    pub fn signal(&self) -> &ElectronTable {
        &self.signal
    }

    pub fn background(&self) -> &ElectronTable {
        &self.background
    }

    pub fn len(&self) -> usize {
        self.signal.len() + self.background.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WpError;

    #[test]
    fn default_set_is_prompt_b_and_conversion() {
        let def = SignalDefinition::default();
        assert_eq!(def.mask(&[1, 5, 22, 15, 0, 3]), vec![true, true, true, false, false, false]);
    }

    #[test]
    fn tau_set_swaps_b_for_tau() {
        let def = SignalDefinition::with_tau();
        assert!(def.is_signal(15));
        assert!(!def.is_signal(5));
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let table = ElectronTable::new(vec![1.0, 2.0, 3.0, 4.0])
            .with_gen_part_flav(vec![1, 0, 22, 3])
            .unwrap();
        let part = SignalDefinition::default().partition(&table).unwrap();
        assert_eq!(part.signal().pt(), &[1.0, 3.0]);
        assert_eq!(part.background().pt(), &[2.0, 4.0]);
        assert_eq!(part.len(), table.len());
    }

    #[test]
    fn missing_flavor_column_is_reported() {
        let table = ElectronTable::new(vec![1.0]);
        let err = SignalDefinition::default().label(&table).unwrap_err();
        assert_eq!(err, WpError::missing("Electron_genPartFlav"));
    }
}
