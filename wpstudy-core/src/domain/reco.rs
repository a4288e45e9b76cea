//! Reconstruction category split (low-pT vs particle-flow electrons).

use crate::domain::electron::ElectronTable;
use crate::error::WpResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoCategory {
    /// `Electron_isLowPt == true`
    LowPt,
    /// `Electron_isPF == true`
    Pf,
    /// No selection.
    All,
}

impl RecoCategory {
    pub fn select(self, table: &ElectronTable) -> WpResult<ElectronTable> {
        match self {
            Self::LowPt => table.select(table.is_low_pt()?),
            Self::Pf => table.select(table.is_pf()?),
            Self::All => Ok(table.clone()),
        }
    }
}

impl fmt::Display for RecoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LowPt => "lowpt",
            Self::Pf => "pf",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

/// Split one table into (low-pT, PF) subsets. An electron flagged as both
/// appears in both.
pub fn split_lowpt_pf(table: &ElectronTable) -> WpResult<(ElectronTable, ElectronTable)> {
    Ok((
        RecoCategory::LowPt.select(table)?,
        RecoCategory::Pf.select(table)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uses_reco_flags() {
        let table = ElectronTable::new(vec![1.0, 2.0, 3.0])
            .with_is_low_pt(vec![true, false, true])
            .unwrap()
            .with_is_pf(vec![false, true, true])
            .unwrap();
        let (low, pf) = split_lowpt_pf(&table).unwrap();
        assert_eq!(low.pt(), &[1.0, 3.0]);
        assert_eq!(pf.pt(), &[2.0, 3.0]);
    }

    #[test]
    fn missing_flag_fails() {
        let table = ElectronTable::new(vec![1.0]);
        assert!(RecoCategory::Pf.select(&table).is_err());
        assert_eq!(RecoCategory::All.select(&table).unwrap().len(), 1);
    }
}
