//! Identification-score variants.
//!
//! The set is an explicit allow-list of NanoAOD branch names. Anything else
//! is rejected with `WpError::InvalidId` rather than looked up free-form.

use crate::domain::reco::RecoCategory;
use crate::error::WpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdVariant {
    /// PF electron MVA retrained on J/psi -> ee.
    #[serde(rename = "Electron_PFEleMvaID_Run3CustomJpsitoEEValue")]
    PfRun3CustomJpsiToEe,
    /// Official PF electron MVA, Winter22 non-isolated training.
    #[serde(rename = "Electron_PFEleMvaID_Winter22NoIsoV1Value")]
    PfWinter22NoIsoV1,
    /// Low-pT electron BDT. Unbounded output.
    #[serde(rename = "Electron_lowPtID_10Jun2025")]
    LowPt10Jun2025,
}

impl IdVariant {
    pub const ALL: [IdVariant; 3] = [
        IdVariant::PfRun3CustomJpsiToEe,
        IdVariant::PfWinter22NoIsoV1,
        IdVariant::LowPt10Jun2025,
    ];

    /// NanoAOD branch name holding this score.
    pub fn branch(self) -> &'static str {
        match self {
            Self::PfRun3CustomJpsiToEe => "Electron_PFEleMvaID_Run3CustomJpsitoEEValue",
            Self::PfWinter22NoIsoV1 => "Electron_PFEleMvaID_Winter22NoIsoV1Value",
            Self::LowPt10Jun2025 => "Electron_lowPtID_10Jun2025",
        }
    }

    /// Reconstruction category the score is trained for.
    pub fn natural_category(self) -> RecoCategory {
        match self {
            Self::PfRun3CustomJpsiToEe | Self::PfWinter22NoIsoV1 => RecoCategory::Pf,
            Self::LowPt10Jun2025 => RecoCategory::LowPt,
        }
    }

    /// Whether the score is bounded to [-1, 1].
    pub fn is_bounded(self) -> bool {
        !matches!(self, Self::LowPt10Jun2025)
    }
}

impl FromStr for IdVariant {
    type Err = WpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.branch() == s)
            .ok_or_else(|| WpError::InvalidId { name: s.to_string() })
    }
}

impl fmt::Display for IdVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.branch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_allowed_branch() {
        for v in IdVariant::ALL {
            assert_eq!(v.branch().parse::<IdVariant>().unwrap(), v);
        }
    }

    #[test]
    fn rejects_unknown_branch() {
        let err = "Electron_mvaIso".parse::<IdVariant>().unwrap_err();
        assert_eq!(
            err,
            WpError::InvalidId {
                name: "Electron_mvaIso".into()
            }
        );
    }

    #[test]
    fn pf_variants_use_pf_electrons() {
        assert_eq!(
            IdVariant::PfWinter22NoIsoV1.natural_category(),
            RecoCategory::Pf
        );
        assert_eq!(
            IdVariant::LowPt10Jun2025.natural_category(),
            RecoCategory::LowPt
        );
        assert!(!IdVariant::LowPt10Jun2025.is_bounded());
    }

    #[test]
    fn serde_uses_branch_names() {
        let json = serde_json::to_string(&IdVariant::LowPt10Jun2025).unwrap();
        assert_eq!(json, "\"Electron_lowPtID_10Jun2025\"");
    }
}
