//! Typed per-electron columnar table.
//!
//! One row per reconstructed electron candidate. Columns other than `pt` are
//! optional because upstream NTuples do not always carry them; asking for an
//! absent column returns `WpError::MissingField` naming the NanoAOD branch.
//! Every present column is checked against `pt` length at construction time.

use crate::domain::id_variant::IdVariant;
use crate::error::{WpError, WpResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PT_BRANCH: &str = "Electron_pt";
pub const ETA_BRANCH: &str = "Electron_eta";
pub const PHI_BRANCH: &str = "Electron_phi";
pub const FLAVOR_BRANCH: &str = "Electron_genPartFlav";
pub const IS_LOW_PT_BRANCH: &str = "Electron_isLowPt";
pub const IS_PF_BRANCH: &str = "Electron_isPF";
pub const IS_PF_OVERLAP_BRANCH: &str = "Electron_isPFoverlap";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectronTable {
    pt: Vec<f64>,
    eta: Option<Vec<f64>>,
    phi: Option<Vec<f64>>,
    gen_part_flav: Option<Vec<i32>>,
    is_low_pt: Option<Vec<bool>>,
    is_pf: Option<Vec<bool>>,
    is_pf_overlap: Option<Vec<bool>>,
    scores: BTreeMap<IdVariant, Vec<f64>>,
}

fn check_len(field: &str, expected: usize, actual: usize) -> WpResult<()> {
    if expected != actual {
        return Err(WpError::LengthMismatch {
            field: field.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn pick<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter_map(|(v, keep)| keep.then_some(*v))
        .collect()
}

/// Concatenate an optional column across parts; absent in any part → absent.
fn concat_opt<T: Clone>(parts: &[&ElectronTable], get: impl Fn(&ElectronTable) -> Option<&Vec<T>>) -> Option<Vec<T>> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(get(part)?);
    }
    Some(out)
}

impl ElectronTable {
    pub fn new(pt: Vec<f64>) -> Self {
        Self {
            pt,
            ..Self::default()
        }
    }

    pub fn with_eta(mut self, eta: Vec<f64>) -> WpResult<Self> {
        check_len(ETA_BRANCH, self.pt.len(), eta.len())?;
        self.eta = Some(eta);
        Ok(self)
    }

    pub fn with_phi(mut self, phi: Vec<f64>) -> WpResult<Self> {
        check_len(PHI_BRANCH, self.pt.len(), phi.len())?;
        self.phi = Some(phi);
        Ok(self)
    }

    pub fn with_gen_part_flav(mut self, flav: Vec<i32>) -> WpResult<Self> {
        check_len(FLAVOR_BRANCH, self.pt.len(), flav.len())?;
        self.gen_part_flav = Some(flav);
        Ok(self)
    }

    pub fn with_is_low_pt(mut self, flags: Vec<bool>) -> WpResult<Self> {
        check_len(IS_LOW_PT_BRANCH, self.pt.len(), flags.len())?;
        self.is_low_pt = Some(flags);
        Ok(self)
    }

    pub fn with_is_pf(mut self, flags: Vec<bool>) -> WpResult<Self> {
        check_len(IS_PF_BRANCH, self.pt.len(), flags.len())?;
        self.is_pf = Some(flags);
        Ok(self)
    }

    pub fn with_is_pf_overlap(mut self, flags: Vec<bool>) -> WpResult<Self> {
        check_len(IS_PF_OVERLAP_BRANCH, self.pt.len(), flags.len())?;
        self.is_pf_overlap = Some(flags);
        Ok(self)
    }

    pub fn with_score(mut self, id: IdVariant, scores: Vec<f64>) -> WpResult<Self> {
        check_len(id.branch(), self.pt.len(), scores.len())?;
        self.scores.insert(id, scores);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.pt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }

    pub fn pt(&self) -> &[f64] {
        &self.pt
    }

    pub fn eta(&self) -> WpResult<&[f64]> {
        self.eta.as_deref().ok_or_else(|| WpError::missing(ETA_BRANCH))
    }

    pub fn phi(&self) -> WpResult<&[f64]> {
        self.phi.as_deref().ok_or_else(|| WpError::missing(PHI_BRANCH))
    }

    pub fn gen_part_flav(&self) -> WpResult<&[i32]> {
        self.gen_part_flav
            .as_deref()
            .ok_or_else(|| WpError::missing(FLAVOR_BRANCH))
    }

    pub fn is_low_pt(&self) -> WpResult<&[bool]> {
        self.is_low_pt
            .as_deref()
            .ok_or_else(|| WpError::missing(IS_LOW_PT_BRANCH))
    }

    pub fn is_pf(&self) -> WpResult<&[bool]> {
        self.is_pf.as_deref().ok_or_else(|| WpError::missing(IS_PF_BRANCH))
    }

    pub fn is_pf_overlap(&self) -> WpResult<&[bool]> {
        self.is_pf_overlap
            .as_deref()
            .ok_or_else(|| WpError::missing(IS_PF_OVERLAP_BRANCH))
    }

    pub fn score(&self, id: IdVariant) -> WpResult<&[f64]> {
        self.scores
            .get(&id)
            .map(|v| v.as_slice())
            .ok_or_else(|| WpError::missing(id.branch()))
    }

    /// ID variants with a score column present.
    pub fn score_variants(&self) -> Vec<IdVariant> {
        self.scores.keys().copied().collect()
    }

    /// Look up a float column by its NanoAOD branch name.
    pub fn float_column(&self, branch: &str) -> WpResult<&[f64]> {
        match branch {
            PT_BRANCH => Ok(self.pt()),
            ETA_BRANCH => self.eta(),
            PHI_BRANCH => self.phi(),
            other => {
                let id: IdVariant = other
                    .parse()
                    .map_err(|_| WpError::missing(other))?;
                self.score(id)
            }
        }
    }

    /// Keep rows where `mask` is true. Mask length must match the table.
    pub fn select(&self, mask: &[bool]) -> WpResult<Self> {
        check_len("selection mask", self.len(), mask.len())?;
        Ok(Self {
            pt: pick(&self.pt, mask),
            eta: self.eta.as_ref().map(|c| pick(c, mask)),
            phi: self.phi.as_ref().map(|c| pick(c, mask)),
            gen_part_flav: self.gen_part_flav.as_ref().map(|c| pick(c, mask)),
            is_low_pt: self.is_low_pt.as_ref().map(|c| pick(c, mask)),
            is_pf: self.is_pf.as_ref().map(|c| pick(c, mask)),
            is_pf_overlap: self.is_pf_overlap.as_ref().map(|c| pick(c, mask)),
            scores: self
                .scores
                .iter()
                .map(|(id, c)| (*id, pick(c, mask)))
                .collect(),
        })
    }

    /// Concatenate tables row-wise. The result keeps only columns present in
    /// every part.
    pub fn concat(parts: &[&ElectronTable]) -> Self {
        if parts.is_empty() {
            return Self::default();
        }
        let shared_ids: Vec<IdVariant> = parts[0]
            .scores
            .keys()
            .copied()
            .filter(|id| parts.iter().all(|p| p.scores.contains_key(id)))
            .collect();

        Self {
            pt: parts.iter().flat_map(|p| p.pt.iter().copied()).collect(),
            eta: concat_opt(parts, |p| p.eta.as_ref()),
            phi: concat_opt(parts, |p| p.phi.as_ref()),
            gen_part_flav: concat_opt(parts, |p| p.gen_part_flav.as_ref()),
            is_low_pt: concat_opt(parts, |p| p.is_low_pt.as_ref()),
            is_pf: concat_opt(parts, |p| p.is_pf.as_ref()),
            is_pf_overlap: concat_opt(parts, |p| p.is_pf_overlap.as_ref()),
            scores: shared_ids
                .into_iter()
                .map(|id| {
                    let col = parts
                        .iter()
                        .flat_map(|p| p.scores[&id].iter().copied())
                        .collect();
                    (id, col)
                })
                .collect(),
        }
    }
}
