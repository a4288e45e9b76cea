//! Sweep fingerprinting for deterministic identification of a sweep run.
//!
//! - `dataset_hash`: BLAKE3 over every column of an electron table.
//! - `SweepFingerprint`: configuration hash + dataset hash → run id.

use crate::domain::ElectronTable;
use crate::sweep::SweepSpec;
use serde::{Deserialize, Serialize};

/// BLAKE3 over the table contents in fixed column order.
pub fn dataset_hash(table: &ElectronTable) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(table.len() as u64).to_le_bytes());
    for v in table.pt() {
        hasher.update(&v.to_le_bytes());
    }
    if let Ok(flav) = table.gen_part_flav() {
        hasher.update(b"flav");
        for f in flav {
            hasher.update(&f.to_le_bytes());
        }
    }
    for (name, flags) in [
        ("lowpt", table.is_low_pt()),
        ("pf", table.is_pf()),
        ("pfoverlap", table.is_pf_overlap()),
    ] {
        if let Ok(flags) = flags {
            hasher.update(name.as_bytes());
            for b in flags {
                hasher.update(&[u8::from(*b)]);
            }
        }
    }
    for id in table.score_variants() {
        hasher.update(id.branch().as_bytes());
        if let Ok(scores) = table.score(id) {
            for s in scores {
                hasher.update(&s.to_le_bytes());
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFingerprint {
    pub config_hash: String,
    pub signal_hash: String,
    pub background_hash: String,
}

impl SweepFingerprint {
    pub fn new(spec: &SweepSpec, signal: &ElectronTable, background: &ElectronTable) -> Self {
        // SweepSpec holds only strings, integers and floats; JSON never fails.
        let json = serde_json::to_string(spec).unwrap_or_default();
        Self {
            config_hash: blake3::hash(json.as_bytes()).to_hex().to_string(),
            signal_hash: dataset_hash(signal),
            background_hash: dataset_hash(background),
        }
    }

    /// Run id: hash of config + both dataset hashes.
    pub fn run_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.config_hash.as_bytes());
        hasher.update(self.signal_hash.as_bytes());
        hasher.update(self.background_hash.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
