//! Domain types: electron table, ID variants, truth labels, reco categories.

pub mod electron;
pub mod id_variant;
pub mod reco;
pub mod truth;

pub use electron::ElectronTable;
pub use id_variant::IdVariant;
pub use reco::{split_lowpt_pf, RecoCategory};
pub use truth::{Partition, SignalDefinition, SIGNAL_FLAVORS, SIGNAL_FLAVORS_WITH_TAU};
