//! Structured error types for working-point derivation.
//!
//! All variants are local precondition violations. None are retried: the
//! sweep records them against the offending target level and carries on
//! with the others.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WpError {
    #[error("required field '{field}' is absent from the dataset")]
    MissingField { field: String },

    #[error("no records to bin: {what}")]
    EmptyInput { what: String },

    #[error("unrecognized identification variant '{name}'")]
    InvalidId { name: String },

    #[error("bin mismatch: expected {expected} per-bin entries, got {actual}")]
    BinMismatch { expected: usize, actual: usize },

    #[error("column '{field}' has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("target level {target} is outside 0..=100")]
    InvalidTarget { target: u32 },

    #[error("pT step must be positive and finite, got {step}")]
    InvalidStep { step: f64 },

    #[error("invalid range: {what}")]
    InvalidRange { what: String },
}

impl WpError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Short machine-readable kind, used in exported reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MissingField",
            Self::EmptyInput { .. } => "EmptyInput",
            Self::InvalidId { .. } => "InvalidId",
            Self::BinMismatch { .. } => "BinMismatch",
            Self::LengthMismatch { .. } => "LengthMismatch",
            Self::InvalidTarget { .. } => "InvalidTarget",
            Self::InvalidStep { .. } => "InvalidStep",
            Self::InvalidRange { .. } => "InvalidRange",
        }
    }
}

pub type WpResult<T> = Result<T, WpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_branch() {
        let err = WpError::missing("Electron_genPartFlav");
        assert_eq!(err.kind(), "MissingField");
        assert!(err.to_string().contains("Electron_genPartFlav"));
    }

    #[test]
    fn bin_mismatch_reports_both_counts() {
        let err = WpError::BinMismatch {
            expected: 46,
            actual: 45,
        };
        let msg = err.to_string();
        assert!(msg.contains("46"));
        assert!(msg.contains("45"));
    }

    #[test]
    fn invalid_range_kind() {
        let err = WpError::InvalidRange {
            what: "pT upper bound is inf".into(),
        };
        assert_eq!(err.kind(), "InvalidRange");
        assert!(err.to_string().contains("inf"));
    }
}
