//! Error taxonomy for the assay core.
//!
//! Structural problems (bad records, unusable standards) fail fast with
//! `InvalidInput`; optimizer trouble surfaces as `CurveFit`; ODs the fitted
//! curve cannot produce surface as `OutOfRange`. Non-fatal conditions are not
//! errors; see `domain::Advisory`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssayError {
    /// Malformed or insufficient input (empty replicates, mismatched arrays, ...).
    #[error("invalid input for {subject}: {reason}")]
    InvalidInput { subject: String, reason: String },

    /// The 4PL optimizer did not produce a usable parameter set.
    #[error("standard curve fit failed: {0}")]
    CurveFit(FitFailure),

    /// No real concentration maps to `od` under the fitted curve.
    #[error("OD {od:.4} cannot be back-calculated: {reason}")]
    OutOfRange { od: f64, reason: OutOfRangeReason },
}

impl AssayError {
    pub fn invalid(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(od: f64, reason: OutOfRangeReason) -> Self {
        Self::OutOfRange { od, reason }
    }
}

impl From<FitFailure> for AssayError {
    fn from(value: FitFailure) -> Self {
        Self::CurveFit(value)
    }
}

/// Underlying cause of a failed fit.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
pub enum FitFailure {
    #[error("no convergence within {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("damped normal equations became singular at iteration {iteration}")]
    Singular { iteration: usize },
    #[error("non-finite residuals or parameters at iteration {iteration}")]
    NonFinite { iteration: usize },
}

/// Why an OD has no real inverse on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
pub enum OutOfRangeReason {
    #[error("equals the asymptote D={d:.4}")]
    AtAsymptote { d: f64 },
    #[error("outside the open interval ({lower:.4}, {upper:.4}) between the asymptotes")]
    OutsideAsymptotes { lower: f64, upper: f64 },
    #[error("inversion has no real root")]
    ComplexRoot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = AssayError::invalid("measurement 'S3'", "no replicate OD values");
        assert_eq!(
            err.to_string(),
            "invalid input for measurement 'S3': no replicate OD values"
        );

        let err: AssayError = FitFailure::NotConverged { iterations: 10 }.into();
        assert!(err.to_string().contains("10 iterations"));

        let err = AssayError::out_of_range(0.99, OutOfRangeReason::AtAsymptote { d: 0.99 });
        assert!(err.to_string().contains("0.9900"));
    }
}
