//! Standard-curve fitting.
//!
//! Responsibilities:
//!
//! - validate the calibrator set and build a data-anchored starting point
//! - fit the 4PL model by Levenberg–Marquardt
//! - report goodness of fit and let callers apply an acceptance threshold

pub mod curve;
pub mod fitter;

pub use fitter::*;
