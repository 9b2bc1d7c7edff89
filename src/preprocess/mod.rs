//! Plate preprocessing: replicate averaging and blank correction.
//!
//! Input records are assumed to be parsed already; every function here
//! re-validates them and reports the offending id on failure.

pub mod blank;
pub mod replicates;

pub use blank::*;
pub use replicates::*;
