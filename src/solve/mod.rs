//! Concentration back-calculation from a fitted standard curve.

pub mod inverse;

pub use inverse::*;
