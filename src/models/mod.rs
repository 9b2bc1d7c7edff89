//! Dose-response model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and
//! inversion code can stay simple.

pub mod logistic;

pub use logistic::*;
