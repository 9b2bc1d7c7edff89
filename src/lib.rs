//! `elisa-curves` library crate.
//!
//! Immunoassay plate workflow:
//!
//! - duplicate OD averaging and blank correction (`preprocess`)
//! - four-parameter logistic standard-curve fitting (`fit`, `models`)
//! - concentration back-calculation with calibrated-range flags (`solve`)
//! - a single-plate pipeline chaining the above (`app::pipeline`)
//!
//! File formats, prompts, plotting and report layout are left to callers;
//! everything here works on typed records and returns typed results.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod preprocess;
pub mod report;
pub mod solve;
