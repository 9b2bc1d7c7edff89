//! Top-level application orchestration.
//!
//! Front-ends (CSV loaders, notebooks, services) hand validated records to
//! `pipeline::run_assay` and render the returned `AssayRun` however they like.

pub mod pipeline;

pub use pipeline::{AssayRun, run_assay};
