//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - plate inputs (`Measurement`, `StandardPoint`)
//! - preprocessing outputs (`CorrectedMeasurement`, `CorrectedPlate`, `CorrectedStandard`)
//! - fit outputs (`CurveParameters`, `FitQuality`, `StandardCurve`)
//! - back-calculation outputs (`ConcentrationEstimate`, `RangeStatus`)
//! - non-fatal advisories (`Advisory`, `Reported`)

pub mod types;

pub use types::*;
