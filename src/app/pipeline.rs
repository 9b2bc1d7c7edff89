//! Shared single-plate workflow.
//!
//! Keeping this in one place avoids duplicating the core chain in every caller:
//! blank correction -> standard correction -> 4PL fit -> acceptance check ->
//! sample back-calculation -> standard recoveries
//!
//! Callers then focus on presentation (tables, plots, exports).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AssayConfig;
use crate::domain::{
    Advisory, CorrectedPlate, CorrectedStandard, Measurement, SampleResult, StandardCurve,
    StandardPoint,
};
use crate::error::AssayError;
use crate::report::StandardRecovery;

/// All computed outputs of a single plate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayRun {
    pub plate: CorrectedPlate,
    pub standards: Vec<CorrectedStandard>,
    pub curve: StandardCurve,
    pub samples: Vec<SampleResult>,
    pub recoveries: Vec<StandardRecovery>,
    /// Every non-fatal condition raised along the way, in pipeline order.
    pub advisories: Vec<Advisory>,
}

impl AssayRun {
    /// Whether the curve met the acceptance threshold.
    pub fn curve_accepted(&self) -> bool {
        !self
            .advisories
            .iter()
            .any(|a| matches!(a, Advisory::PoorFit { .. }))
    }
}

/// Execute the full workflow for one plate.
pub fn run_assay(
    samples: &[Measurement],
    standards: &[StandardPoint],
    config: &AssayConfig,
) -> Result<AssayRun, AssayError> {
    config.validate()?;

    // 1) Blank-correct the sample plate.
    let corrected = crate::preprocess::correct(samples, &config.blank_label, config.blank_policy)?;
    let mut advisories = corrected.advisories;
    let plate = corrected.value;
    advisories.extend(crate::preprocess::flag_replicate_precision(
        &plate,
        config.max_replicate_cv,
    ));

    // 2) Standards share the plate background.
    let standards = crate::preprocess::correct_standards(standards, plate.blank_average)?;

    // 3) Fit, then apply the caller's acceptance policy.
    let curve = crate::fit::fit_standards(&standards, &config.fit)?;
    if let Some(advisory) = curve.assess(config.min_r_squared) {
        advisories.push(advisory);
    }

    // 4) Back-calculate samples and check calibrator recovery.
    let sample_results = crate::solve::back_calculate_all(&curve, &plate)?;
    let recoveries = crate::report::standard_recoveries(&curve, &standards)?;

    info!(
        samples = sample_results.len(),
        standards = standards.len(),
        r_squared = curve.quality.r_squared,
        advisories = advisories.len(),
        "assay run complete"
    );

    Ok(AssayRun {
        plate,
        standards,
        curve,
        samples: sample_results,
        recoveries,
        advisories,
    })
}
