//! Reporting utilities: per-standard residuals and recoveries.
//!
//! Only numbers are produced here; text layout belongs to the caller.

use serde::{Deserialize, Serialize};

use crate::domain::{CorrectedStandard, StandardCurve};
use crate::error::AssayError;
use crate::solve::solve;

/// How well the fitted curve reproduces one calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardRecovery {
    pub id: String,
    pub concentration: f64,
    pub corrected_od: f64,
    pub fitted_od: f64,
    /// `corrected_od - fitted_od`.
    pub residual: f64,
    /// Concentration read back from the curve (`None` if the OD has no inverse).
    pub back_calculated: Option<f64>,
    /// `back_calculated / concentration * 100` (`None` for a zero calibrator).
    pub recovery_percent: Option<f64>,
}

/// Compute fitted values, residuals and recoveries for each standard.
pub fn standard_recoveries(
    curve: &StandardCurve,
    standards: &[CorrectedStandard],
) -> Result<Vec<StandardRecovery>, AssayError> {
    let mut out = Vec::with_capacity(standards.len());
    for s in standards {
        let fitted_od = curve.predict(s.concentration);
        if !fitted_od.is_finite() {
            return Err(AssayError::invalid(
                format!("standard '{}'", s.id),
                "non-finite model prediction",
            ));
        }
        let back_calculated = match solve(&curve.params, s.corrected_od) {
            Ok(x) => Some(x),
            Err(AssayError::OutOfRange { .. }) => None,
            Err(e) => return Err(e),
        };
        let recovery_percent = match back_calculated {
            Some(x) if s.concentration > 0.0 => Some(x / s.concentration * 100.0),
            _ => None,
        };
        out.push(StandardRecovery {
            id: s.id.clone(),
            concentration: s.concentration,
            corrected_od: s.corrected_od,
            fitted_od,
            residual: s.corrected_od - fitted_od,
            back_calculated,
            recovery_percent,
        });
    }
    Ok(out)
}
