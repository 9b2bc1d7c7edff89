//! Closed-form inversion of the 4PL curve.
//!
//! Solving `od = D + (A - D) / (1 + (x/C)^B)` for `x`:
//!
//! ```text
//! x = C · ((A - D) / (od - D) - 1)^(1/B)
//! ```
//!
//! A real, positive solution exists only for `od` strictly between the two
//! asymptotes; there the base is always > 0.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{
    ConcentrationEstimate, CorrectedPlate, CurveParameters, SampleOutcome, SampleResult,
    StandardCurve,
};
use crate::error::{AssayError, OutOfRangeReason};

/// Concentration that produces `observed_od` under `params`.
pub fn solve(params: &CurveParameters, observed_od: f64) -> Result<f64, AssayError> {
    params.validate()?;
    if !observed_od.is_finite() {
        return Err(AssayError::invalid(
            "observed OD",
            format!("must be finite, got {observed_od}"),
        ));
    }

    let CurveParameters { a, b, c, d } = *params;
    if observed_od == d {
        return Err(AssayError::out_of_range(
            observed_od,
            OutOfRangeReason::AtAsymptote { d },
        ));
    }
    let (lower, upper) = params.od_bounds();
    if !(observed_od > lower && observed_od < upper) {
        return Err(AssayError::out_of_range(
            observed_od,
            OutOfRangeReason::OutsideAsymptotes { lower, upper },
        ));
    }

    let base = (a - d) / (observed_od - d) - 1.0;
    if !(base.is_finite() && base > 0.0) {
        return Err(AssayError::out_of_range(observed_od, OutOfRangeReason::ComplexRoot));
    }
    let x = c * (base.ln() / b).exp();
    if !x.is_finite() {
        return Err(AssayError::out_of_range(observed_od, OutOfRangeReason::ComplexRoot));
    }
    Ok(x)
}

/// Solve and tag the result against the curve's calibrated range.
pub fn back_calculate(curve: &StandardCurve, od: f64) -> Result<ConcentrationEstimate, AssayError> {
    let concentration = solve(&curve.params, od)?;
    Ok(ConcentrationEstimate {
        od,
        concentration,
        range_status: curve.range.classify(concentration),
    })
}

/// Back-calculate every row of a corrected plate.
///
/// Blank rows report 0; rows without a real inverse are kept as
/// `SampleOutcome::OutOfRange` instead of failing the whole plate. Output
/// order matches `plate.measurements`.
pub fn back_calculate_all(
    curve: &StandardCurve,
    plate: &CorrectedPlate,
) -> Result<Vec<SampleResult>, AssayError> {
    curve.params.validate()?;

    plate
        .measurements
        .par_iter()
        .map(|m| {
            let outcome = if m.is_blank {
                SampleOutcome::Blank
            } else {
                match back_calculate(curve, m.corrected_od) {
                    Ok(estimate) => SampleOutcome::Estimated(estimate),
                    Err(AssayError::OutOfRange { reason, .. }) => {
                        debug!(id = %m.id, od = m.corrected_od, %reason, "sample out of range");
                        SampleOutcome::OutOfRange { reason }
                    }
                    Err(other) => return Err(other),
                }
            };
            Ok(SampleResult {
                id: m.id.clone(),
                corrected_od: m.corrected_od,
                outcome,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalibratedRange, CorrectedMeasurement, FitQuality, RangeStatus};
    use crate::models::four_pl;

    const PARAMS: CurveParameters = CurveParameters {
        a: 0.08,
        b: 1.2,
        c: 45.3,
        d: 0.99,
    };

    fn curve() -> StandardCurve {
        StandardCurve {
            params: PARAMS,
            quality: FitQuality {
                r_squared: 0.99,
                sse: 0.001,
                rmse: 0.01,
                n: 6,
                iterations: 12,
            },
            range: CalibratedRange {
                min_concentration: 2.0,
                max_concentration: 500.0,
                min_positive_concentration: 2.0,
            },
        }
    }

    fn row(id: &str, corrected_od: f64, is_blank: bool) -> CorrectedMeasurement {
        CorrectedMeasurement {
            id: id.to_string(),
            replicates: vec![corrected_od, corrected_od],
            average_od: corrected_od,
            corrected_od,
            is_blank,
            cv_percent: Some(0.0),
        }
    }

    #[test]
    fn inverts_the_forward_model() {
        let curves = [
            PARAMS,
            CurveParameters::new(1.8, 1.5, 20.0, 0.1),
            CurveParameters::new(0.2, -0.8, 3.0, 2.5),
            CurveParameters::new(0.05, 3.0, 150.0, 3.2),
        ];
        for p in &curves {
            for &x in &[0.1, 1.0, 7.5, 45.3, 300.0, 2000.0] {
                let od = four_pl(x, p);
                let back = solve(p, od).unwrap();
                assert!(((back - x) / x).abs() < 1e-4, "params={p:?} x={x} back={back}");
            }
        }
    }

    #[test]
    fn od_at_asymptote_d_is_out_of_range() {
        let err = solve(&PARAMS, 0.99).unwrap_err();
        assert!(matches!(
            err,
            AssayError::OutOfRange {
                reason: OutOfRangeReason::AtAsymptote { .. },
                ..
            }
        ));
    }

    #[test]
    fn od_outside_asymptotes_is_out_of_range() {
        for od in [0.08, 0.05, -0.1, 1.2] {
            let err = solve(&PARAMS, od).unwrap_err();
            assert!(
                matches!(
                    err,
                    AssayError::OutOfRange {
                        reason: OutOfRangeReason::OutsideAsymptotes { .. },
                        ..
                    }
                ),
                "od={od}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        let bad = CurveParameters::new(0.08, 1.2, -1.0, 0.99);
        assert!(matches!(solve(&bad, 0.5), Err(AssayError::InvalidInput { .. })));
        assert!(matches!(solve(&PARAMS, f64::NAN), Err(AssayError::InvalidInput { .. })));
    }

    #[test]
    fn mid_curve_od_is_interpolated() {
        let est = back_calculate(&curve(), 0.34).unwrap();
        let expected = 45.3 * 0.4_f64.powf(1.0 / 1.2);
        assert!((est.concentration - expected).abs() < 1e-9);
        assert!(est.concentration > 2.0 && est.concentration < 500.0);
        assert_eq!(est.range_status, RangeStatus::Interpolated);
    }

    #[test]
    fn od_near_plateau_is_extrapolated() {
        let est = back_calculate(&curve(), 0.97).unwrap();
        assert!(est.concentration > 500.0);
        assert_eq!(est.range_status, RangeStatus::AboveRange);
        assert!(est.range_status.is_extrapolated());

        let low = back_calculate(&curve(), 0.0805).unwrap();
        assert_eq!(low.range_status, RangeStatus::BelowRange);
    }

    #[test]
    fn plate_back_calculation_keeps_order_and_flags() {
        let plate = CorrectedPlate {
            blank_average: 0.1225,
            measurements: vec![
                row("S1", 0.34, false),
                row("S2", 1.5, false),
                row("BLANK", 0.0, true),
                row("S3", 0.97, false),
            ],
        };
        let results = back_calculate_all(&curve(), &plate).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "BLANK", "S3"]);

        assert!(matches!(
            results[0].outcome,
            SampleOutcome::Estimated(ConcentrationEstimate {
                range_status: RangeStatus::Interpolated,
                ..
            })
        ));
        assert!(matches!(results[1].outcome, SampleOutcome::OutOfRange { .. }));
        assert_eq!(results[1].outcome.concentration(), None);
        assert_eq!(results[2].outcome, SampleOutcome::Blank);
        assert_eq!(results[2].outcome.concentration(), Some(0.0));
        assert!(matches!(
            results[3].outcome,
            SampleOutcome::Estimated(ConcentrationEstimate {
                range_status: RangeStatus::AboveRange,
                ..
            })
        ));
    }
}
