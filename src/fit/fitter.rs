//! Levenberg–Marquardt fit of the 4PL model.
//!
//! Given:
//! - standard concentrations `x_i`
//! - blank-corrected ODs `y_i`
//!
//! we minimize `Σ (y_i - OD(x_i; A, B, C, D))²` over `θ = (A, B, ln C, D)`.
//!
//! Each iteration linearizes the model (`J` = analytic Jacobian) and solves the
//! damped problem `min ‖J δ - r‖² + λ ‖S δ‖²` where `S = diag(‖J_k‖)`
//! (Marquardt scaling). Accepted steps shrink `λ`, rejected steps grow it.
//!
//! Starting point: `A₀ = min(y)`, `D₀ = max(y)`, `C₀ = median(x > 0)`, `B₀ = 1`.
//! The fit is deterministic given the same inputs and options.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, trace};

use crate::config::FitOptions;
use crate::domain::{CalibratedRange, CorrectedStandard, FitQuality, StandardCurve};
use crate::error::{AssayError, FitFailure};
use crate::math::{augment_damped, median, r_squared, solve_least_squares};
use crate::models::{PARAM_COUNT, fill_jacobian_row, four_pl_theta, params_from_theta};

/// Fewest standards that leave the four parameters well-posed.
pub const MIN_STANDARDS: usize = 4;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e20;
/// Floor for the Marquardt column scale (keeps flat directions damped).
const SCALE_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct LmOutcome {
    theta: [f64; PARAM_COUNT],
    sse: f64,
    iterations: usize,
}

/// Fit a 4PL curve to `(concentration, od)` pairs.
pub fn fit(
    concentrations: &[f64],
    od_values: &[f64],
    options: &FitOptions,
) -> Result<StandardCurve, AssayError> {
    options.validate()?;
    validate_inputs(concentrations, od_values)?;

    let theta0 = initial_guess(concentrations, od_values)?;
    debug!(?theta0, n = concentrations.len(), "starting 4PL fit");

    let outcome = levenberg_marquardt(concentrations, od_values, theta0, options)?;
    let params = params_from_theta(&outcome.theta);
    if !(params.c.is_finite() && params.c > 0.0) {
        return Err(FitFailure::NonFinite {
            iteration: outcome.iterations,
        }
        .into());
    }

    let predicted: Vec<f64> = concentrations
        .iter()
        .map(|&x| four_pl_theta(x, &outcome.theta))
        .collect();
    let r2 = r_squared(od_values, &predicted);
    let n = concentrations.len();

    let range = CalibratedRange {
        min_concentration: concentrations.iter().copied().fold(f64::INFINITY, f64::min),
        max_concentration: concentrations
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max),
        min_positive_concentration: concentrations
            .iter()
            .copied()
            .filter(|&x| x > 0.0)
            .fold(f64::INFINITY, f64::min),
    };

    info!(
        a = params.a,
        b = params.b,
        c = params.c,
        d = params.d,
        r_squared = r2,
        iterations = outcome.iterations,
        "standard curve fitted"
    );

    Ok(StandardCurve {
        params,
        quality: FitQuality {
            r_squared: r2,
            sse: outcome.sse,
            rmse: (outcome.sse / n as f64).sqrt(),
            n,
            iterations: outcome.iterations,
        },
        range,
    })
}

/// Fit a 4PL curve to blank-corrected standards.
pub fn fit_standards(
    standards: &[CorrectedStandard],
    options: &FitOptions,
) -> Result<StandardCurve, AssayError> {
    let x: Vec<f64> = standards.iter().map(|s| s.concentration).collect();
    let y: Vec<f64> = standards.iter().map(|s| s.corrected_od).collect();
    fit(&x, &y, options)
}

/// Data-anchored starting point in optimizer coordinates.
///
/// `C₀` is the median of the *positive* concentrations, so a zero calibrator
/// does not pull it to 0 (where `ln C` is undefined).
pub fn initial_guess(
    concentrations: &[f64],
    od_values: &[f64],
) -> Result<[f64; PARAM_COUNT], AssayError> {
    let a0 = od_values.iter().copied().fold(f64::INFINITY, f64::min);
    let d0 = od_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let positive: Vec<f64> = concentrations.iter().copied().filter(|&x| x > 0.0).collect();
    let c0 = median(&positive)
        .ok_or_else(|| AssayError::invalid("standards", "no positive concentration"))?;
    Ok([a0, 1.0, c0.ln(), d0])
}

fn validate_inputs(concentrations: &[f64], od_values: &[f64]) -> Result<(), AssayError> {
    if concentrations.len() != od_values.len() {
        return Err(AssayError::invalid(
            "standards",
            format!(
                "{} concentrations but {} OD values",
                concentrations.len(),
                od_values.len()
            ),
        ));
    }
    let n = concentrations.len();
    if n < MIN_STANDARDS {
        return Err(AssayError::invalid(
            "standards",
            format!("need at least {MIN_STANDARDS} points to fit 4 parameters, got {n}"),
        ));
    }
    for (i, (&x, &y)) in concentrations.iter().zip(od_values).enumerate() {
        if !(x.is_finite() && x >= 0.0) {
            return Err(AssayError::invalid(
                format!("standard #{}", i + 1),
                format!("concentration must be finite and >= 0, got {x}"),
            ));
        }
        if !y.is_finite() {
            return Err(AssayError::invalid(
                format!("standard #{}", i + 1),
                format!("OD must be finite, got {y}"),
            ));
        }
    }
    if concentrations.iter().all(|&x| x == concentrations[0]) {
        return Err(AssayError::invalid("standards", "all concentrations are identical"));
    }
    if concentrations.iter().all(|&x| x == 0.0) {
        return Err(AssayError::invalid("standards", "no positive concentration"));
    }
    if od_values.iter().all(|&y| y == od_values[0]) {
        return Err(AssayError::invalid(
            "standards",
            "all OD values are identical; the curve is not identifiable",
        ));
    }
    Ok(())
}

fn sum_squared_residuals(x: &[f64], y: &[f64], theta: &[f64; PARAM_COUNT]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - four_pl_theta(xi, theta);
            r * r
        })
        .sum()
}

/// Residuals `y - f(x)` and Jacobian `∂f/∂θ`.
fn linearize(x: &[f64], y: &[f64], theta: &[f64; PARAM_COUNT]) -> (DMatrix<f64>, DVector<f64>) {
    let n = x.len();
    let mut j = DMatrix::<f64>::zeros(n, PARAM_COUNT);
    let mut r = DVector::<f64>::zeros(n);
    let mut row = [0.0; PARAM_COUNT];
    for i in 0..n {
        let f = fill_jacobian_row(x[i], theta, &mut row);
        for k in 0..PARAM_COUNT {
            j[(i, k)] = row[k];
        }
        r[i] = y[i] - f;
    }
    (j, r)
}

fn levenberg_marquardt(
    x: &[f64],
    y: &[f64],
    theta0: [f64; PARAM_COUNT],
    options: &FitOptions,
) -> Result<LmOutcome, FitFailure> {
    let mut theta = theta0;
    let mut sse = sum_squared_residuals(x, y, &theta);
    if !sse.is_finite() {
        return Err(FitFailure::NonFinite { iteration: 0 });
    }
    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=options.max_iterations {
        let done = |theta: [f64; PARAM_COUNT], sse: f64| -> Result<LmOutcome, FitFailure> {
            debug!(iteration, sse, "4PL fit converged");
            Ok(LmOutcome {
                theta,
                sse,
                iterations: iteration,
            })
        };

        if sse == 0.0 {
            return done(theta, sse);
        }

        let (j, r) = linearize(x, y, &theta);
        let scale: Vec<f64> = j.column_iter().map(|c| c.norm()).collect();

        // Gradient test: every column nearly orthogonal to the residual.
        let g = j.transpose() * &r;
        let r_norm = sse.sqrt();
        let cosine = (0..PARAM_COUNT)
            .filter(|&k| scale[k] > 0.0)
            .map(|k| g[k].abs() / (r_norm * scale[k]))
            .fold(0.0, f64::max);
        if cosine <= options.gtol {
            return done(theta, sse);
        }

        let damping: Vec<f64> = scale.iter().map(|s| s.max(SCALE_FLOOR)).collect();
        let theta_norm = theta.iter().map(|v| v * v).sum::<f64>().sqrt();

        loop {
            let (ax, ay) = augment_damped(&j, &r, lambda, &damping);
            let delta = solve_least_squares(&ax, &ay).ok_or(FitFailure::Singular { iteration })?;

            let mut trial = theta;
            for k in 0..PARAM_COUNT {
                trial[k] += delta[k];
            }
            let trial_sse = sum_squared_residuals(x, y, &trial);
            let step_small = delta.norm() <= options.xtol * (theta_norm + options.xtol);
            trace!(iteration, lambda, sse, trial_sse, "LM step");

            if trial_sse.is_finite() && trial_sse < sse {
                let reduction = (sse - trial_sse) / sse;
                theta = trial;
                sse = trial_sse;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if reduction <= options.ftol || step_small {
                    return done(theta, sse);
                }
                break;
            }

            // No step of this size improves the fit: we sit at a minimum to
            // working precision.
            if step_small {
                return done(theta, sse);
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(FitFailure::Singular { iteration });
            }
        }
    }

    Err(FitFailure::NotConverged {
        iterations: options.max_iterations,
    })
}
