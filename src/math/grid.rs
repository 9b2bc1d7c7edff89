//! Log-spaced concentration grids.
//!
//! Dose-response curves are read on a log-concentration axis, so evaluation
//! grids for plotting are spaced evenly in `ln(x)`.

use crate::error::AssayError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AssayError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AssayError::invalid(
            "concentration grid",
            format!("invalid range: min={min}, max={max} (must be finite, >0, and max>min)"),
        ));
    }
    if steps < 2 {
        return Err(AssayError::invalid("concentration grid", "steps must be >= 2"));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the endpoints exactly.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}
