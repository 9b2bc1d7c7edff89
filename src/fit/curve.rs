//! Evaluation and acceptance checks on a fitted `StandardCurve`.

use tracing::warn;

use crate::domain::{Advisory, StandardCurve};
use crate::error::AssayError;
use crate::math::log_space;
use crate::models::four_pl;

impl StandardCurve {
    /// Predicted OD at concentration `x`.
    pub fn predict(&self, x: f64) -> f64 {
        four_pl(x, &self.params)
    }

    /// `Advisory::PoorFit` if R² falls below `min_r_squared`.
    ///
    /// The fit itself never enforces the threshold; callers decide what to do.
    pub fn assess(&self, min_r_squared: f64) -> Option<Advisory> {
        let r2 = self.quality.r_squared;
        if r2 >= min_r_squared {
            return None;
        }
        warn!(r_squared = r2, threshold = min_r_squared, "poor standard curve fit");
        Some(Advisory::PoorFit {
            r_squared: r2,
            threshold: min_r_squared,
        })
    }

    /// `points` log-spaced `(concentration, OD)` pairs across the calibrated range.
    ///
    /// A zero-concentration calibrator cannot sit on a log axis, so the grid
    /// starts at the smallest positive standard.
    pub fn curve_grid(&self, points: usize) -> Result<Vec<(f64, f64)>, AssayError> {
        let xs = log_space(
            self.range.min_positive_concentration,
            self.range.max_concentration,
            points,
        )?;
        Ok(xs.into_iter().map(|x| (x, self.predict(x))).collect())
    }
}
