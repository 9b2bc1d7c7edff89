//! Run configuration.
//!
//! Blank label, acceptance thresholds and optimizer limits are passed
//! explicitly to every operation; there is no module-level state.
//! Defaults can be overridden from the environment (or a `.env` file):
//!
//! | variable                 | field              |
//! |--------------------------|--------------------|
//! | `ELISA_BLANK_LABEL`      | `blank_label`      |
//! | `ELISA_BLANK_POLICY`     | `blank_policy`     |
//! | `ELISA_MIN_R_SQUARED`    | `min_r_squared`    |
//! | `ELISA_MAX_REPLICATE_CV` | `max_replicate_cv` |
//! | `ELISA_MAX_ITERATIONS`   | `fit.max_iterations` |

use serde::{Deserialize, Serialize};

use crate::domain::BlankPolicy;
use crate::error::AssayError;

pub const DEFAULT_BLANK_LABEL: &str = "BLANK";
/// Minimum R² for a standard curve to be considered trustworthy.
pub const DEFAULT_MIN_R_SQUARED: f64 = 0.95;
/// Replicate CV (%) above which duplicates are flagged.
pub const DEFAULT_MAX_REPLICATE_CV: f64 = 15.0;

/// Levenberg–Marquardt stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative SSE reduction below which an accepted step ends the fit.
    pub ftol: f64,
    /// Relative step size below which the fit ends.
    pub xtol: f64,
    /// Largest cosine between the residual and a Jacobian column at a stationary point.
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), AssayError> {
        if self.max_iterations == 0 {
            return Err(AssayError::invalid("fit options", "max_iterations must be >= 1"));
        }
        for (name, v) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AssayError::invalid(
                    "fit options",
                    format!("{name} must be finite and >= 0, got {v}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayConfig {
    pub blank_label: String,
    pub blank_policy: BlankPolicy,
    pub min_r_squared: f64,
    pub max_replicate_cv: f64,
    pub fit: FitOptions,
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self {
            blank_label: DEFAULT_BLANK_LABEL.to_string(),
            blank_policy: BlankPolicy::default(),
            min_r_squared: DEFAULT_MIN_R_SQUARED,
            max_replicate_cv: DEFAULT_MAX_REPLICATE_CV,
            fit: FitOptions::default(),
        }
    }
}

impl AssayConfig {
    /// Defaults overridden by `ELISA_*` variables (a `.env` file is loaded first if present).
    pub fn from_env() -> Result<Self, AssayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AssayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(label) = lookup("ELISA_BLANK_LABEL") {
            config.blank_label = label;
        }
        if let Some(policy) = lookup("ELISA_BLANK_POLICY") {
            config.blank_policy = policy.parse()?;
        }
        if let Some(v) = lookup("ELISA_MIN_R_SQUARED") {
            config.min_r_squared = parse_var("ELISA_MIN_R_SQUARED", &v)?;
        }
        if let Some(v) = lookup("ELISA_MAX_REPLICATE_CV") {
            config.max_replicate_cv = parse_var("ELISA_MAX_REPLICATE_CV", &v)?;
        }
        if let Some(v) = lookup("ELISA_MAX_ITERATIONS") {
            config.fit.max_iterations = parse_var("ELISA_MAX_ITERATIONS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AssayError> {
        if self.blank_label.trim().is_empty() {
            return Err(AssayError::invalid("config", "blank label must not be empty"));
        }
        if !self.min_r_squared.is_finite() || self.min_r_squared > 1.0 {
            return Err(AssayError::invalid(
                "config",
                format!("min_r_squared must be finite and <= 1, got {}", self.min_r_squared),
            ));
        }
        if !(self.max_replicate_cv.is_finite() && self.max_replicate_cv > 0.0) {
            return Err(AssayError::invalid(
                "config",
                format!("max_replicate_cv must be > 0, got {}", self.max_replicate_cv),
            ));
        }
        self.fit.validate()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AssayError> {
    raw.trim()
        .parse()
        .map_err(|_| AssayError::invalid(key, format!("cannot parse '{raw}'")))
}
