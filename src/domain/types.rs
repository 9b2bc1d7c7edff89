//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during preprocessing, fitting and back-calculation
//! - handed to reporting/plotting collaborators as plain records

use serde::{Deserialize, Serialize};

use crate::error::{AssayError, OutOfRangeReason};

/// A well (or well group) with replicate OD readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    /// Raw replicate OD values, usually a duplicate pair.
    pub replicates: Vec<f64>,
}

impl Measurement {
    /// Build a validated measurement.
    pub fn new(id: impl Into<String>, replicates: Vec<f64>) -> Result<Self, AssayError> {
        let m = Self {
            id: id.into(),
            replicates,
        };
        m.validate()?;
        Ok(m)
    }

    /// Require at least one replicate and only finite values.
    pub fn validate(&self) -> Result<(), AssayError> {
        if self.replicates.is_empty() {
            return Err(AssayError::invalid(
                format!("measurement '{}'", self.id),
                "no replicate OD values",
            ));
        }
        if let Some(pos) = self.replicates.iter().position(|v| !v.is_finite()) {
            return Err(AssayError::invalid(
                format!("measurement '{}'", self.id),
                format!("replicate #{} is not a finite number", pos + 1),
            ));
        }
        Ok(())
    }

    /// Case-insensitive label match (surrounding whitespace ignored).
    pub fn matches_label(&self, label: &str) -> bool {
        self.id.trim().eq_ignore_ascii_case(label.trim())
    }
}

/// A measurement after averaging and blank subtraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedMeasurement {
    pub id: String,
    pub replicates: Vec<f64>,
    pub average_od: f64,
    /// `average_od - blank_average`; exactly `0.0` for blank rows.
    pub corrected_od: f64,
    pub is_blank: bool,
    /// Replicate coefficient of variation in percent (`None` when the mean is 0).
    pub cv_percent: Option<f64>,
}

/// Output of blank correction over a plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedPlate {
    /// Background OD subtracted from every non-blank row (0.0 if no blank was found).
    pub blank_average: f64,
    /// Same order and length as the input measurements.
    pub measurements: Vec<CorrectedMeasurement>,
}

/// A calibrator well with known concentration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardPoint {
    pub measurement: Measurement,
    /// Known concentration (ng/ml or equivalent), finite and >= 0.
    pub concentration: f64,
}

impl StandardPoint {
    pub fn new(
        id: impl Into<String>,
        replicates: Vec<f64>,
        concentration: f64,
    ) -> Result<Self, AssayError> {
        let measurement = Measurement::new(id, replicates)?;
        let point = Self {
            measurement,
            concentration,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), AssayError> {
        self.measurement.validate()?;
        if !(self.concentration.is_finite() && self.concentration >= 0.0) {
            return Err(AssayError::invalid(
                format!("standard '{}'", self.measurement.id),
                format!(
                    "concentration must be finite and >= 0, got {}",
                    self.concentration
                ),
            ));
        }
        Ok(())
    }
}

/// A standard after averaging and plate-blank subtraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedStandard {
    pub id: String,
    pub concentration: f64,
    pub average_od: f64,
    pub corrected_od: f64,
}

/// Fitted 4PL parameters: `OD(x) = d + (a - d) / (1 + (x/c)^b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    /// Response as `x -> 0` (for `b > 0`).
    pub a: f64,
    /// Hill slope; its sign sets the curve direction.
    pub b: f64,
    /// EC50, the inflection concentration (> 0).
    pub c: f64,
    /// Response as `x -> inf` (for `b > 0`).
    pub d: f64,
}

impl CurveParameters {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub fn validate(&self) -> Result<(), AssayError> {
        let all_finite = [self.a, self.b, self.c, self.d].iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(AssayError::invalid("curve parameters", "non-finite parameter"));
        }
        if self.c <= 0.0 {
            return Err(AssayError::invalid(
                "curve parameters",
                format!("EC50 must be > 0, got {}", self.c),
            ));
        }
        if self.b == 0.0 {
            return Err(AssayError::invalid("curve parameters", "Hill slope is zero"));
        }
        Ok(())
    }

    /// Lower and upper bound of the achievable OD range.
    pub fn od_bounds(&self) -> (f64, f64) {
        (self.a.min(self.d), self.a.max(self.d))
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Coefficient of determination; negative when worse than the mean.
    pub r_squared: f64,
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    /// Optimizer iterations used.
    pub iterations: usize,
}

/// Concentration span covered by the calibrators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRange {
    pub min_concentration: f64,
    pub max_concentration: f64,
    /// Smallest non-zero calibrator; the low end of a log-scaled axis.
    pub min_positive_concentration: f64,
}

impl CalibratedRange {
    pub fn classify(&self, concentration: f64) -> RangeStatus {
        if concentration < self.min_concentration {
            RangeStatus::BelowRange
        } else if concentration > self.max_concentration {
            RangeStatus::AboveRange
        } else {
            RangeStatus::Interpolated
        }
    }
}

/// A fitted standard curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardCurve {
    pub params: CurveParameters,
    pub quality: FitQuality,
    pub range: CalibratedRange,
}

/// Where a back-calculated concentration sits relative to the calibrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Interpolated,
    /// Below the lowest standard concentration.
    BelowRange,
    /// Above the highest standard concentration.
    AboveRange,
}

impl RangeStatus {
    pub fn is_extrapolated(self) -> bool {
        !matches!(self, RangeStatus::Interpolated)
    }
}

/// A back-calculated concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationEstimate {
    pub od: f64,
    pub concentration: f64,
    pub range_status: RangeStatus,
}

/// Per-sample back-calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub id: String,
    pub corrected_od: f64,
    pub outcome: SampleOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SampleOutcome {
    /// Blank rows report a concentration of 0 by definition.
    Blank,
    Estimated(ConcentrationEstimate),
    /// The OD has no real inverse on the fitted curve.
    OutOfRange { reason: OutOfRangeReason },
}

impl SampleOutcome {
    pub fn concentration(&self) -> Option<f64> {
        match self {
            SampleOutcome::Blank => Some(0.0),
            SampleOutcome::Estimated(e) => Some(e.concentration),
            SampleOutcome::OutOfRange { .. } => None,
        }
    }
}

/// How to combine several rows matching the blank label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankPolicy {
    /// Use the first matching row in input order.
    #[default]
    First,
    /// Average the per-row averages of all matching rows.
    Mean,
}

impl std::str::FromStr for BlankPolicy {
    type Err = AssayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(BlankPolicy::First),
            "mean" | "average" => Ok(BlankPolicy::Mean),
            other => Err(AssayError::invalid(
                "blank policy",
                format!("expected 'first' or 'mean', got '{other}'"),
            )),
        }
    }
}

/// Non-fatal conditions that affect how far results can be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// No row matched the blank label; no background was subtracted.
    MissingBlank { label: String },
    /// Several rows matched the blank label.
    MultipleBlanks {
        label: String,
        count: usize,
        policy: BlankPolicy,
    },
    /// R² below the acceptance threshold.
    PoorFit { r_squared: f64, threshold: f64 },
    /// Replicates disagree more than the precision limit.
    HighReplicateCv {
        id: String,
        cv_percent: f64,
        threshold: f64,
    },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::MissingBlank { label } => {
                write!(f, "no blank row labelled '{label}'; OD values are uncorrected")
            }
            Advisory::MultipleBlanks { label, count, policy } => write!(
                f,
                "{count} rows match blank label '{label}'; combined with policy {policy:?}"
            ),
            Advisory::PoorFit { r_squared, threshold } => write!(
                f,
                "standard curve R²={r_squared:.4} is below the acceptance threshold {threshold:.2}"
            ),
            Advisory::HighReplicateCv {
                id,
                cv_percent,
                threshold,
            } => write!(
                f,
                "replicate CV for '{id}' is {cv_percent:.1}% (limit {threshold:.1}%)"
            ),
        }
    }
}

/// A computed value together with the advisories raised while computing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reported<T> {
    pub value: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Reported<T> {
    pub fn new(value: T, advisories: Vec<Advisory>) -> Self {
        Self { value, advisories }
    }

    pub fn has_advisories(&self) -> bool {
        !self.advisories.is_empty()
    }
}
