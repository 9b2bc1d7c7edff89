//! Replicate averaging and precision.

use crate::domain::Measurement;
use crate::error::AssayError;
use crate::math::{mean, population_std};

/// Mean of all replicate OD values.
pub fn average(measurement: &Measurement) -> Result<f64, AssayError> {
    measurement.validate()?;
    mean(&measurement.replicates).ok_or_else(|| {
        AssayError::invalid(
            format!("measurement '{}'", measurement.id),
            "no replicate OD values",
        )
    })
}

/// Replicate coefficient of variation in percent (`std / mean * 100`, ddof = 0).
///
/// `None` when the mean OD is exactly zero.
pub fn replicate_cv(measurement: &Measurement) -> Result<Option<f64>, AssayError> {
    let m = average(measurement)?;
    if m == 0.0 {
        return Ok(None);
    }
    let sd = population_std(&measurement.replicates).unwrap_or(0.0);
    Ok(Some((sd / m.abs()) * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(id: &str, reps: &[f64]) -> Measurement {
        Measurement {
            id: id.to_string(),
            replicates: reps.to_vec(),
        }
    }

    #[test]
    fn average_of_duplicates() {
        assert_eq!(average(&m("S1", &[0.4, 0.6])).unwrap(), 0.5);
        assert_eq!(average(&m("S2", &[0.5, 0.5])).unwrap(), 0.5);
        assert_eq!(average(&m("B", &[0.0, 0.0])).unwrap(), 0.0);

        let avg = average(&m("S1", &[0.443, 0.488])).unwrap();
        assert!((avg - (0.443 + 0.488) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn average_handles_more_replicates() {
        let avg = average(&m("S1", &[0.1, 0.2, 0.3, 0.4])).unwrap();
        assert!((avg - 0.25).abs() < 1e-12);
    }

    #[test]
    fn average_rejects_empty_replicates() {
        let err = average(&m("S9", &[])).unwrap_err();
        match err {
            AssayError::InvalidInput { subject, .. } => assert!(subject.contains("S9")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cv_of_good_duplicates_is_small() {
        let cv = replicate_cv(&m("S1", &[0.443, 0.488])).unwrap().unwrap();
        assert!((cv - 0.0225 / 0.4655 * 100.0).abs() < 1e-9);
        assert!(cv < 15.0);
        assert_eq!(replicate_cv(&m("B", &[0.0, 0.0])).unwrap(), None);
    }
}
