//! Background (blank) correction.

use tracing::{debug, warn};

use crate::domain::{
    Advisory, BlankPolicy, CorrectedMeasurement, CorrectedPlate, CorrectedStandard, Measurement,
    Reported, StandardPoint,
};
use crate::error::AssayError;
use crate::math::mean;
use crate::preprocess::replicates::{average, replicate_cv};

/// Average every measurement and subtract the blank average.
///
/// - Blank rows are matched case-insensitively against `blank_label`.
/// - No blank: `Advisory::MissingBlank`, nothing is subtracted.
/// - Several blanks: combined per `policy`, with `Advisory::MultipleBlanks`.
/// - Every blank row gets `corrected_od == 0.0` exactly.
pub fn correct(
    measurements: &[Measurement],
    blank_label: &str,
    policy: BlankPolicy,
) -> Result<Reported<CorrectedPlate>, AssayError> {
    if measurements.is_empty() {
        return Err(AssayError::invalid("plate", "no measurements supplied"));
    }

    let averages = measurements
        .iter()
        .map(average)
        .collect::<Result<Vec<f64>, AssayError>>()?;

    let blank_idx: Vec<usize> = measurements
        .iter()
        .enumerate()
        .filter(|(_, m)| m.matches_label(blank_label))
        .map(|(i, _)| i)
        .collect();

    let mut advisories = Vec::new();
    let blank_average = match blank_idx.as_slice() {
        [] => {
            warn!(label = blank_label, "no blank found; OD values left uncorrected");
            advisories.push(Advisory::MissingBlank {
                label: blank_label.to_string(),
            });
            0.0
        }
        [only] => averages[*only],
        [first, ..] => {
            warn!(
                label = blank_label,
                count = blank_idx.len(),
                ?policy,
                "multiple blank rows found"
            );
            advisories.push(Advisory::MultipleBlanks {
                label: blank_label.to_string(),
                count: blank_idx.len(),
                policy,
            });
            match policy {
                BlankPolicy::First => averages[*first],
                BlankPolicy::Mean => {
                    let values: Vec<f64> = blank_idx.iter().map(|&i| averages[i]).collect();
                    mean(&values).unwrap_or(0.0)
                }
            }
        }
    };
    debug!(blank_average, n = measurements.len(), "blank correction");

    let mut out = Vec::with_capacity(measurements.len());
    for (i, m) in measurements.iter().enumerate() {
        let is_blank = blank_idx.contains(&i);
        let corrected_od = if is_blank {
            0.0
        } else {
            averages[i] - blank_average
        };
        out.push(CorrectedMeasurement {
            id: m.id.clone(),
            replicates: m.replicates.clone(),
            average_od: averages[i],
            corrected_od,
            is_blank,
            cv_percent: replicate_cv(m)?,
        });
    }

    Ok(Reported::new(
        CorrectedPlate {
            blank_average,
            measurements: out,
        },
        advisories,
    ))
}

/// Average each standard and subtract the plate's blank average.
///
/// Standards are never forced to zero, even a zero-concentration calibrator.
pub fn correct_standards(
    standards: &[StandardPoint],
    blank_average: f64,
) -> Result<Vec<CorrectedStandard>, AssayError> {
    if !blank_average.is_finite() {
        return Err(AssayError::invalid(
            "blank average",
            format!("must be finite, got {blank_average}"),
        ));
    }

    standards
        .iter()
        .map(|s| {
            s.validate()?;
            let average_od = average(&s.measurement)?;
            Ok(CorrectedStandard {
                id: s.measurement.id.clone(),
                concentration: s.concentration,
                average_od,
                corrected_od: average_od - blank_average,
            })
        })
        .collect()
}

/// Flag non-blank rows whose replicate CV exceeds `max_cv_percent`.
pub fn flag_replicate_precision(plate: &CorrectedPlate, max_cv_percent: f64) -> Vec<Advisory> {
    plate
        .measurements
        .iter()
        .filter(|m| !m.is_blank)
        .filter_map(|m| {
            let cv = m.cv_percent?;
            (cv > max_cv_percent).then(|| {
                warn!(id = %m.id, cv, "replicate CV above limit");
                Advisory::HighReplicateCv {
                    id: m.id.clone(),
                    cv_percent: cv,
                    threshold: max_cv_percent,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate(rows: &[(&str, f64, f64)]) -> Vec<Measurement> {
        rows.iter()
            .map(|&(id, od1, od2)| Measurement::new(id, vec![od1, od2]).unwrap())
            .collect()
    }

    fn by_id<'a>(plate: &'a CorrectedPlate, id: &str) -> &'a CorrectedMeasurement {
        plate.measurements.iter().find(|m| m.id == id).unwrap()
    }

    #[test]
    fn subtracts_blank_and_zeroes_blank_row() {
        let rows = plate(&[("Sample1", 0.5, 0.5), ("BLANK", 0.1, 0.1)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert!(!out.has_advisories());
        assert!((out.value.blank_average - 0.1).abs() < 1e-12);
        assert!((by_id(&out.value, "Sample1").corrected_od - 0.4).abs() < 1e-12);

        let blank = by_id(&out.value, "BLANK");
        assert!(blank.is_blank);
        assert_eq!(blank.corrected_od, 0.0);
    }

    #[test]
    fn blank_match_is_case_insensitive() {
        let rows = plate(&[("Sample1", 0.6, 0.6), ("blank", 0.2, 0.2)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert!((out.value.measurements[0].corrected_od - 0.4).abs() < 1e-10);
    }

    #[test]
    fn missing_blank_is_an_advisory_not_an_error() {
        let rows = plate(&[("Sample1", 0.5, 0.5), ("Sample2", 0.6, 0.6)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert_eq!(out.value.blank_average, 0.0);
        assert_eq!(
            out.advisories,
            vec![Advisory::MissingBlank {
                label: "BLANK".to_string()
            }]
        );
        let corrected: Vec<f64> = out.value.measurements.iter().map(|m| m.corrected_od).collect();
        assert_eq!(corrected, vec![0.5, 0.6]);
    }

    #[test]
    fn negative_corrected_od_is_kept() {
        let rows = plate(&[("Sample1", 0.1, 0.1), ("BLANK", 0.5, 0.5)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert!((out.value.measurements[0].corrected_od + 0.4).abs() < 1e-12);
    }

    #[test]
    fn multiple_blanks_follow_policy() {
        let rows = plate(&[
            ("BLANK", 0.10, 0.10),
            ("S1", 0.50, 0.50),
            ("Blank", 0.20, 0.20),
        ]);

        let first = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert!((first.value.blank_average - 0.10).abs() < 1e-12);
        assert!(matches!(
            first.advisories.as_slice(),
            [Advisory::MultipleBlanks { count: 2, .. }]
        ));

        let mean = correct(&rows, "BLANK", BlankPolicy::Mean).unwrap();
        assert!((mean.value.blank_average - 0.15).abs() < 1e-12);
        assert!((mean.value.measurements[1].corrected_od - 0.35).abs() < 1e-12);
        // Both blank rows are zeroed regardless of policy.
        assert_eq!(mean.value.measurements[0].corrected_od, 0.0);
        assert_eq!(mean.value.measurements[2].corrected_od, 0.0);
    }

    #[test]
    fn preserves_order_and_row_count() {
        let rows = plate(&[
            ("S1", 0.4, 0.4),
            ("S2", 0.5, 0.5),
            ("S3", 0.6, 0.6),
            ("BLANK", 0.1, 0.1),
        ]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        let ids: Vec<&str> = out.value.measurements.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3", "BLANK"]);
    }

    #[test]
    fn typical_plate() {
        let rows = plate(&[
            ("Sample1", 0.443, 0.488),
            ("Sample2", 0.433, 0.43),
            ("Sample3", 0.343, 0.351),
            ("BLANK", 0.110, 0.135),
        ]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        let s1 = by_id(&out.value, "Sample1");
        assert!((s1.average_od - 0.4655).abs() < 1e-9);
        assert!((out.value.blank_average - 0.1225).abs() < 1e-9);
        assert!((s1.corrected_od - 0.3430).abs() < 1e-4);
        assert_eq!(by_id(&out.value, "BLANK").corrected_od, 0.0);
    }

    #[test]
    fn extreme_values() {
        let rows = plate(&[("Sample1", 100.0, 100.0), ("BLANK", 1.0, 1.0)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert_eq!(out.value.measurements[0].corrected_od, 99.0);

        let rows = plate(&[("Sample1", 0.0001, 0.0001), ("BLANK", 0.0, 0.0)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        assert!((out.value.measurements[0].corrected_od - 0.0001).abs() < 1e-10);
    }

    #[test]
    fn rejects_empty_plate_and_bad_rows() {
        assert!(correct(&[], "BLANK", BlankPolicy::First).is_err());

        let rows = vec![Measurement {
            id: "S1".to_string(),
            replicates: vec![],
        }];
        assert!(matches!(
            correct(&rows, "BLANK", BlankPolicy::First),
            Err(AssayError::InvalidInput { .. })
        ));
    }

    #[test]
    fn standards_use_plate_blank() {
        let standards = vec![
            StandardPoint::new("Std1", vec![0.40, 0.44], 2.0).unwrap(),
            StandardPoint::new("Std0", vec![0.12, 0.12], 0.0).unwrap(),
        ];
        let out = correct_standards(&standards, 0.1225).unwrap();
        assert!((out[0].corrected_od - (0.42 - 0.1225)).abs() < 1e-12);
        assert!((out[1].corrected_od - (0.12 - 0.1225)).abs() < 1e-12);
        assert!(correct_standards(&standards, f64::NAN).is_err());
    }

    #[test]
    fn flags_imprecise_duplicates() {
        let rows = plate(&[("Good", 0.50, 0.52), ("Bad", 0.30, 0.60), ("BLANK", 0.01, 0.2)]);
        let out = correct(&rows, "BLANK", BlankPolicy::First).unwrap();
        let flags = flag_replicate_precision(&out.value, 15.0);
        assert_eq!(flags.len(), 1);
        assert!(matches!(&flags[0], Advisory::HighReplicateCv { id, .. } if id == "Bad"));
    }
}
