//! Measurement normalization
//!
//! Converts raw, source-shaped measurements into canonical records ready for
//! persistence and reduction. Malformed input (missing end time, inverted
//! interval, negative or non-finite value) is dropped here; nothing past
//! this boundary ever sees it.

use crate::types::{CanonicalValue, Metric, NormalizedRecord, RawMeasurement, RawValue};
use tracing::debug;

/// Normalizer for converting raw measurements to canonical records.
pub struct Normalizer;

impl Normalizer {
    /// Normalize one raw measurement.
    ///
    /// Returns `None` when the measurement is invalid; the offending unit is
    /// dropped, never propagated as an error.
    pub fn normalize(raw: &RawMeasurement) -> Option<NormalizedRecord> {
        let Some(end_time) = raw.end_time else {
            debug!(metric = raw.metric.as_str(), "measurement without end time dropped");
            return None;
        };
        if let Some(start) = raw.start_time {
            if end_time < start {
                debug!(metric = raw.metric.as_str(), "inverted time interval dropped");
                return None;
            }
        }

        let value = match &raw.value {
            RawValue::Scalar(v) => {
                if !valid_scalar(*v) {
                    debug!(metric = raw.metric.as_str(), value = *v, "invalid scalar dropped");
                    return None;
                }
                CanonicalValue::Scalar(*v)
            }
            RawValue::Pair { systolic, diastolic } => {
                if raw.metric != Metric::BloodPressure
                    || !valid_scalar(*systolic)
                    || !valid_scalar(*diastolic)
                {
                    return None;
                }
                CanonicalValue::BloodPressure {
                    systolic: *systolic,
                    diastolic: *diastolic,
                }
            }
            RawValue::Interval { start, end } => {
                if raw.metric != Metric::SleepSession {
                    return None;
                }
                // Canonical unit for sessions is hours. Out-of-range
                // durations are a reduction concern, not a validity one.
                let hours = (*end - *start).num_seconds() as f64 / 3600.0;
                CanonicalValue::Scalar(hours)
            }
        };

        Some(NormalizedRecord {
            metric: raw.metric,
            value,
            collected_at: end_time,
            source: raw.source,
            source_label: raw.source_label.clone(),
        })
    }
}

fn valid_scalar(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;

    fn at(text: &str) -> DateTime<Utc> {
        text.parse().unwrap()
    }

    fn raw(metric: Metric, value: RawValue) -> RawMeasurement {
        RawMeasurement {
            metric,
            value,
            start_time: Some(at("2024-03-05T08:00:00Z")),
            end_time: Some(at("2024-03-05T09:00:00Z")),
            source: SourceKind::Aggregator,
            source_label: "Samsung Health".to_string(),
        }
    }

    #[test]
    fn scalar_passes_through_with_end_time_as_collected_at() {
        let record = Normalizer::normalize(&raw(Metric::Steps, RawValue::Scalar(8000.0))).unwrap();
        assert_eq!(record.value, CanonicalValue::Scalar(8000.0));
        assert_eq!(record.collected_at, at("2024-03-05T09:00:00Z"));
        assert_eq!(record.source_label, "Samsung Health");
    }

    #[test]
    fn missing_end_time_is_discarded() {
        let mut m = raw(Metric::Steps, RawValue::Scalar(100.0));
        m.end_time = None;
        assert!(Normalizer::normalize(&m).is_none());
    }

    #[test]
    fn inverted_interval_is_discarded() {
        let mut m = raw(Metric::Steps, RawValue::Scalar(100.0));
        m.start_time = Some(at("2024-03-05T10:00:00Z"));
        assert!(Normalizer::normalize(&m).is_none());
    }

    #[test]
    fn negative_and_non_finite_scalars_are_discarded() {
        assert!(Normalizer::normalize(&raw(Metric::Weight, RawValue::Scalar(-1.0))).is_none());
        assert!(
            Normalizer::normalize(&raw(Metric::Weight, RawValue::Scalar(f64::NAN))).is_none()
        );
    }

    #[test]
    fn sleep_interval_becomes_hours() {
        let m = raw(
            Metric::SleepSession,
            RawValue::Interval {
                start: at("2024-03-04T23:00:00Z"),
                end: at("2024-03-05T06:30:00Z"),
            },
        );
        let record = Normalizer::normalize(&m).unwrap();
        assert_eq!(record.value, CanonicalValue::Scalar(7.5));
    }

    #[test]
    fn pair_is_only_valid_for_blood_pressure() {
        let good = raw(
            Metric::BloodPressure,
            RawValue::Pair {
                systolic: 121.0,
                diastolic: 78.0,
            },
        );
        assert!(Normalizer::normalize(&good).is_some());

        let bad = raw(
            Metric::HeartRate,
            RawValue::Pair {
                systolic: 121.0,
                diastolic: 78.0,
            },
        );
        assert!(Normalizer::normalize(&bad).is_none());
    }
}
