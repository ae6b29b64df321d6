//! Record field extraction
//!
//! Platform aggregators mirror records written by many vendor apps, and the
//! apps disagree about field naming: calories arrive as
//! `energy.inKilocalories`, `energy.value`, a bare `energy` number,
//! `kilocalories`, `calories`, or `value` depending on the writer and its
//! version. Each logical value therefore has an explicit ordered list of
//! named extractors, tried in sequence; the first match wins and a record
//! matching none of them is dropped.

use crate::types::{Metric, RawMeasurement, RawValue, SourceKind};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::RecordType;

/// One named way of pulling a scalar out of a loosely-shaped record.
pub struct Extractor {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<f64>,
}

fn number_at<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key)?;
    }
    Some(cursor)
}

fn f64_at(value: &Value, path: &[&str]) -> Option<f64> {
    number_at(value, path)?.as_f64()
}

pub const ENERGY_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "energy.inKilocalories",
        extract: |v| f64_at(v, &["energy", "inKilocalories"]),
    },
    Extractor {
        name: "energy.value",
        extract: |v| f64_at(v, &["energy", "value"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
    Extractor {
        name: "energy",
        extract: |v| f64_at(v, &["energy"]),
    },
    Extractor {
        name: "kilocalories",
        extract: |v| f64_at(v, &["kilocalories"]),
    },
    Extractor {
        name: "calories",
        extract: |v| f64_at(v, &["calories"]),
    },
];

pub const DISTANCE_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "distance.inMeters",
        extract: |v| f64_at(v, &["distance", "inMeters"]),
    },
    Extractor {
        name: "distance.value",
        extract: |v| f64_at(v, &["distance", "value"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
    Extractor {
        name: "distance",
        extract: |v| f64_at(v, &["distance"]),
    },
];

pub const WEIGHT_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "weight.inKilograms",
        extract: |v| f64_at(v, &["weight", "inKilograms"]),
    },
    Extractor {
        name: "weight.value",
        extract: |v| f64_at(v, &["weight", "value"]),
    },
    Extractor {
        name: "mass.inKilograms",
        extract: |v| f64_at(v, &["mass", "inKilograms"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
];

pub const PERCENTAGE_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "percentage.value",
        extract: |v| f64_at(v, &["percentage", "value"]),
    },
    Extractor {
        name: "percentage",
        extract: |v| f64_at(v, &["percentage"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
];

pub const TEMPERATURE_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "temperature.inCelsius",
        extract: |v| f64_at(v, &["temperature", "inCelsius"]),
    },
    Extractor {
        name: "temperature.value",
        extract: |v| f64_at(v, &["temperature", "value"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
];

pub const HEIGHT_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "height.inMeters",
        extract: |v| f64_at(v, &["height", "inMeters"]),
    },
    Extractor {
        name: "height.value",
        extract: |v| f64_at(v, &["height", "value"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
];

pub const BMR_EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "basalMetabolicRate.inKilocaloriesPerDay",
        extract: |v| f64_at(v, &["basalMetabolicRate", "inKilocaloriesPerDay"]),
    },
    Extractor {
        name: "basalMetabolicRate.value",
        extract: |v| f64_at(v, &["basalMetabolicRate", "value"]),
    },
    Extractor {
        name: "value",
        extract: |v| f64_at(v, &["value"]),
    },
];

/// Run an extractor list against a record; first match wins.
pub fn extract_first(record: &Value, extractors: &[Extractor]) -> Option<f64> {
    extractors.iter().find_map(|e| (e.extract)(record))
}

/// Parse a timestamp field that may be RFC 3339 text or epoch millis.
fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(text) = value.as_str() {
        return DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc));
    }
    value
        .as_i64()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

fn time_field(record: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| record.get(*k).and_then(parse_time))
}

/// End timestamp of a record: `endTime` for interval records, `time` for
/// instantaneous ones.
pub fn record_end_time(record: &Value) -> Option<DateTime<Utc>> {
    time_field(record, &["endTime", "time"])
}

fn record_start_time(record: &Value) -> Option<DateTime<Utc>> {
    time_field(record, &["startTime", "time"])
}

/// Friendly label for an aggregator package name; unknown packages pass
/// through unchanged.
pub fn source_label(record: &Value) -> String {
    let package = number_at(record, &["metadata", "dataOrigin", "packageName"])
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match package {
        "com.sec.android.app.shealth" => "Samsung Health",
        "com.google.android.apps.fitness" => "Google Fit",
        "com.fitdays.fitdays" => "FitDays",
        "com.mi.health" => "Mi Health",
        "com.huawei.health" => "Huawei Health",
        "com.fitbit.FitbitMobile" => "Fitbit",
        "com.garmin.android.apps.connectmobile" => "Garmin Connect",
        "com.polar.polarflow" => "Polar Flow",
        "" => "Health Connect",
        other => other,
    }
    .to_string()
}

/// Map one loosely-shaped aggregator record to a raw measurement.
///
/// Returns `None` when no extractor matches or the record carries no usable
/// timestamp; malformed units never cross this boundary.
pub fn parse_record(record_type: RecordType, record: &Value) -> Option<RawMeasurement> {
    let label = source_label(record);
    let start = record_start_time(record);
    let end = record_end_time(record);

    let (metric, value) = match record_type {
        RecordType::HeartRate => {
            // Heart-rate records carry a sample list; the last sample is the
            // most recent reading.
            let samples = record.get("samples")?.as_array()?;
            let bpm = samples
                .last()
                .and_then(|s| f64_at(s, &["beatsPerMinute"]))?;
            (Metric::HeartRate, RawValue::Scalar(bpm))
        }
        RecordType::Steps => {
            let count = f64_at(record, &["count"])?;
            (Metric::Steps, RawValue::Scalar(count))
        }
        RecordType::ActiveCaloriesBurned => (
            Metric::ActiveCalories,
            RawValue::Scalar(extract_first(record, ENERGY_EXTRACTORS)?),
        ),
        RecordType::TotalCaloriesBurned => (
            Metric::TotalCalories,
            RawValue::Scalar(extract_first(record, ENERGY_EXTRACTORS)?),
        ),
        RecordType::Distance => (
            Metric::Distance,
            RawValue::Scalar(extract_first(record, DISTANCE_EXTRACTORS)?),
        ),
        RecordType::SleepSession => {
            let start = start?;
            let end = end?;
            (Metric::SleepSession, RawValue::Interval { start, end })
        }
        RecordType::Weight => (
            Metric::Weight,
            RawValue::Scalar(extract_first(record, WEIGHT_EXTRACTORS)?),
        ),
        RecordType::OxygenSaturation => (
            Metric::BloodOxygen,
            RawValue::Scalar(extract_first(record, PERCENTAGE_EXTRACTORS)?),
        ),
        RecordType::BloodPressure => {
            let systolic = f64_at(record, &["systolic", "inMillimetersOfMercury"])
                .or_else(|| f64_at(record, &["systolic", "value"]))
                .or_else(|| f64_at(record, &["systolic"]))?;
            let diastolic = f64_at(record, &["diastolic", "inMillimetersOfMercury"])
                .or_else(|| f64_at(record, &["diastolic", "value"]))
                .or_else(|| f64_at(record, &["diastolic"]))?;
            (Metric::BloodPressure, RawValue::Pair { systolic, diastolic })
        }
        RecordType::BodyTemperature => (
            Metric::Temperature,
            RawValue::Scalar(extract_first(record, TEMPERATURE_EXTRACTORS)?),
        ),
        RecordType::Height => (
            Metric::Height,
            RawValue::Scalar(extract_first(record, HEIGHT_EXTRACTORS)?),
        ),
        RecordType::BodyFat => (
            Metric::BodyFat,
            RawValue::Scalar(extract_first(record, PERCENTAGE_EXTRACTORS)?),
        ),
        RecordType::LeanBodyMass => (
            Metric::LeanMass,
            RawValue::Scalar(extract_first(record, WEIGHT_EXTRACTORS)?),
        ),
        RecordType::BodyWaterMass => (
            Metric::BodyWater,
            RawValue::Scalar(extract_first(record, WEIGHT_EXTRACTORS)?),
        ),
        RecordType::BoneMass => (
            Metric::BoneMass,
            RawValue::Scalar(extract_first(record, WEIGHT_EXTRACTORS)?),
        ),
        RecordType::BasalMetabolicRate => (
            Metric::BasalMetabolicRate,
            RawValue::Scalar(extract_first(record, BMR_EXTRACTORS)?),
        ),
    };

    Some(RawMeasurement {
        metric,
        value,
        start_time: start,
        end_time: end,
        source: SourceKind::Aggregator,
        source_label: label,
    })
}
