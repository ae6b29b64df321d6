//! Core types for the VitalSync engine
//!
//! This module defines the data structures that flow through the acquisition
//! pipeline: raw source measurements, normalized records ready for
//! persistence, and the per-day summary derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metric kinds the engine knows how to normalize.
///
/// Anything outside this enum is a programming error at the call site, not a
/// runtime case: sources are only ever queried for types listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    Steps,
    ActiveCalories,
    TotalCalories,
    Distance,
    SleepSession,
    Weight,
    Height,
    BloodOxygen,
    BloodPressure,
    Temperature,
    BodyFat,
    LeanMass,
    BoneMass,
    BodyWater,
    BasalMetabolicRate,
    Battery,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::Steps => "steps",
            Metric::ActiveCalories => "active_calories",
            Metric::TotalCalories => "total_calories",
            Metric::Distance => "distance",
            Metric::SleepSession => "sleep_session",
            Metric::Weight => "weight",
            Metric::Height => "height",
            Metric::BloodOxygen => "blood_oxygen",
            Metric::BloodPressure => "blood_pressure",
            Metric::Temperature => "temperature",
            Metric::BodyFat => "body_fat",
            Metric::LeanMass => "lean_mass",
            Metric::BoneMass => "bone_mass",
            Metric::BodyWater => "body_water",
            Metric::BasalMetabolicRate => "basal_metabolic_rate",
            Metric::Battery => "battery",
        }
    }
}

/// Which acquisition path produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RadioLink,
    Aggregator,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::RadioLink => "radio_link",
            SourceKind::Aggregator => "aggregator",
        }
    }
}

/// Value payload of a raw measurement before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    /// A single scalar in the source's unit for the metric.
    Scalar(f64),
    /// Systolic/diastolic pair in mmHg.
    Pair { systolic: f64, diastolic: f64 },
    /// A session interval (sleep); the value is the interval itself.
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// One observation exactly as delivered by a source.
///
/// `end_time` is authoritative for which day the observation belongs to; a
/// measurement without one is invalid and is discarded at normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub metric: Metric,
    pub value: RawValue,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub source: SourceKind,
    /// Opaque vendor/device label ("Samsung Health", "Galaxy Watch4", ...).
    pub source_label: String,
}

/// Canonical value of a normalized record.
///
/// Canonical units: bpm, count, kcal, meters, hours, kg, percent, mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalValue {
    Scalar(f64),
    BloodPressure { systolic: f64, diastolic: f64 },
}

impl CanonicalValue {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            CanonicalValue::Scalar(v) => Some(*v),
            CanonicalValue::BloodPressure { .. } => None,
        }
    }
}

/// One canonical, source-tagged observation ready for persistence and
/// reduction. Immutable once created.
///
/// Re-syncing the same window can legitimately produce duplicates; the
/// identity `(metric, collected_at, source_label)` plus the user id attached
/// at persistence time is what makes them identifiable downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub metric: Metric,
    pub value: CanonicalValue,
    /// Source end time; authoritative for day membership.
    pub collected_at: DateTime<Utc>,
    pub source: SourceKind,
    pub source_label: String,
}

/// Opaque stable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Map a legacy numeric account id onto a stable synthetic UUID.
    ///
    /// Pre-migration accounts carry plain integer ids; records tagged with
    /// them must keep hashing to the same identity forever.
    pub fn from_legacy_numeric(id: u32) -> Self {
        let text = format!("00000000-0000-4000-8000-{:08}0000", id);
        // The format string above always yields a valid UUID.
        UserId(Uuid::parse_str(&text).unwrap_or_else(|_| Uuid::nil()))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One sparse row of the durable store: only the columns relevant to the
/// record's metric are populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedRow {
    pub user_id: Option<UserId>,
    pub source: String,
    pub device_label: String,
    pub collected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_oxygen_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_temperature_c: Option<f64>,
    /// Catch-all column for body-composition metrics (height, body fat,
    /// lean mass, bone mass, body water, BMR) that have no dedicated column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_value: Option<f64>,
    /// Metric tag for rows stored through `generic_value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_metric: Option<Metric>,
}

impl PersistedRow {
    /// Project a normalized record onto the sparse row shape.
    pub fn from_record(user_id: Option<UserId>, record: &NormalizedRecord) -> Self {
        let mut row = PersistedRow {
            user_id,
            source: record.source.as_str().to_string(),
            device_label: record.source_label.clone(),
            collected_at: record.collected_at,
            ..Default::default()
        };
        match (record.metric, record.value) {
            (Metric::HeartRate, CanonicalValue::Scalar(v)) => row.heart_rate = Some(v),
            (Metric::Steps, CanonicalValue::Scalar(v)) => row.steps = Some(v),
            (Metric::ActiveCalories, CanonicalValue::Scalar(v))
            | (Metric::TotalCalories, CanonicalValue::Scalar(v)) => row.calories = Some(v),
            (Metric::Distance, CanonicalValue::Scalar(v)) => row.distance_m = Some(v),
            (Metric::Weight, CanonicalValue::Scalar(v)) => row.weight_kg = Some(v),
            (Metric::SleepSession, CanonicalValue::Scalar(v)) => row.sleep_hours = Some(v),
            (Metric::BloodOxygen, CanonicalValue::Scalar(v)) => row.blood_oxygen_pct = Some(v),
            (Metric::Temperature, CanonicalValue::Scalar(v)) => row.body_temperature_c = Some(v),
            (_, CanonicalValue::BloodPressure { systolic, diastolic }) => {
                row.blood_pressure_systolic = Some(systolic);
                row.blood_pressure_diastolic = Some(diastolic);
            }
            (metric, CanonicalValue::Scalar(v)) => {
                row.generic_value = Some(v);
                row.generic_metric = Some(metric);
            }
        }
        row
    }
}

/// Derived aggregate of one user's metrics for one calendar day.
///
/// Recomputed from scratch on every sync cycle; never patched incrementally.
/// A later cycle fully supersedes an earlier one, so no field is guaranteed
/// to grow monotonically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub steps: u64,
    /// Latest reading of the day; 0 when no reading exists.
    pub heart_rate: u16,
    /// max(sum of total-calorie records, sum of active-calorie records).
    pub calories: f64,
    pub distance_km: f64,
    pub sleep_hours: f64,
    /// Latest weighing of the day; 0 when none exists.
    pub weight_kg: f64,
    /// Reserved; no acquisition path sources water intake yet.
    pub water_l: f64,
    /// Latest same-day blood-oxygen reading. `None` when no real reading
    /// exists; no placeholder value is ever fabricated.
    pub oxygen_pct: Option<f64>,
}

impl DailySummary {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: 0,
            heart_rate: 0,
            calories: 0.0,
            distance_km: 0.0,
            sleep_hours: 0.0,
            weight_kg: 0.0,
            water_l: 0.0,
            oxygen_pct: None,
        }
    }
}

/// Short machine-readable connectivity verdict exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    NoDevice,
    SyncStale,
    Connected,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::NoDevice => "NO_DEVICE",
            StatusCode::SyncStale => "SYNC_STALE",
            StatusCode::Connected => "CONNECTED",
        }
    }
}

/// Connectivity report: whether a radio-link device is live, whether the
/// aggregator produced fresh same-day data, and a short recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub code: StatusCode,
    pub radio_device_connected: bool,
    pub aggregator_fresh: bool,
    pub last_record_at: Option<DateTime<Utc>>,
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_numeric_user_id_is_stable() {
        let id = UserId::from_legacy_numeric(7);
        assert_eq!(id.to_string(), "00000000-0000-4000-8000-000000070000");
        assert_eq!(id, UserId::from_legacy_numeric(7));
    }

    #[test]
    fn uuid_user_ids_pass_through_display() {
        let raw = Uuid::new_v4();
        assert_eq!(UserId(raw).to_string(), raw.to_string());
    }

    #[test]
    fn persisted_row_populates_only_matching_column() {
        let record = NormalizedRecord {
            metric: Metric::Weight,
            value: CanonicalValue::Scalar(81.4),
            collected_at: Utc::now(),
            source: SourceKind::Aggregator,
            source_label: "Samsung Health".to_string(),
        };
        let row = PersistedRow::from_record(None, &record);
        assert_eq!(row.weight_kg, Some(81.4));
        assert_eq!(row.steps, None);
        assert_eq!(row.heart_rate, None);
        assert_eq!(row.device_label, "Samsung Health");
    }

    #[test]
    fn persisted_row_routes_blood_pressure_to_pair_columns() {
        let record = NormalizedRecord {
            metric: Metric::BloodPressure,
            value: CanonicalValue::BloodPressure {
                systolic: 121.0,
                diastolic: 78.0,
            },
            collected_at: Utc::now(),
            source: SourceKind::RadioLink,
            source_label: "Galaxy Watch4".to_string(),
        };
        let row = PersistedRow::from_record(None, &record);
        assert_eq!(row.blood_pressure_systolic, Some(121.0));
        assert_eq!(row.blood_pressure_diastolic, Some(78.0));
    }

    #[test]
    fn body_composition_metrics_use_the_generic_column() {
        let record = NormalizedRecord {
            metric: Metric::BoneMass,
            value: CanonicalValue::Scalar(3.1),
            collected_at: Utc::now(),
            source: SourceKind::Aggregator,
            source_label: "Mi Health".to_string(),
        };
        let row = PersistedRow::from_record(None, &record);
        assert_eq!(row.generic_value, Some(3.1));
        assert_eq!(row.generic_metric, Some(Metric::BoneMass));
    }
}
