//! Daily reduction
//!
//! Collapses one calendar day's normalized records into a `DailySummary`.
//! Every rule here is a pure function of the day's record set: re-running
//! the reduction after new records arrive fully replaces the prior summary,
//! so a corrected sensor read can legitimately lower a value.

use crate::types::{CanonicalValue, DailySummary, Metric, NormalizedRecord};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Largest step record below this count is treated as a per-interval delta
/// rather than a cumulative daily total.
const CUMULATIVE_STEPS_THRESHOLD: f64 = 100.0;

/// Sleep sessions outside `(0, 24]` hours are sensor or clock errors and are
/// dropped, not clamped.
const MAX_SLEEP_SESSION_HOURS: f64 = 24.0;

/// Reduce one day's records into a summary.
///
/// Records whose `collected_at` falls outside `[day 00:00, day+1 00:00)` are
/// ignored; callers may pass an unfiltered set.
pub fn reduce_day(records: &[NormalizedRecord], day: NaiveDate) -> DailySummary {
    let day_start = day.and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + chrono::Duration::days(1);
    let in_day = |at: DateTime<Utc>| at >= day_start && at < day_end;

    let mut summary = DailySummary::empty(day);

    let mut step_values: Vec<f64> = Vec::new();
    let mut total_calories = 0.0;
    let mut active_calories = 0.0;
    let mut distance_meters = 0.0;
    let mut latest_heart_rate: Option<(DateTime<Utc>, f64)> = None;
    let mut latest_weight: Option<(DateTime<Utc>, f64)> = None;
    let mut latest_oxygen: Option<(DateTime<Utc>, f64)> = None;

    for record in records.iter().filter(|r| in_day(r.collected_at)) {
        let scalar = record.value.scalar();
        match (record.metric, scalar) {
            (Metric::Steps, Some(count)) => step_values.push(count),
            (Metric::TotalCalories, Some(kcal)) => total_calories += kcal,
            (Metric::ActiveCalories, Some(kcal)) => active_calories += kcal,
            (Metric::Distance, Some(meters)) => distance_meters += meters,
            (Metric::HeartRate, Some(bpm)) => {
                keep_latest(&mut latest_heart_rate, record.collected_at, bpm);
            }
            (Metric::Weight, Some(kg)) => {
                keep_latest(&mut latest_weight, record.collected_at, kg);
            }
            (Metric::BloodOxygen, Some(pct)) => {
                keep_latest(&mut latest_oxygen, record.collected_at, pct);
            }
            (Metric::SleepSession, Some(hours)) => {
                if hours > 0.0 && hours <= MAX_SLEEP_SESSION_HOURS {
                    summary.sleep_hours += hours;
                }
            }
            _ => {}
        }
    }

    summary.steps = reduce_steps(&step_values);
    // Active and total streams usually cover the same activity; taking the
    // larger of the two sums avoids double counting.
    summary.calories = total_calories.max(active_calories);
    summary.distance_km = round2(distance_meters / 1000.0);
    summary.sleep_hours = round1(summary.sleep_hours);
    summary.heart_rate = latest_heart_rate
        .map(|(_, bpm)| bpm.round() as u16)
        .unwrap_or(0);
    summary.weight_kg = latest_weight.map(|(_, kg)| round2(kg)).unwrap_or(0.0);
    summary.oxygen_pct = latest_oxygen.map(|(_, pct)| pct);
    summary
}

/// Two-tier step rule.
///
/// Sources disagree about whether a step record is a cumulative daily total
/// or a per-interval delta, and there is no discriminating field. A
/// sufficiently large maximum is taken as the daily total; otherwise every
/// record is a delta and they are summed.
fn reduce_steps(values: &[f64]) -> u64 {
    let largest = values.iter().cloned().fold(0.0f64, f64::max);
    if largest >= CUMULATIVE_STEPS_THRESHOLD {
        largest as u64
    } else {
        values.iter().sum::<f64>() as u64
    }
}

fn keep_latest(slot: &mut Option<(DateTime<Utc>, f64)>, at: DateTime<Utc>, value: f64) {
    match slot {
        Some((current, _)) if *current > at => {}
        _ => *slot = Some((at, value)),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use pretty_assertions::assert_eq;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn record(metric: Metric, value: f64, at: &str) -> NormalizedRecord {
        NormalizedRecord {
            metric,
            value: CanonicalValue::Scalar(value),
            collected_at: at.parse().unwrap(),
            source: SourceKind::Aggregator,
            source_label: "Samsung Health".to_string(),
        }
    }

    #[test]
    fn steps_take_largest_cumulative_record() {
        let records = vec![
            record(Metric::Steps, 50.0, "2024-03-05T08:00:00Z"),
            record(Metric::Steps, 8000.0, "2024-03-05T12:00:00Z"),
            record(Metric::Steps, 120.0, "2024-03-05T13:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).steps, 8000);
    }

    #[test]
    fn small_step_records_fall_back_to_summing() {
        let records = vec![
            record(Metric::Steps, 10.0, "2024-03-05T08:00:00Z"),
            record(Metric::Steps, 40.0, "2024-03-05T09:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).steps, 50);
    }

    #[test]
    fn calories_take_max_of_separate_sums() {
        let records = vec![
            record(Metric::TotalCalories, 1000.0, "2024-03-05T10:00:00Z"),
            record(Metric::TotalCalories, 800.0, "2024-03-05T18:00:00Z"),
            record(Metric::ActiveCalories, 400.0, "2024-03-05T18:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).calories, 1800.0);
    }

    #[test]
    fn distance_sums_and_converts_to_km() {
        let records = vec![
            record(Metric::Distance, 500.0, "2024-03-05T10:00:00Z"),
            record(Metric::Distance, 1200.0, "2024-03-05T15:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).distance_km, 1.70);
    }

    #[test]
    fn heart_rate_latest_reading_wins() {
        let records = vec![
            record(Metric::HeartRate, 90.0, "2024-03-05T08:00:00Z"),
            record(Metric::HeartRate, 62.0, "2024-03-05T21:00:00Z"),
            record(Metric::HeartRate, 75.0, "2024-03-05T12:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).heart_rate, 62);
    }

    #[test]
    fn weight_is_latest_not_summed() {
        let records = vec![
            record(Metric::Weight, 82.0, "2024-03-05T07:00:00Z"),
            record(Metric::Weight, 81.4, "2024-03-05T20:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).weight_kg, 81.4);
    }

    #[test]
    fn sleep_sums_valid_sessions_and_drops_out_of_range() {
        let records = vec![
            record(Metric::SleepSession, 7.5, "2024-03-05T06:30:00Z"),
            // 25-hour session: clock error, contributes nothing.
            record(Metric::SleepSession, 25.0, "2024-03-05T07:00:00Z"),
            record(Metric::SleepSession, 0.0, "2024-03-05T08:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).sleep_hours, 7.5);
    }

    #[test]
    fn oxygen_absent_without_real_reading() {
        let records = vec![record(Metric::Steps, 5000.0, "2024-03-05T08:00:00Z")];
        assert_eq!(reduce_day(&records, day()).oxygen_pct, None);
    }

    #[test]
    fn oxygen_uses_latest_real_reading() {
        let records = vec![
            record(Metric::BloodOxygen, 96.0, "2024-03-05T08:00:00Z"),
            record(Metric::BloodOxygen, 97.0, "2024-03-05T12:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).oxygen_pct, Some(97.0));
    }

    #[test]
    fn records_outside_the_day_are_ignored() {
        let records = vec![
            record(Metric::Steps, 9000.0, "2024-03-04T23:59:00Z"),
            record(Metric::Steps, 3000.0, "2024-03-05T10:00:00Z"),
            record(Metric::Steps, 7000.0, "2024-03-06T00:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()).steps, 3000);
    }

    #[test]
    fn reduction_is_idempotent() {
        let records = vec![
            record(Metric::Steps, 8000.0, "2024-03-05T12:00:00Z"),
            record(Metric::HeartRate, 62.0, "2024-03-05T21:00:00Z"),
            record(Metric::TotalCalories, 1800.0, "2024-03-05T18:00:00Z"),
        ];
        assert_eq!(reduce_day(&records, day()), reduce_day(&records, day()));
    }

    #[test]
    fn empty_day_reduces_to_empty_summary() {
        assert_eq!(reduce_day(&[], day()), DailySummary::empty(day()));
    }

    #[test]
    fn water_stays_reserved_at_zero() {
        let records = vec![record(Metric::Steps, 5000.0, "2024-03-05T08:00:00Z")];
        assert_eq!(reduce_day(&records, day()).water_l, 0.0);
    }
}
