//! Platform health-data aggregator client
//!
//! The aggregator mirrors records written by vendor health apps and serves
//! them by record type and time range. This client owns the
//! availability/initialization state machine, negotiates read permissions
//! over a fixed allow-list, and issues per-type isolated reads: one failing
//! record type contributes zero records and never aborts the batch.

pub mod extract;
mod replay;

pub use replay::ReplayBackend;

use crate::error::AggregatorError;
use crate::types::RawMeasurement;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Record types the engine knows how to normalize. Requesting anything
/// outside this set is a programming error, not a runtime case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Steps,
    HeartRate,
    ActiveCaloriesBurned,
    TotalCaloriesBurned,
    Distance,
    SleepSession,
    Weight,
    OxygenSaturation,
    BloodPressure,
    BodyTemperature,
    Height,
    BodyFat,
    LeanBodyMass,
    BodyWaterMass,
    BoneMass,
    BasalMetabolicRate,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Steps => "Steps",
            RecordType::HeartRate => "HeartRate",
            RecordType::ActiveCaloriesBurned => "ActiveCaloriesBurned",
            RecordType::TotalCaloriesBurned => "TotalCaloriesBurned",
            RecordType::Distance => "Distance",
            RecordType::SleepSession => "SleepSession",
            RecordType::Weight => "Weight",
            RecordType::OxygenSaturation => "OxygenSaturation",
            RecordType::BloodPressure => "BloodPressure",
            RecordType::BodyTemperature => "BodyTemperature",
            RecordType::Height => "Height",
            RecordType::BodyFat => "BodyFat",
            RecordType::LeanBodyMass => "LeanBodyMass",
            RecordType::BodyWaterMass => "BodyWaterMass",
            RecordType::BoneMass => "BoneMass",
            RecordType::BasalMetabolicRate => "BasalMetabolicRate",
        }
    }
}

/// The full permission allow-list the client ever requests.
pub const ALL_RECORD_TYPES: &[RecordType] = &[
    RecordType::Steps,
    RecordType::HeartRate,
    RecordType::ActiveCaloriesBurned,
    RecordType::TotalCaloriesBurned,
    RecordType::Distance,
    RecordType::SleepSession,
    RecordType::Weight,
    RecordType::OxygenSaturation,
    RecordType::BloodPressure,
    RecordType::BodyTemperature,
    RecordType::Height,
    RecordType::BodyFat,
    RecordType::LeanBodyMass,
    RecordType::BodyWaterMass,
    RecordType::BoneMass,
    RecordType::BasalMetabolicRate,
];

/// The lightweight subset polled by the real-time cadence.
pub const REALTIME_RECORD_TYPES: &[RecordType] = &[
    RecordType::HeartRate,
    RecordType::Steps,
    RecordType::ActiveCaloriesBurned,
];

/// Half-open time window `[start, end)` for record reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Midnight of `now`'s calendar day through `now`.
    pub fn today(now: DateTime<Utc>) -> Self {
        let midnight = now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        Self { start: midnight, end: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Platform backend availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAvailability {
    Available,
    UpdateRequired,
    Unavailable(String),
}

/// Seam to the platform record store. Implementations exist for the live
/// platform SDK, the file-replay backend, and test doubles.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn availability(&self) -> BackendAvailability;

    /// One-time initialization; the client retries transient failures.
    async fn initialize(&self) -> Result<(), AggregatorError>;

    /// Request read access; the returned set is the granted subset.
    async fn request_permissions(
        &self,
        types: &[RecordType],
    ) -> Result<Vec<RecordType>, AggregatorError>;

    /// Read loosely-shaped records of one type within a time range.
    async fn read_records(
        &self,
        record_type: RecordType,
        range: &TimeRange,
    ) -> Result<Vec<Value>, AggregatorError>;
}

/// Client state machine. `Ready` and `Unavailable` are terminal for the
/// process lifetime; `permissions_granted` can regress and is re-checked
/// every cycle rather than trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientState {
    Uninitialized,
    Initializing,
    Ready { permissions_granted: bool },
    Unavailable(String),
}

const INIT_ATTEMPTS: u32 = 3;
const INIT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Aggregator client. One instance per process; share behind an `Arc`.
pub struct AggregatorClient {
    backend: Arc<dyn RecordBackend>,
    state: Mutex<ClientState>,
}

impl AggregatorClient {
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(ClientState::Uninitialized),
        }
    }

    /// Check platform support and initialize the backend. Idempotent; the
    /// outcome is cached after the first success or terminal failure.
    pub async fn ensure_initialized(&self) -> Result<(), AggregatorError> {
        let mut state = self.state.lock().await;
        match &*state {
            ClientState::Ready { .. } => return Ok(()),
            ClientState::Unavailable(reason) => {
                return Err(AggregatorError::Unavailable(reason.clone()));
            }
            ClientState::Uninitialized | ClientState::Initializing => {}
        }
        *state = ClientState::Initializing;

        match self.backend.availability().await {
            BackendAvailability::Available => {}
            BackendAvailability::UpdateRequired => {
                let reason = "provider update required".to_string();
                *state = ClientState::Unavailable(reason);
                return Err(AggregatorError::UpdateRequired);
            }
            BackendAvailability::Unavailable(reason) => {
                *state = ClientState::Unavailable(reason.clone());
                return Err(AggregatorError::Unavailable(reason));
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=INIT_ATTEMPTS {
            match self.backend.initialize().await {
                Ok(()) => {
                    info!("record store initialized");
                    *state = ClientState::Ready {
                        permissions_granted: false,
                    };
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, "record store initialization failed: {err}");
                    last_error = err.to_string();
                    if attempt < INIT_ATTEMPTS {
                        tokio::time::sleep(INIT_RETRY_DELAY).await;
                    }
                }
            }
        }
        // Initialization failures are transient by assumption; the state
        // returns to Uninitialized so a later cycle can retry.
        *state = ClientState::Uninitialized;
        Err(AggregatorError::InitFailed(last_error))
    }

    /// Request the fixed allow-list and record what was actually granted.
    /// Partial grants are expected and normal.
    pub async fn request_permissions(
        &self,
        types: &[RecordType],
    ) -> Result<Vec<RecordType>, AggregatorError> {
        self.ensure_initialized().await?;
        let granted = self.backend.request_permissions(types).await?;
        info!(granted = granted.len(), requested = types.len(), "record permissions");
        let mut state = self.state.lock().await;
        if let ClientState::Ready { permissions_granted } = &mut *state {
            *permissions_granted = !granted.is_empty();
        }
        Ok(granted)
    }

    /// Whether the last permission negotiation granted anything.
    pub async fn permissions_granted(&self) -> bool {
        matches!(
            &*self.state.lock().await,
            ClientState::Ready {
                permissions_granted: true
            }
        )
    }

    /// Read one record type, isolated: a failure is logged and yields an
    /// empty list, never an error for the batch.
    async fn read_type_isolated(
        &self,
        record_type: RecordType,
        range: &TimeRange,
    ) -> Vec<RawMeasurement> {
        match self.backend.read_records(record_type, range).await {
            Ok(records) => {
                debug!(
                    record_type = record_type.as_str(),
                    count = records.len(),
                    "records read"
                );
                records
                    .iter()
                    .filter_map(|r| extract::parse_record(record_type, r))
                    .collect()
            }
            Err(err) => {
                warn!(
                    record_type = record_type.as_str(),
                    "read failed, treating as no data: {err}"
                );
                Vec::new()
            }
        }
    }

    /// Read a set of record types concurrently and join the results.
    ///
    /// Permissions are re-negotiated first because the platform can revoke access
    /// between cycles, so the cached flag is never trusted.
    pub async fn read_many(
        &self,
        types: &[RecordType],
        range: TimeRange,
    ) -> Result<Vec<RawMeasurement>, AggregatorError> {
        self.ensure_initialized().await?;
        match self.request_permissions(types).await {
            Ok(granted) if granted.is_empty() => {
                warn!("no record permissions granted; continuing with empty reads");
            }
            Ok(_) => {}
            Err(err) => warn!("permission refresh failed: {err}"),
        }

        let reads = types
            .iter()
            .map(|&record_type| self.read_type_isolated(record_type, &range));
        let measurements = futures::future::join_all(reads)
            .await
            .into_iter()
            .flatten()
            .collect();
        Ok(measurements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyBackend {
        init_failures: AtomicU32,
        available: bool,
    }

    #[async_trait]
    impl RecordBackend for FlakyBackend {
        async fn availability(&self) -> BackendAvailability {
            if self.available {
                BackendAvailability::Available
            } else {
                BackendAvailability::Unavailable("unsupported platform".to_string())
            }
        }

        async fn initialize(&self) -> Result<(), AggregatorError> {
            if self.init_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                Err(AggregatorError::InitFailed("transient".to_string()))
            } else {
                Ok(())
            }
        }

        async fn request_permissions(
            &self,
            types: &[RecordType],
        ) -> Result<Vec<RecordType>, AggregatorError> {
            Ok(types.to_vec())
        }

        async fn read_records(
            &self,
            record_type: RecordType,
            _range: &TimeRange,
        ) -> Result<Vec<Value>, AggregatorError> {
            match record_type {
                RecordType::HeartRate => Ok(vec![json!({
                    "endTime": "2024-03-05T09:00:00Z",
                    "samples": [{"beatsPerMinute": 62.0}]
                })]),
                RecordType::Steps => Err(AggregatorError::ReadFailed {
                    record_type: "Steps",
                    message: "backend exploded".to_string(),
                }),
                _ => Ok(vec![]),
            }
        }
    }

    #[tokio::test]
    async fn init_retries_transient_failures() {
        let client = AggregatorClient::new(Arc::new(FlakyBackend {
            init_failures: AtomicU32::new(2),
            available: true,
        }));
        assert!(client.ensure_initialized().await.is_ok());
        // Cached after success.
        assert!(client.ensure_initialized().await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_platform_is_terminal() {
        let client = AggregatorClient::new(Arc::new(FlakyBackend {
            init_failures: AtomicU32::new(0),
            available: false,
        }));
        assert!(matches!(
            client.ensure_initialized().await,
            Err(AggregatorError::Unavailable(_))
        ));
        assert!(matches!(
            client.ensure_initialized().await,
            Err(AggregatorError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn failing_record_type_is_isolated() {
        let client = AggregatorClient::new(Arc::new(FlakyBackend {
            init_failures: AtomicU32::new(0),
            available: true,
        }));
        let now = "2024-03-05T10:00:00Z".parse().unwrap();
        let measurements = client
            .read_many(
                &[RecordType::Steps, RecordType::HeartRate],
                TimeRange::today(now),
            )
            .await
            .unwrap();

        // Steps read fails -> zero step records; heart rate still arrives.
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].metric, crate::types::Metric::HeartRate);
    }

    #[tokio::test]
    async fn today_range_starts_at_midnight() {
        let now: DateTime<Utc> = "2024-03-05T10:30:00Z".parse().unwrap();
        let range = TimeRange::today(now);
        assert_eq!(range.start.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert!(range.contains("2024-03-05T09:59:00Z".parse().unwrap()));
        assert!(!range.contains("2024-03-04T23:59:00Z".parse().unwrap()));
    }
}
