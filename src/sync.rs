//! Sync engine
//!
//! Drives sync cycles: fan out reads from the aggregator (and the radio
//! link when a wearable is connected), normalize, reduce the day, persist
//! rows, and hand the fresh summary to subscribers. Persistence happens only
//! after the full normalize+reduce pass succeeds; a later cycle's summary
//! fully supersedes an earlier one.

use crate::aggregator::{AggregatorClient, RecordType, TimeRange, ALL_RECORD_TYPES, REALTIME_RECORD_TYPES};
use crate::error::StoreError;
use crate::normalizer::Normalizer;
use crate::radio::RadioLinkManager;
use crate::reducer::reduce_day;
use crate::store::{IdentityProvider, RecordStore};
use crate::types::{ConnectivityStatus, DailySummary, NormalizedRecord, PersistedRow, StatusCode, UserId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rows held for a logged-out user before being discarded on restart.
const TEMP_CACHE_CAP: usize = 1024;

/// Sources are considered live when either produced a record this recently.
const FRESHNESS_WINDOW_MINUTES: i64 = 10;

/// Periodic sync cadences. Only one loop per cadence is ever active;
/// starting a cadence again cancels the prior loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    /// Lightweight poll of heart rate / steps / active calories.
    Realtime,
    /// Broad sync across every record type.
    Full,
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::Realtime => Duration::from_secs(45),
            Cadence::Full => Duration::from_secs(60),
        }
    }

    pub fn record_types(&self) -> &'static [RecordType] {
        match self {
            Cadence::Realtime => REALTIME_RECORD_TYPES,
            Cadence::Full => ALL_RECORD_TYPES,
        }
    }
}

/// Result of one sync cycle.
///
/// A store failure does not void the cycle: the summary is still computed
/// and returned so callers can show best-effort data, with the failure
/// carried alongside.
#[derive(Debug)]
pub struct SyncOutcome {
    pub summary: DailySummary,
    pub records_persisted: usize,
    pub store_error: Option<StoreError>,
}

/// The sync engine. Create once, share behind an `Arc`.
pub struct SyncEngine {
    aggregator: Arc<AggregatorClient>,
    radio: Option<Arc<RadioLinkManager>>,
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    temp_cache: Mutex<VecDeque<PersistedRow>>,
    latest: Mutex<HashMap<Option<UserId>, DailySummary>>,
    last_record_seen: Mutex<Option<DateTime<Utc>>>,
    subscribers: broadcast::Sender<DailySummary>,
    tasks: Mutex<HashMap<Cadence, JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        aggregator: Arc<AggregatorClient>,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (subscribers, _) = broadcast::channel(16);
        Self {
            aggregator,
            radio: None,
            store,
            identity,
            temp_cache: Mutex::new(VecDeque::new()),
            latest: Mutex::new(HashMap::new()),
            last_record_seen: Mutex::new(None),
            subscribers,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a radio link manager; its vitals join every cycle while a
    /// device is connected.
    pub fn with_radio(mut self, radio: Arc<RadioLinkManager>) -> Self {
        self.radio = Some(radio);
        self
    }

    /// Subscribe to fresh summaries. Each completed cycle delivers one.
    pub fn subscribe(&self) -> broadcast::Receiver<DailySummary> {
        self.subscribers.subscribe()
    }

    /// Run one full sync cycle for "today".
    pub async fn sync_once(&self) -> SyncOutcome {
        self.sync_cycle(ALL_RECORD_TYPES, Utc::now()).await
    }

    /// One cycle over a set of record types at a given instant.
    pub(crate) async fn sync_cycle(
        &self,
        types: &[RecordType],
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        let range = TimeRange::today(now);

        // Fan out: aggregator reads are already isolated per type; radio
        // vitals are isolated per characteristic. A failure of either whole
        // source contributes zero records, nothing else.
        let aggregator_raw = match self.aggregator.read_many(types, range).await {
            Ok(measurements) => measurements,
            Err(err) => {
                warn!("aggregator contributed no records this cycle: {err}");
                Vec::new()
            }
        };

        let radio_raw = match &self.radio {
            Some(radio) if radio.connected_device().await.is_some() => {
                match radio.read_vitals().await {
                    Ok(measurements) => measurements,
                    Err(err) => {
                        warn!("radio link contributed no records this cycle: {err}");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let records: Vec<NormalizedRecord> = aggregator_raw
            .iter()
            .chain(radio_raw.iter())
            .filter_map(Normalizer::normalize)
            .collect();

        if let Some(newest) = records.iter().map(|r| r.collected_at).max() {
            let mut seen = self.last_record_seen.lock().await;
            if seen.map(|prior| prior < newest).unwrap_or(true) {
                *seen = Some(newest);
            }
        }

        let summary = reduce_day(&records, now.date_naive());

        let user = self.identity.current_user();
        let rows: Vec<PersistedRow> = records
            .iter()
            .map(|r| PersistedRow::from_record(user, r))
            .collect();

        let (records_persisted, store_error) = if rows.is_empty() {
            (0, None)
        } else if user.is_some() {
            match self.store.append(&rows).await {
                Ok(count) => {
                    debug!(count, "rows persisted");
                    (count, None)
                }
                Err(err) => {
                    warn!("persistence failed, summary still served: {err}");
                    (0, Some(err))
                }
            }
        } else {
            // No identity: hold rows in the bounded temp cache; they are
            // gone on restart.
            let mut cache = self.temp_cache.lock().await;
            for row in rows {
                if cache.len() == TEMP_CACHE_CAP {
                    cache.pop_front();
                }
                cache.push_back(row);
            }
            (0, None)
        };

        self.latest.lock().await.insert(user, summary.clone());
        let _ = self.subscribers.send(summary.clone());

        SyncOutcome {
            summary,
            records_persisted,
            store_error,
        }
    }

    /// The last summary computed for a user (`None` key = logged-out
    /// session data).
    pub async fn latest_summary(&self, user: Option<UserId>) -> Option<DailySummary> {
        self.latest.lock().await.get(&user).cloned()
    }

    /// Rows currently buffered for a logged-out session.
    pub async fn temp_cached_rows(&self) -> usize {
        self.temp_cache.lock().await.len()
    }

    /// Start a periodic loop: one immediate cycle, then one per interval.
    /// A prior loop of the same cadence is cancelled first.
    pub async fn start_periodic(self: &Arc<Self>, cadence: Cadence) {
        let engine = Arc::clone(self);
        let mut tasks = self.tasks.lock().await;
        if let Some(prior) = tasks.remove(&cadence) {
            prior.abort();
        }
        info!(?cadence, "periodic sync started");
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence.interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = engine.sync_cycle(cadence.record_types(), Utc::now()).await;
                debug!(
                    ?cadence,
                    persisted = outcome.records_persisted,
                    "periodic cycle complete"
                );
            }
        });
        tasks.insert(cadence, task);
    }

    /// Stop a periodic loop. Safe to call when none is running.
    pub async fn stop_periodic(&self, cadence: Cadence) {
        if let Some(task) = self.tasks.lock().await.remove(&cadence) {
            task.abort();
            info!(?cadence, "periodic sync stopped");
        }
    }

    /// Report link liveness: whether a wearable is connected, whether any
    /// source produced fresh same-day data, and a short recommendation.
    pub async fn connectivity_status(&self) -> ConnectivityStatus {
        self.connectivity_at(Utc::now()).await
    }

    pub(crate) async fn connectivity_at(&self, now: DateTime<Utc>) -> ConnectivityStatus {
        let radio_device_connected = match &self.radio {
            Some(radio) => radio.connected_device().await.is_some(),
            None => false,
        };

        let stored_latest = match self.identity.current_user() {
            Some(user) => self
                .store
                .latest_collected_at(user)
                .await
                .unwrap_or_default(),
            None => None,
        };
        let seen_latest = *self.last_record_seen.lock().await;
        let last_record_at = stored_latest.max(seen_latest);

        let aggregator_fresh = last_record_at
            .map(|at| now - at <= ChronoDuration::minutes(FRESHNESS_WINDOW_MINUTES))
            .unwrap_or(false);

        let code = if radio_device_connected || aggregator_fresh {
            StatusCode::Connected
        } else if last_record_at.is_some() {
            StatusCode::SyncStale
        } else {
            StatusCode::NoDevice
        };

        let recommendation = match code {
            StatusCode::Connected => "Receiving data from your device.",
            StatusCode::SyncStale => {
                "Records exist but nothing recent arrived. Check that your health app is syncing."
            }
            StatusCode::NoDevice => {
                "No wearable detected. Connect a device or link a health app."
            }
        }
        .to_string();

        ConnectivityStatus {
            code,
            radio_device_connected,
            aggregator_fresh,
            last_record_at,
            recommendation,
        }
    }

    /// Cancel all periodic loops.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{BackendAvailability, RecordBackend, ReplayBackend};
    use crate::error::AggregatorError;
    use crate::store::{MemoryStore, StaticIdentity};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn user() -> UserId {
        UserId::from_legacy_numeric(1)
    }

    fn now() -> DateTime<Utc> {
        "2024-03-05T10:00:00Z".parse().unwrap()
    }

    /// Backend where the steps read always fails.
    struct BrokenStepsBackend;

    #[async_trait]
    impl RecordBackend for BrokenStepsBackend {
        async fn availability(&self) -> BackendAvailability {
            BackendAvailability::Available
        }

        async fn initialize(&self) -> Result<(), AggregatorError> {
            Ok(())
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
                RecordType::Steps => Err(AggregatorError::ReadFailed {
                    record_type: "Steps",
                    message: "provider crashed".to_string(),
                }),
                RecordType::HeartRate => Ok(vec![json!({
                    "endTime": "2024-03-05T09:30:00Z",
                    "samples": [{"beatsPerMinute": 62.0}]
                })]),
                _ => Ok(vec![]),
            }
        }
    }

    /// Store that rejects every append.
    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn append(&self, _rows: &[PersistedRow]) -> Result<usize, StoreError> {
            Err(StoreError::Insert("disk full".to_string()))
        }

        async fn rows_for_day(
            &self,
            _user: UserId,
            _day: chrono::NaiveDate,
        ) -> Result<Vec<PersistedRow>, StoreError> {
            Ok(vec![])
        }

        async fn latest_collected_at(
            &self,
            _user: UserId,
        ) -> Result<Option<DateTime<Utc>>, StoreError> {
            Ok(None)
        }
    }

    fn replay_backend() -> Arc<ReplayBackend> {
        Arc::new(ReplayBackend::new(json!({
            "Steps": [{"count": 8000, "endTime": "2024-03-05T09:00:00Z"}],
            "HeartRate": [{
                "endTime": "2024-03-05T09:30:00Z",
                "samples": [{"beatsPerMinute": 62.0}]
            }],
            "TotalCaloriesBurned": [
                {"energy": {"inKilocalories": 1800.0}, "endTime": "2024-03-05T09:00:00Z"}
            ],
            "ActiveCaloriesBurned": [
                {"energy": {"inKilocalories": 400.0}, "endTime": "2024-03-05T09:00:00Z"}
            ]
        })))
    }

    fn engine_with(
        backend: Arc<dyn RecordBackend>,
        store: Arc<dyn RecordStore>,
        identity: Option<UserId>,
    ) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            Arc::new(AggregatorClient::new(backend)),
            store,
            Arc::new(StaticIdentity(identity)),
        ))
    }

    #[tokio::test]
    async fn failed_metric_read_yields_zero_not_failure() {
        let engine = engine_with(
            Arc::new(BrokenStepsBackend),
            Arc::new(MemoryStore::new()),
            Some(user()),
        );
        let outcome = engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        assert_eq!(outcome.summary.heart_rate, 62);
        assert_eq!(outcome.summary.steps, 0);
        assert!(outcome.store_error.is_none());
    }

    #[tokio::test]
    async fn full_cycle_persists_and_summarizes() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(replay_backend(), Arc::clone(&store) as _, Some(user()));

        let outcome = engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        assert_eq!(outcome.summary.steps, 8000);
        assert_eq!(outcome.summary.heart_rate, 62);
        assert_eq!(outcome.summary.calories, 1800.0);
        assert_eq!(outcome.records_persisted, 4);
        assert_eq!(store.len().await, 4);

        let cached = engine.latest_summary(Some(user())).await.unwrap();
        assert_eq!(cached, outcome.summary);
    }

    #[tokio::test]
    async fn store_failure_still_returns_summary() {
        let engine = engine_with(replay_backend(), Arc::new(FailingStore), Some(user()));
        let outcome = engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        assert!(outcome.store_error.is_some());
        assert_eq!(outcome.records_persisted, 0);
        assert_eq!(outcome.summary.steps, 8000);
    }

    #[tokio::test]
    async fn logged_out_rows_go_to_bounded_cache() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(replay_backend(), Arc::clone(&store) as _, None);

        let outcome = engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        assert_eq!(outcome.records_persisted, 0);
        assert!(store.is_empty().await);
        assert_eq!(engine.temp_cached_rows().await, 4);
    }

    #[tokio::test]
    async fn subscribers_receive_each_summary() {
        let engine = engine_with(replay_backend(), Arc::new(MemoryStore::new()), Some(user()));
        let mut rx = engine.subscribe();
        engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        let summary = rx.recv().await.unwrap();
        assert_eq!(summary.steps, 8000);
    }

    #[tokio::test]
    async fn connectivity_no_device_without_any_records() {
        let engine = engine_with(replay_backend(), Arc::new(MemoryStore::new()), Some(user()));
        let status = engine.connectivity_at(now()).await;
        assert_eq!(status.code, StatusCode::NoDevice);
        assert!(!status.radio_device_connected);
    }

    #[tokio::test]
    async fn connectivity_connected_right_after_a_cycle() {
        let engine = engine_with(replay_backend(), Arc::new(MemoryStore::new()), Some(user()));
        engine.sync_cycle(ALL_RECORD_TYPES, now()).await;
        // Newest record is 09:30; half an hour later it is already stale,
        // five minutes later it is fresh.
        let status = engine.connectivity_at("2024-03-05T09:35:00Z".parse().unwrap()).await;
        assert_eq!(status.code, StatusCode::Connected);
        assert!(status.aggregator_fresh);
    }

    #[tokio::test]
    async fn connectivity_stale_when_only_old_records_exist() {
        let store = Arc::new(MemoryStore::new());
        store
            .append(&[PersistedRow {
                user_id: Some(user()),
                source: "aggregator".to_string(),
                device_label: "Samsung Health".to_string(),
                collected_at: "2024-03-04T09:00:00Z".parse().unwrap(),
                steps: Some(4000.0),
                ..Default::default()
            }])
            .await
            .unwrap();
        let engine = engine_with(replay_backend(), Arc::clone(&store) as _, Some(user()));

        let status = engine.connectivity_at(now()).await;
        assert_eq!(status.code, StatusCode::SyncStale);
        assert!(!status.aggregator_fresh);
        assert!(status.last_record_at.is_some());
    }

    #[tokio::test]
    async fn stop_periodic_is_idempotent() {
        let engine = engine_with(replay_backend(), Arc::new(MemoryStore::new()), Some(user()));
        engine.start_periodic(Cadence::Realtime).await;
        engine.stop_periodic(Cadence::Realtime).await;
        engine.stop_periodic(Cadence::Realtime).await;
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn restarting_a_cadence_replaces_the_loop() {
        let engine = engine_with(replay_backend(), Arc::new(MemoryStore::new()), Some(user()));
        engine.start_periodic(Cadence::Full).await;
        engine.start_periodic(Cadence::Full).await;
        assert_eq!(engine.tasks.lock().await.len(), 1);
        engine.shutdown().await;
    }
}
