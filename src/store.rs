//! Durable store and identity seams
//!
//! The engine never owns storage: rows are appended through `RecordStore`
//! and the store is free to reject or keep exact duplicates; rows are
//! tagged so duplicates stay identifiable either way. `MemoryStore` backs
//! tests and the CLI.

use crate::error::StoreError;
use crate::types::{PersistedRow, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;

/// Append-only record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append rows; returns how many were written.
    async fn append(&self, rows: &[PersistedRow]) -> Result<usize, StoreError>;

    /// Rows for one user on one calendar day.
    async fn rows_for_day(
        &self,
        user: UserId,
        day: NaiveDate,
    ) -> Result<Vec<PersistedRow>, StoreError>;

    /// Timestamp of the newest row for a user, across all days.
    async fn latest_collected_at(
        &self,
        user: UserId,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Supplies the opaque stable identity records are tagged with. `None`
/// means no one is logged in; rows are then held in a bounded in-memory
/// cache instead of persisted.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Fixed identity, for tests and single-user deployments.
pub struct StaticIdentity(pub Option<UserId>);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0
    }
}

/// In-memory append-only store.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PersistedRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, rows: &[PersistedRow]) -> Result<usize, StoreError> {
        let mut stored = self.rows.lock().await;
        stored.extend_from_slice(rows);
        Ok(rows.len())
    }

    async fn rows_for_day(
        &self,
        user: UserId,
        day: NaiveDate,
    ) -> Result<Vec<PersistedRow>, StoreError> {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| {
                row.user_id == Some(user) && row.collected_at >= start && row.collected_at < end
            })
            .cloned()
            .collect())
    }

    async fn latest_collected_at(
        &self,
        user: UserId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.user_id == Some(user))
            .map(|row| row.collected_at)
            .max())
    }
}
