//! File-replay record backend
//!
//! Serves aggregator reads from a captured JSON document of the form
//! `{"Steps": [...], "HeartRate": [...]}`. Used by the CLI to run the full
//! pipeline over captured payloads and by tests that need a deterministic
//! backend.

use super::{extract, BackendAvailability, RecordBackend, RecordType, TimeRange};
use crate::error::AggregatorError;
use async_trait::async_trait;
use serde_json::Value;

pub struct ReplayBackend {
    records: Value,
}

impl ReplayBackend {
    /// Build from a parsed capture document.
    pub fn new(records: Value) -> Self {
        Self { records }
    }

    /// Parse a capture document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, AggregatorError> {
        let records: Value = serde_json::from_str(text)
            .map_err(|err| AggregatorError::InitFailed(format!("invalid capture: {err}")))?;
        Ok(Self::new(records))
    }
}

#[async_trait]
impl RecordBackend for ReplayBackend {
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
        range: &TimeRange,
    ) -> Result<Vec<Value>, AggregatorError> {
        let records = self
            .records
            .get(record_type.as_str())
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        // Records without a parseable end time are kept; the normalizer is
        // the authority on discarding them.
        Ok(records
            .into_iter()
            .filter(|r| {
                extract::record_end_time(r)
                    .map(|end| range.contains(end))
                    .unwrap_or(true)
            })
            .collect())
    }
}
