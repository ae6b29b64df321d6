//! VitalSync - Telemetry acquisition and daily aggregation for wearable health data
//!
//! VitalSync turns heterogeneous physiological telemetry into one coherent
//! per-day summary plus a durable time-series record. Two acquisition paths
//! feed a single pipeline: raw records → normalization → per-day reduction
//! → persistence.
//!
//! ## Modules
//!
//! - **Radio link**: BLE scan → classify → connect → characteristic decode
//! - **Aggregator**: permissioned, time-ranged reads from the platform
//!   health record store
//! - **Normalizer / Reducer**: canonical records and the daily summary
//! - **Sync**: periodic cycles, persistence, subscribers, connectivity

pub mod aggregator;
pub mod classifier;
pub mod decode;
pub mod error;
pub mod normalizer;
pub mod radio;
pub mod reducer;
pub mod store;
pub mod sync;
pub mod types;

pub use aggregator::{AggregatorClient, RecordBackend, RecordType, ReplayBackend, TimeRange};
pub use error::{AggregatorError, RadioError, StoreError};
pub use normalizer::Normalizer;
pub use radio::{BtleplugTransport, RadioLinkManager, RadioTransport};
pub use reducer::reduce_day;
pub use store::{IdentityProvider, MemoryStore, RecordStore, StaticIdentity};
pub use sync::{Cadence, SyncEngine, SyncOutcome};
pub use types::{
    ConnectivityStatus, DailySummary, Metric, NormalizedRecord, PersistedRow, RawMeasurement,
    SourceKind, StatusCode, UserId,
};

/// Engine version embedded in diagnostics output.
pub const VITALSYNC_VERSION: &str = env!("CARGO_PKG_VERSION");
