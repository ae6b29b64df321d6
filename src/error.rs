//! Error types for the VitalSync engine
//!
//! Errors are typed per boundary: transport/permission failures from the
//! radio link and the aggregator stay distinguishable so callers can show a
//! specific remediation. Above the normalizer only two outcomes exist: a
//! metric contributed data, or it did not.

use thiserror::Error;
use uuid::Uuid;

/// Errors from the short-range radio link.
///
/// Adapter-off, unauthorized, and unsupported-hardware are deliberately
/// separate variants: each has a different user remediation.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("Bluetooth is off")]
    AdapterOff,

    #[error("Bluetooth permission denied: {0}")]
    Unauthorized(String),

    #[error("no Bluetooth adapter available on this host")]
    UnsupportedHardware,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("no device connected")]
    NotConnected,

    #[error("connect to {device} failed after {attempts} attempts: {message}")]
    ConnectFailed {
        device: String,
        attempts: u32,
        message: String,
    },

    #[error("service {0} not present on the connected device")]
    ServiceUnavailable(Uuid),

    #[error("characteristic {0} not present on the connected device")]
    CharacteristicUnavailable(Uuid),

    #[error("characteristic {0} does not support notifications")]
    NotifyUnsupported(Uuid),

    #[error("radio transport error: {0}")]
    Transport(String),
}

impl From<btleplug::Error> for RadioError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::PermissionDenied => {
                RadioError::Unauthorized("bluetooth access denied by the platform".to_string())
            }
            btleplug::Error::DeviceNotFound => {
                RadioError::DeviceNotFound("peripheral disappeared".to_string())
            }
            btleplug::Error::NotConnected => RadioError::NotConnected,
            other => RadioError::Transport(other.to_string()),
        }
    }
}

/// Errors from the platform health-data aggregator.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("health record store is not available on this platform: {0}")]
    Unavailable(String),

    #[error("health record store requires a provider update")]
    UpdateRequired,

    #[error("health record store failed to initialize: {0}")]
    InitFailed(String),

    #[error("health record store not initialized")]
    NotInitialized,

    #[error("no record permissions granted")]
    PermissionDenied,

    #[error("read of {record_type} failed: {message}")]
    ReadFailed {
        record_type: &'static str,
        message: String,
    },
}

/// Errors from the durable record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),
}
