//! Short-range radio link
//!
//! Device discovery, connection, and characteristic decode for wearables
//! reachable over BLE. The link manager drives a [`transport::RadioTransport`]
//! so the whole pipeline runs against a scripted transport in tests.

pub mod gatt;
mod manager;
pub mod transport;

pub use manager::{
    ConnectOutcome, ConnectedDeviceHandle, DiscoveredDevice, MonitorHandle, RadioLinkManager,
    DEFAULT_SCAN_TIMEOUT,
};
pub use transport::{Advertisement, BtleplugTransport, RadioTransport};
