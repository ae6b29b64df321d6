//! Radio transport abstraction
//!
//! `RadioTransport` is the seam between the link manager and the platform
//! BLE stack. The production implementation wraps `btleplug`; tests inject a
//! scripted transport instead of a live adapter.

use crate::error::RadioError;
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One advertisement as observed during a scan.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// Platform-stable device identifier, stringified.
    pub device_id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub service_ids: Vec<Uuid>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
}

/// Low-level radio operations the link manager is built on.
#[async_trait]
pub trait RadioTransport: Send + Sync {
    /// Re-checked before every scan/connect: permissions can be revoked and
    /// adapters can power off between calls.
    async fn ensure_ready(&self) -> Result<(), RadioError>;

    /// Begin advertising discovery and return the advertisement stream.
    async fn start_scan(&self) -> Result<BoxStream<'static, Advertisement>, RadioError>;

    async fn stop_scan(&self) -> Result<(), RadioError>;

    /// Connect and enumerate services; returns the discovered service ids.
    async fn connect(&self, device_id: &str) -> Result<Vec<Uuid>, RadioError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), RadioError>;

    /// Single-shot characteristic read.
    async fn read_characteristic(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, RadioError>;

    /// Subscribe to characteristic notifications.
    async fn subscribe(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, RadioError>;
}

/// `btleplug`-backed transport.
///
/// Peripheral ids are platform-opaque, so the transport keeps a registry of
/// stringified ids seen during scans and resolves connect/read calls through
/// it.
pub struct BtleplugTransport {
    manager: Manager,
    known: Arc<Mutex<HashMap<String, PeripheralId>>>,
}

impl BtleplugTransport {
    pub async fn new() -> Result<Self, RadioError> {
        let manager = Manager::new().await?;
        Ok(Self {
            manager,
            known: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    async fn adapter(&self) -> Result<Adapter, RadioError> {
        self.manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(RadioError::UnsupportedHardware)
    }

    async fn peripheral(
        &self,
        device_id: &str,
    ) -> Result<btleplug::platform::Peripheral, RadioError> {
        let id = self
            .known
            .lock()
            .map_err(|_| RadioError::Transport("peripheral registry poisoned".to_string()))?
            .get(device_id)
            .cloned()
            .ok_or_else(|| RadioError::DeviceNotFound(device_id.to_string()))?;
        let adapter = self.adapter().await?;
        adapter
            .peripheral(&id)
            .await
            .map_err(|_| RadioError::DeviceNotFound(device_id.to_string()))
    }

    async fn find_characteristic(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(btleplug::platform::Peripheral, btleplug::api::Characteristic), RadioError> {
        let peripheral = self.peripheral(device_id).await?;
        let chr = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or(RadioError::CharacteristicUnavailable(characteristic))?;
        Ok((peripheral, chr))
    }
}

#[async_trait]
impl RadioTransport for BtleplugTransport {
    async fn ensure_ready(&self) -> Result<(), RadioError> {
        // Adapter presence is the portable capability check; a powered-off
        // adapter surfaces as an error on the next scan/connect call and is
        // mapped to `AdapterOff` there.
        self.adapter().await.map(|_| ())
    }

    async fn start_scan(&self) -> Result<BoxStream<'static, Advertisement>, RadioError> {
        let adapter = self.adapter().await?;
        let events = adapter.events().await?;
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|err| match err {
                btleplug::Error::PermissionDenied => {
                    RadioError::Unauthorized("scan rejected by the platform".to_string())
                }
                other if other.to_string().to_lowercase().contains("powered") => {
                    RadioError::AdapterOff
                }
                other => RadioError::Transport(other.to_string()),
            })?;

        let known = Arc::clone(&self.known);
        let stream = events
            .filter_map(move |event| {
                let adapter = adapter.clone();
                let known = Arc::clone(&known);
                async move {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                        _ => return None,
                    };
                    let peripheral = adapter.peripheral(&id).await.ok()?;
                    let props = peripheral.properties().await.ok()??;
                    let device_id = id.to_string();
                    if let Ok(mut map) = known.lock() {
                        map.insert(device_id.clone(), id);
                    }
                    Some(Advertisement {
                        device_id,
                        name: props.local_name,
                        rssi: props.rssi,
                        service_ids: props.services,
                        manufacturer_data: props.manufacturer_data,
                    })
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn stop_scan(&self) -> Result<(), RadioError> {
        let adapter = self.adapter().await?;
        adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<Vec<Uuid>, RadioError> {
        let peripheral = self.peripheral(device_id).await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;
        Ok(peripheral.services().iter().map(|s| s.uuid).collect())
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), RadioError> {
        let peripheral = self.peripheral(device_id).await?;
        match peripheral.disconnect().await {
            Ok(()) | Err(btleplug::Error::NotConnected) => Ok(()),
            Err(other) => Err(other.into()),
        }
    }

    async fn read_characteristic(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, RadioError> {
        let (peripheral, chr) = self
            .find_characteristic(device_id, service, characteristic)
            .await?;
        Ok(peripheral.read(&chr).await?)
    }

    async fn subscribe(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, RadioError> {
        let (peripheral, chr) = self
            .find_characteristic(device_id, service, characteristic)
            .await?;
        if !chr.properties.contains(CharPropFlags::NOTIFY) {
            return Err(RadioError::NotifyUnsupported(characteristic));
        }
        peripheral.subscribe(&chr).await?;
        let notifications = peripheral.notifications().await?;
        let stream = notifications
            .filter_map(move |n| async move {
                (n.uuid == characteristic).then_some(n.value)
            })
            .boxed();
        Ok(stream)
    }
}
