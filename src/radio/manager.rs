//! Radio link manager
//!
//! Owns the state of the short-range wireless link: readiness checks, device
//! scan, the single connection slot, per-characteristic vitals reads, and
//! push-notification monitors. At most one wearable connection exists per
//! manager; connecting to a second device releases the first.

use crate::classifier::{self, Brand};
use crate::decode;
use crate::error::RadioError;
use crate::radio::gatt::{self, VITAL_CHARACTERISTICS};
use crate::radio::transport::{Advertisement, RadioTransport};
use crate::types::{Metric, RawMeasurement, RawValue, SourceKind};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default scan window.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Connect attempts before giving up on a device.
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Plausible heart-rate window; readings outside it are sensor noise.
const HEART_RATE_RANGE: std::ops::RangeInclusive<u16> = 30..=220;

/// A device surfaced by a scan, post classifier filtering.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub device_id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub brand: Brand,
    pub service_ids: Vec<Uuid>,
}

/// Live connection to a wearable. Exists only between a successful connect
/// and the matching disconnect.
#[derive(Debug, Clone)]
pub struct ConnectedDeviceHandle {
    pub device_id: String,
    pub display_name: String,
    pub brand_guess: Brand,
    pub connected_at: DateTime<Utc>,
    pub available_service_ids: Vec<Uuid>,
}

/// Result of a connect: the handle, plus whether any standard health
/// service was found. `standard_profile == false` is a soft condition;
/// the connection is still usable, callers should warn.
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub handle: ConnectedDeviceHandle,
    pub standard_profile: bool,
}

/// Cancellation handle for an active characteristic monitor.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ScanState {
    task: JoinHandle<()>,
}

/// The radio link manager. One instance owns one adapter and at most one
/// active connection; share it behind an `Arc`.
pub struct RadioLinkManager {
    transport: Arc<dyn RadioTransport>,
    connection: Mutex<Option<ConnectedDeviceHandle>>,
    scan: Mutex<Option<ScanState>>,
    /// Names/brands observed during the last scans, used to label handles.
    seen: Arc<std::sync::Mutex<HashMap<String, (Option<String>, Brand)>>>,
}

impl RadioLinkManager {
    pub fn new(transport: Arc<dyn RadioTransport>) -> Self {
        Self {
            transport,
            connection: Mutex::new(None),
            scan: Mutex::new(None),
            seen: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Scan for plausible wearables.
    ///
    /// Emits at most one entry per unique device id; devices the classifier
    /// does not recognize as wearable-shaped are silently dropped. The scan
    /// stops at `timeout` or on [`RadioLinkManager::cancel_scan`].
    pub async fn scan(
        &self,
        timeout: Duration,
    ) -> Result<mpsc::Receiver<DiscoveredDevice>, RadioError> {
        self.transport.ensure_ready().await?;
        self.cancel_scan().await;

        let mut advertisements = self.transport.start_scan().await?;
        let (tx, rx) = mpsc::channel(32);
        let transport = Arc::clone(&self.transport);
        let seen_names = Arc::clone(&self.seen);

        let task = tokio::spawn(async move {
            let mut emitted: HashSet<String> = HashSet::new();
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = advertisements.next() => {
                        let Some(adv) = next else { break };
                        if let Some(device) = classify(&adv) {
                            if let Ok(mut map) = seen_names.lock() {
                                map.insert(
                                    device.device_id.clone(),
                                    (device.name.clone(), device.brand),
                                );
                            }
                            if emitted.insert(device.device_id.clone())
                                && tx.send(device).await.is_err()
                            {
                                break;
                            }
                        }
                    }
                }
            }
            if let Err(err) = transport.stop_scan().await {
                debug!("stop_scan after timeout: {err}");
            }
        });

        *self.scan.lock().await = Some(ScanState { task });
        Ok(rx)
    }

    /// Cancel an in-flight scan. Idempotent.
    pub async fn cancel_scan(&self) {
        if let Some(state) = self.scan.lock().await.take() {
            state.task.abort();
            if let Err(err) = self.transport.stop_scan().await {
                debug!("stop_scan on cancel: {err}");
            }
        }
    }

    /// Connect to a device and enumerate its services.
    ///
    /// Any in-flight scan is cancelled first (the radio cannot reliably scan
    /// and connect at once), and an existing connection is released first;
    /// the slot never silently leaks a handle.
    pub async fn connect(&self, device_id: &str) -> Result<ConnectOutcome, RadioError> {
        self.transport.ensure_ready().await?;
        self.cancel_scan().await;

        if let Some(existing) = self.connection.lock().await.take() {
            info!(device = %existing.device_id, "releasing previous connection");
            if let Err(err) = self.transport.disconnect(&existing.device_id).await {
                warn!(device = %existing.device_id, "disconnect of previous device failed: {err}");
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.transport.connect(device_id).await {
                Ok(service_ids) => {
                    let (name, brand) = self
                        .seen
                        .lock()
                        .ok()
                        .and_then(|map| map.get(device_id).cloned())
                        .unwrap_or((None, Brand::Unknown));
                    let handle = ConnectedDeviceHandle {
                        device_id: device_id.to_string(),
                        display_name: name.unwrap_or_else(|| "Unknown wearable".to_string()),
                        brand_guess: brand,
                        connected_at: Utc::now(),
                        available_service_ids: service_ids.clone(),
                    };
                    let standard_profile = service_ids
                        .iter()
                        .any(|id| gatt::HEALTH_SERVICES.contains(id));
                    if !standard_profile {
                        warn!(
                            device = %handle.display_name,
                            brand = brand.as_str(),
                            "no standard health services; vendor fallback path applies"
                        );
                    }
                    info!(device = %handle.display_name, services = service_ids.len(), "connected");
                    *self.connection.lock().await = Some(handle.clone());
                    return Ok(ConnectOutcome {
                        handle,
                        standard_profile,
                    });
                }
                Err(RadioError::AdapterOff) => return Err(RadioError::AdapterOff),
                Err(RadioError::Unauthorized(reason)) => {
                    return Err(RadioError::Unauthorized(reason))
                }
                Err(err) => {
                    warn!(device = device_id, attempt, "connect attempt failed: {err}");
                    last_error = err.to_string();
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(RadioError::ConnectFailed {
            device: device_id.to_string(),
            attempts: CONNECT_ATTEMPTS,
            message: last_error,
        })
    }

    /// The current connection, if any.
    pub async fn connected_device(&self) -> Option<ConnectedDeviceHandle> {
        self.connection.lock().await.clone()
    }

    /// Read every vital the device exposes, one independent attempt per
    /// characteristic. A failing characteristic never aborts the others; the
    /// result is whichever measurements succeeded.
    pub async fn read_vitals(&self) -> Result<Vec<RawMeasurement>, RadioError> {
        let handle = self
            .connection
            .lock()
            .await
            .clone()
            .ok_or(RadioError::NotConnected)?;

        let reads = VITAL_CHARACTERISTICS.iter().map(|&(metric, service, chr)| {
            let transport = Arc::clone(&self.transport);
            let device_id = handle.device_id.clone();
            async move {
                match transport.read_characteristic(&device_id, service, chr).await {
                    Ok(bytes) => decode_vital(metric, &bytes),
                    Err(err) => {
                        debug!(metric = metric.as_str(), "no data for metric: {err}");
                        None
                    }
                }
            }
        });

        let now = Utc::now();
        let measurements = futures::future::join_all(reads)
            .await
            .into_iter()
            .flatten()
            .map(|(metric, value)| RawMeasurement {
                metric,
                value,
                start_time: Some(now),
                end_time: Some(now),
                source: SourceKind::RadioLink,
                source_label: handle.display_name.clone(),
            })
            .collect();
        Ok(measurements)
    }

    /// Subscribe to push notifications for one vital (e.g. live heart rate).
    /// Decoded measurements are delivered to `on_update`; dropping the
    /// returned handle cancels the monitor.
    pub async fn monitor<F>(
        &self,
        metric: Metric,
        on_update: F,
    ) -> Result<MonitorHandle, RadioError>
    where
        F: Fn(RawMeasurement) + Send + Sync + 'static,
    {
        let handle = self
            .connection
            .lock()
            .await
            .clone()
            .ok_or(RadioError::NotConnected)?;
        let (_, service, chr) = VITAL_CHARACTERISTICS
            .iter()
            .find(|(m, _, _)| *m == metric)
            .copied()
            .ok_or_else(|| {
                RadioError::Transport(format!("{} has no characteristic mapping", metric.as_str()))
            })?;

        let mut stream = self
            .transport
            .subscribe(&handle.device_id, service, chr)
            .await?;
        let label = handle.display_name.clone();
        let task = tokio::spawn(async move {
            while let Some(bytes) = stream.next().await {
                let Some((metric, value)) = decode_vital(metric, &bytes) else {
                    continue;
                };
                let now = Utc::now();
                on_update(RawMeasurement {
                    metric,
                    value,
                    start_time: Some(now),
                    end_time: Some(now),
                    source: SourceKind::RadioLink,
                    source_label: label.clone(),
                });
            }
        });
        Ok(MonitorHandle { task })
    }

    /// Release the connection. Safe to call at any time, including when
    /// nothing is connected; the slot is cleared unconditionally.
    pub async fn disconnect(&self) {
        self.cancel_scan().await;
        if let Some(handle) = self.connection.lock().await.take() {
            match self.transport.disconnect(&handle.device_id).await {
                Ok(()) | Err(RadioError::NotConnected) => {
                    info!(device = %handle.display_name, "disconnected");
                }
                Err(err) => warn!(device = %handle.display_name, "disconnect failed: {err}"),
            }
        }
    }
}

fn classify(adv: &Advertisement) -> Option<DiscoveredDevice> {
    if !classifier::is_plausible_wearable(
        adv.name.as_deref(),
        &adv.service_ids,
        &adv.manufacturer_data,
    ) {
        return None;
    }
    Some(DiscoveredDevice {
        device_id: adv.device_id.clone(),
        name: adv.name.clone(),
        rssi: adv.rssi,
        brand: classifier::guess_brand(adv.name.as_deref(), &adv.manufacturer_data),
        service_ids: adv.service_ids.clone(),
    })
}

/// Decode one characteristic payload into a raw value.
///
/// Returns `None` for truncated buffers and readings outside the metric's
/// plausibility window.
fn decode_vital(metric: Metric, bytes: &[u8]) -> Option<(Metric, RawValue)> {
    let value = match metric {
        Metric::HeartRate => {
            let bpm = decode::decode_heart_rate(bytes)?;
            if !HEART_RATE_RANGE.contains(&bpm) {
                return None;
            }
            RawValue::Scalar(f64::from(bpm))
        }
        Metric::Battery => RawValue::Scalar(f64::from(decode::decode_battery(bytes)?)),
        Metric::Steps => RawValue::Scalar(f64::from(decode::decode_steps(bytes)?)),
        Metric::Temperature => RawValue::Scalar(decode::decode_temperature(bytes)?),
        Metric::BloodPressure => {
            let (systolic, diastolic) = decode::decode_blood_pressure(bytes)?;
            RawValue::Pair {
                systolic: f64::from(systolic),
                diastolic: f64::from(diastolic),
            }
        }
        Metric::BloodOxygen => RawValue::Scalar(f64::from(decode::decode_blood_oxygen(bytes)?)),
        Metric::Weight => RawValue::Scalar(decode::decode_weight(bytes)?),
        _ => return None,
    };
    Some((metric, value))
}
