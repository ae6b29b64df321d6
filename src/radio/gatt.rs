//! GATT service and characteristic identifiers
//!
//! Standard Bluetooth SIG health profiles plus the vendor data channel some
//! wearables expose instead of (or alongside) the standard services.

use crate::types::Metric;
use uuid::{uuid, Uuid};

// Standard health-related services.
pub const HEART_RATE_SERVICE: Uuid = uuid!("0000180d-0000-1000-8000-00805f9b34fb");
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");
pub const DEVICE_INFO_SERVICE: Uuid = uuid!("0000180a-0000-1000-8000-00805f9b34fb");
pub const HEALTH_THERMOMETER_SERVICE: Uuid = uuid!("00001809-0000-1000-8000-00805f9b34fb");
pub const BLOOD_PRESSURE_SERVICE: Uuid = uuid!("00001810-0000-1000-8000-00805f9b34fb");
pub const PULSE_OXIMETER_SERVICE: Uuid = uuid!("00001822-0000-1000-8000-00805f9b34fb");
pub const WEIGHT_SCALE_SERVICE: Uuid = uuid!("0000181d-0000-1000-8000-00805f9b34fb");
pub const FITNESS_MACHINE_SERVICE: Uuid = uuid!("00001826-0000-1000-8000-00805f9b34fb");
pub const RUNNING_SPEED_SERVICE: Uuid = uuid!("00001814-0000-1000-8000-00805f9b34fb");

// Vendor data channel (UART-style) seen on several wearable lines; the
// notify characteristic carries step-counter frames.
pub const VENDOR_DATA_SERVICE: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");
pub const VENDOR_NOTIFY_CHAR: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

// Characteristics.
pub const HEART_RATE_MEASUREMENT_CHAR: Uuid = uuid!("00002a37-0000-1000-8000-00805f9b34fb");
pub const BATTERY_LEVEL_CHAR: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");
pub const MANUFACTURER_NAME_CHAR: Uuid = uuid!("00002a29-0000-1000-8000-00805f9b34fb");
pub const TEMPERATURE_MEASUREMENT_CHAR: Uuid = uuid!("00002a1c-0000-1000-8000-00805f9b34fb");
pub const BLOOD_PRESSURE_MEASUREMENT_CHAR: Uuid = uuid!("00002a35-0000-1000-8000-00805f9b34fb");
pub const PLX_SPOT_CHECK_CHAR: Uuid = uuid!("00002a5e-0000-1000-8000-00805f9b34fb");
pub const WEIGHT_MEASUREMENT_CHAR: Uuid = uuid!("00002a9d-0000-1000-8000-00805f9b34fb");

/// Services whose presence marks a device as health-capable.
pub const HEALTH_SERVICES: &[Uuid] = &[
    HEART_RATE_SERVICE,
    HEALTH_THERMOMETER_SERVICE,
    BLOOD_PRESSURE_SERVICE,
    PULSE_OXIMETER_SERVICE,
    WEIGHT_SCALE_SERVICE,
    FITNESS_MACHINE_SERVICE,
    RUNNING_SPEED_SERVICE,
    VENDOR_DATA_SERVICE,
];

/// Where each readable vital lives: `(metric, service, characteristic)`.
///
/// Each entry is read independently during a vitals pass; a missing service
/// or characteristic means "no data for this metric", nothing more.
pub const VITAL_CHARACTERISTICS: &[(Metric, Uuid, Uuid)] = &[
    (
        Metric::HeartRate,
        HEART_RATE_SERVICE,
        HEART_RATE_MEASUREMENT_CHAR,
    ),
    (Metric::Battery, BATTERY_SERVICE, BATTERY_LEVEL_CHAR),
    (Metric::Steps, VENDOR_DATA_SERVICE, VENDOR_NOTIFY_CHAR),
    (
        Metric::Temperature,
        HEALTH_THERMOMETER_SERVICE,
        TEMPERATURE_MEASUREMENT_CHAR,
    ),
    (
        Metric::BloodPressure,
        BLOOD_PRESSURE_SERVICE,
        BLOOD_PRESSURE_MEASUREMENT_CHAR,
    ),
    (
        Metric::BloodOxygen,
        PULSE_OXIMETER_SERVICE,
        PLX_SPOT_CHECK_CHAR,
    ),
    (Metric::Weight, WEIGHT_SCALE_SERVICE, WEIGHT_MEASUREMENT_CHAR),
];
