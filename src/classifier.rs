//! Device classifier
//!
//! Heuristic matching of advertised name, service UUIDs, and manufacturer
//! data against a small table of known wearable brands. The brand guess only
//! selects a vendor fallback path; a device is rejected solely when both the
//! name-vocabulary and the service-UUID checks fail.

use crate::radio::gatt::HEALTH_SERVICES;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Best-effort brand label for a discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Samsung,
    Xiaomi,
    Huawei,
    Fitbit,
    Garmin,
    Polar,
    Apple,
    Unknown,
}

impl Brand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Samsung => "samsung",
            Brand::Xiaomi => "xiaomi",
            Brand::Huawei => "huawei",
            Brand::Fitbit => "fitbit",
            Brand::Garmin => "garmin",
            Brand::Polar => "polar",
            Brand::Apple => "apple",
            Brand::Unknown => "unknown",
        }
    }

    /// Brands whose wearables expose no standard GATT health services and
    /// need a vendor SDK or manual-export fallback instead of a live link.
    pub fn needs_vendor_fallback(&self) -> bool {
        matches!(self, Brand::Samsung | Brand::Xiaomi | Brand::Huawei | Brand::Fitbit)
    }
}

/// One row of the brand signature table.
struct BrandSignature {
    brand: Brand,
    /// Lowercased substrings matched against the advertised name.
    name_markers: &'static [&'static str],
    /// Bluetooth SIG company identifiers seen in manufacturer data.
    company_ids: &'static [u16],
}

const BRAND_SIGNATURES: &[BrandSignature] = &[
    BrandSignature {
        brand: Brand::Samsung,
        name_markers: &["galaxy watch", "galaxy fit", "galaxy buds", "gear", "sm-r", "samsung"],
        company_ids: &[0x0075],
    },
    BrandSignature {
        brand: Brand::Xiaomi,
        name_markers: &["mi band", "mi smart band", "amazfit", "xiaomi", "redmi"],
        company_ids: &[0x0157],
    },
    BrandSignature {
        brand: Brand::Huawei,
        name_markers: &["huawei", "honor band"],
        company_ids: &[0x027D],
    },
    BrandSignature {
        brand: Brand::Fitbit,
        name_markers: &["fitbit", "charge", "versa", "inspire", "sense"],
        company_ids: &[],
    },
    BrandSignature {
        brand: Brand::Garmin,
        name_markers: &["garmin", "forerunner", "fenix", "venu", "vivo"],
        company_ids: &[0x0087],
    },
    BrandSignature {
        brand: Brand::Polar,
        name_markers: &["polar"],
        company_ids: &[0x006B],
    },
    BrandSignature {
        brand: Brand::Apple,
        name_markers: &["apple watch"],
        company_ids: &[0x004C],
    },
];

/// Generic vocabulary that marks a device name as wearable-shaped even when
/// no brand signature matches.
const WEARABLE_KEYWORDS: &[&str] = &[
    "watch", "band", "fit", "health", "tracker", "wear", "ring", "pulse", "hr",
];

/// Does this advertisement plausibly belong to a wearable?
///
/// Accepts on a name-vocabulary hit OR a known health-service UUID. The
/// brand table never rejects on its own.
pub fn is_plausible_wearable(
    name: Option<&str>,
    service_ids: &[Uuid],
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> bool {
    if let Some(name) = name {
        let lowered = name.to_lowercase();
        if WEARABLE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return true;
        }
        if BRAND_SIGNATURES
            .iter()
            .any(|sig| sig.name_markers.iter().any(|m| lowered.contains(m)))
        {
            return true;
        }
    }
    if service_ids.iter().any(|id| HEALTH_SERVICES.contains(id)) {
        return true;
    }
    // A brand-only match (manufacturer id with a generic name) still counts
    // as a name-vocabulary hit for known wearable vendors.
    manufacturer_data.keys().any(|company| {
        BRAND_SIGNATURES
            .iter()
            .any(|sig| sig.company_ids.contains(company))
    })
}

/// Best-effort brand guess, used only to pick a vendor fallback path.
pub fn guess_brand(
    name: Option<&str>,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> Brand {
    if let Some(name) = name {
        let lowered = name.to_lowercase();
        for sig in BRAND_SIGNATURES {
            if sig.name_markers.iter().any(|m| lowered.contains(m)) {
                return sig.brand;
            }
        }
    }
    for company in manufacturer_data.keys() {
        for sig in BRAND_SIGNATURES {
            if sig.company_ids.contains(company) {
                return sig.brand;
            }
        }
    }
    Brand::Unknown
}
