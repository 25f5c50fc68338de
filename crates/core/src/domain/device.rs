// Device Domain Model

use crate::domain::mac::MacAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name given to devices that did not advertise one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Radio technology (or technologies) a device was observed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "classic")]
    Classic,
    #[serde(rename = "ble")]
    Ble,
    #[serde(rename = "classic+ble")]
    ClassicBle,
}

impl Modality {
    /// Combine an existing modality with a new observation
    pub fn merge(self, other: Modality) -> Modality {
        if self == other {
            self
        } else {
            Modality::ClassicBle
        }
    }

    pub fn includes_classic(self) -> bool {
        matches!(self, Modality::Classic | Modality::ClassicBle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Classic => "classic",
            Modality::Ble => "ble",
            Modality::ClassicBle => "classic+ble",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed Class of Device (CoD) taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClass {
    pub major_class: String,
    pub major_code: u8,
    pub minor_code: u8,
    pub service_code: u16,
}

impl DeviceClass {
    /// Split a raw 24-bit class value into major/minor/service fields
    pub fn parse(raw: u32) -> Self {
        let major_code = ((raw >> 8) & 0x1F) as u8;
        let minor_code = ((raw >> 2) & 0x3F) as u8;
        let service_code = ((raw >> 13) & 0x7FF) as u16;

        Self {
            major_class: major_class_name(major_code).to_string(),
            major_code,
            minor_code,
            service_code,
        }
    }
}

fn major_class_name(code: u8) -> &'static str {
    match code {
        0x00 => "Miscellaneous",
        0x01 => "Computer",
        0x02 => "Phone",
        0x03 => "LAN/Network Access Point",
        0x04 => "Audio/Video",
        0x05 => "Peripheral",
        0x06 => "Imaging",
        0x07 => "Wearable",
        0x08 => "Toy",
        0x09 => "Health",
        0x1F => "Uncategorized",
        _ => "Unknown",
    }
}

/// One observation of a device by a single discovery source
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub mac: MacAddress,
    pub name: Option<String>,
    /// Classic or Ble, never ClassicBle
    pub source: Modality,
    pub rssi: Option<i16>,
    pub device_class: Option<u32>,
    pub metadata: Map<String, Value>,
    pub seen_at: DateTime<Utc>,
}

impl Sighting {
    pub fn classic(mac: MacAddress, name: Option<String>, device_class: Option<u32>) -> Self {
        Self {
            mac,
            name,
            source: Modality::Classic,
            rssi: None,
            device_class,
            metadata: Map::new(),
            seen_at: Utc::now(),
        }
    }

    pub fn ble(
        mac: MacAddress,
        name: Option<String>,
        rssi: Option<i16>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            mac,
            name,
            source: Modality::Ble,
            rssi,
            device_class: None,
            metadata,
            seen_at: Utc::now(),
        }
    }
}

/// Canonical per-MAC record held by the discovery registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mac: MacAddress,
    pub name: String,
    #[serde(rename = "type")]
    pub modality: Modality,
    pub rssi: Option<i16>,
    pub device_class: Option<u32>,
    pub device_class_parsed: Option<DeviceClass>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ble_metadata: Map<String, Value>,
    pub discovered_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// First sighting of a MAC
    pub fn from_sighting(sighting: Sighting) -> Self {
        Self {
            mac: sighting.mac,
            name: sighting
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
            modality: sighting.source,
            rssi: sighting.rssi,
            device_class: sighting.device_class,
            device_class_parsed: sighting.device_class.map(DeviceClass::parse),
            ble_metadata: sighting.metadata,
            discovered_at: sighting.seen_at,
        }
    }

    pub fn has_name(&self) -> bool {
        self.name != UNKNOWN_DEVICE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class_phone() {
        let class = DeviceClass::parse(0x5A020C);
        assert_eq!(class.major_code, 0x02);
        assert_eq!(class.major_class, "Phone");
        assert_eq!(class.minor_code, 0x03);
        assert_eq!(class.service_code, 0x2D0);
    }

    #[test]
    fn test_device_class_unknown_major() {
        let class = DeviceClass::parse(0x0000_0A00);
        assert_eq!(class.major_code, 0x0A);
        assert_eq!(class.major_class, "Unknown");
    }

    #[test]
    fn test_modality_merge() {
        assert_eq!(Modality::Classic.merge(Modality::Classic), Modality::Classic);
        assert_eq!(Modality::Classic.merge(Modality::Ble), Modality::ClassicBle);
        assert_eq!(Modality::Ble.merge(Modality::Classic), Modality::ClassicBle);
        assert_eq!(Modality::ClassicBle.merge(Modality::Ble), Modality::ClassicBle);
    }

    #[test]
    fn test_modality_serde_names() {
        assert_eq!(
            serde_json::to_string(&Modality::ClassicBle).unwrap(),
            "\"classic+ble\""
        );
        let m: Modality = serde_json::from_str("\"ble\"").unwrap();
        assert_eq!(m, Modality::Ble);
    }

    #[test]
    fn test_blank_name_defaults_to_unknown() {
        let mac = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        let record = DeviceRecord::from_sighting(Sighting::classic(mac, Some("  ".into()), None));
        assert_eq!(record.name, UNKNOWN_DEVICE_NAME);
        assert!(!record.has_name());
    }
}
