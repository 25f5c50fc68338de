// Service enumeration results (SDP records for classic, GATT tree for BLE)

use crate::domain::device::Modality;
use crate::domain::mac::MacAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile advertised in an SDP record (e.g. "Headset", version 0x0102)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub name: String,
    pub version: Option<String>,
}

/// Classic (SDP) service record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassicService {
    pub name: String,
    pub description: String,
    pub protocol: String,
    pub port: Option<u16>,
    pub service_id: String,
    pub profiles: Vec<ProfileDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattCharacteristic {
    pub uuid: String,
    pub description: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattService {
    pub uuid: String,
    pub description: String,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Service list; shape depends on which enumeration path produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum ServiceList {
    Classic(Vec<ClassicService>),
    Gatt(Vec<GattService>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub mac: MacAddress,
    #[serde(rename = "type")]
    pub modality: Modality,
    pub services: ServiceList,
    pub enumerated_at: DateTime<Utc>,
}

impl ServiceInfo {
    pub fn classic(mac: MacAddress, services: Vec<ClassicService>) -> Self {
        Self {
            mac,
            modality: Modality::Classic,
            services: ServiceList::Classic(services),
            enumerated_at: Utc::now(),
        }
    }

    pub fn gatt(mac: MacAddress, services: Vec<GattService>) -> Self {
        Self {
            mac,
            modality: Modality::Ble,
            services: ServiceList::Gatt(services),
            enumerated_at: Utc::now(),
        }
    }

    pub fn service_count(&self) -> usize {
        match &self.services {
            ServiceList::Classic(s) => s.len(),
            ServiceList::Gatt(s) => s.len(),
        }
    }
}

/// Human-readable name for well-known 16-bit GATT UUIDs
///
/// Accepts either the short form (`180f`) or the full Bluetooth base UUID
/// (`0000180f-0000-1000-8000-00805f9b34fb`).
pub fn gatt_description(uuid: &str) -> &'static str {
    let lower = uuid.to_ascii_lowercase();
    let short = match lower.strip_suffix("-0000-1000-8000-00805f9b34fb") {
        Some(prefix) if prefix.len() == 8 => &prefix[4..],
        _ => lower.as_str(),
    };

    match short {
        "1800" => "Generic Access",
        "1801" => "Generic Attribute",
        "180a" => "Device Information",
        "180d" => "Heart Rate",
        "180f" => "Battery Service",
        "1812" => "Human Interface Device",
        "181c" => "User Data",
        "2a00" => "Device Name",
        "2a01" => "Appearance",
        "2a05" => "Service Changed",
        "2a19" => "Battery Level",
        "2a24" => "Model Number String",
        "2a25" => "Serial Number String",
        "2a26" => "Firmware Revision String",
        "2a29" => "Manufacturer Name String",
        "2a37" => "Heart Rate Measurement",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gatt_description_full_and_short() {
        assert_eq!(
            gatt_description("0000180F-0000-1000-8000-00805F9B34FB"),
            "Battery Service"
        );
        assert_eq!(gatt_description("2a19"), "Battery Level");
        assert_eq!(
            gatt_description("6e400001-b5a3-f393-e0a9-e50e24dcca9e"),
            "Unknown"
        );
    }

    #[test]
    fn test_service_count() {
        let mac = MacAddress::parse("00:11:22:33:44:55").unwrap();
        let info = ServiceInfo::classic(
            mac,
            vec![ClassicService::default(), ClassicService::default()],
        );
        assert_eq!(info.service_count(), 2);
        assert_eq!(info.modality, Modality::Classic);
    }
}
