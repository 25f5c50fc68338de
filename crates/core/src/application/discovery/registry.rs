// Device registry: per-MAC merge of sightings from both radios
// Pure data structure; the fusion engine's merge loop is its only writer.

use crate::domain::{DeviceClass, DeviceRecord, MacAddress, Sighting};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: HashMap<MacAddress, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one sighting into the registry
    pub fn apply(&mut self, sighting: Sighting) {
        match self.devices.get_mut(&sighting.mac) {
            None => {
                self.devices
                    .insert(sighting.mac, DeviceRecord::from_sighting(sighting));
            }
            Some(existing) => merge_into(existing, sighting),
        }
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&DeviceRecord> {
        self.devices.get(mac)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Copy of every record (order unspecified)
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.devices.values().cloned().collect()
    }
}

fn merge_into(existing: &mut DeviceRecord, sighting: Sighting) {
    existing.modality = existing.modality.merge(sighting.source);

    if !existing.has_name() {
        if let Some(name) = sighting.name.filter(|n| !n.trim().is_empty()) {
            existing.name = name;
        }
    }

    if existing.device_class.is_none() {
        if let Some(raw) = sighting.device_class {
            existing.device_class = Some(raw);
            existing.device_class_parsed = Some(DeviceClass::parse(raw));
        }
    }

    if sighting.rssi.is_some() {
        existing.rssi = sighting.rssi;
    }

    if !sighting.metadata.is_empty() {
        existing.ble_metadata = sighting.metadata;
    }
}
