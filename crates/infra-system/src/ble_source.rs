// BLE advertisement discovery (btleplug, behind the `ble` feature)
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use bluesec_core::domain::{Modality, Sighting};
use bluesec_core::port::{DiscoveryError, DiscoverySource};

pub struct BleAdvertisementSource {
    adapter: String,
}

impl BleAdvertisementSource {
    /// `adapter` is matched against the platform adapter description; the
    /// first adapter is used when none matches
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
        }
    }
}

#[async_trait]
impl DiscoverySource for BleAdvertisementSource {
    fn modality(&self) -> Modality {
        Modality::Ble
    }

    async fn discover(
        &self,
        duration: Duration,
        sink: mpsc::Sender<Sighting>,
    ) -> Result<usize, DiscoveryError> {
        #[cfg(feature = "ble")]
        {
            scan::run(&self.adapter, duration, sink).await
        }
        #[cfg(not(feature = "ble"))]
        {
            let _ = (duration, sink);
            Err(DiscoveryError::Unavailable(format!(
                "built without BLE support; BLE scanning disabled on {}",
                self.adapter
            )))
        }
    }
}

#[cfg(feature = "ble")]
pub(crate) mod scan {
    use super::*;
    use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
    use btleplug::platform::{Adapter, Manager};
    use bluesec_core::domain::MacAddress;
    use serde_json::{json, Map, Value};
    use tracing::{debug, info, warn};

    /// Pick the adapter whose description mentions `name`, else the first one
    pub(crate) async fn select_adapter(name: &str) -> Result<Adapter, DiscoveryError> {
        let manager = Manager::new()
            .await
            .map_err(|e| DiscoveryError::Unavailable(format!("BLE manager unavailable: {e}")))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| DiscoveryError::Os(e.to_string()))?;

        let mut fallback = None;
        for adapter in adapters {
            let info = adapter.adapter_info().await.unwrap_or_default();
            if info.contains(name) {
                return Ok(adapter);
            }
            if fallback.is_none() {
                fallback = Some(adapter);
            }
        }
        fallback.ok_or_else(|| DiscoveryError::Unavailable("no BLE adapter found".to_string()))
    }

    pub(crate) async fn run(
        adapter_name: &str,
        duration: Duration,
        sink: mpsc::Sender<Sighting>,
    ) -> Result<usize, DiscoveryError> {
        let adapter = select_adapter(adapter_name).await?;

        info!(adapter = %adapter_name, duration_secs = duration.as_secs(), "Starting BLE scan");
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| DiscoveryError::Os(format!("BLE scan failed: {e}")))?;
        tokio::time::sleep(duration).await;

        let peripherals = adapter.peripherals().await;
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop BLE scan");
        }
        let peripherals = peripherals.map_err(|e| DiscoveryError::Os(e.to_string()))?;

        let mut sent = 0;
        for peripheral in peripherals {
            let props = match peripheral.properties().await {
                Ok(Some(props)) => props,
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "Skipping peripheral without properties");
                    continue;
                }
            };
            let Ok(mac) = MacAddress::parse(&props.address.to_string()) else {
                continue;
            };

            let sighting = Sighting::ble(mac, props.local_name.clone(), props.rssi, metadata(&props));
            if sink.send(sighting).await.is_err() {
                break;
            }
            sent += 1;
        }

        info!(devices = sent, "BLE scan complete");
        Ok(sent)
    }

    fn metadata(props: &PeripheralProperties) -> Map<String, Value> {
        let mut meta = Map::new();
        if let Some(name) = &props.local_name {
            meta.insert("local_name".into(), json!(name));
        }
        if let Some(tx) = props.tx_power_level {
            meta.insert("tx_power".into(), json!(tx));
        }
        if let Some(kind) = props.address_type {
            meta.insert("address_type".into(), json!(format!("{kind:?}").to_lowercase()));
        }
        if !props.manufacturer_data.is_empty() {
            let data: Map<String, Value> = props
                .manufacturer_data
                .iter()
                .map(|(id, bytes)| (id.to_string(), json!(hex(bytes))))
                .collect();
            meta.insert("manufacturer_data".into(), Value::Object(data));
        }
        if !props.service_data.is_empty() {
            let data: Map<String, Value> = props
                .service_data
                .iter()
                .map(|(uuid, bytes)| (uuid.to_string(), json!(hex(bytes))))
                .collect();
            meta.insert("service_data".into(), Value::Object(data));
        }
        if !props.services.is_empty() {
            let uuids: Vec<String> = props.services.iter().map(|u| u.to_string()).collect();
            meta.insert("service_uuids".into(), json!(uuids));
        }
        meta
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(all(test, not(feature = "ble")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_feature_is_unavailable() {
        let source = BleAdvertisementSource::new("hci0");
        let (tx, _rx) = mpsc::channel(1);

        let err = source
            .discover(Duration::from_millis(10), tx)
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::Unavailable(_)));
        assert_eq!(source.modality(), Modality::Ble);
    }
}
