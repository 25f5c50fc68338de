// BLE service enumeration (GATT tree read over btleplug)
use bluesec_core::domain::{MacAddress, ServiceInfo};
use bluesec_core::port::EnumerationError;

pub struct GattEnumerator {
    adapter: String,
}

impl GattEnumerator {
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
        }
    }

    pub async fn enumerate(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError> {
        #[cfg(feature = "ble")]
        {
            gatt::enumerate(&self.adapter, mac).await
        }
        #[cfg(not(feature = "ble"))]
        {
            let _ = mac;
            Err(EnumerationError::Unavailable(format!(
                "built without BLE support; GATT enumeration disabled on {}",
                self.adapter
            )))
        }
    }
}

#[cfg(feature = "ble")]
mod gatt {
    use super::*;
    use crate::ble_source::scan::select_adapter;
    use bluesec_core::domain::service::gatt_description;
    use bluesec_core::domain::{GattCharacteristic, GattService};
    use bluesec_core::port::DiscoveryError;
    use btleplug::api::{Central, CharPropFlags, Peripheral as _, ScanFilter};
    use btleplug::platform::Peripheral;
    use std::time::Duration;
    use tracing::{debug, info, warn};

    /// Scan window used to locate the peripheral before connecting (5s)
    const LOCATE_WINDOW: Duration = Duration::from_secs(5);

    pub(super) async fn enumerate(
        adapter_name: &str,
        mac: &MacAddress,
    ) -> Result<ServiceInfo, EnumerationError> {
        let adapter = select_adapter(adapter_name).await.map_err(|e| match e {
            DiscoveryError::Unavailable(msg) => EnumerationError::Unavailable(msg),
            DiscoveryError::Os(msg) => EnumerationError::Connection(msg),
        })?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| EnumerationError::Connection(e.to_string()))?;
        tokio::time::sleep(LOCATE_WINDOW).await;
        let peripherals = adapter.peripherals().await;
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop BLE scan");
        }
        let peripherals = peripherals.map_err(|e| EnumerationError::Connection(e.to_string()))?;

        let wanted = mac.to_string();
        let peripheral = peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| EnumerationError::Connection(format!("{wanted} not in range")))?;

        debug!(mac = %mac, "Connecting for GATT enumeration");
        let result = read_tree(&peripheral).await;

        // Disconnect on every path, including a failed connect
        if let Err(e) = peripheral.disconnect().await {
            debug!(mac = %mac, error = %e, "Disconnect after enumeration failed");
        }

        let services = result?;
        info!(mac = %mac, service_count = services.len(), "GATT services enumerated");
        Ok(ServiceInfo::gatt(*mac, services))
    }

    async fn read_tree(peripheral: &Peripheral) -> Result<Vec<GattService>, EnumerationError> {
        peripheral
            .connect()
            .await
            .map_err(|e| EnumerationError::Connection(e.to_string()))?;
        let connected = peripheral
            .is_connected()
            .await
            .map_err(|e| EnumerationError::Connection(e.to_string()))?;
        if !connected {
            return Err(EnumerationError::Connection(
                "device did not accept the connection".to_string(),
            ));
        }

        peripheral
            .discover_services()
            .await
            .map_err(|e| EnumerationError::Connection(e.to_string()))?;

        Ok(peripheral
            .services()
            .into_iter()
            .map(|service| {
                let uuid = service.uuid.to_string();
                GattService {
                    description: gatt_description(&uuid).to_string(),
                    characteristics: service
                        .characteristics
                        .iter()
                        .map(|c| {
                            let uuid = c.uuid.to_string();
                            GattCharacteristic {
                                description: gatt_description(&uuid).to_string(),
                                properties: property_names(c.properties),
                                uuid,
                            }
                        })
                        .collect(),
                    uuid,
                }
            })
            .collect())
    }

    fn property_names(flags: CharPropFlags) -> Vec<String> {
        [
            (CharPropFlags::BROADCAST, "broadcast"),
            (CharPropFlags::READ, "read"),
            (CharPropFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
            (CharPropFlags::WRITE, "write"),
            (CharPropFlags::NOTIFY, "notify"),
            (CharPropFlags::INDICATE, "indicate"),
            (
                CharPropFlags::AUTHENTICATED_SIGNED_WRITES,
                "authenticated-signed-writes",
            ),
            (CharPropFlags::EXTENDED_PROPERTIES, "extended-properties"),
        ]
        .into_iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| name.to_string())
        .collect()
    }

}

#[cfg(all(test, not(feature = "ble")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_feature_is_unavailable() {
        let mac = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        let err = GattEnumerator::new("hci0").enumerate(&mac).await.unwrap_err();
        assert!(matches!(err, EnumerationError::Unavailable(_)));
    }
}
