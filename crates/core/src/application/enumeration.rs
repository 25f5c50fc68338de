// Service enumeration for a single device
// Resolves the device through the fusion engine, rescanning once if unknown.

use crate::application::discovery::{FusionEngine, ScanRequest};
use crate::domain::{AuditEvent, DeviceRecord, MacAddress, Modality, ServiceInfo};
use crate::error::{AppError, Result};
use crate::port::{AuditSink, ServiceEnumerator};
use std::sync::Arc;
use tracing::info;

pub struct EnumerationService {
    discovery: Arc<FusionEngine>,
    enumerator: Arc<dyn ServiceEnumerator>,
    audit: Arc<dyn AuditSink>,
}

impl EnumerationService {
    pub fn new(
        discovery: Arc<FusionEngine>,
        enumerator: Arc<dyn ServiceEnumerator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            discovery,
            enumerator,
            audit,
        }
    }

    /// Enumerate the services of `mac`
    ///
    /// Devices seen by both radios take the classic (SDP) path.
    ///
    /// # Errors
    /// - AppError::Domain if `mac` is malformed
    /// - AppError::NotFound if the device is absent after one rescan
    /// - AppError::Enumeration if the enumerator fails
    pub async fn enumerate(&self, mac: &str) -> Result<ServiceInfo> {
        let mac = MacAddress::parse(mac)?;

        info!(mac = %mac, "Enumerating services");
        self.audit
            .record(AuditEvent::EnumerationRequested { mac })
            .await;

        let device = self.resolve(&mac).await?;

        let info = if device.modality.includes_classic() {
            self.enumerator.enumerate_classic(&mac).await?
        } else {
            self.enumerator.enumerate_ble(&mac).await?
        };

        info!(
            mac = %mac,
            modality = %device.modality,
            services = info.service_count(),
            "Enumeration complete"
        );
        Ok(info)
    }

    async fn resolve(&self, mac: &MacAddress) -> Result<DeviceRecord> {
        if let Some(device) = self.discovery.lookup(mac) {
            return Ok(device);
        }

        info!(mac = %mac, "Device not in registry, rescanning");
        self.discovery.scan(ScanRequest::rescan()).await;

        self.discovery
            .lookup(mac)
            .ok_or_else(|| AppError::NotFound(format!("Device {mac} not found")))
    }
}

/// Path a record of this modality is enumerated through
pub fn enumeration_path(modality: Modality) -> &'static str {
    if modality.includes_classic() {
        "sdp"
    } else {
        "gatt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ServiceList, Sighting};
    use crate::port::audit_sink::mocks::RecordingAuditSink;
    use crate::port::discovery_source::mocks::MockDiscoverySource;
    use crate::port::service_enumerator::mocks::{EnumerationPath, MockServiceEnumerator};
    use serde_json::Map;

    struct Fixture {
        service: EnumerationService,
        classic: Arc<MockDiscoverySource>,
        ble: Arc<MockDiscoverySource>,
        enumerator: Arc<MockServiceEnumerator>,
        audit: Arc<RecordingAuditSink>,
    }

    fn fixture(classic: MockDiscoverySource, ble: MockDiscoverySource) -> Fixture {
        let classic = Arc::new(classic);
        let ble = Arc::new(ble);
        let audit = Arc::new(RecordingAuditSink::new());
        let engine = Arc::new(FusionEngine::new(classic.clone(), ble.clone(), audit.clone()));
        let enumerator = Arc::new(MockServiceEnumerator::new());
        Fixture {
            service: EnumerationService::new(engine, enumerator.clone(), audit.clone()),
            classic,
            ble,
            enumerator,
            audit,
        }
    }

    #[tokio::test]
    async fn test_unknown_device_rescans_exactly_once() {
        let f = fixture(
            MockDiscoverySource::empty(Modality::Classic),
            MockDiscoverySource::empty(Modality::Ble),
        );

        let err = f.service.enumerate("AA:BB:CC:DD:EE:FF").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.classic.call_count(), 1);
        assert_eq!(f.ble.call_count(), 1);
        assert!(f.enumerator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rescan_finds_ble_device() {
        let addr = MacAddress::parse("11:22:33:44:55:66").unwrap();
        let f = fixture(
            MockDiscoverySource::empty(Modality::Classic),
            MockDiscoverySource::new(
                Modality::Ble,
                vec![Sighting::ble(addr, Some("Band".into()), Some(-55), Map::new())],
            ),
        );

        let info = f.service.enumerate("11-22-33-44-55-66").await.unwrap();

        assert!(matches!(info.services, ServiceList::Gatt(_)));
        assert_eq!(f.enumerator.calls(), vec![(EnumerationPath::Ble, addr)]);
        assert!(matches!(
            f.audit.events().first(),
            Some(AuditEvent::EnumerationRequested { .. })
        ));
    }

    #[tokio::test]
    async fn test_dual_mode_device_takes_classic_path() {
        let addr = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        let f = fixture(
            MockDiscoverySource::new(Modality::Classic, vec![Sighting::classic(addr, None, None)]),
            MockDiscoverySource::new(
                Modality::Ble,
                vec![Sighting::ble(addr, None, Some(-60), Map::new())],
            ),
        );

        let info = f.service.enumerate("aa:bb:cc:dd:ee:ff").await.unwrap();

        assert!(matches!(info.services, ServiceList::Classic(_)));
        assert_eq!(f.enumerator.calls(), vec![(EnumerationPath::Classic, addr)]);
    }

    #[tokio::test]
    async fn test_known_device_skips_rescan() {
        let addr = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        let f = fixture(
            MockDiscoverySource::new(Modality::Classic, vec![Sighting::classic(addr, None, None)]),
            MockDiscoverySource::empty(Modality::Ble),
        );
        f.service.discovery.scan(ScanRequest::rescan()).await;

        f.service.enumerate("AA:BB:CC:DD:EE:FF").await.unwrap();

        assert_eq!(f.classic.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_mac_is_validation_error() {
        let f = fixture(
            MockDiscoverySource::empty(Modality::Classic),
            MockDiscoverySource::empty(Modality::Ble),
        );

        let err = f.service.enumerate("not-a-mac").await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(f.classic.call_count(), 0);
        assert!(f.audit.events().is_empty());
    }

    #[test]
    fn test_enumeration_path() {
        assert_eq!(enumeration_path(Modality::ClassicBle), "sdp");
        assert_eq!(enumeration_path(Modality::Ble), "gatt");
    }
}
