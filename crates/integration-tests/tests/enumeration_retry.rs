//! Enumeration tests
//!
//! Registry lookup, single rescan on a miss, and path selection by modality

use bluesec_core::application::{EnumerationService, FusionEngine, ScanRequest};
use bluesec_core::domain::{AuditEvent, MacAddress, Modality, ServiceList, Sighting};
use bluesec_core::error::AppError;
use bluesec_core::port::audit_sink::mocks::RecordingAuditSink;
use bluesec_core::port::discovery_source::mocks::MockDiscoverySource;
use bluesec_core::port::service_enumerator::mocks::{EnumerationPath, MockServiceEnumerator};
use serde_json::Map;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

struct Fixture {
    classic: Arc<MockDiscoverySource>,
    ble: Arc<MockDiscoverySource>,
    discovery: Arc<FusionEngine>,
    enumerator: Arc<MockServiceEnumerator>,
    audit: Arc<RecordingAuditSink>,
    service: EnumerationService,
}

fn fixture(classic: Vec<Sighting>, ble: Vec<Sighting>) -> Fixture {
    let classic = Arc::new(MockDiscoverySource::new(Modality::Classic, classic));
    let ble = Arc::new(MockDiscoverySource::new(Modality::Ble, ble));
    let audit = Arc::new(RecordingAuditSink::new());
    let discovery = Arc::new(FusionEngine::new(classic.clone(), ble.clone(), audit.clone()));
    let enumerator = Arc::new(MockServiceEnumerator::new());
    let service = EnumerationService::new(discovery.clone(), enumerator.clone(), audit.clone());

    Fixture {
        classic,
        ble,
        discovery,
        enumerator,
        audit,
        service,
    }
}

fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap()
}

#[tokio::test]
async fn test_unknown_mac_rescans_exactly_once() {
    let f = fixture(Vec::new(), Vec::new());

    let err = assert_err!(f.service.enumerate("AA:BB:CC:DD:EE:FF").await);

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(f.classic.call_count(), 1, "one rescan of the classic radio");
    assert_eq!(f.ble.call_count(), 1, "one rescan of the BLE radio");
    assert!(f.enumerator.calls().is_empty());

    let events = f.audit.events();
    assert!(matches!(
        events.first(),
        Some(AuditEvent::EnumerationRequested { .. })
    ));
}

#[tokio::test]
async fn test_rescan_finds_device() {
    let target = mac("AA:BB:CC:DD:EE:FF");
    let f = fixture(Vec::new(), vec![Sighting::ble(target, None, Some(-60), Map::new())]);

    let info = assert_ok!(f.service.enumerate("aa-bb-cc-dd-ee-ff").await);

    assert_eq!(info.modality, Modality::Ble);
    assert!(matches!(info.services, ServiceList::Gatt(_)));
    assert_eq!(f.enumerator.calls(), vec![(EnumerationPath::Ble, target)]);
    assert_eq!(f.ble.call_count(), 1);
}

#[tokio::test]
async fn test_known_device_skips_rescan() {
    let target = mac("AA:BB:CC:DD:EE:FF");
    let f = fixture(vec![Sighting::classic(target, Some("Headset".into()), None)], Vec::new());
    f.discovery.scan(ScanRequest::rescan()).await;

    let info = assert_ok!(f.service.enumerate("AA:BB:CC:DD:EE:FF").await);

    assert!(matches!(info.services, ServiceList::Classic(_)));
    assert_eq!(f.classic.call_count(), 1, "only the initial scan");
}

#[tokio::test]
async fn test_dual_mode_device_takes_classic_path() {
    let target = mac("AA:BB:CC:DD:EE:FF");
    let f = fixture(
        vec![Sighting::classic(target, None, None)],
        vec![Sighting::ble(target, None, Some(-50), Map::new())],
    );
    f.discovery.scan(ScanRequest::rescan()).await;
    assert_eq!(
        f.discovery.lookup(&target).map(|d| d.modality),
        Some(Modality::ClassicBle)
    );

    f.service.enumerate("AA:BB:CC:DD:EE:FF").await.unwrap();

    assert_eq!(f.enumerator.calls(), vec![(EnumerationPath::Classic, target)]);
}

#[tokio::test]
async fn test_malformed_mac_is_validation_error() {
    let f = fixture(Vec::new(), Vec::new());

    let err = assert_err!(f.service.enumerate("not-a-mac").await);

    assert!(err.is_validation());
    assert_eq!(f.classic.call_count(), 0);
}
