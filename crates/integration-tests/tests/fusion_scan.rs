//! Fusion scan tests
//!
//! Two discovery sources feeding one registry through the fusion engine

use async_trait::async_trait;
use bluesec_core::application::{FusionEngine, ScanRequest};
use bluesec_core::domain::{AuditEvent, MacAddress, Modality, Sighting};
use bluesec_core::port::audit_sink::mocks::RecordingAuditSink;
use bluesec_core::port::discovery_source::mocks::MockDiscoverySource;
use bluesec_core::port::{DiscoveryError, DiscoverySource};
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap()
}

fn request(classic: bool, ble: bool, concurrent: bool) -> ScanRequest {
    ScanRequest {
        duration: Duration::from_millis(50),
        classic,
        ble,
        concurrent,
    }
}

struct PanickingSource;

#[async_trait]
impl DiscoverySource for PanickingSource {
    fn modality(&self) -> Modality {
        Modality::Ble
    }

    async fn discover(
        &self,
        _duration: Duration,
        _sink: mpsc::Sender<Sighting>,
    ) -> Result<usize, DiscoveryError> {
        panic!("radio driver crashed");
    }
}

/// Classic "Phone" then BLE rssi=-55 for the same MAC in another case form
#[tokio::test]
async fn test_phone_seen_by_both_radios() {
    let classic = Arc::new(MockDiscoverySource::new(
        Modality::Classic,
        vec![Sighting::classic(
            mac("AA:BB:CC:DD:EE:FF"),
            Some("Phone".to_string()),
            Some(0x5A020C),
        )],
    ));
    let ble = Arc::new(
        MockDiscoverySource::new(
            Modality::Ble,
            vec![Sighting::ble(
                mac("aa:bb:cc:dd:ee:ff"),
                None,
                Some(-55),
                Map::new(),
            )],
        )
        .with_delay(Duration::from_millis(20)),
    );
    let audit = Arc::new(RecordingAuditSink::new());
    let engine = FusionEngine::new(classic, ble, audit.clone());

    let devices = engine.scan(request(true, true, true)).await;

    assert_eq!(devices.len(), 1);
    let phone = &devices[0];
    assert_eq!(phone.mac.to_string(), "AA:BB:CC:DD:EE:FF");
    assert_eq!(phone.modality, Modality::ClassicBle);
    assert_eq!(phone.rssi, Some(-55));
    assert_eq!(phone.name, "Phone");
    assert_eq!(
        phone.device_class_parsed.as_ref().map(|c| c.major_class.as_str()),
        Some("Phone")
    );

    let json = serde_json::to_value(phone).unwrap();
    assert_eq!(json["type"], "classic+ble");

    let events = audit.events();
    assert!(matches!(events.first(), Some(AuditEvent::ScanStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(AuditEvent::ScanCompleted {
            device_count: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn test_interleaved_sightings_keep_last_rssi() {
    let target = mac("11:22:33:44:55:66");
    let classic = Arc::new(MockDiscoverySource::new(
        Modality::Classic,
        vec![
            Sighting::classic(target, None, None),
            Sighting::classic(target, Some("Speaker".into()), Some(0x240404)),
        ],
    ));
    let ble = Arc::new(MockDiscoverySource::new(
        Modality::Ble,
        vec![
            Sighting::ble(target, None, Some(-80), Map::new()),
            Sighting::ble(target, None, None, Map::new()),
            Sighting::ble(target, None, Some(-42), Map::new()),
            Sighting::ble(target, None, None, Map::new()),
        ],
    ));
    let engine = FusionEngine::new(classic, ble, Arc::new(RecordingAuditSink::new()));

    // Sequential: classic completes before BLE starts, so -42 is the last RSSI applied
    let devices = engine.scan(request(true, true, false)).await;

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].modality, Modality::ClassicBle);
    assert_eq!(devices[0].rssi, Some(-42));
    assert_eq!(devices[0].name, "Speaker");
}

#[tokio::test]
async fn test_no_modalities_is_empty() {
    let classic = Arc::new(MockDiscoverySource::new(
        Modality::Classic,
        vec![Sighting::classic(mac("AA:BB:CC:DD:EE:FF"), None, None)],
    ));
    let ble = Arc::new(MockDiscoverySource::empty(Modality::Ble));
    let engine = FusionEngine::new(classic.clone(), ble.clone(), Arc::new(RecordingAuditSink::new()));

    let devices = engine.scan(request(false, false, true)).await;

    assert!(devices.is_empty());
    assert_eq!(classic.call_count(), 0);
    assert_eq!(ble.call_count(), 0);
}

#[tokio::test]
async fn test_failing_and_panicking_sources_degrade() {
    let classic = Arc::new(MockDiscoverySource::new(
        Modality::Classic,
        vec![Sighting::classic(mac("AA:BB:CC:DD:EE:01"), None, None)],
    ));
    let engine = FusionEngine::new(
        classic,
        Arc::new(PanickingSource),
        Arc::new(RecordingAuditSink::new()),
    );

    let devices = engine.scan(request(true, true, true)).await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].modality, Modality::Classic);

    let engine = FusionEngine::new(
        Arc::new(MockDiscoverySource::failing(
            Modality::Classic,
            DiscoveryError::Unavailable("hcitool missing".into()),
        )),
        Arc::new(MockDiscoverySource::new(
            Modality::Ble,
            vec![Sighting::ble(mac("AA:BB:CC:DD:EE:02"), None, Some(-60), Map::new())],
        )),
        Arc::new(RecordingAuditSink::new()),
    );

    let devices = engine.scan(request(true, true, false)).await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].modality, Modality::Ble);
}

#[tokio::test]
async fn test_each_scan_starts_from_empty_registry() {
    let classic = Arc::new(MockDiscoverySource::new(
        Modality::Classic,
        vec![Sighting::classic(mac("AA:BB:CC:DD:EE:01"), None, None)],
    ));
    let engine = FusionEngine::new(
        classic.clone(),
        Arc::new(MockDiscoverySource::empty(Modality::Ble)),
        Arc::new(RecordingAuditSink::new()),
    );

    assert_eq!(engine.scan(request(true, true, true)).await.len(), 1);

    classic.set_sightings(vec![Sighting::classic(mac("AA:BB:CC:DD:EE:02"), None, None)]);
    let devices = engine.scan(request(true, true, true)).await;

    assert_eq!(devices.len(), 1);
    assert!(engine.lookup(&mac("AA:BB:CC:DD:EE:01")).is_none());
    assert!(engine.lookup(&mac("AA:BB:CC:DD:EE:02")).is_some());
}
