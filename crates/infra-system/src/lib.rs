// bluesec Infrastructure - System Adapters
// Implements: PrivilegedExecutor, DiscoverySource, ServiceEnumerator, AuditSink

pub mod audit_log;
pub mod ble_source;
pub mod classic_source;
pub mod enumerator;
pub mod gatt_enumerator;
pub mod hci_adapter;
pub mod privilege_gateway;
pub mod sdp_enumerator;

pub use audit_log::JsonlAuditSink;
pub use ble_source::BleAdvertisementSource;
pub use classic_source::HcitoolInquirySource;
pub use enumerator::SystemServiceEnumerator;
pub use gatt_enumerator::GattEnumerator;
pub use hci_adapter::{list_adapters, AdapterInfo, AdapterStatus};
pub use privilege_gateway::{find_in_path, is_root, PrivilegeGateway};
pub use sdp_enumerator::SdpEnumerator;
