// Service Enumerator Port
// SDP browsing for classic devices, GATT tree reads for BLE devices

use crate::domain::{MacAddress, ServiceInfo};
use crate::port::PrivilegeError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    #[error("Enumeration unavailable: {0}")]
    Unavailable(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error("Failed to parse enumeration output: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ServiceEnumerator: Send + Sync {
    /// Browse SDP records of a classic device
    async fn enumerate_classic(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError>;

    /// Read the GATT service/characteristic tree of a BLE device
    ///
    /// Implementations must release the connection on every exit path.
    async fn enumerate_ble(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{ClassicService, GattService};
    use std::sync::Mutex;

    /// Which path the mock was asked to take
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum EnumerationPath {
        Classic,
        Ble,
    }

    #[derive(Default)]
    pub struct MockServiceEnumerator {
        calls: Mutex<Vec<(EnumerationPath, MacAddress)>>,
    }

    impl MockServiceEnumerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<(EnumerationPath, MacAddress)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ServiceEnumerator for MockServiceEnumerator {
        async fn enumerate_classic(
            &self,
            mac: &MacAddress,
        ) -> Result<ServiceInfo, EnumerationError> {
            self.calls
                .lock()
                .unwrap()
                .push((EnumerationPath::Classic, *mac));
            Ok(ServiceInfo::classic(
                *mac,
                vec![ClassicService {
                    name: "Mock Serial Port".to_string(),
                    protocol: "RFCOMM".to_string(),
                    port: Some(1),
                    ..ClassicService::default()
                }],
            ))
        }

        async fn enumerate_ble(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError> {
            self.calls.lock().unwrap().push((EnumerationPath::Ble, *mac));
            Ok(ServiceInfo::gatt(
                *mac,
                vec![GattService {
                    uuid: "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
                    description: "Battery Service".to_string(),
                    characteristics: Vec::new(),
                }],
            ))
        }
    }
}
