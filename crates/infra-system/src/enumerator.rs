// ServiceEnumerator adapter: SDP for classic, GATT for BLE
use async_trait::async_trait;
use std::sync::Arc;

use crate::gatt_enumerator::GattEnumerator;
use crate::sdp_enumerator::SdpEnumerator;
use bluesec_core::domain::{MacAddress, ServiceInfo};
use bluesec_core::port::{EnumerationError, PrivilegedExecutor, ServiceEnumerator};

pub struct SystemServiceEnumerator {
    sdp: SdpEnumerator,
    gatt: GattEnumerator,
}

impl SystemServiceEnumerator {
    pub fn new(executor: Arc<dyn PrivilegedExecutor>, adapter: impl Into<String>) -> Self {
        Self {
            sdp: SdpEnumerator::new(executor),
            gatt: GattEnumerator::new(adapter),
        }
    }
}

#[async_trait]
impl ServiceEnumerator for SystemServiceEnumerator {
    async fn enumerate_classic(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError> {
        self.sdp.enumerate(mac).await
    }

    async fn enumerate_ble(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError> {
        self.gatt.enumerate(mac).await
    }
}
