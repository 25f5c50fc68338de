// Classic (BR/EDR) discovery through `hcitool inq`
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::privilege_gateway::find_in_path;
use bluesec_core::domain::{MacAddress, Modality, Sighting};
use bluesec_core::port::{DiscoveryError, DiscoverySource, GatewayCommand, PrivilegedExecutor};

/// One inquiry length unit as defined by HCI (1.28s)
const INQUIRY_UNIT: Duration = Duration::from_millis(1280);

/// Inquiry length bounds accepted by hcitool
const MAX_INQUIRY_UNITS: u64 = 48;

/// Extra gateway time on top of the inquiry itself (10s)
const INQUIRY_GRACE: Duration = Duration::from_secs(10);

/// Timeout for a single remote name request (5s)
const NAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HcitoolInquirySource {
    executor: Arc<dyn PrivilegedExecutor>,
    adapter: String,
}

impl HcitoolInquirySource {
    pub fn new(executor: Arc<dyn PrivilegedExecutor>, adapter: impl Into<String>) -> Self {
        Self {
            executor,
            adapter: adapter.into(),
        }
    }

    async fn resolve_name(&self, mac: &MacAddress) -> Option<String> {
        let cmd = GatewayCommand::new([
            "hcitool".to_string(),
            "-i".to_string(),
            self.adapter.clone(),
            "name".to_string(),
            mac.to_string(),
        ])
        .timeout(NAME_TIMEOUT);

        match self.executor.execute(cmd).await {
            Ok(output) if output.success() => {
                let name = output.stdout.trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            Ok(_) => None,
            Err(e) => {
                debug!(mac = %mac, error = %e, "Name lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl DiscoverySource for HcitoolInquirySource {
    fn modality(&self) -> Modality {
        Modality::Classic
    }

    async fn discover(
        &self,
        duration: Duration,
        sink: mpsc::Sender<Sighting>,
    ) -> Result<usize, DiscoveryError> {
        if find_in_path("hcitool").is_none() {
            return Err(DiscoveryError::Unavailable(
                "hcitool not installed; classic scanning disabled".to_string(),
            ));
        }

        let units = inquiry_units(duration);
        info!(adapter = %self.adapter, units, "Starting classic inquiry");

        let cmd = GatewayCommand::new([
            "hcitool".to_string(),
            "-i".to_string(),
            self.adapter.clone(),
            "inq".to_string(),
            format!("--length={units}"),
        ])
        .timeout(INQUIRY_UNIT * units as u32 + INQUIRY_GRACE);

        let output = self
            .executor
            .execute(cmd)
            .await
            .map_err(|e| DiscoveryError::Os(e.to_string()))?;
        if !output.success() {
            return Err(DiscoveryError::Os(format!(
                "hcitool inq failed: {}",
                output.stderr.trim()
            )));
        }

        let found = parse_inquiry(&output.stdout);
        let mut sent = 0;
        for (mac, class) in found {
            let name = self.resolve_name(&mac).await;
            debug!(mac = %mac, name = ?name, class = ?class, "Classic device found");
            if sink.send(Sighting::classic(mac, name, class)).await.is_err() {
                warn!("Sighting channel closed, stopping classic discovery");
                break;
            }
            sent += 1;
        }

        info!(devices = sent, "Classic inquiry complete");
        Ok(sent)
    }
}

/// ceil(duration / 1.28s), clamped to 1..=48
pub fn inquiry_units(duration: Duration) -> u64 {
    let unit = INQUIRY_UNIT.as_millis() as u64;
    let ms = duration.as_millis() as u64;
    ms.div_ceil(unit).clamp(1, MAX_INQUIRY_UNITS)
}

/// Parse `hcitool inq` lines: `<MAC>  clock offset: 0x....  class: 0x......`
pub fn parse_inquiry(stdout: &str) -> Vec<(MacAddress, Option<u32>)> {
    let mut found: Vec<(MacAddress, Option<u32>)> = Vec::new();

    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        let Some(mac) = fields.next().and_then(|f| MacAddress::parse(f).ok()) else {
            continue;
        };
        let class = line
            .split("class:")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|hex| u32::from_str_radix(hex.trim_start_matches("0x"), 16).ok());

        if !found.iter().any(|(seen, _)| *seen == mac) {
            found.push((mac, class));
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const INQ_OUTPUT: &str = "Inquiring ...\n\
        \tAA:BB:CC:DD:EE:FF\tclock offset: 0x1f2a\tclass: 0x5a020c\n\
        \t11:22:33:44:55:66\tclock offset: 0x0000\tclass: 0x240404\n\
        \tAA:BB:CC:DD:EE:FF\tclock offset: 0x1f2b\tclass: 0x5a020c\n";

    #[test]
    fn test_parse_inquiry() {
        let found = parse_inquiry(INQ_OUTPUT);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(found[0].1, Some(0x5A020C));
        assert_eq!(found[1].1, Some(0x240404));
    }

    #[test]
    fn test_parse_ignores_noise() {
        assert!(parse_inquiry("Inquiring ...\nDevice is not available.\n").is_empty());
    }

    #[test]
    fn test_inquiry_units() {
        assert_eq!(inquiry_units(Duration::from_secs(10)), 8);
        assert_eq!(inquiry_units(Duration::from_millis(1280)), 1);
        assert_eq!(inquiry_units(Duration::ZERO), 1);
        assert_eq!(inquiry_units(Duration::from_secs(600)), 48);
    }
}
