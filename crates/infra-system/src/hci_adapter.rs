// Local adapter listing via `hciconfig`
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use bluesec_core::port::{GatewayCommand, PrivilegeError, PrivilegedExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterStatus {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdapterStatus::Up => "up",
            AdapterStatus::Down => "down",
            AdapterStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    pub address: Option<String>,
    pub status: AdapterStatus,
}

/// Run `hciconfig` and parse every adapter block
///
/// A failing `hciconfig` (no controller, no driver) yields an empty list.
pub async fn list_adapters(
    executor: &Arc<dyn PrivilegedExecutor>,
    limit: Duration,
) -> Result<Vec<AdapterInfo>, PrivilegeError> {
    let output = executor
        .execute(GatewayCommand::new(["hciconfig"]).timeout(limit))
        .await?;
    if !output.success() {
        debug!(stderr = %output.stderr.trim(), "hciconfig reported no adapters");
        return Ok(Vec::new());
    }
    Ok(parse_hciconfig(&output.stdout))
}

pub fn parse_hciconfig(stdout: &str) -> Vec<AdapterInfo> {
    let mut adapters: Vec<AdapterInfo> = Vec::new();

    for line in stdout.lines() {
        // Block headers start in column 0: `hci0:\tType: Primary  Bus: USB`
        if !line.starts_with(char::is_whitespace) {
            if let Some((name, _)) = line.split_once(':') {
                if name.starts_with("hci") {
                    adapters.push(AdapterInfo {
                        name: name.to_string(),
                        address: None,
                        status: AdapterStatus::Unknown,
                    });
                }
            }
            continue;
        }

        let Some(current) = adapters.last_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("BD Address:") {
            current.address = rest.split_whitespace().next().map(str::to_string);
        } else {
            let mut flags = trimmed.split_whitespace();
            match flags.next() {
                Some("UP") => current.status = AdapterStatus::Up,
                Some("DOWN") => current.status = AdapterStatus::Down,
                _ => {}
            }
        }
    }

    adapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesec_core::port::privileged_executor::mocks::{MockBehavior, MockPrivilegedExecutor};

    const HCICONFIG: &str = "hci1:\tType: Primary  Bus: USB\n\
\tBD Address: 00:1A:7D:DA:71:13  ACL MTU: 310:10  SCO MTU: 64:8\n\
\tDOWN \n\
\tRX bytes:0 acl:0 sco:0 events:0 errors:0\n\
\n\
hci0:\tType: Primary  Bus: UART\n\
\tBD Address: B8:27:EB:12:34:56  ACL MTU: 1021:8  SCO MTU: 64:1\n\
\tUP RUNNING PSCAN \n\
\tRX bytes:1550 acl:0 sco:0 events:90 errors:0\n";

    #[test]
    fn test_parse_hciconfig() {
        let adapters = parse_hciconfig(HCICONFIG);
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].name, "hci1");
        assert_eq!(adapters[0].address.as_deref(), Some("00:1A:7D:DA:71:13"));
        assert_eq!(adapters[0].status, AdapterStatus::Down);
        assert_eq!(adapters[1].name, "hci0");
        assert_eq!(adapters[1].status, AdapterStatus::Up);
    }

    #[test]
    fn test_parse_without_status_line() {
        let adapters = parse_hciconfig("hci0:\tType: Primary  Bus: USB\n");
        assert_eq!(adapters[0].status, AdapterStatus::Unknown);
        assert_eq!(adapters[0].address, None);
    }

    #[tokio::test]
    async fn test_failing_hciconfig_is_empty() {
        let executor: Arc<dyn PrivilegedExecutor> = Arc::new(MockPrivilegedExecutor::new(
            MockBehavior::fail(1, "Can't get device info"),
        ));
        let adapters = tokio_test::assert_ok!(list_adapters(&executor, Duration::from_secs(5)).await);
        assert!(adapters.is_empty());
    }
}
