// Classic service enumeration through `sdptool browse`
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::privilege_gateway::find_in_path;
use bluesec_core::domain::{ClassicService, MacAddress, ProfileDescriptor, ServiceInfo};
use bluesec_core::port::{EnumerationError, GatewayCommand, PrivilegedExecutor};

/// Timeout for one SDP browse (30s)
const BROWSE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SdpEnumerator {
    executor: Arc<dyn PrivilegedExecutor>,
}

impl SdpEnumerator {
    pub fn new(executor: Arc<dyn PrivilegedExecutor>) -> Self {
        Self { executor }
    }

    pub async fn enumerate(&self, mac: &MacAddress) -> Result<ServiceInfo, EnumerationError> {
        if find_in_path("sdptool").is_none() {
            return Err(EnumerationError::Unavailable(
                "sdptool not installed".to_string(),
            ));
        }

        debug!(mac = %mac, "Enumerating classic services");
        let cmd = GatewayCommand::new(["sdptool".to_string(), "browse".to_string(), mac.to_string()])
            .timeout(BROWSE_TIMEOUT);
        let output = self.executor.execute(cmd).await?;

        if !output.success() {
            return Err(EnumerationError::Connection(format!(
                "sdptool browse failed: {}",
                output.stderr.trim()
            )));
        }

        let services = parse_browse(&output.stdout);
        info!(mac = %mac, service_count = services.len(), "Classic services enumerated");
        Ok(ServiceInfo::classic(*mac, services))
    }
}

#[derive(PartialEq)]
enum Section {
    Other,
    ServiceClasses,
    Protocols,
    Profiles,
}

/// Parse `sdptool browse` output into one record per service
pub fn parse_browse(stdout: &str) -> Vec<ClassicService> {
    let mut services = Vec::new();
    let mut current: Option<ClassicService> = None;
    let mut section = Section::Other;

    for raw in stdout.lines() {
        let line = raw.trim();

        if let Some(name) = line.strip_prefix("Service Name:") {
            services.extend(current.take());
            current = Some(ClassicService {
                name: name.trim().to_string(),
                ..ClassicService::default()
            });
            section = Section::Other;
            continue;
        }
        if let Some(handle) = line.strip_prefix("Service RecHandle:") {
            // Records without a name start at their handle
            let record = current.get_or_insert_with(unnamed_service);
            if !record.service_id.is_empty() {
                services.extend(current.take());
                current = Some(unnamed_service());
            }
            if let Some(record) = current.as_mut() {
                record.service_id = handle.trim().to_string();
            }
            section = Section::Other;
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(desc) = line.strip_prefix("Service Description:") {
            record.description = desc.trim().to_string();
            section = Section::Other;
        } else if line.starts_with("Service Class ID List:") {
            section = Section::ServiceClasses;
        } else if line.starts_with("Protocol Descriptor List:") {
            section = Section::Protocols;
        } else if line.starts_with("Profile Descriptor List:") {
            section = Section::Profiles;
        } else if line.ends_with(':') && !raw.starts_with(' ') {
            section = Section::Other;
        } else if let Some(label) = quoted(line) {
            match section {
                Section::Protocols => record.protocol = label,
                Section::Profiles => record.profiles.push(ProfileDescriptor {
                    name: label,
                    version: None,
                }),
                Section::ServiceClasses | Section::Other => {}
            }
        } else if let Some(channel) = line.strip_prefix("Channel:") {
            if section == Section::Protocols {
                record.port = channel.trim().parse().ok();
            }
        } else if let Some(psm) = line.strip_prefix("PSM:") {
            if section == Section::Protocols && record.port.is_none() {
                record.port = parse_number(psm.trim());
            }
        } else if let Some(version) = line.strip_prefix("Version:") {
            if let Some(profile) = record.profiles.last_mut() {
                profile.version = Some(version.trim().to_string());
            }
        }
    }

    services.extend(current);
    services
}

fn unnamed_service() -> ClassicService {
    ClassicService {
        name: "Unknown".to_string(),
        ..ClassicService::default()
    }
}

/// `"RFCOMM" (0x0003)` -> `RFCOMM`
fn quoted(line: &str) -> Option<String> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn parse_number(s: &str) -> Option<u16> {
    match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSE_OUTPUT: &str = r#"Browsing AA:BB:CC:DD:EE:FF ...
Service Name: Headset Gateway
Service RecHandle: 0x10003
Service Class ID List:
  "Headset Audio Gateway" (0x1112)
  "Generic Audio" (0x1203)
Protocol Descriptor List:
  "L2CAP" (0x0100)
  "RFCOMM" (0x0003)
    Channel: 12
Profile Descriptor List:
  "Headset" (0x1108)
    Version: 0x0102

Service Name: OBEX Object Push
Service Description: File transfer
Service RecHandle: 0x10005
Protocol Descriptor List:
  "L2CAP" (0x0100)
    PSM: 0x1001
Profile Descriptor List:
  "OBEX Object Push" (0x1105)
    Version: 0x0100

Service RecHandle: 0x10007
Protocol Descriptor List:
  "L2CAP" (0x0100)
    PSM: 25
"#;

    #[test]
    fn test_parse_browse_records() {
        let services = parse_browse(BROWSE_OUTPUT);
        assert_eq!(services.len(), 3);

        let hsp = &services[0];
        assert_eq!(hsp.name, "Headset Gateway");
        assert_eq!(hsp.service_id, "0x10003");
        assert_eq!(hsp.protocol, "RFCOMM");
        assert_eq!(hsp.port, Some(12));
        assert_eq!(
            hsp.profiles,
            vec![ProfileDescriptor {
                name: "Headset".into(),
                version: Some("0x0102".into())
            }]
        );

        let opp = &services[1];
        assert_eq!(opp.description, "File transfer");
        assert_eq!(opp.protocol, "L2CAP");
        assert_eq!(opp.port, Some(0x1001));

        let unnamed = &services[2];
        assert_eq!(unnamed.name, "Unknown");
        assert_eq!(unnamed.service_id, "0x10007");
        assert_eq!(unnamed.port, Some(25));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_browse("Browsing AA:BB:CC:DD:EE:FF ...\n").is_empty());
    }
}
