// Application configuration (explicit context object, no global singleton)
// Loaded by the CLI with the `config` crate; every section has serde defaults.

use crate::error::{AppError, Result};
use crate::port::ElevationMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub privileges: PrivilegeConfig,
    pub bluetooth: BluetoothConfig,
    pub attacks: AttackConfig,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub ethical_mode: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { ethical_mode: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    pub method: ElevationMethod,
    /// Credential cache lifetime of the elevation helper (informational)
    pub cache_timeout_secs: u64,
    /// Hard timeout for a single gateway command
    pub command_timeout_secs: u64,
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            method: ElevationMethod::Pkexec,
            cache_timeout_secs: 300,
            command_timeout_secs: 60,
        }
    }
}

impl PrivilegeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    pub default_adapter: String,
    pub scan_duration_secs: u64,
    pub classic_enabled: bool,
    pub ble_enabled: bool,
    pub concurrent: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            default_adapter: "hci0".to_string(),
            scan_duration_secs: 10,
            classic_enabled: true,
            ble_enabled: true,
            concurrent: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub require_confirmation: bool,
    /// Ceiling applied to every attack's wall-clock budget
    pub max_duration_secs: u64,
    pub flood: FloodConfig,
    pub pin: PinConfig,
    pub sniff: SniffConfig,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            max_duration_secs: 300,
            flood: FloodConfig::default(),
            pin: PinConfig::default(),
            sniff: SniffConfig::default(),
        }
    }
}

impl AttackConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Echo payload size in bytes
    pub packet_size: u32,
    pub probe_timeout_secs: u64,
    pub probe_interval_ms: u64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            packet_size: 600,
            probe_timeout_secs: 1,
            probe_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub max_attempts: u32,
    pub start_pin: u32,
    pub attempt_interval_ms: u64,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            start_pin: 0,
            attempt_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniffConfig {
    pub interface: String,
    pub capture_dir: String,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            interface: "bluetooth0".to_string(),
            capture_dir: "captures".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub file_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_path: "logs/audit.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: "sessions".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Highest PIN in the 4-digit space
pub const MAX_PIN: u32 = 9999;

impl AppConfig {
    /// Reject values the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.privileges.command_timeout_secs == 0 {
            return Err(config_error("privileges.command_timeout_secs must be > 0"));
        }
        if self.bluetooth.default_adapter.trim().is_empty() {
            return Err(config_error("bluetooth.default_adapter must not be empty"));
        }
        if self.bluetooth.scan_duration_secs == 0 {
            return Err(config_error("bluetooth.scan_duration_secs must be > 0"));
        }
        if self.attacks.max_duration_secs == 0 {
            return Err(config_error("attacks.max_duration_secs must be > 0"));
        }
        if self.attacks.flood.probe_timeout_secs == 0 {
            return Err(config_error("attacks.flood.probe_timeout_secs must be > 0"));
        }
        if self.attacks.pin.start_pin > MAX_PIN {
            return Err(config_error(format!(
                "attacks.pin.start_pin must be <= {MAX_PIN}"
            )));
        }
        if self.attacks.pin.max_attempts == 0 {
            return Err(config_error("attacks.pin.max_attempts must be > 0"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(config_error(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(config_error(format!(
                "Invalid log format: {} (expected pretty or json)",
                self.logging.format
            )));
        }
        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> AppError {
    AppError::Config(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.app.ethical_mode);
        assert_eq!(config.privileges.method, ElevationMethod::Pkexec);
        assert_eq!(config.bluetooth.default_adapter, "hci0");
        assert_eq!(config.attacks.pin.max_attempts, 1000);
    }

    #[test]
    fn test_partial_json_keeps_section_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "privileges": { "method": "none" },
            "attacks": { "pin": { "start_pin": 42 } }
        }))
        .unwrap();

        assert_eq!(config.privileges.method, ElevationMethod::Disabled);
        assert_eq!(config.privileges.command_timeout_secs, 60);
        assert_eq!(config.attacks.pin.start_pin, 42);
        assert_eq!(config.attacks.pin.max_attempts, 1000);
        assert_eq!(config.attacks.max_duration_secs, 300);
    }

    #[test]
    fn test_rejects_start_pin_out_of_space() {
        let mut config = AppConfig::default();
        config.attacks.pin.start_pin = 10_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("start_pin"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.privileges.command_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
