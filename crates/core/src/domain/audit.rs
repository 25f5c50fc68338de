// Audit trail events (schema owned here, storage owned by the sink adapter)

use crate::domain::attack::{AttackKind, AttackStatus, TaskId};
use crate::domain::mac::MacAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEvent {
    GatewayInvocation {
        method: String,
        argv: Vec<String>,
        needs_confirmation: bool,
    },
    ScanStarted {
        duration_secs: u64,
        classic: bool,
        ble: bool,
        concurrent: bool,
    },
    ScanCompleted {
        device_count: usize,
        classic_count: usize,
        ble_count: usize,
        elapsed_ms: u64,
    },
    EnumerationRequested {
        mac: MacAddress,
    },
    AttackStarted {
        task_id: TaskId,
        kind: AttackKind,
        target: MacAddress,
        duration_secs: Option<u64>,
    },
    AttackStopRequested {
        task_id: TaskId,
    },
    AttackCompleted {
        task_id: TaskId,
        kind: AttackKind,
        target: MacAddress,
        status: AttackStatus,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    },
}

/// Event stamped by the sink at record time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub ethical_mode: bool,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    pub fn new(event: AuditEvent, ethical_mode: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            ethical_mode,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_flattens_action_tag() {
        let record = AuditRecord::new(
            AuditEvent::ScanCompleted {
                device_count: 3,
                classic_count: 2,
                ble_count: 1,
                elapsed_ms: 10_000,
            },
            true,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"], "scan_completed");
        assert_eq!(value["device_count"], 3);
        assert_eq!(value["ethical_mode"], true);
        assert!(value["timestamp"].is_string());
    }
}
