// Session snapshot (persisted by the caller, payloads produced by the core)

use crate::domain::attack::AttackTask;
use crate::domain::audit::AuditRecord;
use crate::domain::device::DeviceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub attacks: Vec<AttackTask>,
    #[serde(default)]
    pub logs: Vec<AuditRecord>,
}

impl SessionSnapshot {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id_for(start_time),
            start_time,
            devices: Vec::new(),
            attacks: Vec::new(),
            logs: Vec::new(),
        }
    }
}

/// `session_YYYYmmdd_HHMMSS`
pub fn session_id_for(start_time: DateTime<Utc>) -> String {
    format!("session_{}", start_time.format("%Y%m%d_%H%M%S"))
}
