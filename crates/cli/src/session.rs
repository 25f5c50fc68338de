//! Session recording: tees audit events into memory and persists snapshots

use anyhow::{Context, Result};
use async_trait::async_trait;
use bluesec_core::domain::{AttackTask, AuditEvent, AuditRecord, DeviceRecord, SessionSnapshot};
use bluesec_core::port::AuditSink;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Audit sink that keeps the session's events and forwards them downstream
pub struct SessionRecorder {
    inner: Arc<dyn AuditSink>,
    ethical_mode: bool,
    start_time: DateTime<Utc>,
    logs: Mutex<Vec<AuditRecord>>,
}

impl SessionRecorder {
    pub fn new(inner: Arc<dyn AuditSink>, ethical_mode: bool, start_time: DateTime<Utc>) -> Self {
        Self {
            inner,
            ethical_mode,
            start_time,
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self, devices: Vec<DeviceRecord>, attacks: Vec<AttackTask>) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::new(self.start_time);
        snapshot.devices = devices;
        snapshot.attacks = attacks;
        snapshot.logs = self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone();
        snapshot
    }
}

#[async_trait]
impl AuditSink for SessionRecorder {
    async fn record(&self, event: AuditEvent) {
        let record = AuditRecord::new(event.clone(), self.ethical_mode);
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        self.inner.record(event).await;
    }
}

/// Write `<dir>/<session_id>.json`
pub fn save(dir: &Path, snapshot: &SessionSnapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create session dir {}", dir.display()))?;
    let path = dir.join(format!("{}.json", snapshot.session_id));
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write session {}", path.display()))?;

    info!(
        session_id = %snapshot.session_id,
        devices = snapshot.devices.len(),
        attacks = snapshot.attacks.len(),
        path = %path.display(),
        "Session saved"
    );
    Ok(path)
}

/// Load by session id (from `dir`) or by explicit file path
pub fn load(dir: &Path, id_or_path: &str) -> Result<SessionSnapshot> {
    let direct = PathBuf::from(id_or_path);
    let path = if direct.is_file() {
        direct
    } else {
        dir.join(format!("{}.json", id_or_path.trim_end_matches(".json")))
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Session not found: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Malformed session file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesec_core::domain::MacAddress;
    use bluesec_core::port::audit_sink::mocks::RecordingAuditSink;

    #[tokio::test]
    async fn test_recorder_tees_and_saves() {
        let downstream = Arc::new(RecordingAuditSink::new());
        let recorder = SessionRecorder::new(downstream.clone(), true, Utc::now());

        recorder
            .record(AuditEvent::EnumerationRequested {
                mac: MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            })
            .await;
        assert_eq!(downstream.events().len(), 1);

        let snapshot = recorder.snapshot(Vec::new(), Vec::new());
        assert_eq!(snapshot.logs.len(), 1);
        assert!(snapshot.logs[0].ethical_mode);

        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), &snapshot).unwrap();
        assert!(path.ends_with(format!("{}.json", snapshot.session_id)));

        let loaded = load(dir.path(), &snapshot.session_id).unwrap();
        assert_eq!(loaded.session_id, snapshot.session_id);
        assert_eq!(loaded.logs.len(), 1);

        let by_path = load(dir.path(), path.to_str().unwrap()).unwrap();
        assert_eq!(by_path.session_id, snapshot.session_id);
    }

    #[test]
    fn test_load_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "session_19700101_000000").is_err());
    }
}
