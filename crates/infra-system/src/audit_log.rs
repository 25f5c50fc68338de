// Append-only JSON-lines audit trail
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

use bluesec_core::domain::{AuditEvent, AuditRecord};
use bluesec_core::port::AuditSink;

pub struct JsonlAuditSink {
    path: PathBuf,
    ethical_mode: bool,
    // One writer at a time so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>, ethical_mode: bool) -> Self {
        Self {
            path: path.into(),
            ethical_mode,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &AuditRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, event: AuditEvent) {
        let record = AuditRecord::new(event, self.ethical_mode);
        if let Err(e) = self.append(&record).await {
            error!(path = %self.path.display(), error = %e, "Failed to write audit record");
        }
    }
}
