// Attack Execution Core
// Submission, cooperative stop and terminal bookkeeping for attack tasks.

pub mod constants;
mod procedures;
mod stop;

pub use stop::{stop_channel, StopSignal, StopToken};

use crate::config::{AttackConfig, MAX_PIN};
use crate::domain::{
    AttackKind, AttackStatus, AttackTask, AuditEvent, DomainError, MacAddress, ProcedureOutcome,
    TaskId,
};
use crate::error::{AppError, Result};
use crate::port::{AuditSink, IdProvider, PrivilegedExecutor, TimeProvider};
use constants::MAX_PACKET_SIZE;
use procedures::ProcedureContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-request overrides of the configured attack defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttackParams {
    pub packet_size: Option<u32>,
    pub probe_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub start_pin: Option<u32>,
    pub output_file: Option<String>,
    pub interface: Option<String>,
    /// Capture without a target filter
    pub promiscuous: bool,
}

impl AttackParams {
    pub fn validate(&self) -> std::result::Result<(), DomainError> {
        if let Some(size) = self.packet_size {
            if size == 0 || size > MAX_PACKET_SIZE {
                return Err(invalid(format!(
                    "packet_size must be in 1..={MAX_PACKET_SIZE}, got {size}"
                )));
            }
        }
        if self.probe_timeout_secs == Some(0) {
            return Err(invalid("probe_timeout_secs must be > 0"));
        }
        if self.max_attempts == Some(0) {
            return Err(invalid("max_attempts must be > 0"));
        }
        if let Some(pin) = self.start_pin {
            if pin > MAX_PIN {
                return Err(invalid(format!("start_pin must be <= {MAX_PIN}, got {pin}")));
            }
        }
        if matches!(&self.output_file, Some(f) if f.trim().is_empty()) {
            return Err(invalid("output_file must not be empty"));
        }
        if matches!(&self.interface, Some(i) if i.trim().is_empty()) {
            return Err(invalid("interface must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> DomainError {
    DomainError::InvalidParameter(msg.into())
}

/// One attack submission
#[derive(Debug, Clone)]
pub struct AttackRequest {
    pub kind: AttackKind,
    /// Raw target address, validated on submit
    pub target: String,
    pub duration: Option<Duration>,
    pub params: AttackParams,
    /// Caller confirmed authorization to test the target
    pub authorized: bool,
}

impl AttackRequest {
    pub fn new(kind: AttackKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            duration: None,
            params: AttackParams::default(),
            authorized: false,
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn params(mut self, params: AttackParams) -> Self {
        self.params = params;
        self
    }

    pub fn authorized(mut self, authorized: bool) -> Self {
        self.authorized = authorized;
        self
    }
}

struct ActiveEntry {
    task: AttackTask,
    signal: StopSignal,
}

struct EngineInner {
    executor: Arc<dyn PrivilegedExecutor>,
    ids: Arc<dyn IdProvider>,
    clock: Arc<dyn TimeProvider>,
    audit: Arc<dyn AuditSink>,
    config: AttackConfig,
    ethical_mode: bool,
    active: Mutex<HashMap<TaskId, ActiveEntry>>,
}

impl EngineInner {
    fn active(&self) -> MutexGuard<'_, HashMap<TaskId, ActiveEntry>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Attack engine handle (cheap to clone, shares the active table)
#[derive(Clone)]
pub struct AttackEngine {
    inner: Arc<EngineInner>,
}

impl AttackEngine {
    pub fn new(
        executor: Arc<dyn PrivilegedExecutor>,
        ids: Arc<dyn IdProvider>,
        clock: Arc<dyn TimeProvider>,
        audit: Arc<dyn AuditSink>,
        config: AttackConfig,
        ethical_mode: bool,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                executor,
                ids,
                clock,
                audit,
                config,
                ethical_mode,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Validate and register a task without running it
    ///
    /// # Errors
    /// - AppError::Domain for a malformed target or parameter (no task created)
    /// - AppError::Conflict if the minted id is already active
    pub async fn submit(&self, request: AttackRequest) -> Result<AttackRun> {
        let target = MacAddress::parse(&request.target)?;
        request.params.validate()?;
        if request.duration == Some(Duration::ZERO) {
            return Err(invalid("duration must be > 0").into());
        }

        if self.inner.ethical_mode && self.inner.config.require_confirmation && !request.authorized
        {
            warn!(
                kind = %request.kind,
                target = %target,
                "Attack requires confirmation in ethical mode"
            );
        }

        let ceiling = self.inner.config.max_duration();
        let requested = request.duration.map(|d| d.min(ceiling));
        let budget = requested.unwrap_or(ceiling);

        let id = TaskId::new(self.inner.ids.generate_id());
        let mut task = AttackTask::new(id.clone(), request.kind, target, self.inner.clock.now_utc());
        task.start()?;

        let (signal, token) = stop_channel(budget);
        {
            let mut active = self.inner.active();
            if active.contains_key(&id) {
                return Err(AppError::Conflict(format!("Attack task {id} already active")));
            }
            active.insert(
                id.clone(),
                ActiveEntry {
                    task: task.clone(),
                    signal,
                },
            );
        }
        let guard = ActiveGuard {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
        };

        info!(
            task_id = %id,
            kind = %request.kind,
            target = %target,
            budget_secs = budget.as_secs(),
            ethical_mode = self.inner.ethical_mode,
            "Executing attack"
        );
        self.inner
            .audit
            .record(AuditEvent::AttackStarted {
                task_id: id,
                kind: request.kind,
                target,
                duration_secs: requested.map(|d| d.as_secs()),
            })
            .await;

        Ok(AttackRun {
            guard,
            initial: task,
            requested,
            params: request.params,
            token,
        })
    }

    /// Submit and run to a terminal state
    pub async fn execute(&self, request: AttackRequest) -> Result<AttackTask> {
        Ok(self.submit(request).await?.run().await)
    }

    /// Flip the stop signal and mark the task Stopped if still running
    ///
    /// # Returns
    /// false if no active task has this id
    pub async fn request_stop(&self, id: &TaskId) -> bool {
        let now = self.inner.clock.now_utc();
        {
            let mut active = self.inner.active();
            let Some(entry) = active.get_mut(id) else {
                return false;
            };
            entry.signal.stop();
            if entry.task.mark_stopped(now).is_err() {
                info!(task_id = %id, status = %entry.task.status, "Stop requested after terminal state");
            }
        }

        info!(task_id = %id, "Stopping attack");
        self.inner
            .audit
            .record(AuditEvent::AttackStopRequested {
                task_id: id.clone(),
            })
            .await;
        true
    }

    /// Snapshot of every registered task
    pub fn active_tasks(&self) -> Vec<AttackTask> {
        self.inner
            .active()
            .values()
            .map(|entry| entry.task.clone())
            .collect()
    }

    pub fn is_active(&self, id: &TaskId) -> bool {
        self.inner.active().contains_key(id)
    }
}

/// Removes the task's table entry on every exit path
struct ActiveGuard {
    inner: Arc<EngineInner>,
    id: TaskId,
}

impl ActiveGuard {
    fn take(&self) -> Option<AttackTask> {
        self.inner.active().remove(&self.id).map(|entry| entry.task)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner.active().remove(&self.id);
    }
}

/// Handle to a submitted task
pub struct AttackRun {
    guard: ActiveGuard,
    initial: AttackTask,
    requested: Option<Duration>,
    params: AttackParams,
    token: StopToken,
}

impl AttackRun {
    pub fn id(&self) -> &TaskId {
        &self.guard.id
    }

    /// Drive the procedure to completion and return the terminal record
    pub async fn run(self) -> AttackTask {
        let inner = Arc::clone(&self.guard.inner);
        // The budget counts from here, not from submit
        let mut stop = self.token.clone();
        stop.arm();
        let ctx = ProcedureContext {
            task_id: self.guard.id.clone(),
            kind: self.initial.kind,
            target: self.initial.target,
            started_at: self.initial.start_time,
            requested: self.requested,
            params: self.params.clone(),
            config: inner.config.clone(),
            executor: Arc::clone(&inner.executor),
            stop,
        };

        // Own task so a panicking procedure cannot take the caller down
        let outcome = match tokio::spawn(procedures::run(ctx)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(task_id = %self.guard.id, error = %e, "Attack procedure panicked");
                ProcedureOutcome::Failed(format!("Attack procedure panicked: {e}"))
            }
        };

        let now = inner.clock.now_utc();
        let mut task = self.guard.take().unwrap_or_else(|| self.initial.clone());
        if !task.apply_outcome(outcome, now) {
            info!(task_id = %task.id, status = %task.status, "Stop committed before procedure finished");
        }

        match task.errors.last() {
            Some(err) if task.status == AttackStatus::Failed => {
                error!(task_id = %task.id, kind = %task.kind, target = %task.target, error = %err, "Attack failed");
            }
            _ => info!(
                task_id = %task.id,
                kind = %task.kind,
                status = %task.status,
                duration_seconds = ?task.duration_seconds(),
                "Attack finished"
            ),
        }

        inner
            .audit
            .record(AuditEvent::AttackCompleted {
                task_id: task.id.clone(),
                kind: task.kind,
                target: task.target,
                status: task.status,
                start_time: task.start_time,
                end_time: task.end_time,
            })
            .await;

        task
    }
}
