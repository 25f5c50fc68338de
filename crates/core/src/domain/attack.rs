// Attack Task Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::mac::MacAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Task ID (minted once by IdProvider, never recomputed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of attack procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    #[serde(rename = "dos_flood")]
    DosFlood,
    #[serde(rename = "dos_jam")]
    DosJam,
    #[serde(rename = "deauthentication")]
    Deauth,
    #[serde(rename = "hijacking")]
    Hijack,
    #[serde(rename = "pin_bruteforce")]
    PinBruteforce,
    #[serde(rename = "man_in_the_middle")]
    Mitm,
    #[serde(rename = "passive_sniffing")]
    PassiveSniff,
}

impl AttackKind {
    pub const ALL: [AttackKind; 7] = [
        AttackKind::DosFlood,
        AttackKind::DosJam,
        AttackKind::Deauth,
        AttackKind::Hijack,
        AttackKind::PinBruteforce,
        AttackKind::Mitm,
        AttackKind::PassiveSniff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttackKind::DosFlood => "dos_flood",
            AttackKind::DosJam => "dos_jam",
            AttackKind::Deauth => "deauthentication",
            AttackKind::Hijack => "hijacking",
            AttackKind::PinBruteforce => "pin_bruteforce",
            AttackKind::Mitm => "man_in_the_middle",
            AttackKind::PassiveSniff => "passive_sniffing",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackKind {
    type Err = DomainError;

    /// Accepts canonical names and the short CLI aliases
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dos_flood" | "dos" | "flood" => Ok(AttackKind::DosFlood),
            "dos_jam" | "jam" => Ok(AttackKind::DosJam),
            "deauthentication" | "deauth" => Ok(AttackKind::Deauth),
            "hijacking" | "hijack" => Ok(AttackKind::Hijack),
            "pin_bruteforce" | "pin-brute" | "pin" => Ok(AttackKind::PinBruteforce),
            "man_in_the_middle" | "mitm" => Ok(AttackKind::Mitm),
            "passive_sniffing" | "sniff" => Ok(AttackKind::PassiveSniff),
            _ => Err(DomainError::UnknownAttackKind(s.to_string())),
        }
    }
}

/// Attack status: Pending -> Running -> {Success, Failed, Stopped}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackStatus {
    Pending,
    Running,
    Success,
    Failed,
    Stopped,
}

impl AttackStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttackStatus::Success | AttackStatus::Failed | AttackStatus::Stopped
        )
    }
}

impl fmt::Display for AttackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackStatus::Pending => "pending",
            AttackStatus::Running => "running",
            AttackStatus::Success => "success",
            AttackStatus::Failed => "failed",
            AttackStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Result of one attack procedure; exactly one per run
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureOutcome {
    Success(Map<String, Value>),
    Failed(String),
}

/// Attack Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackTask {
    pub id: TaskId,
    #[serde(rename = "attack_type")]
    pub kind: AttackKind,
    pub target: MacAddress,
    pub status: AttackStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub details: Map<String, Value>,
    pub errors: Vec<String>,
}

impl AttackTask {
    /// Create a pending task
    ///
    /// # Arguments
    /// * `id` - Unique task ID (injected, not generated)
    /// * `kind` - Attack procedure
    /// * `target` - Validated target address
    /// * `start_time` - Submission timestamp (injected, not system time)
    pub fn new(id: TaskId, kind: AttackKind, target: MacAddress, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            target,
            status: AttackStatus::Pending,
            start_time,
            end_time: None,
            details: Map::new(),
            errors: Vec::new(),
        }
    }

    /// Transition to Running
    pub fn start(&mut self) -> Result<()> {
        if self.status != AttackStatus::Pending {
            return Err(self.transition_error(AttackStatus::Running));
        }
        self.status = AttackStatus::Running;
        Ok(())
    }

    pub fn mark_success(&mut self, details: Map<String, Value>, now: DateTime<Utc>) -> Result<()> {
        self.finish(AttackStatus::Success, now)?;
        self.details.extend(details);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.finish(AttackStatus::Failed, now)?;
        self.errors.push(error.into());
        Ok(())
    }

    pub fn mark_stopped(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.finish(AttackStatus::Stopped, now)
    }

    /// Apply a procedure outcome
    ///
    /// When the task already reached a terminal state (a stop request committed
    /// first) the outcome's details and errors are still recorded, but status
    /// and end time are left untouched. Returns true if the outcome committed
    /// the terminal transition.
    pub fn apply_outcome(&mut self, outcome: ProcedureOutcome, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            match outcome {
                ProcedureOutcome::Success(details) => self.details.extend(details),
                ProcedureOutcome::Failed(error) => self.errors.push(error),
            }
            return false;
        }

        let result = match outcome {
            ProcedureOutcome::Success(details) => self.mark_success(details, now),
            ProcedureOutcome::Failed(error) => self.mark_failed(error, now),
        };
        result.is_ok()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }

    /// Terminal transitions commit once; end_time is never overwritten
    fn finish(&mut self, to: AttackStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.transition_error(to));
        }
        self.status = to;
        self.end_time = Some(now);
        Ok(())
    }

    fn transition_error(&self, to: AttackStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
