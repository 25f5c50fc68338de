// Cooperative stop signal for attack procedures

use super::constants::MAX_POLL_INTERVAL;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Owner side, kept in the engine's active table
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    /// Request a stop (idempotent)
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Procedure side: stop flag plus wall-clock budget
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
    budget: Duration,
    started: Instant,
    deadline: Instant,
}

impl StopToken {
    /// Restart the budget clock from now
    pub fn arm(&mut self) {
        self.started = Instant::now();
        self.deadline = self.started + self.budget;
    }

    /// The single "should stop now?" predicate: stop requested or budget spent
    pub fn should_stop(&self) -> bool {
        self.stop_requested() || Instant::now() >= self.deadline
    }

    /// A dropped signal counts as a stop request
    pub fn stop_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep for at most `duration` (capped at the poll interval and the
    /// deadline), waking early on a stop request
    pub async fn pause(&self, duration: Duration) {
        let wait = duration.min(MAX_POLL_INTERVAL).min(self.remaining());
        if wait.is_zero() || self.stop_requested() {
            return;
        }

        let mut rx = self.rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = rx.changed() => {
                if changed.is_err() {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Resolve once a stop is requested (the deadline alone does not count)
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Create a stop channel whose token expires after `budget`
///
/// The clock starts at creation; call `StopToken::arm` to restart it
pub fn stop_channel(budget: Duration) -> (StopSignal, StopToken) {
    let (tx, rx) = watch::channel(false);
    let started = Instant::now();
    (
        StopSignal { tx },
        StopToken {
            rx,
            budget,
            started,
            deadline: started + budget,
        },
    )
}
