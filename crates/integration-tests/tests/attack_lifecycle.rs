//! Attack lifecycle tests
//!
//! Submission, cooperative stop and terminal bookkeeping across tasks

use bluesec_core::application::{AttackEngine, AttackParams, AttackRequest};
use bluesec_core::config::AttackConfig;
use bluesec_core::domain::{AttackKind, AttackStatus, AuditEvent};
use bluesec_core::port::audit_sink::mocks::RecordingAuditSink;
use bluesec_core::port::id_provider::mocks::SequentialIdProvider;
use bluesec_core::port::privileged_executor::mocks::MockPrivilegedExecutor;
use bluesec_core::port::time_provider::SystemTimeProvider;
use std::sync::Arc;
use std::time::Duration;

const TARGET: &str = "AA:BB:CC:DD:EE:FF";

fn engine(config: AttackConfig) -> (AttackEngine, Arc<MockPrivilegedExecutor>, Arc<RecordingAuditSink>) {
    let executor = Arc::new(MockPrivilegedExecutor::new_success());
    let audit = Arc::new(RecordingAuditSink::new());
    let engine = AttackEngine::new(
        executor.clone(),
        Arc::new(SequentialIdProvider::default()),
        Arc::new(SystemTimeProvider),
        audit.clone(),
        config,
        true,
    );
    (engine, executor, audit)
}

fn pin_request(max_attempts: u32) -> AttackRequest {
    AttackRequest::new(AttackKind::PinBruteforce, TARGET)
        .params(AttackParams {
            max_attempts: Some(max_attempts),
            ..AttackParams::default()
        })
        .authorized(true)
}

/// PIN run with max_attempts=50 stopped right after submission
#[tokio::test]
async fn test_pin_stop_immediately() {
    let (engine, _, audit) = engine(AttackConfig::default());

    let run = engine.submit(pin_request(50)).await.unwrap();
    let id = run.id().clone();
    let handle = tokio::spawn(run.run());

    assert!(engine.request_stop(&id).await);
    let task = handle.await.unwrap();

    assert!(matches!(
        task.status,
        AttackStatus::Stopped | AttackStatus::Success
    ));
    let end_time = task.end_time.expect("end time set");
    assert!(end_time >= task.start_time);
    if let Some(attempts) = task.details.get("attempts") {
        assert!(attempts.as_u64().unwrap() <= 50);
    }
    assert!(!engine.is_active(&id));

    // Exactly one completion record, carrying the same end time
    let completions: Vec<_> = audit
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AuditEvent::AttackCompleted { end_time, .. } => Some(end_time),
            _ => None,
        })
        .collect();
    assert_eq!(completions, vec![Some(end_time)]);
}

#[tokio::test]
async fn test_pin_runs_to_completion() {
    let mut config = AttackConfig::default();
    config.pin.attempt_interval_ms = 1;
    let (engine, executor, _) = engine(config);

    let task = engine.execute(pin_request(20)).await.unwrap();

    assert_eq!(task.status, AttackStatus::Success);
    assert_eq!(task.details["attempts"], 20);
    assert_eq!(task.details["last_pin"], "0019");
    assert_eq!(task.details["found"], false);
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn test_stop_from_another_task() {
    let mut config = AttackConfig::default();
    config.flood.probe_interval_ms = 10;
    let (engine, executor, _) = engine(config);

    let run = engine
        .submit(AttackRequest::new(AttackKind::DosFlood, TARGET).authorized(true))
        .await
        .unwrap();
    let id = run.id().clone();
    let handle = tokio::spawn(run.run());

    let stopper = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.request_stop(&id).await;
    });

    let task = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("flood honours the stop signal")
        .unwrap();

    assert_eq!(task.status, AttackStatus::Stopped);
    assert!(executor.calls_for("l2ping") >= 1);
    assert!(engine.active_tasks().is_empty());
}

#[tokio::test]
async fn test_duration_budget_ends_flood() {
    let mut config = AttackConfig::default();
    config.flood.probe_interval_ms = 10;
    let (engine, _, _) = engine(config);

    let task = tokio::time::timeout(
        Duration::from_secs(5),
        engine.execute(
            AttackRequest::new(AttackKind::DosFlood, TARGET)
                .duration(Duration::from_millis(300))
                .authorized(true),
        ),
    )
    .await
    .expect("deadline is honoured")
    .unwrap();

    assert_eq!(task.status, AttackStatus::Success);
    assert!(task.details["packets_sent"].as_u64().unwrap() >= 1);
    assert_eq!(task.details["errors"], 0);
}

#[tokio::test]
async fn test_invalid_target_creates_no_task() {
    let (engine, executor, audit) = engine(AttackConfig::default());

    let result = engine
        .execute(AttackRequest::new(AttackKind::Deauth, "AA:BB:CC").authorized(true))
        .await;

    assert!(result.unwrap_err().is_validation());
    assert!(engine.active_tasks().is_empty());
    assert_eq!(executor.call_count(), 0);
    assert!(audit.events().is_empty());
}

#[tokio::test]
async fn test_unimplemented_kinds_fail() {
    let (engine, executor, _) = engine(AttackConfig::default());

    for kind in [AttackKind::DosJam, AttackKind::Hijack, AttackKind::Mitm] {
        let task = engine
            .execute(AttackRequest::new(kind, TARGET).authorized(true))
            .await
            .unwrap();
        assert_eq!(task.status, AttackStatus::Failed, "{kind}");
        assert_eq!(task.errors.len(), 1);
        assert!(task.end_time.is_some());
    }
    assert_eq!(executor.call_count(), 0);
}
