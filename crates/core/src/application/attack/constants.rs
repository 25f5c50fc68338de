// Attack engine constants (no magic values in procedures)
use std::time::Duration;

/// Upper bound on how long a procedure may go without checking its stop token (1s)
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Extra gateway time granted to one echo probe beyond its own `-t` timeout (2s)
pub const PROBE_GATEWAY_GRACE: Duration = Duration::from_secs(2);

/// Extra gateway time granted to a capture beyond its autostop duration (15s)
pub const CAPTURE_GATEWAY_GRACE: Duration = Duration::from_secs(15);

/// Gateway timeout for a single disconnect command (30s)
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the PIN space (0000..=9999)
pub const PIN_SPACE: u32 = 10_000;

/// Largest echo payload l2ping accepts
pub const MAX_PACKET_SIZE: u32 = 65_535;

/// Filter expression used when sniffing a single target
pub fn capture_filter(target: &str) -> String {
    format!("bluetooth.src == {target} or bluetooth.dst == {target}")
}
