// Privileged Execution Gateway Port
// Single choke point for every command that may need elevated OS privileges

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Hard timeout applied when the caller does not choose one (60s)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Commands that typically need root on Linux (informational only, not enforced)
const ROOT_COMMANDS: &[&str] = &[
    "hciconfig",
    "hcitool",
    "bettercap",
    "tshark",
    "btlejack",
    "spooftooph",
    "ubertooth-util",
    "l2ping",
    "bluetoothctl",
    "sdptool",
];

/// Configured elevation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationMethod {
    #[default]
    Pkexec,
    Sudo,
    #[serde(rename = "none")]
    Disabled,
}

impl ElevationMethod {
    /// Helper binary that performs the elevation, if any
    pub fn helper(self) -> Option<&'static str> {
        match self {
            ElevationMethod::Pkexec => Some("pkexec"),
            ElevationMethod::Sudo => Some("sudo"),
            ElevationMethod::Disabled => None,
        }
    }
}

impl fmt::Display for ElevationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationMethod::Pkexec => f.write_str("pkexec"),
            ElevationMethod::Sudo => f.write_str("sudo"),
            ElevationMethod::Disabled => f.write_str("none"),
        }
    }
}

impl std::str::FromStr for ElevationMethod {
    type Err = PrivilegeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pkexec" => Ok(ElevationMethod::Pkexec),
            "sudo" => Ok(ElevationMethod::Sudo),
            "none" => Ok(ElevationMethod::Disabled),
            other => Err(PrivilegeError::InvalidMethod(other.to_string())),
        }
    }
}

/// How a particular command was actually run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    /// Caller already had an elevated identity
    Root,
    Pkexec,
    Sudo,
    /// Method `none`: ran with the caller's identity
    Unelevated,
}

impl fmt::Display for Elevation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Elevation::Root => "root",
            Elevation::Pkexec => "pkexec",
            Elevation::Sudo => "sudo",
            Elevation::Unelevated => "unelevated",
        };
        f.write_str(s)
    }
}

/// Command value object (never persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCommand {
    pub argv: Vec<String>,
    pub needs_confirmation: bool,
    pub timeout: Duration,
}

impl GatewayCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            needs_confirmation: false,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn confirmed(mut self, needs_confirmation: bool) -> Self {
        self.needs_confirmation = needs_confirmation;
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elevation: Elevation,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Gateway failures (a non-zero exit code is NOT a failure)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("{helper} not found on PATH (required by elevation method '{method}')")]
    HelperNotFound { helper: String, method: String },

    #[error("Invalid privilege method: {0}")]
    InvalidMethod(String),

    #[error("Empty command")]
    EmptyCommand,

    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Command {program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(String),
}

impl PrivilegeError {
    /// "tool hung" as opposed to "tool refused"
    pub fn is_timeout(&self) -> bool {
        matches!(self, PrivilegeError::Timeout { .. })
    }
}

/// Static lookup: does this program usually need elevation?
pub fn requires_elevation(program: &str) -> bool {
    let base = program.rsplit('/').next().unwrap_or(program);
    ROOT_COMMANDS.contains(&base)
}

/// Privileged executor trait
///
/// Implementations:
/// - PrivilegeGateway (infra-system): subprocess with pkexec/sudo elevation
/// - MockPrivilegedExecutor: scripted results for tests
#[async_trait]
pub trait PrivilegedExecutor: Send + Sync {
    /// Run a command, bounded by `cmd.timeout`
    ///
    /// # Errors
    /// - PrivilegeError::EmptyCommand if argv is empty
    /// - PrivilegeError::Spawn if the process cannot be started
    /// - PrivilegeError::Timeout if the command outlives its timeout
    async fn execute(&self, cmd: GatewayCommand) -> Result<CommandOutput, PrivilegeError>;

    /// Elevation method validated at construction
    fn method(&self) -> ElevationMethod;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit with the given code and captured streams
        Exit {
            code: i32,
            stdout: String,
            stderr: String,
        },
        /// Report a gateway timeout
        Timeout,
        /// Report a spawn failure
        SpawnFail(String),
        /// Never complete (a long capture), until the call is dropped
        Hang,
    }

    impl MockBehavior {
        pub fn ok(stdout: impl Into<String>) -> Self {
            MockBehavior::Exit {
                code: 0,
                stdout: stdout.into(),
                stderr: String::new(),
            }
        }

        pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
            MockBehavior::Exit {
                code,
                stdout: String::new(),
                stderr: stderr.into(),
            }
        }
    }

    /// Mock executor: behavior per program name, with a default fallback
    pub struct MockPrivilegedExecutor {
        default: MockBehavior,
        per_program: Mutex<HashMap<String, MockBehavior>>,
        calls: Arc<Mutex<Vec<GatewayCommand>>>,
    }

    impl MockPrivilegedExecutor {
        pub fn new(default: MockBehavior) -> Self {
            Self {
                default,
                per_program: Mutex::new(HashMap::new()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::ok(""))
        }

        pub fn with_program(self, program: &str, behavior: MockBehavior) -> Self {
            self.per_program
                .lock()
                .unwrap()
                .insert(program.to_string(), behavior);
            self
        }

        pub fn calls(&self) -> Vec<GatewayCommand> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_for(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program() == program)
                .count()
        }
    }

    #[async_trait]
    impl PrivilegedExecutor for MockPrivilegedExecutor {
        async fn execute(&self, cmd: GatewayCommand) -> Result<CommandOutput, PrivilegeError> {
            if cmd.argv.is_empty() {
                return Err(PrivilegeError::EmptyCommand);
            }
            let behavior = self
                .per_program
                .lock()
                .unwrap()
                .get(cmd.program())
                .cloned()
                .unwrap_or_else(|| self.default.clone());
            let program = cmd.program().to_string();
            let timeout_ms = cmd.timeout.as_millis() as u64;
            self.calls.lock().unwrap().push(cmd);

            match behavior {
                MockBehavior::Exit {
                    code,
                    stdout,
                    stderr,
                } => Ok(CommandOutput {
                    exit_code: Some(code),
                    stdout,
                    stderr,
                    elevation: Elevation::Unelevated,
                }),
                MockBehavior::Timeout => Err(PrivilegeError::Timeout {
                    program,
                    timeout_ms,
                }),
                MockBehavior::SpawnFail(reason) => Err(PrivilegeError::Spawn { program, reason }),
                MockBehavior::Hang => std::future::pending().await,
            }
        }

        fn method(&self) -> ElevationMethod {
            ElevationMethod::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_elevation_lookup() {
        assert!(requires_elevation("hciconfig"));
        assert!(requires_elevation("/usr/bin/l2ping"));
        assert!(!requires_elevation("echo"));
        assert!(!requires_elevation(""));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("PKEXEC".parse::<ElevationMethod>().unwrap(), ElevationMethod::Pkexec);
        assert_eq!("none".parse::<ElevationMethod>().unwrap(), ElevationMethod::Disabled);
        assert!(matches!(
            "doas".parse::<ElevationMethod>(),
            Err(PrivilegeError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_method_serde_names() {
        let m: ElevationMethod = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(m, ElevationMethod::Disabled);
        assert_eq!(serde_json::to_string(&ElevationMethod::Sudo).unwrap(), "\"sudo\"");
    }

    #[test]
    fn test_command_builder_defaults() {
        let cmd = GatewayCommand::new(["l2ping", "-c", "1"]);
        assert_eq!(cmd.program(), "l2ping");
        assert_eq!(cmd.timeout, DEFAULT_COMMAND_TIMEOUT);
        assert!(!cmd.needs_confirmation);
    }

    #[tokio::test]
    async fn test_mock_per_program_behavior() {
        use mocks::{MockBehavior, MockPrivilegedExecutor};

        let exec = MockPrivilegedExecutor::new_success()
            .with_program("l2ping", MockBehavior::Timeout);

        assert!(exec
            .execute(GatewayCommand::new(["echo"]))
            .await
            .unwrap()
            .success());
        assert!(exec
            .execute(GatewayCommand::new(["l2ping"]))
            .await
            .unwrap_err()
            .is_timeout());
        assert_eq!(exec.call_count(), 2);
        assert_eq!(exec.calls_for("l2ping"), 1);
    }
}
