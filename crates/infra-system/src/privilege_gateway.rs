// Privilege gateway: the only place that spawns external tools
// reason: tokio::process for async waits, nix for euid and process-group signals
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use bluesec_core::domain::AuditEvent;
use bluesec_core::port::{
    requires_elevation, AuditSink, CommandOutput, Elevation, ElevationMethod, GatewayCommand,
    PrivilegeError, PrivilegedExecutor,
};

/// Time between SIGTERM and SIGKILL for a timed-out command group (2s)
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Poll interval while waiting for a signalled group to exit (100ms)
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Subprocess gateway with pkexec/sudo elevation
pub struct PrivilegeGateway {
    method: ElevationMethod,
    is_root: bool,
    helper: Option<PathBuf>,
    audit: Arc<dyn AuditSink>,
}

impl PrivilegeGateway {
    /// Validate `method` against the current identity and PATH
    ///
    /// # Errors
    /// PrivilegeError::HelperNotFound if a non-root caller picks pkexec/sudo
    /// and the helper is not installed
    pub fn new(method: ElevationMethod, audit: Arc<dyn AuditSink>) -> Result<Self, PrivilegeError> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        Self::build(method, is_root(), &path, audit)
    }

    pub(crate) fn build(
        method: ElevationMethod,
        is_root: bool,
        path_var: &OsStr,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, PrivilegeError> {
        let helper = match (is_root, method.helper()) {
            (false, Some(helper)) => Some(find_in_path_from(helper, path_var).ok_or_else(|| {
                PrivilegeError::HelperNotFound {
                    helper: helper.to_string(),
                    method: method.to_string(),
                }
            })?),
            _ => None,
        };

        if is_root {
            info!(method = %method, "Running with root privileges");
        } else if method == ElevationMethod::Disabled {
            warn!("Privilege elevation disabled; commands run with the current identity");
        }

        Ok(Self {
            method,
            is_root,
            helper,
            audit,
        })
    }

    /// Final argv and the elevation it runs under
    fn elevate(&self, argv: &[String]) -> (Vec<OsString>, Elevation) {
        let plain = || argv.iter().map(OsString::from).collect::<Vec<_>>();

        if self.is_root {
            return (plain(), Elevation::Root);
        }

        match (self.method, &self.helper) {
            (ElevationMethod::Pkexec, Some(helper)) => {
                let mut full = vec![helper.clone().into_os_string()];
                full.extend(plain());
                (full, Elevation::Pkexec)
            }
            (ElevationMethod::Sudo, Some(helper)) => {
                let mut full = vec![helper.clone().into_os_string(), OsString::from("-n")];
                full.extend(plain());
                (full, Elevation::Sudo)
            }
            _ => (plain(), Elevation::Unelevated),
        }
    }

    /// Spawn in a fresh process group and wait, bounded by `limit`
    async fn spawn_and_wait(
        &self,
        argv: &[OsString],
        program: &str,
        limit: Duration,
    ) -> Result<(Option<i32>, String, String), PrivilegeError> {
        let (exe, args) = argv.split_first().ok_or(PrivilegeError::EmptyCommand)?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| PrivilegeError::Spawn {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
        // Child::id() goes to None once reaped; the group outlives the leader
        let pid = child.id();
        let mut group = GroupGuard { pid };

        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        // Descendants holding the pipes count against the same limit
        let finished = timeout(limit, async {
            let status = child.wait().await?;
            let stdout = (&mut stdout).await.unwrap_or_default();
            let stderr = (&mut stderr).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => {
                group.disarm();
                Ok((status.code(), stdout, stderr))
            }
            Ok(Err(e)) => Err(PrivilegeError::Io(e.to_string())),
            Err(_) => {
                warn!(program = %program, timeout_ms = limit.as_millis() as u64, "Command timed out, terminating");
                terminate_group(&mut child, pid).await;
                group.disarm();
                stdout.abort();
                stderr.abort();
                Err(PrivilegeError::Timeout {
                    program: program.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

/// Signals the command's process group if the call ends without completing
///
/// Covers a caller dropping `execute` mid-flight (a stopped capture) and the
/// wait itself failing. kill_on_drop only reaches the direct child.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        warn!(pid, "Gateway call abandoned, terminating process group");

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            signal_group(pid, Signal::SIGTERM);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        tokio::time::sleep(TERMINATE_GRACE).await;
                        signal_group(pid, Signal::SIGKILL);
                    });
                }
                Err(_) => signal_group(pid, Signal::SIGKILL),
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::unistd::Pid;

    // ESRCH once every member is gone
    let _ = nix::sys::signal::killpg(Pid::from_raw(pid as i32), signal);
}

#[async_trait]
impl PrivilegedExecutor for PrivilegeGateway {
    async fn execute(&self, cmd: GatewayCommand) -> Result<CommandOutput, PrivilegeError> {
        if cmd.argv.is_empty() {
            return Err(PrivilegeError::EmptyCommand);
        }
        let program = cmd.program().to_string();
        let (argv, elevation) = self.elevate(&cmd.argv);

        if elevation == Elevation::Unelevated {
            warn!(program = %program, "Running without elevation (method: none)");
        }
        info!(
            method = %self.method,
            elevation = %elevation,
            argv = ?cmd.argv,
            needs_confirmation = cmd.needs_confirmation,
            requires_elevation = requires_elevation(&program),
            "Executing privileged command"
        );
        self.audit
            .record(AuditEvent::GatewayInvocation {
                method: elevation.to_string(),
                argv: cmd.argv.clone(),
                needs_confirmation: cmd.needs_confirmation,
            })
            .await;

        let (exit_code, stdout, stderr) =
            self.spawn_and_wait(&argv, &program, cmd.timeout).await?;

        debug!(program = %program, exit_code = ?exit_code, "Command finished");

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            elevation,
        })
    }

    fn method(&self) -> ElevationMethod {
        self.method
    }
}

fn drain<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// SIGTERM the child's process group, SIGKILL after the grace period, then reap
async fn terminate_group(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if let Some(pid) = pid {
            debug!(pid, "Sending SIGTERM to process group");
            signal_group(pid, Signal::SIGTERM);

            let mut waited = Duration::ZERO;
            while waited < TERMINATE_GRACE {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    // Leader gone; stragglers in the group still get SIGKILL
                    signal_group(pid, Signal::SIGKILL);
                    return;
                }
                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                waited += EXIT_POLL_INTERVAL;
            }

            warn!(pid, "Process group ignored SIGTERM, sending SIGKILL");
            signal_group(pid, Signal::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    let _ = child.kill().await;
}

/// Whether this process already runs with euid 0
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Locate an executable on the current PATH
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_in_path_from(program, &path)
}

fn find_in_path_from(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &std::path::Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
