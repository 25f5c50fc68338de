//! bluesec CLI - Bluetooth security assessment coordinator
//! Composition root: config, logging, adapter wiring and commands

mod logging;
mod output;
mod session;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use bluesec_core::application::{
    AttackEngine, AttackParams, AttackRequest, EnumerationService, FusionEngine, ScanRequest,
};
use bluesec_core::domain::{AttackKind, AttackTask};
use bluesec_core::port::id_provider::UuidProvider;
use bluesec_core::port::time_provider::SystemTimeProvider;
use bluesec_core::port::{AuditSink, NoopAuditSink, PrivilegedExecutor, TimeProvider};
use bluesec_core::AppConfig;
use bluesec_infra_system::{
    list_adapters, BleAdvertisementSource, HcitoolInquirySource, JsonlAuditSink,
    PrivilegeGateway, SystemServiceEnumerator,
};
use session::SessionRecorder;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "bluesec")]
#[command(about = "Bluetooth security assessment coordinator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (yaml, toml or json)
    #[arg(long, env = "BLUESEC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Force debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover nearby classic and BLE devices
    Scan {
        /// Scan duration in seconds (default: bluetooth.scan_duration_secs)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Skip classic inquiry
        #[arg(long)]
        no_classic: bool,

        /// Skip BLE advertisement scanning
        #[arg(long)]
        no_ble: bool,

        /// Run the modalities one after the other
        #[arg(long)]
        sequential: bool,

        /// Write discovered devices as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Enumerate services of a device (SDP or GATT)
    Enumerate {
        /// Target MAC address
        mac: String,

        /// Write the service list as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an assessment procedure against an authorized target
    Simulate {
        /// flood, jam, deauth, hijack, pin, mitm or sniff
        kind: AttackKind,

        /// Target MAC address
        target: String,

        /// Duration budget in seconds (capped by attacks.max_duration_secs)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Confirm authorization without prompting
        #[arg(short = 'y', long)]
        yes: bool,

        /// PIN attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// First PIN to try
        #[arg(long)]
        start_pin: Option<u32>,

        /// Capture file for sniffing
        #[arg(long)]
        output_file: Option<String>,

        /// Capture interface for sniffing
        #[arg(long)]
        interface: Option<String>,

        /// Capture without a target filter
        #[arg(long)]
        promiscuous: bool,

        /// l2ping payload size for flooding
        #[arg(long)]
        packet_size: Option<u32>,
    },

    /// List local Bluetooth adapters
    Adapters,

    /// Show a saved session
    Session {
        /// Session id or path to a session file
        id: String,
    },
}

/// Wired application services for one invocation
struct App {
    config: AppConfig,
    recorder: Arc<SessionRecorder>,
    gateway: Arc<dyn PrivilegedExecutor>,
    discovery: Arc<FusionEngine>,
    enumeration: EnumerationService,
    attacks: AttackEngine,
}

impl App {
    fn build(config: AppConfig) -> Result<Self> {
        let clock = Arc::new(SystemTimeProvider);

        let downstream: Arc<dyn AuditSink> = if config.audit.enabled {
            Arc::new(JsonlAuditSink::new(
                settings::expand(&config.audit.file_path),
                config.app.ethical_mode,
            ))
        } else {
            Arc::new(NoopAuditSink)
        };
        let recorder = Arc::new(SessionRecorder::new(
            downstream,
            config.app.ethical_mode,
            clock.now_utc(),
        ));
        let audit: Arc<dyn AuditSink> = recorder.clone();

        let gateway: Arc<dyn PrivilegedExecutor> = Arc::new(
            PrivilegeGateway::new(config.privileges.method, audit.clone())
                .context("Privilege gateway unavailable")?,
        );

        let adapter = config.bluetooth.default_adapter.clone();
        let discovery = Arc::new(
            FusionEngine::new(
                Arc::new(HcitoolInquirySource::new(gateway.clone(), adapter.clone())),
                Arc::new(BleAdvertisementSource::new(adapter.clone())),
                audit.clone(),
            )
            .with_adapter_control(gateway.clone(), adapter.clone()),
        );

        let enumeration = EnumerationService::new(
            discovery.clone(),
            Arc::new(SystemServiceEnumerator::new(gateway.clone(), adapter)),
            audit.clone(),
        );

        let attacks = AttackEngine::new(
            gateway.clone(),
            Arc::new(UuidProvider),
            clock,
            audit,
            config.attacks.clone(),
            config.app.ethical_mode,
        );

        Ok(Self {
            config,
            recorder,
            gateway,
            discovery,
            enumeration,
            attacks,
        })
    }

    fn save_session(&self, attacks: Vec<AttackTask>) {
        let snapshot = self.recorder.snapshot(self.discovery.devices(), attacks);
        let dir = settings::expand(&self.config.session.dir);
        match session::save(&dir, &snapshot) {
            Ok(path) => println!(
                "{} {}",
                "Session saved:".dimmed(),
                path.display().to_string().dimmed()
            ),
            Err(e) => warn!(error = ?e, "Failed to save session"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = settings::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&config.logging, cli.debug)?;
    info!(version = VERSION, ethical_mode = config.app.ethical_mode, "bluesec starting");

    if let Commands::Session { id } = &cli.command {
        let snapshot = session::load(&settings::expand(&config.session.dir), id)?;
        output::session(&snapshot);
        return Ok(());
    }

    prepare_dirs(&config)?;
    if config.app.ethical_mode {
        println!(
            "{}",
            "Ethical mode: only assess devices you own or are authorized to test"
                .yellow()
                .bold()
        );
    }

    let app = App::build(config)?;

    match cli.command {
        Commands::Scan {
            duration,
            no_classic,
            no_ble,
            sequential,
            output: out,
        } => {
            let mut request = ScanRequest::from_config(&app.config.bluetooth);
            if let Some(secs) = duration {
                request.duration = Duration::from_secs(secs.max(1));
            }
            request.classic &= !no_classic;
            request.ble &= !no_ble;
            request.concurrent &= !sequential;

            if request.classic {
                app.discovery.ensure_adapter_ready().await;
            }
            println!(
                "{}",
                format!("Scanning for {}s...", request.duration.as_secs())
                    .cyan()
                    .bold()
            );
            let devices = app.discovery.scan(request).await;
            output::devices(&devices);

            if let Some(path) = out {
                write_json(&path, &devices)?;
            }
            app.save_session(Vec::new());
        }

        Commands::Enumerate { mac, output: out } => {
            let result = app.enumeration.enumerate(&mac).await;
            app.save_session(Vec::new());

            let info = result.with_context(|| format!("Enumeration of {mac} failed"))?;
            output::services(&info);
            if let Some(path) = out {
                write_json(&path, &info)?;
            }
        }

        Commands::Simulate {
            kind,
            target,
            duration,
            yes,
            max_attempts,
            start_pin,
            output_file,
            interface,
            promiscuous,
            packet_size,
        } => {
            let authorized = yes || confirm_authorization(kind, &target).await?;
            if !authorized && app.config.attacks.require_confirmation {
                println!("{}", "Aborted: authorization not confirmed".red().bold());
                return Ok(());
            }

            let params = AttackParams {
                packet_size,
                max_attempts,
                start_pin,
                output_file,
                interface,
                promiscuous,
                ..AttackParams::default()
            };
            let mut request = AttackRequest::new(kind, target)
                .params(params)
                .authorized(authorized);
            if let Some(secs) = duration {
                request = request.duration(Duration::from_secs(secs));
            }

            let task = run_until_interrupted(&app.attacks, request).await?;
            output::attack(&task);
            app.save_session(vec![task]);
        }

        Commands::Adapters => {
            let adapters = list_adapters(&app.gateway, app.config.privileges.command_timeout())
                .await
                .context("Failed to list adapters")?;
            output::adapters(&adapters);
        }

        Commands::Session { .. } => {}
    }

    Ok(())
}

/// Run one attack; Ctrl-C requests a cooperative stop
async fn run_until_interrupted(engine: &AttackEngine, request: AttackRequest) -> Result<AttackTask> {
    let run = engine.submit(request).await?;
    let id = run.id().clone();
    println!(
        "{}",
        format!("Task {id} running (Ctrl-C to stop)").cyan().bold()
    );

    let mut handle = tokio::spawn(run.run());
    tokio::select! {
        joined = &mut handle => return joined.context("Attack task panicked"),
        _ = tokio::signal::ctrl_c() => {
            info!(task_id = %id, "Interrupt received, stopping attack");
            engine.request_stop(&id).await;
        }
    }
    handle.await.context("Attack task panicked")
}

async fn confirm_authorization(kind: AttackKind, target: &str) -> Result<bool> {
    let prompt = format!("Confirm you are authorized to run {kind} against {target} [y/N]: ");
    tokio::task::spawn_blocking(move || {
        use std::io::Write;
        print!("{}", prompt.yellow().bold());
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    })
    .await
    .context("Prompt task failed")?
}

/// Session, audit and capture directories exist before any work starts
fn prepare_dirs(config: &AppConfig) -> Result<()> {
    let mut dirs = vec![
        settings::expand(&config.session.dir),
        settings::expand(&config.attacks.sniff.capture_dir),
    ];
    if config.audit.enabled {
        if let Some(parent) = settings::expand(&config.audit.file_path).parent() {
            dirs.push(parent.to_path_buf());
        }
    }
    for dir in dirs.iter().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Saved:".dimmed(), path.display().to_string().dimmed());
    Ok(())
}
