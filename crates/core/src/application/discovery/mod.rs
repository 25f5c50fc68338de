// Device Discovery Fusion Engine
// Runs the classic and BLE sources (in parallel or one after the other) and
// folds every sighting into one registry keyed by MAC.

mod registry;

pub use registry::DeviceRegistry;

use crate::config::BluetoothConfig;
use crate::domain::{AuditEvent, DeviceRecord, MacAddress, Modality, Sighting};
use crate::port::{AuditSink, DiscoveryError, DiscoverySource, GatewayCommand, PrivilegedExecutor};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Capacity of the sighting channel between sources and the merge loop
pub const SIGHTING_CHANNEL_CAPACITY: usize = 256;

/// Duration of the follow-up scan issued for an unknown enumeration target (5s)
pub const RESCAN_DURATION: Duration = Duration::from_secs(5);

/// Timeout for bringing the adapter up (10s)
const ADAPTER_UP_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub duration: Duration,
    pub classic: bool,
    pub ble: bool,
    pub concurrent: bool,
}

impl ScanRequest {
    pub fn from_config(config: &BluetoothConfig) -> Self {
        Self {
            duration: Duration::from_secs(config.scan_duration_secs),
            classic: config.classic_enabled,
            ble: config.ble_enabled,
            concurrent: config.concurrent,
        }
    }

    /// Short scan of both radios used before giving up on an unknown device
    pub fn rescan() -> Self {
        Self {
            duration: RESCAN_DURATION,
            classic: true,
            ble: true,
            concurrent: true,
        }
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self::from_config(&BluetoothConfig::default())
    }
}

/// Adapter control through the privilege gateway
struct AdapterControl {
    executor: Arc<dyn PrivilegedExecutor>,
    adapter: String,
}

pub struct FusionEngine {
    classic: Arc<dyn DiscoverySource>,
    ble: Arc<dyn DiscoverySource>,
    adapter_control: Option<AdapterControl>,
    audit: Arc<dyn AuditSink>,
    registry: Arc<RwLock<DeviceRegistry>>,
    // One scan at a time; a scan clears the registry it fills
    scan_lock: Mutex<()>,
}

impl FusionEngine {
    /// Create an engine over the two discovery sources
    ///
    /// # Arguments
    /// * `classic` - Source for the classic inquiry modality
    /// * `ble` - Source for the BLE advertisement modality
    /// * `audit` - Receives scan_started / scan_completed events
    pub fn new(
        classic: Arc<dyn DiscoverySource>,
        ble: Arc<dyn DiscoverySource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            classic,
            ble,
            adapter_control: None,
            audit,
            registry: Arc::new(RwLock::new(DeviceRegistry::new())),
            scan_lock: Mutex::new(()),
        }
    }

    /// Enable `ensure_adapter_ready` through the gateway
    pub fn with_adapter_control(
        mut self,
        executor: Arc<dyn PrivilegedExecutor>,
        adapter: impl Into<String>,
    ) -> Self {
        self.adapter_control = Some(AdapterControl {
            executor,
            adapter: adapter.into(),
        });
        self
    }

    /// Bring the local adapter up (`hciconfig <adapter> up`)
    ///
    /// Failure is only logged; scanning proceeds either way.
    ///
    /// # Returns
    /// true if the adapter reported success
    pub async fn ensure_adapter_ready(&self) -> bool {
        let Some(control) = &self.adapter_control else {
            return false;
        };

        let cmd = GatewayCommand::new(["hciconfig", control.adapter.as_str(), "up"])
            .timeout(ADAPTER_UP_TIMEOUT);

        match control.executor.execute(cmd).await {
            Ok(output) if output.success() => {
                info!(adapter = %control.adapter, "Bluetooth adapter enabled");
                true
            }
            Ok(output) => {
                warn!(
                    adapter = %control.adapter,
                    exit_code = ?output.exit_code,
                    stderr = %output.stderr.trim(),
                    "Failed to enable adapter"
                );
                false
            }
            Err(e) => {
                warn!(adapter = %control.adapter, error = %e, "Could not verify adapter status");
                false
            }
        }
    }

    /// Run one scan and return the merged device list (order unspecified)
    ///
    /// Source failures degrade only their own modality; the scan itself
    /// never fails.
    pub async fn scan(&self, request: ScanRequest) -> Vec<DeviceRecord> {
        let _scan = self.scan_lock.lock().await;
        let started = Instant::now();

        self.write_registry().clear();

        info!(
            duration_secs = request.duration.as_secs(),
            classic = request.classic,
            ble = request.ble,
            concurrent = request.concurrent,
            "Starting Bluetooth scan"
        );
        self.audit
            .record(AuditEvent::ScanStarted {
                duration_secs: request.duration.as_secs(),
                classic: request.classic,
                ble: request.ble,
                concurrent: request.concurrent,
            })
            .await;

        let (tx, rx) = mpsc::channel(SIGHTING_CHANNEL_CAPACITY);
        let merge_loop = tokio::spawn(merge_sightings(rx, Arc::clone(&self.registry)));

        let mut counts = SourceCounts::default();
        if request.concurrent && request.classic && request.ble {
            // Exactly two workers, one per modality
            let mut workers = JoinSet::new();
            for source in [&self.classic, &self.ble] {
                workers.spawn(run_source(Arc::clone(source), request.duration, tx.clone()));
            }
            drop(tx);

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((modality, result)) => counts.record(modality, result),
                    Err(e) => error!(error = %e, "Discovery worker panicked"),
                }
            }
        } else {
            let enabled = [
                (request.classic, &self.classic),
                (request.ble, &self.ble),
            ];
            for (_, source) in enabled.into_iter().filter(|(on, _)| *on) {
                let handle =
                    tokio::spawn(run_source(Arc::clone(source), request.duration, tx.clone()));
                match handle.await {
                    Ok((modality, result)) => counts.record(modality, result),
                    Err(e) => error!(error = %e, "Discovery worker panicked"),
                }
            }
            drop(tx);
        }

        let merged = match merge_loop.await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "Sighting merge loop panicked");
                0
            }
        };

        let devices = self.devices();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            total_devices = devices.len(),
            classic_count = counts.classic,
            ble_count = counts.ble,
            sightings = merged,
            elapsed_ms,
            "Scan complete"
        );
        self.audit
            .record(AuditEvent::ScanCompleted {
                device_count: devices.len(),
                classic_count: counts.classic,
                ble_count: counts.ble,
                elapsed_ms,
            })
            .await;

        devices
    }

    /// Snapshot of the registry filled by the last scan
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.read_registry().snapshot()
    }

    pub fn lookup(&self, mac: &MacAddress) -> Option<DeviceRecord> {
        self.read_registry().get(mac).cloned()
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, DeviceRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_registry(&self) -> std::sync::RwLockWriteGuard<'_, DeviceRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
struct SourceCounts {
    classic: usize,
    ble: usize,
}

impl SourceCounts {
    fn record(&mut self, modality: Modality, result: Result<usize, DiscoveryError>) {
        let sent = match result {
            Ok(n) => n,
            Err(DiscoveryError::Unavailable(reason)) => {
                warn!(modality = %modality, reason = %reason, "Discovery source unavailable");
                0
            }
            Err(DiscoveryError::Os(reason)) => {
                error!(modality = %modality, reason = %reason, "Discovery source failed");
                0
            }
        };
        match modality {
            Modality::Ble => self.ble += sent,
            _ => self.classic += sent,
        }
    }
}

async fn run_source(
    source: Arc<dyn DiscoverySource>,
    duration: Duration,
    sink: mpsc::Sender<Sighting>,
) -> (Modality, Result<usize, DiscoveryError>) {
    let modality = source.modality();
    (modality, source.discover(duration, sink).await)
}

/// The only writer to the registry during a scan
async fn merge_sightings(
    mut rx: mpsc::Receiver<Sighting>,
    registry: Arc<RwLock<DeviceRegistry>>,
) -> usize {
    let mut merged = 0;
    while let Some(sighting) = rx.recv().await {
        registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply(sighting);
        merged += 1;
    }
    merged
}
