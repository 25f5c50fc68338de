//! Terminal presentation (tables and colours)

use bluesec_core::application::enumeration::enumeration_path;
use bluesec_core::domain::{
    AttackStatus, AttackTask, DeviceRecord, ServiceInfo, ServiceList, SessionSnapshot,
};
use bluesec_infra_system::{AdapterInfo, AdapterStatus};
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    modality: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
    #[tabled(rename = "Class")]
    class: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            mac: d.mac.to_string(),
            name: d.name.clone(),
            modality: d.modality.to_string(),
            rssi: d.rssi.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
            class: d
                .device_class_parsed
                .as_ref()
                .map(|c| c.major_class.to_string())
                .unwrap_or_else(|| "-".into()),
        }
    }
}

#[derive(Tabled)]
struct ClassicRow {
    #[tabled(rename = "Service")]
    name: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Profiles")]
    profiles: String,
}

#[derive(Tabled)]
struct GattRow {
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Characteristics")]
    characteristics: usize,
}

#[derive(Tabled)]
struct AdapterRow {
    #[tabled(rename = "Adapter")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Task")]
    id: String,
    #[tabled(rename = "Attack")]
    kind: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&AttackTask> for TaskRow {
    fn from(t: &AttackTask) -> Self {
        Self {
            id: t.id.to_string(),
            kind: t.kind.to_string(),
            target: t.target.to_string(),
            status: t.status.to_string(),
        }
    }
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn devices(devices: &[DeviceRecord]) {
    if devices.is_empty() {
        println!("{}", "No devices found".yellow());
        return;
    }
    println!(
        "{}",
        format!("✓ {} device(s) discovered", devices.len()).green().bold()
    );
    println!();
    println!("{}", table(devices.iter().map(DeviceRow::from).collect()));
}

pub fn services(info: &ServiceInfo) {
    println!(
        "{}",
        format!(
            "Services on {} ({} via {})",
            info.mac,
            info.modality,
            enumeration_path(info.modality)
        )
        .cyan()
        .bold()
    );
    println!();

    let rendered = match &info.services {
        ServiceList::Classic(records) if !records.is_empty() => table(
            records
                .iter()
                .map(|s| ClassicRow {
                    name: s.name.clone(),
                    protocol: s.protocol.clone(),
                    port: s.port.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                    profiles: s
                        .profiles
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect(),
        ),
        ServiceList::Gatt(records) if !records.is_empty() => table(
            records
                .iter()
                .map(|s| GattRow {
                    uuid: s.uuid.clone(),
                    description: s.description.clone(),
                    characteristics: s.characteristics.len(),
                })
                .collect(),
        ),
        _ => "No services found".yellow().to_string(),
    };
    println!("{rendered}");
}

pub fn adapters(adapters: &[AdapterInfo]) {
    if adapters.is_empty() {
        println!("{}", "No Bluetooth adapters found".yellow());
        return;
    }
    let rows = adapters
        .iter()
        .map(|a| AdapterRow {
            name: a.name.clone(),
            address: a.address.clone().unwrap_or_else(|| "-".into()),
            status: match a.status {
                AdapterStatus::Up => "UP".green().to_string(),
                AdapterStatus::Down => "DOWN".red().to_string(),
                AdapterStatus::Unknown => "unknown".yellow().to_string(),
            },
        })
        .collect();
    println!("{}", table(rows));
}

pub fn attack(task: &AttackTask) {
    let headline = format!("{} against {}: {}", task.kind, task.target, task.status);
    match task.status {
        AttackStatus::Success => println!("{}", format!("✓ {headline}").green().bold()),
        AttackStatus::Stopped => println!("{}", format!("■ {headline}").yellow().bold()),
        _ => println!("{}", format!("✗ {headline}").red().bold()),
    }
    println!();

    println!("  {} {}", "Task:".bold(), task.id);
    if let Some(secs) = task.duration_seconds() {
        println!("  {} {:.1}s", "Duration:".bold(), secs);
    }
    for (key, value) in &task.details {
        println!("  {} {}", format!("{key}:").bold(), value);
    }
    for error in &task.errors {
        println!("  {} {}", "Error:".bold().red(), error);
    }
}

pub fn session(snapshot: &SessionSnapshot) {
    println!("{}", format!("Session {}", snapshot.session_id).cyan().bold());
    println!();
    println!("  {} {}", "Started:".bold(), snapshot.start_time);
    println!("  {} {}", "Devices:".bold(), snapshot.devices.len());
    println!("  {} {}", "Attacks:".bold(), snapshot.attacks.len());
    println!("  {} {}", "Audit events:".bold(), snapshot.logs.len());

    if !snapshot.devices.is_empty() {
        println!();
        println!("{}", table(snapshot.devices.iter().map(DeviceRow::from).collect()));
    }
    if !snapshot.attacks.is_empty() {
        println!();
        println!("{}", table(snapshot.attacks.iter().map(TaskRow::from).collect()));
    }
}
