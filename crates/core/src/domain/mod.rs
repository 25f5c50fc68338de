// Domain Layer - Pure business logic and entities

pub mod attack;
pub mod audit;
pub mod device;
pub mod error;
pub mod mac;
pub mod service;
pub mod session;

// Re-exports
pub use attack::{AttackKind, AttackStatus, AttackTask, ProcedureOutcome, TaskId};
pub use audit::{AuditEvent, AuditRecord};
pub use device::{DeviceClass, DeviceRecord, Modality, Sighting, UNKNOWN_DEVICE_NAME};
pub use error::DomainError;
pub use mac::{is_valid_mac, normalize_mac, MacAddress};
pub use service::{
    ClassicService, GattCharacteristic, GattService, ProfileDescriptor, ServiceInfo, ServiceList,
};
pub use session::SessionSnapshot;
