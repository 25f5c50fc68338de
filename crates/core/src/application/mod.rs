// Application Layer - Use Cases and Business Logic

pub mod attack;
pub mod discovery;
pub mod enumeration;

// Re-exports
pub use attack::{AttackEngine, AttackParams, AttackRequest, AttackRun};
pub use discovery::{DeviceRegistry, FusionEngine, ScanRequest};
pub use enumeration::EnumerationService;
