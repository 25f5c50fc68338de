// Port Layer - Interfaces for external dependencies

pub mod audit_sink;
pub mod discovery_source;
pub mod id_provider; // For deterministic testing
pub mod privileged_executor;
pub mod service_enumerator;
pub mod time_provider;

// Re-exports
pub use audit_sink::{AuditSink, NoopAuditSink};
pub use discovery_source::{DiscoveryError, DiscoverySource};
pub use id_provider::IdProvider;
pub use privileged_executor::{
    requires_elevation, CommandOutput, Elevation, ElevationMethod, GatewayCommand,
    PrivilegeError, PrivilegedExecutor, DEFAULT_COMMAND_TIMEOUT,
};
pub use service_enumerator::{EnumerationError, ServiceEnumerator};
pub use time_provider::TimeProvider;
