// bluesec Core - Domain Logic & Ports
// NO infrastructure dependencies (hexagonal architecture: adapters live in infra-system)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::AppConfig;
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
