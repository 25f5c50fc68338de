// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Unknown attack kind: {0}")]
    UnknownAttackKind(String),

    #[error("Invalid attack parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid attack state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
