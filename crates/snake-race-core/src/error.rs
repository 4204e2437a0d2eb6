//! Error types for simulation setup and control.
//!
//! Collisions and deaths are never errors; they are ordinary state
//! transitions on an agent. Errors here mean an instance was misconfigured
//! or a caller addressed something that does not exist.

use thiserror::Error;

/// Result type for snake race operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while building or driving a simulation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Grid dimensions must both be strictly positive.
    #[error("Invalid grid {width}x{height}: both dimensions must be > 0")]
    InvalidGrid { width: i32, height: i32 },

    /// The clock period must be non-zero.
    #[error("Invalid tick period: must be greater than zero")]
    InvalidPeriod,

    /// A configuration value was rejected.
    #[error("Config error: {0}")]
    Config(ConfigError),

    /// No agent with this id exists in the simulation.
    #[error("Agent not found: {0}")]
    UnknownAgent(String),

    /// A clock was created outside a Tokio runtime.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid value.
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// Unrecognised variant name.
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: String, value: String },
}

// Convenience constructors
impl SimError {
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        SimError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        })
    }

    pub fn unknown_variant(kind: impl Into<String>, value: impl Into<String>) -> Self {
        SimError::Config(ConfigError::UnknownVariant {
            kind: kind.into(),
            value: value.into(),
        })
    }

    pub fn unknown_agent(id: impl ToString) -> Self {
        SimError::UnknownAgent(id.to_string())
    }
}
