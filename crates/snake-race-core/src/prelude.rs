//! Snake Race Core Prelude — convenient imports for common usage.
//!
//! ```rust
//! use snake_race_core::prelude::*;
//! ```

pub use crate::types::{AgentId, AtomicDirection, Direction, Position, Tick};

pub use crate::grid::Grid;

// Re-export error types
pub use crate::error::{ConfigError, Result, SimError};
