//! # Snake Race Core
//!
//! Value types and board geometry shared by the simulation runtime and
//! its front ends:
//!
//! - [`types`] — `Position`, `Direction`, `AgentId`, `Tick`
//! - [`grid`] — the immutable board and its bounds queries
//! - [`error`] — construction and control errors
//!
//! ## Quick Start
//!
//! ```rust
//! use snake_race_core::prelude::*;
//!
//! let grid = Grid::new(10, 10).unwrap();
//! let next = Position::new(9, 2).step(Direction::Right);
//! assert!(!grid.contains(next));
//! ```

pub mod types;
pub mod grid;
pub mod error;
pub mod prelude;
