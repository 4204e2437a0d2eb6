//! # Snake Race Runtime
//!
//! Clock, agent state and worker tasks.
//!
//! The runtime is where the concurrency lives: a [`clock::GameClock`]
//! admits ticks, one [`worker::AgentWorker`] task per agent turns each
//! admitted tick into exactly one move, and observers read
//! [`agent_state::AgentState`] snapshots without ever holding more than one
//! agent's lock.

pub mod agent_state;
pub mod clock;
pub mod policy;
pub mod worker;
pub mod simulation;
pub mod prelude;
