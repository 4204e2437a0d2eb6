//! Snake Race Runtime Prelude — convenient imports for common usage.
//!
//! ```rust
//! use snake_race_runtime::prelude::*;
//! ```

pub use crate::agent_state::{AgentState, AgentView};

pub use crate::clock::{ClockHandle, ClockSignal, GameClock, RunState, TickAction};

pub use crate::policy::{
    Bounded, CollisionKind, GrowEvery, GrowthPolicy, Move, MovePolicy, NeverGrow,
    NoSelfCrossing, PolicyConfig, Walls, Wraparound,
};

pub use crate::worker::{AgentWorker, StepOutcome, WorkerExit};

pub use crate::simulation::{AgentSummary, Frame, Simulation, SimulationConfig, SimulationStats};

// Re-export from core
pub use snake_race_core::prelude::*;
