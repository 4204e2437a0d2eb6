//! Simulation — the agents, their workers and the clock wired together.
//!
//! Construction spawns one worker task per agent; they stay idle until the
//! clock is started. Observers read through [`Simulation::frame`] and
//! [`Simulation::stats`] at any cadence; each agent is copied under its own
//! lock, so a frame is consistent per agent but not across agents.

use crate::agent_state::{AgentState, AgentView};
use crate::clock::{ClockSignal, GameClock, RunState};
use crate::policy::{Bounded, GrowthPolicy, MovePolicy, NeverGrow};
use crate::worker::{AgentWorker, WorkerExit};
use serde::{Deserialize, Serialize};
use snake_race_core::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Construction-time parameters. Nothing here can change while running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of agents (default: 2).
    pub agents: usize,
    /// Grid width in cells (default: 35).
    pub width: i32,
    /// Grid height in cells (default: 28).
    pub height: i32,
    /// Clock period in milliseconds (default: 60).
    pub tick_period_ms: u64,
    /// Length bound each agent starts with (default: 5).
    pub initial_max_length: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: 2,
            width: 35,
            height: 28,
            tick_period_ms: 60,
            initial_max_length: 5,
        }
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Check every field, returning the grid they describe.
    pub fn validate(&self) -> Result<Grid> {
        let grid = Grid::new(self.width, self.height)?;
        if self.agents == 0 {
            return Err(SimError::invalid_config(
                "agents",
                self.agents,
                "at least one agent is required",
            ));
        }
        if u32::try_from(self.agents).is_err() {
            return Err(SimError::invalid_config(
                "agents",
                self.agents,
                "too many agents",
            ));
        }
        if self.tick_period_ms == 0 {
            return Err(SimError::InvalidPeriod);
        }
        if self.initial_max_length == 0 {
            return Err(SimError::invalid_config(
                "initial_max_length",
                self.initial_max_length,
                "must be at least 1",
            ));
        }
        Ok(grid)
    }

    /// Start cell and heading for agent `index`.
    ///
    /// Agents are staggered diagonally from (2, 2) and cycle through
    /// [`Direction::ALL`].
    pub fn spawn_point(&self, grid: &Grid, index: usize) -> (Position, Direction) {
        let i = index as i64;
        let x = (2 + 3 * i).rem_euclid(grid.width() as i64) as i32;
        let y = (2 + 2 * i).rem_euclid(grid.height() as i64) as i32;
        (Position::new(x, y), Direction::ALL[index % Direction::ALL.len()])
    }
}

/// Everything a renderer needs for one picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub tick: Tick,
    pub width: i32,
    pub height: i32,
    pub agents: Vec<AgentView>,
}

/// Length summary for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub length: usize,
    pub alive: bool,
    /// Last tick the agent's worker handled.
    pub last_tick: Tick,
}

/// Aggregate statistics about the agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Ticks admitted by the clock.
    pub tick: Tick,
    /// Every live agent has handled every tick up to here.
    pub settled: Tick,
    pub state: RunState,
    pub total: usize,
    pub alive: usize,
    /// Longest body; ties go to the lowest id.
    pub longest: Option<AgentSummary>,
    /// Shortest body; ties go to the lowest id.
    pub shortest: Option<AgentSummary>,
}

/// A running (or runnable) multi-agent simulation.
pub struct Simulation {
    config: SimulationConfig,
    grid: Grid,
    agents: Vec<Arc<AgentState>>,
    clock: GameClock,
    workers: Mutex<Vec<JoinHandle<WorkerExit>>>,
}

impl Simulation {
    /// Build with walls and no growth. Must be called inside a Tokio runtime.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_policies(config, Arc::new(Bounded), Arc::new(NeverGrow))
    }

    pub fn with_policies(
        config: SimulationConfig,
        moves: Arc<dyn MovePolicy>,
        growth: Arc<dyn GrowthPolicy>,
    ) -> Result<Self> {
        let grid = config.validate()?;
        let clock = GameClock::new(config.tick_period())?;

        let mut agents = Vec::with_capacity(config.agents);
        for index in 0..config.agents {
            let (start, direction) = config.spawn_point(&grid, index);
            let id = AgentId::new(index as u32);
            agents.push(Arc::new(AgentState::new(
                id,
                start,
                direction,
                config.initial_max_length,
            )?));
        }

        let workers = agents
            .iter()
            .map(|agent| {
                AgentWorker::new(
                    Arc::clone(agent),
                    grid,
                    Arc::clone(&moves),
                    Arc::clone(&growth),
                )
                .spawn(clock.handle())
            })
            .collect();

        info!(
            "simulation ready: {} agents on {}x{}, {} policy",
            config.agents,
            grid.width(),
            grid.height(),
            moves.name()
        );

        Ok(Self {
            config,
            grid,
            agents,
            clock,
            workers: Mutex::new(workers),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn agents(&self) -> &[Arc<AgentState>] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Result<&Arc<AgentState>> {
        self.agents
            .get(id.index())
            .ok_or_else(|| SimError::unknown_agent(id))
    }

    pub fn start(&self) -> bool {
        self.clock.start()
    }

    pub fn pause(&self) {
        self.clock.pause();
    }

    pub fn resume(&self) {
        self.clock.resume();
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Flip between running and paused. Returns the resulting state.
    pub fn toggle_pause(&self) -> RunState {
        match self.clock.state() {
            RunState::Running => self.clock.pause(),
            RunState::Paused => self.clock.resume(),
            RunState::Stopped | RunState::Halted => {}
        }
        self.clock.state()
    }

    /// Halt the clock. Workers finish their current step and exit.
    pub fn stop(&self) {
        self.clock.stop();
    }

    /// Halt the clock and wait for every worker to exit.
    pub async fn shutdown(&self) -> Vec<WorkerExit> {
        self.clock.stop();
        let handles = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let mut exits = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(exit) => exits.push(exit),
                Err(e) => warn!("worker task failed: {}", e),
            }
        }
        info!("simulation shut down after {} ticks", self.clock.ticks());
        exits
    }

    /// Controller input: change one agent's heading.
    pub fn turn(&self, id: AgentId, direction: Direction) -> Result<()> {
        self.agent(id)?.turn(direction);
        Ok(())
    }

    /// Receiver that wakes on every admitted tick ("render now").
    pub fn subscribe_frames(&self) -> watch::Receiver<ClockSignal> {
        self.clock.subscribe()
    }

    pub fn frame(&self) -> Frame {
        Frame {
            tick: self.clock.ticks(),
            width: self.grid.width(),
            height: self.grid.height(),
            agents: self.agents.iter().map(|a| a.view()).collect(),
        }
    }

    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_alive()).count()
    }

    pub fn stats(&self) -> SimulationStats {
        let summaries: Vec<AgentSummary> = self
            .agents
            .iter()
            .map(|a| {
                let view = a.view();
                AgentSummary {
                    id: view.id,
                    length: view.length(),
                    alive: view.alive,
                    last_tick: a.last_tick(),
                }
            })
            .collect();

        let longest = summaries
            .iter()
            .copied()
            .reduce(|best, s| if s.length > best.length { s } else { best });
        let shortest = summaries
            .iter()
            .copied()
            .reduce(|worst, s| if s.length < worst.length { s } else { worst });

        let tick = self.clock.ticks();
        let settled = summaries
            .iter()
            .filter(|s| s.alive)
            .map(|s| s.last_tick)
            .min()
            .unwrap_or(tick);

        SimulationStats {
            tick,
            settled,
            state: self.clock.state(),
            total: summaries.len(),
            alive: summaries.iter().filter(|s| s.alive).count(),
            longest,
            shortest,
        }
    }

    /// Wait until every live agent's worker has handled `tick`.
    ///
    /// Returns early if the clock halts. Workers only step while the clock
    /// is running, so ticks still pending when it is paused stay pending
    /// until it resumes.
    pub async fn settle(&self, tick: Tick) {
        let caught_up =
            futures::future::join_all(self.agents.iter().map(|a| a.wait_for_tick(tick)));
        let mut signals = self.clock.subscribe();
        let halted = async move {
            loop {
                if *signals.borrow_and_update() == ClockSignal::Halted {
                    break;
                }
                if signals.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::select! {
            _ = caught_up => {}
            _ = halted => {}
        }
    }

    /// Wait until `ticks` ticks have been admitted and handled by every live
    /// agent, every agent is dead, or the clock halts. Returns the tick
    /// count at that point.
    pub async fn run_for(&self, ticks: Tick) -> Tick {
        let mut signals = self.clock.subscribe();
        loop {
            if self.clock.ticks() >= ticks || self.alive_count() == 0 {
                break;
            }
            if signals.changed().await.is_err() {
                break;
            }
            if *signals.borrow_and_update() == ClockSignal::Halted {
                break;
            }
        }
        self.settle(self.clock.ticks().min(ticks)).await;
        self.clock.ticks()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("alive", &self.alive_count())
            .finish()
    }
}
