//! Agent worker — drives one agent, one step per admitted tick.
//!
//! Each worker is its own Tokio task. It sleeps on the clock's signal
//! channel and, on every wake, re-checks that the clock is still RUNNING
//! before touching its agent. The channel only holds the latest tick, so a
//! worker that wakes late applies every tick it has not handled yet, in
//! order. A step never awaits, so it always runs to completion once
//! started; cancellation can only land between steps.

use crate::agent_state::AgentState;
use crate::clock::{ClockHandle, ClockSignal};
use crate::policy::{CollisionKind, GrowthPolicy, Move, MovePolicy};
use serde::Serialize;
use snake_race_core::prelude::*;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { head: Position, grew: bool },
    /// The move was lethal; the agent was killed by this step.
    Died(CollisionKind),
    /// The agent was already dead; nothing changed.
    Dead,
}

/// Why a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerExit {
    /// The agent died.
    Died,
    /// The clock halted or went away.
    Halted,
}

/// Owns the write side of one agent.
pub struct AgentWorker {
    agent: Arc<AgentState>,
    grid: Grid,
    moves: Arc<dyn MovePolicy>,
    growth: Arc<dyn GrowthPolicy>,
}

impl AgentWorker {
    pub fn new(
        agent: Arc<AgentState>,
        grid: Grid,
        moves: Arc<dyn MovePolicy>,
        growth: Arc<dyn GrowthPolicy>,
    ) -> Self {
        Self {
            agent,
            grid,
            moves,
            growth,
        }
    }

    pub fn agent(&self) -> &Arc<AgentState> {
        &self.agent
    }

    /// Apply exactly one transition for `tick`, ignoring the clock.
    ///
    /// The growth policy is asked about the candidate cell mapped back onto
    /// the board, before the move policy runs.
    pub fn step(&self, tick: Tick) -> StepOutcome {
        if !self.agent.is_alive() {
            return StepOutcome::Dead;
        }
        let head = self.agent.head();
        let candidate = head.step(self.agent.direction());
        let grow = self
            .growth
            .should_grow(self.agent.id(), tick, self.grid.wrap(candidate));

        let outcome = match self.moves.resolve(&self.grid, &self.agent, candidate, grow) {
            Move::Advance(next) => {
                if self.agent.advance(next, grow) {
                    StepOutcome::Advanced { head: next, grew: grow }
                } else {
                    StepOutcome::Dead
                }
            }
            Move::Collide(kind) => {
                if self.agent.kill() {
                    debug!(
                        "{} died at tick {}: {:?} at {} (length {})",
                        self.agent.id(),
                        tick,
                        kind,
                        candidate,
                        self.agent.length()
                    );
                }
                StepOutcome::Died(kind)
            }
        };
        self.agent.record_tick(tick);
        outcome
    }

    /// Step on every admitted tick until the agent dies or the clock halts.
    ///
    /// Ticks admitted before the call are not replayed.
    pub async fn run(self, clock: ClockHandle) -> WorkerExit {
        let (handled, mut signals) = self.attach(&clock);
        self.run_with(clock, &mut signals, handled).await
    }

    fn attach(&self, clock: &ClockHandle) -> (Tick, watch::Receiver<ClockSignal>) {
        // Read the count before subscribing: a tick admitted in between is
        // then caught up on the next wake instead of being lost.
        let handled = clock.ticks();
        self.agent.record_tick(handled);
        (handled, clock.subscribe())
    }

    async fn run_with(
        self,
        clock: ClockHandle,
        signals: &mut watch::Receiver<ClockSignal>,
        mut handled: Tick,
    ) -> WorkerExit {
        loop {
            if signals.changed().await.is_err() {
                return WorkerExit::Halted;
            }
            let signal = *signals.borrow_and_update();
            let latest = match signal {
                ClockSignal::Tick(tick) => tick,
                ClockSignal::Halted => return WorkerExit::Halted,
                ClockSignal::Idle => continue,
            };
            while handled < latest {
                // Paused since the tick was admitted: leave the rest for the
                // next wake after resume.
                if !clock.is_running() {
                    break;
                }
                let tick = handled + 1;
                match self.step(tick) {
                    StepOutcome::Advanced { .. } => {}
                    StepOutcome::Died(_) | StepOutcome::Dead => return WorkerExit::Died,
                }
                handled = tick;
            }
        }
    }

    /// Spawn the worker loop on the current runtime.
    ///
    /// Subscribes before returning, so no tick published after this call
    /// is missed.
    pub fn spawn(self, clock: ClockHandle) -> tokio::task::JoinHandle<WorkerExit> {
        let (handled, mut signals) = self.attach(&clock);
        tokio::spawn(async move { self.run_with(clock, &mut signals, handled).await })
    }
}

impl std::fmt::Debug for AgentWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentWorker")
            .field("agent", &self.agent.id())
            .field("grid", &self.grid)
            .field("moves", &self.moves.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::GameClock;
    use crate::policy::{Bounded, GrowEvery, NeverGrow, NoSelfCrossing, Wraparound};
    use std::time::Duration;
    use tokio::time::sleep;

    fn worker(start: Position, max_length: usize, moves: Arc<dyn MovePolicy>) -> AgentWorker {
        let agent = Arc::new(
            AgentState::new(AgentId::new(0), start, Direction::Right, max_length).unwrap(),
        );
        AgentWorker::new(agent, Grid::new(10, 10).unwrap(), moves, Arc::new(NeverGrow))
    }

    #[test]
    fn step_advances_along_heading() {
        let w = worker(Position::new(2, 2), 3, Arc::new(Bounded));
        assert_eq!(
            w.step(1),
            StepOutcome::Advanced {
                head: Position::new(3, 2),
                grew: false
            }
        );
        w.agent().turn(Direction::Down);
        w.step(2);
        assert_eq!(w.agent().head(), Position::new(3, 3));
    }

    #[test]
    fn step_into_wall_kills_once() {
        let w = worker(Position::new(9, 2), 3, Arc::new(Bounded));
        assert_eq!(w.step(1), StepOutcome::Died(CollisionKind::Wall));
        assert!(!w.agent().is_alive());
        assert_eq!(w.step(2), StepOutcome::Dead);
        assert_eq!(w.agent().snapshot(), vec![Position::new(9, 2)]);
    }

    #[test]
    fn step_with_wraparound_survives_the_edge() {
        let w = worker(Position::new(9, 2), 3, Arc::new(Wraparound));
        w.step(1);
        assert!(w.agent().is_alive());
        assert_eq!(w.agent().head(), Position::new(0, 2));
    }

    #[test]
    fn step_consults_growth_policy() {
        let agent = Arc::new(
            AgentState::new(AgentId::new(0), Position::new(0, 0), Direction::Right, 1).unwrap(),
        );
        let w = AgentWorker::new(
            Arc::clone(&agent),
            Grid::new(10, 10).unwrap(),
            Arc::new(Bounded),
            Arc::new(GrowEvery(2)),
        );
        for tick in 1..=4 {
            w.step(tick);
        }
        assert_eq!(agent.max_length(), 3);
        assert_eq!(agent.length(), 3);
    }

    #[test]
    fn growing_step_into_own_tail_is_lethal() {
        // Body (3,3) (2,3) (2,2) (3,2) at bound 4, heading Up onto the tail.
        // The step grows, so the tail stays and the move crosses the body.
        let agent = Arc::new(
            AgentState::new(AgentId::new(0), Position::new(3, 2), Direction::Up, 4).unwrap(),
        );
        for (x, y) in [(2, 2), (2, 3), (3, 3)] {
            agent.advance(Position::new(x, y), false);
        }
        let before = agent.snapshot();
        let w = AgentWorker::new(
            Arc::clone(&agent),
            Grid::new(10, 10).unwrap(),
            Arc::new(NoSelfCrossing::new(Bounded)),
            Arc::new(GrowEvery(1)),
        );

        assert_eq!(w.step(1), StepOutcome::Died(CollisionKind::SelfBody));
        assert!(!agent.is_alive());
        assert_eq!(agent.snapshot(), before);
    }

    #[test]
    fn non_growing_step_may_follow_the_tail() {
        let agent = Arc::new(
            AgentState::new(AgentId::new(0), Position::new(3, 2), Direction::Up, 4).unwrap(),
        );
        for (x, y) in [(2, 2), (2, 3), (3, 3)] {
            agent.advance(Position::new(x, y), false);
        }
        let w = AgentWorker::new(
            Arc::clone(&agent),
            Grid::new(10, 10).unwrap(),
            Arc::new(NoSelfCrossing::new(Bounded)),
            Arc::new(NeverGrow),
        );

        w.step(1);
        let body = agent.snapshot();
        assert_eq!(body[0], Position::new(3, 2));
        assert_eq!(body.len(), 4);
        let mut unique = body.clone();
        unique.sort_by_key(|p| (p.x, p.y));
        unique.dedup();
        assert_eq!(unique.len(), body.len(), "duplicated cell: {body:?}");
    }

    #[test]
    fn step_records_the_handled_tick() {
        let w = worker(Position::new(2, 2), 3, Arc::new(Bounded));
        w.step(7);
        assert_eq!(w.agent().last_tick(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_loop_follows_the_clock() {
        let clock = GameClock::new(Duration::from_millis(50)).unwrap();
        let w = worker(Position::new(2, 2), 3, Arc::new(Bounded));
        let agent = Arc::clone(w.agent());
        let handle = w.spawn(clock.handle());

        clock.start();
        sleep(Duration::from_millis(120)).await;
        assert_eq!(agent.head(), Position::new(5, 2));

        clock.stop();
        assert_eq!(handle.await.unwrap(), WorkerExit::Halted);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_loop_ends_on_death() {
        let clock = GameClock::new(Duration::from_millis(50)).unwrap();
        let w = worker(Position::new(8, 2), 3, Arc::new(Bounded));
        let agent = Arc::clone(w.agent());
        let handle = tokio::spawn(w.run(clock.handle()));

        clock.start();
        assert_eq!(handle.await.unwrap(), WorkerExit::Died);
        assert!(!agent.is_alive());
        assert_eq!(agent.head(), Position::new(9, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn late_wake_applies_every_missed_tick() {
        let clock = GameClock::new(Duration::from_millis(50)).unwrap();
        let w = worker(Position::new(0, 2), 3, Arc::new(Bounded));
        let agent = Arc::clone(w.agent());
        let handle = clock.handle();
        let (handled, mut signals) = w.attach(&handle);

        // Let three ticks pile up before the loop first polls the channel.
        clock.start();
        sleep(Duration::from_millis(120)).await;
        assert_eq!(clock.ticks(), 3);
        assert_eq!(agent.head(), Position::new(0, 2));

        let task = tokio::spawn(async move { w.run_with(handle, &mut signals, handled).await });
        agent.wait_for_tick(3).await;
        assert_eq!(agent.head(), Position::new(3, 2));
        assert_eq!(agent.last_tick(), 3);

        clock.stop();
        assert_eq!(task.await.unwrap(), WorkerExit::Halted);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_left_over_at_pause_wait_for_resume() {
        let clock = GameClock::new(Duration::from_millis(50)).unwrap();
        let w = worker(Position::new(0, 2), 9, Arc::new(Bounded));
        let agent = Arc::clone(w.agent());
        let handle = clock.handle();
        let (handled, mut signals) = w.attach(&handle);

        clock.start();
        sleep(Duration::from_millis(70)).await;
        clock.pause();
        assert_eq!(clock.ticks(), 2);

        let task = tokio::spawn(async move { w.run_with(handle, &mut signals, handled).await });
        sleep(Duration::from_millis(200)).await;
        assert_eq!(agent.head(), Position::new(0, 2), "moved while paused");

        // The next firing after resume is at 300ms.
        clock.resume();
        sleep(Duration::from_millis(40)).await;
        // Ticks 1 and 2 from before the pause, then the first tick after it.
        assert_eq!(agent.last_tick(), 3);
        assert_eq!(agent.head(), Position::new(3, 2));

        clock.stop();
        assert_eq!(task.await.unwrap(), WorkerExit::Halted);
    }
}
