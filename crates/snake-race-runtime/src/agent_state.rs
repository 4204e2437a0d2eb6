//! Agent state — one snake's body, heading and liveness.
//!
//! Each agent owns its own lock; there is no lock shared across agents.
//! The body and its length bound live behind a single `RwLock` so that an
//! advance (prepend, grow, trim) is observed either completely or not at
//! all. Heading and liveness are plain atomics because they are single
//! words that a controller thread may flip at any time.
//!
//! Each agent also publishes the last tick its worker has handled, so a
//! caller can wait until every agent has caught up with the clock.

use serde::Serialize;
use snake_race_core::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::trace;

/// Body cells plus the current length bound.
#[derive(Debug)]
struct Body {
    /// Head first, tail last.
    cells: VecDeque<Position>,
    max_length: usize,
}

/// Thread-safe state of one agent.
///
/// Writes come from the agent's own worker (`advance`, `kill`) and from a
/// controller (`turn`). Any thread may read.
#[derive(Debug)]
pub struct AgentState {
    id: AgentId,
    body: RwLock<Body>,
    direction: AtomicDirection,
    alive: AtomicBool,
    /// Last tick handled by the worker.
    progress: watch::Sender<Tick>,
}

/// A consistent copy of everything an observer needs about one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentView {
    pub id: AgentId,
    pub alive: bool,
    pub direction: Direction,
    pub max_length: usize,
    /// Head first.
    pub body: Vec<Position>,
}

impl AgentView {
    pub fn head(&self) -> Option<Position> {
        self.body.first().copied()
    }

    pub fn length(&self) -> usize {
        self.body.len()
    }
}

impl AgentState {
    /// Create an agent occupying a single cell.
    pub fn new(
        id: AgentId,
        start: Position,
        direction: Direction,
        max_length: usize,
    ) -> Result<Self> {
        if max_length == 0 {
            return Err(SimError::invalid_config(
                "initial_max_length",
                max_length,
                "an agent must be allowed at least one cell",
            ));
        }
        let mut cells = VecDeque::with_capacity(max_length);
        cells.push_front(start);
        Ok(Self {
            id,
            body: RwLock::new(Body { cells, max_length }),
            direction: AtomicDirection::new(direction),
            alive: AtomicBool::new(true),
            progress: watch::channel(0).0,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current head cell, as of the last completed advance.
    pub fn head(&self) -> Position {
        let body = self.read_body();
        // The body is never empty: it starts with one cell and trimming
        // stops at the bound, which is at least 1.
        body.cells[0]
    }

    /// Prepend `new_head`, optionally raise the bound by one, then trim the
    /// tail down to the bound. No-op on a dead agent.
    ///
    /// Returns whether the advance was applied.
    pub fn advance(&self, new_head: Position, grow: bool) -> bool {
        let mut body = self.write_body();
        if !self.is_alive() {
            return false;
        }
        body.cells.push_front(new_head);
        if grow {
            body.max_length += 1;
        }
        while body.cells.len() > body.max_length {
            body.cells.pop_back();
        }
        trace!(
            "{} advanced to {} (len {}, max {})",
            self.id,
            new_head,
            body.cells.len(),
            body.max_length
        );
        true
    }

    /// Independent copy of the body, head first.
    pub fn snapshot(&self) -> Vec<Position> {
        self.read_body().cells.iter().copied().collect()
    }

    /// Body, heading, bound and liveness read together.
    pub fn view(&self) -> AgentView {
        let body = self.read_body();
        AgentView {
            id: self.id,
            alive: self.is_alive(),
            direction: self.direction(),
            max_length: body.max_length,
            body: body.cells.iter().copied().collect(),
        }
    }

    /// Whether moving the head onto `pos` would cross the body.
    ///
    /// The tail cell is left out when the advance will trim it, i.e. the
    /// agent is at its bound and this step does not grow.
    pub fn blocks(&self, pos: Position, grow: bool) -> bool {
        let body = self.read_body();
        let trims_tail = !grow && body.cells.len() >= body.max_length;
        let keep = body.cells.len() - usize::from(trims_tail);
        body.cells.iter().take(keep).any(|&cell| cell == pos)
    }

    /// Change heading. Takes effect on the next advance.
    pub fn turn(&self, direction: Direction) {
        self.direction.store(direction);
    }

    pub fn direction(&self) -> Direction {
        self.direction.load()
    }

    pub fn length(&self) -> usize {
        self.read_body().cells.len()
    }

    pub fn max_length(&self) -> usize {
        self.read_body().max_length
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the agent dead. Returns `true` only for the call that made the
    /// transition.
    pub fn kill(&self) -> bool {
        let killed = self.alive.swap(false, Ordering::AcqRel);
        if killed {
            // Wake anyone in `wait_for_tick`; a dead agent has nothing left
            // to catch up on.
            self.progress.send_modify(|_| {});
        }
        killed
    }

    /// Last tick this agent's worker has handled (0 before the first).
    pub fn last_tick(&self) -> Tick {
        *self.progress.borrow()
    }

    /// Record that `tick` has been handled. Never moves backwards.
    pub(crate) fn record_tick(&self, tick: Tick) {
        self.progress.send_if_modified(|seen| {
            if tick > *seen {
                *seen = tick;
                true
            } else {
                false
            }
        });
    }

    /// Wait until the worker has handled `tick`, or the agent is dead.
    pub async fn wait_for_tick(&self, tick: Tick) {
        let mut progress = self.progress.subscribe();
        // `self` owns the sender, so the channel cannot close under us.
        let _ = progress
            .wait_for(|&seen| seen >= tick || !self.is_alive())
            .await;
    }

    // Every mutation leaves `Body` consistent before it can panic, so a
    // poisoned lock still guards valid data.
    fn read_body(&self) -> RwLockReadGuard<'_, Body> {
        self.body
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_body(&self) -> RwLockWriteGuard<'_, Body> {
        self.body
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn agent(max_length: usize) -> AgentState {
        AgentState::new(AgentId::new(0), Position::new(2, 2), Direction::Right, max_length).unwrap()
    }

    #[test]
    fn starts_with_single_cell() {
        let a = agent(3);
        assert_eq!(a.head(), Position::new(2, 2));
        assert_eq!(a.length(), 1);
        assert_eq!(a.max_length(), 3);
        assert!(a.is_alive());
    }

    #[test]
    fn zero_bound_is_rejected() {
        let err = AgentState::new(AgentId::new(0), Position::new(0, 0), Direction::Up, 0);
        assert!(err.is_err());
    }

    #[test]
    fn advance_trims_to_bound() {
        let a = agent(3);
        for x in 3..=5 {
            assert!(a.advance(Position::new(x, 2), false));
        }
        assert_eq!(
            a.snapshot(),
            vec![Position::new(5, 2), Position::new(4, 2), Position::new(3, 2)]
        );
        assert_eq!(a.length(), 3);
    }

    #[test]
    fn grow_raises_bound_before_trim() {
        let a = agent(1);
        a.advance(Position::new(3, 2), false);
        assert_eq!(a.length(), 1);

        a.advance(Position::new(4, 2), true);
        assert_eq!(a.max_length(), 2);
        assert_eq!(a.snapshot(), vec![Position::new(4, 2), Position::new(3, 2)]);
    }

    #[test]
    fn dead_agent_ignores_advance() {
        let a = agent(3);
        a.advance(Position::new(3, 2), false);
        assert!(a.kill());
        assert!(!a.kill(), "second kill is not a transition");

        let before = a.view();
        assert!(!a.advance(Position::new(4, 2), true));
        assert_eq!(a.view(), before);
        assert!(!a.is_alive());
    }

    #[test]
    fn turn_applies_to_next_step_only() {
        let a = agent(3);
        a.turn(Direction::Down);
        assert_eq!(a.direction(), Direction::Down);
        assert_eq!(a.head(), Position::new(2, 2));
    }

    #[test]
    fn snapshot_is_detached_from_live_body() {
        let a = agent(5);
        let snap = a.snapshot();
        a.advance(Position::new(3, 2), false);
        assert_eq!(snap, vec![Position::new(2, 2)]);
        assert_eq!(a.length(), 2);
    }

    #[test]
    fn view_reports_consistent_fields() {
        let a = agent(2);
        a.advance(Position::new(3, 2), false);
        let view = a.view();
        assert_eq!(view.head(), Some(Position::new(3, 2)));
        assert_eq!(view.length(), 2);
        assert_eq!(view.max_length, 2);
        assert_eq!(view.direction, Direction::Right);
    }

    #[test]
    fn blocks_frees_the_tail_only_when_it_is_trimmed() {
        // Body (3,3) (2,3) (2,2) (3,2) at its bound of 4.
        let a = AgentState::new(AgentId::new(0), Position::new(3, 2), Direction::Up, 4).unwrap();
        for (x, y) in [(2, 2), (2, 3), (3, 3)] {
            a.advance(Position::new(x, y), false);
        }
        let tail = Position::new(3, 2);
        assert!(!a.blocks(tail, false));
        assert!(a.blocks(tail, true));
        assert!(a.blocks(Position::new(2, 3), false));
        assert!(!a.blocks(Position::new(4, 3), true));
    }

    #[test]
    fn record_tick_only_moves_forward() {
        let a = agent(3);
        assert_eq!(a.last_tick(), 0);
        a.record_tick(4);
        a.record_tick(2);
        assert_eq!(a.last_tick(), 4);
    }

    #[tokio::test]
    async fn wait_for_tick_returns_on_progress_or_death() {
        let a = Arc::new(agent(3));
        a.record_tick(3);
        a.wait_for_tick(2).await;

        let waiter = {
            let a = Arc::clone(&a);
            tokio::spawn(async move { a.wait_for_tick(10).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        a.kill();
        waiter.await.unwrap();
    }

    #[test]
    fn concurrent_snapshots_are_never_torn() {
        // The writer walks right along row 0, growing every fourth step, so
        // any consistent body is a run of consecutive x values ending at
        // the head, no longer than the bound seen at that moment.
        let a = Arc::new(
            AgentState::new(AgentId::new(0), Position::new(0, 0), Direction::Right, 2).unwrap(),
        );
        let steps = 5_000;

        let writer = {
            let a = Arc::clone(&a);
            thread::spawn(move || {
                for x in 1..=steps {
                    a.advance(Position::new(x, 0), x % 4 == 0);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let a = Arc::clone(&a);
                thread::spawn(move || {
                    let mut last_head = 0;
                    let mut last_max = 0;
                    for _ in 0..2_000 {
                        let view = a.view();
                        assert!(!view.body.is_empty());
                        assert!(view.length() <= view.max_length);
                        for pair in view.body.windows(2) {
                            assert_eq!(pair[0].x, pair[1].x + 1, "torn body: {:?}", view.body);
                        }
                        let head = view.body[0].x;
                        assert!(head >= last_head, "head moved backwards");
                        assert!(view.max_length >= last_max, "bound shrank");
                        last_head = head;
                        last_max = view.max_length;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(a.head(), Position::new(steps, 0));
        assert_eq!(a.max_length(), 2 + (steps as usize / 4));
    }
}
