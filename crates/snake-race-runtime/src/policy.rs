//! Movement and growth policies.
//!
//! A worker only knows how to step one cell along the current heading.
//! Whether that step is legal, where it lands and whether the agent grows
//! are decided here, so world variants can be swapped without touching the
//! worker loop. Growth is decided first and handed to the move policy,
//! since a growing step keeps its tail.
//!
//! There is deliberately no inter-agent collision policy: agents may
//! overlap.

use crate::agent_state::AgentState;
use serde::{Deserialize, Serialize};
use snake_race_core::prelude::*;
use std::sync::Arc;

/// Why a move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollisionKind {
    /// The candidate cell is off the board.
    Wall,
    /// The candidate cell is part of the agent's own body.
    SelfBody,
}

/// Outcome of resolving a candidate cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Advance(Position),
    Collide(CollisionKind),
}

/// Decides whether a candidate head cell is legal and where it lands.
///
/// `grow` is whether this step raises the length bound.
pub trait MovePolicy: Send + Sync {
    fn resolve(&self, grid: &Grid, agent: &AgentState, candidate: Position, grow: bool) -> Move;

    /// Short name for logs and config dumps.
    fn name(&self) -> &str;
}

/// Decides whether an agent grows on a given advance.
pub trait GrowthPolicy: Send + Sync {
    fn should_grow(&self, agent: AgentId, tick: Tick, next: Position) -> bool;
}

impl<F> GrowthPolicy for F
where
    F: Fn(AgentId, Tick, Position) -> bool + Send + Sync,
{
    fn should_grow(&self, agent: AgentId, tick: Tick, next: Position) -> bool {
        self(agent, tick, next)
    }
}

/// Walls are lethal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bounded;

impl MovePolicy for Bounded {
    fn resolve(
        &self,
        grid: &Grid,
        _agent: &AgentState,
        candidate: Position,
        _grow: bool,
    ) -> Move {
        if grid.contains(candidate) {
            Move::Advance(candidate)
        } else {
            Move::Collide(CollisionKind::Wall)
        }
    }

    fn name(&self) -> &str {
        "bounded"
    }
}

/// Leaving one edge re-enters from the opposite edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wraparound;

impl MovePolicy for Wraparound {
    fn resolve(
        &self,
        grid: &Grid,
        _agent: &AgentState,
        candidate: Position,
        _grow: bool,
    ) -> Move {
        Move::Advance(grid.wrap(candidate))
    }

    fn name(&self) -> &str {
        "wrap"
    }
}

/// Makes running into one's own body lethal, on top of another policy.
///
/// The tail cell does not count when the agent is at its length bound and
/// not growing, since it moves away on the same step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSelfCrossing<P> {
    inner: P,
}

impl<P: MovePolicy> NoSelfCrossing<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: MovePolicy> MovePolicy for NoSelfCrossing<P> {
    fn resolve(&self, grid: &Grid, agent: &AgentState, candidate: Position, grow: bool) -> Move {
        let next = match self.inner.resolve(grid, agent, candidate, grow) {
            Move::Advance(next) => next,
            collide => return collide,
        };
        if agent.blocks(next, grow) {
            Move::Collide(CollisionKind::SelfBody)
        } else {
            Move::Advance(next)
        }
    }

    fn name(&self) -> &str {
        "no-self-crossing"
    }
}

/// Never grows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverGrow;

impl GrowthPolicy for NeverGrow {
    fn should_grow(&self, _agent: AgentId, _tick: Tick, _next: Position) -> bool {
        false
    }
}

/// Grows on every `n`th tick.
#[derive(Debug, Clone, Copy)]
pub struct GrowEvery(pub Tick);

impl GrowthPolicy for GrowEvery {
    fn should_grow(&self, _agent: AgentId, tick: Tick, _next: Position) -> bool {
        self.0 > 0 && tick % self.0 == 0
    }
}

/// How walls behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Walls {
    #[default]
    Bounded,
    Wrap,
}

impl std::str::FromStr for Walls {
    type Err = SimError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bounded" => Ok(Walls::Bounded),
            "wrap" => Ok(Walls::Wrap),
            _ => Err(SimError::unknown_variant("walls", raw)),
        }
    }
}

/// Serializable policy selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub walls: Walls,
    #[serde(default)]
    pub self_collision: bool,
    /// Grow on every n-th tick; 0 never grows.
    #[serde(default)]
    pub grow_every: Tick,
}

impl PolicyConfig {
    pub fn move_policy(&self) -> Arc<dyn MovePolicy> {
        match (self.walls, self.self_collision) {
            (Walls::Bounded, false) => Arc::new(Bounded),
            (Walls::Bounded, true) => Arc::new(NoSelfCrossing::new(Bounded)),
            (Walls::Wrap, false) => Arc::new(Wraparound),
            (Walls::Wrap, true) => Arc::new(NoSelfCrossing::new(Wraparound)),
        }
    }

    pub fn growth_policy(&self) -> Arc<dyn GrowthPolicy> {
        if self.grow_every == 0 {
            Arc::new(NeverGrow)
        } else {
            Arc::new(GrowEvery(self.grow_every))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(10, 10).unwrap()
    }

    fn agent_at(x: i32, y: i32, max_length: usize) -> AgentState {
        AgentState::new(AgentId::new(0), Position::new(x, y), Direction::Right, max_length).unwrap()
    }

    #[test]
    fn bounded_kills_at_the_wall() {
        let a = agent_at(9, 2, 3);
        assert_eq!(
            Bounded.resolve(&grid(), &a, Position::new(10, 2), false),
            Move::Collide(CollisionKind::Wall)
        );
        assert_eq!(
            Bounded.resolve(&grid(), &a, Position::new(8, 2), false),
            Move::Advance(Position::new(8, 2))
        );
    }

    #[test]
    fn wraparound_reenters() {
        let a = agent_at(9, 2, 3);
        assert_eq!(
            Wraparound.resolve(&grid(), &a, Position::new(10, 2), false),
            Move::Advance(Position::new(0, 2))
        );
    }

    #[test]
    fn self_crossing_ignores_moving_tail() {
        // Body (3,3) (2,3) (2,2) (3,2) at bound 4: stepping onto (3,2) is
        // safe because the tail leaves it on the same step.
        let a = agent_at(3, 2, 4);
        for cell in [(2, 2), (2, 3), (3, 3)] {
            a.advance(Position::new(cell.0, cell.1), false);
        }
        let policy = NoSelfCrossing::new(Bounded);
        assert_eq!(
            policy.resolve(&grid(), &a, Position::new(3, 2), false),
            Move::Advance(Position::new(3, 2))
        );
        assert_eq!(
            policy.resolve(&grid(), &a, Position::new(2, 3), false),
            Move::Collide(CollisionKind::SelfBody)
        );
    }

    #[test]
    fn self_crossing_keeps_tail_on_a_growing_step() {
        // Same body at bound 4, but this step grows, so the tail stays put.
        let a = agent_at(3, 2, 4);
        for cell in [(2, 2), (2, 3), (3, 3)] {
            a.advance(Position::new(cell.0, cell.1), false);
        }
        let policy = NoSelfCrossing::new(Bounded);
        assert_eq!(
            policy.resolve(&grid(), &a, Position::new(3, 2), true),
            Move::Collide(CollisionKind::SelfBody)
        );
    }

    #[test]
    fn self_crossing_counts_tail_while_growing() {
        let a = agent_at(3, 2, 5);
        for cell in [(2, 2), (2, 3), (3, 3)] {
            a.advance(Position::new(cell.0, cell.1), false);
        }
        let policy = NoSelfCrossing::new(Bounded);
        assert_eq!(
            policy.resolve(&grid(), &a, Position::new(3, 2), false),
            Move::Collide(CollisionKind::SelfBody)
        );
    }

    #[test]
    fn growth_policies() {
        let id = AgentId::new(1);
        let p = Position::new(0, 0);
        assert!(!NeverGrow.should_grow(id, 4, p));
        assert!(GrowEvery(2).should_grow(id, 4, p));
        assert!(!GrowEvery(2).should_grow(id, 5, p));
        assert!(!GrowEvery(0).should_grow(id, 0, p));

        let on_food = |_: AgentId, _: Tick, next: Position| next == Position::new(5, 5);
        assert!(on_food.should_grow(id, 1, Position::new(5, 5)));
        assert!(!on_food.should_grow(id, 1, Position::new(5, 4)));
    }

    #[test]
    fn policy_config_builds_named_policies() {
        let config = PolicyConfig {
            walls: Walls::Wrap,
            self_collision: true,
            grow_every: 3,
        };
        assert_eq!(config.move_policy().name(), "no-self-crossing");
        assert_eq!(PolicyConfig::default().move_policy().name(), "bounded");
        assert!("WRAP".parse::<Walls>().is_ok());
        assert!("maze".parse::<Walls>().is_err());
    }
}
