//! Grid — the immutable board the agents move on.
//!
//! The grid is a bounds oracle only. It does not track which cells are
//! occupied, so agents can overlap freely unless a movement policy says
//! otherwise.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Position;

/// Board dimensions. Valid cells are `0 <= x < width`, `0 <= y < height`.
///
/// Deserializing goes through [`Grid::new`], so an empty board is rejected
/// there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct Grid {
    width: i32,
    height: i32,
}

#[derive(Deserialize)]
struct RawGrid {
    width: i32,
    height: i32,
}

impl TryFrom<RawGrid> for Grid {
    type Error = SimError;

    fn try_from(raw: RawGrid) -> Result<Self> {
        Grid::new(raw.width, raw.height)
    }
}

impl Grid {
    /// Create a grid, rejecting non-positive dimensions.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(SimError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Map any position back onto the board as if its edges were joined.
    pub fn wrap(&self, pos: Position) -> Position {
        Position::new(pos.x.rem_euclid(self.width), pos.y.rem_euclid(self.height))
    }
}
