//! The host collaborator contract.
//!
//! Actions never touch game state directly. They go through a [`World`],
//! which owns cells, progress state and named entities, and decides how and
//! where changes are persisted. The engine passes the world in through the
//! [`ExecutionContext`](crate::context::ExecutionContext) of each request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::value::Value;

/// A cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// This position moved by the vector from `from` to `to`, or `None` when
    /// the result leaves the `i32` range on any axis.
    pub fn translate(self, from: Position, to: Position) -> Option<Position> {
        let axis = |p: i32, f: i32, t: i32| i32::try_from(i64::from(p) - i64::from(f) + i64::from(t)).ok();
        Some(Position::new(
            axis(self.x, from.x, to.x)?,
            axis(self.y, from.y, to.y)?,
            axis(self.z, from.z, to.z)?,
        ))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The content of one cell, identified by block name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellState(pub String);

impl CellState {
    pub const AIR: &'static str = "air";

    pub fn new(block: impl Into<String>) -> Self {
        Self(block.into())
    }

    pub fn air() -> Self {
        Self::new(Self::AIR)
    }

    pub fn block(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in a specific dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Positional {
    pub dimension: i32,
    pub position: Position,
}

impl Positional {
    pub fn new(dimension: i32, position: Position) -> Self {
        Self { dimension, position }
    }
}

/// An axis-aligned box of cells in one dimension, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub dimension: i32,
    min: Position,
    max: Position,
}

impl Area {
    /// Builds an area from two opposite corners given in any order.
    pub fn new(dimension: i32, a: Position, b: Position) -> Self {
        Self {
            dimension,
            min: Position::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The corner with the lowest coordinates.
    pub fn bottom_left(&self) -> Position {
        self.min
    }

    pub fn top_right(&self) -> Position {
        self.max
    }

    pub fn contains(&self, pos: Position) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }

    /// True when both areas are in the same dimension and share a cell.
    pub fn intersects(&self, other: &Area) -> bool {
        self.dimension == other.dimension
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    pub fn iter(&self) -> AreaIterator {
        AreaIterator::new(*self)
    }
}

/// Visits every cell of an [`Area`] exactly once, x fastest, then z, then y.
///
/// Usable either cursor-style (`advance` then `current`) or as an
/// [`Iterator`].
#[derive(Debug, Clone)]
pub struct AreaIterator {
    area: Area,
    current: Option<Position>,
    done: bool,
}

impl AreaIterator {
    pub fn new(area: Area) -> Self {
        Self {
            area,
            current: None,
            done: false,
        }
    }

    pub fn dimension(&self) -> i32 {
        self.area.dimension
    }

    /// Moves to the next cell. Returns false once every cell was visited.
    pub fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        let (min, max) = (self.area.min, self.area.max);
        let next = match self.current {
            None => Some(min),
            Some(p) if p.x < max.x => Some(Position::new(p.x + 1, p.y, p.z)),
            Some(p) if p.z < max.z => Some(Position::new(min.x, p.y, p.z + 1)),
            Some(p) if p.y < max.y => Some(Position::new(min.x, p.y + 1, min.z)),
            Some(_) => None,
        };
        match next {
            Some(p) => {
                self.current = Some(p);
                true
            }
            None => {
                self.done = true;
                false
            }
        }
    }

    /// The cell reached by the last successful [`advance`](Self::advance).
    ///
    /// Before the first advance this is the bottom-left corner.
    pub fn current(&self) -> Position {
        self.current.unwrap_or(self.area.min)
    }
}

impl Iterator for AreaIterator {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        self.advance().then(|| self.current())
    }
}

/// A named mob to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobSpec {
    pub name: String,
    pub mob: String,
    pub hp: Option<i64>,
    pub item: Option<String>,
}

/// A named item stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub name: String,
    pub item: String,
    pub count: i64,
}

/// Game world and progress storage as seen by rule actions.
///
/// Implementations are not required to be thread safe; the engine borrows the
/// world mutably for the whole of one execution request.
pub trait World {
    fn cell(&self, dimension: i32, pos: Position) -> Result<CellState, WorldError>;

    fn set_cell(&mut self, dimension: i32, pos: Position, state: CellState) -> Result<(), WorldError>;

    /// Turns an expression value (typically an area name) into an area.
    fn resolve_area(&self, value: &Value) -> Result<Area, WorldError>;

    /// Turns an expression value (typically a position name) into a positional.
    fn resolve_positional(&self, value: &Value) -> Result<Positional, WorldError>;

    fn state(&self, name: &str) -> Option<Value>;

    fn set_state(&mut self, name: &str, value: Value);

    fn define_position(&mut self, name: &str, positional: Positional);

    fn define_area(&mut self, name: &str, area: Area);

    fn create_mob(&mut self, mob: MobSpec) -> Result<(), WorldError>;

    fn create_item(&mut self, item: ItemSpec) -> Result<(), WorldError>;

    /// Shows a message to players.
    fn message(&mut self, text: &str);

    /// Makes all changes so far durable.
    fn save(&mut self) -> Result<(), WorldError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_normalizes_corners() {
        let area = Area::new(0, Position::new(3, 5, -1), Position::new(1, 2, 4));
        assert_eq!(area.bottom_left(), Position::new(1, 2, -1));
        assert_eq!(area.top_right(), Position::new(3, 5, 4));
        assert!(area.contains(Position::new(2, 3, 0)));
        assert!(!area.contains(Position::new(0, 3, 0)));
        assert_eq!(area.volume(), 3 * 4 * 6);
    }

    #[test]
    fn test_iterator_visits_every_cell_once() {
        let area = Area::new(0, Position::new(0, 0, 0), Position::new(2, 1, 3));
        let cells: Vec<Position> = area.iter().collect();
        assert_eq!(cells.len() as u64, area.volume());
        let unique: std::collections::HashSet<_> = cells.iter().copied().collect();
        assert_eq!(unique.len(), cells.len());
        assert!(cells.iter().all(|p| area.contains(*p)));
    }

    #[test]
    fn test_cursor_style_iteration() {
        let area = Area::new(7, Position::new(0, 0, 0), Position::new(0, 0, 0));
        let mut it = area.iter();
        assert_eq!(it.dimension(), 7);
        assert!(it.advance());
        assert_eq!(it.current(), Position::new(0, 0, 0));
        assert!(!it.advance());
        assert!(!it.advance());
    }

    #[test]
    fn test_position_translate() {
        let a = Position::new(1, 2, 3);
        let moved = a.translate(Position::new(0, 0, 0), Position::new(5, 0, -1));
        assert_eq!(moved, Some(Position::new(6, 2, 2)));
        assert_eq!(a.to_string(), "(1, 2, 3)");

        let edge = Position::new(i32::MAX, 0, 0);
        let far = Position::new(i32::MIN, 0, 0);
        assert_eq!(edge.translate(edge, far), Some(far));
        assert_eq!(edge.translate(Position::new(0, 0, 0), Position::new(1, 0, 0)), None);
    }

    #[test]
    fn test_area_intersects() {
        let a = Area::new(0, Position::new(0, 0, 0), Position::new(2, 2, 2));
        assert!(a.intersects(&Area::new(0, Position::new(2, 2, 2), Position::new(4, 4, 4))));
        assert!(!a.intersects(&Area::new(0, Position::new(3, 0, 0), Position::new(4, 2, 2))));
        assert!(!a.intersects(&Area::new(1, Position::new(0, 0, 0), Position::new(2, 2, 2))));
    }
}
