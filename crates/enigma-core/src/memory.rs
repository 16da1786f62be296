//! In-memory [`World`] implementation.
//!
//! [`MemoryWorld`] keeps every cell, progress state and named entity in
//! process memory. Cells that were never written read as air. When a save
//! path is configured, each [`save`](World::save) writes a JSON
//! [`ProgressSnapshot`] that [`MemoryWorld::load`] can restore later.
//!
//! # Example
//!
//! ```no_run
//! use enigma_core::memory::MemoryWorld;
//! use enigma_core::world::World;
//!
//! let mut world = MemoryWorld::new().with_save_path("/tmp/progress.json");
//! world.set_state("door", "open".into());
//! world.save().unwrap();
//!
//! let restored = MemoryWorld::load("/tmp/progress.json").unwrap();
//! assert_eq!(restored.state("door"), Some("open".into()));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WorldError;
use crate::value::Value;
use crate::world::{Area, CellState, ItemSpec, MobSpec, Position, Positional, World};

/// One non-default cell in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEntry {
    pub dimension: i32,
    pub position: Position,
    pub state: CellState,
}

/// Everything a [`MemoryWorld`] persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub cells: Vec<CellEntry>,
    #[serde(default)]
    pub states: BTreeMap<String, Value>,
    #[serde(default)]
    pub positions: BTreeMap<String, Positional>,
    #[serde(default)]
    pub areas: BTreeMap<String, Area>,
    #[serde(default)]
    pub mobs: BTreeMap<String, MobSpec>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemSpec>,
}

/// A complete world held in memory.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    cells: HashMap<(i32, Position), CellState>,
    states: BTreeMap<String, Value>,
    positions: BTreeMap<String, Positional>,
    areas: BTreeMap<String, Area>,
    mobs: BTreeMap<String, MobSpec>,
    items: BTreeMap<String, ItemSpec>,
    messages: Vec<String>,
    save_count: usize,
    save_path: Option<PathBuf>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists a snapshot to `path` on every save.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Restores a world from a snapshot file. Later saves go to the same file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let snapshot: ProgressSnapshot = serde_json::from_str(&json)?;
        debug!(path = %path.display(), saved_at = %snapshot.saved_at, "loaded progress snapshot");

        let mut world = Self::from_snapshot(snapshot);
        world.save_path = Some(path.to_path_buf());
        Ok(world)
    }

    /// Like [`load`](Self::load), but starts empty when the file does not exist yet.
    pub fn load_or_new(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new().with_save_path(path))
        }
    }

    pub fn from_snapshot(snapshot: ProgressSnapshot) -> Self {
        Self {
            cells: snapshot
                .cells
                .into_iter()
                .map(|entry| ((entry.dimension, entry.position), entry.state))
                .collect(),
            states: snapshot.states,
            positions: snapshot.positions,
            areas: snapshot.areas,
            mobs: snapshot.mobs,
            items: snapshot.items,
            ..Self::default()
        }
    }

    /// Captures the current world. Cells are sorted for stable output.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let mut cells: Vec<CellEntry> = self
            .cells
            .iter()
            .map(|((dimension, position), state)| CellEntry {
                dimension: *dimension,
                position: *position,
                state: state.clone(),
            })
            .collect();
        cells.sort_by_key(|entry| (entry.dimension, entry.position));

        ProgressSnapshot {
            saved_at: Utc::now(),
            cells,
            states: self.states.clone(),
            positions: self.positions.clone(),
            areas: self.areas.clone(),
            mobs: self.mobs.clone(),
            items: self.items.clone(),
        }
    }

    /// Number of times [`save`](World::save) was called.
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    /// Messages shown so far, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn states(&self) -> &BTreeMap<String, Value> {
        &self.states
    }

    pub fn mob(&self, name: &str) -> Option<&MobSpec> {
        self.mobs.get(name)
    }

    pub fn item(&self, name: &str) -> Option<&ItemSpec> {
        self.items.get(name)
    }

    pub fn position(&self, name: &str) -> Option<Positional> {
        self.positions.get(name).copied()
    }

    pub fn area(&self, name: &str) -> Option<Area> {
        self.areas.get(name).copied()
    }
}

/// Extracts the name a reference value designates.
fn reference_name<'v>(value: &'v Value, kind: &str) -> Result<&'v str, WorldError> {
    match value {
        Value::Str(name) => Ok(name),
        other => Err(WorldError::InvalidReference(format!(
            "expected {} name, got {} {}",
            kind,
            other.kind(),
            other
        ))),
    }
}

impl World for MemoryWorld {
    fn cell(&self, dimension: i32, pos: Position) -> Result<CellState, WorldError> {
        Ok(self.cells.get(&(dimension, pos)).cloned().unwrap_or_else(CellState::air))
    }

    fn set_cell(&mut self, dimension: i32, pos: Position, state: CellState) -> Result<(), WorldError> {
        if state.block() == CellState::AIR {
            self.cells.remove(&(dimension, pos));
        } else {
            self.cells.insert((dimension, pos), state);
        }
        Ok(())
    }

    fn resolve_area(&self, value: &Value) -> Result<Area, WorldError> {
        let name = reference_name(value, "area")?;
        self.areas.get(name).copied().ok_or_else(|| WorldError::Unresolved {
            kind: "area",
            name: name.to_string(),
        })
    }

    fn resolve_positional(&self, value: &Value) -> Result<Positional, WorldError> {
        let name = reference_name(value, "position")?;
        self.positions.get(name).copied().ok_or_else(|| WorldError::Unresolved {
            kind: "position",
            name: name.to_string(),
        })
    }

    fn state(&self, name: &str) -> Option<Value> {
        self.states.get(name).cloned()
    }

    fn set_state(&mut self, name: &str, value: Value) {
        self.states.insert(name.to_string(), value);
    }

    fn define_position(&mut self, name: &str, positional: Positional) {
        self.positions.insert(name.to_string(), positional);
    }

    fn define_area(&mut self, name: &str, area: Area) {
        self.areas.insert(name.to_string(), area);
    }

    fn create_mob(&mut self, mob: MobSpec) -> Result<(), WorldError> {
        self.mobs.insert(mob.name.clone(), mob);
        Ok(())
    }

    fn create_item(&mut self, item: ItemSpec) -> Result<(), WorldError> {
        self.items.insert(item.name.clone(), item);
        Ok(())
    }

    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn save(&mut self) -> Result<(), WorldError> {
        self.save_count += 1;
        if let Some(path) = &self.save_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&self.snapshot())?;
            std::fs::write(path, json)?;
            debug!(path = %path.display(), saves = self.save_count, "saved progress snapshot");
        }
        Ok(())
    }
}
