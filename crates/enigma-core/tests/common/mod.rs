//! Shared test helpers for enigma-core integration tests.
//!
//! [`RecordingWorld`] wraps a [`MemoryWorld`] and records every collaborator
//! call, so tests can assert on the exact sequence of effects an action
//! produced.

#![allow(dead_code)]

use enigma_core::context::{ExecutionContext, RuleContext};
use enigma_core::error::WorldError;
use enigma_core::memory::MemoryWorld;
use enigma_core::program::Program;
use enigma_core::value::Value;
use enigma_core::world::{Area, CellState, ItemSpec, MobSpec, Position, Positional, World};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetCell(i32, Position, String),
    SetState(String),
    DefinePosition(String),
    DefineArea(String),
    CreateMob(String),
    CreateItem(String),
    Message(String),
    Save,
}

#[derive(Debug, Default)]
pub struct RecordingWorld {
    pub inner: MemoryWorld,
    pub calls: Vec<Call>,
}

impl RecordingWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Save).count()
    }

    pub fn writes(&self) -> Vec<&Call> {
        self.calls.iter().filter(|c| matches!(c, Call::SetCell(..))).collect()
    }
}

impl World for RecordingWorld {
    fn cell(&self, dimension: i32, pos: Position) -> Result<CellState, WorldError> {
        self.inner.cell(dimension, pos)
    }

    fn set_cell(&mut self, dimension: i32, pos: Position, state: CellState) -> Result<(), WorldError> {
        self.calls.push(Call::SetCell(dimension, pos, state.block().to_string()));
        self.inner.set_cell(dimension, pos, state)
    }

    fn resolve_area(&self, value: &Value) -> Result<Area, WorldError> {
        self.inner.resolve_area(value)
    }

    fn resolve_positional(&self, value: &Value) -> Result<Positional, WorldError> {
        self.inner.resolve_positional(value)
    }

    fn state(&self, name: &str) -> Option<Value> {
        self.inner.state(name)
    }

    fn set_state(&mut self, name: &str, value: Value) {
        self.calls.push(Call::SetState(name.to_string()));
        self.inner.set_state(name, value)
    }

    fn define_position(&mut self, name: &str, positional: Positional) {
        self.calls.push(Call::DefinePosition(name.to_string()));
        self.inner.define_position(name, positional)
    }

    fn define_area(&mut self, name: &str, area: Area) {
        self.calls.push(Call::DefineArea(name.to_string()));
        self.inner.define_area(name, area)
    }

    fn create_mob(&mut self, mob: MobSpec) -> Result<(), WorldError> {
        self.calls.push(Call::CreateMob(mob.name.clone()));
        self.inner.create_mob(mob)
    }

    fn create_item(&mut self, item: ItemSpec) -> Result<(), WorldError> {
        self.calls.push(Call::CreateItem(item.name.clone()));
        self.inner.create_item(item)
    }

    fn message(&mut self, text: &str) {
        self.calls.push(Call::Message(text.to_string()));
        self.inner.message(text)
    }

    fn save(&mut self) -> Result<(), WorldError> {
        self.calls.push(Call::Save);
        self.inner.save()
    }
}

/// Parses `source` with the default rule context, panicking on errors.
pub fn program(source: &str) -> Program {
    Program::parse(source, &RuleContext::new()).unwrap_or_else(|e| panic!("{}", e))
}

/// Runs the top-level actions of `source` against `world`.
pub fn run(source: &str, world: &mut dyn World) {
    let program = program(source);
    let mut ctx = ExecutionContext::new(world).with_variable("player", "Steve");
    program.execute(&mut ctx).unwrap_or_else(|e| panic!("{}", e));
}
