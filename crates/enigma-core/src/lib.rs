//! # enigma-core
//!
//! Core library for the enigma rule language: small, indentation-structured
//! scripts that react to game events and drive a host world.
//!
//! A rule file is tokenized line by line, each line's parameters are parsed
//! into expression trees, indentation nests lines into a tree of scopes, and
//! the resulting program is executed against a [`world::World`] supplied by
//! the host.
//!
//! ## Modules
//!
//! - [`token`] - Closed keyword vocabulary and parameter counts
//! - [`tokenizer`] - Source lines to tokenized statements
//! - [`expression`] - Expression parser and evaluator
//! - [`value`] - Dynamic runtime values
//! - [`context`] - Identifier catalogue for rule files and per-request execution state
//! - [`program`] - Indentation-driven program builder
//! - [`action`] - Statement variants and the execution engine
//! - [`world`] - Host collaborator contract and coordinate types
//! - [`memory`] - In-memory world with JSON progress snapshots
//! - [`config`] - Persistent user configuration
//! - [`error`] - Parse, evaluation and execution errors
//!
//! ## Example
//!
//! ```no_run
//! use enigma_core::action::Event;
//! use enigma_core::context::{ExecutionContext, RuleContext};
//! use enigma_core::memory::MemoryWorld;
//! use enigma_core::program::Program;
//!
//! let source = "\
//! state 'visits' 0
//! on login:
//!     setstate 'visits' state('visits') + 1
//!     message 'Welcome back, ' + player
//! ";
//!
//! let program = Program::parse(source, &RuleContext::new()).expect("valid rules");
//! let mut world = MemoryWorld::new();
//! let mut ctx = ExecutionContext::new(&mut world).with_variable("player", "Steve");
//! program.execute(&mut ctx).expect("init");
//! program.fire(Event::Login, &mut ctx).expect("login");
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod memory;
pub mod program;
pub mod token;
pub mod tokenizer;
pub mod value;
pub mod world;
