//! Keyword registry of the rule language.
//!
//! Statements start with a main keyword, optionally followed by a secondary
//! keyword that selects a variant (`create mob` vs `create area`). Each
//! keyword declares how many parameter expressions follow it; when a
//! secondary keyword is present its count replaces the main one.
//!
//! The vocabulary is closed: [`TokenRegistry::standard`] is the only place
//! keywords are added, and rule files cannot extend it.

use std::collections::HashMap;
use std::sync::OnceLock;

/// An immutable keyword definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub name: &'static str,
    pub parameter_count: usize,
    /// Only meaningful for main keywords.
    pub has_secondary: bool,
}

/// Lookup tables for main and secondary keywords.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    main: HashMap<&'static str, TokenDescriptor>,
    secondary: HashMap<&'static str, TokenDescriptor>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed vocabulary of the rule language.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register_main("on", 0, true);
        registry.register_main("if", 1, false);
        registry.register_main("state", 2, false);
        registry.register_main("setstate", 2, false);
        registry.register_main("message", 1, false);
        registry.register_main("log", 1, false);
        registry.register_main("create", 0, true);
        registry.register_main("setblock", 2, false);
        registry.register_main("mimic", 2, false);

        // Events for `on`
        registry.register_secondary("init", 0);
        registry.register_secondary("activate", 0);
        registry.register_secondary("login", 0);

        // Entities for `create`
        registry.register_secondary("mob", 4);
        registry.register_secondary("item", 3);
        registry.register_secondary("position", 5);
        registry.register_secondary("area", 8);

        registry
    }

    pub fn register_main(&mut self, name: &'static str, parameter_count: usize, has_secondary: bool) {
        self.main.insert(
            name,
            TokenDescriptor {
                name,
                parameter_count,
                has_secondary,
            },
        );
    }

    pub fn register_secondary(&mut self, name: &'static str, parameter_count: usize) {
        self.secondary.insert(
            name,
            TokenDescriptor {
                name,
                parameter_count,
                has_secondary: false,
            },
        );
    }

    pub fn main(&self, name: &str) -> Option<TokenDescriptor> {
        self.main.get(name).copied()
    }

    pub fn secondary(&self, name: &str) -> Option<TokenDescriptor> {
        self.secondary.get(name).copied()
    }

    /// Names of all main keywords, sorted.
    pub fn main_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.main.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// The process-wide registry, built on first use.
pub fn registry() -> &'static TokenRegistry {
    static REGISTRY: OnceLock<TokenRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TokenRegistry::standard)
}
