//! Persistent configuration for enigma.
//!
//! Stores user settings in `~/.enigma/config.json`: where rule files live,
//! where progress snapshots go, and which extra ambient variables rule files
//! may reference.
//!
//! # Example
//!
//! ```no_run
//! use enigma_core::config::EnigmaConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = EnigmaConfig::load();
//!
//! let rules = config.rule_context();
//! if let Some(state) = &config.state_file {
//!     println!("Progress saved to {}", state.display());
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::RuleContext;

const CONFIG_FILENAME: &str = "config.json";

/// Returns the enigma data directory (`~/.enigma/`).
pub fn enigma_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".enigma")
}

/// Persistent enigma configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EnigmaConfig {
    /// Directory relative rule file paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_dir: Option<PathBuf>,

    /// Default progress snapshot for `enigma run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Ambient variables declared on top of `player` and `event`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

impl EnigmaConfig {
    /// Load config from `~/.enigma/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&enigma_dir().join(CONFIG_FILENAME))
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.enigma/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = enigma_dir();
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// The rule context with this config's extra variables declared.
    pub fn rule_context(&self) -> RuleContext {
        RuleContext::new().with_variables(self.variables.iter().cloned())
    }

    /// Resolves a rule file path against `rules_dir`. Absolute paths and
    /// paths that exist as given are returned unchanged.
    pub fn resolve_rules_path(&self, path: &Path) -> PathBuf {
        match &self.rules_dir {
            Some(dir) if path.is_relative() && !path.exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
