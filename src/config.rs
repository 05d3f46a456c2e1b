//! Evaluator configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default. Two strength profiles are carried: `standard` for ordinary
//! participants and `strict` for participants under closer scrutiny.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Ceiling on the engine's playing strength for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthProfile {
    /// Search threads.
    pub threads: u32,
    /// Transposition table size in MB.
    pub hash_mb: u32,
    /// Engine skill level, when the engine supports one.
    pub skill_level: Option<u8>,
    /// Maximum search depth passed with `go`.
    pub depth_cap: Option<u32>,
    /// Rating cap applied through `UCI_LimitStrength` / `UCI_Elo`.
    pub elo_cap: Option<u32>,
    /// Further engine-specific options, sent verbatim with `setoption`.
    pub options: BTreeMap<String, String>,
}

impl Default for StrengthProfile {
    fn default() -> Self {
        StrengthProfile {
            threads: 1,
            hash_mb: 25,
            skill_level: None,
            depth_cap: None,
            elo_cap: None,
            options: BTreeMap::new(),
        }
    }
}

impl StrengthProfile {
    /// A default profile capped at `elo`.
    pub fn with_elo(elo: u32) -> Self {
        StrengthProfile {
            elo_cap: Some(elo),
            ..StrengthProfile::default()
        }
    }
}

/// Which configured profile a round uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Standard,
    Strict,
}

/// Configuration for the evaluator and its engine processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Path of the UCI engine executable.
    pub engine_path: PathBuf,
    /// Time budget per engine evaluation (milliseconds).
    pub time_budget_ms: u64,
    pub standard: StrengthProfile,
    pub strict: StrengthProfile,
    /// Bound on the `uci`/`uciok` and `isready`/`readyok` exchanges.
    pub handshake_timeout_ms: u64,
    /// Extra time allowed past the search budget for the engine to answer.
    pub response_grace_ms: u64,
    /// Time the engine gets to exit after `quit` before it is killed.
    pub quit_timeout_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            engine_path: PathBuf::from("stockfish/stockfish"),
            time_budget_ms: 1000,
            standard: StrengthProfile::with_elo(1500),
            strict: StrengthProfile::with_elo(2000),
            handshake_timeout_ms: 5000,
            response_grace_ms: 500,
            quit_timeout_ms: 500,
        }
    }
}

impl EvaluatorConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EvaluatorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("engine_path is empty".to_string()));
        }
        if self.time_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "time_budget_ms must be positive".to_string(),
            ));
        }
        for (name, profile) in [("standard", &self.standard), ("strict", &self.strict)] {
            if profile.threads == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} profile needs at least one thread",
                    name
                )));
            }
            if profile.skill_level.is_some_and(|s| s > 20) {
                return Err(ConfigError::Invalid(format!(
                    "{} profile skill_level must be 0-20",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Returns the profile for `kind`.
    pub fn profile(&self, kind: ProfileKind) -> &StrengthProfile {
        match kind {
            ProfileKind::Standard => &self.standard,
            ProfileKind::Strict => &self.strict,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn response_grace(&self) -> Duration {
        Duration::from_millis(self.response_grace_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}
