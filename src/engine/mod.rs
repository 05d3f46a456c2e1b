//! Engine process adapter.
//!
//! `EngineLauncher` starts an engine and hands back an `EngineSession`; the
//! session is configured once, scores positions one at a time, and is
//! stopped exactly once by its owner. `uci` holds the subprocess
//! implementation.

pub mod uci;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::StrengthProfile;
use crate::error::EngineError;
use crate::position::Position;

pub use uci::{UciEngine, UciLauncher, UciTimeouts};

/// Starts engine sessions.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Launches the engine at `path` and completes its handshake.
    async fn start(&self, path: &Path) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// One running engine instance.
///
/// Queries are strictly sequential; a session is never shared between
/// rounds.
#[async_trait]
pub trait EngineSession: Send {
    /// Applies strength limits. Must be called before `evaluate`.
    async fn configure(&mut self, profile: &StrengthProfile) -> Result<(), EngineError>;

    /// Scores `position` in pawns from the side to move's point of view.
    async fn evaluate(&mut self, position: &Position, budget: Duration) -> Result<f32, EngineError>;

    /// Terminates the engine and releases its resources. Idempotent.
    async fn stop(&mut self);
}
