//! Error types for engine interaction and evaluation rounds.

use std::path::PathBuf;

use crate::position::ParticipantId;

/// Failures of the engine process adapter.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to launch engine '{path}': {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine handshake failed: {0}")]
    Handshake(String),

    #[error("engine did not answer within {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    #[error("engine process terminated unexpectedly")]
    Crashed,

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a whole evaluation round.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("an evaluation is already in flight for '{0}'")]
    AlreadyInFlight(ParticipantId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl EvaluationError {
    /// True when the engine could not be started at all.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            EvaluationError::Engine(EngineError::Launch { .. } | EngineError::Handshake(_))
        )
    }
}
