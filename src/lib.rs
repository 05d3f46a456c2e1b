//! Molescope: move-suspicion evaluation for multiplayer chess variants.
//!
//! Drives a UCI engine to score the position before a round and the
//! position each participant's proposed move would produce, and reports the
//! scores in a single reference frame so the game logic can judge how close
//! a participant's play is to engine play.

pub mod config;
pub mod derive;
pub mod engine;
pub mod error;
pub mod flag;
pub mod listener;
pub mod orchestrator;
pub mod position;
pub mod protocol;
pub mod rules;
pub mod score;
pub mod telemetry;

pub use config::{EvaluatorConfig, ProfileKind, StrengthProfile};
pub use error::{EngineError, EvaluationError};
pub use flag::{SuspicionFlag, SuspicionGuard};
pub use listener::{CandidateScore, EvaluationListener, EvaluationResult, RoundOutcome};
pub use orchestrator::{EvaluationRequest, SuspicionOrchestrator};
pub use position::{Candidate, Move, ParticipantId, Position, Side};
