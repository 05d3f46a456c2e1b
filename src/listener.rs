//! Output boundary of a round.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::error::EvaluationError;
use crate::position::ParticipantId;

/// A candidate's score in the round's reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub participant: ParticipantId,
    /// `None` when the engine failed on this candidate after the baseline
    /// had been scored.
    pub score: Option<f32>,
}

/// Scores of one round, all first-player-positive, in pawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub baseline: f32,
    pub per_candidate: Vec<CandidateScore>,
}

impl EvaluationResult {
    /// Score of `participant`, if they were scored successfully.
    pub fn score_of(&self, participant: &ParticipantId) -> Option<f32> {
        self.per_candidate
            .iter()
            .find(|c| &c.participant == participant)
            .and_then(|c| c.score)
    }
}

/// What a round ends with.
pub type RoundOutcome = Result<EvaluationResult, EvaluationError>;

/// Receives the outcome of each round.
///
/// Exactly one method is called per accepted round, from the round's
/// background task, after its engine has been stopped.
pub trait EvaluationListener: Send + Sync {
    fn on_result(&self, result: EvaluationResult);
    fn on_failure(&self, error: EvaluationError);
}

/// Forwards outcomes into a channel.
impl EvaluationListener for UnboundedSender<RoundOutcome> {
    fn on_result(&self, result: EvaluationResult) {
        if self.send(Ok(result)).is_err() {
            warn!("round result dropped: receiver closed");
        }
    }

    fn on_failure(&self, error: EvaluationError) {
        if self.send(Err(error)).is_err() {
            warn!("round failure dropped: receiver closed");
        }
    }
}
