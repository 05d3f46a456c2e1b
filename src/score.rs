//! Score conversion and reference-frame normalization.
//!
//! Engines report scores from the point of view of the side to move. Every
//! score in a round result is expressed in one fixed frame instead: positive
//! means the first player is better. `normalize` is the only place that
//! flips signs.

use crate::position::Side;
use crate::protocol::Score;

/// Pawn value reported for any forced mate.
pub const MATE_SCORE: f32 = 999.0;

/// Converts an engine score to pawns from the side to move's point of view.
///
/// Mates collapse to `+/-MATE_SCORE`; `mate 0` means the side to move is
/// already mated.
pub fn to_pawns(score: Score) -> f32 {
    match score {
        Score::Centipawns(cp) => cp as f32 / 100.0,
        Score::Mate(n) if n > 0 => MATE_SCORE,
        Score::Mate(_) => -MATE_SCORE,
    }
}

/// Maps `raw`, seen by `scored_side` (the side to move in the scored
/// position), into the first-player-positive frame.
pub fn normalize(raw: f32, scored_side: Side) -> f32 {
    raw * scored_side.sign()
}
