//! Fan-out of a round's candidates into derived positions.

use crate::position::{Candidate, ParticipantId, Position};
use crate::rules::{Rules, RulesError};

/// A candidate's move applied to the base position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPosition {
    pub participant: ParticipantId,
    pub position: Position,
}

/// Output of `derive_positions`.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    /// Derived positions in candidate order.
    pub positions: Vec<DerivedPosition>,
    /// Candidates whose move the rules collaborator rejected.
    pub excluded: Vec<(ParticipantId, RulesError)>,
}

/// Applies each candidate's move to `base`.
///
/// Candidates without a move are skipped. Rejected moves land in
/// `excluded` and never abort the derivation.
pub fn derive_positions<R: Rules + ?Sized>(
    rules: &R,
    base: &Position,
    candidates: &[Candidate],
) -> Derivation {
    let mut derivation = Derivation::default();

    for candidate in candidates {
        let Some(mv) = &candidate.proposed else {
            continue;
        };
        match rules.apply_move(base, mv) {
            Ok(position) => derivation.positions.push(DerivedPosition {
                participant: candidate.participant.clone(),
                position,
            }),
            Err(e) => derivation
                .excluded
                .push((candidate.participant.clone(), e)),
        }
    }

    derivation
}
