//! Position and candidate types.
//!
//! A `Position` is an opaque board state: a FEN string plus the moves played
//! on top of it, exactly what a UCI `position` command carries. Positions are
//! never mutated in place; applying a move yields a new value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The player whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The first player (white).
    First,
    /// The second player (black).
    Second,
}

impl Side {
    /// Returns the other side.
    pub const fn opposite(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    /// Multiplier that maps a score seen by this side into the
    /// first-player-positive frame.
    pub const fn sign(self) -> f32 {
        match self {
            Side::First => 1.0,
            Side::Second => -1.0,
        }
    }
}

/// A move in UCI long algebraic notation (`e2e4`, `e7e8q`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Move(String);

impl Move {
    pub fn new(text: impl Into<String>) -> Self {
        Move(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a participant in the game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(name: impl Into<String>) -> Self {
        ParticipantId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A board state as sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    fen: String,
    #[serde(default)]
    moves: Vec<Move>,
}

impl Position {
    /// Creates a position from a FEN record with no moves applied.
    pub fn from_fen(fen: impl Into<String>) -> Self {
        Position {
            fen: fen.into().trim().to_string(),
            moves: Vec::new(),
        }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// Moves played on top of the FEN, oldest first.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Returns a new position with `mv` appended. The receiver is untouched.
    pub fn with_move(&self, mv: Move) -> Position {
        let mut moves = self.moves.clone();
        moves.push(mv);
        Position {
            fen: self.fen.clone(),
            moves,
        }
    }
}

/// A participant paired with the move they proposed this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub participant: ParticipantId,
    /// `None` when the participant did not move this round.
    pub proposed: Option<Move>,
}

impl Candidate {
    pub fn new(participant: impl Into<String>, proposed: Option<&str>) -> Self {
        Candidate {
            participant: ParticipantId::new(participant),
            proposed: proposed.map(Move::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn side_opposite_and_sign() {
        assert_eq!(Side::First.opposite(), Side::Second);
        assert_eq!(Side::Second.opposite(), Side::First);
        assert_eq!(Side::First.sign(), 1.0);
        assert_eq!(Side::Second.sign(), -1.0);
    }

    #[test]
    fn with_move_returns_new_position() {
        let base = Position::from_fen(START_FEN);
        let next = base.with_move(Move::new("e2e4"));
        assert!(base.moves().is_empty());
        assert_eq!(next.moves(), &[Move::new("e2e4")]);
        assert_eq!(next.fen(), base.fen());
    }

    #[test]
    fn from_fen_trims_whitespace() {
        let pos = Position::from_fen(format!("  {}\n", START_FEN));
        assert_eq!(pos.fen(), START_FEN);
    }

    #[test]
    fn candidate_without_move() {
        let c = Candidate::new("alice", None);
        assert_eq!(c.participant.as_str(), "alice");
        assert!(c.proposed.is_none());
    }
}
