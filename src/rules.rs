//! Rules collaborator boundary.
//!
//! The evaluator never implements game rules itself. It asks a `Rules`
//! implementation to apply a move and to report whose turn it is.
//! `ChessRules` delegates both to `shakmaty`: the position is parsed from its
//! FEN, any moves already on it are replayed, and a candidate move is played
//! only if it is legal there. The result is re-serialized as a fresh FEN.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position as _};

use crate::position::{Move, Position, Side};

/// Errors reported by a rules collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("illegal move '{mv}': {reason}")]
    IllegalMove { mv: String, reason: String },

    #[error("malformed position: {0}")]
    MalformedPosition(String),
}

/// Move application and side-to-move queries for a game.
pub trait Rules: Send + Sync {
    /// Applies `mv` to `position`, returning the resulting position.
    fn apply_move(&self, position: &Position, mv: &Move) -> Result<Position, RulesError>;

    /// Returns the side to move in `position`.
    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError>;
}

impl From<Color> for Side {
    fn from(color: Color) -> Side {
        match color {
            Color::White => Side::First,
            Color::Black => Side::Second,
        }
    }
}

/// Standard chess rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        ChessRules
    }

    /// Parses the FEN of `position` and replays its move list.
    fn board(position: &Position) -> Result<Chess, RulesError> {
        let fen: Fen = position
            .fen()
            .parse()
            .map_err(|e| RulesError::MalformedPosition(format!("'{}': {}", position.fen(), e)))?;
        let mut board: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::MalformedPosition(format!("'{}': {}", position.fen(), e)))?;

        for mv in position.moves() {
            let m = legal_move(&board, mv).map_err(|e| {
                RulesError::MalformedPosition(format!("move list does not replay: {}", e))
            })?;
            board.play_unchecked(&m);
        }
        Ok(board)
    }
}

/// Resolves `mv` against `board`, rejecting unparsable and illegal moves.
fn legal_move(board: &Chess, mv: &Move) -> Result<shakmaty::Move, RulesError> {
    let illegal = |reason: String| RulesError::IllegalMove {
        mv: mv.to_string(),
        reason,
    };
    let uci: UciMove = mv.as_str().parse().map_err(|e| illegal(format!("{}", e)))?;
    uci.to_move(board).map_err(|e| illegal(format!("{}", e)))
}

impl Rules for ChessRules {
    fn apply_move(&self, position: &Position, mv: &Move) -> Result<Position, RulesError> {
        let mut board = Self::board(position)?;
        let m = legal_move(&board, mv)?;
        board.play_unchecked(&m);
        let fen = Fen(board.into_setup(EnPassantMode::Legal));
        Ok(Position::from_fen(fen.to_string()))
    }

    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError> {
        Ok(Self::board(position)?.turn().into())
    }
}
