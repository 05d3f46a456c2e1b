//! UCI commands sent from the evaluator to the engine.
//!
//! `Display` renders a command as the single line written to the engine's
//! stdin. `parse_command` is the inverse and is what the `uci-stub` engine
//! uses to read its input.

use std::fmt;

use crate::position::{Move, Position};

/// FEN of the standard starting position, used for `position startpos`.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Search constraints passed with the `go` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub movetime: Option<u64>,
    pub depth: Option<u32>,
}

/// A client-to-engine UCI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the UCI handshake; the engine answers `uciok`.
    Uci,

    /// Synchronization ping; the engine answers `readyok`.
    IsReady,

    /// Set an engine option: `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Reset engine state for a new game.
    UciNewGame,

    /// Set the position to search.
    Position(Position),

    /// Start searching the current position.
    Go(GoParams),

    /// Interrupt the current search.
    Stop,

    /// Terminate the engine process.
    Quit,
}

impl Command {
    /// Convenience constructor for `setoption` with a value.
    pub fn set_option(name: &str, value: impl fmt::Display) -> Command {
        Command::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Uci => f.write_str("uci"),
            Command::IsReady => f.write_str("isready"),
            Command::UciNewGame => f.write_str("ucinewgame"),
            Command::Stop => f.write_str("stop"),
            Command::Quit => f.write_str("quit"),
            Command::SetOption { name, value } => {
                write!(f, "setoption name {}", name)?;
                if let Some(v) = value {
                    write!(f, " value {}", v)?;
                }
                Ok(())
            }
            Command::Position(position) => {
                write!(f, "position fen {}", position.fen())?;
                if !position.moves().is_empty() {
                    f.write_str(" moves")?;
                    for mv in position.moves() {
                        write!(f, " {}", mv)?;
                    }
                }
                Ok(())
            }
            Command::Go(params) => {
                f.write_str("go")?;
                if let Some(ms) = params.movetime {
                    write!(f, " movetime {}", ms)?;
                }
                if let Some(depth) = params.depth {
                    write!(f, " depth {}", depth)?;
                }
                Ok(())
            }
        }
    }
}

/// Parses a single line of engine input into a `Command`.
///
/// Returns `None` for empty lines, unknown commands, and malformed
/// arguments to known commands.
pub fn parse_command(line: &str) -> Option<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&head, rest) = tokens.split_first()?;

    match head {
        "uci" => Some(Command::Uci),
        "isready" => Some(Command::IsReady),
        "ucinewgame" => Some(Command::UciNewGame),
        "stop" => Some(Command::Stop),
        "quit" => Some(Command::Quit),
        "setoption" => parse_setoption(rest),
        "position" => parse_position(rest),
        "go" => Some(parse_go(rest)),
        _ => None,
    }
}

/// Parses `name <id> [value <x>]`. Names and values may span several words.
fn parse_setoption(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 2 || tokens[0] != "name" {
        return None;
    }
    let tokens = &tokens[1..];
    let (name_parts, value) = match tokens.iter().position(|&t| t == "value") {
        Some(vi) => {
            let value_parts = &tokens[vi + 1..];
            let value = if value_parts.is_empty() {
                None
            } else {
                Some(value_parts.join(" "))
            };
            (&tokens[..vi], value)
        }
        None => (tokens, None),
    };
    if name_parts.is_empty() {
        return None;
    }
    Some(Command::SetOption {
        name: name_parts.join(" "),
        value,
    })
}

/// Parses `fen <fields...> [moves <m>...]` or `startpos [moves <m>...]`.
fn parse_position(tokens: &[&str]) -> Option<Command> {
    let moves_idx = tokens.iter().position(|&t| t == "moves");
    let (setup, moves) = match moves_idx {
        Some(mi) => (&tokens[..mi], &tokens[mi + 1..]),
        None => (tokens, &[][..]),
    };

    let mut position = match setup.split_first() {
        Some((&"startpos", [])) => Position::from_fen(START_FEN),
        Some((&"fen", fields)) if !fields.is_empty() => Position::from_fen(fields.join(" ")),
        _ => return None,
    };
    for mv in moves {
        position = position.with_move(Move::new(*mv));
    }
    Some(Command::Position(position))
}

/// Parses `[movetime <ms>] [depth <n>]`. Unknown or malformed parameters are
/// skipped.
fn parse_go(tokens: &[&str]) -> Command {
    let mut params = GoParams::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "movetime" => {
                i += 1;
                params.movetime = tokens.get(i).and_then(|t| t.parse().ok());
            }
            "depth" => {
                i += 1;
                params.depth = tokens.get(i).and_then(|t| t.parse().ok());
            }
            _ => {}
        }
        i += 1;
    }

    Command::Go(params)
}
