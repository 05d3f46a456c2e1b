//! UCI responses read from the engine's stdout.

/// A search score as reported on an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns from the side to move's point of view.
    Centipawns(i32),
    /// Mate in N moves; negative when the side to move is getting mated.
    Mate(i32),
}

/// Whether a score is exact or only a search-window bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

/// The fields of an `info` line the evaluator cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub score: Option<Score>,
    /// Set when `score` is a `lowerbound`/`upperbound` rather than exact.
    pub bound: Option<Bound>,
}

/// An engine-to-client UCI line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `id name <x>` / `id author <x>`.
    Id { key: String, value: String },

    /// End of the handshake.
    UciOk,

    /// Answer to `isready`.
    ReadyOk,

    /// Search progress.
    Info(Info),

    /// End of a search.
    BestMove { mv: String },
}

/// Parses one line of engine output.
///
/// Returns `None` for empty lines and anything the evaluator does not use
/// (engine banners, `option` declarations, `copyprotection`,
/// `registration`).
pub fn parse_response(line: &str) -> Option<Response> {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();
    let head = tokens.next()?;

    match head {
        "uciok" => Some(Response::UciOk),
        "readyok" => Some(Response::ReadyOk),
        "id" => {
            let key = tokens.next()?.to_string();
            let value = tokens.collect::<Vec<_>>().join(" ");
            Some(Response::Id { key, value })
        }
        "bestmove" => Some(Response::BestMove {
            mv: tokens.next()?.to_string(),
        }),
        "info" => Some(Response::Info(parse_info(tokens))),
        _ => None,
    }
}

/// Parses the tokens following `info`. Stops at `string` and `pv`, whose
/// arguments run to the end of the line.
fn parse_info<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Info {
    let mut info = Info::default();

    while let Some(tok) = tokens.next() {
        match tok {
            "score" => {
                let kind = tokens.next();
                let value = tokens.next().and_then(|t| t.parse::<i32>().ok());
                info.score = match (kind, value) {
                    (Some("cp"), Some(v)) => Some(Score::Centipawns(v)),
                    (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
                info.bound = None;
            }
            "lowerbound" => info.bound = Some(Bound::Lower),
            "upperbound" => info.bound = Some(Bound::Upper),
            "string" | "pv" => break,
            _ => {}
        }
    }

    info
}
