//! Scripted UCI engine for exercising the evaluator end to end.
//!
//! Speaks enough UCI for the evaluator's adapter: the `uci` handshake,
//! `isready`, `setoption`, `position`, `go`, and `quit`. Each `go` answers
//! with the next entry of the `ScriptedScores` option, a comma-separated
//! list of:
//!
//!   <n>       `info ... score cp <n>` then `bestmove`
//!   mate<n>   `info ... score mate <n>` then `bestmove`
//!   [<a>]^<b> exact `cp <a>` (if given), then `cp <b> lowerbound`
//!   none      `bestmove` with no score
//!   hang      no answer until `stop`
//!   wedge     stop reading input altogether
//!   crash     exit immediately with status 3
//!
//! Once the script runs out every search scores `cp 0`. Setting
//! `IgnoreQuit` to `true` makes the engine hang on `quit` instead of
//! exiting.

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::time::Duration;

use molescope::position::Position;
use molescope::protocol::{parse_command, Command, GoParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scripted {
    Centipawns(i32),
    Mate(i32),
    Bounded { exact: Option<i32>, lower: i32 },
    NoScore,
    Hang,
    Wedge,
    Crash,
}

fn parse_entry(entry: &str) -> Option<Scripted> {
    match entry {
        "none" => return Some(Scripted::NoScore),
        "hang" => return Some(Scripted::Hang),
        "wedge" => return Some(Scripted::Wedge),
        "crash" => return Some(Scripted::Crash),
        _ => {}
    }
    if let Some((exact, lower)) = entry.split_once('^') {
        let exact = match exact {
            "" => None,
            n => Some(n.parse().ok()?),
        };
        return Some(Scripted::Bounded {
            exact,
            lower: lower.parse().ok()?,
        });
    }
    match entry.strip_prefix("mate") {
        Some(n) => n.parse().ok().map(Scripted::Mate),
        None => entry.parse().ok().map(Scripted::Centipawns),
    }
}

fn parse_script(value: &str) -> VecDeque<Scripted> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(parse_entry)
        .collect()
}

struct StubEngine {
    options: HashMap<String, String>,
    script: VecDeque<Scripted>,
    position: Option<Position>,
    searching: bool,
}

impl StubEngine {
    fn new() -> Self {
        StubEngine {
            options: HashMap::new(),
            script: VecDeque::new(),
            position: None,
            searching: false,
        }
    }

    fn handle_uci<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "id name uci-stub")?;
        writeln!(out, "id author molescope")?;
        writeln!(out, "option name Threads type spin default 1 min 1 max 64")?;
        writeln!(out, "option name Hash type spin default 16 min 1 max 1024")?;
        writeln!(out, "option name UCI_LimitStrength type check default false")?;
        writeln!(out, "option name UCI_Elo type spin default 1320 min 1320 max 3190")?;
        writeln!(out, "option name ScriptedScores type string default <empty>")?;
        writeln!(out, "option name IgnoreQuit type check default false")?;
        writeln!(out, "uciok")?;
        out.flush()
    }

    fn handle_isready<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "readyok")?;
        out.flush()
    }

    fn set_option(&mut self, name: String, value: Option<String>) {
        let value = value.unwrap_or_default();
        if name == "ScriptedScores" {
            self.script = parse_script(&value);
        }
        self.options.insert(name, value);
    }

    fn ignores_quit(&self) -> bool {
        self.options.get("IgnoreQuit").map(String::as_str) == Some("true")
    }

    fn handle_go<W: Write>(&mut self, params: &GoParams, out: &mut W) -> io::Result<()> {
        if self.position.is_none() {
            eprintln!("go: no position set");
            return Ok(());
        }
        let depth = params.depth.unwrap_or(1);
        match self.script.pop_front().unwrap_or(Scripted::Centipawns(0)) {
            Scripted::Centipawns(cp) => {
                writeln!(out, "info depth {} score cp {} nodes 1 pv 0000", depth, cp)?;
            }
            Scripted::Mate(n) => {
                writeln!(out, "info depth {} score mate {} nodes 1 pv 0000", depth, n)?;
            }
            Scripted::Bounded { exact, lower } => {
                if let Some(cp) = exact {
                    writeln!(out, "info depth {} score cp {} nodes 1 pv 0000", depth, cp)?;
                }
                writeln!(
                    out,
                    "info depth {} score cp {} lowerbound nodes 2",
                    depth + 1,
                    lower
                )?;
            }
            Scripted::NoScore => {}
            Scripted::Hang => {
                self.searching = true;
                return Ok(());
            }
            Scripted::Wedge => std::thread::sleep(Duration::from_secs(3600)),
            Scripted::Crash => std::process::exit(3),
        }
        writeln!(out, "bestmove 0000")?;
        out.flush()
    }

    fn handle_stop<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !std::mem::take(&mut self.searching) {
            return Ok(());
        }
        writeln!(out, "bestmove 0000")?;
        out.flush()
    }
}

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut engine = StubEngine::new();

    for line in stdin.lock().lines() {
        let Some(cmd) = parse_command(&line?) else {
            continue;
        };

        match cmd {
            Command::Uci => engine.handle_uci(&mut out)?,
            Command::IsReady => engine.handle_isready(&mut out)?,
            Command::SetOption { name, value } => engine.set_option(name, value),
            Command::UciNewGame => engine.position = None,
            Command::Position(position) => engine.position = Some(position),
            Command::Go(params) => engine.handle_go(&params, &mut out)?,
            Command::Stop => engine.handle_stop(&mut out)?,
            Command::Quit => {
                if engine.ignores_quit() {
                    std::thread::sleep(Duration::from_secs(3600));
                }
                break;
            }
        }
    }
    Ok(())
}
