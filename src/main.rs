//! Molescope CLI -- scores one round of candidate moves against a UCI engine.
//!
//! Example:
//!
//! ```text
//! molescope --engine /usr/games/stockfish \
//!     --fen "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1" \
//!     --candidate alice=e2e4 --candidate bob=- --candidate carol=g1f3
//! ```
//!
//! Prints the round result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::Level;

use molescope::telemetry::init_tracing;
use molescope::{
    Candidate, EvaluationRequest, EvaluatorConfig, ParticipantId, Position, ProfileKind,
    RoundOutcome, SuspicionFlag, SuspicionOrchestrator,
};

#[derive(Parser)]
#[command(name = "molescope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score a round of candidate moves against a UCI engine", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine executable (overrides the config file)
    #[arg(long, env = "MOLESCOPE_ENGINE")]
    engine: Option<PathBuf>,

    /// FEN of the position before the round
    #[arg(long)]
    fen: String,

    /// Candidate as NAME=MOVE in UCI notation; NAME=- for no move
    #[arg(long = "candidate", value_parser = parse_candidate)]
    candidates: Vec<Candidate>,

    /// Participant under scrutiny
    #[arg(long, default_value = "subject")]
    subject: String,

    /// Use the strict strength profile
    #[arg(long)]
    strict: bool,

    /// Time budget per engine evaluation in milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Log engine traffic
    #[arg(short, long)]
    verbose: bool,
}

fn parse_candidate(arg: &str) -> Result<Candidate, String> {
    let (name, mv) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=MOVE, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing participant name in '{}'", arg));
    }
    let mv = match mv.trim() {
        "" | "-" => None,
        m => Some(m),
    };
    Ok(Candidate::new(name, mv))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(
        cli.json_logs,
        if cli.verbose { Level::DEBUG } else { Level::INFO },
    );

    let mut config = match &cli.config {
        Some(path) => EvaluatorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EvaluatorConfig::default(),
    };
    if let Some(engine) = cli.engine {
        config.engine_path = engine;
    }
    if let Some(ms) = cli.budget_ms {
        config.time_budget_ms = ms;
    }
    config.validate()?;

    let kind = if cli.strict {
        ProfileKind::Strict
    } else {
        ProfileKind::Standard
    };
    let request = EvaluationRequest {
        subject: ParticipantId::new(cli.subject),
        base: Position::from_fen(cli.fen),
        candidates: cli.candidates,
        time_budget_ms: config.time_budget_ms,
        strength: config.profile(kind).clone(),
    };

    let orchestrator = SuspicionOrchestrator::from_config(&config);
    let flag = SuspicionFlag::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<RoundOutcome>();
    orchestrator.submit(request, &flag, Arc::new(tx))?;

    let outcome = rx
        .recv()
        .await
        .context("round ended without an outcome")?;
    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
