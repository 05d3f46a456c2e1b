//! UCI engine running as a child process.
//!
//! Commands are written to the engine's stdin one line at a time and its
//! stdout is read line by line. Every read is bounded by a timeout, and the
//! child is spawned with kill-on-drop so a handle that is dropped without
//! `stop` still takes the process down with it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tracing::{debug, warn};

use super::{EngineLauncher, EngineSession};
use crate::config::{EvaluatorConfig, StrengthProfile};
use crate::error::EngineError;
use crate::position::Position;
use crate::protocol::{parse_response, Bound, Command, GoParams, Info, Response, Score};
use crate::score::to_pawns;

/// Time bounds for talking to a UCI engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciTimeouts {
    /// Bound on `uci`/`uciok` and `isready`/`readyok`.
    pub handshake: Duration,
    /// Slack past the search budget before a `go` counts as timed out.
    pub response_grace: Duration,
    /// Time allowed to accept `quit` (or `stop`) and, for `quit`, to exit.
    pub quit: Duration,
}

impl Default for UciTimeouts {
    fn default() -> Self {
        Self::from(&EvaluatorConfig::default())
    }
}

impl From<&EvaluatorConfig> for UciTimeouts {
    fn from(config: &EvaluatorConfig) -> Self {
        UciTimeouts {
            handshake: config.handshake_timeout(),
            response_grace: config.response_grace(),
            quit: config.quit_timeout(),
        }
    }
}

/// Launches `UciEngine` subprocesses.
#[derive(Debug, Clone, Default)]
pub struct UciLauncher {
    timeouts: UciTimeouts,
}

impl UciLauncher {
    pub fn new(timeouts: UciTimeouts) -> Self {
        UciLauncher { timeouts }
    }
}

#[async_trait]
impl EngineLauncher for UciLauncher {
    async fn start(&self, path: &Path) -> Result<Box<dyn EngineSession>, EngineError> {
        let engine = UciEngine::spawn(path, self.timeouts).await?;
        Ok(Box::new(engine))
    }
}

/// Tracks the scores seen during one search.
///
/// Prefers the last exact score; a `lowerbound`/`upperbound` score is only
/// used when the search never reported an exact one.
#[derive(Debug, Default)]
struct ScoreKeeper {
    exact: Option<Score>,
    bounded: Option<(Score, Bound)>,
}

impl ScoreKeeper {
    fn observe(&mut self, info: &Info) {
        match (info.score, info.bound) {
            (Some(score), None) => self.exact = Some(score),
            (Some(score), Some(bound)) => self.bounded = Some((score, bound)),
            (None, _) => {}
        }
    }

    fn best(&self) -> Option<Score> {
        if let Some(score) = self.exact {
            return Some(score);
        }
        let (score, bound) = self.bounded?;
        debug!(?score, ?bound, "no exact score, using bound");
        Some(score)
    }
}

/// Pipes and handle of a live engine process.
struct Process {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// A running UCI engine.
pub struct UciEngine {
    process: Option<Process>,
    pid: Option<u32>,
    name: Option<String>,
    depth_cap: Option<u32>,
    timeouts: UciTimeouts,
    /// Set once a search was abandoned mid-flight; later output from the
    /// engine can no longer be attributed to a request.
    poisoned: bool,
}

impl UciEngine {
    /// Spawns the engine at `path` and completes the `uci` handshake.
    ///
    /// A failed handshake stops the process before the error is returned.
    pub async fn spawn(path: &Path, timeouts: UciTimeouts) -> Result<UciEngine, EngineError> {
        let mut child = ProcessCommand::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Launch {
                path: path.to_path_buf(),
                source,
            })?;

        let pid = child.id();
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(EngineError::Handshake("engine stdio not captured".to_string()));
        };

        let mut engine = UciEngine {
            process: Some(Process {
                child,
                stdin,
                lines: BufReader::new(stdout).lines(),
            }),
            pid,
            name: None,
            depth_cap: None,
            timeouts,
            poisoned: false,
        };
        debug!(pid, path = %path.display(), "engine spawned");

        if let Err(e) = engine.handshake().await {
            engine.stop().await;
            return Err(e);
        }
        Ok(engine)
    }

    /// OS process id, while the process is running.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and(self.pid)
    }

    /// Engine name reported during the handshake.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        let limit = self.timeouts.handshake;
        match tokio::time::timeout(limit, self.await_uciok()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(EngineError::Crashed)) => Err(EngineError::Handshake(
                "engine exited before uciok".to_string(),
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EngineError::Handshake(format!(
                "no uciok within {} ms",
                limit.as_millis()
            ))),
        }
    }

    async fn await_uciok(&mut self) -> Result<(), EngineError> {
        self.send(&Command::Uci).await?;
        loop {
            match parse_response(&self.next_line().await?) {
                Some(Response::UciOk) => return Ok(()),
                Some(Response::Id { key, value }) if key == "name" => self.name = Some(value),
                _ => {}
            }
        }
    }

    async fn await_readyok(&mut self) -> Result<(), EngineError> {
        self.send(&Command::IsReady).await?;
        loop {
            if let Some(Response::ReadyOk) = parse_response(&self.next_line().await?) {
                return Ok(());
            }
        }
    }

    /// Reads `info` lines until `bestmove` and picks the score to report.
    async fn await_score(&mut self) -> Result<Score, EngineError> {
        let mut scores = ScoreKeeper::default();
        loop {
            match parse_response(&self.next_line().await?) {
                Some(Response::Info(info)) => scores.observe(&info),
                Some(Response::BestMove { mv }) => {
                    debug!(pid = self.pid, bestmove = %mv, "search finished");
                    return scores.best().ok_or_else(|| {
                        EngineError::Protocol("bestmove without a score".to_string())
                    });
                }
                _ => {}
            }
        }
    }

    /// Configuration exchange, from the first `setoption` to `readyok`.
    async fn apply_profile(&mut self, profile: &StrengthProfile) -> Result<(), EngineError> {
        self.send(&Command::set_option("Threads", profile.threads)).await?;
        self.send(&Command::set_option("Hash", profile.hash_mb)).await?;
        if let Some(skill) = profile.skill_level {
            self.send(&Command::set_option("Skill Level", skill)).await?;
        }
        if let Some(elo) = profile.elo_cap {
            self.send(&Command::set_option("UCI_LimitStrength", true)).await?;
            self.send(&Command::set_option("UCI_Elo", elo)).await?;
        }
        for (name, value) in &profile.options {
            self.send(&Command::set_option(name, value)).await?;
        }
        self.send(&Command::UciNewGame).await?;
        self.await_readyok().await
    }

    async fn search(&mut self, position: &Position, go: GoParams) -> Result<Score, EngineError> {
        self.send(&Command::Position(position.clone())).await?;
        self.send(&Command::Go(go)).await?;
        self.await_score().await
    }

    async fn send(&mut self, command: &Command) -> Result<(), EngineError> {
        let process = self.process.as_mut().ok_or(EngineError::Crashed)?;
        let line = format!("{}\n", command);
        debug!(pid = self.pid, "-> {}", line.trim_end());
        let written = async {
            process.stdin.write_all(line.as_bytes()).await?;
            process.stdin.flush().await
        }
        .await;
        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe => EngineError::Crashed,
            _ => EngineError::Io(e),
        })
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        let process = self.process.as_mut().ok_or(EngineError::Crashed)?;
        match process.lines.next_line().await? {
            Some(line) => {
                debug!(pid = self.pid, "<- {}", line);
                Ok(line)
            }
            None => Err(EngineError::Crashed),
        }
    }
}

#[async_trait]
impl EngineSession for UciEngine {
    async fn configure(&mut self, profile: &StrengthProfile) -> Result<(), EngineError> {
        self.depth_cap = profile.depth_cap;
        let limit = self.timeouts.handshake;
        match tokio::time::timeout(limit, self.apply_profile(profile)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                budget_ms: limit.as_millis() as u64,
            }),
        }
    }

    async fn evaluate(&mut self, position: &Position, budget: Duration) -> Result<f32, EngineError> {
        if self.poisoned {
            return Err(EngineError::Protocol(
                "session abandoned after an earlier timeout".to_string(),
            ));
        }
        let budget_ms = (budget.as_millis() as u64).max(1);

        let go = GoParams {
            movetime: Some(budget_ms),
            depth: self.depth_cap,
        };

        let limit = budget + self.timeouts.response_grace;
        match tokio::time::timeout(limit, self.search(position, go)).await {
            Ok(score) => score.map(to_pawns),
            Err(_) => {
                self.poisoned = true;
                // Best effort; whatever the engine prints next is never read.
                if tokio::time::timeout(self.timeouts.quit, self.send(&Command::Stop))
                    .await
                    .is_err()
                {
                    debug!(pid = self.pid, "stop not accepted");
                }
                Err(EngineError::Timeout { budget_ms })
            }
        }
    }

    async fn stop(&mut self) {
        let Some(Process {
            mut child,
            mut stdin,
            lines,
        }) = self.process.take()
        else {
            return;
        };
        drop(lines);

        let quit = async {
            stdin.write_all(format!("{}\n", Command::Quit).as_bytes()).await?;
            stdin.flush().await
        };
        // A dead or wedged engine never takes the line; kill it straight away.
        let delivered = matches!(
            tokio::time::timeout(self.timeouts.quit, quit).await,
            Ok(Ok(()))
        );
        drop(stdin);
        if !delivered {
            warn!(pid = self.pid, "quit not accepted, killing");
            if let Err(e) = child.kill().await {
                warn!(pid = self.pid, error = %e, "failed to kill engine");
            }
            return;
        }

        match tokio::time::timeout(self.timeouts.quit, child.wait()).await {
            Ok(Ok(status)) => debug!(pid = self.pid, %status, "engine exited"),
            Ok(Err(e)) => {
                warn!(pid = self.pid, error = %e, "waiting on engine failed, killing");
                if let Err(e) = child.kill().await {
                    warn!(pid = self.pid, error = %e, "failed to kill engine");
                }
            }
            Err(_) => {
                warn!(pid = self.pid, "engine ignored quit, killing");
                if let Err(e) = child.kill().await {
                    warn!(pid = self.pid, error = %e, "failed to kill engine");
                }
            }
        }
    }
}
