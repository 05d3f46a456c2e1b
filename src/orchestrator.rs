//! Suspicion rounds.
//!
//! A round scores the base position and every candidate's derived position
//! with a single engine instance, normalizes all scores into the
//! first-player-positive frame, and delivers the outcome to a listener.
//! `submit` runs the round on its own Tokio task; `evaluate` is the round
//! body for callers that want to await it directly.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{EvaluatorConfig, StrengthProfile};
use crate::derive::{derive_positions, DerivedPosition};
use crate::engine::{EngineLauncher, EngineSession, UciLauncher, UciTimeouts};
use crate::error::EvaluationError;
use crate::flag::SuspicionFlag;
use crate::listener::{CandidateScore, EvaluationListener, EvaluationResult};
use crate::position::{Candidate, ParticipantId, Position, Side};
use crate::rules::{Rules, ChessRules};
use crate::score::normalize;

/// Input of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Participant under scrutiny; their flag gates the round.
    pub subject: ParticipantId,
    pub base: Position,
    pub candidates: Vec<Candidate>,
    /// Budget for each individual engine evaluation.
    pub time_budget_ms: u64,
    pub strength: StrengthProfile,
}

impl EvaluationRequest {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    /// Checks the request's shape. Candidate lists may be empty.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.time_budget_ms == 0 {
            return Err(invalid("time budget must be positive"));
        }
        if self.base.fen().is_empty() {
            return Err(invalid("base position is empty"));
        }
        if self.subject.as_str().is_empty() {
            return Err(invalid("subject participant id is empty"));
        }
        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if candidate.participant.as_str().is_empty() {
                return Err(invalid("candidate with empty participant id"));
            }
            if !seen.insert(&candidate.participant) {
                return Err(EvaluationError::InvalidRequest(format!(
                    "duplicate candidate '{}'",
                    candidate.participant
                )));
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> EvaluationError {
    EvaluationError::InvalidRequest(reason.to_string())
}

/// Runs suspicion rounds against an engine executable.
#[derive(Clone)]
pub struct SuspicionOrchestrator {
    launcher: Arc<dyn EngineLauncher>,
    rules: Arc<dyn Rules>,
    engine_path: PathBuf,
}

impl SuspicionOrchestrator {
    pub fn new(
        launcher: Arc<dyn EngineLauncher>,
        rules: Arc<dyn Rules>,
        engine_path: impl Into<PathBuf>,
    ) -> Self {
        SuspicionOrchestrator {
            launcher,
            rules,
            engine_path: engine_path.into(),
        }
    }

    /// UCI subprocess engine with standard chess rules.
    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self::new(
            Arc::new(UciLauncher::new(UciTimeouts::from(config))),
            Arc::new(ChessRules::new()),
            config.engine_path.clone(),
        )
    }

    /// Accepts a round and runs it on a background task.
    ///
    /// Invalid requests and subjects whose flag is already set are rejected
    /// here and never reach the listener. Once accepted, the listener
    /// receives exactly one outcome, after the engine is stopped and the
    /// subject's flag is cleared. Must be called within a Tokio runtime.
    pub fn submit(
        &self,
        request: EvaluationRequest,
        flag: &SuspicionFlag,
        listener: Arc<dyn EvaluationListener>,
    ) -> Result<JoinHandle<()>, EvaluationError> {
        self.base_side(&request)?;
        let guard = flag
            .try_acquire()
            .ok_or_else(|| EvaluationError::AlreadyInFlight(request.subject.clone()))?;

        let orchestrator = self.clone();
        let span = info_span!("round", subject = %request.subject);
        let task = async move {
            let outcome = orchestrator.evaluate(&request).await;
            drop(guard);
            match outcome {
                Ok(result) => listener.on_result(result),
                Err(e) => listener.on_failure(e),
            }
        };
        Ok(tokio::spawn(task.instrument(span)))
    }

    /// Runs one round to completion on the current task.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvaluationError> {
        let base_side = self.base_side(request)?;

        let derivation = derive_positions(self.rules.as_ref(), &request.base, &request.candidates);
        for (participant, e) in &derivation.excluded {
            warn!(%participant, error = %e, "candidate excluded");
        }

        let mut engine = self.launcher.start(&self.engine_path).await?;
        let scored = score_round(engine.as_mut(), request, base_side, &derivation.positions).await;
        engine.stop().await;

        match &scored {
            Ok(result) => info!(
                baseline = result.baseline,
                candidates = result.per_candidate.len(),
                "round complete"
            ),
            Err(e) => warn!(error = %e, "round failed"),
        }
        scored
    }

    /// Validates `request` and returns the side to move in its base.
    fn base_side(&self, request: &EvaluationRequest) -> Result<Side, EvaluationError> {
        request.validate()?;
        self.rules
            .side_to_move(&request.base)
            .map_err(|e| EvaluationError::InvalidRequest(e.to_string()))
    }
}

/// Scores the base and each derived position with one configured engine.
///
/// Failures before the baseline is known abort the round. After that, the
/// first failing candidate and every candidate after it get `None`; the
/// engine is not queried again once it has failed.
async fn score_round(
    engine: &mut dyn EngineSession,
    request: &EvaluationRequest,
    base_side: Side,
    positions: &[DerivedPosition],
) -> Result<EvaluationResult, EvaluationError> {
    let budget = request.time_budget();
    engine.configure(&request.strength).await?;

    let baseline = normalize(engine.evaluate(&request.base, budget).await?, base_side);

    // Every derived position has the other side to move.
    let candidate_side = base_side.opposite();
    let mut per_candidate = Vec::with_capacity(positions.len());
    let mut engine_failed = false;

    for derived in positions {
        let score = if engine_failed {
            None
        } else {
            match engine.evaluate(&derived.position, budget).await {
                Ok(raw) => Some(normalize(raw, candidate_side)),
                Err(e) => {
                    warn!(
                        participant = %derived.participant,
                        error = %e,
                        "candidate scoring failed, remaining candidates skipped"
                    );
                    engine_failed = true;
                    None
                }
            }
        };
        per_candidate.push(CandidateScore {
            participant: derived.participant.clone(),
            score,
        });
    }

    Ok(EvaluationResult {
        baseline,
        per_candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::listener::RoundOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const WHITE_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const BLACK_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

    #[derive(Debug, Clone, Copy)]
    enum Reply {
        Raw(f32),
        Timeout,
        Crash,
    }

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
        evaluations: AtomicUsize,
    }

    struct MockLauncher {
        replies: Vec<Reply>,
        fail_launch: bool,
        fail_configure: bool,
        counters: Arc<Counters>,
    }

    impl MockLauncher {
        fn new(replies: Vec<Reply>) -> Self {
            MockLauncher {
                replies,
                fail_launch: false,
                fail_configure: false,
                counters: Arc::new(Counters::default()),
            }
        }
    }

    struct MockSession {
        replies: VecDeque<Reply>,
        fail_configure: bool,
        stopped: bool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl EngineLauncher for MockLauncher {
        async fn start(&self, path: &Path) -> Result<Box<dyn EngineSession>, EngineError> {
            if self.fail_launch {
                return Err(EngineError::Launch {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                replies: self.replies.iter().copied().collect(),
                fail_configure: self.fail_configure,
                stopped: false,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    #[async_trait]
    impl EngineSession for MockSession {
        async fn configure(&mut self, _profile: &StrengthProfile) -> Result<(), EngineError> {
            if self.fail_configure {
                return Err(EngineError::Crashed);
            }
            Ok(())
        }

        async fn evaluate(&mut self, _position: &Position, budget: Duration) -> Result<f32, EngineError> {
            self.counters.evaluations.fetch_add(1, Ordering::SeqCst);
            match self.replies.pop_front().unwrap_or(Reply::Raw(0.0)) {
                Reply::Raw(v) => Ok(v),
                Reply::Timeout => Err(EngineError::Timeout {
                    budget_ms: budget.as_millis() as u64,
                }),
                Reply::Crash => Err(EngineError::Crashed),
            }
        }

        async fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.counters.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        outcomes: Mutex<Vec<RoundOutcome>>,
    }

    impl EvaluationListener for RecordingListener {
        fn on_result(&self, result: EvaluationResult) {
            self.outcomes.lock().unwrap().push(Ok(result));
        }

        fn on_failure(&self, error: EvaluationError) {
            self.outcomes.lock().unwrap().push(Err(error));
        }
    }

    fn orchestrator(launcher: MockLauncher) -> (SuspicionOrchestrator, Arc<Counters>) {
        let counters = Arc::clone(&launcher.counters);
        let orch = SuspicionOrchestrator::new(
            Arc::new(launcher),
            Arc::new(ChessRules::new()),
            "/opt/engine",
        );
        (orch, counters)
    }

    fn request(fen: &str, candidates: Vec<Candidate>) -> EvaluationRequest {
        EvaluationRequest {
            subject: ParticipantId::new("suspect"),
            base: Position::from_fen(fen),
            candidates,
            time_budget_ms: 100,
            strength: StrengthProfile::with_elo(1500),
        }
    }

    fn scores(result: &EvaluationResult) -> Vec<(&str, Option<f32>)> {
        result
            .per_candidate
            .iter()
            .map(|c| (c.participant.as_str(), c.score))
            .collect()
    }

    #[tokio::test]
    async fn empty_candidates_give_baseline_only() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![Reply::Raw(0.4)]));
        let result = orch.evaluate(&request(WHITE_FEN, vec![])).await.unwrap();
        assert_eq!(result.baseline, 0.4);
        assert!(result.per_candidate.is_empty());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn baseline_with_second_player_to_move_is_negated() {
        let (orch, _) = orchestrator(MockLauncher::new(vec![Reply::Raw(120.0)]));
        let result = orch.evaluate(&request(BLACK_FEN, vec![])).await.unwrap();
        assert_eq!(result.baseline, -120.0);
    }

    #[tokio::test]
    async fn baseline_with_first_player_to_move_is_unchanged() {
        let (orch, _) = orchestrator(MockLauncher::new(vec![Reply::Raw(120.0)]));
        let result = orch.evaluate(&request(WHITE_FEN, vec![])).await.unwrap();
        assert_eq!(result.baseline, 120.0);
    }

    #[tokio::test]
    async fn candidates_share_the_baseline_frame() {
        let (orch, _) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(10.0),
            Reply::Raw(-50.0),
            Reply::Raw(30.0),
        ]));
        let req = request(
            WHITE_FEN,
            vec![
                Candidate::new("alice", Some("e2e4")),
                Candidate::new("bob", Some("d2d4")),
            ],
        );
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(result.baseline, 10.0);
        assert_eq!(scores(&result), vec![("alice", Some(50.0)), ("bob", Some(-30.0))]);
    }

    #[tokio::test]
    async fn candidates_with_second_player_base_keep_sign() {
        let (orch, _) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.5),
            Reply::Raw(0.2),
        ]));
        let req = request(BLACK_FEN, vec![Candidate::new("alice", Some("e7e5"))]);
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(result.baseline, -0.5);
        assert_eq!(scores(&result), vec![("alice", Some(0.2))]);
    }

    #[tokio::test]
    async fn order_preserved_and_moveless_candidates_skipped() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.0),
            Reply::Raw(1.0),
            Reply::Raw(2.0),
            Reply::Raw(3.0),
        ]));
        let req = request(
            WHITE_FEN,
            vec![
                Candidate::new("carol", Some("g1f3")),
                Candidate::new("alice", None),
                Candidate::new("dave", Some("e2e4")),
                Candidate::new("bob", Some("c2c4")),
            ],
        );
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(
            scores(&result),
            vec![
                ("carol", Some(-1.0)),
                ("dave", Some(-2.0)),
                ("bob", Some(-3.0)),
            ]
        );
        assert_eq!(counters.evaluations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn illegal_candidates_are_excluded() {
        let (orch, _) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.0),
            Reply::Raw(0.7),
        ]));
        let req = request(
            WHITE_FEN,
            vec![
                Candidate::new("alice", Some("castle!")),
                Candidate::new("bob", Some("e2e4")),
            ],
        );
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(scores(&result), vec![("bob", Some(-0.7))]);
    }

    #[tokio::test]
    async fn baseline_failure_fails_round_and_stops_engine() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![Reply::Timeout]));
        let req = request(WHITE_FEN, vec![Candidate::new("alice", Some("e2e4"))]);
        let err = orch.evaluate(&req).await.unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Engine(EngineError::Timeout { budget_ms: 100 })
        ));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(counters.evaluations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configure_failure_still_stops_engine() {
        let mut launcher = MockLauncher::new(vec![]);
        launcher.fail_configure = true;
        let (orch, counters) = orchestrator(launcher);
        let err = orch.evaluate(&request(WHITE_FEN, vec![])).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Engine(EngineError::Crashed)));
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(counters.evaluations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn candidate_failure_marks_remaining_missing() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.1),
            Reply::Raw(1.0),
            Reply::Crash,
            Reply::Raw(5.0),
        ]));
        let req = request(
            WHITE_FEN,
            vec![
                Candidate::new("alice", Some("e2e4")),
                Candidate::new("bob", Some("d2d4")),
                Candidate::new("carol", Some("c2c4")),
            ],
        );
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(result.baseline, 0.1);
        assert_eq!(
            scores(&result),
            vec![("alice", Some(-1.0)), ("bob", None), ("carol", None)]
        );
        assert_eq!(counters.evaluations.load(Ordering::SeqCst), 3);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let mut launcher = MockLauncher::new(vec![]);
        launcher.fail_launch = true;
        let (orch, counters) = orchestrator(launcher);
        let err = orch.evaluate(&request(WHITE_FEN, vec![])).await.unwrap_err();
        assert!(err.is_launch_failure());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_delivers_once_and_clears_flag() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![Reply::Raw(0.3)]));
        let flag = SuspicionFlag::new();
        let listener = Arc::new(RecordingListener::default());

        let handle = orch
            .submit(request(WHITE_FEN, vec![]), &flag, listener.clone())
            .unwrap();
        handle.await.unwrap();

        assert!(!flag.is_set());
        let outcomes = listener.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Ok(r) if r.baseline == 0.3));
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_failure_delivers_once_and_clears_flag() {
        let mut launcher = MockLauncher::new(vec![]);
        launcher.fail_launch = true;
        let (orch, _) = orchestrator(launcher);
        let flag = SuspicionFlag::new();
        let listener = Arc::new(RecordingListener::default());

        orch.submit(request(WHITE_FEN, vec![]), &flag, listener.clone())
            .unwrap()
            .await
            .unwrap();

        assert!(!flag.is_set());
        let outcomes = listener.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Err(e) if e.is_launch_failure()));
    }

    #[tokio::test]
    async fn submit_rejects_subject_already_in_flight() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![]));
        let flag = SuspicionFlag::new();
        let _held = flag.try_acquire().unwrap();
        let listener = Arc::new(RecordingListener::default());

        let err = orch
            .submit(request(WHITE_FEN, vec![]), &flag, listener.clone())
            .unwrap_err();
        assert!(matches!(err, EvaluationError::AlreadyInFlight(p) if p.as_str() == "suspect"));
        assert!(listener.outcomes.lock().unwrap().is_empty());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_request_without_touching_flag() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![]));
        let flag = SuspicionFlag::new();
        let listener = Arc::new(RecordingListener::default());
        let mut req = request(WHITE_FEN, vec![]);
        req.time_budget_ms = 0;

        let err = orch.submit(req, &flag, listener.clone()).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidRequest(_)));
        assert!(!flag.is_set());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_base_position_is_invalid() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![]));
        let err = orch
            .evaluate(&request("not a fen", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidRequest(_)));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn garbage_base_fen_is_rejected_at_submit() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![]));
        let flag = SuspicionFlag::new();
        let listener = Arc::new(RecordingListener::default());

        let err = orch
            .submit(request("hello w", vec![]), &flag, listener.clone())
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidRequest(_)), "got {:?}", err);
        assert!(!flag.is_set());
        assert!(listener.outcomes.lock().unwrap().is_empty());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn move_for_the_wrong_side_is_excluded_not_scored() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.2),
            Reply::Raw(0.6),
        ]));
        let req = request(
            WHITE_FEN,
            vec![
                Candidate::new("alice", Some("e7e5")),
                Candidate::new("bob", Some("e2e5")),
                Candidate::new("carol", Some("d2d4")),
            ],
        );
        let result = orch.evaluate(&req).await.unwrap();
        assert_eq!(scores(&result), vec![("carol", Some(-0.6))]);
        assert_eq!(counters.evaluations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn validate_rejects_duplicates_and_blanks() {
        let dup = request(
            WHITE_FEN,
            vec![
                Candidate::new("alice", Some("e2e4")),
                Candidate::new("alice", Some("d2d4")),
            ],
        );
        assert!(matches!(dup.validate(), Err(EvaluationError::InvalidRequest(_))));

        let blank = request(WHITE_FEN, vec![Candidate::new("", Some("e2e4"))]);
        assert!(blank.validate().is_err());

        let empty_base = request("", vec![]);
        assert!(empty_base.validate().is_err());

        assert!(request(WHITE_FEN, vec![]).validate().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_rounds_each_own_an_engine() {
        let (orch, counters) = orchestrator(MockLauncher::new(vec![
            Reply::Raw(0.0),
            Reply::Raw(1.0),
        ]));
        let listener = Arc::new(RecordingListener::default());
        let flags: Vec<SuspicionFlag> = (0..8).map(|_| SuspicionFlag::new()).collect();

        let mut handles = Vec::new();
        for (i, flag) in flags.iter().enumerate() {
            let mut req = request(WHITE_FEN, vec![Candidate::new("alice", Some("e2e4"))]);
            req.subject = ParticipantId::new(format!("p{}", i));
            handles.push(orch.submit(req, flag, listener.clone()).unwrap());
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(listener.outcomes.lock().unwrap().len(), 8);
        assert_eq!(counters.starts.load(Ordering::SeqCst), 8);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 8);
        assert!(flags.iter().all(|f| !f.is_set()));
    }
}
