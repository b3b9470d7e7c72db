//! Entry point for collaborators: owns the shared results and the two
//! session slots, runs the pipelines, and turns their outcomes into events.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::ai::CompletionGateway;
use crate::capture::{EvidenceSource, Screenshot};
use crate::error::{Error, Result};
use crate::events::{Notifier, ProcessingEvent};
use crate::pipeline::{cancellable, debug, extract, solve};
use crate::problem::{ProblemInfo, RefinedResult, Solution};
use crate::session::{
    AppState, RunOutcome, SessionKind, SessionManager, SessionStatus, SessionTicket, View,
};

pub const PRIMARY_CANCELLED: &str = "Processing was canceled by the user.";
pub const DEBUG_CANCELLED: &str = "Extra processing was canceled by the user.";
pub const AUDIO_CANCELLED: &str = "Audio processing was canceled by the user.";
pub const UNAUTHORIZED: &str = "Authentication required";

pub struct Orchestrator {
    gateway: Arc<dyn CompletionGateway>,
    evidence: Arc<dyn EvidenceSource>,
    notifier: Arc<dyn Notifier>,
    // Lock order: sessions before state. Neither is held across an await.
    sessions: Mutex<SessionManager>,
    state: Mutex<AppState>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        evidence: Arc<dyn EvidenceSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            evidence,
            notifier,
            sessions: Mutex::new(SessionManager::new()),
            state: Mutex::new(AppState::default()),
        }
    }

    pub fn view(&self) -> View {
        self.state.lock().view
    }

    pub fn set_view(&self, view: View) {
        self.state.lock().view = view;
    }

    pub fn problem_info(&self) -> Option<ProblemInfo> {
        self.state.lock().problem_info.clone()
    }

    pub fn set_problem_info(&self, problem_info: Option<ProblemInfo>) {
        self.state.lock().problem_info = problem_info;
    }

    pub fn solution(&self) -> Option<Solution> {
        self.state.lock().solution.clone()
    }

    pub fn refined(&self) -> Option<RefinedResult> {
        self.state.lock().refined.clone()
    }

    /// Snapshot of everything shared.
    pub fn state(&self) -> AppState {
        self.state.lock().clone()
    }

    /// Drop queued evidence and every extracted result.
    pub fn clear_queues(&self) {
        self.evidence.clear_queues();
        self.state.lock().reset();
    }

    pub fn session_status(&self, kind: SessionKind) -> SessionStatus {
        self.sessions.lock().status(kind)
    }

    pub fn last_outcome(&self, kind: SessionKind) -> Option<RunOutcome> {
        self.sessions.lock().last_outcome(kind)
    }

    pub fn cancel_all(&self) {
        log::info!("Cancelling all sessions");
        self.sessions.lock().cancel_all();
    }

    /// What the capture shortcut does: solve from the queue view, debug
    /// from the solutions view.
    pub async fn process_screenshots(&self) -> Result<()> {
        match self.view() {
            View::Queue => self.run_primary_pipeline().await.map(|_| ()),
            View::Solutions => self.run_debug_pipeline().await.map(|_| ()),
        }
    }

    /// Extract a problem from the primary queue and solve it.
    pub async fn run_primary_pipeline(&self) -> Result<Solution> {
        let screenshots = match self.evidence.queued_screenshots().await {
            Ok(screenshots) => screenshots,
            Err(e) => return Err(self.report(e, ProcessingEvent::SolutionError)),
        };
        if screenshots.is_empty() {
            log::info!("No screenshots to process");
            self.notifier.emit(ProcessingEvent::NoScreenshots);
            return Err(Error::Precondition("No screenshots to process".to_string()));
        }

        let ticket = self.sessions.lock().begin(SessionKind::Primary);
        self.notifier.emit(ProcessingEvent::InitialStart);
        self.set_view(View::Solutions);

        let result = self.primary_run(&screenshots, &ticket).await;
        self.settle(&ticket, result, PRIMARY_CANCELLED, ProcessingEvent::SolutionError)
    }

    /// Refine the current result with the primary queue followed by the
    /// extra queue.
    pub async fn run_debug_pipeline(&self) -> Result<RefinedResult> {
        let extra = match self.evidence.extra_queued_screenshots().await {
            Ok(extra) => extra,
            Err(e) => return Err(self.report(e, ProcessingEvent::DebugError)),
        };
        if extra.is_empty() {
            log::info!("No extra screenshots to process");
            self.notifier.emit(ProcessingEvent::NoScreenshots);
            return Err(Error::Precondition(
                "No extra screenshots to process".to_string(),
            ));
        }
        let mut screenshots = match self.evidence.queued_screenshots().await {
            Ok(screenshots) => screenshots,
            Err(e) => return Err(self.report(e, ProcessingEvent::DebugError)),
        };
        screenshots.extend(extra);

        let ticket = self.sessions.lock().begin(SessionKind::Debug);
        self.notifier.emit(ProcessingEvent::DebugStart);

        let result = self.debug_run(&screenshots, &ticket).await;
        self.settle(&ticket, result, DEBUG_CANCELLED, ProcessingEvent::DebugError)
    }

    /// Solve a question spoken in the audio file at `path`.
    pub async fn process_audio(&self, path: &Path) -> Result<Solution> {
        let ticket = self.sessions.lock().begin(SessionKind::Primary);
        self.notifier.emit(ProcessingEvent::InitialStart);
        self.set_view(View::Solutions);

        let result = self.audio_run(path, &ticket).await;
        self.settle(&ticket, result, AUDIO_CANCELLED, ProcessingEvent::SolutionError)
    }

    async fn primary_run(&self, screenshots: &[Screenshot], ticket: &SessionTicket) -> Result<Solution> {
        let problem =
            extract::extract_from_screenshots(&*self.gateway, screenshots, &ticket.token).await?;
        self.publish_problem(ticket, &problem)?;
        self.solve_and_publish(ticket, &problem).await
    }

    async fn audio_run(&self, path: &Path, ticket: &SessionTicket) -> Result<Solution> {
        let audio = cancellable(&ticket.token, self.evidence.audio_file(path)).await?;
        let problem = extract::extract_from_audio(&*self.gateway, &audio, &ticket.token).await?;
        self.publish_problem(ticket, &problem)?;
        self.solve_and_publish(ticket, &problem).await
    }

    async fn debug_run(&self, screenshots: &[Screenshot], ticket: &SessionTicket) -> Result<RefinedResult> {
        let (problem, prior) = {
            let state = self.state.lock();
            (state.problem_info.clone(), state.solution.clone())
        };

        let refined = debug::refine(
            &*self.gateway,
            problem.as_ref(),
            prior.as_ref(),
            screenshots,
            &ticket.token,
        )
        .await?;

        self.publish(ticket, |state| {
            match &refined {
                RefinedResult::LeetcodeProblem(report) => {
                    state.solution =
                        Some(Solution::LeetcodeProblem(report.improved_solution.clone()));
                }
                RefinedResult::TechnicalRequirement(requirement) => {
                    state.problem_info =
                        Some(ProblemInfo::TechnicalRequirement(requirement.clone()));
                }
            }
            state.refined = Some(refined.clone());
            state.has_debugged = true;
        })?;
        self.notifier
            .emit(ProcessingEvent::DebugSuccess(refined.clone()));
        Ok(refined)
    }

    fn publish_problem(&self, ticket: &SessionTicket, problem: &ProblemInfo) -> Result<()> {
        self.publish(ticket, |state| {
            state.problem_info = Some(problem.clone());
            state.solution = None;
            state.refined = None;
            state.has_debugged = false;
        })?;
        self.notifier
            .emit(ProcessingEvent::ProblemExtracted(problem.clone()));
        Ok(())
    }

    async fn solve_and_publish(&self, ticket: &SessionTicket, problem: &ProblemInfo) -> Result<Solution> {
        let solution = solve::generate(&*self.gateway, problem, &ticket.token).await?;
        self.publish(ticket, |state| state.solution = Some(solution.clone()))?;
        self.notifier
            .emit(ProcessingEvent::SolutionSuccess(solution.clone()));
        Ok(solution)
    }

    /// Apply `update` only while `ticket` is still the live run of its kind.
    fn publish(&self, ticket: &SessionTicket, update: impl FnOnce(&mut AppState)) -> Result<()> {
        let sessions = self.sessions.lock();
        if ticket.is_cancelled() || !sessions.is_current(ticket) {
            log::debug!("Dropping result of superseded run {}", ticket.run_id);
            return Err(Error::Cancelled);
        }
        update(&mut self.state.lock());
        Ok(())
    }

    /// Release the session and tell the presentation layer how the run ended.
    fn settle<T>(
        &self,
        ticket: &SessionTicket,
        result: Result<T>,
        cancelled_notice: &str,
        error_event: fn(String) -> ProcessingEvent,
    ) -> Result<T> {
        // A cancelled run can still fail in other ways while unwinding
        let result = match result {
            Err(e) if !e.is_auth() && ticket.is_cancelled() => {
                log::debug!("Run {} ended after cancellation: {}", ticket.run_id, e);
                Err(Error::Cancelled)
            }
            other => other,
        };

        match &result {
            Ok(_) => {
                self.sessions.lock().finish(ticket, RunOutcome::Completed);
            }
            Err(e) if e.is_auth() => {
                self.sessions.lock().finish(ticket, RunOutcome::Failed);
                self.reset_after_unauthorized();
            }
            Err(e) if e.is_cancelled() => {
                self.sessions.lock().finish(ticket, RunOutcome::Cancelled);
                log::info!("{:?} run {} cancelled", ticket.kind, ticket.run_id);
                self.notifier.emit(error_event(cancelled_notice.to_string()));
            }
            Err(e) => {
                self.sessions.lock().finish(ticket, RunOutcome::Failed);
                log::error!("{:?} run {} failed: {}", ticket.kind, ticket.run_id, e);
                self.notifier.emit(error_event(e.to_string()));
            }
        }
        result
    }

    /// Surface a failure that happened before any session started.
    fn report(&self, e: Error, error_event: fn(String) -> ProcessingEvent) -> Error {
        log::error!("Could not read evidence: {}", e);
        self.notifier.emit(error_event(e.to_string()));
        e
    }

    fn reset_after_unauthorized(&self) {
        log::warn!("Credentials rejected; resetting all sessions and state");
        self.sessions.lock().cancel_all();
        self.evidence.clear_queues();
        self.state.lock().reset();
        self.notifier.emit(ProcessingEvent::ResetView);
        self.notifier
            .emit(ProcessingEvent::Unauthorized(UNAUTHORIZED.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelNotifier;
    use crate::pipeline::testing::{text, Call, Reply, ScriptedGateway};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tokio::sync::mpsc::UnboundedReceiver;

    const CODING_PROBLEM: &str =
        r#"{"type":"leetcode_problem","problem_statement":"Find max subarray sum","test_cases":[]}"#;
    const CODE_SOLUTION: &str = r#"{"solution":{"explanation":"Kadane","complexity":{"time":"O(n)","space":"O(1)"},"code":{"javascript":"function f() {}","python":"def f(): pass"}}}"#;

    #[derive(Default)]
    struct MemoryEvidence {
        primary: Mutex<Vec<Screenshot>>,
        extra: Mutex<Vec<Screenshot>>,
        audio: Mutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl MemoryEvidence {
        fn with_screenshots(primary: &[&str], extra: &[&str]) -> Arc<Self> {
            let shots = |names: &[&str]| {
                names
                    .iter()
                    .map(|name| Screenshot {
                        path: PathBuf::from(name),
                        bytes: name.as_bytes().to_vec(),
                    })
                    .collect::<Vec<_>>()
            };
            Arc::new(Self {
                primary: Mutex::new(shots(primary)),
                extra: Mutex::new(shots(extra)),
                ..Self::default()
            })
        }
    }

    #[async_trait]
    impl EvidenceSource for MemoryEvidence {
        async fn queued_screenshots(&self) -> Result<Vec<Screenshot>> {
            Ok(self.primary.lock().clone())
        }

        async fn extra_queued_screenshots(&self) -> Result<Vec<Screenshot>> {
            Ok(self.extra.lock().clone())
        }

        async fn audio_file(&self, path: &Path) -> Result<Vec<u8>> {
            self.audio.lock().get(path).cloned().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Audio file not found: {}", path.display()),
                ))
            })
        }

        fn clear_queues(&self) {
            self.primary.lock().clear();
            self.extra.lock().clear();
        }
    }

    fn orchestrator(
        gateway: Arc<ScriptedGateway>,
        evidence: Arc<MemoryEvidence>,
    ) -> (Orchestrator, UnboundedReceiver<ProcessingEvent>) {
        let (notifier, rx) = ChannelNotifier::new();
        (Orchestrator::new(gateway, evidence, Arc::new(notifier)), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ProcessingEvent>) -> Vec<ProcessingEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(events: &[ProcessingEvent]) -> Vec<&'static str> {
        events.iter().map(ProcessingEvent::name).collect()
    }

    #[tokio::test]
    async fn primary_pipeline_publishes_problem_then_solution() {
        let gateway = Arc::new(ScriptedGateway::new([text(CODING_PROBLEM), text(CODE_SOLUTION)]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png", "b.png"], &[]);
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        orch.process_screenshots().await.unwrap();

        assert_eq!(
            names(&drain(&mut rx)),
            vec!["initial-start", "problem-extracted", "solution-success"]
        );
        assert_eq!(orch.view(), View::Solutions);
        assert_eq!(orch.problem_info().unwrap().type_name(), "leetcode_problem");
        assert!(matches!(orch.solution(), Some(Solution::LeetcodeProblem(_))));
        assert_eq!(orch.session_status(SessionKind::Primary), SessionStatus::Idle);
        assert_eq!(
            orch.last_outcome(SessionKind::Primary),
            Some(RunOutcome::Completed)
        );
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_queue_emits_no_screenshots() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (orch, mut rx) = orchestrator(gateway.clone(), MemoryEvidence::with_screenshots(&[], &[]));

        let err = orch.run_primary_pipeline().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(drain(&mut rx), vec![ProcessingEvent::NoScreenshots]);
        assert_eq!(orch.view(), View::Queue);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn second_primary_run_supersedes_the_first() {
        let gateway = Arc::new(ScriptedGateway::new([
            Reply::Hang,
            text(CODING_PROBLEM),
            text(CODE_SOLUTION),
        ]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &[]);
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        let first = orch.run_primary_pipeline();
        let second = async {
            gateway.entered.notified().await;
            orch.run_primary_pipeline().await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.unwrap_err().is_cancelled());
        let solution = second.unwrap();
        assert_eq!(orch.solution(), Some(solution));

        let events = drain(&mut rx);
        assert!(events.contains(&ProcessingEvent::SolutionError(
            PRIMARY_CANCELLED.to_string()
        )));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ProcessingEvent::SolutionSuccess(_)))
                .count(),
            1
        );
        assert_eq!(orch.session_status(SessionKind::Primary), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn auth_failure_during_extraction_resets_everything() {
        let gateway = Arc::new(ScriptedGateway::new([Reply::Fail(Error::Auth(
            "invalid api key".into(),
        ))]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &["b.png"]);
        let (orch, mut rx) = orchestrator(gateway, evidence.clone());

        let err = orch.run_primary_pipeline().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(orch.problem_info(), None);
        assert_eq!(orch.view(), View::Queue);
        assert!(evidence.primary.lock().is_empty());
        assert!(evidence.extra.lock().is_empty());

        let events = drain(&mut rx);
        assert_eq!(
            &events[events.len() - 2..],
            &[
                ProcessingEvent::ResetView,
                ProcessingEvent::Unauthorized(UNAUTHORIZED.to_string())
            ]
        );
    }

    #[tokio::test]
    async fn auth_failure_during_solving_clears_the_published_problem() {
        let gateway = Arc::new(ScriptedGateway::new([
            text(CODING_PROBLEM),
            Reply::Fail(Error::Auth("expired".into())),
        ]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &[]);
        let (orch, mut rx) = orchestrator(gateway, evidence);

        assert!(orch.run_primary_pipeline().await.unwrap_err().is_auth());
        assert_eq!(orch.problem_info(), None);
        assert_eq!(orch.solution(), None);
        assert_eq!(orch.view(), View::Queue);
        assert!(names(&drain(&mut rx)).ends_with(&["reset-view", "unauthorized"]));
    }

    #[tokio::test]
    async fn auth_failure_cancels_the_other_kind_too() {
        let gateway = Arc::new(ScriptedGateway::new([
            Reply::Hang,
            Reply::Fail(Error::Auth("revoked".into())),
        ]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &["err.png"]);
        let (orch, _rx) = orchestrator(gateway.clone(), evidence);
        orch.set_problem_info(Some(
            ProblemInfo::from_value(&serde_json::json!({"type": "leetcode_problem"})).unwrap(),
        ));

        let debug_run = orch.run_debug_pipeline();
        let primary_run = async {
            gateway.entered.notified().await;
            orch.run_primary_pipeline().await
        };
        let (debug_result, primary_result) = tokio::join!(debug_run, primary_run);

        assert!(primary_result.unwrap_err().is_auth());
        assert!(debug_result.unwrap_err().is_cancelled());
        assert_eq!(orch.session_status(SessionKind::Debug), SessionStatus::Idle);
        assert_eq!(orch.problem_info(), None);
    }

    #[tokio::test]
    async fn debug_without_problem_fails_before_any_call() {
        let gateway = Arc::new(ScriptedGateway::default());
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &["b.png"]);
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        let err = orch.run_debug_pipeline().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(names(&drain(&mut rx)), vec!["debug-start", "debug-error"]);
    }

    #[tokio::test]
    async fn debug_uses_both_queues_and_replaces_the_solution() {
        let gateway = Arc::new(ScriptedGateway::new([
            text(CODING_PROBLEM),
            text(CODE_SOLUTION),
            text(r#"{"debug_analysis":"Empty input","improved_solution":{"explanation":"Guard","code":{"python":"def f(): return 0"}}}"#),
        ]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &["err.png"]);
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        orch.process_screenshots().await.unwrap();
        orch.process_screenshots().await.unwrap();

        let Some(Solution::LeetcodeProblem(code)) = orch.solution() else {
            panic!("expected a code solution");
        };
        assert_eq!(code.primary_code(), "def f(): return 0");
        assert_eq!(code.code["javascript"], "function f() {}");
        assert!(orch.state().has_debugged);
        assert!(orch.refined().is_some());

        match &gateway.calls()[2] {
            Call::Vision { images, .. } => {
                assert_eq!(images, &vec![b"a.png".to_vec(), b"err.png".to_vec()]);
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(
            names(&drain(&mut rx))[3..],
            ["debug-start", "debug-success"]
        );
    }

    #[tokio::test]
    async fn empty_extra_queue_emits_no_screenshots() {
        let gateway = Arc::new(ScriptedGateway::default());
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &[]);
        let (orch, mut rx) = orchestrator(gateway, evidence);

        assert!(orch.run_debug_pipeline().await.is_err());
        assert_eq!(drain(&mut rx), vec![ProcessingEvent::NoScreenshots]);
    }

    #[tokio::test]
    async fn audio_pipeline_runs_the_three_stage_chain() {
        let gateway = Arc::new(ScriptedGateway::new([
            text("find the largest sum of a contiguous subarray"),
            text("A coding problem: maximum subarray."),
            text(CODING_PROBLEM),
            text(CODE_SOLUTION),
        ]));
        let evidence = MemoryEvidence::with_screenshots(&[], &[]);
        evidence
            .audio
            .lock()
            .insert(PathBuf::from("clip.webm"), b"webm-bytes".to_vec());
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        orch.process_audio(Path::new("clip.webm")).await.unwrap();

        assert_eq!(gateway.calls()[0], Call::Transcribe { bytes: 10 });
        assert_eq!(
            names(&drain(&mut rx)),
            vec!["initial-start", "problem-extracted", "solution-success"]
        );
    }

    #[tokio::test]
    async fn missing_audio_file_surfaces_as_solution_error() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (orch, mut rx) = orchestrator(gateway.clone(), MemoryEvidence::with_screenshots(&[], &[]));

        let err = orch.process_audio(Path::new("gone.webm")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(gateway.call_count(), 0);

        let events = drain(&mut rx);
        match events.last() {
            Some(ProcessingEvent::SolutionError(message)) => {
                assert!(message.contains("Audio file not found: gone.webm"))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancel_all_reports_cancellation_not_failure() {
        let gateway = Arc::new(ScriptedGateway::new([Reply::Hang]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &[]);
        let (orch, mut rx) = orchestrator(gateway.clone(), evidence);

        let run = orch.run_primary_pipeline();
        let cancel = async {
            gateway.entered.notified().await;
            orch.cancel_all();
        };
        let (result, _) = tokio::join!(run, cancel);

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(
            drain(&mut rx).last(),
            Some(&ProcessingEvent::SolutionError(PRIMARY_CANCELLED.to_string()))
        );
        assert_eq!(
            orch.last_outcome(SessionKind::Primary),
            Some(RunOutcome::Cancelled)
        );
    }

    #[tokio::test]
    async fn clear_queues_resets_state_and_view() {
        let gateway = Arc::new(ScriptedGateway::new([text(CODING_PROBLEM), text(CODE_SOLUTION)]));
        let evidence = MemoryEvidence::with_screenshots(&["a.png"], &["b.png"]);
        let (orch, _rx) = orchestrator(gateway, evidence.clone());
        orch.run_primary_pipeline().await.unwrap();

        orch.clear_queues();
        assert_eq!(orch.view(), View::Queue);
        assert!(orch.solution().is_none());
        assert!(evidence.extra.lock().is_empty());
    }
}
