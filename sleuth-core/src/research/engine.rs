//! Research engine: drives one session through its mode's phases.
//!
//! Each `run_phase` call works on a copy of the active state: the phase's
//! capability runs, the sequencer picks the next phase, the copy is
//! persisted, and only then does it replace the active state. Any failure
//! leaves the active state exactly as it was, so the same phase can be
//! retried.

use super::capabilities::{Capabilities, CapabilityResult, SourceAssessment};
use super::sequencer::{PhaseSequencer, Transition};
use super::sources::Source;
use super::state::{ResearchMode, ResearchPhase, ResearchState};
use super::store::{SessionSummary, StatePersistence};
use crate::config::{ResearchConfig, SleuthConfig};
use crate::error::{CapabilityError, ConfigError, ResearchError, Result};
use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback trait for research progress updates.
pub trait ResearchCallback: Send + Sync {
    /// Called before a phase's capability runs.
    fn on_phase_start(&self, phase: ResearchPhase);
    /// Called after a phase has been applied and persisted.
    fn on_phase_complete(&self, phase: ResearchPhase, next: ResearchPhase, elapsed: Duration);
    /// Called when an ultradeep session loops from REFINE back to RETRIEVE.
    fn on_loop_back(&self, cycle: u32, cap: u32);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_phase_start(&self, _phase: ResearchPhase) {}
    fn on_phase_complete(&self, _phase: ResearchPhase, _next: ResearchPhase, _elapsed: Duration) {}
    fn on_loop_back(&self, _cycle: u32, _cap: u32) {}
}

/// The research orchestrator. Owns at most one active session.
pub struct ResearchEngine {
    config: ResearchConfig,
    persistence: StatePersistence,
    output_dir: PathBuf,
    state: Option<ResearchState>,
    state_path: Option<PathBuf>,
    cancellation: CancellationToken,
    callback: Arc<dyn ResearchCallback>,
}

impl ResearchEngine {
    /// Create an engine writing session files under `output_dir`.
    ///
    /// The directory is created if it does not exist.
    pub fn new(
        config: ResearchConfig,
        persistence: StatePersistence,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| ConfigError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        Ok(Self {
            config,
            persistence,
            output_dir,
            state: None,
            state_path: None,
            cancellation: CancellationToken::new(),
            callback: Arc::new(NoOpResearchCallback),
        })
    }

    /// Create an engine from a loaded configuration, resolving the output directory.
    pub fn from_config(config: &SleuthConfig) -> Result<Self> {
        config.ensure_valid()?;
        let output_dir = config
            .research
            .resolve_output_dir()
            .ok_or(ConfigError::NoOutputDir)?;
        let persistence = StatePersistence::from_config(&config.persistence);
        Self::new(config.research.clone(), persistence, output_dir)
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn mode(&self) -> ResearchMode {
        self.config.mode
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Sequencer for a mode, carrying the configured ultradeep iteration cap.
    pub fn sequencer(&self, mode: ResearchMode) -> PhaseSequencer {
        PhaseSequencer::new(mode, self.config.ultradeep_iteration_cap)
    }

    /// Start a new session in the configured mode, saved under the output directory.
    pub fn initialize_research(&mut self, query: impl Into<String>) -> &ResearchState {
        let state = ResearchState::new(query, self.config.mode);
        let file = format!("{}.json", state.session_id().unwrap_or("session"));
        let path = self.output_dir.join(file);
        self.activate(state, path)
    }

    /// Start a new session whose state file lives at `path`.
    pub fn initialize_research_at(
        &mut self,
        query: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> &ResearchState {
        let state = ResearchState::new(query, self.config.mode);
        self.activate(state, path.into())
    }

    /// Load a persisted session and make it the active one.
    pub fn resume(&mut self, path: impl AsRef<Path>) -> Result<&ResearchState> {
        let path = path.as_ref();
        let state = self.persistence.load(path)?;
        info!(
            path = %path.display(),
            phase = %state.phase(),
            sources = state.sources().len(),
            "Resumed research session"
        );
        Ok(self.activate(state, path.to_path_buf()))
    }

    fn activate(&mut self, state: ResearchState, path: PathBuf) -> &ResearchState {
        if let Some(previous) = self.state.take() {
            debug!(query = previous.query(), "Releasing previous research session");
        }
        if self.cancellation.is_cancelled() {
            self.cancellation = CancellationToken::new();
        }
        info!(
            query = state.query(),
            mode = %state.mode(),
            path = %path.display(),
            "Research session active"
        );
        self.state_path = Some(path);
        self.state.insert(state)
    }

    /// The active session, if any.
    pub fn state(&self) -> Option<&ResearchState> {
        self.state.as_ref()
    }

    /// Where the active session is persisted.
    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Release the active session, returning its final state.
    pub fn teardown(&mut self) -> Option<ResearchState> {
        self.state_path = None;
        self.state.take()
    }

    /// Token that interrupts persistence backoff waits for this engine.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Saved sessions in the output directory, newest first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.persistence.list_sessions(&self.output_dir)
    }

    /// Execute `phase` for the active session and advance it.
    ///
    /// Returns the phase the session is at afterwards. Fails without touching
    /// the active state if `phase` is not the current phase, if the
    /// capability fails, or if the new state cannot be persisted.
    pub async fn run_phase(
        &mut self,
        phase: ResearchPhase,
        capabilities: &Capabilities,
    ) -> Result<ResearchPhase> {
        let current = self.state.as_ref().ok_or(ResearchError::NoActiveSession)?;
        if current.is_complete() {
            return Err(ResearchError::InvalidTransition {
                from: current.phase().to_string(),
            });
        }
        if phase != current.phase() {
            return Err(ResearchError::PhaseMismatch {
                expected: current.phase().to_string(),
                requested: phase.to_string(),
            });
        }
        let sequencer = self.sequencer(current.mode());
        sequencer.ensure_contains(phase)?;
        let path = self
            .state_path
            .clone()
            .ok_or(ResearchError::NoActiveSession)?;

        let mut next = current.clone();
        self.callback.on_phase_start(phase);
        info!(phase = %phase, mode = %next.mode(), "Running research phase");
        let started = Instant::now();

        if let Err(e) = execute_phase(&mut next, phase, capabilities).await {
            warn!(phase = %phase, error = %e, "Research phase failed");
            return Err(e);
        }

        let transition = if sequencer.is_terminal(phase) {
            None
        } else {
            Some(sequencer.next_phase(phase, next.refine_cycles())?)
        };
        let elapsed = started.elapsed();
        record_phase(&mut next, phase, elapsed, transition);

        self.persistence
            .save(&next, &path, &self.cancellation)
            .await?;

        let new_phase = next.phase();
        let cycles = next.refine_cycles();
        self.state = Some(next);

        if let Some(Transition::LoopBack(_)) = transition {
            info!(cycle = cycles, cap = sequencer.iteration_cap(), "Looping back for another research cycle");
            self.callback.on_loop_back(cycles, sequencer.iteration_cap());
        }
        info!(
            phase = %phase,
            next = %new_phase,
            elapsed_ms = elapsed.as_millis() as u64,
            "Research phase complete"
        );
        self.callback.on_phase_complete(phase, new_phase, elapsed);
        Ok(new_phase)
    }

    /// Run phases until the active session has a report.
    pub async fn run_to_completion(
        &mut self,
        capabilities: &Capabilities,
    ) -> Result<&ResearchState> {
        loop {
            let state = self.state.as_ref().ok_or(ResearchError::NoActiveSession)?;
            if state.is_complete() {
                break;
            }
            let phase = state.phase();
            self.run_phase(phase, capabilities).await?;
        }
        self.state.as_ref().ok_or(ResearchError::NoActiveSession)
    }
}

/// Invoke the capability for `phase` and apply its output to `state`.
async fn execute_phase(
    state: &mut ResearchState,
    phase: ResearchPhase,
    caps: &Capabilities,
) -> Result<()> {
    let fail = move |source: CapabilityError| ResearchError::PhaseExecution {
        phase: phase.to_string(),
        source,
    };

    match phase {
        ResearchPhase::Scope => {
            let scope = caps.scoper.scope(state.query()).await.map_err(fail)?;
            state.set_scope(scope);
        }
        ResearchPhase::Plan => {
            let plan = caps
                .planner
                .plan(state.query(), state.scope())
                .await
                .map_err(fail)?;
            state.set_plan(plan);
        }
        ResearchPhase::Retrieve => {
            let items = caps
                .retriever
                .retrieve(state.query(), state.scope(), state.plan())
                .await
                .map_err(fail)?;
            let sources = items
                .into_iter()
                .map(Source::from_evidence)
                .collect::<Result<Vec<_>>>()?;
            debug!(retrieved = sources.len(), total = state.sources().len() + sources.len(), "Retrieved sources");
            state.append_sources(sources);
        }
        ResearchPhase::Triangulate => {
            let outcome = caps
                .triangulator
                .triangulate(state.sources(), state.findings())
                .await
                .map_err(fail)?;
            validate_assessments(&outcome.assessments, state.sources().len()).map_err(fail)?;
            let sources = state.sources_mut();
            for a in &outcome.assessments {
                sources[a.index].apply_assessment(a.credibility_score, a.verification_status);
            }
            debug!(
                assessed = outcome.assessments.len(),
                findings = outcome.findings.len(),
                "Triangulated sources"
            );
            state.append_findings(outcome.findings);
        }
        ResearchPhase::Synthesize => {
            let synthesis = caps
                .synthesizer
                .synthesize(state.findings(), state.sources())
                .await
                .map_err(fail)?;
            state.set_synthesis(synthesis);
        }
        ResearchPhase::Critique => {
            let critique = caps
                .critic
                .critique(state.synthesis(), state.findings())
                .await
                .map_err(fail)?;
            state.set_critique(critique);
        }
        ResearchPhase::Refine => {
            let refined = caps
                .synthesizer
                .refine(
                    state.synthesis(),
                    state.critique(),
                    state.findings(),
                    state.sources(),
                )
                .await
                .map_err(fail)?;
            state.set_synthesis(refined);
        }
        ResearchPhase::Package => {
            let report = caps
                .packager
                .package(state.synthesis(), state.sources(), state.critique())
                .await
                .map_err(fail)?;
            if report.trim().is_empty() {
                return Err(fail(CapabilityError::InvalidOutput {
                    message: "packager returned an empty report".to_string(),
                }));
            }
            state.set_report(report);
        }
    }
    Ok(())
}

fn validate_assessments(assessments: &[SourceAssessment], source_count: usize) -> CapabilityResult<()> {
    for a in assessments {
        if a.index >= source_count {
            return Err(CapabilityError::InvalidOutput {
                message: format!(
                    "assessment for source {} but only {source_count} sources exist",
                    a.index
                ),
            });
        }
        if !(0.0..=1.0).contains(&a.credibility_score) {
            return Err(CapabilityError::InvalidOutput {
                message: format!(
                    "credibility score {} for source {} is outside 0.0-1.0",
                    a.credibility_score, a.index
                ),
            });
        }
    }
    Ok(())
}

/// Stamp timings and counts into metadata and move to the next phase.
fn record_phase(
    state: &mut ResearchState,
    phase: ResearchPhase,
    elapsed: Duration,
    transition: Option<Transition>,
) {
    let source_count = state.sources().len();
    let finding_count = state.findings().len();
    let cycles = state.refine_cycles();
    let now = Utc::now().to_rfc3339();

    let meta = state.metadata_mut();
    let timings = meta
        .entry("phase_timings_ms")
        .or_insert_with(|| json!({}));
    if let Some(timings) = timings.as_object_mut() {
        let previous = timings
            .get(phase.as_str())
            .and_then(Value::as_u64)
            .unwrap_or(0);
        timings.insert(
            phase.as_str().to_string(),
            json!(previous + elapsed.as_millis() as u64),
        );
    }
    meta.insert("source_count".into(), json!(source_count));
    meta.insert("finding_count".into(), json!(finding_count));
    meta.insert("updated_at".into(), json!(now));

    match transition {
        Some(Transition::LoopBack(next)) => {
            meta.insert("refine_cycles".into(), json!(cycles + 1));
            state.set_phase(next);
        }
        Some(Transition::Advance(next)) => state.set_phase(next),
        None => {
            meta.insert("completed_at".into(), json!(now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::error::PersistenceError;
    use crate::persistence::StorageBackend;
    use crate::research::capabilities::{Retriever, Triangulator, TriangulationOutcome};
    use crate::research::sources::{RawEvidence, VerificationStatus};
    use crate::research::state::Document;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedRetriever(Vec<RawEvidence>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _scope: &Document,
            _plan: &Document,
        ) -> CapabilityResult<Vec<RawEvidence>> {
            Ok(self.0.clone())
        }
    }

    struct OutOfRangeTriangulator;

    #[async_trait]
    impl Triangulator for OutOfRangeTriangulator {
        async fn triangulate(
            &self,
            sources: &[Source],
            _findings: &[Document],
        ) -> CapabilityResult<TriangulationOutcome> {
            Ok(TriangulationOutcome {
                assessments: vec![SourceAssessment {
                    index: sources.len(),
                    credibility_score: 0.5,
                    verification_status: VerificationStatus::Verified,
                }],
                findings: vec![],
            })
        }
    }

    /// Scores every source with the same credibility.
    struct FixedScoreTriangulator(f64);

    #[async_trait]
    impl Triangulator for FixedScoreTriangulator {
        async fn triangulate(
            &self,
            sources: &[Source],
            _findings: &[Document],
        ) -> CapabilityResult<TriangulationOutcome> {
            Ok(TriangulationOutcome {
                assessments: (0..sources.len())
                    .map(|index| SourceAssessment {
                        index,
                        credibility_score: self.0,
                        verification_status: VerificationStatus::Conflicted,
                    })
                    .collect(),
                findings: vec![],
            })
        }
    }

    /// Rejects every write.
    struct ReadOnlyBackend;

    impl StorageBackend for ReadOnlyBackend {
        fn write(&self, _path: &Path, _data: &[u8]) -> io::Result<()> {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only volume",
            ))
        }

        fn read(&self, _path: &Path) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::NotFound, "nothing stored"))
        }

        fn list(&self, _dir: &Path) -> io::Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl ResearchCallback for RecordingCallback {
        fn on_phase_start(&self, phase: ResearchPhase) {
            self.events.lock().unwrap().push(format!("start:{phase}"));
        }
        fn on_phase_complete(&self, phase: ResearchPhase, next: ResearchPhase, _: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{phase}->{next}"));
        }
        fn on_loop_back(&self, cycle: u32, cap: u32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("loop:{cycle}/{cap}"));
        }
    }

    fn make_engine(dir: &TempDir, mode: ResearchMode) -> ResearchEngine {
        let config = ResearchConfig {
            mode,
            ultradeep_iteration_cap: 1,
            output_dir: None,
        };
        ResearchEngine::new(
            config,
            StatePersistence::from_config(&PersistenceConfig::default()),
            dir.path().join("out"),
        )
        .unwrap()
    }

    fn caps() -> Capabilities {
        Capabilities::new(Arc::new(FixedRetriever(vec![
            RawEvidence::new(
                "https://a.org/x",
                "Borrow checker",
                "The borrow checker enforces ownership rules at compile time",
            )
            .with_source_type("documentation"),
            RawEvidence::new(
                "https://b.org/y",
                "Borrow checker",
                "Ownership rules are enforced by the borrow checker at compile time",
            ),
        ])))
    }

    #[test]
    fn test_new_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let engine = make_engine(&dir, ResearchMode::Quick);
        assert!(engine.output_dir().is_dir());
        assert!(engine.state().is_none());
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let mut config = SleuthConfig::default();
        config.research.output_dir = Some(dir.path().join("cfg-out"));
        assert!(ResearchEngine::from_config(&config).is_ok());

        config.persistence.max_attempts = 0;
        assert!(matches!(
            ResearchEngine::from_config(&config),
            Err(ResearchError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_initialize_research() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Deep);
        let state = engine.initialize_research("What is prompt caching?");
        assert_eq!(state.phase(), ResearchPhase::Scope);
        assert_eq!(state.mode(), ResearchMode::Deep);
        let id = state.session_id().unwrap().to_string();
        assert_eq!(
            engine.state_path().unwrap(),
            engine.output_dir().join(format!("{id}.json"))
        );
    }

    #[tokio::test]
    async fn test_run_phase_without_session() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Quick);
        assert!(matches!(
            engine.run_phase(ResearchPhase::Scope, &caps()).await,
            Err(ResearchError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_standard_pipeline_end_to_end() {
        let dir = TempDir::new().unwrap();
        let callback = Arc::new(RecordingCallback::default());
        let mut engine = make_engine(&dir, ResearchMode::Standard).with_callback(callback.clone());
        engine.initialize_research("How does Rust enforce memory safety?");

        let state = engine.run_to_completion(&caps()).await.unwrap();
        assert!(state.is_complete());
        assert_eq!(state.sources().len(), 2);
        assert!(
            state
                .sources()
                .iter()
                .all(|s| s.verification_status() == VerificationStatus::Verified)
        );
        assert_eq!(state.findings().len(), 1);
        assert!(state.report().contains("## References"));
        assert!(state.metadata().contains_key("completed_at"));
        assert_eq!(state.metadata()["source_count"], 2);

        let events = callback.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("start:scope"));
        assert_eq!(
            events.last().map(String::as_str),
            Some("done:package->package")
        );
        assert_eq!(events.len(), 12);
    }

    #[tokio::test]
    async fn test_each_phase_is_persisted() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Quick);
        engine.initialize_research("q");
        let path = engine.state_path().unwrap().to_path_buf();
        assert!(!path.exists());

        engine
            .run_phase(ResearchPhase::Scope, &caps())
            .await
            .unwrap();
        let on_disk = StatePersistence::from_config(&PersistenceConfig::default())
            .load(&path)
            .unwrap();
        assert_eq!(&on_disk, engine.state().unwrap());
        assert_eq!(on_disk.phase(), ResearchPhase::Retrieve);
    }

    #[tokio::test]
    async fn test_invalid_assessment_rejected() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Standard);
        engine.initialize_research("q");
        let caps = caps().with_triangulator(Arc::new(OutOfRangeTriangulator));
        for phase in [
            ResearchPhase::Scope,
            ResearchPhase::Plan,
            ResearchPhase::Retrieve,
        ] {
            engine.run_phase(phase, &caps).await.unwrap();
        }
        let before = engine.state().unwrap().clone();

        let err = engine
            .run_phase(ResearchPhase::Triangulate, &caps)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResearchError::PhaseExecution {
                source: CapabilityError::InvalidOutput { .. },
                ..
            }
        ));
        assert_eq!(engine.state().unwrap(), &before);
    }

    #[tokio::test]
    async fn test_unknown_source_type_aborts_retrieve() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Quick);
        engine.initialize_research("q");
        let caps = Capabilities::new(Arc::new(FixedRetriever(vec![
            RawEvidence::new("https://a.org", "A", "s").with_source_type("podcast"),
        ])));
        engine.run_phase(ResearchPhase::Scope, &caps).await.unwrap();

        let err = engine
            .run_phase(ResearchPhase::Retrieve, &caps)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidEnumValue { .. }));
        assert_eq!(engine.state().unwrap().phase(), ResearchPhase::Retrieve);
        assert!(engine.state().unwrap().sources().is_empty());
    }

    #[tokio::test]
    async fn test_ultradeep_loops_and_records_cycles() {
        let dir = TempDir::new().unwrap();
        let callback = Arc::new(RecordingCallback::default());
        let mut engine =
            make_engine(&dir, ResearchMode::UltraDeep).with_callback(callback.clone());
        engine.initialize_research("q");

        let state = engine.run_to_completion(&caps()).await.unwrap();
        assert_eq!(state.refine_cycles(), 1);
        // Each cycle re-retrieves the same two items.
        assert_eq!(state.sources().len(), 4);
        assert_eq!(state.synthesis()["revision"], 1);
        assert!(
            callback
                .events
                .lock()
                .unwrap()
                .contains(&"loop:1/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_resume_continues_from_saved_phase() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Quick);
        engine.initialize_research("resumable");
        engine
            .run_phase(ResearchPhase::Scope, &caps())
            .await
            .unwrap();
        let path = engine.state_path().unwrap().to_path_buf();
        let saved = engine.teardown().unwrap();
        assert!(engine.state().is_none());

        let mut fresh = make_engine(&dir, ResearchMode::Quick);
        let resumed = fresh.resume(&path).unwrap();
        assert_eq!(resumed, &saved);
        fresh.run_to_completion(&caps()).await.unwrap();
        assert!(fresh.state().unwrap().is_complete());
        assert_eq!(fresh.list_sessions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_pre_phase_state() {
        let dir = TempDir::new().unwrap();
        let config = ResearchConfig {
            mode: ResearchMode::Quick,
            ..Default::default()
        };
        let persistence =
            StatePersistence::new(Arc::new(ReadOnlyBackend), &PersistenceConfig::default());
        let mut engine = ResearchEngine::new(config, persistence, dir.path()).unwrap();
        engine.initialize_research("q");
        let before = engine.state().unwrap().clone();

        let err = engine
            .run_phase(ResearchPhase::Scope, &caps())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResearchError::Persistence(PersistenceError::SaveFailed { attempts: 3, .. })
        ));
        assert_eq!(engine.state().unwrap(), &before);
        assert_eq!(engine.state().unwrap().phase(), ResearchPhase::Scope);
    }

    #[tokio::test]
    async fn test_resume_keeps_exact_credibility() {
        let dir = TempDir::new().unwrap();
        let mut engine = make_engine(&dir, ResearchMode::Standard);
        engine.initialize_research("q");
        let caps = caps().with_triangulator(Arc::new(FixedScoreTriangulator(0.9856906946328695)));
        for phase in [
            ResearchPhase::Scope,
            ResearchPhase::Plan,
            ResearchPhase::Retrieve,
            ResearchPhase::Triangulate,
        ] {
            engine.run_phase(phase, &caps).await.unwrap();
        }
        let path = engine.state_path().unwrap().to_path_buf();

        let mut fresh = make_engine(&dir, ResearchMode::Standard);
        let resumed = fresh.resume(&path).unwrap();
        assert_eq!(resumed.sources()[0].credibility_score(), 0.9856906946328695);
        assert_eq!(resumed, engine.state().unwrap());
    }

    #[test]
    fn test_record_phase_accumulates_timings() {
        let mut state = ResearchState::new("q", ResearchMode::UltraDeep);
        state.set_phase(ResearchPhase::Refine);
        record_phase(
            &mut state,
            ResearchPhase::Refine,
            Duration::from_millis(5),
            Some(Transition::LoopBack(ResearchPhase::Retrieve)),
        );
        state.set_phase(ResearchPhase::Refine);
        record_phase(
            &mut state,
            ResearchPhase::Refine,
            Duration::from_millis(7),
            Some(Transition::Advance(ResearchPhase::Package)),
        );
        assert_eq!(state.metadata()["phase_timings_ms"]["refine"], 12);
        assert_eq!(state.refine_cycles(), 1);
        assert_eq!(state.phase(), ResearchPhase::Package);
    }
}
