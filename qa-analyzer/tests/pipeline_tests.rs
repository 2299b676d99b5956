//! End-to-end pipeline scenarios against a scripted in-memory backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use qa_analyzer::planner::PlannerLimits;
use qa_analyzer::{PipelineError, PipelineSession, SessionOptions};
use qa_analyzer_sdk::cost::{cost_usd, ModelRates};
use qa_analyzer_sdk::events::{AnalysisOutcome, CallPhase, ProgressEvent, Strategy};
use qa_analyzer_sdk::request::{AnalysisConfig, AnalysisRequest, ProviderConfig, SourceFile};
use textgen_client::{Completion, GenerateError, GenerationBackend, Provider, TokenUsage};

const RESPONSE: &str = "## User Stories\n\n1. As a user, I want to log in.\n2. As an admin, I want audit logs.\n\n## Test Cases\n\n1. Valid login succeeds.\n2. Invalid login fails.\n\n## Acceptance Criteria\n\n- Sessions expire after 30 minutes.\n";

/// What the backend should do on each successive call.
enum Script {
    Ok(&'static str, TokenUsage),
    RateLimited,
    Network,
    Auth,
    Upstream,
    /// Block until the cancellation token fires.
    Hang,
}

struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedBackend {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _model: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GenerateError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("backend called more times than scripted");
        match script {
            Script::Ok(text, usage) => Ok(Completion {
                text: text.to_string(),
                usage,
            }),
            Script::RateLimited => Err(GenerateError::RateLimited),
            Script::Network => Err(GenerateError::Network("connection refused".into())),
            Script::Auth => Err(GenerateError::Auth { status: 401 }),
            Script::Upstream => Err(GenerateError::Upstream {
                status: 500,
                message: "overloaded".into(),
            }),
            Script::Hang => {
                cancel.cancelled().await;
                Err(GenerateError::Cancelled)
            }
        }
    }

    fn provider(&self) -> Provider {
        Provider::Claude
    }
}

fn request_with_files(count: usize, bytes_each: usize) -> AnalysisRequest {
    AnalysisRequest {
        files: (0..count)
            .map(|i| SourceFile::new(format!("src/f{}.rs", i), "x".repeat(bytes_each)))
            .collect(),
        config: AnalysisConfig::default(),
        provider: ProviderConfig {
            provider: Provider::Claude,
            credential: "test-key".into(),
        },
    }
}

/// Limits that put every file in its own batch.
fn one_file_per_batch() -> PlannerLimits {
    PlannerLimits {
        single_pass_limit: 10,
        max_batch_bytes: 100_000,
        max_batch_files: 1,
    }
}

fn rates() -> ModelRates {
    ModelRates::new(3.0, 15.0)
}

fn options(limits: PlannerLimits) -> SessionOptions {
    SessionOptions {
        limits,
        rates: rates(),
        ..SessionOptions::default()
    }
}

async fn run_to_end(
    request: AnalysisRequest,
    scripts: Vec<Script>,
    limits: PlannerLimits,
) -> (Vec<ProgressEvent>, Result<AnalysisOutcome, PipelineError>) {
    let backend = ScriptedBackend::new(scripts);
    let mut session = PipelineSession::start(request, backend, options(limits)).unwrap();
    let mut events = Vec::new();
    while let Some(event) = session.next_event().await {
        events.push(event);
    }
    (events, session.join().await)
}

fn kinds(events: &[ProgressEvent]) -> Vec<&'static str> {
    events.iter().map(ProgressEvent::kind).collect()
}

#[tokio::test]
async fn single_pass_happy_path() {
    let usage = TokenUsage::new(1000, 400);
    let (events, outcome) = run_to_end(
        request_with_files(3, 20),
        vec![Script::Ok(RESPONSE, usage)],
        PlannerLimits::default(),
    )
    .await;

    assert_eq!(
        kinds(&events),
        vec!["plan", "batch_start", "api_call", "batch_done", "complete"]
    );

    match &events[0] {
        ProgressEvent::Plan {
            strategy,
            total_batches,
            total_files,
            ..
        } => {
            assert_eq!(*strategy, Strategy::Single);
            assert_eq!(*total_batches, 1);
            assert_eq!(*total_files, 3);
        }
        other => panic!("expected plan, got {}", other.kind()),
    }

    let outcome = outcome.unwrap();
    assert_eq!(outcome.coverage, 1.0);
    assert_eq!(outcome.files_analyzed, 3);
    assert_eq!(outcome.usage, usage);
    assert!((outcome.actual_cost - cost_usd(usage, rates())).abs() < 1e-6);
    assert!(outcome.sections.user_stories.contains("As a user"));
    assert!(outcome.sections.test_cases.contains("Invalid login fails"));
}

#[tokio::test]
async fn recoverable_failure_skips_one_batch_and_continues() {
    let usage = TokenUsage::new(100, 50);
    let (events, outcome) = run_to_end(
        request_with_files(5, 50),
        vec![
            Script::Ok(RESPONSE, usage),
            Script::Ok(RESPONSE, usage),
            Script::RateLimited,
            Script::Ok(RESPONSE, usage),
            Script::Ok(RESPONSE, usage),
            Script::Ok(RESPONSE, usage), // synthesis
        ],
        one_file_per_batch(),
    )
    .await;

    let error_pos = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::BatchError { index: 2, recoverable: true, .. }))
        .expect("batch 3 must fail recoverably");
    let next_start = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::BatchStart { index: 3, .. }))
        .expect("batch 4 must still start");
    assert!(error_pos < next_start);

    match events
        .iter()
        .find(|e| matches!(e, ProgressEvent::SynthesisStart { .. }))
        .unwrap()
    {
        ProgressEvent::SynthesisStart { batch_count, .. } => assert_eq!(*batch_count, 4),
        _ => unreachable!(),
    }

    let outcome = outcome.unwrap();
    assert!((outcome.coverage - 0.8).abs() < 1e-9);
    assert_eq!(outcome.files_analyzed, 4);
}

#[tokio::test]
async fn all_batches_failing_ends_in_error_without_synthesis() {
    let (events, outcome) = run_to_end(
        request_with_files(2, 50),
        vec![Script::RateLimited, Script::RateLimited],
        one_file_per_batch(),
    )
    .await;

    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::SynthesisStart { .. })));
    assert_eq!(events.last().unwrap().kind(), "error");
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::BatchError { recoverable: true, .. }))
            .count(),
        2
    );
    assert!(matches!(outcome, Err(PipelineError::Fatal { .. })));
}

#[tokio::test]
async fn auth_failure_aborts_remaining_batches() {
    let (events, outcome) = run_to_end(
        request_with_files(3, 50),
        vec![Script::Auth],
        one_file_per_batch(),
    )
    .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::BatchError { index: 0, recoverable: false, .. })));
    assert_eq!(events.last().unwrap().kind(), "error");
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::BatchStart { index: 1, .. })));
    assert!(matches!(outcome, Err(PipelineError::Fatal { .. })));
}

#[tokio::test]
async fn unreachable_backend_on_first_call_is_fatal() {
    let (events, outcome) = run_to_end(
        request_with_files(2, 50),
        vec![Script::Network],
        one_file_per_batch(),
    )
    .await;

    assert_eq!(events.last().unwrap().kind(), "error");
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::BatchStart { index: 1, .. })));
    assert!(matches!(outcome, Err(PipelineError::Fatal { .. })));
}

#[tokio::test]
async fn network_failure_after_a_success_is_recoverable() {
    let usage = TokenUsage::new(100, 50);
    let (events, outcome) = run_to_end(
        request_with_files(2, 50),
        vec![
            Script::Ok(RESPONSE, usage),
            Script::Network,
            Script::Ok(RESPONSE, usage), // synthesis over the one success
        ],
        one_file_per_batch(),
    )
    .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::BatchError { index: 1, recoverable: true, .. })));
    let outcome = outcome.unwrap();
    assert!((outcome.coverage - 0.5).abs() < 1e-9);
    assert_eq!(outcome.files_analyzed, 1);
}

#[tokio::test]
async fn cancellation_mid_batch_emits_exactly_one_terminal_marker() {
    let backend = ScriptedBackend::new(vec![Script::Hang, Script::Hang]);
    let mut session = PipelineSession::start(
        request_with_files(2, 50),
        backend,
        options(one_file_per_batch()),
    )
    .unwrap();

    let mut events = Vec::new();
    while let Some(event) = session.next_event().await {
        // Cancel once the backend call is in flight, i.e. after batch_start
        // and before any batch_done.
        if matches!(event, ProgressEvent::ApiCall { .. }) {
            session.cancel();
        }
        events.push(event);
    }

    assert_eq!(events.last().unwrap().kind(), "cancelled");
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(!events.iter().any(|e| matches!(
        e,
        ProgressEvent::BatchDone { .. }
            | ProgressEvent::BatchError { .. }
            | ProgressEvent::SynthesisStart { .. }
    )));
    assert!(matches!(
        session.join().await,
        Err(PipelineError::Cancelled)
    ));
}

#[tokio::test]
async fn synthesis_failure_falls_back_to_concatenation() {
    let usage = TokenUsage::new(100, 50);
    let (events, outcome) = run_to_end(
        request_with_files(2, 50),
        vec![
            Script::Ok(RESPONSE, usage),
            Script::Ok(RESPONSE, usage),
            Script::Upstream, // synthesis call fails
        ],
        one_file_per_batch(),
    )
    .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::SynthesisStart { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::SynthesisDone { .. })));
    assert_eq!(events.last().unwrap().kind(), "complete");

    let outcome = outcome.unwrap();
    assert_eq!(outcome.coverage, 1.0);
    assert!(outcome.sections.user_stories.contains("## Batch 1"));
    assert!(outcome.sections.user_stories.contains("## Batch 2"));
    // Synthesis never succeeded, so only batch usage is billed.
    assert_eq!(outcome.usage, TokenUsage::new(200, 100));
}

#[tokio::test]
async fn synthesis_runs_for_multi_even_with_one_success() {
    let usage = TokenUsage::new(100, 50);
    let synthesis_usage = TokenUsage::new(60, 30);
    let (events, outcome) = run_to_end(
        request_with_files(2, 50),
        vec![
            Script::RateLimited,
            Script::Ok(RESPONSE, usage),
            Script::Ok(RESPONSE, synthesis_usage),
        ],
        one_file_per_batch(),
    )
    .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::SynthesisStart { batch_count: 1, .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::ApiCall {
            phase: CallPhase::Synthesis,
            batch_index: None,
            ..
        }
    )));
    let outcome = outcome.unwrap();
    assert_eq!(outcome.usage, usage + synthesis_usage);
}

#[tokio::test]
async fn validation_failure_is_synchronous_and_emits_nothing() {
    let backend = ScriptedBackend::new(vec![]);
    let request = AnalysisRequest {
        files: vec![],
        config: AnalysisConfig::default(),
        provider: ProviderConfig {
            provider: Provider::Claude,
            credential: "test-key".into(),
        },
    };
    let result = PipelineSession::start(request, backend, options(PlannerLimits::default()));
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}
