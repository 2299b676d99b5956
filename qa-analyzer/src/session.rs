//! Per-request session lifecycle.
//!
//! A [`PipelineSession`] is an explicit value object owned by the caller:
//! `start` validates and plans synchronously, then spawns the pipeline task;
//! `cancel` fires the cooperative token; dropping the session cancels
//! whatever is still in flight. No ambient or global mutable state — every
//! session is independent.

use std::sync::Arc;

use qa_analyzer_sdk::cost::ModelRates;
use qa_analyzer_sdk::events::{AnalysisOutcome, ProgressEvent};
use qa_analyzer_sdk::request::AnalysisRequest;
use textgen_client::GenerationBackend;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{self, ProgressSink, EVENT_CHANNEL_CAPACITY};
use crate::planner::{self, PlannerLimits};
use crate::store::{DiscardStore, OutcomeStore};

/// Knobs for one session.
pub struct SessionOptions {
    pub limits: PlannerLimits,
    pub rates: ModelRates,
    pub store: Arc<dyn OutcomeStore>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            limits: PlannerLimits::default(),
            rates: ModelRates::free(),
            store: Arc::new(DiscardStore),
        }
    }
}

/// One running analysis: the cancellation token, the event receiver, and the
/// pipeline task handle.
pub struct PipelineSession {
    id: Uuid,
    cancel: CancellationToken,
    events: mpsc::Receiver<ProgressEvent>,
    task: JoinHandle<Result<AnalysisOutcome, PipelineError>>,
}

impl PipelineSession {
    /// Validate, plan, and launch the pipeline.
    ///
    /// Validation failures return synchronously here; nothing is emitted on
    /// the event stream for an invalid request.
    pub fn start(
        request: AnalysisRequest,
        backend: Arc<dyn GenerationBackend>,
        options: SessionOptions,
    ) -> Result<Self, PipelineError> {
        let plan = planner::plan(&request, &options.limits, options.rates)?;

        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let sink = ProgressSink::new(tx);

        let task = tokio::spawn(pipeline::run(
            request,
            plan,
            backend,
            options.rates,
            options.store,
            sink,
            cancel.clone(),
        ));

        Ok(Self {
            id: Uuid::new_v4(),
            cancel,
            events,
            task,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A clone of the session's cancellation token, for wiring into signal
    /// handlers or host runtimes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next event from the stream; `None` once the stream has closed.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Wait for the pipeline to finish and return its outcome.
    pub async fn join(mut self) -> Result<AnalysisOutcome, PipelineError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(join_error) => Err(PipelineError::fatal("runtime", join_error.to_string())),
        }
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        // Dispose semantics: an abandoned session must not keep calling the
        // backend.
        self.cancel.cancel();
    }
}
