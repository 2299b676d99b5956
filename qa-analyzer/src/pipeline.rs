//! The linear analysis pipeline.
//!
//! One pipeline per request: plan → batches (sequential) → synthesis (multi
//! only) → outcome. Backend calls are the only suspension points. All
//! progress flows through [`ProgressSink`] as ordered [`ProgressEvent`]s;
//! the sink guarantees that at most one terminal event reaches the stream.

use std::sync::Arc;
use std::time::Instant;

use qa_analyzer_sdk::cost::{cost_usd, ModelRates};
use qa_analyzer_sdk::events::{AnalysisOutcome, ProgressEvent, Sections, Strategy};
use qa_analyzer_sdk::request::AnalysisRequest;
use textgen_client::{GenerationBackend, TokenUsage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::executor::{execute_batch, BatchOutcome, BatchSuccess};
use crate::planner::Plan;
use crate::store::OutcomeStore;
use crate::synthesis::{run_synthesis, SynthesisOutcome};

/// Bound on buffered events per session. Consumers that fall behind apply
/// backpressure to the pipeline rather than growing memory.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Serializer for the event stream. Holds no decision-making power: it
/// forwards events in emission order and drops everything after the first
/// terminal event so a noisy caller cannot corrupt the protocol.
pub(crate) struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    terminal_sent: bool,
}

impl ProgressSink {
    pub(crate) fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            terminal_sent: false,
        }
    }

    pub(crate) async fn emit(&mut self, event: ProgressEvent) {
        if self.terminal_sent {
            return;
        }
        if event.is_terminal() {
            self.terminal_sent = true;
        }
        if self.tx.send(event).await.is_err() {
            tracing::debug!("event receiver dropped, discarding event");
        }
    }
}

/// Run the pipeline to completion, cancellation, or fatal error.
pub(crate) async fn run(
    request: AnalysisRequest,
    plan: Plan,
    backend: Arc<dyn GenerationBackend>,
    rates: ModelRates,
    store: Arc<dyn OutcomeStore>,
    mut sink: ProgressSink,
    cancel: CancellationToken,
) -> Result<AnalysisOutcome, PipelineError> {
    let started = Instant::now();
    let total_batches = plan.batches.len();

    sink.emit(plan.to_event()).await;

    let mut successes: Vec<BatchSuccess> = Vec::new();
    let mut usage = TokenUsage::default();

    for spec in &plan.batches {
        if cancel.is_cancelled() {
            sink.emit(ProgressEvent::Cancelled).await;
            return Err(PipelineError::Cancelled);
        }

        let outcome = execute_batch(
            spec,
            total_batches,
            plan.strategy,
            &request,
            backend.as_ref(),
            &mut sink,
            &cancel,
        )
        .await;

        match outcome {
            BatchOutcome::Done(success) => {
                usage.add(success.usage);
                successes.push(success);
            }
            BatchOutcome::Cancelled => {
                sink.emit(ProgressEvent::Cancelled).await;
                return Err(PipelineError::Cancelled);
            }
            BatchOutcome::Failed { error } => {
                // Invalid credentials always abort; an unreachable backend
                // aborts only when nothing has succeeded yet (the first
                // call), otherwise it is scoped to this batch.
                let fatal =
                    error.is_auth() || (successes.is_empty() && spec.index == 0 && error.is_network());
                sink.emit(ProgressEvent::BatchError {
                    index: spec.index,
                    error: error.to_string(),
                    recoverable: !fatal,
                })
                .await;
                if fatal {
                    let message = error.to_string();
                    sink.emit(ProgressEvent::Error {
                        message: message.clone(),
                        phase: "batch".to_string(),
                        recoverable: false,
                    })
                    .await;
                    return Err(PipelineError::fatal("batch", message));
                }
            }
        }
    }

    if successes.is_empty() {
        let message = format!("all {} batches failed", total_batches);
        sink.emit(ProgressEvent::Error {
            message: message.clone(),
            phase: "batch".to_string(),
            recoverable: false,
        })
        .await;
        return Err(PipelineError::fatal("batch", message));
    }

    let sections: Sections = if plan.strategy == Strategy::Multi {
        if cancel.is_cancelled() {
            sink.emit(ProgressEvent::Cancelled).await;
            return Err(PipelineError::Cancelled);
        }
        match run_synthesis(
            &successes,
            usage,
            &request,
            backend.as_ref(),
            &mut sink,
            &cancel,
        )
        .await
        {
            SynthesisOutcome::Merged {
                sections,
                usage: synthesis_usage,
                ..
            } => {
                usage.add(synthesis_usage);
                sections
            }
            SynthesisOutcome::FellBack { sections } => sections,
            SynthesisOutcome::Cancelled => {
                sink.emit(ProgressEvent::Cancelled).await;
                return Err(PipelineError::Cancelled);
            }
        }
    } else {
        successes[0].sections.clone()
    };

    let outcome = AnalysisOutcome {
        sections,
        usage,
        actual_cost: cost_usd(usage, rates),
        total_duration_ms: started.elapsed().as_millis() as u64,
        files_analyzed: successes.iter().map(|s| s.file_count).sum(),
        coverage: successes.len() as f64 / total_batches as f64,
    };

    sink.emit(ProgressEvent::complete_from(&outcome)).await;

    if let Err(error) = store.save(&outcome).await {
        tracing::warn!(%error, "persistence handoff failed");
    }

    Ok(outcome)
}
