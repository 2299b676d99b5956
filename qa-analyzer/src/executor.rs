//! Batch execution: one batch prompt, one backend call, one parsed result.
//!
//! Batches run strictly sequentially so cumulative token and cost counters
//! stay meaningful and a provider rate limit is never multiplied across
//! concurrent calls. Classification of failures (recoverable vs fatal) is
//! the pipeline's job; this module reports what happened.

use std::time::Instant;

use qa_analyzer_sdk::cost::estimate_tokens;
use qa_analyzer_sdk::events::{CallPhase, ProgressEvent, Sections, Strategy};
use qa_analyzer_sdk::request::AnalysisRequest;
use textgen_client::{GenerateError, GenerationBackend, TokenUsage};
use tokio_util::sync::CancellationToken;

use crate::pipeline::ProgressSink;
use crate::planner::BatchSpec;
use crate::prompt;
use crate::sections::{parse_sections, preview_counts};

/// A batch that produced parsed output.
#[derive(Debug, Clone)]
pub(crate) struct BatchSuccess {
    pub index: usize,
    pub sections: Sections,
    pub usage: TokenUsage,
    pub duration_ms: u64,
    pub file_count: usize,
}

/// What happened to one batch.
pub(crate) enum BatchOutcome {
    Done(BatchSuccess),
    Failed { error: GenerateError },
    Cancelled,
}

/// Execute one batch against the backend, emitting its lifecycle events.
pub(crate) async fn execute_batch(
    spec: &BatchSpec,
    total_batches: usize,
    strategy: Strategy,
    request: &AnalysisRequest,
    backend: &dyn GenerationBackend,
    sink: &mut ProgressSink,
    cancel: &CancellationToken,
) -> BatchOutcome {
    sink.emit(ProgressEvent::BatchStart {
        index: spec.index,
        total: total_batches,
        files: spec.file_names(),
        file_count: spec.files.len(),
        size_bytes: spec.total_bytes,
    })
    .await;

    let prompt = match strategy {
        Strategy::Single => prompt::build_analysis_prompt(&spec.files, &request.config),
        Strategy::Multi => prompt::build_batch_prompt(
            &spec.files,
            &request.config,
            spec.index,
            total_batches,
            &spec.summary,
        ),
    };

    sink.emit(ProgressEvent::ApiCall {
        batch_index: Some(spec.index),
        provider: request.provider.provider.as_str().to_string(),
        model: request.config.model.clone(),
        prompt_bytes: prompt.len(),
        prompt_tokens: estimate_tokens(prompt.len()),
        phase: CallPhase::Batch,
    })
    .await;

    let started = Instant::now();
    let completion = backend
        .generate(&prompt, &request.config.model, cancel)
        .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match completion {
        Ok(completion) => {
            let sections = parse_sections(&completion.text);
            let preview = preview_counts(&sections);
            sink.emit(ProgressEvent::BatchDone {
                index: spec.index,
                total: total_batches,
                usage: completion.usage,
                duration_ms,
                preview,
            })
            .await;
            BatchOutcome::Done(BatchSuccess {
                index: spec.index,
                sections,
                usage: completion.usage,
                duration_ms,
                file_count: spec.files.len(),
            })
        }
        Err(error) if error.is_cancelled() => BatchOutcome::Cancelled,
        Err(error) => {
            tracing::warn!(batch = spec.index, %error, "batch call failed");
            BatchOutcome::Failed { error }
        }
    }
}
