//! The progress event protocol.
//!
//! One [`ProgressEvent`] is emitted per pipeline transition, in strict
//! temporal order, over a single stream. The sequence is the sole channel of
//! truth for any consumer — the reducer in [`crate::state`] folds it into
//! view state without inferring anything from elsewhere. A stream ends with
//! exactly one terminal event: `complete`, `error`, or `cancelled`.

use serde::{Deserialize, Serialize};
use textgen_client::TokenUsage;

/// How the planner decided to process the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Everything fits in one backend call.
    Single,
    /// Size-bounded batches followed by a synthesis pass.
    Multi,
}

/// One planned batch, as announced in the `plan` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedBatch {
    pub index: usize,
    pub files: Vec<String>,
    pub file_count: usize,
    pub size_bytes: usize,
    /// Short human-readable description, e.g. `src/auth.rs … src/db.rs`.
    pub summary: String,
}

/// Which pipeline phase a backend call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Batch,
    Synthesis,
}

/// Rough artifact counts extracted from a batch response, for live UI
/// feedback only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub stories: usize,
    pub tests: usize,
}

/// Generated QA artifacts split into their document sections.
///
/// Section extraction is heuristic: when no recognizable headers exist in the
/// backend's output, the full raw text fills all three sections so nothing is
/// silently dropped. `raw` always carries the unmodified response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub user_stories: String,
    pub test_cases: String,
    pub acceptance_criteria: String,
    pub raw: String,
}

/// The externally visible result of a finished analysis, handed to the
/// persistence collaborator when the `complete` event fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub sections: Sections,
    pub usage: TokenUsage,
    pub actual_cost: f64,
    pub total_duration_ms: u64,
    /// Count of files from successful batches only.
    pub files_analyzed: usize,
    /// Successful batches over planned batches, in `0.0..=1.0`.
    pub coverage: f64,
}

/// One event per pipeline transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Emitted once, after planning, before any batch executes.
    Plan {
        strategy: Strategy,
        total_files: usize,
        total_bytes: usize,
        total_batches: usize,
        estimated_tokens: u64,
        estimated_cost: f64,
        batches: Vec<PlannedBatch>,
    },
    /// A batch is about to build its prompt.
    BatchStart {
        index: usize,
        total: usize,
        files: Vec<String>,
        file_count: usize,
        size_bytes: usize,
    },
    /// Emitted immediately before the backend request, so a client can render
    /// live wait time against `prompt_tokens`.
    ApiCall {
        /// Absent for the synthesis call.
        batch_index: Option<usize>,
        provider: String,
        model: String,
        prompt_bytes: usize,
        prompt_tokens: u64,
        phase: CallPhase,
    },
    /// A batch parsed successfully.
    BatchDone {
        index: usize,
        total: usize,
        usage: TokenUsage,
        duration_ms: u64,
        preview: Preview,
    },
    /// A batch failed. `recoverable` batches do not stop the pipeline.
    BatchError {
        index: usize,
        error: String,
        recoverable: bool,
    },
    /// The synthesis pass is starting (multi strategy only).
    SynthesisStart {
        batch_count: usize,
        total_usage: TokenUsage,
    },
    /// The synthesis call succeeded.
    SynthesisDone { usage: TokenUsage, duration_ms: u64 },
    /// Terminal: the analysis finished and produced an outcome.
    Complete {
        sections: Sections,
        usage: TokenUsage,
        total_duration_ms: u64,
        actual_cost: f64,
        files_analyzed: usize,
        coverage: f64,
    },
    /// Terminal: fatal failure, emitted in place of `complete`.
    Error {
        message: String,
        phase: String,
        recoverable: bool,
    },
    /// Terminal: the cancellation token fired.
    Cancelled,
}

impl ProgressEvent {
    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. } | ProgressEvent::Cancelled
        )
    }

    /// Stable wire name of the variant, as carried in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Plan { .. } => "plan",
            ProgressEvent::BatchStart { .. } => "batch_start",
            ProgressEvent::ApiCall { .. } => "api_call",
            ProgressEvent::BatchDone { .. } => "batch_done",
            ProgressEvent::BatchError { .. } => "batch_error",
            ProgressEvent::SynthesisStart { .. } => "synthesis_start",
            ProgressEvent::SynthesisDone { .. } => "synthesis_done",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Cancelled => "cancelled",
        }
    }
}

impl ProgressEvent {
    /// Build the terminal `complete` event from an outcome.
    pub fn complete_from(outcome: &AnalysisOutcome) -> Self {
        ProgressEvent::Complete {
            sections: outcome.sections.clone(),
            usage: outcome.usage,
            total_duration_ms: outcome.total_duration_ms,
            actual_cost: outcome.actual_cost,
            files_analyzed: outcome.files_analyzed,
            coverage: outcome.coverage,
        }
    }
}
