//! Client-side state reducer.
//!
//! [`ProgressState::apply`] is a deterministic fold over the event stream:
//! the same sequence of events always produces the same state, which makes
//! the reducer unit-testable without a live backend. It owns its view state
//! exclusively and infers nothing from outside the stream. Once a terminal
//! status is reached, further events are ignored — a noisy transport cannot
//! corrupt a finished view.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use textgen_client::TokenUsage;

use crate::events::{CallPhase, Preview, ProgressEvent, Sections, Strategy};

/// Overall analysis status as seen by a client.
///
/// `Analyzing` covers the whole batch-execution phase regardless of batch
/// count; per-batch detail lives in [`ProgressState::batches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Idle,
    Connecting,
    Planning,
    Analyzing,
    Synthesizing,
    Complete,
    Error,
    Cancelled,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Complete | AnalysisStatus::Error | AnalysisStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Idle => "idle",
            AnalysisStatus::Connecting => "connecting",
            AnalysisStatus::Planning => "planning",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Synthesizing => "synthesizing",
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::Error => "error",
            AnalysisStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-batch lifecycle. Transitions are monotonic:
/// `Pending → Active → CallingBackend → Done | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Active,
    CallingBackend,
    Done,
    Error,
}

/// View of one batch, indexed to match plan order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    pub status: BatchStatus,
    pub file_count: usize,
    pub size_bytes: usize,
    pub usage: TokenUsage,
    pub duration_ms: u64,
    pub preview: Preview,
    pub error: Option<String>,
}

impl BatchView {
    fn pending(file_count: usize, size_bytes: usize) -> Self {
        Self {
            status: BatchStatus::Pending,
            file_count,
            size_bytes,
            usage: TokenUsage::default(),
            duration_ms: 0,
            preview: Preview::default(),
            error: None,
        }
    }
}

/// The folded view of one analysis stream.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub status: AnalysisStatus,
    pub strategy: Option<Strategy>,
    pub total_batches: usize,
    pub batches: Vec<BatchView>,
    /// Running token totals; monotonically increasing.
    pub usage: TokenUsage,
    pub estimated_cost: f64,
    pub actual_cost: Option<f64>,
    pub sections: Option<Sections>,
    pub files_analyzed: usize,
    pub coverage: Option<f64>,
    /// Latest human-readable activity; replaced, never appended.
    pub current_activity: String,
    /// Append-only audit trail of every raw event, serialized.
    pub data_flow_log: Vec<String>,
    pub last_error: Option<String>,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            status: AnalysisStatus::Idle,
            strategy: None,
            total_batches: 0,
            batches: Vec::new(),
            usage: TokenUsage::default(),
            estimated_cost: 0.0,
            actual_cost: None,
            sections: None,
            files_analyzed: 0,
            coverage: None,
            current_activity: String::new(),
            data_flow_log: Vec::new(),
            last_error: None,
            started_at: None,
            finished_after: None,
        }
    }

    /// Mark the stream as opened but not yet producing events.
    pub fn connected(&mut self) {
        if self.status == AnalysisStatus::Idle {
            self.status = AnalysisStatus::Connecting;
            self.current_activity = "Connecting".to_string();
        }
    }

    /// Wall-clock time since the `plan` event, frozen at the terminal event.
    pub fn elapsed(&self) -> Duration {
        if let Some(done) = self.finished_after {
            return done;
        }
        self.started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Fold one event into the view. Events arriving after a terminal state
    /// are ignored.
    pub fn apply(&mut self, event: &ProgressEvent) {
        if self.status.is_terminal() {
            return;
        }

        if let Ok(raw) = serde_json::to_string(event) {
            self.data_flow_log.push(raw);
        }

        match event {
            ProgressEvent::Plan {
                strategy,
                total_files,
                total_batches,
                estimated_cost,
                batches,
                ..
            } => {
                self.status = AnalysisStatus::Planning;
                self.strategy = Some(*strategy);
                self.total_batches = *total_batches;
                self.estimated_cost = *estimated_cost;
                self.batches = batches
                    .iter()
                    .map(|b| BatchView::pending(b.file_count, b.size_bytes))
                    .collect();
                self.started_at = Some(Instant::now());
                self.current_activity = format!(
                    "Planned {} batch(es) for {} file(s)",
                    total_batches, total_files
                );
            }
            ProgressEvent::BatchStart {
                index,
                total,
                file_count,
                ..
            } => {
                self.status = AnalysisStatus::Analyzing;
                if let Some(batch) = self.batches.get_mut(*index) {
                    batch.status = BatchStatus::Active;
                }
                self.current_activity = format!(
                    "Analyzing batch {}/{} ({} file(s))",
                    index + 1,
                    total,
                    file_count
                );
            }
            ProgressEvent::ApiCall {
                batch_index,
                provider,
                model,
                prompt_tokens,
                phase,
                ..
            } => {
                if *phase == CallPhase::Batch {
                    if let Some(batch) = batch_index.and_then(|i| self.batches.get_mut(i)) {
                        batch.status = BatchStatus::CallingBackend;
                    }
                }
                self.current_activity = format!(
                    "Waiting on {} ({}, ~{} prompt tokens)",
                    provider, model, prompt_tokens
                );
            }
            ProgressEvent::BatchDone {
                index,
                total,
                usage,
                duration_ms,
                preview,
            } => {
                if let Some(batch) = self.batches.get_mut(*index) {
                    batch.status = BatchStatus::Done;
                    batch.usage = *usage;
                    batch.duration_ms = *duration_ms;
                    batch.preview = *preview;
                }
                self.usage.add(*usage);
                self.current_activity = format!("Batch {}/{} complete", index + 1, total);
            }
            ProgressEvent::BatchError {
                index,
                error,
                recoverable,
            } => {
                if let Some(batch) = self.batches.get_mut(*index) {
                    batch.status = BatchStatus::Error;
                    batch.error = Some(error.clone());
                }
                self.last_error = Some(error.clone());
                self.current_activity = if *recoverable {
                    format!("Batch {} failed, continuing: {}", index + 1, error)
                } else {
                    format!("Batch {} failed: {}", index + 1, error)
                };
            }
            ProgressEvent::SynthesisStart { batch_count, .. } => {
                self.status = AnalysisStatus::Synthesizing;
                self.current_activity =
                    format!("Merging {} batch result(s) into one document", batch_count);
            }
            ProgressEvent::SynthesisDone { usage, .. } => {
                self.usage.add(*usage);
                self.current_activity = "Synthesis complete".to_string();
            }
            ProgressEvent::Complete {
                sections,
                usage,
                actual_cost,
                files_analyzed,
                coverage,
                ..
            } => {
                self.status = AnalysisStatus::Complete;
                self.sections = Some(sections.clone());
                // The terminal usage is authoritative over the running sum.
                self.usage = *usage;
                self.actual_cost = Some(*actual_cost);
                self.files_analyzed = *files_analyzed;
                self.coverage = Some(*coverage);
                self.finished_after = Some(self.elapsed());
                self.current_activity = "Analysis complete".to_string();
            }
            ProgressEvent::Error { message, phase, .. } => {
                self.status = AnalysisStatus::Error;
                self.last_error = Some(message.clone());
                self.finished_after = Some(self.elapsed());
                self.current_activity = format!("Analysis failed during {}: {}", phase, message);
            }
            ProgressEvent::Cancelled => {
                self.status = AnalysisStatus::Cancelled;
                self.finished_after = Some(self.elapsed());
                self.current_activity = "Analysis cancelled".to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlannedBatch;

    fn plan_event(batches: usize) -> ProgressEvent {
        ProgressEvent::Plan {
            strategy: if batches > 1 {
                Strategy::Multi
            } else {
                Strategy::Single
            },
            total_files: batches * 2,
            total_bytes: batches * 1000,
            total_batches: batches,
            estimated_tokens: 250,
            estimated_cost: 0.01,
            batches: (0..batches)
                .map(|index| PlannedBatch {
                    index,
                    files: vec![format!("f{}.rs", index)],
                    file_count: 2,
                    size_bytes: 1000,
                    summary: format!("batch {}", index),
                })
                .collect(),
        }
    }

    fn done_event(index: usize, total: usize) -> ProgressEvent {
        ProgressEvent::BatchDone {
            index,
            total,
            usage: TokenUsage::new(100, 50),
            duration_ms: 1200,
            preview: Preview {
                stories: 3,
                tests: 5,
            },
        }
    }

    #[test]
    fn status_walks_the_state_machine() {
        let mut state = ProgressState::new();
        assert_eq!(state.status, AnalysisStatus::Idle);

        state.connected();
        assert_eq!(state.status, AnalysisStatus::Connecting);

        state.apply(&plan_event(2));
        assert_eq!(state.status, AnalysisStatus::Planning);

        state.apply(&ProgressEvent::BatchStart {
            index: 0,
            total: 2,
            files: vec!["f0.rs".into()],
            file_count: 2,
            size_bytes: 1000,
        });
        assert_eq!(state.status, AnalysisStatus::Analyzing);

        state.apply(&ProgressEvent::SynthesisStart {
            batch_count: 2,
            total_usage: TokenUsage::default(),
        });
        assert_eq!(state.status, AnalysisStatus::Synthesizing);

        state.apply(&ProgressEvent::Complete {
            sections: Sections::default(),
            usage: TokenUsage::new(200, 100),
            total_duration_ms: 5000,
            actual_cost: 0.002,
            files_analyzed: 4,
            coverage: 1.0,
        });
        assert_eq!(state.status, AnalysisStatus::Complete);
        assert!(state.status.is_terminal());
    }

    #[test]
    fn batch_transitions_are_monotonic_and_tracked() {
        let mut state = ProgressState::new();
        state.apply(&plan_event(2));
        assert!(state
            .batches
            .iter()
            .all(|b| b.status == BatchStatus::Pending));

        state.apply(&ProgressEvent::BatchStart {
            index: 0,
            total: 2,
            files: vec![],
            file_count: 2,
            size_bytes: 1000,
        });
        assert_eq!(state.batches[0].status, BatchStatus::Active);
        assert_eq!(state.batches[1].status, BatchStatus::Pending);

        state.apply(&ProgressEvent::ApiCall {
            batch_index: Some(0),
            provider: "claude".into(),
            model: "m".into(),
            prompt_bytes: 4000,
            prompt_tokens: 1000,
            phase: CallPhase::Batch,
        });
        assert_eq!(state.batches[0].status, BatchStatus::CallingBackend);

        state.apply(&done_event(0, 2));
        assert_eq!(state.batches[0].status, BatchStatus::Done);
        assert_eq!(state.usage, TokenUsage::new(100, 50));
        assert_eq!(state.batches[0].preview.stories, 3);
    }

    #[test]
    fn token_totals_accumulate_across_batches() {
        let mut state = ProgressState::new();
        state.apply(&plan_event(3));
        for index in 0..3 {
            state.apply(&done_event(index, 3));
        }
        assert_eq!(state.usage, TokenUsage::new(300, 150));
    }

    #[test]
    fn batch_error_is_recorded_without_stopping_the_view() {
        let mut state = ProgressState::new();
        state.apply(&plan_event(2));
        state.apply(&ProgressEvent::BatchError {
            index: 0,
            error: "rate limited by provider".into(),
            recoverable: true,
        });
        assert_eq!(state.batches[0].status, BatchStatus::Error);
        assert!(!state.status.is_terminal());
        assert_eq!(
            state.batches[0].error.as_deref(),
            Some("rate limited by provider")
        );
    }

    #[test]
    fn events_after_terminal_state_are_ignored() {
        let mut state = ProgressState::new();
        state.apply(&plan_event(1));
        state.apply(&ProgressEvent::Cancelled);
        assert_eq!(state.status, AnalysisStatus::Cancelled);

        let log_len = state.data_flow_log.len();
        state.apply(&done_event(0, 1));
        assert_eq!(state.status, AnalysisStatus::Cancelled);
        assert_eq!(state.usage, TokenUsage::default());
        assert_eq!(state.data_flow_log.len(), log_len);
    }

    #[test]
    fn activity_is_replaced_and_log_is_appended() {
        let mut state = ProgressState::new();
        state.apply(&plan_event(2));
        let first = state.current_activity.clone();
        state.apply(&ProgressEvent::BatchStart {
            index: 0,
            total: 2,
            files: vec![],
            file_count: 2,
            size_bytes: 1000,
        });
        assert_ne!(state.current_activity, first);
        assert_eq!(state.data_flow_log.len(), 2);
    }
}
