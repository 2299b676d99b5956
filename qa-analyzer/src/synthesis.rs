//! Synthesis: merge successful batch outputs into one document.
//!
//! Invoked only for the multi strategy with at least one successful batch.
//! Failed batches are excluded entirely; their content is absent from the
//! final document, which the `coverage` ratio communicates. If the synthesis
//! call itself fails, the per-batch sections are concatenated under "Batch N"
//! headings instead — partial results are never thrown away.

use std::time::Instant;

use qa_analyzer_sdk::cost::estimate_tokens;
use qa_analyzer_sdk::events::{CallPhase, ProgressEvent, Sections};
use qa_analyzer_sdk::request::AnalysisRequest;
use textgen_client::{GenerationBackend, TokenUsage};
use tokio_util::sync::CancellationToken;

use crate::executor::BatchSuccess;
use crate::pipeline::ProgressSink;
use crate::prompt;
use crate::sections::parse_sections;

/// What the synthesis phase produced.
pub(crate) enum SynthesisOutcome {
    /// The backend merged the batches.
    Merged {
        sections: Sections,
        usage: TokenUsage,
        duration_ms: u64,
    },
    /// The backend call failed; sections are the concatenation fallback.
    FellBack { sections: Sections },
    Cancelled,
}

pub(crate) async fn run_synthesis(
    successes: &[BatchSuccess],
    running_usage: TokenUsage,
    request: &AnalysisRequest,
    backend: &dyn GenerationBackend,
    sink: &mut ProgressSink,
    cancel: &CancellationToken,
) -> SynthesisOutcome {
    sink.emit(ProgressEvent::SynthesisStart {
        batch_count: successes.len(),
        total_usage: running_usage,
    })
    .await;

    let outputs: Vec<String> = successes.iter().map(|s| s.sections.raw.clone()).collect();
    let prompt = prompt::build_synthesis_prompt(&outputs, &request.config);

    sink.emit(ProgressEvent::ApiCall {
        batch_index: None,
        provider: request.provider.provider.as_str().to_string(),
        model: request.config.model.clone(),
        prompt_bytes: prompt.len(),
        prompt_tokens: estimate_tokens(prompt.len()),
        phase: CallPhase::Synthesis,
    })
    .await;

    let started = Instant::now();
    match backend
        .generate(&prompt, &request.config.model, cancel)
        .await
    {
        Ok(completion) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            sink.emit(ProgressEvent::SynthesisDone {
                usage: completion.usage,
                duration_ms,
            })
            .await;
            SynthesisOutcome::Merged {
                sections: parse_sections(&completion.text),
                usage: completion.usage,
                duration_ms,
            }
        }
        Err(error) if error.is_cancelled() => SynthesisOutcome::Cancelled,
        Err(error) => {
            tracing::warn!(%error, "synthesis call failed, falling back to concatenation");
            SynthesisOutcome::FellBack {
                sections: concatenate(successes),
            }
        }
    }
}

/// The fallback document: each successful batch's sections appended under a
/// "Batch N" heading, in batch order.
pub(crate) fn concatenate(successes: &[BatchSuccess]) -> Sections {
    let mut merged = Sections::default();
    for success in successes {
        let heading = format!("## Batch {}\n\n", success.index + 1);
        append(&mut merged.user_stories, &heading, &success.sections.user_stories);
        append(&mut merged.test_cases, &heading, &success.sections.test_cases);
        append(
            &mut merged.acceptance_criteria,
            &heading,
            &success.sections.acceptance_criteria,
        );
        append(&mut merged.raw, &heading, &success.sections.raw);
    }
    merged
}

fn append(target: &mut String, heading: &str, content: &str) {
    if !target.is_empty() {
        target.push_str("\n\n");
    }
    target.push_str(heading);
    target.push_str(content);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(index: usize, stories: &str) -> BatchSuccess {
        BatchSuccess {
            index,
            sections: Sections {
                user_stories: stories.to_string(),
                test_cases: format!("tests of batch {}", index + 1),
                acceptance_criteria: String::new(),
                raw: format!("raw {}", index + 1),
            },
            usage: TokenUsage::new(10, 5),
            duration_ms: 100,
            file_count: 1,
        }
    }

    #[test]
    fn concatenation_keeps_batch_order_and_headings() {
        let merged = concatenate(&[success(0, "story one"), success(2, "story three")]);
        assert!(merged.user_stories.contains("## Batch 1"));
        assert!(merged.user_stories.contains("## Batch 3"));
        assert!(merged.user_stories.contains("story one"));
        let first = merged.user_stories.find("## Batch 1").unwrap();
        let third = merged.user_stories.find("## Batch 3").unwrap();
        assert!(first < third);
        assert!(merged.raw.contains("raw 1"));
        assert!(merged.raw.contains("raw 3"));
    }
}
