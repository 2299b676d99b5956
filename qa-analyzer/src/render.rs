//! Console rendering of progress events and the merged output document.

use qa_analyzer_sdk::events::{CallPhase, ProgressEvent, Sections};

/// One console line per event, colored in the usual scheme: cyan for
/// progress, green for success, red for failure.
pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Plan {
            strategy,
            total_files,
            total_batches,
            estimated_tokens,
            estimated_cost,
            ..
        } => format!(
            "\x1b[1;36m═══ Plan: {} batch(es), {} file(s), ~{} tokens (est. ${:.4}) [{:?}] ═══\x1b[0m",
            total_batches, total_files, estimated_tokens, estimated_cost, strategy
        ),
        ProgressEvent::BatchStart {
            index,
            total,
            file_count,
            size_bytes,
            ..
        } => format!(
            "\x1b[36m→ Batch {}/{} ({} file(s), {:.1} KB)\x1b[0m",
            index + 1,
            total,
            file_count,
            *size_bytes as f64 / 1024.0
        ),
        ProgressEvent::ApiCall {
            provider,
            model,
            prompt_tokens,
            phase,
            ..
        } => {
            let label = match phase {
                CallPhase::Batch => "batch",
                CallPhase::Synthesis => "synthesis",
            };
            format!(
                "\x1b[2m  calling {} {} ({} call, ~{} prompt tokens)\x1b[0m",
                provider, model, label, prompt_tokens
            )
        }
        ProgressEvent::BatchDone {
            index,
            total,
            usage,
            duration_ms,
            preview,
        } => format!(
            "\x1b[32m✓ Batch {}/{} complete\x1b[0m \x1b[2m({} in / {} out, {:.1}s, ~{} stories / ~{} tests)\x1b[0m",
            index + 1,
            total,
            usage.input_tokens,
            usage.output_tokens,
            *duration_ms as f64 / 1000.0,
            preview.stories,
            preview.tests
        ),
        ProgressEvent::BatchError {
            index,
            error,
            recoverable,
        } => {
            let suffix = if *recoverable { " (continuing)" } else { "" };
            format!("\x1b[31m✗ Batch {} failed: {}{}\x1b[0m", index + 1, error, suffix)
        }
        ProgressEvent::SynthesisStart { batch_count, .. } => format!(
            "\x1b[36m→ Synthesizing {} batch result(s)\x1b[0m",
            batch_count
        ),
        ProgressEvent::SynthesisDone { usage, duration_ms } => format!(
            "\x1b[32m✓ Synthesis complete\x1b[0m \x1b[2m({} in / {} out, {:.1}s)\x1b[0m",
            usage.input_tokens,
            usage.output_tokens,
            *duration_ms as f64 / 1000.0
        ),
        ProgressEvent::Complete {
            usage,
            total_duration_ms,
            actual_cost,
            files_analyzed,
            coverage,
            ..
        } => format!(
            "\x1b[1;32m✓ Analysis complete:\x1b[0m {} file(s), coverage {:.0}%, {} in / {} out, ${:.4}, {:.1}s",
            files_analyzed,
            coverage * 100.0,
            usage.input_tokens,
            usage.output_tokens,
            actual_cost,
            *total_duration_ms as f64 / 1000.0
        ),
        ProgressEvent::Error { message, phase, .. } => {
            format!("\x1b[1;31m✗ Analysis failed ({}): {}\x1b[0m", phase, message)
        }
        ProgressEvent::Cancelled => "\x1b[33m✗ Analysis cancelled\x1b[0m".to_string(),
    }
}

/// Assemble the merged sections into one document for `--output`.
pub fn merged_document(sections: &Sections) -> String {
    format!(
        "# QA Analysis\n\n## User Stories\n\n{}\n\n## Test Cases\n\n{}\n\n## Acceptance Criteria\n\n{}\n",
        sections.user_stories.trim(),
        sections.test_cases.trim(),
        sections.acceptance_criteria.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use textgen_client::TokenUsage;

    #[test]
    fn complete_line_reports_coverage_and_cost() {
        let line = describe(&ProgressEvent::Complete {
            sections: Sections::default(),
            usage: TokenUsage::new(1000, 200),
            total_duration_ms: 4200,
            actual_cost: 0.0123,
            files_analyzed: 7,
            coverage: 0.8,
        });
        assert!(line.contains("coverage 80%"));
        assert!(line.contains("$0.0123"));
        assert!(line.contains("7 file(s)"));
    }

    #[test]
    fn batch_error_marks_recoverable_failures() {
        let line = describe(&ProgressEvent::BatchError {
            index: 2,
            error: "rate limited by provider".into(),
            recoverable: true,
        });
        assert!(line.contains("Batch 3 failed"));
        assert!(line.contains("(continuing)"));
    }

    #[test]
    fn merged_document_contains_all_sections() {
        let doc = merged_document(&Sections {
            user_stories: "1. story".into(),
            test_cases: "1. test".into(),
            acceptance_criteria: "- criterion".into(),
            raw: String::new(),
        });
        assert!(doc.contains("## User Stories\n\n1. story"));
        assert!(doc.contains("## Test Cases\n\n1. test"));
        assert!(doc.contains("## Acceptance Criteria\n\n- criterion"));
    }
}
