//! Prompt construction. Pure functions: content and config in, prompt out.

use qa_analyzer_sdk::request::{AnalysisConfig, OutputFormat, SourceFile};

/// Prompt for analyzing one self-contained body of source code.
pub fn build_analysis_prompt(files: &[SourceFile], config: &AnalysisConfig) -> String {
    format!(
        r###"You are a senior QA engineer. Analyze the source code below and produce QA artifacts.

# Requested Artifacts

{artifacts}

# Output Rules

- Respond in {format}.
- Use exactly these section headers, each on its own line: "## User Stories", "## Test Cases", "## Acceptance Criteria".
- Number items sequentially within each section.
{framework}{context}
# Source Code

{sources}"###,
        artifacts = artifact_list(config),
        format = format_name(config.output_format),
        framework = framework_line(config),
        context = context_block(config),
        sources = render_files(files),
    )
}

/// Batch variant: explicit "batch i of n" framing so the backend treats the
/// slice as self-contained and a later pass can merge the results.
pub fn build_batch_prompt(
    files: &[SourceFile],
    config: &AnalysisConfig,
    index: usize,
    total: usize,
    summary: &str,
) -> String {
    format!(
        r#"This is batch {current} of {total} from a larger codebase ({summary}).
Treat this batch as self-contained: analyze only the code below and do not refer to other batches. The per-batch results will be merged afterwards.

{body}"#,
        current = index + 1,
        total = total,
        summary = summary,
        body = build_analysis_prompt(files, config),
    )
}

/// Prompt merging successful batch outputs into one coherent document.
pub fn build_synthesis_prompt(batch_outputs: &[String], config: &AnalysisConfig) -> String {
    let combined = batch_outputs
        .iter()
        .enumerate()
        .map(|(i, output)| format!("### Batch {} output\n\n{}", i + 1, output))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r###"You are a senior QA engineer consolidating per-batch QA analyses of one codebase into a single document.

# Your Task

1. Merge the batch outputs below into one coherent set of QA artifacts.
2. Deduplicate overlapping user stories and test cases — keep the most complete wording.
3. Renumber all items sequentially within each section.
4. Group related items by feature, not by the batch they came from.
5. Use exactly these section headers, each on its own line: "## User Stories", "## Test Cases", "## Acceptance Criteria".
6. Respond in {format}.
{framework}
# Batch Outputs

{combined}"###,
        format = format_name(config.output_format),
        framework = framework_line(config),
        combined = combined,
    )
}

fn artifact_list(config: &AnalysisConfig) -> String {
    let mut lines = Vec::new();
    if config.want_user_stories {
        lines.push("- User stories in \"As a <role>, I want <goal>, so that <benefit>\" form");
    }
    if config.want_test_cases {
        lines.push("- Test cases with steps and expected results");
    }
    if config.want_acceptance_criteria {
        lines.push("- Acceptance criteria per story, each independently verifiable");
    }
    if config.want_edge_cases {
        lines.push("- Edge cases: boundary values, empty inputs, concurrent access");
    }
    if config.want_security_tests {
        lines.push("- Security test cases: injection, authorization, data exposure");
    }
    if lines.is_empty() {
        lines.push("- A concise QA review of the code");
    }
    lines.join("\n")
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => "Markdown",
        OutputFormat::Gherkin => "Gherkin (Given/When/Then scenarios)",
        OutputFormat::PlainText => "plain text",
    }
}

fn framework_line(config: &AnalysisConfig) -> String {
    match &config.test_framework {
        Some(framework) => format!("- Write test cases in {} style.\n", framework),
        None => String::new(),
    }
}

fn context_block(config: &AnalysisConfig) -> String {
    match &config.additional_context {
        Some(context) => format!("\n# Additional Context\n\n{}\n", context),
        None => String::new(),
    }
}

fn render_files(files: &[SourceFile]) -> String {
    files
        .iter()
        .map(|file| format!("## File: {}\n\n```\n{}\n```", file.path, file.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
