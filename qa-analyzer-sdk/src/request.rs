//! Immutable analysis input types.
//!
//! An [`AnalysisRequest`] is created once per invocation by whatever
//! collected the sources (repository browser, paste box, upload) and is never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use textgen_client::Provider;

/// One source text to analyze. `path` is a display label as much as a
/// location; the pipeline treats `content` as an opaque blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

/// Output document flavor requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Markdown,
    Gherkin,
    PlainText,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Markdown
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Gherkin => "gherkin",
            OutputFormat::PlainText => "plain_text",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "gherkin" => Ok(OutputFormat::Gherkin),
            "plain" | "plain_text" | "text" => Ok(OutputFormat::PlainText),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// What to generate and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub want_user_stories: bool,
    pub want_test_cases: bool,
    pub want_acceptance_criteria: bool,
    pub want_edge_cases: bool,
    pub want_security_tests: bool,
    pub output_format: OutputFormat,
    /// Target test framework named in generated test cases, e.g. "pytest".
    pub test_framework: Option<String>,
    /// Free-form caller context prepended to every prompt.
    pub additional_context: Option<String>,
    /// Model identifier passed through to the backend.
    pub model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            want_user_stories: true,
            want_test_cases: true,
            want_acceptance_criteria: true,
            want_edge_cases: false,
            want_security_tests: false,
            output_format: OutputFormat::default(),
            test_framework: None,
            additional_context: None,
            model: "claude-3-5-sonnet-latest".to_string(),
        }
    }
}

/// Provider selection as supplied by the credential store. `credential` is an
/// API key for cloud providers and a base endpoint URL for local servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub credential: String,
}

/// The complete, immutable input to one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Ordered list of sources. Order is preserved through planning.
    pub files: Vec<SourceFile>,
    pub config: AnalysisConfig,
    pub provider: ProviderConfig,
}

impl AnalysisRequest {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(SourceFile::size_bytes).sum()
    }
}
