//! Planning: decide single vs multi strategy and pack files into batches.
//!
//! Batches partition the input file list exactly — no file omitted,
//! duplicated, or split — and preserve input order. Packing is greedy: files
//! accumulate into the current batch until the next file would exceed the
//! byte or file-count cap, at which point a new batch starts. A single file
//! larger than the byte cap still becomes its own batch.

use qa_analyzer_sdk::cost::{cost_usd, estimate_tokens, ModelRates};
use qa_analyzer_sdk::events::{PlannedBatch, ProgressEvent, Strategy};
use qa_analyzer_sdk::request::{AnalysisRequest, SourceFile};
use textgen_client::TokenUsage;

use crate::error::PipelineError;

/// Size thresholds driving the planner. Values are configuration, not
/// constants baked into call sites.
#[derive(Debug, Clone, Copy)]
pub struct PlannerLimits {
    /// Total content at or under this fits in one backend call.
    pub single_pass_limit: usize,
    /// Byte cap per batch in multi strategy.
    pub max_batch_bytes: usize,
    /// File-count cap per batch in multi strategy.
    pub max_batch_files: usize,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            single_pass_limit: 50_000,
            max_batch_bytes: 40_000,
            max_batch_files: 10,
        }
    }
}

/// One planned unit of work: a contiguous slice of the input files.
#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub index: usize,
    pub files: Vec<SourceFile>,
    pub total_bytes: usize,
    pub summary: String,
}

impl BatchSpec {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// The immutable execution plan. Computed once, read-only afterward.
#[derive(Debug, Clone)]
pub struct Plan {
    pub strategy: Strategy,
    pub batches: Vec<BatchSpec>,
    pub total_bytes: usize,
    pub estimated_tokens: u64,
    pub estimated_cost: f64,
}

impl Plan {
    pub fn total_files(&self) -> usize {
        self.batches.iter().map(|b| b.files.len()).sum()
    }

    /// The `plan` event announcing this plan on the stream.
    pub fn to_event(&self) -> ProgressEvent {
        ProgressEvent::Plan {
            strategy: self.strategy,
            total_files: self.total_files(),
            total_bytes: self.total_bytes,
            total_batches: self.batches.len(),
            estimated_tokens: self.estimated_tokens,
            estimated_cost: self.estimated_cost,
            batches: self
                .batches
                .iter()
                .map(|b| PlannedBatch {
                    index: b.index,
                    files: b.file_names(),
                    file_count: b.files.len(),
                    size_bytes: b.total_bytes,
                    summary: b.summary.clone(),
                })
                .collect(),
        }
    }
}

/// Compute the plan for a request, or fail validation before any event is
/// emitted.
pub fn plan(
    request: &AnalysisRequest,
    limits: &PlannerLimits,
    rates: ModelRates,
) -> Result<Plan, PipelineError> {
    if request.files.is_empty() {
        return Err(PipelineError::Validation(
            "no source files provided".to_string(),
        ));
    }
    if request.files.iter().all(|f| f.content.trim().is_empty()) {
        return Err(PipelineError::Validation(
            "all source files are empty".to_string(),
        ));
    }

    let total_bytes = request.total_bytes();

    let (strategy, groups) = if total_bytes <= limits.single_pass_limit {
        (Strategy::Single, vec![request.files.clone()])
    } else {
        (Strategy::Multi, pack(&request.files, limits))
    };

    let batches = groups
        .into_iter()
        .enumerate()
        .map(|(index, files)| {
            let total_bytes = files.iter().map(SourceFile::size_bytes).sum();
            let summary = summarize(&files);
            BatchSpec {
                index,
                files,
                total_bytes,
                summary,
            }
        })
        .collect::<Vec<_>>();

    // Estimate output at half the input; only the final actual cost is exact.
    let estimated_input = estimate_tokens(total_bytes);
    let estimated_output = estimated_input / 2;
    let estimated_cost = cost_usd(TokenUsage::new(estimated_input, estimated_output), rates);

    Ok(Plan {
        strategy,
        batches,
        total_bytes,
        estimated_tokens: estimated_input + estimated_output,
        estimated_cost,
    })
}

/// Greedy contiguous packing under the byte and file-count caps.
fn pack(files: &[SourceFile], limits: &PlannerLimits) -> Vec<Vec<SourceFile>> {
    let mut groups: Vec<Vec<SourceFile>> = Vec::new();
    let mut current: Vec<SourceFile> = Vec::new();
    let mut current_bytes = 0usize;

    for file in files {
        let size = file.size_bytes();
        let would_overflow = !current.is_empty()
            && (current_bytes + size > limits.max_batch_bytes
                || current.len() + 1 > limits.max_batch_files);
        if would_overflow {
            groups.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(file.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn summarize(files: &[SourceFile]) -> String {
    match files {
        [] => String::new(),
        [only] => only.path.clone(),
        [first, .., last] => format!("{} … {} ({} files)", first.path, last.path, files.len()),
    }
}
