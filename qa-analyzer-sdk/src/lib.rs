//! Protocol crate for the QA analysis pipeline.
//!
//! Everything a host needs to drive an analysis and render its progress
//! lives here: the immutable request types, the [`ProgressEvent`] stream
//! protocol, the client-side [`ProgressState`] reducer, cost arithmetic, the
//! newline-delimited JSON wire codec, and the [`AnalysisRuntime`] trait that
//! runtimes implement. The orchestration logic itself lives in the
//! `qa-analyzer` crate; this crate is shared by both sides of the stream.

// Re-export the backend client for convenience
pub use textgen_client;

pub mod cost;
pub mod events;
pub mod request;
pub mod runtime;
pub mod state;
pub mod wire;

pub use cost::{cost_usd, estimate_tokens, ModelRates};
pub use events::{
    AnalysisOutcome, CallPhase, PlannedBatch, Preview, ProgressEvent, Sections, Strategy,
};
pub use request::{AnalysisConfig, AnalysisRequest, OutputFormat, ProviderConfig, SourceFile};
pub use runtime::{AnalysisHandle, AnalysisRuntime, RuntimeResult};
pub use state::{AnalysisStatus, BatchStatus, BatchView, ProgressState};
