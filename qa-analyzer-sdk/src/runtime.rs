//! Runtime trait for hosting analyses.
//!
//! A runtime owns concurrently running analyses and gives hosts (CLI, HTTP
//! server, TUI) a uniform API: start, subscribe to live events, replay
//! buffered events, poll status, cancel. The in-process implementation lives
//! in the `qa-analyzer` crate.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::ProgressEvent;
use crate::request::AnalysisRequest;
use crate::state::AnalysisStatus;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Handle for one running (or finished) analysis.
#[derive(Debug, Clone)]
pub struct AnalysisHandle {
    pub id: Uuid,
    pub model: String,
}

impl AnalysisHandle {
    pub fn new(id: Uuid, model: String) -> Self {
        Self { id, model }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Uniform API over running analyses.
#[async_trait]
pub trait AnalysisRuntime: Send + Sync {
    /// Validate and launch an analysis. Validation failures are returned
    /// synchronously here; they never appear on the event stream.
    async fn start_analysis(&self, request: AnalysisRequest) -> RuntimeResult<AnalysisHandle>;

    /// Subscribe to live events from a running analysis.
    async fn subscribe(&self, id: &Uuid) -> RuntimeResult<broadcast::Receiver<ProgressEvent>>;

    /// Replay buffered events (all, or the most recent `limit`), for
    /// subscribers that attach late.
    async fn get_events(
        &self,
        id: &Uuid,
        limit: Option<usize>,
    ) -> RuntimeResult<Vec<ProgressEvent>>;

    /// Current status of an analysis.
    async fn status(&self, id: &Uuid) -> RuntimeResult<AnalysisStatus>;

    /// Request cooperative cancellation. The pipeline aborts its in-flight
    /// backend call, emits a single `cancelled` marker, and stops.
    async fn cancel(&self, id: &Uuid) -> RuntimeResult<()>;
}
