//! In-process analysis runtime.
//!
//! Hosts that run many analyses concurrently (an HTTP server, a TUI) get a
//! registry keyed by session id: live event subscription over a broadcast
//! channel, a persistent event buffer for late subscribers, status polling,
//! and cancellation. Sessions share no mutable state with each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qa_analyzer_sdk::cost::ModelRates;
use qa_analyzer_sdk::events::ProgressEvent;
use qa_analyzer_sdk::request::AnalysisRequest;
use qa_analyzer_sdk::runtime::{AnalysisHandle, AnalysisRuntime, RuntimeResult};
use qa_analyzer_sdk::state::AnalysisStatus;
use textgen_client::{backend_for, Provider};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::planner::PlannerLimits;
use crate::session::{PipelineSession, SessionOptions};
use crate::store::{DiscardStore, OutcomeStore};

/// Broadcast capacity per session; sized so a slow subscriber lags rather
/// than stalls the pipeline.
const BROADCAST_CAPACITY: usize = 1024;

/// Runtime-wide configuration applied to every session it starts.
pub struct RuntimeOptions {
    pub limits: PlannerLimits,
    pub call_timeout: Duration,
    /// Billing rates per provider; configuration, never hardcoded downstream.
    pub claude_rates: ModelRates,
    pub local_rates: ModelRates,
    pub store: Arc<dyn OutcomeStore>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            limits: PlannerLimits::default(),
            call_timeout: Duration::from_secs(120),
            claude_rates: ModelRates::new(3.0, 15.0),
            local_rates: ModelRates::free(),
            store: Arc::new(DiscardStore),
        }
    }
}

impl RuntimeOptions {
    fn rates_for(&self, provider: Provider) -> ModelRates {
        match provider {
            Provider::Claude => self.claude_rates,
            Provider::LocalModel => self.local_rates,
        }
    }
}

/// Registry entry for one session.
struct SessionState {
    status: AnalysisStatus,
    cancel: CancellationToken,
    events_tx: broadcast::Sender<ProgressEvent>,
    /// All events so far, for late subscribers.
    buffer: Vec<ProgressEvent>,
}

/// In-process implementation of [`AnalysisRuntime`].
pub struct InProcessRuntime {
    options: RuntimeOptions,
    sessions: Arc<Mutex<HashMap<Uuid, SessionState>>>,
}

impl InProcessRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop registry entries for finished sessions, freeing their buffers.
    pub fn cleanup_finished(&self) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|_, state| !state.status.is_terminal());
    }
}

#[async_trait]
impl AnalysisRuntime for InProcessRuntime {
    async fn start_analysis(&self, request: AnalysisRequest) -> RuntimeResult<AnalysisHandle> {
        let provider = request.provider.provider;
        let model = request.config.model.clone();
        let backend = backend_for(
            provider,
            request.provider.credential.clone(),
            self.options.call_timeout,
        );

        let mut session = PipelineSession::start(
            request,
            backend,
            SessionOptions {
                limits: self.options.limits,
                rates: self.options.rates_for(provider),
                store: self.options.store.clone(),
            },
        )?;

        let id = session.id();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let state = SessionState {
            status: AnalysisStatus::Planning,
            cancel: session.cancel_token(),
            events_tx: events_tx.clone(),
            buffer: Vec::new(),
        };
        self.sessions.lock().unwrap().insert(id, state);

        // Forward session events into the registry: buffer, status, broadcast.
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            while let Some(event) = session.next_event().await {
                let mut map = sessions.lock().unwrap();
                if let Some(state) = map.get_mut(&id) {
                    state.status = status_after(&event, state.status);
                    state.buffer.push(event.clone());
                }
                drop(map);
                let _ = events_tx.send(event);
            }
            // Defensive: a stream that ended without a terminal event means
            // the pipeline task died; reflect that in the status.
            let mut map = sessions.lock().unwrap();
            if let Some(state) = map.get_mut(&id) {
                if !state.status.is_terminal() {
                    state.status = AnalysisStatus::Error;
                }
            }
        });

        Ok(AnalysisHandle::new(id, model))
    }

    async fn subscribe(&self, id: &Uuid) -> RuntimeResult<broadcast::Receiver<ProgressEvent>> {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions
            .get(id)
            .ok_or_else(|| format!("analysis '{}' not found", id))?;
        Ok(state.events_tx.subscribe())
    }

    async fn get_events(
        &self,
        id: &Uuid,
        limit: Option<usize>,
    ) -> RuntimeResult<Vec<ProgressEvent>> {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions
            .get(id)
            .ok_or_else(|| format!("analysis '{}' not found", id))?;
        let events = match limit {
            Some(limit) => state
                .buffer
                .iter()
                .rev()
                .take(limit)
                .rev()
                .cloned()
                .collect(),
            None => state.buffer.clone(),
        };
        Ok(events)
    }

    async fn status(&self, id: &Uuid) -> RuntimeResult<AnalysisStatus> {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions
            .get(id)
            .ok_or_else(|| format!("analysis '{}' not found", id))?;
        Ok(state.status)
    }

    async fn cancel(&self, id: &Uuid) -> RuntimeResult<()> {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions
            .get(id)
            .ok_or_else(|| format!("analysis '{}' not found", id))?;
        state.cancel.cancel();
        Ok(())
    }
}

/// Map one event onto the coarse session status.
fn status_after(event: &ProgressEvent, current: AnalysisStatus) -> AnalysisStatus {
    match event {
        ProgressEvent::Plan { .. } => AnalysisStatus::Planning,
        ProgressEvent::BatchStart { .. } => AnalysisStatus::Analyzing,
        ProgressEvent::SynthesisStart { .. } => AnalysisStatus::Synthesizing,
        ProgressEvent::Complete { .. } => AnalysisStatus::Complete,
        ProgressEvent::Error { .. } => AnalysisStatus::Error,
        ProgressEvent::Cancelled => AnalysisStatus::Cancelled,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_analyzer_sdk::request::{AnalysisConfig, ProviderConfig, SourceFile};

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            files: vec![SourceFile::new("a.rs", "fn a() {}")],
            config: AnalysisConfig::default(),
            provider: ProviderConfig {
                provider: Provider::LocalModel,
                // Nothing listens here; the first call fails fast as a
                // network error, which is fatal on the first batch.
                credential: "http://127.0.0.1:9".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected() {
        let runtime = InProcessRuntime::new(RuntimeOptions::default());
        let id = Uuid::new_v4();
        assert!(runtime.status(&id).await.is_err());
        assert!(runtime.cancel(&id).await.is_err());
        assert!(runtime.subscribe(&id).await.is_err());
    }

    #[tokio::test]
    async fn validation_failure_is_synchronous() {
        let runtime = InProcessRuntime::new(RuntimeOptions::default());
        let mut invalid = request();
        invalid.files.clear();
        assert!(runtime.start_analysis(invalid).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_ends_in_error_status() {
        let runtime = InProcessRuntime::new(RuntimeOptions::default());
        let handle = runtime.start_analysis(request()).await.unwrap();

        // Poll until the session reaches a terminal status.
        let mut status = runtime.status(handle.id()).await.unwrap();
        for _ in 0..400 {
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            status = runtime.status(handle.id()).await.unwrap();
        }
        assert_eq!(status, AnalysisStatus::Error);

        let buffered = runtime.get_events(handle.id(), None).await.unwrap();
        assert_eq!(buffered.first().unwrap().kind(), "plan");
        assert_eq!(buffered.last().unwrap().kind(), "error");

        let tail = runtime.get_events(handle.id(), Some(1)).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].kind(), "error");

        runtime.cleanup_finished();
        assert!(runtime.status(handle.id()).await.is_err());
    }
}
