//! Pipeline error taxonomy.
//!
//! Recoverable batch failures never surface here — they are recorded on the
//! event stream and the run continues. What remains: validation failures
//! reported synchronously before any event, fatal failures that end a run
//! with a terminal `error` event, and cancellation.

/// Terminal failure of an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request was rejected before any event was emitted.
    #[error("invalid analysis request: {0}")]
    Validation(String),

    /// The run was aborted; remaining batches and synthesis were skipped.
    #[error("analysis failed during {phase}: {message}")]
    Fatal { phase: String, message: String },

    /// The cancellation token fired.
    #[error("analysis cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn fatal(phase: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Fatal {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_phase() {
        let err = PipelineError::fatal("batch", "invalid credentials (HTTP 401)");
        assert_eq!(
            err.to_string(),
            "analysis failed during batch: invalid credentials (HTTP 401)"
        );
    }
}
