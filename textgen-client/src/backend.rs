//! The abstract generation capability and the cancellation/deadline guard.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GenerateError;
use crate::types::{Completion, Provider};

/// One abstract capability: prompt in, text plus usage out.
///
/// Implementations must be safe to share across concurrent analysis
/// pipelines; they hold no per-request state.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text for `prompt` with `model`.
    ///
    /// The call must observe `cancel`: when the token fires, the in-flight
    /// HTTP request is dropped and [`GenerateError::Cancelled`] is returned.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GenerateError>;

    /// Which provider this backend talks to.
    fn provider(&self) -> Provider;
}

/// Race a backend call against its cancellation token and hard deadline.
///
/// Whichever fires first wins: cancellation beats timeout beats completion.
/// Dropping the request future aborts the underlying HTTP request.
pub(crate) async fn guard<F>(
    call: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<Completion, GenerateError>
where
    F: Future<Output = Result<Completion, GenerateError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerateError::Cancelled),
        outcome = tokio::time::timeout(deadline, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(GenerateError::Timeout {
                seconds: deadline.as_secs(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;

    async fn ok_after(ms: u64) -> Result<Completion, GenerateError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(Completion {
            text: "done".into(),
            usage: TokenUsage::new(1, 1),
        })
    }

    #[tokio::test]
    async fn guard_passes_through_completion() {
        let token = CancellationToken::new();
        let result = guard(ok_after(1), Duration::from_secs(5), &token).await;
        assert_eq!(result.unwrap().text, "done");
    }

    #[tokio::test]
    async fn guard_times_out() {
        let token = CancellationToken::new();
        let result = guard(ok_after(500), Duration::from_millis(10), &token).await;
        assert!(matches!(result, Err(GenerateError::Timeout { .. })));
    }

    #[tokio::test]
    async fn guard_honours_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = guard(ok_after(500), Duration::from_secs(5), &token).await;
        assert!(matches!(result, Err(GenerateError::Cancelled)));
    }
}
