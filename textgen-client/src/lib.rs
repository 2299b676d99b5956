//! Uniform client for text-generation backends.
//!
//! Every supported provider is reduced to a single capability: send a prompt,
//! get back generated text plus a token-usage tuple. The pipeline above this
//! crate never learns which vendor answered.
//!
//! Supported backends:
//! - [`ClaudeBackend`] — the Anthropic Messages API
//! - [`LocalBackend`] — any OpenAI-compatible chat-completions server
//!   (llama.cpp, vLLM, Ollama, LM Studio)
//!
//! Each call accepts a [`CancellationToken`] and a hard deadline; whichever
//! fires first aborts the in-flight request.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use textgen_client::{backend_for, Provider};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), textgen_client::GenerateError> {
//! let backend = backend_for(Provider::Claude, "sk-ant-...", Duration::from_secs(120));
//! let token = CancellationToken::new();
//! let completion = backend
//!     .generate("Write user stories for a login form", "claude-3-5-sonnet-latest", &token)
//!     .await?;
//! println!("{} ({} tokens out)", completion.text, completion.usage.output_tokens);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod claude;
pub mod error;
pub mod local;
pub mod types;

pub use backend::GenerationBackend;
pub use claude::ClaudeBackend;
pub use error::GenerateError;
pub use local::LocalBackend;
pub use types::{Completion, Provider, TokenUsage};

use std::sync::Arc;
use std::time::Duration;

/// Build the backend for a provider selection.
///
/// `credential` is the API key for [`Provider::Claude`] and the base endpoint
/// URL for [`Provider::LocalModel`] — the two meanings the credential store
/// supplies under one field.
pub fn backend_for(
    provider: Provider,
    credential: impl Into<String>,
    call_timeout: Duration,
) -> Arc<dyn GenerationBackend> {
    match provider {
        Provider::Claude => Arc::new(ClaudeBackend::new(credential, call_timeout)),
        Provider::LocalModel => Arc::new(LocalBackend::new(credential, call_timeout)),
    }
}
