//! Shared value types for backend calls.

use serde::{Deserialize, Serialize};

/// Which text-generation backend serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// Anthropic Messages API.
    Claude,
    /// OpenAI-compatible local model server.
    LocalModel,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::LocalModel => "local-model",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Provider::Claude),
            "local-model" | "local" => Ok(Provider::LocalModel),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Token counts reported by a backend for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens billed for this call.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Fold another call's usage into a running sum.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

/// Result of one successful generation call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Raw generated text, unparsed.
    pub text: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for p in [Provider::Claude, Provider::LocalModel] {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("gpt".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Provider::LocalModel).unwrap(),
            "\"local-model\""
        );
    }

    #[test]
    fn usage_sums() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage::new(100, 20));
        total.add(TokenUsage::new(50, 5));
        assert_eq!(total, TokenUsage::new(150, 25));
        assert_eq!(total.total(), 175);
    }
}
