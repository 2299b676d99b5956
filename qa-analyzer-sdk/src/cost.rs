//! Token and cost arithmetic.
//!
//! Rates are configuration, supplied per provider by the caller; nothing in
//! the pipeline hardcodes a price.

use serde::{Deserialize, Serialize};
use textgen_client::TokenUsage;

/// USD per million tokens, input and output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelRates {
    pub fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Rates for backends that bill nothing (local model servers).
    pub fn free() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// The cost formula: `input/1M * input_rate + output/1M * output_rate`.
pub fn cost_usd(usage: TokenUsage, rates: ModelRates) -> f64 {
    (usage.input_tokens as f64 / 1_000_000.0) * rates.input_per_mtok
        + (usage.output_tokens as f64 / 1_000_000.0) * rates.output_per_mtok
}

/// Rough token estimate from byte length: four bytes per token.
pub fn estimate_tokens(bytes: usize) -> u64 {
    (bytes as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_formula_is_exact() {
        let rates = ModelRates::new(3.0, 15.0);
        let usage = TokenUsage::new(1_000_000, 200_000);
        let expected = 3.0 + 0.2 * 15.0;
        assert!((cost_usd(usage, rates) - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_rates_cost_nothing() {
        let usage = TokenUsage::new(5_000_000, 5_000_000);
        assert_eq!(cost_usd(usage, ModelRates::free()), 0.0);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(5), 2);
        assert_eq!(estimate_tokens(4096), 1024);
    }
}
