//! Cost accounting: dry-run estimates and actual usage.

use std::fmt;

use crate::config::PricingConfig;
use crate::extract::FunctionCandidate;

/// Projected cost of documenting a set of candidates.
///
/// Only an estimate: the generated text's length is unknown until it exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub candidates: usize,
    pub estimated_tokens: u64,
    pub estimated_cost: f64,
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Estimated cost: ${:.4} for {} function(s), ~{} tokens (estimate only; actual cost depends on the generated text)",
            self.estimated_cost, self.candidates, self.estimated_tokens
        )
    }
}

/// Character-based token and price approximation
#[derive(Debug, Clone)]
pub struct CostEstimator {
    chars_per_token: usize,
    price_per_token: f64,
    multiplier: f64,
}

impl CostEstimator {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            chars_per_token: pricing.chars_per_token.max(1),
            price_per_token: pricing.price_per_1k_tokens / 1000.0,
            multiplier: pricing.cost_multiplier,
        }
    }

    /// Rough estimation: 1 token ≈ `chars_per_token` characters, rounded up
    pub fn estimate_tokens(&self, text: &str) -> u64 {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token) as u64
    }

    /// Estimate the cost of generating docstrings for `candidates`
    pub fn estimate<'a, I>(&self, candidates: I) -> CostEstimate
    where
        I: IntoIterator<Item = &'a FunctionCandidate>,
    {
        let (count, tokens) = candidates
            .into_iter()
            .fold((0usize, 0u64), |(count, tokens), c| {
                (count + 1, tokens + self.estimate_tokens(&c.source))
            });

        CostEstimate {
            candidates: count,
            estimated_tokens: tokens,
            estimated_cost: tokens as f64 * self.price_per_token * self.multiplier,
        }
    }

    /// Actual dollars for tokens reported by the service
    pub fn usage_cost(&self, total_tokens: u64) -> f64 {
        total_tokens as f64 * self.price_per_token
    }
}
