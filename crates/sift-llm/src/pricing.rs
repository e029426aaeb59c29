//! Cost calculation — pricing tables and per-call cost computation.
//!
//! Pricing tiers are per-million tokens. Unknown models have no implicit
//! fallback pricing; callers decide how to handle `None`.

/// Pricing tier per million tokens.
struct PricingTier {
    input_per_million: f64,
    output_per_million: f64,
}

// ─── Anthropic ───────────────────────────────────────────────────────────────

const SONNET: PricingTier = PricingTier {
    input_per_million: 3.0,
    output_per_million: 15.0,
};

const HAIKU: PricingTier = PricingTier {
    input_per_million: 1.0,
    output_per_million: 5.0,
};

const OPUS: PricingTier = PricingTier {
    input_per_million: 5.0,
    output_per_million: 25.0,
};

// ─── OpenAI ──────────────────────────────────────────────────────────────────

const GPT_4O: PricingTier = PricingTier {
    input_per_million: 2.5,
    output_per_million: 10.0,
};

const GPT_4O_MINI: PricingTier = PricingTier {
    input_per_million: 0.15,
    output_per_million: 0.6,
};

/// Look up the pricing tier for a model.
///
/// Pattern-matches on model family substrings. Returns `None` for unknown
/// models.
fn get_pricing_tier(model: &str) -> Option<&'static PricingTier> {
    let lower = model.to_lowercase();

    if lower.contains("opus") {
        return Some(&OPUS);
    }
    if lower.contains("sonnet") {
        return Some(&SONNET);
    }
    if lower.contains("haiku") {
        return Some(&HAIKU);
    }
    if lower.contains("gpt-4o-mini") {
        return Some(&GPT_4O_MINI);
    }
    if lower.contains("gpt-4o") {
        return Some(&GPT_4O);
    }

    None
}

/// Calculate cost in USD for one call.
///
/// Returns `None` when pricing is unavailable for the model.
#[must_use]
pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
    let pricing = get_pricing_tier(model)?;
    let input_cost = (input_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
    Some(input_cost + output_cost)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
