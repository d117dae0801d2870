//! Token-to-USD cost accounting.

/// Price per million tokens, in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Model whose pricing applies to unrecognized models.
pub const DEFAULT_PRICING_MODEL: &str = "gpt-4-turbo-preview";

const PRICING: &[(&str, ModelPricing)] = &[
    ("gpt-4-turbo-preview", ModelPricing { input_per_million: 10.0, output_per_million: 30.0 }),
    ("gpt-4", ModelPricing { input_per_million: 30.0, output_per_million: 60.0 }),
    ("gpt-3.5-turbo", ModelPricing { input_per_million: 0.5, output_per_million: 1.5 }),
    ("o4-mini", ModelPricing { input_per_million: 1.1, output_per_million: 4.4 }),
    ("gpt-4o", ModelPricing { input_per_million: 2.5, output_per_million: 10.0 }),
    ("gpt-4o-mini", ModelPricing { input_per_million: 0.15, output_per_million: 0.6 }),
];

/// Pricing for `model`, falling back to [`DEFAULT_PRICING_MODEL`].
pub fn pricing_for(model: &str) -> ModelPricing {
    lookup(model)
        .or_else(|| lookup(DEFAULT_PRICING_MODEL))
        .unwrap_or(ModelPricing {
            input_per_million: 10.0,
            output_per_million: 30.0,
        })
}

fn lookup(model: &str) -> Option<ModelPricing> {
    PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, pricing)| *pricing)
}

/// USD cost of `token_in` input and `token_out` output tokens on `model`.
pub fn format_cost(token_in: u64, token_out: u64, model: &str) -> f64 {
    let pricing = pricing_for(model);
    (token_in as f64 / 1_000_000.0) * pricing.input_per_million
        + (token_out as f64 / 1_000_000.0) * pricing.output_per_million
}
