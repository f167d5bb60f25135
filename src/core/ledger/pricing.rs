/// Per-model token pricing in dollars per token.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    pub model: &'static str,
    pub input_per_token: f64,
    pub output_per_token: f64,
    pub cache_read_per_token: f64,
    pub cache_create_per_token: f64,
}

static PRICING_TABLE: &[ModelPricing] = &[
    ModelPricing {
        model: "claude-haiku-4-5",
        input_per_token: 1e-6,
        output_per_token: 5e-6,
        cache_read_per_token: 1e-7,
        cache_create_per_token: 1.25e-6,
    },
    ModelPricing {
        model: "claude-sonnet-4-5",
        input_per_token: 3e-6,
        output_per_token: 1.5e-5,
        cache_read_per_token: 3e-7,
        cache_create_per_token: 3.75e-6,
    },
    ModelPricing {
        model: "claude-sonnet-4",
        input_per_token: 3e-6,
        output_per_token: 1.5e-5,
        cache_read_per_token: 3e-7,
        cache_create_per_token: 3.75e-6,
    },
    ModelPricing {
        model: "claude-opus-4-5",
        input_per_token: 5e-6,
        output_per_token: 2.5e-5,
        cache_read_per_token: 5e-7,
        cache_create_per_token: 6.25e-6,
    },
    ModelPricing {
        model: "claude-opus-4-6",
        input_per_token: 5e-6,
        output_per_token: 2.5e-5,
        cache_read_per_token: 5e-7,
        cache_create_per_token: 6.25e-6,
    },
    ModelPricing {
        model: "claude-opus-4",
        input_per_token: 1.5e-5,
        output_per_token: 7.5e-5,
        cache_read_per_token: 1.5e-6,
        cache_create_per_token: 1.875e-5,
    },
];

/// Normalize a model name by stripping common prefixes and suffixes.
/// Examples:
///   "anthropic.claude-sonnet-4-5-v2:0" -> "claude-sonnet-4-5"
///   "claude-sonnet-4-5-20250514" -> "claude-sonnet-4-5"
fn normalize_model(model: &str) -> String {
    let mut name = model.to_string();

    if let Some(stripped) = name.strip_prefix("anthropic.") {
        name = stripped.to_string();
    }

    // Strip platform suffixes like "-v2:0", ":0", "@001"
    if let Some(idx) = name.find(':') {
        name.truncate(idx);
    }
    if let Some(idx) = name.find('@') {
        name.truncate(idx);
    }
    if let Some(idx) = name.rfind("-v") {
        if name[idx + 2..].chars().all(|c| c.is_ascii_digit()) {
            name.truncate(idx);
        }
    }

    // Strip date suffixes like "-20250514"
    if name.len() > 9 {
        let tail = &name[name.len() - 9..];
        if tail.starts_with('-')
            && tail[1..].len() == 8
            && tail[1..].chars().all(|c| c.is_ascii_digit())
        {
            name.truncate(name.len() - 9);
        }
    }

    name
}

/// Look up pricing for a model name. Returns None if unknown.
pub fn lookup(model: &str) -> Option<&'static ModelPricing> {
    let normalized = normalize_model(model);
    PRICING_TABLE.iter().find(|p| p.model == normalized)
}

/// Total dollar cost for the given token counts. Unknown models cost 0.
pub fn cost_for(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_creation_tokens: u64,
) -> f64 {
    let Some(pricing) = lookup(model) else {
        return 0.0;
    };
    input_tokens as f64 * pricing.input_per_token
        + output_tokens as f64 * pricing.output_per_token
        + cache_read_tokens as f64 * pricing.cache_read_per_token
        + cache_creation_tokens as f64 * pricing.cache_create_per_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_anthropic_prefix() {
        assert_eq!(
            normalize_model("anthropic.claude-sonnet-4-5"),
            "claude-sonnet-4-5"
        );
    }

    #[test]
    fn normalize_strips_date_suffix() {
        assert_eq!(
            normalize_model("claude-sonnet-4-5-20250514"),
            "claude-sonnet-4-5"
        );
    }

    #[test]
    fn normalize_strips_platform_suffixes() {
        assert_eq!(normalize_model("claude-sonnet-4-5-v2:0"), "claude-sonnet-4-5");
        assert_eq!(normalize_model("claude-opus-4-5@001"), "claude-opus-4-5");
    }

    #[test]
    fn normalize_passthrough() {
        assert_eq!(normalize_model("claude-opus-4-6"), "claude-opus-4-6");
    }

    #[test]
    fn lookup_known_model() {
        let p = lookup("claude-sonnet-4-5").unwrap();
        assert!((p.input_per_token - 3e-6).abs() < 1e-12);
        assert!((p.output_per_token - 1.5e-5).abs() < 1e-12);
    }

    #[test]
    fn lookup_with_prefix_and_suffix() {
        let p = lookup("anthropic.claude-opus-4-6-20250514").unwrap();
        assert!((p.input_per_token - 5e-6).abs() < 1e-12);
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("gpt-4o").is_none());
    }

    #[test]
    fn cost_for_known_model() {
        let cost = cost_for("claude-sonnet-4-5", 1_000_000, 100_000, 500_000, 50_000);
        // 3.0 input + 1.5 output + 0.15 cache read + 0.1875 cache create
        assert!((cost - 4.8375).abs() < 1e-6);
    }

    #[test]
    fn cost_for_unknown_model_is_zero() {
        assert_eq!(cost_for("mystery-model", 1_000_000, 1_000_000, 0, 0), 0.0);
    }
}
