//! Plausibility checks on a merged entity set

use std::collections::HashSet;
use tct_core::EntitySet;

/// Rates above this fraction are flagged as unusually high
pub const HIGH_RATE_LIMIT: f64 = 0.5;

/// Check `entities` and return warnings in a stable order
///
/// Rates first, then brackets, then rules, then duplicate names. Never
/// fails; an empty list means nothing looked suspicious.
pub fn validate(entities: &EntitySet) -> Vec<String> {
    let mut warnings = Vec::new();

    for rate in &entities.rates {
        warnings.extend(rate_warning(&rate.name, rate.rate));
    }

    for (index, bracket) in entities.brackets.iter().enumerate() {
        if let Some(max) = bracket.max_amount {
            if bracket.min_amount > max {
                warnings.push(format!(
                    "Invalid bracket range at position {index}: min {} > max {}",
                    bracket.min_amount, max
                ));
            }
        }
    }

    for rule in &entities.rules {
        if let Some(rate) = rule.rate {
            warnings.extend(rate_warning(&format!("rule '{}'", rule.id), rate));
        }
        if rule.description.trim().is_empty() {
            warnings.push(format!("Rule '{}' missing description", rule.id));
        }
    }

    let mut names = HashSet::new();
    if !entities.rates.iter().all(|r| names.insert(r.name.as_str())) {
        warnings.push("Duplicate rate names detected".to_string());
    }

    warnings
}

fn rate_warning(label: &str, rate: f64) -> Option<String> {
    if rate > HIGH_RATE_LIMIT {
        Some(format!(
            "Unusually high rate detected: {label} = {rate} ({}%)",
            percent(rate)
        ))
    } else if rate < 0.0 {
        Some(format!(
            "Negative rate detected: {label} = {rate} ({}%)",
            percent(rate)
        ))
    } else {
        None
    }
}

/// Percentage with at most four decimals and no trailing zeros
fn percent(rate: f64) -> String {
    let formatted = format!("{:.4}", rate * 100.0);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
