//! Merging of per-chunk entity sets

use serde_json::Value;
use std::collections::HashSet;
use tct_core::EntitySet;
use tracing::debug;

/// Incremental merger, fed one chunk result at a time
///
/// Categories keyed by name (rates, thresholds, deadlines) or id (rules)
/// keep the first occurrence. Brackets are concatenated as is. Extras are
/// a key-wise union: lists append, scalars keep the first value seen.
#[derive(Debug, Default)]
pub struct EntityMerger {
    merged: EntitySet,
    seen_tax_types: HashSet<tct_core::TaxType>,
    seen_rates: HashSet<String>,
    seen_thresholds: HashSet<String>,
    seen_deadlines: HashSet<String>,
    seen_rules: HashSet<String>,
    absorbed: usize,
}

impl EntityMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sets absorbed so far
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Fold one chunk's entities into the running result
    pub fn absorb(&mut self, set: EntitySet) {
        let before = self.merged.entity_count();
        let incoming = set.entity_count();

        for tax_type in set.tax_types {
            if self.seen_tax_types.insert(tax_type) {
                self.merged.tax_types.push(tax_type);
            }
        }
        for rate in set.rates {
            if self.seen_rates.insert(rate.name.clone()) {
                self.merged.rates.push(rate);
            }
        }
        self.merged.brackets.extend(set.brackets);
        for threshold in set.thresholds {
            if self.seen_thresholds.insert(threshold.name.clone()) {
                self.merged.thresholds.push(threshold);
            }
        }
        for deadline in set.deadlines {
            if self.seen_deadlines.insert(deadline.name.clone()) {
                self.merged.deadlines.push(deadline);
            }
        }
        for rule in set.rules {
            if self.seen_rules.insert(rule.id.clone()) {
                self.merged.rules.push(rule);
            }
        }

        let mut keys: Vec<_> = set.extras.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in keys {
            match self.merged.extras.get_mut(&key) {
                None => {
                    self.merged.extras.insert(key, value);
                }
                Some(Value::Array(existing)) => {
                    if let Value::Array(items) = value {
                        existing.extend(items);
                    }
                }
                Some(_) => {}
            }
        }

        self.absorbed += 1;
        debug!(
            chunk = self.absorbed,
            incoming,
            kept = self.merged.entity_count() - before,
            "Merged chunk entities"
        );
    }

    /// The merged set
    pub fn finish(self) -> EntitySet {
        self.merged
    }
}

/// Merge entity sets in order
pub fn merge<I>(sets: I) -> EntitySet
where
    I: IntoIterator<Item = EntitySet>,
{
    let mut merger = EntityMerger::new();
    for set in sets {
        merger.absorb(set);
    }
    merger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tct_core::{
        TaxBracket, TaxDeadline, TaxRate, TaxRule, TaxThreshold, TaxType, EXTRA_CONFIDENCE,
        EXTRA_SUMMARY, EXTRA_WARNINGS,
    };

    fn sample() -> EntitySet {
        EntitySet {
            tax_types: vec![TaxType::Vat, TaxType::Excise],
            rates: vec![TaxRate::new("standard", 0.19), TaxRate::new("reduced", 0.07)],
            brackets: vec![TaxBracket::new(0.0, Some(10_000.0), 0.0)],
            thresholds: vec![TaxThreshold::new("small_business", 22_000.0)],
            deadlines: vec![TaxDeadline::new("vat_return", "filing", "monthly")],
            rules: vec![TaxRule::new("rule_0", "reverse charge", "B2B services", TaxType::Vat)],
            ..EntitySet::default()
        }
        .with_extra(EXTRA_SUMMARY, "German VAT act")
        .with_extra(EXTRA_WARNINGS, json!(["page 3 unreadable"]))
    }

    #[test]
    fn test_merge_single_is_identity() {
        let set = sample();
        assert_eq!(merge([set.clone()]), set);
    }

    #[test]
    fn test_merge_empty_input() {
        assert_eq!(merge(Vec::new()), EntitySet::default());
    }

    #[test]
    fn test_merge_duplicate_set() {
        let set = sample();
        let merged = merge([set.clone(), set.clone()]);

        assert_eq!(merged.tax_types, set.tax_types);
        assert_eq!(merged.rates, set.rates);
        assert_eq!(merged.thresholds, set.thresholds);
        assert_eq!(merged.deadlines, set.deadlines);
        assert_eq!(merged.rules, set.rules);
        assert_eq!(merged.brackets.len(), 2 * set.brackets.len());
        assert_eq!(merged.extra_strings(EXTRA_WARNINGS).len(), 2);
    }

    #[test]
    fn test_first_rate_wins() {
        let first = EntitySet {
            rates: vec![TaxRate::new("standard", 0.19)],
            ..EntitySet::default()
        };
        let second = EntitySet {
            rates: vec![TaxRate::new("standard", 0.20), TaxRate::new("reduced", 0.07)],
            ..EntitySet::default()
        };

        let merged = merge([first, second]);
        assert_eq!(merged.rates.len(), 2);
        assert_eq!(merged.rates[0].rate, 0.19);
        assert_eq!(merged.rates[1].name, "reduced");
    }

    #[test]
    fn test_first_threshold_and_deadline_win() {
        let first = EntitySet {
            thresholds: vec![TaxThreshold::new("small_business", 22_000.0)],
            deadlines: vec![TaxDeadline::new("vat_return", "filing", "monthly")],
            ..EntitySet::default()
        };
        let second = EntitySet {
            thresholds: vec![
                TaxThreshold::new("small_business", 50_000.0),
                TaxThreshold::new("distance_selling", 10_000.0),
            ],
            deadlines: vec![TaxDeadline::new("vat_return", "filing", "quarterly")],
            ..EntitySet::default()
        };

        let merged = merge([first, second]);
        assert_eq!(merged.thresholds.len(), 2);
        assert_eq!(merged.thresholds[0].amount, 22_000.0);
        assert_eq!(merged.thresholds[1].name, "distance_selling");
        assert_eq!(merged.deadlines.len(), 1);
        assert_eq!(merged.deadlines[0].frequency, "monthly");
    }

    #[test]
    fn test_mismatched_extra_types_keep_first() {
        let a = EntitySet::default()
            .with_extra("notes", json!(["first"]))
            .with_extra("source", "act");
        let b = EntitySet::default()
            .with_extra("notes", "scalar")
            .with_extra("source", json!(["appendix"]));

        let merged = merge([a, b]);
        assert_eq!(merged.extras["notes"], json!(["first"]));
        assert_eq!(merged.extras["source"], "act");
    }

    #[test]
    fn test_tax_types_union_in_first_seen_order() {
        let a = EntitySet {
            tax_types: vec![TaxType::Income],
            ..EntitySet::default()
        };
        let b = EntitySet {
            tax_types: vec![TaxType::Vat, TaxType::Income, TaxType::Payroll],
            ..EntitySet::default()
        };

        let merged = merge([a, b]);
        assert_eq!(
            merged.tax_types,
            vec![TaxType::Income, TaxType::Vat, TaxType::Payroll]
        );
    }

    #[test]
    fn test_scalar_extras_keep_first_lists_append() {
        let a = EntitySet::default()
            .with_extra(EXTRA_SUMMARY, "chunk one")
            .with_extra(EXTRA_CONFIDENCE, 0.9)
            .with_extra(EXTRA_WARNINGS, json!(["a"]));
        let b = EntitySet::default()
            .with_extra(EXTRA_SUMMARY, "chunk two")
            .with_extra(EXTRA_CONFIDENCE, 0.4)
            .with_extra(EXTRA_WARNINGS, json!(["b", "c"]))
            .with_extra("source", "appendix");

        let merged = merge([a, b]);
        assert_eq!(merged.summary(), Some("chunk one"));
        assert_eq!(merged.confidence_score(), Some(0.9));
        assert_eq!(merged.extra_strings(EXTRA_WARNINGS), vec!["a", "b", "c"]);
        assert_eq!(merged.extras["source"], "appendix");
    }

    #[test]
    fn test_incremental_matches_batch() {
        let mut merger = EntityMerger::new();
        merger.absorb(sample());
        merger.absorb(EntitySet::default());
        assert_eq!(merger.absorbed(), 2);
        assert_eq!(merger.finish(), merge([sample(), EntitySet::default()]));
    }

    fn rate_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..6)
            .prop_map(|names| names.into_iter().map(str::to_string).collect())
    }

    proptest! {
        #[test]
        fn test_merged_rate_names_are_unique(chunks in prop::collection::vec(rate_names(), 0..5)) {
            let sets: Vec<EntitySet> = chunks
                .iter()
                .map(|names| EntitySet {
                    rates: names.iter().map(|n| TaxRate::new(n.clone(), 0.1)).collect(),
                    brackets: vec![TaxBracket::new(0.0, None, 0.1)],
                    ..EntitySet::default()
                })
                .collect();

            let merged = merge(sets.clone());
            let mut expected: Vec<String> = Vec::new();
            for name in chunks.iter().flatten() {
                if !expected.contains(name) {
                    expected.push(name.clone());
                }
            }
            let names: Vec<String> = merged.rates.iter().map(|r| r.name.clone()).collect();
            prop_assert_eq!(names, expected);
            prop_assert_eq!(merged.brackets.len(), sets.len());
        }
    }
}
