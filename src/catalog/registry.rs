use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Function metadata the analyzer needs.
pub trait FunctionRegistry {
    fn is_aggregate(&self, name: &str) -> bool;

    /// Stateful functions observe row order (`runningDifference`, `neighbor`, ...).
    fn is_stateful(&self, name: &str) -> bool;
}

/// External dictionary metadata.
pub trait DictionaryRegistry {
    /// Whether `attribute` of `dictionary` is injective; `None` when the dictionary is unknown.
    fn is_injective(&self, dictionary: &str, attribute: &str) -> Option<bool>;
}

const AGGREGATE_COMBINATORS: &[&str] = &["If", "Array", "State", "Merge", "OrNull", "OrDefault", "Distinct"];

static BUILTIN_AGGREGATES: &[&str] = &[
    "count", "sum", "avg", "min", "max", "any", "anyLast", "argMin", "argMax",
    "uniq", "uniqExact", "uniqCombined", "uniqHLL12", "groupArray", "groupUniqArray",
    "quantile", "quantiles", "median", "varSamp", "varPop", "stddevSamp", "stddevPop",
    "topK", "sumWithOverflow", "groupBitAnd", "groupBitOr", "groupBitXor",
];

static BUILTIN_STATEFUL: &[&str] = &[
    "runningDifference", "runningDifferenceStartingWithFirstValue", "runningAccumulate",
    "neighbor", "rowNumberInBlock", "rowNumberInAllBlocks", "blockNumber",
];

static BUILTIN: Lazy<BuiltinFunctions> = Lazy::new(BuiltinFunctions::default_registry);

/// Case-insensitive registry of aggregate and stateful function names.
#[derive(Debug, Clone, Default)]
pub struct BuiltinFunctions {
    aggregates: HashSet<String>,
    stateful: HashSet<String>,
}

impl BuiltinFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_aggregate(&mut self, name: &str) {
        self.aggregates.insert(name.to_ascii_lowercase());
    }

    pub fn register_stateful(&mut self, name: &str) {
        self.stateful.insert(name.to_ascii_lowercase());
    }

    pub fn default_registry() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_AGGREGATES {
            registry.register_aggregate(name);
        }
        for name in BUILTIN_STATEFUL {
            registry.register_stateful(name);
        }
        registry
    }

    /// Shared instance of the default registry.
    pub fn shared() -> &'static BuiltinFunctions {
        &BUILTIN
    }

    fn is_plain_aggregate(&self, name: &str) -> bool {
        self.aggregates.contains(&name.to_ascii_lowercase())
    }
}

impl FunctionRegistry for BuiltinFunctions {
    fn is_aggregate(&self, name: &str) -> bool {
        if self.is_plain_aggregate(name) {
            return true;
        }
        // countIf, sumArray, uniqMergeState ...
        AGGREGATE_COMBINATORS.iter().any(|suffix| {
            name.strip_suffix(suffix)
                .filter(|base| !base.is_empty())
                .map(|base| self.is_aggregate(base))
                .unwrap_or(false)
        })
    }

    fn is_stateful(&self, name: &str) -> bool {
        self.stateful.contains(&name.to_ascii_lowercase())
    }
}

/// Registry without any dictionaries; every lookup is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDictionaries;

impl DictionaryRegistry for NoDictionaries {
    fn is_injective(&self, _dictionary: &str, _attribute: &str) -> Option<bool> {
        None
    }
}

/// In-memory dictionary metadata: dictionary -> attribute -> injective.
#[derive(Debug, Clone, Default)]
pub struct StaticDictionaries {
    by_name: HashMap<String, HashMap<String, bool>>,
}

impl StaticDictionaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, dictionary: &str, attribute: &str, injective: bool) -> Self {
        self.by_name
            .entry(dictionary.to_string())
            .or_default()
            .insert(attribute.to_string(), injective);
        self
    }
}

impl DictionaryRegistry for StaticDictionaries {
    fn is_injective(&self, dictionary: &str, attribute: &str) -> Option<bool> {
        let attributes = self.by_name.get(dictionary)?;
        Some(attributes.get(attribute).copied().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_are_case_insensitive_and_combinable() {
        let r = BuiltinFunctions::shared();
        assert!(r.is_aggregate("count"));
        assert!(r.is_aggregate("COUNT"));
        assert!(r.is_aggregate("countIf"));
        assert!(r.is_aggregate("uniqMergeState"));
        assert!(!r.is_aggregate("If"));
        assert!(!r.is_aggregate("plus"));
    }

    #[test]
    fn stateful_lookup() {
        let r = BuiltinFunctions::default_registry();
        assert!(r.is_stateful("runningDifference"));
        assert!(!r.is_stateful("toString"));
    }

    #[test]
    fn dictionaries() {
        let d = StaticDictionaries::new().with_attribute("regions", "name", true);
        assert_eq!(d.is_injective("regions", "name"), Some(true));
        assert_eq!(d.is_injective("regions", "population"), Some(false));
        assert_eq!(d.is_injective("missing", "name"), None);
        assert_eq!(NoDictionaries.is_injective("regions", "name"), None);
    }
}
