use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ast::JoinStrictness;

/// Strictness applied to joins written without ANY/ALL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultJoinStrictness {
    Any,
    #[default]
    All,
    /// No default; a join without ANY/ALL is rejected.
    Unset,
}

impl DefaultJoinStrictness {
    pub fn resolve(self) -> Option<JoinStrictness> {
        match self {
            DefaultJoinStrictness::Any => Some(JoinStrictness::Any),
            DefaultJoinStrictness::All => Some(JoinStrictness::All),
            DefaultJoinStrictness::Unset => None,
        }
    }
}

/// Options that change how queries are rewritten.
///
/// Every field has a default, so a settings document only needs to name
/// what it overrides:
///
/// ```
/// use sqlscope::analyzer::AnalyzerSettings;
///
/// let s = AnalyzerSettings::from_json(r#"{ "or_chain_to_in_threshold": 5 }"#).unwrap();
/// assert_eq!(s.or_chain_to_in_threshold, 5);
/// assert!(s.enable_predicate_pushdown);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Aggregate that `countDistinct` is rewritten to.
    pub distinct_count_implementation: String,
    pub enable_predicate_pushdown: bool,
    /// Minimum number of `x = const` disjuncts turned into `x IN (...)`; 0 disables.
    pub or_chain_to_in_threshold: usize,
    pub if_chain_to_multi_if: bool,
    pub join_default_strictness: DefaultJoinStrictness,
    /// Old ANY JOIN behaviour: ANY INNER becomes SEMI LEFT, other ANY joins prefer the right row.
    pub legacy_any_join_semantics: bool,
    pub max_subquery_depth: usize,
    pub optimize_duplicate_order_by_and_distinct: bool,
    /// Fail instead of warning when one alias names two different expressions.
    pub reject_conflicting_aliases: bool,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            distinct_count_implementation: "uniqExact".to_string(),
            enable_predicate_pushdown: true,
            or_chain_to_in_threshold: 3,
            if_chain_to_multi_if: false,
            join_default_strictness: DefaultJoinStrictness::All,
            legacy_any_join_semantics: false,
            max_subquery_depth: 100,
            optimize_duplicate_order_by_and_distinct: true,
            reject_conflicting_aliases: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings that keep the tree as close to the input as possible.
    pub fn without_optimizations() -> Self {
        Self {
            enable_predicate_pushdown: false,
            or_chain_to_in_threshold: 0,
            optimize_duplicate_order_by_and_distinct: false,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Per-call options of a SELECT analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectQueryOptions {
    /// Nesting level of the query being analyzed; 0 for the outermost one.
    pub subquery_depth: usize,
    /// Rename duplicated output columns and drop duplicates nobody asked for.
    /// Turned off for GLOBAL IN subqueries, whose column multiplicity must survive.
    pub remove_duplicates: bool,
}

impl Default for SelectQueryOptions {
    fn default() -> Self {
        Self { subquery_depth: 0, remove_duplicates: true }
    }
}

impl SelectQueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subquery(depth: usize) -> Self {
        Self { subquery_depth: depth, ..Self::default() }
    }

    pub fn keep_duplicates(mut self) -> Self {
        self.remove_duplicates = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let s = AnalyzerSettings::default();
        assert_eq!(s.distinct_count_implementation, "uniqExact");
        assert_eq!(s.join_default_strictness, DefaultJoinStrictness::All);
        assert_eq!(s.max_subquery_depth, 100);
        assert!(!s.if_chain_to_multi_if);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s = AnalyzerSettings::from_json(
            r#"{ "join_default_strictness": "unset", "distinct_count_implementation": "uniqCombined" }"#,
        )
        .unwrap();
        assert_eq!(s.join_default_strictness, DefaultJoinStrictness::Unset);
        assert_eq!(s.join_default_strictness.resolve(), None);
        assert_eq!(s.distinct_count_implementation, "uniqCombined");
        assert_eq!(s.or_chain_to_in_threshold, 3);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "if_chain_to_multi_if": true, "max_subquery_depth": 4 }}"#).unwrap();

        let s = AnalyzerSettings::from_json_file(file.path()).unwrap();
        assert!(s.if_chain_to_multi_if);
        assert_eq!(s.max_subquery_depth, 4);
    }

    #[test]
    fn bad_json_is_reported() {
        let err = AnalyzerSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
        let err = AnalyzerSettings::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
