use thiserror::Error;

/// Diagnostic for a column the analyzed query needs but no table provides.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumnDiagnostic {
    pub missing: Vec<String>,
    pub query: String,
    pub required: Vec<String>,
    pub source: Vec<String>,
    pub joined: Vec<String>,
    pub array_join: Vec<String>,
}

impl std::fmt::Display for UnknownColumnDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "missing columns: {}", self.missing.join(", "))?;
        write!(f, " while processing query: '{}'", self.query)?;
        write!(f, ", required columns: {}", self.required.join(", "))?;
        write!(f, ", source columns: {}", self.source.join(", "))?;
        if !self.joined.is_empty() {
            write!(f, ", joined columns: {}", self.joined.join(", "))?;
        }
        if !self.array_join.is_empty() {
            write!(f, ", arrayJoin columns: {}", self.array_join.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzerError {
    #[error("empty list of columns in SELECT query: {query}")]
    EmptyProjection { query: String },

    #[error("no columns in nested table {0}")]
    EmptyNestedTable(String),

    #[error("cannot get JOIN keys from JOIN ON section: {0}")]
    InvalidJoinKeys(String),

    #[error("expected ANY or ALL in JOIN section, because join_default_strictness setting is empty")]
    UnspecifiedJoinStrictness,

    #[error("{0} is not implemented")]
    UnimplementedJoinVariant(String),

    #[error("{0}")]
    UnknownColumn(Box<UnknownColumnDiagnostic>),

    #[error("aggregate function {function} is found {location} in query")]
    MisplacedAggregate { function: String, location: String },

    #[error("wrong analyzer entry point: {0}")]
    WrongEntryPoint(String),

    #[error("cyclic aliases: {0}")]
    CyclicAliases(String),

    #[error("different expressions with the same alias {alias}: {first} and {second}")]
    ConflictingAlias { alias: String, first: String, second: String },

    #[error("unknown table in qualified asterisk: {0}")]
    UnknownTable(String),

    #[error("invalid COLUMNS matcher '{pattern}': {message}")]
    InvalidColumnsMatcher { pattern: String, message: String },

    #[error("too deep subqueries: depth {depth} exceeds max_subquery_depth {max}")]
    TooDeepSubqueries { depth: usize, max: usize },

    #[error("scalar subquery {query} failed: {message}")]
    ScalarSubquery { query: String, message: String },
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

impl AnalyzerError {
    pub fn unknown_column(diagnostic: UnknownColumnDiagnostic) -> Self {
        AnalyzerError::UnknownColumn(Box::new(diagnostic))
    }

    pub fn misplaced_aggregate(function: impl Into<String>, location: impl Into<String>) -> Self {
        AnalyzerError::MisplacedAggregate { function: function.into(), location: location.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_message_lists_context() {
        let err = AnalyzerError::unknown_column(UnknownColumnDiagnostic {
            missing: vec!["missing_col".into()],
            query: "SELECT missing_col FROM t".into(),
            required: vec!["missing_col".into()],
            source: vec!["a".into(), "b".into()],
            joined: vec![],
            array_join: vec![],
        });
        let text = err.to_string();
        assert!(text.starts_with("missing columns: missing_col"));
        assert!(text.contains("source columns: a, b"));
        assert!(!text.contains("joined columns"));
    }

    #[test]
    fn misplaced_aggregate_message() {
        let err = AnalyzerError::misplaced_aggregate("sum(x)", "in WHERE");
        assert_eq!(err.to_string(), "aggregate function sum(x) is found in WHERE in query");
    }
}
