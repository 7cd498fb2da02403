use indexmap::{IndexMap, IndexSet};

use crate::{
    analyzer::{AnalyzedJoin, AnalyzerResult, RequiredColumnsResolver},
    ast::{Function, Literal, Node},
    catalog::{remove_duplicate_columns, NameAndType, Storage},
};

/// Alias name -> the expression it names, on one query level.
pub type Aliases = IndexMap<String, Node>;

/// Rendered scalar subquery -> the row it evaluated to.
pub type Scalars = IndexMap<String, Vec<Literal>>;

/// How ARRAY JOIN results map to the columns they come from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayJoinMapping {
    /// `ARRAY JOIN src AS alias`: alias -> src.
    pub alias_to_name: IndexMap<String, String>,
    /// src -> alias.
    pub name_to_alias: IndexMap<String, String>,
    /// Each array-joined name the query reads -> the array column it is taken from.
    pub result_to_source: IndexMap<String, String>,
}

impl ArrayJoinMapping {
    pub fn sources(&self) -> IndexSet<String> {
        self.result_to_source.values().cloned().collect()
    }
}

/// Everything the planner needs from semantic analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxAnalyzerResult {
    /// The rewritten query.
    pub query: Node,
    /// Columns the primary table offers, deduplicated by name.
    pub source_columns: Vec<NameAndType>,
    /// The subset of `source_columns` (plus recovered virtual columns) the query reads.
    pub required_source_columns: Vec<NameAndType>,
    pub aliases: Aliases,
    pub analyzed_join: Option<AnalyzedJoin>,
    /// Aggregate calls, one per distinct column name.
    pub aggregates: Vec<Function>,
    pub scalars: Scalars,
    pub array_join: ArrayJoinMapping,
    /// Predicates were pushed into FROM subqueries.
    pub rewrite_subqueries: bool,
    /// The query reads no column; only the row count matters.
    pub maybe_optimize_trivial_count: bool,
}

impl SyntaxAnalyzerResult {
    /// Starts a result from caller columns followed by storage columns.
    pub fn new(query: Node, source_columns: Vec<NameAndType>, storage: Option<&dyn Storage>, add_virtuals: bool) -> Self {
        let mut result = Self {
            query,
            source_columns,
            required_source_columns: vec![],
            aliases: Aliases::new(),
            analyzed_join: None,
            aggregates: vec![],
            scalars: Scalars::new(),
            array_join: ArrayJoinMapping::default(),
            rewrite_subqueries: false,
            maybe_optimize_trivial_count: false,
        };
        result.collect_source_columns(storage, add_virtuals);
        result
    }

    fn collect_source_columns(&mut self, storage: Option<&dyn Storage>, add_virtuals: bool) {
        if let Some(storage) = storage {
            self.source_columns.extend(storage.columns(add_virtuals));
        }
        remove_duplicate_columns(&mut self.source_columns);
    }

    pub fn source_column_names(&self) -> IndexSet<String> {
        self.source_columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Computes `required_source_columns` from the current query.
    ///
    /// Starts over from `source_columns` every time, so running it again
    /// over an unchanged query gives the same answer.
    pub fn collect_used_columns(&mut self, storage: Option<&dyn Storage>) -> AnalyzerResult<()> {
        RequiredColumnsResolver::collect_used_columns(self, storage)
    }

    pub fn required_source_column_names(&self) -> Vec<&str> {
        self.required_source_columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, InMemoryStorage};

    #[test]
    fn source_columns_prefer_caller_columns() {
        let storage = InMemoryStorage::new(vec![
            NameAndType::new("a", DataType::UInt8),
            NameAndType::new("b", DataType::String),
        ])
        .with_virtual(NameAndType::new("_part", DataType::String));

        let result = SyntaxAnalyzerResult::new(
            Node::ident("a"),
            vec![NameAndType::new("a", DataType::UInt64)],
            Some(&storage),
            false,
        );
        assert_eq!(result.source_columns.len(), 2);
        assert_eq!(result.source_columns[0].ty, DataType::UInt64);

        let with_virtuals = SyntaxAnalyzerResult::new(Node::ident("a"), vec![], Some(&storage), true);
        assert!(with_virtuals.source_column_names().contains("_part"));
    }
}
