use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult, SyntaxAnalyzerResult, UnknownColumnDiagnostic},
    ast::Node,
    catalog::{NameAndType, Storage, nested::split_name},
};

/// Type size assumed for columns without a fixed-size representation.
const UNKNOWN_TYPE_SIZE: usize = 100;

/// Column names one query level reads, with how many times each is read.
#[derive(Debug, Default)]
struct RequiredNames {
    inclusion: IndexMap<String, usize>,
}

impl RequiredNames {
    fn add(&mut self, name: String) {
        *self.inclusion.entry(name).or_insert(0) += 1;
    }

    fn inclusion(&self, name: &str) -> usize {
        self.inclusion.get(name).copied().unwrap_or(0)
    }

    fn names(&self) -> IndexSet<String> {
        self.inclusion.keys().cloned().collect()
    }
}

pub struct RequiredColumnsResolver;

impl RequiredColumnsResolver {
    /// Narrows `source_columns` to what the query reads and stores it in `required_source_columns`.
    ///
    /// Joined columns the query needs are recorded on the analyzed join
    /// instead. A SELECT that reads no column still reads the cheapest one
    /// so the row count is known.
    pub fn collect_used_columns(result: &mut SyntaxAnalyzerResult, storage: Option<&dyn Storage>) -> AnalyzerResult<()> {
        let names = Self::referenced_names(result);
        let source_names = result.source_column_names();
        let mut required = names.names();

        if let Some(join) = result.analyzed_join.as_mut() {
            let joined: Vec<NameAndType> = join.columns_from_joined_table.clone();
            join.columns_added_by_join.clear();
            for column in joined {
                if source_names.contains(&column.name) || !required.contains(&column.name) {
                    continue;
                }
                // columns read only by the ON section stay on the right side
                if names.inclusion(&column.name) > join.right_key_inclusion(&column.name) {
                    join.add_joined_column(column.clone());
                }
                required.shift_remove(&column.name);
            }
        }

        let array_join_sources = result.array_join.sources();
        for column in &result.source_columns {
            if array_join_sources.contains(&column.name) {
                required.insert(column.name.clone());
            }
        }

        result.maybe_optimize_trivial_count = false;
        if required.is_empty() && result.query.as_select().is_some() {
            result.maybe_optimize_trivial_count = true;
            if let Some(cheapest) = Self::cheapest_column(&result.source_columns, storage) {
                debug!(column = %cheapest, "no column read, using the cheapest one");
                required.insert(cheapest);
            }
        }

        let mut required_columns: Vec<NameAndType> =
            result.source_columns.iter().filter(|c| required.contains(&c.name)).cloned().collect();

        let mut unknown: BTreeSet<String> = required.iter().filter(|n| !source_names.contains(*n)).cloned().collect();
        if let Some(storage) = storage {
            unknown.retain(|name| match storage.get_column(name) {
                Some(column) => {
                    required_columns.push(column);
                    false
                }
                None => true,
            });
        }

        if !unknown.is_empty() {
            let mut all_required: Vec<String> = names.names().into_iter().collect();
            all_required.sort();
            let diagnostic = UnknownColumnDiagnostic {
                missing: unknown.into_iter().collect(),
                query: result.query.to_string(),
                required: all_required,
                source: source_names.into_iter().collect(),
                joined: result
                    .analyzed_join
                    .iter()
                    .flat_map(|j| j.columns_from_joined_table.iter().map(|c| c.name.clone()))
                    .collect(),
                array_join: array_join_sources.into_iter().collect(),
            };
            return Err(AnalyzerError::unknown_column(diagnostic));
        }

        debug!(
            required = required_columns.len(),
            source = result.source_columns.len(),
            "required source columns collected"
        );
        result.required_source_columns = required_columns;
        Ok(())
    }

    fn referenced_names(result: &SyntaxAnalyzerResult) -> RequiredNames {
        let mut names = RequiredNames::default();
        let roots: Vec<&Node> = match result.query.as_select() {
            Some(select) => {
                let mut roots = select.expressions_outside_array_join();
                if let Some(array_join) = select.array_join_clause() {
                    roots.extend(array_join.expressions.iter().filter(|e| !matches!(e, Node::Identifier(_))));
                }
                roots
            }
            None => vec![&result.query],
        };

        let array_joined = &result.array_join;
        for root in roots {
            root.walk(&mut |node| {
                let Node::Identifier(id) = node else { return };
                if id.denotes_table {
                    return;
                }
                let name = id.name();
                let (table, field) = split_name(&name);
                let is_array_joined = array_joined.result_to_source.contains_key(&name)
                    || array_joined.alias_to_name.contains_key(&name)
                    || (!field.is_empty() && array_joined.alias_to_name.contains_key(table));
                if !is_array_joined {
                    names.add(name);
                }
            });
        }
        names
    }

    /// The column cheapest to read: by on-disk sizes when storage knows them, by type size otherwise.
    fn cheapest_column(columns: &[NameAndType], storage: Option<&dyn Storage>) -> Option<String> {
        let sizes = storage.map(|s| s.column_sizes()).unwrap_or_default();
        let measured = columns
            .iter()
            .filter_map(|c| {
                let size = sizes.get(&c.name)?;
                Some(((size.data_compressed, Self::type_size(c), size.data_uncompressed), &c.name))
            })
            .min_by_key(|(key, _)| *key);

        match measured {
            Some((_, name)) => Some(name.clone()),
            None => columns.iter().min_by_key(|c| Self::type_size(c)).map(|c| c.name.clone()),
        }
    }

    fn type_size(column: &NameAndType) -> usize {
        column.ty.maximum_size_of_value().unwrap_or(UNKNOWN_TYPE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::AnalyzedJoin,
        ast::{JoinKind, JoinStrictness, SelectQuery, TableJoin},
        catalog::{DataType, InMemoryStorage},
    };

    fn storage() -> InMemoryStorage {
        InMemoryStorage::new(vec![
            NameAndType::new("id", DataType::UInt64),
            NameAndType::new("name", DataType::String),
            NameAndType::new("flag", DataType::UInt8),
        ])
        .with_virtual(NameAndType::new("_part", DataType::String))
    }

    fn analyze(select: SelectQuery, storage: &InMemoryStorage) -> AnalyzerResult<SyntaxAnalyzerResult> {
        let mut result = SyntaxAnalyzerResult::new(Node::select(select), vec![], Some(storage), false);
        result.collect_used_columns(Some(storage))?;
        Ok(result)
    }

    #[test]
    fn keeps_only_read_columns() {
        let s = storage();
        let q = SelectQuery::new(vec![Node::ident("name")]).from_table("t").filter(Node::ident("flag"));
        let result = analyze(q, &s).unwrap();
        assert_eq!(result.required_source_column_names(), vec!["name", "flag"]);
        assert_eq!(result.source_columns.len(), 3);
        assert!(!result.maybe_optimize_trivial_count);
    }

    #[test]
    fn virtual_columns_are_recovered() {
        let s = storage();
        let q = SelectQuery::new(vec![Node::ident("_part")]).from_table("t");
        let result = analyze(q, &s).unwrap();
        assert_eq!(result.required_source_column_names(), vec!["_part"]);
    }

    #[test]
    fn trivial_count_uses_type_size_without_statistics() {
        let s = storage();
        let q = SelectQuery::new(vec![Node::func("count", vec![])]).from_table("t");
        let result = analyze(q, &s).unwrap();
        assert!(result.maybe_optimize_trivial_count);
        assert_eq!(result.required_source_column_names(), vec!["flag"]);
    }

    #[test]
    fn trivial_count_prefers_compressed_size() {
        let s = storage().with_size("id", 10, 800).with_size("name", 5, 900).with_size("flag", 10, 100);
        let q = SelectQuery::new(vec![Node::func("count", vec![])]).from_table("t");
        let result = analyze(q, &s).unwrap();
        assert_eq!(result.required_source_column_names(), vec!["name"]);
    }

    #[test]
    fn variable_size_types_count_as_a_hundred_bytes() {
        let s = InMemoryStorage::new(vec![
            NameAndType::new("code", DataType::FixedString(200)),
            NameAndType::new("comment", DataType::String),
        ]);
        let q = SelectQuery::new(vec![Node::func("count", vec![])]).from_table("t");
        let result = analyze(q, &s).unwrap();
        assert_eq!(result.required_source_column_names(), vec!["comment"]);

        let s = InMemoryStorage::new(vec![
            NameAndType::new("comment", DataType::String),
            NameAndType::new("code", DataType::FixedString(16)),
        ]);
        let q = SelectQuery::new(vec![Node::func("count", vec![])]).from_table("t");
        assert_eq!(analyze(q, &s).unwrap().required_source_column_names(), vec!["code"]);
    }

    #[test]
    fn unknown_column_lists_context() {
        let s = storage();
        let q = SelectQuery::new(vec![Node::ident("missing_col"), Node::ident("id")]).from_table("t");
        let err = analyze(q, &s).unwrap_err();
        let AnalyzerError::UnknownColumn(diagnostic) = err else { panic!("unexpected error") };
        assert_eq!(diagnostic.missing, vec!["missing_col"]);
        assert_eq!(diagnostic.required, vec!["id", "missing_col"]);
        assert_eq!(diagnostic.source, vec!["id", "name", "flag"]);
        assert_eq!(diagnostic.query, "SELECT missing_col, id FROM t");
    }

    #[test]
    fn joined_columns_needed_only_by_on_are_not_added() {
        let s = storage();
        let q = SelectQuery::new(vec![Node::ident("name"), Node::ident("v")])
            .from_table("t")
            .filter(Node::func("equals", vec![Node::ident("id"), Node::ident("k")]));
        let mut result = SyntaxAnalyzerResult::new(Node::select(q), vec![], Some(&s), false);
        let mut join = AnalyzedJoin::new(&TableJoin::new(JoinKind::Left, JoinStrictness::All));
        join.columns_from_joined_table = vec![
            NameAndType::new("k", DataType::UInt64),
            NameAndType::new("v", DataType::String),
            NameAndType::new("w", DataType::String),
        ];
        join.add_on_keys(&Node::ident("id"), &Node::ident("k"));
        result.analyzed_join = Some(join);

        result.collect_used_columns(Some(&s)).unwrap();
        let added: Vec<&str> = result
            .analyzed_join
            .as_ref()
            .map(|j| j.columns_added_by_join.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(added, vec!["v"]);
        assert_eq!(result.required_source_column_names(), vec!["id", "name"]);

        // running again over the same query changes nothing
        let first = result.clone();
        result.collect_used_columns(Some(&s)).unwrap();
        assert_eq!(result, first);
    }
}
