use indexmap::IndexSet;
use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult, ArrayJoinMapping},
    ast::{Node, SelectQuery},
    catalog::{
        NameAndType,
        nested::{concatenate_name, split_name},
    },
};

pub struct ArrayJoinResolver;

impl ArrayJoinResolver {
    /// Maps every array-joined name the query reads to the array column it comes from.
    ///
    /// When the query reads none of them, the first ARRAY JOIN expression is
    /// still mapped so rows get multiplied: directly for an array column or
    /// an expression, through its first column for a nested table.
    pub fn resolve(
        select: &SelectQuery,
        source_columns: &[NameAndType],
        source_names: &IndexSet<String>,
    ) -> AnalyzerResult<ArrayJoinMapping> {
        let mut mapping = ArrayJoinMapping::default();
        let Some(array_join) = select.array_join_clause() else { return Ok(mapping) };

        for expr in &array_join.expressions {
            let name = expr.column_name();
            let alias = expr.alias_or_column_name();
            mapping.alias_to_name.insert(alias.clone(), name.clone());
            mapping.name_to_alias.insert(name, alias);
        }

        let mut roots = select.expressions_outside_array_join();
        for expr in &array_join.expressions {
            if let Node::Function(f) = expr {
                roots.extend(f.args.iter());
            }
        }
        for root in roots {
            root.walk(&mut |node| {
                if let Node::Identifier(id) = node {
                    if !id.denotes_table {
                        Self::map_identifier(&id.name(), &mut mapping);
                    }
                }
            });
        }

        if mapping.result_to_source.is_empty() {
            if let Some(first) = array_join.expressions.first() {
                Self::map_unused(first, source_columns, source_names, &mut mapping)?;
            }
        }
        debug!(columns = mapping.result_to_source.len(), "array join columns resolved");
        Ok(mapping)
    }

    fn map_identifier(name: &str, mapping: &mut ArrayJoinMapping) {
        let (table, field) = split_name(name);
        let ArrayJoinMapping { alias_to_name, name_to_alias, result_to_source } = mapping;

        if let Some(source) = alias_to_name.get(name) {
            // ARRAY JOIN arr AS a ... SELECT a
            result_to_source.insert(name.to_string(), source.clone());
        } else if let Some(source) = alias_to_name.get(table).filter(|_| !field.is_empty()) {
            // ARRAY JOIN n AS m ... SELECT m.x
            result_to_source.insert(name.to_string(), concatenate_name(source, field));
        } else if let Some(alias) = name_to_alias.get(name) {
            // ARRAY JOIN arr AS a ... SELECT arr
            result_to_source.insert(alias.clone(), name.to_string());
        } else if let Some(alias) = name_to_alias.get(table).filter(|_| !field.is_empty()) {
            // ARRAY JOIN n AS m ... SELECT n.x
            result_to_source.insert(concatenate_name(alias, field), name.to_string());
        }
    }

    fn map_unused(
        expr: &Node,
        source_columns: &[NameAndType],
        source_names: &IndexSet<String>,
        mapping: &mut ArrayJoinMapping,
    ) -> AnalyzerResult<()> {
        let source = expr.column_name();
        let result = expr.alias_or_column_name();

        if !matches!(expr, Node::Identifier(_)) || source_names.contains(&source) {
            mapping.result_to_source.insert(result, source);
            return Ok(());
        }

        let column = source_columns.iter().find_map(|c| {
            let (table, field) = split_name(&c.name);
            (table == source && !field.is_empty()).then(|| (field.to_string(), c.name.clone()))
        });
        match column {
            Some((field, column)) => {
                mapping.result_to_source.insert(concatenate_name(&result, &field), column);
                Ok(())
            }
            None => Err(AnalyzerError::EmptyNestedTable(source)),
        }
    }
}
