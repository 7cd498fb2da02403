use std::collections::HashSet;

use indexmap::IndexSet;
use regex::Regex;
use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult, Aliases, UnknownColumnDiagnostic},
    ast::{Identifier, Node, SelectQuery},
    catalog::{DatabaseAndTableWithAlias, TableWithColumnNames},
};

pub struct QualifiedNameResolver;

impl QualifiedNameResolver {
    /// Strips table qualifiers from column references and expands wildcards in the SELECT list.
    ///
    /// `tables` holds the primary table first and the joined table second.
    /// A joined column whose name is also a left column keeps the joined
    /// table's prefix (`u.b`), matching the joined columns of the analyzed join.
    pub fn translate(
        select: &mut SelectQuery,
        source_columns: &IndexSet<String>,
        tables: &[TableWithColumnNames],
        aliases: &Aliases,
    ) -> AnalyzerResult<()> {
        let mut error = None;
        for expr in select.expressions_mut() {
            expr.walk_mut(&mut |node| {
                if error.is_some() {
                    return;
                }
                if let Node::Identifier(id) = node {
                    if let Err(e) = Self::translate_identifier(id, source_columns, tables, aliases) {
                        error = Some(e);
                    }
                }
            });
        }
        if let Some(mut err) = error {
            if let AnalyzerError::UnknownColumn(diagnostic) = &mut err {
                diagnostic.query = select.to_string();
            }
            return Err(err);
        }

        Self::expand_select_list(select, source_columns, tables)?;
        if select.select.is_empty() {
            return Err(AnalyzerError::EmptyProjection { query: select.to_string() });
        }
        Ok(())
    }

    fn translate_identifier(
        id: &mut Identifier,
        source_columns: &IndexSet<String>,
        tables: &[TableWithColumnNames],
        aliases: &Aliases,
    ) -> AnalyzerResult<()> {
        if id.denotes_table || id.is_short() || aliases.contains_key(&id.name()) {
            return Ok(());
        }
        // no table matches: a nested column such as `n.x`
        let Some((pos, matched)) = Self::best_table(&id.parts, tables) else {
            return Ok(());
        };

        let table = &tables[pos];
        let short_name = id.parts[matched..].join(".");
        if !table.columns.is_empty() && !table.columns.contains(&short_name) {
            return Err(AnalyzerError::unknown_column(UnknownColumnDiagnostic {
                missing: vec![id.name()],
                query: String::new(),
                required: vec![],
                source: table.columns.clone(),
                joined: vec![],
                array_join: vec![],
            }));
        }

        id.membership = Some(pos);
        id.set_name(Self::column_name(pos, &table.table, &short_name, source_columns));
        Ok(())
    }

    /// Table a qualified name refers to and the number of parts naming it; the longest match wins.
    pub fn best_table(parts: &[String], tables: &[TableWithColumnNames]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (pos, table) in tables.iter().enumerate() {
            let matched = table.table.matching_parts(parts);
            if matched > 0 && best.map(|(_, m)| matched > m).unwrap_or(true) {
                best = Some((pos, matched));
            }
        }
        best
    }

    fn column_name(pos: usize, table: &DatabaseAndTableWithAlias, column: &str, source_columns: &IndexSet<String>) -> String {
        if pos > 0 && source_columns.contains(column) {
            format!("{}{}", table.qualified_name_prefix(), column)
        } else {
            column.to_string()
        }
    }

    fn column_identifier(pos: usize, table: &DatabaseAndTableWithAlias, column: &str, source_columns: &IndexSet<String>) -> Node {
        let mut id = Identifier::new("");
        id.set_name(Self::column_name(pos, table, column, source_columns));
        id.membership = Some(pos);
        Node::Identifier(id)
    }

    fn expand_select_list(
        select: &mut SelectQuery,
        source_columns: &IndexSet<String>,
        tables: &[TableWithColumnNames],
    ) -> AnalyzerResult<()> {
        let implicit;
        let tables = if tables.is_empty() {
            implicit = [TableWithColumnNames {
                table: DatabaseAndTableWithAlias::default(),
                columns: source_columns.iter().cloned().collect(),
            }];
            &implicit[..]
        } else {
            tables
        };

        // joined copies of USING keys are not repeated by `*`
        let using_columns: HashSet<String> = select
            .join_element()
            .and_then(|j| j.table_join.using.as_ref())
            .map(|keys| keys.iter().map(Node::alias_or_column_name).collect())
            .unwrap_or_default();

        let elements = std::mem::take(&mut select.select);
        let before = elements.len();
        let mut expanded = Vec::with_capacity(elements.len());

        for element in elements {
            match element {
                Node::Asterisk => {
                    for (pos, table) in tables.iter().enumerate() {
                        for column in &table.columns {
                            if pos == 0 || !using_columns.contains(column) {
                                expanded.push(Self::column_identifier(pos, &table.table, column, source_columns));
                            }
                        }
                    }
                }
                Node::QualifiedAsterisk(qualifier) => {
                    let pos = tables
                        .iter()
                        .position(|t| t.table.matches_qualifier(&qualifier))
                        .ok_or_else(|| AnalyzerError::UnknownTable(qualifier.clone()))?;
                    for column in &tables[pos].columns {
                        expanded.push(Self::column_identifier(pos, &tables[pos].table, column, source_columns));
                    }
                }
                Node::ColumnsMatcher(pattern) => {
                    let matcher = Regex::new(&pattern).map_err(|e| AnalyzerError::InvalidColumnsMatcher {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                    for (pos, table) in tables.iter().enumerate() {
                        for column in &table.columns {
                            if matcher.is_match(column) && (pos == 0 || !using_columns.contains(column)) {
                                expanded.push(Self::column_identifier(pos, &table.table, column, source_columns));
                            }
                        }
                    }
                }
                other => expanded.push(other),
            }
        }

        if expanded.len() != before {
            debug!(before, after = expanded.len(), "expanded SELECT wildcards");
        }
        select.select = expanded;
        Ok(())
    }
}
