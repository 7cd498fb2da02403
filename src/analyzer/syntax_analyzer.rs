use tracing::debug;

use crate::{
    analyzer::{
        AggregateResolver, AliasResolver, Aliases, AnalysisContext, AnalyzedJoin, AnalyzerError, AnalyzerResult,
        ArrayJoinResolver, DedupOptimizer, FunctionCustomizer, GroupByOptimizer, IfOptimizer, JoinResolver,
        LogicalExpressionOptimizer, PredicatePushdown, QualifiedNameResolver, QueryNormalizer, ScalarSubqueryResolver,
        SelectColumnsResolver, SelectQueryOptions, SyntaxAnalyzerResult, TableIdentifierMarker,
    },
    ast::{Node, SelectQuery},
    catalog::{
        DatabaseAndTableWithAlias, NameAndType, Storage, TableWithColumnNames, TableWithColumnNamesAndTypes,
        remove_duplicate_columns,
    },
};

/// Everything a SELECT analysis needs besides the tree itself.
#[derive(Default)]
pub struct AnalyzerInput<'s> {
    /// Columns the caller already knows for the primary table; storage columns are appended.
    pub source_columns: Vec<NameAndType>,
    pub storage: Option<&'s dyn Storage>,
    /// Primary table first, joined table second. Derived from FROM when empty.
    pub tables: Vec<TableWithColumnNamesAndTypes>,
    /// Output columns the caller will read; empty means all of them.
    pub required_result_columns: Vec<String>,
    pub options: SelectQueryOptions,
}

impl<'s> AnalyzerInput<'s> {
    pub fn new(source_columns: Vec<NameAndType>) -> Self {
        Self { source_columns, ..Self::default() }
    }

    pub fn with_storage(mut self, storage: &'s dyn Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_tables(mut self, tables: Vec<TableWithColumnNamesAndTypes>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_required_result_columns(mut self, columns: &[&str]) -> Self {
        self.required_result_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_options(mut self, options: SelectQueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Runs the analysis passes over one query and collects what the planner needs.
///
/// ```
/// use sqlscope::{AnalysisContext, AnalyzerInput, DataType, InMemoryStorage, NameAndType, SyntaxAnalyzer};
/// use sqlscope::ast::{Node, SelectQuery};
///
/// let storage = InMemoryStorage::new(vec![
///     NameAndType::new("id", DataType::UInt64),
///     NameAndType::new("name", DataType::String),
/// ]);
/// let ctx = AnalysisContext::default();
/// let query = Node::select(SelectQuery::new(vec![Node::ident("name")]).from_table("t"));
///
/// let result = SyntaxAnalyzer::new(&ctx)
///     .analyze_select(query, AnalyzerInput::default().with_storage(&storage))
///     .unwrap();
/// assert_eq!(result.required_source_column_names(), vec!["name"]);
/// ```
pub struct SyntaxAnalyzer<'a> {
    ctx: &'a AnalysisContext<'a>,
}

impl<'a> SyntaxAnalyzer<'a> {
    pub fn new(ctx: &'a AnalysisContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn analyze_select(&self, query: Node, input: AnalyzerInput<'_>) -> AnalyzerResult<SyntaxAnalyzerResult> {
        if query.as_select().is_none() {
            return Err(AnalyzerError::WrongEntryPoint("SELECT analysis called for a non-SELECT tree".into()));
        }
        let settings = &self.ctx.settings;
        let functions = self.ctx.functions;
        let options = input.options;

        let mut primary_columns = input.source_columns.clone();
        if let Some(storage) = input.storage {
            primary_columns.extend(storage.physical_columns());
        }
        remove_duplicate_columns(&mut primary_columns);

        let mut result = SyntaxAnalyzerResult::new(query, input.source_columns, input.storage, true);
        let source_names = result.source_column_names();
        FunctionCustomizer::customize(&mut result.query, &settings.distinct_count_implementation);

        let select = Self::select_mut(&mut result.query)?;
        let tables = if input.tables.is_empty() {
            self.tables_from_query(select, primary_columns)
        } else {
            input.tables
        };
        let table_names: Vec<TableWithColumnNames> = tables.iter().map(|t| t.remove_types()).collect();

        // 1) output names and the joined table
        if options.remove_duplicates {
            SelectColumnsResolver::rename_duplicated_columns(select);
        }
        if settings.enable_predicate_pushdown {
            JoinResolver::replace_joined_table(select);
        }
        let mut analyzed_join = select.join_element().map(|j| AnalyzedJoin::new(&j.table_join));
        if let (Some(join), Some(joined)) = (analyzed_join.as_mut(), tables.get(1)) {
            join.columns_from_joined_table = joined.columns.clone();
            join.deduplicate_and_qualify(&source_names, &joined.table.qualified_name_prefix());
        }

        // 2) aliases, then names
        let aliases = self.normalize_select(select)?;
        QualifiedNameResolver::translate(select, &source_names, &table_names, &aliases)?;
        result.aliases = AliasResolver::rebuild(&select.expressions_outside_array_join());

        // 3) local rewrites before anything gets evaluated
        LogicalExpressionOptimizer::optimize(select, settings.or_chain_to_in_threshold);
        SelectColumnsResolver::remove_unneeded_columns(select, &input.required_result_columns, options.remove_duplicates);
        ScalarSubqueryResolver::substitute(
            select.expressions_mut(),
            self.ctx.scalar_evaluator,
            options.subquery_depth,
            settings.max_subquery_depth,
            &mut result.scalars,
        )?;
        IfOptimizer::optimize(&mut result.query, settings.if_chain_to_multi_if);

        // 4) rewrites that need the constants
        let select = Self::select_mut(&mut result.query)?;
        if settings.enable_predicate_pushdown {
            result.rewrite_subqueries = PredicatePushdown::optimize(select, &table_names, functions);
        }
        GroupByOptimizer::optimize(select, &source_names, functions, self.ctx.dictionaries);
        DedupOptimizer::dedup_order_by(select);
        if settings.optimize_duplicate_order_by_and_distinct {
            DedupOptimizer::remove_duplicate_order_by(select, functions);
            DedupOptimizer::remove_duplicate_distinct(select);
        }
        DedupOptimizer::dedup_limit_by(select);
        DedupOptimizer::dedup_using(select);

        // 5) ARRAY JOIN and JOIN
        result.array_join = ArrayJoinResolver::resolve(select, &result.source_columns, &source_names)?;
        if let Some(join) = analyzed_join.as_mut() {
            JoinResolver::set_strictness(
                select,
                settings.join_default_strictness,
                settings.legacy_any_join_semantics,
                join,
            )?;
            JoinResolver::collect_keys(select, join, &source_names)?;
        }
        result.aliases = AliasResolver::rebuild(&select.expressions_outside_array_join());
        result.analyzed_join = analyzed_join;

        // 6) what is left to compute and to read
        result.aggregates = AggregateResolver::collect(select, functions)?;
        result.collect_used_columns(input.storage)?;

        debug!(
            required = result.required_source_columns.len(),
            aggregates = result.aggregates.len(),
            rewrite_subqueries = result.rewrite_subqueries,
            "select analyzed"
        );
        Ok(result)
    }

    /// Analysis of a standalone expression such as a column default: no join, grouping or aggregation.
    pub fn analyze(
        &self,
        query: Node,
        source_columns: Vec<NameAndType>,
        storage: Option<&dyn Storage>,
    ) -> AnalyzerResult<SyntaxAnalyzerResult> {
        if query.as_select().is_some() {
            return Err(AnalyzerError::WrongEntryPoint("expression analysis called for a SELECT tree".into()));
        }
        let settings = &self.ctx.settings;

        let mut result = SyntaxAnalyzerResult::new(query, source_columns, storage, false);
        FunctionCustomizer::customize(&mut result.query, &settings.distinct_count_implementation);

        result.aliases = AliasResolver::collect(&[&result.query], settings.reject_conflicting_aliases)?;
        AliasResolver::check_cycles(&result.aliases)?;
        TableIdentifierMarker::mark(vec![&mut result.query], &result.aliases);
        QueryNormalizer::normalize(vec![&mut result.query], &result.aliases);

        ScalarSubqueryResolver::substitute(
            vec![&mut result.query],
            self.ctx.scalar_evaluator,
            0,
            settings.max_subquery_depth,
            &mut result.scalars,
        )?;
        IfOptimizer::optimize(&mut result.query, settings.if_chain_to_multi_if);

        AggregateResolver::assert_no_aggregates(&result.query, "in wrong place", self.ctx.functions)?;
        result.collect_used_columns(storage)?;
        debug!(required = result.required_source_columns.len(), "expression analyzed");
        Ok(result)
    }

    fn select_mut(query: &mut Node) -> AnalyzerResult<&mut SelectQuery> {
        query
            .as_select_mut()
            .ok_or_else(|| AnalyzerError::WrongEntryPoint("SELECT analysis called for a non-SELECT tree".into()))
    }

    /// Primary table of FROM with the given columns; the joined table's columns are unknown here.
    fn tables_from_query(&self, select: &SelectQuery, columns: Vec<NameAndType>) -> Vec<TableWithColumnNamesAndTypes> {
        let Some(tables) = &select.tables else { return vec![] };
        let table = DatabaseAndTableWithAlias::from_table_expression(&tables.first, &self.ctx.current_database);
        vec![TableWithColumnNamesAndTypes::new(table, columns)]
    }

    fn normalize_select(&self, select: &mut SelectQuery) -> AnalyzerResult<Aliases> {
        let aliases = AliasResolver::collect(
            &select.expressions_outside_array_join(),
            self.ctx.settings.reject_conflicting_aliases,
        )?;
        AliasResolver::check_cycles(&aliases)?;
        TableIdentifierMarker::mark(select.expressions_mut(), &aliases);
        let replaced = QueryNormalizer::normalize(select.expressions_mut(), &aliases);
        debug!(aliases = aliases.len(), replaced, "aliases normalized");
        Ok(aliases)
    }
}
