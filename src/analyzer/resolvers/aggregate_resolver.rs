use std::collections::HashSet;

use tracing::debug;

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult},
    ast::{Function, Node, SelectQuery},
    catalog::FunctionRegistry,
};

pub struct AggregateResolver;

impl AggregateResolver {
    pub fn contains_aggregate(expr: &Node, functions: &dyn FunctionRegistry) -> bool {
        Self::first_aggregate(expr, functions).is_some()
    }

    fn first_aggregate<'n>(expr: &'n Node, functions: &dyn FunctionRegistry) -> Option<&'n Function> {
        match expr {
            Node::Function(f) if functions.is_aggregate(&f.name) => Some(f),
            Node::Function(f) => f.args.iter().find_map(|a| Self::first_aggregate(a, functions)),
            _ => None,
        }
    }

    /// Fails when `expr` calls an aggregate function; `location` completes the message (`in WHERE`).
    pub fn assert_no_aggregates(expr: &Node, location: &str, functions: &dyn FunctionRegistry) -> AnalyzerResult<()> {
        match Self::first_aggregate(expr, functions) {
            Some(f) => Err(AnalyzerError::misplaced_aggregate(f.column_name(), location)),
            None => Ok(()),
        }
    }

    /// Aggregate calls of this query level, one per column name, in clause order.
    pub fn collect(select: &SelectQuery, functions: &dyn FunctionRegistry) -> AnalyzerResult<Vec<Function>> {
        if let Some(where_clause) = &select.where_clause {
            Self::assert_no_aggregates(where_clause, "in WHERE", functions)?;
        }
        if let Some(prewhere) = &select.prewhere {
            Self::assert_no_aggregates(prewhere, "in PREWHERE", functions)?;
        }

        let mut seen = HashSet::new();
        let mut aggregates = vec![];
        for expr in select.expressions() {
            Self::collect_from(expr, functions, &mut seen, &mut aggregates);
        }

        for aggregate in &aggregates {
            for arg in &aggregate.args {
                Self::assert_no_aggregates(arg, "inside another aggregate function", functions)?;
            }
        }
        debug!(aggregates = aggregates.len(), "aggregates collected");
        Ok(aggregates)
    }

    fn collect_from(expr: &Node, functions: &dyn FunctionRegistry, seen: &mut HashSet<String>, out: &mut Vec<Function>) {
        let Node::Function(f) = expr else { return };
        if functions.is_aggregate(&f.name) {
            if seen.insert(f.column_name()) {
                out.push(f.clone());
            }
            return;
        }
        for arg in &f.args {
            Self::collect_from(arg, functions, seen, out);
        }
    }
}
