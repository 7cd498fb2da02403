use std::collections::HashSet;

use tracing::debug;

use crate::{
    analyzer::OrderByKey,
    ast::{Function, Node, SelectQuery, SelectWithUnion, TableExpression},
    catalog::FunctionRegistry,
};

pub struct DedupOptimizer;

#[derive(Debug, Default)]
struct DistinctState {
    is_distinct: bool,
    last_ids: Vec<String>,
}

impl DedupOptimizer {
    /// Keeps the first ORDER BY element of each (expression, collation) pair.
    pub fn dedup_order_by(select: &mut SelectQuery) {
        let Some(elements) = select.order_by.as_mut() else { return };
        let mut seen = HashSet::new();
        let before = elements.len();
        elements.retain(|e| seen.insert(OrderByKey::of(e)));
        if elements.len() < before {
            debug!(before, after = elements.len(), "removed duplicate ORDER BY keys");
        }
    }

    pub fn dedup_limit_by(select: &mut SelectQuery) {
        let Some(limit_by) = select.limit_by.as_mut() else { return };
        let mut seen = HashSet::new();
        limit_by.by.retain(|e| seen.insert(e.column_name()));
    }

    pub fn dedup_using(select: &mut SelectQuery) {
        let Some(using) = select.join_element_mut().and_then(|j| j.table_join.using.as_mut()) else { return };
        let mut seen = HashSet::new();
        using.retain(|e| seen.insert(e.alias_or_column_name()));
    }

    /// Drops ORDER BY from FROM/JOIN subqueries without LIMIT when the outer order makes it unobservable.
    ///
    /// Nested levels are handled first. A level qualifies when it sorts or
    /// groups itself, reads no set operation, and its projection calls no
    /// stateful function (those see row order).
    pub fn remove_duplicate_order_by(select: &mut SelectQuery, functions: &dyn FunctionRegistry) {
        for subquery in select.table_subqueries_mut() {
            for inner in subquery.selects.iter_mut() {
                Self::remove_duplicate_order_by(inner, functions);
            }
        }
        for expr in select.expressions_mut() {
            expr.walk_mut(&mut |node| {
                if let Node::Subquery(s) = node {
                    for inner in s.query.selects.iter_mut() {
                        Self::remove_duplicate_order_by(inner, functions);
                    }
                }
            });
        }

        if select.has_set_operation() || (select.order_by.is_none() && select.group_by.is_none()) {
            return;
        }
        let stateful = select
            .select
            .iter()
            .filter_map(Node::as_function)
            .any(|f| Self::is_stateful(f, functions));
        if stateful {
            return;
        }

        for subquery in select.table_subqueries_mut() {
            for inner in subquery.selects.iter_mut() {
                if inner.order_by.is_some() && !inner.has_limit() {
                    debug!(subquery = %inner, "dropped ORDER BY of subquery");
                    inner.order_by = None;
                }
            }
        }
    }

    fn is_stateful(f: &Function, functions: &dyn FunctionRegistry) -> bool {
        functions.is_stateful(&f.name)
            || f.args.iter().filter_map(Node::as_function).any(|arg| Self::is_stateful(arg, functions))
    }

    /// Drops DISTINCT from a query that reads the same DISTINCT projection from its FROM subquery.
    pub fn remove_duplicate_distinct(select: &mut SelectQuery) {
        Self::visit_distinct(select);
    }

    fn visit_distinct(select: &mut SelectQuery) -> DistinctState {
        for expr in select.expressions_mut() {
            expr.walk_mut(&mut |node| {
                if let Node::Subquery(s) = node {
                    Self::visit_union(&mut s.query);
                }
            });
        }
        if let Some(join) = select.join_element_mut() {
            if let Some(query) = join.table_expression.subquery_mut() {
                Self::visit_union(query);
            }
        }

        // only a lone FROM subquery feeds its DISTINCT state to this level
        let inner = match select.tables.as_mut().map(|t| &mut t.first) {
            Some(TableExpression::Subquery(s)) => Self::visit_union(&mut s.query),
            _ => None,
        };
        let inner = if select.join_element().is_some() || select.array_join_clause().is_some() {
            None
        } else {
            inner
        };

        if !select.distinct {
            return DistinctState::default();
        }

        let mut ids = vec![];
        if matches!(select.select.first(), Some(Node::Asterisk | Node::QualifiedAsterisk(_))) {
            if let Some(tables) = &select.tables {
                ids.push(tables.first.column_name());
            }
        }
        ids.extend(select.select.iter().map(Node::column_name));

        if let Some(state) = inner {
            if state.is_distinct && state.last_ids == ids {
                debug!(query = %select, "dropped DISTINCT repeated from subquery");
                select.distinct = false;
            }
        }
        DistinctState { is_distinct: true, last_ids: ids }
    }

    /// Visits every member; a set operation yields no state.
    fn visit_union(query: &mut SelectWithUnion) -> Option<DistinctState> {
        let mut states: Vec<DistinctState> = query.selects.iter_mut().map(Self::visit_distinct).collect();
        if states.len() == 1 { states.pop() } else { None }
    }
}
