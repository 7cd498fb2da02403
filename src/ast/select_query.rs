use std::fmt;

use crate::ast::{ArrayJoin, JoinElement, Node, TableExpression, TablesInSelectQuery};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement {
    pub expr: Node,
    pub ascending: bool,
    pub collation: Option<String>,
}

impl OrderByElement {
    pub fn asc(expr: Node) -> Self {
        Self { expr, ascending: true, collation: None }
    }

    pub fn desc(expr: Node) -> Self {
        Self { expr, ascending: false, collation: None }
    }

    pub fn collate(mut self, collation: &str) -> Self {
        self.collation = Some(collation.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitBy {
    pub length: u64,
    pub offset: Option<u64>,
    pub by: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub length: u64,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select: Vec<Node>,
    pub tables: Option<TablesInSelectQuery>,
    pub prewhere: Option<Node>,
    pub where_clause: Option<Node>,
    pub group_by: Option<Vec<Node>>,
    pub having: Option<Node>,
    pub order_by: Option<Vec<OrderByElement>>,
    pub limit_by: Option<LimitBy>,
    pub limit: Option<Limit>,
}

/// The body of a subquery: one or more SELECTs combined with UNION ALL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectWithUnion {
    pub selects: Vec<SelectQuery>,
}

impl SelectWithUnion {
    pub fn single(select: SelectQuery) -> Self {
        Self { selects: vec![select] }
    }

    pub fn is_set_operation(&self) -> bool {
        self.selects.len() > 1
    }

    pub fn walk_tree_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        for select in self.selects.iter_mut() {
            select.walk_tree_mut(visit);
        }
    }

    pub fn walk_tree_mut_pre(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        for select in self.selects.iter_mut() {
            select.walk_tree_mut_pre(visit);
        }
    }
}

impl SelectQuery {
    pub fn new(select: Vec<Node>) -> Self {
        Self { select, ..Default::default() }
    }

    pub fn from(mut self, table: TableExpression) -> Self {
        self.tables = Some(TablesInSelectQuery::new(table));
        self
    }

    pub fn from_table(self, name: &str) -> Self {
        self.from(TableExpression::table(name))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn join(mut self, join: JoinElement) -> Self {
        if let Some(tables) = &mut self.tables {
            tables.join = Some(join);
        }
        self
    }

    pub fn array_join(mut self, array_join: ArrayJoin) -> Self {
        if let Some(tables) = &mut self.tables {
            tables.array_join = Some(array_join);
        }
        self
    }

    pub fn prewhere(mut self, expr: Node) -> Self {
        self.prewhere = Some(expr);
        self
    }

    pub fn filter(mut self, expr: Node) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn group_by(mut self, keys: Vec<Node>) -> Self {
        self.group_by = Some(keys);
        self
    }

    pub fn having(mut self, expr: Node) -> Self {
        self.having = Some(expr);
        self
    }

    pub fn order_by(mut self, elements: Vec<OrderByElement>) -> Self {
        self.order_by = Some(elements);
        self
    }

    pub fn limit_by(mut self, length: u64, by: Vec<Node>) -> Self {
        self.limit_by = Some(LimitBy { length, offset: None, by });
        self
    }

    pub fn limit(mut self, length: u64, offset: Option<u64>) -> Self {
        self.limit = Some(Limit { length, offset });
        self
    }

    pub fn join_element(&self) -> Option<&JoinElement> {
        self.tables.as_ref().and_then(|t| t.join.as_ref())
    }

    pub fn join_element_mut(&mut self) -> Option<&mut JoinElement> {
        self.tables.as_mut().and_then(|t| t.join.as_mut())
    }

    pub fn array_join_clause(&self) -> Option<&ArrayJoin> {
        self.tables.as_ref().and_then(|t| t.array_join.as_ref())
    }

    /// Roots of every expression evaluated on this query level, in clause order.
    pub fn expressions(&self) -> Vec<&Node> {
        self.collect_expressions(true)
    }

    /// Like [`SelectQuery::expressions`], without the ARRAY JOIN list.
    pub fn expressions_outside_array_join(&self) -> Vec<&Node> {
        self.collect_expressions(false)
    }

    pub fn expressions_mut(&mut self) -> Vec<&mut Node> {
        self.collect_expressions_mut(true)
    }

    pub fn expressions_outside_array_join_mut(&mut self) -> Vec<&mut Node> {
        self.collect_expressions_mut(false)
    }

    fn collect_expressions(&self, with_array_join: bool) -> Vec<&Node> {
        let mut out: Vec<&Node> = self.select.iter().collect();
        if let Some(tables) = &self.tables {
            if let Some(array_join) = tables.array_join.as_ref().filter(|_| with_array_join) {
                out.extend(array_join.expressions.iter());
            }
            if let Some(join) = &tables.join {
                if let Some(using) = &join.table_join.using {
                    out.extend(using.iter());
                }
                if let Some(on) = &join.table_join.on {
                    out.push(on);
                }
            }
        }
        out.extend(self.prewhere.iter());
        out.extend(self.where_clause.iter());
        if let Some(group_by) = &self.group_by {
            out.extend(group_by.iter());
        }
        out.extend(self.having.iter());
        if let Some(order_by) = &self.order_by {
            out.extend(order_by.iter().map(|o| &o.expr));
        }
        if let Some(limit_by) = &self.limit_by {
            out.extend(limit_by.by.iter());
        }
        out
    }

    fn collect_expressions_mut(&mut self, with_array_join: bool) -> Vec<&mut Node> {
        let mut out: Vec<&mut Node> = self.select.iter_mut().collect();
        if let Some(tables) = &mut self.tables {
            if let Some(array_join) = tables.array_join.as_mut().filter(|_| with_array_join) {
                out.extend(array_join.expressions.iter_mut());
            }
            if let Some(join) = &mut tables.join {
                if let Some(using) = &mut join.table_join.using {
                    out.extend(using.iter_mut());
                }
                if let Some(on) = &mut join.table_join.on {
                    out.push(on);
                }
            }
        }
        out.extend(self.prewhere.iter_mut());
        out.extend(self.where_clause.iter_mut());
        if let Some(group_by) = &mut self.group_by {
            out.extend(group_by.iter_mut());
        }
        out.extend(self.having.iter_mut());
        if let Some(order_by) = &mut self.order_by {
            out.extend(order_by.iter_mut().map(|o| &mut o.expr));
        }
        if let Some(limit_by) = &mut self.limit_by {
            out.extend(limit_by.by.iter_mut());
        }
        out
    }

    /// Post-order walk over every expression of this query and of all nested queries.
    pub fn walk_tree_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        for subquery in self.table_subqueries_mut() {
            subquery.walk_tree_mut(visit);
        }
        for expr in self.expressions_mut() {
            expr.walk_tree_mut(visit);
        }
    }

    pub fn walk_tree_mut_pre(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        for subquery in self.table_subqueries_mut() {
            subquery.walk_tree_mut_pre(visit);
        }
        for expr in self.expressions_mut() {
            expr.walk_tree_mut_pre(visit);
        }
    }

    /// Subquery bodies referenced from FROM / JOIN.
    pub fn table_subqueries(&self) -> Vec<&SelectWithUnion> {
        match &self.tables {
            Some(tables) => tables.table_expressions().into_iter().filter_map(TableExpression::subquery_ref).collect(),
            None => vec![],
        }
    }

    pub fn table_subqueries_mut(&mut self) -> Vec<&mut SelectWithUnion> {
        match &mut self.tables {
            Some(tables) => tables.table_expressions_mut().into_iter().filter_map(TableExpression::subquery_mut).collect(),
            None => vec![],
        }
    }

    /// True when a FROM/JOIN subquery combines several SELECTs.
    pub fn has_set_operation(&self) -> bool {
        self.table_subqueries().iter().any(|q| q.is_set_operation())
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some() || self.limit_by.is_some()
    }
}

fn join_nodes(nodes: &[Node]) -> String {
    nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "{}", join_nodes(&self.select))?;
        if let Some(tables) = &self.tables {
            write!(f, " FROM {}", tables)?;
        }
        if let Some(prewhere) = &self.prewhere {
            write!(f, " PREWHERE {}", prewhere)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {}", where_clause)?;
        }
        if let Some(group_by) = &self.group_by {
            write!(f, " GROUP BY {}", join_nodes(group_by))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if let Some(order_by) = &self.order_by {
            let elems = order_by
                .iter()
                .map(|o| {
                    let mut s = format!("{} {}", o.expr, if o.ascending { "ASC" } else { "DESC" });
                    if let Some(collation) = &o.collation {
                        s.push_str(&format!(" COLLATE '{}'", collation));
                    }
                    s
                })
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " ORDER BY {}", elems)?;
        }
        if let Some(limit_by) = &self.limit_by {
            write!(f, " LIMIT {}", limit_by.length)?;
            if let Some(offset) = limit_by.offset {
                write!(f, " OFFSET {}", offset)?;
            }
            write!(f, " BY {}", join_nodes(&limit_by.by))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit.length)?;
            if let Some(offset) = limit.offset {
                write!(f, " OFFSET {}", offset)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SelectWithUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.selects.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" UNION ALL ");
        write!(f, "{}", parts)
    }
}
