use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::{
    ast::{Identifier, JoinKind, Node, SelectQuery, TableExpression},
    catalog::{FunctionRegistry, TableWithColumnNames},
};

pub struct PredicatePushdown;

impl PredicatePushdown {
    /// Copies WHERE/PREWHERE conjuncts into the FROM/JOIN subqueries they only depend on.
    ///
    /// The outer predicate stays in place. A conjunct moves into a subquery
    /// only when every column it reads comes from that table. Nothing moves
    /// when any conjunct calls a stateful function or the query has an ARRAY
    /// JOIN. Joined sides whose rows may be padded with defaults (the right
    /// side of LEFT, both sides of FULL, the left side of RIGHT) are not
    /// touched. Returns true when some subquery was rewritten.
    pub fn optimize(select: &mut SelectQuery, tables: &[TableWithColumnNames], functions: &dyn FunctionRegistry) -> bool {
        if tables.is_empty() || select.array_join_clause().is_some() {
            return false;
        }
        let mut conjuncts = vec![];
        for clause in [&select.where_clause, &select.prewhere].into_iter().flatten() {
            Self::split_and(clause, &mut conjuncts);
        }
        if conjuncts.is_empty() || conjuncts.iter().any(|c| Self::has_stateful(c, functions)) {
            return false;
        }

        let mut per_table: Vec<Vec<Node>> = vec![vec![]; tables.len()];
        for conjunct in conjuncts {
            if !Self::is_pushable(&conjunct, functions) {
                continue;
            }
            if let Some(positions) = Self::owning_tables(&conjunct, tables) {
                for pos in positions {
                    per_table[pos].push(conjunct.clone());
                }
            }
        }

        let join_kind = select.join_element().map(|j| j.table_join.kind);
        let mut rewritten = false;
        for pos in (0..tables.len()).rev() {
            if pos > 0 {
                match join_kind {
                    Some(JoinKind::Left) => continue,
                    Some(JoinKind::Full) => break,
                    _ => {}
                }
            }
            if !per_table[pos].is_empty() && Self::push_to_table(select, pos, &tables[pos], &per_table[pos], functions) {
                rewritten = true;
            }
            if pos > 0 && join_kind == Some(JoinKind::Right) {
                break;
            }
        }
        if rewritten {
            debug!("predicates pushed into subqueries");
        }
        rewritten
    }

    fn split_and(node: &Node, out: &mut Vec<Node>) {
        match node {
            Node::Function(f) if f.name == "and" && f.alias.is_none() => {
                for arg in &f.args {
                    Self::split_and(arg, out);
                }
            }
            other => out.push(other.clone()),
        }
    }

    fn has_stateful(node: &Node, functions: &dyn FunctionRegistry) -> bool {
        node.any(&|n| matches!(n, Node::Function(f) if functions.is_stateful(&f.name)))
    }

    fn is_pushable(node: &Node, functions: &dyn FunctionRegistry) -> bool {
        !node.any(&|n| match n {
            Node::Function(f) => f.name == "arrayJoin" || functions.is_aggregate(&f.name),
            Node::Subquery(_) | Node::Select(_) => true,
            Node::Identifier(id) => id.denotes_table,
            _ => false,
        })
    }

    /// Tables a conjunct reads from; all of them for a constant, `None` when the columns span tables.
    fn owning_tables(node: &Node, tables: &[TableWithColumnNames]) -> Option<Vec<usize>> {
        let mut owners = IndexSet::new();
        let mut unresolved = false;
        node.walk(&mut |n| {
            if let Node::Identifier(id) = n {
                let name = id.name();
                match id.membership.or_else(|| tables.iter().position(|t| t.columns.contains(&name))) {
                    Some(pos) => {
                        owners.insert(pos);
                    }
                    None => unresolved = true,
                }
            }
        });
        match (unresolved, owners.len()) {
            (true, _) => None,
            (false, 0) => Some((0..tables.len()).collect()),
            (false, 1) => Some(owners.into_iter().collect()),
            _ => None,
        }
    }

    fn push_to_table(
        select: &mut SelectQuery,
        pos: usize,
        table: &TableWithColumnNames,
        predicates: &[Node],
        functions: &dyn FunctionRegistry,
    ) -> bool {
        let Some(tables_in_select) = select.tables.as_mut() else { return false };
        let Some(TableExpression::Subquery(subquery)) = tables_in_select.table_expressions_mut().into_iter().nth(pos) else {
            return false;
        };

        let outer_columns: Vec<String> = if !table.columns.is_empty() {
            table.columns.clone()
        } else {
            let Some(first) = subquery.query.selects.first() else { return false };
            if first.select.iter().any(Self::is_wildcard) {
                return false;
            }
            first.select.iter().map(Node::alias_or_column_name).collect()
        };
        let prefix = table.table.qualified_name_prefix();

        let mut rewritten = false;
        for member in subquery.query.selects.iter_mut() {
            if member.has_limit()
                || member.array_join_clause().is_some()
                || member.select.iter().any(|e| Self::has_stateful(e, functions))
            {
                continue;
            }
            let Some(mapping) = Self::member_columns(member, &outer_columns) else { continue };
            let into_having = member.group_by.is_some()
                || member
                    .select
                    .iter()
                    .any(|e| e.any(&|n| matches!(n, Node::Function(f) if functions.is_aggregate(&f.name))));

            for predicate in predicates {
                let Some(inner) = Self::rename_columns(predicate, &outer_columns, &mapping, &prefix) else {
                    continue;
                };
                trace!(predicate = %inner, subquery = %member, "predicate pushed");
                let clause = if into_having { &mut member.having } else { &mut member.where_clause };
                Self::and_into(clause, inner);
                rewritten = true;
            }
        }
        rewritten
    }

    fn is_wildcard(node: &Node) -> bool {
        matches!(node, Node::Asterisk | Node::QualifiedAsterisk(_) | Node::ColumnsMatcher(_))
    }

    /// Inner expression for each outer column, by position; `None` when the member cannot be mapped.
    fn member_columns(member: &SelectQuery, outer_columns: &[String]) -> Option<Vec<Node>> {
        if matches!(member.select.as_slice(), [Node::Asterisk]) {
            return Some(outer_columns.iter().map(|c| Self::column(c)).collect());
        }
        if member.select.len() != outer_columns.len() || member.select.iter().any(Self::is_wildcard) {
            return None;
        }
        Some(
            member
                .select
                .iter()
                .map(|e| match e.alias() {
                    Some(alias) => Self::column(alias),
                    None => e.clone(),
                })
                .collect(),
        )
    }

    fn column(name: &str) -> Node {
        let mut id = Identifier::new("");
        id.set_name(name);
        Node::Identifier(id)
    }

    fn rename_columns(predicate: &Node, outer_columns: &[String], mapping: &[Node], prefix: &str) -> Option<Node> {
        let mut inner = predicate.clone();
        let mut complete = true;
        inner.walk_mut(&mut |node| {
            node.set_alias(None);
            let Node::Identifier(id) = node else { return };
            let name = id.name();
            let short: &str = match id.membership {
                Some(_) => name.strip_prefix(prefix).unwrap_or(name.as_str()),
                None => name.as_str(),
            };
            match outer_columns.iter().position(|c| c == short) {
                Some(idx) => *node = mapping[idx].clone(),
                None => complete = false,
            }
        });
        complete.then_some(inner)
    }

    fn and_into(clause: &mut Option<Node>, predicate: Node) {
        match clause.take() {
            None => *clause = Some(predicate),
            Some(Node::Function(mut f)) if f.name == "and" && f.alias.is_none() => {
                f.args.push(predicate);
                *clause = Some(Node::Function(f));
            }
            Some(existing) => *clause = Some(Node::func("and", vec![existing, predicate])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{JoinElement, JoinStrictness, SelectWithUnion, TableJoin},
        catalog::{BuiltinFunctions, DatabaseAndTableWithAlias},
    };

    fn table(alias: &str, columns: &[&str]) -> TableWithColumnNames {
        TableWithColumnNames {
            table: DatabaseAndTableWithAlias::new("", "", alias),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn sub(selects: Vec<SelectQuery>, alias: &str) -> TableExpression {
        TableExpression::subquery(SelectWithUnion { selects }, Some(alias))
    }

    fn inner(q: &SelectQuery, pos: usize) -> Vec<String> {
        q.table_subqueries()[pos].selects.iter().map(|s| s.to_string()).collect()
    }

    fn gt(column: &str, value: u64) -> Node {
        Node::func("greater", vec![Node::ident(column), Node::uint(value)])
    }

    #[test]
    fn pushes_conjuncts_into_where_or_having() {
        let plain = SelectQuery::new(vec![Node::ident("a"), Node::ident("b")]).from_table("t");
        let mut q = SelectQuery::new(vec![Node::ident("a")])
            .from(sub(vec![plain], "s"))
            .filter(Node::func("and", vec![gt("a", 1), gt("b", 2)]));
        let tables = [table("s", &["a", "b"])];

        assert!(PredicatePushdown::optimize(&mut q, &tables, BuiltinFunctions::shared()));
        assert_eq!(inner(&q, 0), vec!["SELECT a, b FROM t WHERE and(greater(a, 1), greater(b, 2))"]);
        assert!(q.where_clause.is_some());

        let grouped = SelectQuery::new(vec![Node::ident("k"), Node::func("count", vec![]).with_alias("c")])
            .from_table("t")
            .group_by(vec![Node::ident("k")]);
        let mut q = SelectQuery::new(vec![Node::ident("k")]).from(sub(vec![grouped], "g")).filter(gt("c", 5));
        let tables = [table("g", &["k", "c"])];

        assert!(PredicatePushdown::optimize(&mut q, &tables, BuiltinFunctions::shared()));
        assert_eq!(inner(&q, 0), vec!["SELECT k, count() AS c FROM t GROUP BY k HAVING greater(c, 5)"]);
    }

    #[test]
    fn limited_or_stateful_subqueries_are_left_alone() {
        let limited = SelectQuery::new(vec![Node::ident("a")]).from_table("t").limit(10, None);
        let mut q = SelectQuery::new(vec![Node::ident("a")]).from(sub(vec![limited], "s")).filter(gt("a", 1));
        assert!(!PredicatePushdown::optimize(&mut q, &[table("s", &["a"])], BuiltinFunctions::shared()));

        let plain = SelectQuery::new(vec![Node::ident("a")]).from_table("t");
        let stateful = Node::func("greater", vec![Node::func("runningDifference", vec![Node::ident("a")]), Node::uint(0)]);
        let mut q = SelectQuery::new(vec![Node::ident("a")])
            .from(sub(vec![plain], "s"))
            .filter(Node::func("and", vec![gt("a", 1), stateful]));
        assert!(!PredicatePushdown::optimize(&mut q, &[table("s", &["a"])], BuiltinFunctions::shared()));
    }

    #[test]
    fn union_members_are_mapped_by_position() {
        let first = SelectQuery::new(vec![Node::ident("a")]).from_table("t");
        let second = SelectQuery::new(vec![Node::ident("z")]).from_table("u");
        let mut q = SelectQuery::new(vec![Node::ident("a")]).from(sub(vec![first, second], "s")).filter(gt("a", 1));

        assert!(PredicatePushdown::optimize(&mut q, &[table("s", &["a"])], BuiltinFunctions::shared()));
        assert_eq!(
            inner(&q, 0),
            vec!["SELECT a FROM t WHERE greater(a, 1)", "SELECT z FROM u WHERE greater(z, 1)"]
        );
    }

    fn joined(kind: JoinKind) -> SelectQuery {
        let left = SelectQuery::new(vec![Node::ident("a")]).from_table("t");
        let right = SelectQuery::new(vec![Node::ident("a"), Node::ident("b")]).from_table("u");
        let mut right_b = Identifier::new("b");
        right_b.membership = Some(1);
        SelectQuery::new(vec![Node::ident("a")])
            .from(sub(vec![left], "l"))
            .join(JoinElement {
                table_join: TableJoin::new(kind, JoinStrictness::All).using(vec![Node::ident("a")]),
                table_expression: sub(vec![right], "r"),
            })
            .filter(Node::func(
                "and",
                vec![gt("a", 1), Node::func("greater", vec![Node::Identifier(right_b), Node::uint(2)])],
            ))
    }

    #[test]
    fn join_kind_limits_the_sides() {
        let tables = [table("l", &["a"]), table("r", &["a", "b"])];

        let mut inner_join = joined(JoinKind::Inner);
        assert!(PredicatePushdown::optimize(&mut inner_join, &tables, BuiltinFunctions::shared()));
        assert_eq!(inner(&inner_join, 0), vec!["SELECT a FROM t WHERE greater(a, 1)"]);
        assert_eq!(inner(&inner_join, 1), vec!["SELECT a, b FROM u WHERE greater(b, 2)"]);

        let mut left = joined(JoinKind::Left);
        PredicatePushdown::optimize(&mut left, &tables, BuiltinFunctions::shared());
        assert_eq!(inner(&left, 0), vec!["SELECT a FROM t WHERE greater(a, 1)"]);
        assert_eq!(inner(&left, 1), vec!["SELECT a, b FROM u"]);

        let mut right = joined(JoinKind::Right);
        PredicatePushdown::optimize(&mut right, &tables, BuiltinFunctions::shared());
        assert_eq!(inner(&right, 0), vec!["SELECT a FROM t"]);
        assert_eq!(inner(&right, 1), vec!["SELECT a, b FROM u WHERE greater(b, 2)"]);

        let mut full = joined(JoinKind::Full);
        assert!(!PredicatePushdown::optimize(&mut full, &tables, BuiltinFunctions::shared()));
    }

    #[test]
    fn qualified_joined_columns_lose_their_prefix() {
        let left = SelectQuery::new(vec![Node::ident("b")]).from_table("t");
        let right = SelectQuery::new(vec![Node::ident("b")]).from_table("u");
        let mut clashing = Identifier::new("");
        clashing.set_name("r.b");
        clashing.membership = Some(1);
        let mut q = SelectQuery::new(vec![Node::ident("b")])
            .from(sub(vec![left], "l"))
            .join(JoinElement {
                table_join: TableJoin::new(JoinKind::Inner, JoinStrictness::All).on(Node::func(
                    "equals",
                    vec![Node::ident("b"), Node::ident("r.b")],
                )),
                table_expression: sub(vec![right], "r"),
            })
            .filter(Node::func("greater", vec![Node::Identifier(clashing), Node::uint(3)]));
        let tables = [table("l", &["b"]), table("r", &["b"])];

        assert!(PredicatePushdown::optimize(&mut q, &tables, BuiltinFunctions::shared()));
        assert_eq!(inner(&q, 1), vec!["SELECT b FROM u WHERE greater(b, 3)"]);
        assert_eq!(inner(&q, 0), vec!["SELECT b FROM t"]);
    }
}
