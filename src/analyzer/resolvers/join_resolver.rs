use indexmap::IndexSet;
use tracing::debug;

use crate::{
    analyzer::{AnalyzedJoin, AnalyzerError, AnalyzerResult, AsofInequality, DefaultJoinStrictness},
    ast::{JoinKind, JoinStrictness, Node, SelectQuery, SelectWithUnion, TableExpression},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JoinSide {
    Left,
    Right,
}

pub struct JoinResolver;

impl JoinResolver {
    /// Rewrites `JOIN t` into `JOIN (SELECT * FROM t) AS t` so predicates can be pushed into it.
    ///
    /// Only plain unqualified tables without an alias qualify, and never for CROSS JOIN.
    pub fn replace_joined_table(select: &mut SelectQuery) -> bool {
        let Some(join) = select.join_element_mut() else { return false };
        if join.table_join.kind == JoinKind::Cross {
            return false;
        }
        let TableExpression::Table { database: None, table, alias: None } = &join.table_expression else {
            return false;
        };
        let table = table.clone();
        let body = SelectQuery::new(vec![Node::Asterisk]).from_table(&table);
        join.table_expression = TableExpression::subquery(SelectWithUnion::single(body), Some(&table));
        debug!(table = %table, "joined table replaced with subquery");
        true
    }

    /// Fills in a missing ANY/ALL and applies the legacy ANY rules, on the query and on `analyzed`.
    pub fn set_strictness(
        select: &mut SelectQuery,
        default_strictness: DefaultJoinStrictness,
        legacy_any_join_semantics: bool,
        analyzed: &mut AnalyzedJoin,
    ) -> AnalyzerResult<()> {
        let Some(join) = select.join_element_mut() else { return Ok(()) };
        let table_join = &mut join.table_join;

        if table_join.strictness == JoinStrictness::Unspecified && table_join.kind != JoinKind::Cross {
            table_join.strictness = default_strictness.resolve().ok_or(AnalyzerError::UnspecifiedJoinStrictness)?;
        }

        if legacy_any_join_semantics {
            if table_join.strictness == JoinStrictness::Any && table_join.kind == JoinKind::Inner {
                table_join.strictness = JoinStrictness::Semi;
                table_join.kind = JoinKind::Left;
            }
            if table_join.strictness == JoinStrictness::Any {
                table_join.strictness = JoinStrictness::RightAny;
            }
        } else if table_join.strictness == JoinStrictness::Any && table_join.kind == JoinKind::Full {
            return Err(AnalyzerError::UnimplementedJoinVariant("ANY FULL JOIN".into()));
        }

        analyzed.kind = table_join.kind;
        analyzed.strictness = table_join.strictness;
        Ok(())
    }

    /// Collects join keys from USING or ON.
    ///
    /// ON must be a conjunction of equalities, each comparing an expression
    /// over left columns with one over right columns. ASOF joins also need
    /// exactly one inequality, recorded as the last key pair.
    pub fn collect_keys(select: &SelectQuery, analyzed: &mut AnalyzedJoin, left_columns: &IndexSet<String>) -> AnalyzerResult<()> {
        let Some(join) = select.join_element() else { return Ok(()) };
        let table_join = &join.table_join;

        if let Some(using) = &table_join.using {
            for key in using {
                analyzed.add_using_key(key);
            }
            return Ok(());
        }
        let Some(on) = &table_join.on else { return Ok(()) };

        let is_asof = table_join.strictness == JoinStrictness::Asof;
        let mut asof = None;
        Self::collect_on_keys(on, analyzed, left_columns, is_asof, &mut asof)?;

        if analyzed.key_names_left.is_empty() {
            return Err(AnalyzerError::InvalidJoinKeys(on.to_string()));
        }
        if is_asof {
            let Some((inequality, left, right)) = asof else {
                return Err(AnalyzerError::InvalidJoinKeys(format!("no inequality in ASOF JOIN ON section: {}", on)));
            };
            analyzed.add_on_keys(&left, &right);
            analyzed.asof_inequality = Some(inequality);
        }
        debug!(keys = analyzed.key_names_left.len(), "join keys collected");
        Ok(())
    }

    fn collect_on_keys(
        node: &Node,
        analyzed: &mut AnalyzedJoin,
        left_columns: &IndexSet<String>,
        is_asof: bool,
        asof: &mut Option<(AsofInequality, Node, Node)>,
    ) -> AnalyzerResult<()> {
        let Some(f) = node.as_function() else {
            return Err(AnalyzerError::InvalidJoinKeys(format!("expected equals expression, got {}", node)));
        };
        if f.name == "and" {
            for arg in &f.args {
                Self::collect_on_keys(arg, analyzed, left_columns, is_asof, asof)?;
            }
            return Ok(());
        }
        if f.args.len() != 2 {
            return Err(AnalyzerError::InvalidJoinKeys(format!("expected equals expression, got {}", node)));
        }

        let inequality = AsofInequality::from_function_name(&f.name).filter(|_| is_asof);
        if f.name != "equals" && inequality.is_none() {
            return Err(AnalyzerError::InvalidJoinKeys(format!("expected equals expression, got {}", node)));
        }

        let first = Self::side_of(&f.args[0], analyzed, left_columns)?;
        let second = Self::side_of(&f.args[1], analyzed, left_columns)?;
        let swapped = match (first, second) {
            (JoinSide::Left, JoinSide::Right) => false,
            (JoinSide::Right, JoinSide::Left) => true,
            _ => {
                return Err(AnalyzerError::InvalidJoinKeys(format!(
                    "{} compares columns of the same table",
                    node
                )));
            }
        };
        let (left, right) = if swapped { (&f.args[1], &f.args[0]) } else { (&f.args[0], &f.args[1]) };

        match inequality {
            None => analyzed.add_on_keys(left, right),
            Some(_) if asof.is_some() => {
                return Err(AnalyzerError::InvalidJoinKeys(format!("more than one inequality in ASOF JOIN ON: {}", node)));
            }
            Some(inequality) => {
                let inequality = if swapped { inequality.reverse() } else { inequality };
                *asof = Some((inequality, left.clone(), right.clone()));
            }
        }
        Ok(())
    }

    /// Which table an ON operand reads from; constants and mixed operands are rejected.
    fn side_of(node: &Node, analyzed: &AnalyzedJoin, left_columns: &IndexSet<String>) -> AnalyzerResult<JoinSide> {
        let mut sides = IndexSet::new();
        let mut unknown = None;
        node.walk(&mut |n| {
            let Node::Identifier(id) = n else { return };
            let name = id.name();
            let side = match id.membership {
                Some(0) => Some(JoinSide::Left),
                Some(_) => Some(JoinSide::Right),
                None if left_columns.contains(&name) => Some(JoinSide::Left),
                None if analyzed.is_joined_column(&name) || analyzed.original_names.values().any(|v| *v == name) => {
                    Some(JoinSide::Right)
                }
                None => None,
            };
            match side {
                Some(side) => {
                    sides.insert(side);
                }
                None => unknown = Some(name),
            }
        });

        if let Some(name) = unknown {
            return Err(AnalyzerError::InvalidJoinKeys(format!("unknown column {} in JOIN ON section", name)));
        }
        match sides.len() {
            1 => Ok(sides[0]),
            0 => Err(AnalyzerError::InvalidJoinKeys(format!("{} does not read any table column", node))),
            _ => Err(AnalyzerError::InvalidJoinKeys(format!("{} reads columns of both tables", node))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{JoinElement, TableJoin},
        catalog::{DataType, NameAndType},
    };

    fn join_query(table_join: TableJoin, right: TableExpression) -> SelectQuery {
        SelectQuery::new(vec![Node::ident("a")])
            .from_table("t")
            .join(JoinElement { table_join, table_expression: right })
    }

    fn analyzed(select: &SelectQuery, right_columns: &[&str]) -> AnalyzedJoin {
        let mut join = AnalyzedJoin::new(&select.join_element().unwrap().table_join);
        join.columns_from_joined_table = right_columns.iter().map(|c| NameAndType::new(c, DataType::UInt64)).collect();
        let left: IndexSet<String> = ["a".to_string(), "k".to_string()].into_iter().collect();
        join.deduplicate_and_qualify(&left, "u.");
        join
    }

    fn left() -> IndexSet<String> {
        ["a".to_string(), "k".to_string()].into_iter().collect()
    }

    #[test]
    fn replaces_plain_joined_tables_only() {
        let mut q = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::All), TableExpression::table("u"));
        assert!(JoinResolver::replace_joined_table(&mut q));
        assert_eq!(q.to_string(), "SELECT a FROM t ALL LEFT JOIN (SELECT * FROM u) AS u");

        let mut aliased = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::All), TableExpression::table("u").with_alias("x"));
        assert!(!JoinResolver::replace_joined_table(&mut aliased));

        let mut qualified = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::All), TableExpression::qualified_table("db", "u"));
        assert!(!JoinResolver::replace_joined_table(&mut qualified));

        let mut cross = join_query(TableJoin::new(JoinKind::Cross, JoinStrictness::Unspecified), TableExpression::table("u"));
        assert!(!JoinResolver::replace_joined_table(&mut cross));
    }

    #[test]
    fn strictness_defaults_and_legacy_rules() {
        let mut q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::Unspecified), TableExpression::table("u"));
        let mut j = analyzed(&q, &[]);
        JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::All, false, &mut j).unwrap();
        assert_eq!(j.strictness, JoinStrictness::All);
        assert_eq!(q.join_element().unwrap().table_join.strictness, JoinStrictness::All);

        let mut q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::Unspecified), TableExpression::table("u"));
        let err = JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::Unset, false, &mut j).unwrap_err();
        assert_eq!(err, AnalyzerError::UnspecifiedJoinStrictness);

        let mut q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::Any), TableExpression::table("u"));
        JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::All, true, &mut j).unwrap();
        assert_eq!((j.kind, j.strictness), (JoinKind::Left, JoinStrictness::Semi));

        let mut q = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::Any), TableExpression::table("u"));
        JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::All, true, &mut j).unwrap();
        assert_eq!(j.strictness, JoinStrictness::RightAny);

        let mut q = join_query(TableJoin::new(JoinKind::Full, JoinStrictness::Any), TableExpression::table("u"));
        let err = JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::All, false, &mut j).unwrap_err();
        assert_eq!(err, AnalyzerError::UnimplementedJoinVariant("ANY FULL JOIN".into()));

        let mut q = join_query(TableJoin::new(JoinKind::Cross, JoinStrictness::Unspecified), TableExpression::table("u"));
        JoinResolver::set_strictness(&mut q, DefaultJoinStrictness::Unset, false, &mut j).unwrap();
        assert_eq!(j.strictness, JoinStrictness::Unspecified);
    }

    #[test]
    fn on_keys_are_oriented_left_to_right() {
        let on = Node::func(
            "and",
            vec![
                Node::func("equals", vec![Node::ident("a"), Node::ident("b")]),
                Node::func("equals", vec![Node::ident("c"), Node::func("plus", vec![Node::ident("k"), Node::uint(1)])]),
            ],
        );
        let q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::All).on(on), TableExpression::table("u"));
        let mut j = analyzed(&q, &["b", "c"]);

        JoinResolver::collect_keys(&q, &mut j, &left()).unwrap();
        assert_eq!(j.key_names_left, vec!["a", "plus(k, 1)"]);
        assert_eq!(j.key_names_right, vec!["b", "c"]);
    }

    #[test]
    fn clashing_right_column_is_found_by_prefix() {
        let mut qualified = crate::ast::Identifier::new("");
        qualified.set_name("u.k");
        qualified.membership = Some(1);
        let on = Node::func("equals", vec![Node::ident("k"), Node::Identifier(qualified)]);
        let q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::All).on(on), TableExpression::table("u"));
        let mut j = analyzed(&q, &["k"]);

        JoinResolver::collect_keys(&q, &mut j, &left()).unwrap();
        assert_eq!(j.key_names_right, vec!["u.k"]);
    }

    #[test]
    fn using_keys() {
        let q = join_query(
            TableJoin::new(JoinKind::Left, JoinStrictness::All).using(vec![Node::ident("k")]),
            TableExpression::table("u"),
        );
        let mut j = analyzed(&q, &["k"]);
        JoinResolver::collect_keys(&q, &mut j, &left()).unwrap();
        assert!(j.has_using());
        assert_eq!(j.key_names_left, vec!["k"]);
    }

    #[test]
    fn invalid_on_expressions() {
        let cases = vec![
            Node::func("or", vec![Node::ident("a"), Node::ident("b")]),
            Node::func("equals", vec![Node::ident("a"), Node::ident("k")]),
            Node::func("equals", vec![Node::ident("a"), Node::uint(1)]),
            Node::func("equals", vec![Node::ident("a"), Node::ident("nope")]),
            Node::func("less", vec![Node::ident("a"), Node::ident("b")]),
        ];
        for on in cases {
            let q = join_query(TableJoin::new(JoinKind::Inner, JoinStrictness::All).on(on), TableExpression::table("u"));
            let mut j = analyzed(&q, &["b"]);
            let err = JoinResolver::collect_keys(&q, &mut j, &left()).unwrap_err();
            assert!(matches!(err, AnalyzerError::InvalidJoinKeys(_)), "{err}");
        }
    }

    #[test]
    fn asof_takes_one_inequality_last() {
        let on = Node::func(
            "and",
            vec![
                Node::func("greaterOrEquals", vec![Node::ident("ts"), Node::ident("a")]),
                Node::func("equals", vec![Node::ident("k"), Node::ident("id")]),
            ],
        );
        let q = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::Asof).on(on), TableExpression::table("u"));
        let mut j = analyzed(&q, &["ts", "id"]);

        JoinResolver::collect_keys(&q, &mut j, &left()).unwrap();
        assert_eq!(j.key_names_left, vec!["k", "a"]);
        assert_eq!(j.key_names_right, vec!["id", "ts"]);
        assert_eq!(j.asof_inequality, Some(AsofInequality::LessOrEquals));

        let only_equality = Node::func("equals", vec![Node::ident("k"), Node::ident("id")]);
        let q = join_query(TableJoin::new(JoinKind::Left, JoinStrictness::Asof).on(only_equality), TableExpression::table("u"));
        let mut j = analyzed(&q, &["ts", "id"]);
        assert!(matches!(JoinResolver::collect_keys(&q, &mut j, &left()), Err(AnalyzerError::InvalidJoinKeys(_))));
    }
}
