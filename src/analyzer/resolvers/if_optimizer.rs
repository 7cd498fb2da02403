use tracing::debug;

use crate::ast::{Function, Node};

pub struct IfOptimizer;

impl IfOptimizer {
    /// Folds `if` calls whose condition is a constant and, when asked, flattens `if` chains into `multiIf`.
    ///
    /// Runs over the whole tree, subqueries included. Returns the number of
    /// calls rewritten.
    pub fn optimize(query: &mut Node, if_chain_to_multi_if: bool) -> usize {
        let mut rewritten = 0;
        query.walk_tree_mut(&mut |node| {
            if Self::fold_constant_condition(node) {
                rewritten += 1;
            }
        });
        if if_chain_to_multi_if {
            query.walk_tree_mut_pre(&mut |node| {
                if Self::chain_to_multi_if(node) {
                    rewritten += 1;
                }
            });
        }
        if rewritten > 0 {
            debug!(rewritten, "if calls simplified");
        }
        rewritten
    }

    fn fold_constant_condition(node: &mut Node) -> bool {
        let Node::Function(f) = node else { return false };
        if f.name != "if" || f.args.len() != 3 {
            return false;
        }
        let Some(taken) = f.args[0].as_literal().and_then(|l| l.as_condition()) else {
            return false;
        };

        let alias = f.alias.take();
        let mut branch = f.args.swap_remove(if taken { 1 } else { 2 });
        branch = match (alias, branch.alias().is_some()) {
            (Some(alias), true) => {
                // the branch keeps its own name inside, the call keeps the outer one
                let mut wrapped = Node::func("identity", vec![branch]);
                wrapped.set_alias(Some(alias));
                wrapped
            }
            (Some(alias), false) => {
                branch.set_alias(Some(alias));
                branch
            }
            (None, _) => branch,
        };
        *node = branch;
        true
    }

    fn chain_to_multi_if(node: &mut Node) -> bool {
        let Node::Function(f) = node else { return false };
        if !Self::is_if(f) || !matches!(&f.args[2], Node::Function(inner) if Self::is_if(inner) && inner.alias.is_none()) {
            return false;
        }

        let mut args = vec![];
        let mut rest = Node::Function(Function::new("if", std::mem::take(&mut f.args)));
        loop {
            match rest {
                Node::Function(mut g) if Self::is_if(&g) && (args.is_empty() || g.alias.is_none()) => {
                    let otherwise = g.args.pop();
                    args.append(&mut g.args);
                    match otherwise {
                        Some(otherwise) => rest = otherwise,
                        None => break,
                    }
                }
                other => {
                    args.push(other);
                    break;
                }
            }
        }
        f.name = "multiIf".to_string();
        f.args = args;
        true
    }

    fn is_if(f: &Function) -> bool {
        f.name == "if" && f.args.len() == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SelectQuery, SelectWithUnion};

    fn if_(cond: Node, then: Node, otherwise: Node) -> Node {
        Node::func("if", vec![cond, then, otherwise])
    }

    #[test]
    fn folds_constant_conditions() {
        let mut taken = if_(Node::uint(1), Node::ident("a"), Node::ident("b")).with_alias("r");
        IfOptimizer::optimize(&mut taken, false);
        assert_eq!(taken.to_string(), "a AS r");

        let mut other = if_(Node::uint(0), Node::ident("a"), Node::ident("b"));
        IfOptimizer::optimize(&mut other, false);
        assert_eq!(other.to_string(), "b");

        let mut both_aliased = if_(Node::uint(1), Node::ident("a").with_alias("x"), Node::ident("b")).with_alias("r");
        IfOptimizer::optimize(&mut both_aliased, false);
        assert_eq!(both_aliased.to_string(), "identity(a AS x) AS r");

        let mut unknown = if_(Node::ident("c"), Node::ident("a"), Node::ident("b"));
        assert_eq!(IfOptimizer::optimize(&mut unknown, false), 0);
    }

    #[test]
    fn folds_inside_subqueries() {
        let inner = SelectQuery::new(vec![if_(Node::uint(0), Node::ident("a"), Node::ident("b"))]).from_table("t");
        let mut q = Node::select(
            SelectQuery::new(vec![Node::ident("b")]).from(crate::ast::TableExpression::subquery(SelectWithUnion::single(inner), None)),
        );
        IfOptimizer::optimize(&mut q, false);
        assert_eq!(q.to_string(), "SELECT b FROM (SELECT b FROM t)");
    }

    #[test]
    fn chains_become_multi_if() {
        let mut chain = if_(
            Node::ident("c1"),
            Node::ident("a"),
            if_(Node::ident("c2"), Node::ident("b"), if_(Node::ident("c3"), Node::ident("c"), Node::ident("d"))),
        )
        .with_alias("r");
        IfOptimizer::optimize(&mut chain, true);
        assert_eq!(chain.to_string(), "multiIf(c1, a, c2, b, c3, c, d) AS r");

        let mut aliased_else = if_(
            Node::ident("c1"),
            Node::ident("a"),
            if_(Node::ident("c2"), Node::ident("b"), Node::ident("d")).with_alias("inner"),
        );
        IfOptimizer::optimize(&mut aliased_else, true);
        assert!(aliased_else.is_function_named("if"));

        let mut disabled = if_(Node::ident("c1"), Node::ident("a"), if_(Node::ident("c2"), Node::ident("b"), Node::ident("d")));
        IfOptimizer::optimize(&mut disabled, false);
        assert!(disabled.is_function_named("if"));
    }
}
