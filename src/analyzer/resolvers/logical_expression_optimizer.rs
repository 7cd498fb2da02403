use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{Literal, Node, SelectQuery};

pub struct LogicalExpressionOptimizer;

impl LogicalExpressionOptimizer {
    /// Turns `x = c1 OR x = c2 OR ...` into `x IN (c1, c2, ...)` when at least
    /// `threshold` equalities compare the same expression with literals of one
    /// type. Other disjuncts stay in the `or` after the new `in`. A threshold
    /// of 0 disables the rewrite. Returns the number of chains rewritten.
    pub fn optimize(select: &mut SelectQuery, threshold: usize) -> usize {
        if threshold == 0 {
            return 0;
        }
        let mut rewritten = 0;
        for expr in select.expressions_mut() {
            Self::optimize_node(expr, threshold, &mut rewritten);
        }
        if rewritten > 0 {
            debug!(rewritten, "OR chains turned into IN");
        }
        rewritten
    }

    fn optimize_node(node: &mut Node, threshold: usize, rewritten: &mut usize) {
        let Node::Function(f) = node else { return };
        if f.name != "or" {
            for arg in f.args.iter_mut() {
                Self::optimize_node(arg, threshold, rewritten);
            }
            return;
        }

        let mut disjuncts = vec![];
        for arg in std::mem::take(&mut f.args) {
            Self::flatten_or(arg, &mut disjuncts);
        }
        for disjunct in disjuncts.iter_mut() {
            Self::optimize_node(disjunct, threshold, rewritten);
        }

        let chains = Self::equality_chains(&disjuncts, threshold);
        if chains.is_empty() {
            f.args = disjuncts;
            return;
        }

        let mut replacements: IndexMap<usize, Node> = IndexMap::new();
        let mut dropped = vec![false; disjuncts.len()];
        for positions in chains.values() {
            let Some((expr, _)) = Self::as_equality(&disjuncts[positions[0]]) else { continue };
            let expr = expr.clone();
            let values = positions
                .iter()
                .filter_map(|&i| Self::as_equality(&disjuncts[i]).map(|(_, lit)| Node::lit(lit.clone())))
                .collect();
            replacements.insert(positions[0], Node::func("in", vec![expr, Node::func("tuple", values)]));
            for &i in positions {
                dropped[i] = true;
            }
            *rewritten += 1;
        }

        let mut args = Vec::with_capacity(disjuncts.len());
        for (i, disjunct) in disjuncts.into_iter().enumerate() {
            if let Some(in_call) = replacements.shift_remove(&i) {
                args.push(in_call);
            } else if !dropped[i] {
                args.push(disjunct);
            }
        }

        if args.len() == 1 {
            let alias = f.alias.take();
            let mut only = args.remove(0);
            if only.alias().is_none() {
                only.set_alias(alias);
            }
            *node = only;
        } else {
            f.args = args;
        }
    }

    fn flatten_or(node: Node, out: &mut Vec<Node>) {
        match node {
            Node::Function(f) if f.name == "or" && f.alias.is_none() => {
                for arg in f.args {
                    Self::flatten_or(arg, out);
                }
            }
            other => out.push(other),
        }
    }

    /// `expr = literal` (either side), unaliased, with a literal of a type an IN-list can hold.
    fn as_equality(node: &Node) -> Option<(&Node, &Literal)> {
        let f = node.as_function()?;
        if f.name != "equals" || f.alias.is_some() || f.args.len() != 2 {
            return None;
        }
        let (expr, literal) = match (&f.args[0], &f.args[1]) {
            (expr, Node::Literal(l)) if !expr.is_literal() => (expr, &l.value),
            (Node::Literal(l), expr) if !expr.is_literal() => (expr, &l.value),
            _ => return None,
        };
        match literal.kind() {
            "Integer" | "Float" | "String" => Some((expr, literal)),
            _ => None,
        }
    }

    /// Positions of equalities per compared expression, keeping only chains long enough to rewrite.
    fn equality_chains(disjuncts: &[Node], threshold: usize) -> IndexMap<String, Vec<usize>> {
        let mut chains: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, disjunct) in disjuncts.iter().enumerate() {
            if let Some((expr, _)) = Self::as_equality(disjunct) {
                chains.entry(expr.column_name()).or_default().push(i);
            }
        }
        chains.retain(|_, positions| {
            if positions.len() < threshold {
                return false;
            }
            // mixed literal types stay as separate comparisons
            let kinds: Vec<&str> = positions
                .iter()
                .filter_map(|&i| Self::as_equality(&disjuncts[i]).map(|(_, l)| l.kind()))
                .collect();
            kinds.windows(2).all(|w| w[0] == w[1])
        });
        chains
    }
}
