use tracing::{debug, trace};

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult, Scalars, is_in_function},
    ast::{Literal, Node},
    catalog::ScalarEvaluator,
};

pub struct ScalarSubqueryResolver;

impl ScalarSubqueryResolver {
    /// Replaces scalar subqueries of the current level with the constants they evaluate to.
    ///
    /// The right operand of IN is a set, not a scalar, and is left alone.
    /// Results are cached in `scalars` by rendered subquery, so each distinct
    /// subquery is evaluated once.
    pub fn substitute(
        roots: Vec<&mut Node>,
        evaluator: &dyn ScalarEvaluator,
        subquery_depth: usize,
        max_subquery_depth: usize,
        scalars: &mut Scalars,
    ) -> AnalyzerResult<usize> {
        let mut resolver = ScalarSubqueries { evaluator, subquery_depth, max_subquery_depth, scalars, replaced: 0 };
        for root in roots {
            resolver.visit(root)?;
        }
        if resolver.replaced > 0 {
            debug!(replaced = resolver.replaced, "scalar subqueries substituted");
        }
        Ok(resolver.replaced)
    }

    /// Constant expression for one result row.
    pub fn row_to_node(mut row: Vec<Literal>) -> Node {
        match row.len() {
            0 => Node::lit(Literal::Null),
            1 => Node::lit(row.remove(0)),
            _ => Node::func("tuple", row.into_iter().map(Node::lit).collect()),
        }
    }
}

struct ScalarSubqueries<'a> {
    evaluator: &'a dyn ScalarEvaluator,
    subquery_depth: usize,
    max_subquery_depth: usize,
    scalars: &'a mut Scalars,
    replaced: usize,
}

impl ScalarSubqueries<'_> {
    fn visit(&mut self, node: &mut Node) -> AnalyzerResult<()> {
        match node {
            Node::Subquery(subquery) => {
                let key = format!("({})", subquery.query);
                let row = match self.scalars.get(&key) {
                    Some(row) => row.clone(),
                    None => {
                        let depth = self.subquery_depth + 1;
                        if depth > self.max_subquery_depth {
                            return Err(AnalyzerError::TooDeepSubqueries { depth, max: self.max_subquery_depth });
                        }
                        let row = self.evaluator.evaluate_scalar(&subquery.query, depth)?;
                        self.scalars.insert(key.clone(), row.clone());
                        row
                    }
                };
                let mut constant = ScalarSubqueryResolver::row_to_node(row);
                constant.set_alias(subquery.alias.take());
                trace!(subquery = %key, constant = %constant, "scalar subquery replaced");
                *node = constant;
                self.replaced += 1;
            }
            Node::Function(f) => {
                let skip_set_operand = is_in_function(&f.name);
                for (i, arg) in f.args.iter_mut().enumerate() {
                    if skip_set_operand && i == 1 {
                        continue;
                    }
                    self.visit(arg)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
