use crate::{
    analyzer::{AnalyzerError, AnalyzerResult},
    ast::{Literal, SelectWithUnion},
};

/// Execution-side collaborator that runs a scalar subquery.
///
/// Implementations return the single result row; the analyzer turns one
/// value into a literal and several into a `tuple(...)` call. `depth` is the
/// nesting level of the subquery being evaluated.
pub trait ScalarEvaluator {
    fn evaluate_scalar(&self, subquery: &SelectWithUnion, depth: usize) -> AnalyzerResult<Vec<Literal>>;
}

/// Evaluator for contexts without an execution engine; every scalar subquery is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScalarEvaluation;

impl ScalarEvaluator for NoScalarEvaluation {
    fn evaluate_scalar(&self, subquery: &SelectWithUnion, _depth: usize) -> AnalyzerResult<Vec<Literal>> {
        Err(AnalyzerError::ScalarSubquery {
            query: subquery.to_string(),
            message: "scalar subquery evaluation is not available".into(),
        })
    }
}
