use crate::{
    analyzer::AnalyzerSettings,
    catalog::{BuiltinFunctions, DictionaryRegistry, FunctionRegistry, NoDictionaries, NoScalarEvaluation, ScalarEvaluator},
};

/// Read-only environment shared by every pass of one analysis.
pub struct AnalysisContext<'a> {
    pub settings: AnalyzerSettings,
    /// aggregate / stateful function metadata
    pub functions: &'a dyn FunctionRegistry,
    /// injectivity of dictionary attributes, for GROUP BY reduction
    pub dictionaries: &'a dyn DictionaryRegistry,
    /// runs scalar subqueries
    pub scalar_evaluator: &'a dyn ScalarEvaluator,
    /// database assumed for unqualified table names
    pub current_database: String,
}

impl Default for AnalysisContext<'_> {
    fn default() -> Self {
        Self::new(AnalyzerSettings::default())
    }
}

impl<'a> AnalysisContext<'a> {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self {
            settings,
            functions: BuiltinFunctions::shared(),
            dictionaries: &NoDictionaries,
            scalar_evaluator: &NoScalarEvaluation,
            current_database: "default".to_string(),
        }
    }

    pub fn with_functions(mut self, functions: &'a dyn FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_dictionaries(mut self, dictionaries: &'a dyn DictionaryRegistry) -> Self {
        self.dictionaries = dictionaries;
        self
    }

    pub fn with_scalar_evaluator(mut self, evaluator: &'a dyn ScalarEvaluator) -> Self {
        self.scalar_evaluator = evaluator;
        self
    }

    pub fn with_current_database(mut self, database: &str) -> Self {
        self.current_database = database.to_string();
        self
    }
}
