pub mod ast;

pub mod catalog;
pub use catalog::{DataType, InMemoryStorage, NameAndType, Storage};

pub mod analyzer;
pub use analyzer::{AnalysisContext, AnalyzerError, AnalyzerInput, AnalyzerSettings, SyntaxAnalyzer, SyntaxAnalyzerResult};
