pub mod analyzer_error;
pub use analyzer_error::*;

pub mod settings;
pub use settings::*;

pub mod analysis_context;
pub use analysis_context::*;

pub mod analyzed_join;
pub use analyzed_join::*;

pub mod analyzer_result;
pub use analyzer_result::*;

pub mod syntax_analyzer;
pub use syntax_analyzer::*;

pub mod resolvers;
pub use resolvers::*;
