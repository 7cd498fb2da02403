pub mod data_type;
pub use data_type::*;

pub mod name_and_type;
pub use name_and_type::*;

pub mod nested;

pub mod table_with_columns;
pub use table_with_columns::*;

pub mod storage;
pub use storage::*;

pub mod registry;
pub use registry::*;

pub mod scalar_evaluator;
pub use scalar_evaluator::*;
