pub mod function_customizer;
pub use function_customizer::*;

pub mod alias_resolver;
pub use alias_resolver::*;

pub mod table_identifier_marker;
pub use table_identifier_marker::*;

pub mod query_normalizer;
pub use query_normalizer::*;

pub mod qualified_name_resolver;
pub use qualified_name_resolver::*;

pub mod select_columns_resolver;
pub use select_columns_resolver::*;

pub mod logical_expression_optimizer;
pub use logical_expression_optimizer::*;

pub mod scalar_subquery_resolver;
pub use scalar_subquery_resolver::*;

pub mod if_optimizer;
pub use if_optimizer::*;

pub mod predicate_pushdown;
pub use predicate_pushdown::*;

pub mod group_by_optimizer;
pub use group_by_optimizer::*;

pub mod column_key;
pub use column_key::*;

pub mod dedup_optimizer;
pub use dedup_optimizer::*;

pub mod array_join_resolver;
pub use array_join_resolver::*;

pub mod join_resolver;
pub use join_resolver::*;

pub mod aggregate_resolver;
pub use aggregate_resolver::*;

pub mod required_columns_resolver;
pub use required_columns_resolver::*;
