pub mod literal;
pub use literal::*;

pub mod node;
pub use node::*;

pub mod select_query;
pub use select_query::*;

pub mod tables;
pub use tables::*;
