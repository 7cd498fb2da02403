use crate::ast::OrderByElement;

/// Identity of an ORDER BY element: the sorted expression plus its collation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByKey {
    column: String,
    collation: String,
}

impl OrderByKey {
    pub fn of(element: &OrderByElement) -> Self {
        Self {
            column: element.expr.column_name(),
            collation: element.collation.clone().unwrap_or_default(),
        }
    }
}
