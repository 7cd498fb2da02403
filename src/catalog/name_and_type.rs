use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::catalog::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAndType {
    pub name: String,
    pub ty: DataType,
}

impl NameAndType {
    pub fn new(name: &str, ty: DataType) -> Self {
        Self { name: name.to_string(), ty }
    }
}

/// On-disk size of one column, as reported by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSize {
    pub data_compressed: u64,
    pub data_uncompressed: u64,
}

/// Drops later columns with an already seen name and returns the names in column order.
pub fn remove_duplicate_columns(columns: &mut Vec<NameAndType>) -> IndexSet<String> {
    let mut names = IndexSet::new();
    columns.retain(|c| names.insert(c.name.clone()));
    names
}
