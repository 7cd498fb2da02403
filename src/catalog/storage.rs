use std::collections::HashMap;

use indexmap::IndexMap;

use crate::catalog::{ColumnSize, NameAndType};

/// Read-only view of the primary table's storage.
pub trait Storage {
    fn physical_columns(&self) -> Vec<NameAndType>;

    /// Columns the engine computes on read (`_part`, `_table`, ...).
    fn virtual_columns(&self) -> Vec<NameAndType> {
        vec![]
    }

    /// Per-column on-disk sizes; empty when the engine keeps no statistics.
    fn column_sizes(&self) -> HashMap<String, ColumnSize> {
        HashMap::new()
    }

    /// Looks up a physical or virtual column by name.
    fn get_column(&self, name: &str) -> Option<NameAndType> {
        self.physical_columns()
            .into_iter()
            .chain(self.virtual_columns())
            .find(|c| c.name == name)
    }

    fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    fn columns(&self, include_virtuals: bool) -> Vec<NameAndType> {
        let mut columns = self.physical_columns();
        if include_virtuals {
            columns.extend(self.virtual_columns());
        }
        columns
    }
}

/// A storage description kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    physical: IndexMap<String, NameAndType>,
    virtuals: IndexMap<String, NameAndType>,
    sizes: HashMap<String, ColumnSize>,
}

impl InMemoryStorage {
    pub fn new(columns: Vec<NameAndType>) -> Self {
        let mut storage = Self::default();
        for column in columns {
            storage.physical.insert(column.name.clone(), column);
        }
        storage
    }

    pub fn with_virtual(mut self, column: NameAndType) -> Self {
        self.virtuals.insert(column.name.clone(), column);
        self
    }

    pub fn with_size(mut self, name: &str, data_compressed: u64, data_uncompressed: u64) -> Self {
        self.sizes.insert(name.to_string(), ColumnSize { data_compressed, data_uncompressed });
        self
    }
}

impl Storage for InMemoryStorage {
    fn physical_columns(&self) -> Vec<NameAndType> {
        self.physical.values().cloned().collect()
    }

    fn virtual_columns(&self) -> Vec<NameAndType> {
        self.virtuals.values().cloned().collect()
    }

    fn column_sizes(&self) -> HashMap<String, ColumnSize> {
        self.sizes.clone()
    }

    fn get_column(&self, name: &str) -> Option<NameAndType> {
        self.physical.get(name).or_else(|| self.virtuals.get(name)).cloned()
    }
}
