use std::fmt;

use serde::{Deserialize, Serialize};

/// Column data types known to the analyzer.
///
/// Only the in-memory width matters here: the pruning pass uses it to pick
/// the cheapest column when a query needs none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    DateTime,
    Uuid,
    String,
    FixedString(usize),
    Array(Box<DataType>),
    Nullable(Box<DataType>),
    Tuple(Vec<DataType>),
}

impl DataType {
    /// Maximum size of one value in memory, `None` for variable-size types.
    pub fn maximum_size_of_value(&self) -> Option<usize> {
        use DataType::*;
        match self {
            UInt8 | Int8 => Some(1),
            UInt16 | Int16 | Date => Some(2),
            UInt32 | Int32 | Float32 | DateTime => Some(4),
            UInt64 | Int64 | Float64 => Some(8),
            Uuid => Some(16),
            FixedString(n) => Some(*n),
            Nullable(inner) => inner.maximum_size_of_value().map(|size| size + 1),
            Tuple(items) => items.iter().map(DataType::maximum_size_of_value).sum(),
            String | Array(_) => None,
        }
    }

    pub fn is_array(&self) -> bool {
        match self {
            DataType::Array(_) => true,
            DataType::Nullable(inner) => inner.is_array(),
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::FixedString(n) => write!(f, "FixedString({})", n),
            DataType::Array(inner) => write!(f, "Array({})", inner),
            DataType::Nullable(inner) => write!(f, "Nullable({})", inner),
            DataType::Tuple(items) => {
                let items = items.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, "Tuple({})", items)
            }
            DataType::Uuid => write!(f, "UUID"),
            other => write!(f, "{:?}", other),
        }
    }
}
