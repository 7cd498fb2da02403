use ordered_float::NotNan;
use std::fmt::{self, Display};

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    UInt(u64),
    Int(i64),
    Float(NotNan<f64>),
    String(String),
    Tuple(Vec<Literal>),
    Array(Vec<Literal>),
}

impl Literal {
    pub fn string(value: impl Into<String>) -> Self {
        Literal::String(value.into())
    }

    /// Builds a float literal; NaN has no stable identity and becomes NULL.
    pub fn float(value: f64) -> Self {
        NotNan::new(value).map(Literal::Float).unwrap_or(Literal::Null)
    }

    /// Truth value of a literal used as a condition.
    ///
    /// Only NULL and integer values have a defined truth value; anything
    /// else is left for execution to interpret.
    pub fn as_condition(&self) -> Option<bool> {
        match self {
            Literal::Null => Some(false),
            Literal::UInt(v) => Some(*v != 0),
            Literal::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Coarse type family, used to decide whether literals can share an IN-list.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "Null",
            Literal::UInt(_) | Literal::Int(_) => "Integer",
            Literal::Float(_) => "Float",
            Literal::String(_) => "String",
            Literal::Tuple(_) => "Tuple",
            Literal::Array(_) => "Array",
        }
    }

    fn write_list(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// Renders the literal the way it appears in column names: `1`, `-2`,
/// `0.5`, `'text'`, `NULL`, `(1, 'a')`, `[1, 2]`.
impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::UInt(v) => write!(f, "{}", v),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v.into_inner()),
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Tuple(items) => {
                write!(f, "(")?;
                Self::write_list(f, items)?;
                write!(f, ")")
            }
            Literal::Array(items) => {
                write!(f, "[")?;
                Self::write_list(f, items)?;
                write!(f, "]")
            }
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "Null"),
            Literal::UInt(_) => write!(f, "UInt({})", self),
            Literal::Int(_) => write!(f, "Int({})", self),
            Literal::Float(_) => write!(f, "Float({})", self),
            Literal::String(_) => write!(f, "String({})", self),
            Literal::Tuple(_) => write!(f, "Tuple{}", self),
            Literal::Array(_) => write!(f, "Array{}", self),
        }
    }
}
