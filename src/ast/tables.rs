use std::fmt;

use crate::ast::{Function, Node, SelectWithUnion, Subquery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrictness {
    Unspecified,
    /// Right-table-preferring ANY, produced by the legacy ANY semantics.
    RightAny,
    Any,
    All,
    Asof,
    Semi,
    Anti,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableJoin {
    pub kind: JoinKind,
    pub strictness: JoinStrictness,
    pub using: Option<Vec<Node>>,
    pub on: Option<Node>,
}

impl TableJoin {
    pub fn new(kind: JoinKind, strictness: JoinStrictness) -> Self {
        Self { kind, strictness, using: None, on: None }
    }

    pub fn using(mut self, keys: Vec<Node>) -> Self {
        self.using = Some(keys);
        self
    }

    pub fn on(mut self, expr: Node) -> Self {
        self.on = Some(expr);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableExpression {
    Table { database: Option<String>, table: String, alias: Option<String> },
    TableFunction(Function),
    Subquery(Subquery),
}

impl TableExpression {
    pub fn table(name: &str) -> Self {
        TableExpression::Table { database: None, table: name.to_string(), alias: None }
    }

    pub fn qualified_table(database: &str, name: &str) -> Self {
        TableExpression::Table { database: Some(database.to_string()), table: name.to_string(), alias: None }
    }

    pub fn subquery(query: SelectWithUnion, alias: Option<&str>) -> Self {
        TableExpression::Subquery(Subquery { query, alias: alias.map(str::to_string) })
    }

    pub fn with_alias(mut self, name: &str) -> Self {
        match &mut self {
            TableExpression::Table { alias, .. } => *alias = Some(name.to_string()),
            TableExpression::TableFunction(f) => f.alias = Some(name.to_string()),
            TableExpression::Subquery(s) => s.alias = Some(name.to_string()),
        }
        self
    }

    pub fn subquery_mut(&mut self) -> Option<&mut SelectWithUnion> {
        match self {
            TableExpression::Subquery(s) => Some(&mut s.query),
            _ => None,
        }
    }

    pub fn subquery_ref(&self) -> Option<&SelectWithUnion> {
        match self {
            TableExpression::Subquery(s) => Some(&s.query),
            _ => None,
        }
    }

    /// Name the table expression contributes to a DISTINCT identity list.
    pub fn column_name(&self) -> String {
        match self {
            TableExpression::Table { database: Some(db), table, .. } => format!("{}.{}", db, table),
            TableExpression::Table { database: None, table, .. } => table.clone(),
            TableExpression::TableFunction(f) => f.column_name(),
            TableExpression::Subquery(s) => format!("({})", s.query),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinElement {
    pub table_join: TableJoin,
    pub table_expression: TableExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayJoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayJoin {
    pub kind: ArrayJoinKind,
    pub expressions: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablesInSelectQuery {
    pub first: TableExpression,
    pub array_join: Option<ArrayJoin>,
    pub join: Option<JoinElement>,
}

impl TablesInSelectQuery {
    pub fn new(first: TableExpression) -> Self {
        Self { first, array_join: None, join: None }
    }

    pub fn table_expressions(&self) -> Vec<&TableExpression> {
        let mut out = vec![&self.first];
        if let Some(join) = &self.join {
            out.push(&join.table_expression);
        }
        out
    }

    pub fn table_expressions_mut(&mut self) -> Vec<&mut TableExpression> {
        let mut out = vec![&mut self.first];
        if let Some(join) = &mut self.join {
            out.push(&mut join.table_expression);
        }
        out
    }
}

impl fmt::Display for TableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alias = match self {
            TableExpression::Table { alias, .. } => alias.as_deref(),
            TableExpression::TableFunction(fun) => fun.alias.as_deref(),
            TableExpression::Subquery(s) => s.alias.as_deref(),
        };
        write!(f, "{}", self.column_name())?;
        match alias {
            Some(alias) => write!(f, " AS {}", alias),
            None => Ok(()),
        }
    }
}

impl fmt::Display for TablesInSelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        if let Some(array_join) = &self.array_join {
            let kind = match array_join.kind {
                ArrayJoinKind::Inner => "ARRAY JOIN",
                ArrayJoinKind::Left => "LEFT ARRAY JOIN",
            };
            let exprs = array_join.expressions.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ");
            write!(f, " {} {}", kind, exprs)?;
        }
        if let Some(join) = &self.join {
            let tj = &join.table_join;
            let strictness = match tj.strictness {
                JoinStrictness::Unspecified => "",
                JoinStrictness::RightAny | JoinStrictness::Any => "ANY ",
                JoinStrictness::All => "ALL ",
                JoinStrictness::Asof => "ASOF ",
                JoinStrictness::Semi => "SEMI ",
                JoinStrictness::Anti => "ANTI ",
            };
            let kind = match tj.kind {
                JoinKind::Inner => "INNER",
                JoinKind::Left => "LEFT",
                JoinKind::Right => "RIGHT",
                JoinKind::Full => "FULL",
                JoinKind::Cross => "CROSS",
            };
            write!(f, " {}{} JOIN {}", strictness, kind, join.table_expression)?;
            if let Some(using) = &tj.using {
                let keys = using.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, " USING ({})", keys)?;
            }
            if let Some(on) = &tj.on {
                write!(f, " ON {}", on)?;
            }
        }
        Ok(())
    }
}
