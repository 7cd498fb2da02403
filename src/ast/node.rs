use std::fmt;

use crate::ast::{Literal, SelectQuery, SelectWithUnion};

/// A syntax tree node.
///
/// Every node exclusively owns its children. Scope boundaries are the
/// `Select` and `Subquery` variants: per-level passes never look inside them.
#[derive(Clone, PartialEq)]
pub enum Node {
    Select(Box<SelectQuery>),
    Subquery(Subquery),
    Function(Function),
    Identifier(Identifier),
    Literal(LiteralNode),
    Asterisk,
    QualifiedAsterisk(String),
    /// `COLUMNS('regexp')`
    ColumnsMatcher(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub args: Vec<Node>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// `db.table.column` is stored as three parts.
    pub parts: Vec<String>,
    pub alias: Option<String>,
    /// Set when the identifier names a table (`x IN t`) rather than a column.
    pub denotes_table: bool,
    /// Position of the table the identifier was resolved against.
    pub membership: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralNode {
    pub value: Literal,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub query: SelectWithUnion,
    pub alias: Option<String>,
}

impl Identifier {
    pub fn new(name: &str) -> Self {
        Self {
            parts: name.split('.').map(str::to_string).collect(),
            alias: None,
            denotes_table: false,
            membership: None,
        }
    }

    pub fn name(&self) -> String {
        self.parts.join(".")
    }

    pub fn is_short(&self) -> bool {
        self.parts.len() == 1
    }

    /// Replaces the parts with a single already-normalized column name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.parts = vec![name.into()];
    }
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Node>) -> Self {
        Self { name: name.into(), args, alias: None }
    }

    pub fn column_name(&self) -> String {
        let args = self.args.iter().map(Node::column_name).collect::<Vec<_>>().join(", ");
        format!("{}({})", self.name, args)
    }
}

impl Node {
    pub fn ident(name: &str) -> Node {
        Node::Identifier(Identifier::new(name))
    }

    pub fn compound_ident(parts: &[&str]) -> Node {
        Node::Identifier(Identifier {
            parts: parts.iter().map(|p| p.to_string()).collect(),
            alias: None,
            denotes_table: false,
            membership: None,
        })
    }

    pub fn func(name: &str, args: Vec<Node>) -> Node {
        Node::Function(Function::new(name, args))
    }

    pub fn lit(value: Literal) -> Node {
        Node::Literal(LiteralNode { value, alias: None })
    }

    pub fn uint(value: u64) -> Node {
        Node::lit(Literal::UInt(value))
    }

    pub fn string(value: &str) -> Node {
        Node::lit(Literal::string(value))
    }

    pub fn subquery(query: SelectWithUnion) -> Node {
        Node::Subquery(Subquery { query, alias: None })
    }

    pub fn select(query: SelectQuery) -> Node {
        Node::Select(Box::new(query))
    }

    pub fn with_alias(mut self, alias: &str) -> Node {
        self.set_alias(Some(alias.to_string()));
        self
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Node::Function(f) => f.alias.as_deref(),
            Node::Identifier(i) => i.alias.as_deref(),
            Node::Literal(l) => l.alias.as_deref(),
            Node::Subquery(s) => s.alias.as_deref(),
            Node::Select(_) | Node::Asterisk | Node::QualifiedAsterisk(_) | Node::ColumnsMatcher(_) => None,
        }
    }

    /// Sets the alias on nodes that can carry one; a no-op for the others.
    pub fn set_alias(&mut self, alias: Option<String>) {
        match self {
            Node::Function(f) => f.alias = alias,
            Node::Identifier(i) => i.alias = alias,
            Node::Literal(l) => l.alias = alias,
            Node::Subquery(s) => s.alias = alias,
            Node::Select(_) | Node::Asterisk | Node::QualifiedAsterisk(_) | Node::ColumnsMatcher(_) => {}
        }
    }

    /// Identity of the expression, ignoring its alias.
    pub fn column_name(&self) -> String {
        match self {
            Node::Select(s) => format!("({})", s),
            Node::Subquery(s) => format!("({})", s.query),
            Node::Function(f) => f.column_name(),
            Node::Identifier(i) => i.name(),
            Node::Literal(l) => l.value.to_string(),
            Node::Asterisk => "*".to_string(),
            Node::QualifiedAsterisk(q) => format!("{}.*", q),
            Node::ColumnsMatcher(pattern) => format!("COLUMNS({})", Literal::string(pattern.as_str())),
        }
    }

    pub fn alias_or_column_name(&self) -> String {
        self.alias().map(str::to_string).unwrap_or_else(|| self.column_name())
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Node::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Node::Identifier(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal(l) => Some(&l.value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    pub fn is_function_named(&self, name: &str) -> bool {
        matches!(self, Node::Function(f) if f.name == name)
    }

    /// Pre-order walk over this expression, staying on the current query level.
    pub fn walk(&self, visit: &mut dyn FnMut(&Node)) {
        visit(self);
        if let Node::Function(f) = self {
            for arg in &f.args {
                arg.walk(visit);
            }
        }
    }

    /// Post-order mutable walk over this expression, staying on the current query level.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        if let Node::Function(f) = self {
            for arg in f.args.iter_mut() {
                arg.walk_mut(visit);
            }
        }
        visit(self);
    }

    /// Post-order mutable walk over the whole tree, subqueries included.
    pub fn walk_tree_mut(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        match self {
            Node::Function(f) => {
                for arg in f.args.iter_mut() {
                    arg.walk_tree_mut(visit);
                }
            }
            Node::Subquery(s) => s.query.walk_tree_mut(visit),
            Node::Select(s) => s.walk_tree_mut(visit),
            _ => {}
        }
        visit(self);
    }

    /// Pre-order variant of [`Node::walk_tree_mut`]; children of a replaced node are the new node's children.
    pub fn walk_tree_mut_pre(&mut self, visit: &mut dyn FnMut(&mut Node)) {
        visit(self);
        match self {
            Node::Function(f) => {
                for arg in f.args.iter_mut() {
                    arg.walk_tree_mut_pre(visit);
                }
            }
            Node::Subquery(s) => s.query.walk_tree_mut_pre(visit),
            Node::Select(s) => s.walk_tree_mut_pre(visit),
            _ => {}
        }
    }

    pub fn as_select(&self) -> Option<&SelectQuery> {
        match self {
            Node::Select(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_select_mut(&mut self) -> Option<&mut SelectQuery> {
        match self {
            Node::Select(s) => Some(s),
            _ => None,
        }
    }

    pub fn any(&self, predicate: &dyn Fn(&Node) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        match self {
            Node::Function(f) => f.args.iter().any(|a| a.any(predicate)),
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Function(fun) => {
                write!(f, "{}(", fun.name)?;
                for (i, arg) in fun.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")?;
            }
            Node::Select(s) => write!(f, "{}", s)?,
            Node::Subquery(s) => write!(f, "({})", s.query)?,
            other => write!(f, "{}", other.column_name())?,
        }
        match self.alias() {
            Some(alias) => write!(f, " AS {}", alias),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Select(_) => write!(f, "Select({})", self),
            Node::Subquery(_) => write!(f, "Subquery({})", self),
            Node::Function(_) => write!(f, "Function({})", self),
            Node::Identifier(_) => write!(f, "Identifier({})", self),
            Node::Literal(_) => write!(f, "Literal({})", self),
            Node::Asterisk => write!(f, "Asterisk"),
            Node::QualifiedAsterisk(q) => write!(f, "QualifiedAsterisk({}.*)", q),
            Node::ColumnsMatcher(_) => write!(f, "ColumnsMatcher({})", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_name_ignores_alias() {
        let node = Node::func("plus", vec![Node::ident("a"), Node::uint(1)]).with_alias("x");
        assert_eq!(node.column_name(), "plus(a, 1)");
        assert_eq!(node.alias_or_column_name(), "x");
        assert_eq!(node.to_string(), "plus(a, 1) AS x");
    }

    #[test]
    fn compound_identifier_name() {
        let node = Node::ident("db.t.col");
        let ident = node.as_identifier().unwrap();
        assert_eq!(ident.parts.len(), 3);
        assert_eq!(ident.name(), "db.t.col");
        assert!(!ident.is_short());
    }

    #[test]
    fn walk_stays_on_expression() {
        let node = Node::func("f", vec![Node::ident("a"), Node::func("g", vec![Node::ident("b")])]);
        let mut names = vec![];
        node.walk(&mut |n| {
            if let Node::Identifier(i) = n {
                names.push(i.name());
            }
        });
        assert_eq!(names, vec!["a", "b"]);
        assert!(node.any(&|n| n.is_function_named("g")));
    }

    #[test]
    fn tree_walk_enters_subqueries() {
        let inner = SelectQuery::new(vec![Node::func("f", vec![Node::ident("x")])]).from_table("u");
        let mut node = Node::func("in", vec![Node::ident("a"), Node::subquery(SelectWithUnion::single(inner))]);

        let mut seen = vec![];
        node.walk_tree_mut(&mut |n| {
            if let Node::Function(f) = n {
                seen.push(f.name.clone());
            }
        });
        assert_eq!(seen, vec!["f", "in"]);

        node.walk_tree_mut_pre(&mut |n| {
            if let Node::Identifier(i) = n {
                i.set_name(i.name().to_uppercase());
            }
        });
        assert_eq!(node.to_string(), "in(A, (SELECT f(X) FROM u))");
    }
}
