use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{JoinKind, JoinStrictness, Node, TableJoin},
    catalog::NameAndType,
};

/// Comparison of the as-of key pair in an ASOF join, read as `left <op> right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsofInequality {
    Less,
    Greater,
    LessOrEquals,
    GreaterOrEquals,
}

impl AsofInequality {
    pub fn from_function_name(name: &str) -> Option<Self> {
        match name {
            "less" => Some(AsofInequality::Less),
            "greater" => Some(AsofInequality::Greater),
            "lessOrEquals" => Some(AsofInequality::LessOrEquals),
            "greaterOrEquals" => Some(AsofInequality::GreaterOrEquals),
            _ => None,
        }
    }

    /// The same comparison with its operands swapped.
    pub fn reverse(self) -> Self {
        match self {
            AsofInequality::Less => AsofInequality::Greater,
            AsofInequality::Greater => AsofInequality::Less,
            AsofInequality::LessOrEquals => AsofInequality::GreaterOrEquals,
            AsofInequality::GreaterOrEquals => AsofInequality::LessOrEquals,
        }
    }
}

/// What the analyzer learned about the query's JOIN.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedJoin {
    pub kind: JoinKind,
    pub strictness: JoinStrictness,
    pub key_names_left: Vec<String>,
    pub key_names_right: Vec<String>,
    pub key_asts_left: Vec<Node>,
    pub key_asts_right: Vec<Node>,
    /// Set for ASOF joins; the as-of pair is the last entry of the key lists.
    pub asof_inequality: Option<AsofInequality>,
    /// Every column of the joined table, renamed where it clashes with a left column.
    pub columns_from_joined_table: Vec<NameAndType>,
    /// Joined columns the query needs after the join.
    pub columns_added_by_join: Vec<NameAndType>,
    /// Name seen by the query -> name inside the joined table.
    pub original_names: IndexMap<String, String>,
    has_using: bool,
}

impl AnalyzedJoin {
    pub fn new(table_join: &TableJoin) -> Self {
        Self {
            kind: table_join.kind,
            strictness: table_join.strictness,
            key_names_left: vec![],
            key_names_right: vec![],
            key_asts_left: vec![],
            key_asts_right: vec![],
            asof_inequality: None,
            columns_from_joined_table: vec![],
            columns_added_by_join: vec![],
            original_names: IndexMap::new(),
            has_using: false,
        }
    }

    pub fn has_using(&self) -> bool {
        self.has_using
    }

    /// Drops repeated joined columns and qualifies those whose names are taken by the left side.
    pub fn deduplicate_and_qualify(&mut self, left_columns: &IndexSet<String>, right_table_prefix: &str) {
        let mut seen = IndexSet::new();
        let mut deduplicated = Vec::with_capacity(self.columns_from_joined_table.len());

        for column in self.columns_from_joined_table.drain(..) {
            if !seen.insert(column.name.clone()) {
                continue;
            }
            let mut inserted = column.clone();
            if left_columns.contains(&column.name) {
                inserted.name = format!("{}{}", right_table_prefix, column.name);
            }
            self.original_names.insert(inserted.name.clone(), column.name);
            deduplicated.push(inserted);
        }

        self.columns_from_joined_table = deduplicated;
    }

    pub fn add_using_key(&mut self, key: &Node) {
        self.has_using = true;
        self.key_names_left.push(key.column_name());
        self.key_names_right.push(key.alias_or_column_name());
        self.key_asts_left.push(key.clone());
        self.key_asts_right.push(key.clone());
    }

    pub fn add_on_keys(&mut self, left: &Node, right: &Node) {
        self.key_names_left.push(left.column_name());
        self.key_names_right.push(right.alias_or_column_name());
        self.key_asts_left.push(left.clone());
        self.key_asts_right.push(right.clone());
    }

    /// How many times `name` is used as a right key; zero for USING joins.
    pub fn right_key_inclusion(&self, name: &str) -> usize {
        if self.has_using {
            return 0;
        }
        self.key_names_right.iter().filter(|k| k.as_str() == name).count()
    }

    pub fn is_joined_column(&self, name: &str) -> bool {
        self.columns_from_joined_table.iter().any(|c| c.name == name)
    }

    pub fn add_joined_column(&mut self, column: NameAndType) {
        self.columns_added_by_join.push(column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    fn join() -> AnalyzedJoin {
        AnalyzedJoin::new(&TableJoin::new(JoinKind::Left, JoinStrictness::All))
    }

    #[test]
    fn clashing_joined_columns_are_qualified() {
        let mut j = join();
        j.columns_from_joined_table = vec![
            NameAndType::new("k", DataType::UInt64),
            NameAndType::new("v", DataType::String),
            NameAndType::new("k", DataType::UInt64),
        ];
        let left: IndexSet<String> = ["k".to_string(), "a".to_string()].into_iter().collect();
        j.deduplicate_and_qualify(&left, "u.");

        let names: Vec<&str> = j.columns_from_joined_table.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["u.k", "v"]);
        assert_eq!(j.original_names.get("u.k").map(String::as_str), Some("k"));
        assert_eq!(j.original_names.get("v").map(String::as_str), Some("v"));
    }

    #[test]
    fn right_key_inclusion_ignores_using() {
        let mut j = join();
        j.add_on_keys(&Node::ident("a"), &Node::ident("b"));
        assert_eq!(j.right_key_inclusion("b"), 1);
        assert_eq!(j.key_names_left, vec!["a"]);

        let mut u = join();
        u.add_using_key(&Node::ident("k"));
        assert!(u.has_using());
        assert_eq!(u.right_key_inclusion("k"), 0);
    }

    #[test]
    fn asof_reverse() {
        assert_eq!(AsofInequality::from_function_name("less").map(AsofInequality::reverse), Some(AsofInequality::Greater));
        assert_eq!(AsofInequality::from_function_name("equals"), None);
    }
}
