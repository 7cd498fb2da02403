use crate::{ast::TableExpression, catalog::NameAndType};

/// Identity of one table in FROM/JOIN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseAndTableWithAlias {
    pub database: String,
    pub table: String,
    pub alias: String,
}

impl DatabaseAndTableWithAlias {
    pub fn new(database: &str, table: &str, alias: &str) -> Self {
        Self { database: database.to_string(), table: table.to_string(), alias: alias.to_string() }
    }

    pub fn from_table_expression(expr: &TableExpression, current_database: &str) -> Self {
        match expr {
            TableExpression::Table { database, table, alias } => Self {
                database: database.clone().unwrap_or_else(|| current_database.to_string()),
                table: table.clone(),
                alias: alias.clone().unwrap_or_default(),
            },
            TableExpression::TableFunction(f) => Self {
                database: String::new(),
                table: String::new(),
                alias: f.alias.clone().unwrap_or_default(),
            },
            TableExpression::Subquery(s) => Self {
                database: String::new(),
                table: String::new(),
                alias: s.alias.clone().unwrap_or_default(),
            },
        }
    }

    /// Prefix used to qualify joined columns that clash with left-side names.
    pub fn qualified_name_prefix(&self) -> String {
        if !self.alias.is_empty() {
            return format!("{}.", self.alias);
        }
        if self.database.is_empty() {
            format!("{}.", self.table)
        } else {
            format!("{}.{}.", self.database, self.table)
        }
    }

    /// Number of leading identifier parts that name this table (0 when none do).
    pub fn matching_parts(&self, parts: &[String]) -> usize {
        if parts.len() >= 3 && !self.database.is_empty() && parts[0] == self.database && parts[1] == self.table {
            return 2;
        }
        if parts.len() >= 2 {
            if !self.alias.is_empty() && parts[0] == self.alias {
                return 1;
            }
            if !self.table.is_empty() && parts[0] == self.table {
                return 1;
            }
        }
        0
    }

    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        let parts: Vec<String> = qualifier.split('.').map(str::to_string).chain(std::iter::once(String::new())).collect();
        self.matching_parts(&parts) == parts.len() - 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithColumnNames {
    pub table: DatabaseAndTableWithAlias,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithColumnNamesAndTypes {
    pub table: DatabaseAndTableWithAlias,
    pub columns: Vec<NameAndType>,
}

impl TableWithColumnNamesAndTypes {
    pub fn new(table: DatabaseAndTableWithAlias, columns: Vec<NameAndType>) -> Self {
        Self { table, columns }
    }

    pub fn remove_types(&self) -> TableWithColumnNames {
        TableWithColumnNames {
            table: self.table.clone(),
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(s: &str) -> Vec<String> {
        s.split('.').map(str::to_string).collect()
    }

    #[test]
    fn prefixes() {
        assert_eq!(DatabaseAndTableWithAlias::new("db", "t", "").qualified_name_prefix(), "db.t.");
        assert_eq!(DatabaseAndTableWithAlias::new("db", "t", "x").qualified_name_prefix(), "x.");
        assert_eq!(DatabaseAndTableWithAlias::new("", "t", "").qualified_name_prefix(), "t.");
    }

    #[test]
    fn matching() {
        let t = DatabaseAndTableWithAlias::new("db", "t", "x");
        assert_eq!(t.matching_parts(&parts("db.t.c")), 2);
        assert_eq!(t.matching_parts(&parts("x.c")), 1);
        assert_eq!(t.matching_parts(&parts("t.c")), 1);
        assert_eq!(t.matching_parts(&parts("u.c")), 0);
        assert_eq!(t.matching_parts(&parts("c")), 0);
        assert!(t.matches_qualifier("x"));
        assert!(t.matches_qualifier("db.t"));
        assert!(!t.matches_qualifier("u"));
    }

    #[test]
    fn subquery_identity_uses_alias() {
        let expr = TableExpression::subquery(Default::default(), Some("sq"));
        let t = DatabaseAndTableWithAlias::from_table_expression(&expr, "default");
        assert_eq!(t.alias, "sq");
        assert_eq!(t.qualified_name_prefix(), "sq.");
    }
}
