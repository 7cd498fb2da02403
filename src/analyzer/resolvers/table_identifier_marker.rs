use crate::{analyzer::Aliases, ast::Node};

const IN_FUNCTIONS: &[&str] = &["in", "notIn", "globalIn", "globalNotIn"];

pub fn is_in_function(name: &str) -> bool {
    IN_FUNCTIONS.contains(&name)
}

/// `joinGet(t, ...)` and the `dictGet*`/`dictHas`/`dictIsIn` family name a table or dictionary first.
fn takes_table_first(name: &str) -> bool {
    matches!(name, "joinGet" | "joinGetOrNull")
        || name.starts_with("dictGet")
        || name.starts_with("dictHas")
        || name.starts_with("dictIsIn")
}

pub struct TableIdentifierMarker;

impl TableIdentifierMarker {
    /// Tags identifiers that name a table rather than a column, unless they are aliases:
    /// the right operand of `x IN t` and the first argument of `joinGet` and `dictGet*`.
    pub fn mark(roots: Vec<&mut Node>, aliases: &Aliases) {
        for root in roots {
            root.walk_mut(&mut |node| {
                let Node::Function(f) = node else { return };
                let position = if is_in_function(&f.name) {
                    1
                } else if takes_table_first(&f.name) {
                    0
                } else {
                    return;
                };
                if let Some(Node::Identifier(id)) = f.args.get_mut(position) {
                    if !aliases.contains_key(&id.name()) {
                        id.denotes_table = true;
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_set_operand_only() {
        let mut expr = Node::func("in", vec![Node::ident("x"), Node::ident("db.t")]);
        let mut aliased = Node::func("notIn", vec![Node::ident("x"), Node::ident("s")]);
        let mut aliases = Aliases::new();
        aliases.insert("s".into(), Node::uint(1).with_alias("s"));

        TableIdentifierMarker::mark(vec![&mut expr, &mut aliased], &aliases);

        let args = &expr.as_function().unwrap().args;
        assert!(!args[0].as_identifier().unwrap().denotes_table);
        assert!(args[1].as_identifier().unwrap().denotes_table);
        assert!(!aliased.as_function().unwrap().args[1].as_identifier().unwrap().denotes_table);
    }

    #[test]
    fn marks_join_get_and_dictionary_names() {
        let mut join_get = Node::func("joinGet", vec![Node::ident("jt"), Node::string("v"), Node::ident("id")]);
        let mut dict_get = Node::func("dictGetString", vec![Node::ident("dict"), Node::string("name"), Node::ident("k")]);
        let mut aliased = Node::func("dictHas", vec![Node::ident("d"), Node::ident("k")]);
        let mut aliases = Aliases::new();
        aliases.insert("d".into(), Node::string("regions").with_alias("d"));

        TableIdentifierMarker::mark(vec![&mut join_get, &mut dict_get, &mut aliased], &aliases);

        let args = &join_get.as_function().unwrap().args;
        assert!(args[0].as_identifier().unwrap().denotes_table);
        assert!(!args[2].as_identifier().unwrap().denotes_table);
        let args = &dict_get.as_function().unwrap().args;
        assert!(args[0].as_identifier().unwrap().denotes_table);
        assert!(!args[2].as_identifier().unwrap().denotes_table);
        assert!(!aliased.as_function().unwrap().args[0].as_identifier().unwrap().denotes_table);
    }
}
