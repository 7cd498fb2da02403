use tracing::trace;

use crate::{analyzer::Aliases, ast::Node};

pub struct QueryNormalizer;

impl QueryNormalizer {
    /// Replaces every identifier naming an alias with a copy of the aliased expression.
    ///
    /// Copies are expanded further, so `a AS b, b + 1 AS c, c` ends with
    /// `plus(a AS b, 1) AS c` in the last position. An identifier keeps its
    /// own alias when it has one. The alias graph must be acyclic
    /// (see [`super::AliasResolver::check_cycles`]). Subqueries are left alone.
    pub fn normalize(roots: Vec<&mut Node>, aliases: &Aliases) -> usize {
        let mut replaced = 0;
        for root in roots {
            Self::normalize_node(root, aliases, None, &mut replaced);
        }
        replaced
    }

    fn normalize_node(node: &mut Node, aliases: &Aliases, context: Option<&str>, replaced: &mut usize) {
        match node {
            Node::Identifier(id) if !id.denotes_table && id.is_short() => {
                let name = id.name();
                let defining = id.alias.as_deref().or(context);
                // a name inside its own definition is a column
                if defining == Some(name.as_str()) {
                    return;
                }
                let Some(target) = aliases.get(&name) else { return };

                let own_alias = id.alias.clone();
                let mut replacement = target.clone();
                Self::normalize_node(&mut replacement, aliases, Some(name.as_str()), replaced);
                if let Some(own) = own_alias {
                    if own != name {
                        replacement.set_alias(Some(own));
                    }
                }
                trace!(alias = %name, expression = %replacement, "alias expanded");
                *replaced += 1;
                *node = replacement;
            }
            Node::Function(f) => {
                let defining = f.alias.clone();
                let defining = defining.as_deref().or(context);
                for arg in f.args.iter_mut() {
                    Self::normalize_node(arg, aliases, defining, replaced);
                }
            }
            _ => {}
        }
    }
}
