use std::collections::HashMap;

use tracing::warn;

use crate::{
    analyzer::{AnalyzerError, AnalyzerResult, Aliases},
    ast::Node,
};

pub struct AliasResolver;

impl AliasResolver {
    /// Builds the alias table of one query level from its expression roots.
    ///
    /// An alias defined twice for the same expression is fine. For two
    /// different expressions the later definition wins with a warning, or the
    /// analysis fails when `reject_conflicts` is set.
    pub fn collect(roots: &[&Node], reject_conflicts: bool) -> AnalyzerResult<Aliases> {
        let mut aliases = Aliases::new();
        let mut conflict = None;

        for root in roots {
            root.walk(&mut |node| {
                if conflict.is_some() {
                    return;
                }
                let Some(alias) = node.alias() else { return };
                if let Some(previous) = aliases.get(alias) {
                    let (first, second) = (previous.column_name(), node.column_name());
                    if first != second {
                        if reject_conflicts {
                            conflict = Some(AnalyzerError::ConflictingAlias { alias: alias.to_string(), first, second });
                            return;
                        }
                        warn!(alias, %first, %second, "alias redefined, the later expression wins");
                    }
                }
                aliases.insert(alias.to_string(), node.clone());
            });
        }

        match conflict {
            Some(err) => Err(err),
            None => Ok(aliases),
        }
    }

    /// Recollects aliases after a rewrite; redefinitions are expected here and silently take the later one.
    pub fn rebuild(roots: &[&Node]) -> Aliases {
        let mut aliases = Aliases::new();
        for root in roots {
            root.walk(&mut |node| {
                if let Some(alias) = node.alias() {
                    aliases.insert(alias.to_string(), node.clone());
                }
            });
        }
        aliases
    }

    /// Fails when aliases are defined in terms of each other (`a AS b, b AS a`).
    ///
    /// A name used inside its own definition (`a + 1 AS a`) is a column, not a cycle.
    pub fn check_cycles(aliases: &Aliases) -> AnalyzerResult<()> {
        let mut done: HashMap<&str, bool> = HashMap::new();
        for name in aliases.keys() {
            Self::visit(name, aliases, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(name: &'a str, aliases: &'a Aliases, state: &mut HashMap<&'a str, bool>) -> AnalyzerResult<()> {
        match state.get(name) {
            Some(true) => return Ok(()),
            Some(false) => return Err(AnalyzerError::CyclicAliases(name.to_string())),
            None => {}
        }
        state.insert(name, false);
        if let Some((key, target)) = aliases.get_key_value(name) {
            let mut references = vec![];
            Self::alias_references(target, None, aliases, &mut references);
            for reference in references {
                if let Some((referenced, _)) = aliases.get_key_value(reference.as_str()) {
                    Self::visit(referenced, aliases, state)?;
                }
            }
            state.insert(key, true);
        }
        Ok(())
    }

    /// Alias names an expression refers to, skipping names used inside their own definition.
    pub fn alias_references(node: &Node, context: Option<&str>, aliases: &Aliases, out: &mut Vec<String>) {
        match node {
            Node::Identifier(id) if !id.denotes_table && id.is_short() => {
                let name = id.name();
                let defining = id.alias.as_deref().or(context);
                if aliases.contains_key(&name) && defining != Some(name.as_str()) {
                    out.push(name);
                }
            }
            Node::Function(f) => {
                let defining = f.alias.as_deref().or(context);
                for arg in &f.args {
                    Self::alias_references(arg, defining, aliases, out);
                }
            }
            _ => {}
        }
    }
}
