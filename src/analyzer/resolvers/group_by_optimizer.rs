use indexmap::IndexSet;
use tracing::debug;

use crate::{
    ast::{Function, Literal, Node, SelectQuery},
    catalog::{DictionaryRegistry, FunctionRegistry},
};

/// Calls replaced by their arguments in GROUP BY.
const INJECTIVE_FUNCTIONS: &[&str] = &[
    "negate", "bitNot", "reverse", "reverseUTF8", "toString", "toFixedString",
    "IPv4NumToString", "IPv4StringToNum", "hex", "unhex", "bitmaskToList",
    "bitmaskToArray", "tuple", "regionToName", "concatAssumeInjective",
];

/// Dictionary lookups, injective when the looked-up attribute is.
const POSSIBLY_INJECTIVE_FUNCTIONS: &[&str] = &[
    "dictGetString", "dictGetUInt8", "dictGetUInt16", "dictGetUInt32", "dictGetUInt64",
    "dictGetInt8", "dictGetInt16", "dictGetInt32", "dictGetInt64", "dictGetFloat32",
    "dictGetFloat64", "dictGetDate", "dictGetDateTime",
];

pub struct GroupByOptimizer;

impl GroupByOptimizer {
    /// Removes literals and injective calls from GROUP BY, keeping the calls' non-literal arguments.
    ///
    /// When nothing is left the query either aggregates on its own (no
    /// HAVING, an aggregate in the SELECT list) and loses GROUP BY, or keeps
    /// one constant key that does not read as a source column name.
    /// HAVING without GROUP BY also gets that key.
    pub fn optimize(
        select: &mut SelectQuery,
        source_columns: &IndexSet<String>,
        functions: &dyn FunctionRegistry,
        dictionaries: &dyn DictionaryRegistry,
    ) {
        let Some(keys) = select.group_by.as_mut() else {
            if select.having.is_some() {
                select.group_by = Some(vec![Self::unused_key(source_columns)]);
            }
            return;
        };

        let before = keys.len();
        let mut i = 0;
        while i < keys.len() {
            let reducible = match &keys[i] {
                Node::Literal(_) => true,
                Node::Function(f) => Self::is_injective(f, dictionaries),
                _ => false,
            };
            if !reducible {
                i += 1;
                continue;
            }
            // the last key moves into slot i, which is looked at again
            if let Node::Function(f) = keys.swap_remove(i) {
                keys.extend(f.args.into_iter().filter(|arg| !arg.is_literal()));
            }
        }

        if keys.is_empty() {
            let aggregates = select
                .select
                .iter()
                .any(|e| e.any(&|n| matches!(n, Node::Function(f) if functions.is_aggregate(&f.name))));
            if select.having.is_none() && aggregates {
                select.group_by = None;
            } else {
                select.group_by = Some(vec![Self::unused_key(source_columns)]);
            }
        }
        debug!(before, after = select.group_by.as_ref().map_or(0, Vec::len), "GROUP BY reduced");
    }

    fn is_injective(f: &Function, dictionaries: &dyn DictionaryRegistry) -> bool {
        if POSSIBLY_INJECTIVE_FUNCTIONS.contains(&f.name.as_str()) {
            let (Some(Literal::String(dictionary)), Some(Literal::String(attribute))) =
                (f.args.first().and_then(Node::as_literal), f.args.get(1).and_then(Node::as_literal))
            else {
                return false;
            };
            return dictionaries.is_injective(dictionary, attribute) == Some(true);
        }
        INJECTIVE_FUNCTIONS.contains(&f.name.as_str())
    }

    /// Smallest unsigned literal whose text is not a source column name.
    fn unused_key(source_columns: &IndexSet<String>) -> Node {
        let mut value = 0u64;
        while source_columns.contains(&value.to_string()) {
            value += 1;
        }
        Node::uint(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BuiltinFunctions, NoDictionaries, StaticDictionaries};

    fn source(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn group_by(q: &SelectQuery) -> Option<Vec<String>> {
        q.group_by.as_ref().map(|keys| keys.iter().map(Node::column_name).collect())
    }

    #[test]
    fn strips_injective_calls_recursively() {
        let mut q = SelectQuery::new(vec![Node::ident("a")]).from_table("t").group_by(vec![
            Node::func("toString", vec![Node::func("negate", vec![Node::ident("id")])]),
            Node::func("tuple", vec![Node::ident("x"), Node::uint(1)]),
            Node::func("lower", vec![Node::ident("s")]),
        ]);
        GroupByOptimizer::optimize(&mut q, &source(&["id", "x", "s"]), BuiltinFunctions::shared(), &NoDictionaries);

        let mut keys = group_by(&q).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["id", "lower(s)", "x"]);
    }

    #[test]
    fn constants_only_with_aggregate_drop_group_by() {
        let mut q = SelectQuery::new(vec![Node::func("count", vec![])])
            .from_table("t")
            .group_by(vec![Node::uint(1), Node::uint(2)]);
        GroupByOptimizer::optimize(&mut q, &source(&["a"]), BuiltinFunctions::shared(), &NoDictionaries);
        assert_eq!(q.group_by, None);
    }

    #[test]
    fn constants_with_having_keep_a_synthetic_key() {
        let mut q = SelectQuery::new(vec![Node::func("count", vec![])])
            .from_table("t")
            .group_by(vec![Node::uint(1)])
            .having(Node::func("greater", vec![Node::func("count", vec![]), Node::uint(1)]));
        GroupByOptimizer::optimize(&mut q, &source(&["0", "1"]), BuiltinFunctions::shared(), &NoDictionaries);
        assert_eq!(group_by(&q), Some(vec!["2".to_string()]));
    }

    #[test]
    fn having_without_group_by_gets_a_key() {
        let mut q = SelectQuery::new(vec![Node::ident("a")])
            .from_table("t")
            .having(Node::ident("a"));
        GroupByOptimizer::optimize(&mut q, &source(&["a"]), BuiltinFunctions::shared(), &NoDictionaries);
        assert_eq!(group_by(&q), Some(vec!["0".to_string()]));
    }

    #[test]
    fn dictionary_lookups_need_an_injective_attribute() {
        let dictionaries = StaticDictionaries::new()
            .with_attribute("regions", "name", true)
            .with_attribute("regions", "population", false);
        let lookup = |attribute: &str| {
            Node::func(
                "dictGetString",
                vec![Node::string("regions"), Node::string(attribute), Node::ident("region_id")],
            )
        };
        let mut q = SelectQuery::new(vec![Node::ident("a")])
            .from_table("t")
            .group_by(vec![lookup("name"), lookup("population")]);
        GroupByOptimizer::optimize(&mut q, &source(&["region_id"]), BuiltinFunctions::shared(), &dictionaries);

        assert_eq!(
            group_by(&q),
            Some(vec!["dictGetString('regions', 'population', region_id)".to_string(), "region_id".to_string()])
        );
    }
}
