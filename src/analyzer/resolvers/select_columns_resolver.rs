use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::{Node, SelectQuery};

pub struct SelectColumnsResolver;

impl SelectColumnsResolver {
    /// Gives repeated output names a fresh `name_N` alias so every output column is unique.
    pub fn rename_duplicated_columns(select: &mut SelectQuery) {
        let mut all_names: HashSet<String> = select.select.iter().map(Node::alias_or_column_name).collect();
        let mut assigned = HashSet::new();

        for element in select.select.iter_mut() {
            let name = element.alias_or_column_name();
            if assigned.insert(name.clone()) {
                continue;
            }
            let mut i = 1;
            while all_names.contains(&format!("{}_{}", name, i)) {
                i += 1;
            }
            let renamed = format!("{}_{}", name, i);
            // the clone owns its own subtree from here on
            let mut copy = element.clone();
            copy.set_alias(Some(renamed.clone()));
            *element = copy;

            all_names.insert(renamed.clone());
            assigned.insert(renamed);
        }
    }

    /// Drops SELECT elements the caller does not need.
    ///
    /// With `required_result_columns` each requested name is kept once, or as
    /// often as it is requested when duplicates are kept. Without a request
    /// only duplicates are dropped. DISTINCT queries and elements calling
    /// `arrayJoin` keep everything, since both change the row set.
    pub fn remove_unneeded_columns(select: &mut SelectQuery, required_result_columns: &[String], remove_duplicates: bool) {
        let mut wanted: HashMap<String, usize> = HashMap::new();
        if !required_result_columns.is_empty() {
            for name in required_result_columns {
                let count = wanted.entry(name.clone()).or_insert(0);
                *count = if remove_duplicates { 1 } else { *count + 1 };
            }
        } else if remove_duplicates {
            for element in &select.select {
                wanted.entry(element.alias_or_column_name()).or_insert(1);
            }
        } else {
            return;
        }

        let elements = std::mem::take(&mut select.select);
        let before = elements.len();
        let mut kept = Vec::with_capacity(before);
        let mut first = None;

        for element in elements {
            let name = element.alias_or_column_name();
            match wanted.get_mut(&name) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    kept.push(element);
                }
                _ if select.distinct || Self::has_array_join(&element) => kept.push(element),
                _ => {
                    if first.is_none() {
                        first = Some(element);
                    }
                }
            }
        }

        // the projection never ends up empty
        if kept.is_empty() {
            kept.extend(first);
        }
        if kept.len() != before {
            debug!(before, after = kept.len(), "removed unneeded SELECT columns");
        }
        select.select = kept;
    }

    pub fn has_array_join(node: &Node) -> bool {
        node.any(&|n| n.is_function_named("arrayJoin"))
    }
}
