use crate::ast::Node;

pub struct FunctionCustomizer;

impl FunctionCustomizer {
    /// Rewrites `countDistinct` (any case) to the configured implementation, everywhere in the tree.
    pub fn customize(query: &mut Node, distinct_count_implementation: &str) {
        query.walk_tree_mut(&mut |node| {
            if let Node::Function(f) = node {
                match f.name.to_ascii_lowercase().as_str() {
                    "countdistinct" => f.name = distinct_count_implementation.to_string(),
                    "countdistinctif" => f.name = format!("{}If", distinct_count_implementation),
                    _ => {}
                }
            }
        });
    }
}
