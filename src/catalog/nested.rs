//! Helpers for columns of nested tables, stored flat as `nested.field`.

/// Splits `n.x` into (`n`, `x`). Names without an inner dot return an empty second part.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.find('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    }
}

pub fn concatenate_name(nested_table: &str, nested_field: &str) -> String {
    format!("{}.{}", nested_table, nested_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_first_dot() {
        assert_eq!(split_name("n.x"), ("n", "x"));
        assert_eq!(split_name("n.x.y"), ("n", "x.y"));
        assert_eq!(split_name("plain"), ("plain", ""));
        assert_eq!(split_name(".x"), (".x", ""));
        assert_eq!(split_name("x."), ("x.", ""));
        assert_eq!(concatenate_name("m", "x"), "m.x");
    }
}
