//! Restore ordering and table-name normalization.

use std::collections::{BTreeSet, HashSet};

/// Every table the service owns, parents before children.
pub const DEFAULT_ORDER: [&str; 9] = [
    "sites",
    "categories",
    "departments",
    "employees",
    "users",
    "assets",
    "so_sessions",
    "so_asset_entries",
    "asset_checkouts",
];

pub fn is_known_table(table: &str) -> bool {
    DEFAULT_ORDER.contains(&table)
}

/// Tables a known table references.
pub fn dependencies(table: &str) -> &'static [&'static str] {
    match table {
        "assets" => &["sites", "categories", "departments", "employees"],
        "so_sessions" => &["users"],
        "so_asset_entries" => &["so_sessions", "assets", "users"],
        "asset_checkouts" => &["assets", "employees"],
        _ => &[],
    }
}

fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for c in raw.trim().chars() {
        if c == '-' || c == ' ' || c == '.' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn singular(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = table.strip_suffix('s') {
        stem.to_string()
    } else {
        table.to_string()
    }
}

/// Maps `SoSession`, `soSessions`, `so-sessions` and `so_sessions` to
/// `so_sessions`. Names that match no known table come back snake-cased.
pub fn normalize_table_name(raw: &str) -> String {
    let snake = to_snake_case(raw);
    if is_known_table(&snake) {
        return snake;
    }
    DEFAULT_ORDER
        .iter()
        .find(|known| singular(known) == snake)
        .map(|known| known.to_string())
        .unwrap_or(snake)
}

/// Declared order (deduplicated), then the default order, then any other
/// dump keys sorted; finally every known table is moved after the tables
/// it references, keeping the order otherwise stable.
pub fn restore_order<'a>(
    declared: Option<&[String]>,
    dump_keys: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order: Vec<String> = Vec::new();

    let mut push = |name: String, order: &mut Vec<String>| {
        if !name.is_empty() && seen.insert(name.clone()) {
            order.push(name);
        }
    };

    for name in declared.unwrap_or_default() {
        push(normalize_table_name(name), &mut order);
    }
    for name in DEFAULT_ORDER {
        push(name.to_string(), &mut order);
    }
    let rest: BTreeSet<String> = dump_keys.into_iter().map(normalize_table_name).collect();
    for name in rest {
        push(name, &mut order);
    }

    dependency_pass(&order)
}

fn dependency_pass(order: &[String]) -> Vec<String> {
    let present: HashSet<&str> = order.iter().map(String::as_str).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(order.len());

    fn place(
        table: &str,
        present: &HashSet<&str>,
        placed: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        if placed.contains(table) {
            return;
        }
        placed.insert(table.to_string());
        for dep in dependencies(table) {
            if present.contains(dep) {
                place(dep, present, placed, out);
            }
        }
        out.push(table.to_string());
    }

    for table in order {
        place(table, &present, &mut placed, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("so_sessions", "so_sessions")]
    #[case("SoSession", "so_sessions")]
    #[case("soSessions", "so_sessions")]
    #[case("so-sessions", "so_sessions")]
    #[case("Category", "categories")]
    #[case("AssetCheckout", "asset_checkouts")]
    #[case("SoAssetEntry", "so_asset_entries")]
    #[case("audit_logs", "audit_logs")]
    #[case("AuditLog", "audit_log")]
    fn normalizes_table_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_table_name(raw), expected);
    }

    #[test]
    fn declared_order_comes_first_then_defaults_then_extras() {
        let declared = vec!["employees".to_string(), "Sites".to_string(), "sites".to_string()];
        let order = restore_order(Some(&declared), ["zeta", "alpha", "assets"]);
        assert_eq!(
            order,
            vec![
                "employees",
                "sites",
                "categories",
                "departments",
                "users",
                "assets",
                "so_sessions",
                "so_asset_entries",
                "asset_checkouts",
                "alpha",
                "zeta",
            ]
        );
    }

    #[test]
    fn children_declared_first_are_moved_after_parents() {
        let declared = vec!["so_asset_entries".to_string(), "assets".to_string()];
        let order = restore_order(Some(&declared), std::iter::empty());
        let pos = |t: &str| order.iter().position(|o| o == t).unwrap();
        assert!(pos("assets") < pos("so_asset_entries"));
        assert!(pos("so_sessions") < pos("so_asset_entries"));
        assert!(pos("sites") < pos("assets"));
    }

    fn table_name() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(DEFAULT_ORDER.to_vec()).prop_map(str::to_string),
            Just("SoSession".to_string()),
            Just("assetCheckouts".to_string()),
            Just("Employee".to_string()),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn dependencies_always_precede_dependents(
            declared in prop::collection::vec(table_name(), 0..20),
            extra in prop::collection::vec("[a-z]{1,8}", 0..5),
        ) {
            let order = restore_order(Some(&declared), extra.iter().map(String::as_str));

            let unique: HashSet<&String> = order.iter().collect();
            prop_assert_eq!(unique.len(), order.len());
            for known in DEFAULT_ORDER {
                prop_assert!(order.iter().any(|t| t == known));
            }
            for (idx, table) in order.iter().enumerate() {
                for dep in dependencies(table) {
                    let dep_idx = order.iter().position(|t| t == dep).unwrap();
                    prop_assert!(dep_idx < idx, "{} must precede {}", dep, table);
                }
            }
        }
    }
}
