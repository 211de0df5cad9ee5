//! Shared helpers for grammar lambdas.
//!
//! Small, composable picks over the context catalogue, for use inside
//! [`lambda`](crate::element::lambda) elements. They correlate picks
//! through the state bag: picking a table records it under the `"table"`
//! key so later column picks stay consistent with it.

use crate::{context::Context, schema::Table, types::matches_type_category};
use rand::Rng;

/// Picks a random table name, or `None` when the catalogue is empty.
pub fn pick_table(ctx: &mut Context) -> Option<String> {
    ctx.choose_table_name(&[])
}

/// Picks a random table, records it under the `"table"` state key and
/// appends it to the `"available_tables"` list. Falls back to the given
/// name when no tables are known.
pub fn pick_table_and_store(ctx: &mut Context, fallback: &str) -> String {
    match ctx.choose_table_name(&[]) {
        Some(name) => {
            ctx.set("table", name.clone());
            ctx.list_push("available_tables", name.clone());
            name
        }
        None => fallback.to_owned(),
    }
}

/// Picks a column of the current table (the `"table"` state key), filtered
/// by an optional type hint and an optional primary-key requirement.
///
/// Filters that match nothing fall back to the table's full column list;
/// a missing current table falls back to the given name.
pub fn pick_column(
    ctx: &mut Context,
    data_type: Option<&str>,
    is_pk: Option<bool>,
    fallback: &str,
) -> String {
    let candidates: Vec<String> = {
        let table = ctx.get_str("table").and_then(|name| ctx.tables.get(name));
        let Some(table) = table else {
            return fallback.to_owned();
        };

        let mut columns: Vec<&crate::schema::Column> = table.columns.values().collect();
        if let Some(want_pk) = is_pk {
            columns.retain(|c| c.is_primary_key == want_pk);
        }
        if let Some(hint) = data_type {
            let filtered: Vec<&crate::schema::Column> = columns
                .iter()
                .copied()
                .filter(|c| matches_type_category(&c.data_type, hint))
                .collect();
            if !filtered.is_empty() {
                columns = filtered;
            }
        }
        if columns.is_empty() {
            columns = table.columns.values().collect();
        }
        columns.iter().map(|c| c.name.clone()).collect()
    };

    if candidates.is_empty() {
        return fallback.to_owned();
    }
    let index = ctx.rng().gen_range(0..candidates.len());
    candidates[index].clone()
}

/// Column names of a table, empty when the table is unknown.
pub fn columns_of(ctx: &Context, table_name: &str) -> Vec<String> {
    ctx.tables
        .get(table_name)
        .map(|table: &Table| table.columns.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn ctx() -> Context {
        let mut ctx = Context::new(0);
        ctx.tables.insert(
            "orders".to_owned(),
            Table::from_columns(
                "orders",
                vec![
                    Column::new("id", "integer").not_null().primary_key(),
                    Column::new("status", "varchar(20)"),
                    Column::new("total", "numeric(12,2)"),
                ],
            ),
        );
        ctx
    }

    #[test]
    fn test_pick_table_and_store() {
        let mut ctx = ctx();
        let name = pick_table_and_store(&mut ctx, "t0");
        assert_eq!(name, "orders");
        assert_eq!(ctx.get_str("table"), Some("orders"));
        assert_eq!(ctx.get("available_tables").unwrap().as_list().unwrap(), &["orders".to_owned()]);
    }

    #[test]
    fn test_pick_table_and_store_fallback() {
        let mut ctx = Context::new(0);
        assert_eq!(pick_table_and_store(&mut ctx, "t0"), "t0");
        assert!(ctx.get("table").is_none());
    }

    #[test]
    fn test_pick_column_filters() {
        let mut ctx = ctx();
        ctx.set("table", "orders");
        for _ in 0..10 {
            assert_eq!(pick_column(&mut ctx, None, Some(true), "c0"), "id");
            let numeric = pick_column(&mut ctx, Some("numeric"), None, "c0");
            assert!(numeric == "id" || numeric == "total", "{numeric}");
            let text = pick_column(&mut ctx, Some("text"), None, "c0");
            assert_eq!(text, "status");
        }
    }

    #[test]
    fn test_pick_column_unmatched_filter_falls_back_to_all() {
        let mut ctx = ctx();
        ctx.set("table", "orders");
        let picked = pick_column(&mut ctx, Some("geo"), None, "c0");
        assert!(["id", "status", "total"].contains(&picked.as_str()));
    }

    #[test]
    fn test_pick_column_without_table() {
        let mut ctx = ctx();
        assert_eq!(pick_column(&mut ctx, None, None, "c0"), "c0");
    }

    #[test]
    fn test_columns_of() {
        let ctx = ctx();
        assert_eq!(columns_of(&ctx, "orders"), vec!["id", "status", "total"]);
        assert!(columns_of(&ctx, "missing").is_empty());
    }
}
