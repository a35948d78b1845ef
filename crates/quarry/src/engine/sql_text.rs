// crates/quarry/src/engine/sql_text.rs
// Schema rendering for the query generator and generated-query cleanup

use crate::store::SchemaEntry;
use crate::utils::truncate_chars;

/// Characters of each table definition shown to the query generator
const DEFINITION_PREVIEW_CHARS: usize = 200;

/// Runs everywhere and returns exactly one row
pub const PLACEHOLDER_QUERY: &str = "SELECT 1 AS placeholder";

/// Known naming slips mapped onto the names the store actually exposes.
///
/// No replacement contains any pattern, so applying the rules is idempotent.
const NAME_FIXES: &[(&str, &str)] = &[
    ("\"Order Details\"", "order_items"),
    ("Order_Items", "order_items"),
    ("CustomerName", "CompanyName"),
];

/// One `Table <name>: <definition prefix>` line per schema entry
pub fn render_schema(entries: &[SchemaEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "Table {}: {}",
                e.name,
                truncate_chars(&e.definition, DEFINITION_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite known alias slips onto canonical schema names
pub fn normalize_sql(sql: &str) -> String {
    NAME_FIXES
        .iter()
        .fold(sql.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Trim and normalise generated text, substituting the placeholder for blanks
pub fn finalize_sql(generated: Option<&str>) -> String {
    match generated.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sql) => normalize_sql(sql),
        None => PLACEHOLDER_QUERY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_schema_truncates_definitions() {
        let entries = vec![
            SchemaEntry {
                name: "Orders".into(),
                definition: format!("CREATE TABLE Orders ({})", "x INTEGER, ".repeat(40)),
            },
            SchemaEntry {
                name: "Shippers".into(),
                definition: "CREATE TABLE Shippers (ShipperID INTEGER)".into(),
            },
        ];
        let rendered = render_schema(&entries);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Table Orders: CREATE TABLE Orders ("));
        assert_eq!(lines[0].chars().count(), "Table Orders: ".len() + 200);
        assert_eq!(lines[1], "Table Shippers: CREATE TABLE Shippers (ShipperID INTEGER)");
    }

    #[test]
    fn test_render_empty_schema() {
        assert_eq!(render_schema(&[]), "");
    }

    #[test]
    fn test_normalize_known_aliases() {
        assert_eq!(
            normalize_sql("SELECT * FROM \"Order Details\""),
            "SELECT * FROM order_items"
        );
        assert_eq!(
            normalize_sql("SELECT CustomerName FROM Customers JOIN Order_Items"),
            "SELECT CompanyName FROM Customers JOIN order_items"
        );
        assert_eq!(normalize_sql("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for sql in [
            "SELECT * FROM \"Order Details\" od JOIN Order_Items oi",
            "SELECT CustomerName, CompanyName FROM Customers",
            "SELECT \"Order Details\".Quantity FROM \"Order Details\"",
            "SELECT 1",
        ] {
            let once = normalize_sql(sql);
            assert_eq!(normalize_sql(&once), once, "{sql}");
        }
    }

    #[test]
    fn test_finalize_blank_uses_placeholder() {
        assert_eq!(finalize_sql(None), PLACEHOLDER_QUERY);
        assert_eq!(finalize_sql(Some("  \n ")), PLACEHOLDER_QUERY);
        assert_eq!(
            finalize_sql(Some(" SELECT COUNT(*) FROM \"Order Details\" ")),
            "SELECT COUNT(*) FROM order_items"
        );
    }
}
