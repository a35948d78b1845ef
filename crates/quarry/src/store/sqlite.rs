// crates/quarry/src/store/sqlite.rs
// SQLite-backed QueryStore over the Northwind dataset

use super::{
    DatabasePool, EMPTY_QUERY, MAX_ERROR_CHARS, MAX_QUERY_CHARS, MAX_ROWS, QUERY_TOO_LONG,
    QueryResult, QueryStore, SchemaEntry,
};
use crate::utils::truncate_chars;
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::Value;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

/// Tables and views the query generator is allowed to see
const DOMAIN_TABLES: &[&str] = &[
    "Orders",
    "Products",
    "Customers",
    "Categories",
    "Suppliers",
    "Employees",
    "Shippers",
    "Regions",
    "Territories",
    "orders",
    "products",
    "customers",
    "order_items",
];

const ORDER_ITEMS_VIEW: &str = "CREATE VIEW order_items AS SELECT OrderID, ProductID, UnitPrice, Quantity, Discount FROM [Order Details]";

/// Definition shown to the query generator for a schema object.
///
/// `order_items` is always described by its canonical view text, whatever the
/// database stores for it.
pub fn canonical_definition(name: &str, stored: &str) -> String {
    if name == "order_items" {
        ORDER_ITEMS_VIEW.to_string()
    } else {
        stored.to_string()
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn run_query(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        if rows.len() >= MAX_ROWS {
            break;
        }
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(value_to_json(row.get_ref(idx)?));
        }
        rows.push(values);
    }

    Ok(QueryResult {
        columns,
        rows,
        error: None,
    })
}

/// Execute one query on a connection, capturing any failure in the result
pub fn execute_on(conn: &Connection, sql: &str) -> QueryResult {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return QueryResult::failed(EMPTY_QUERY);
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return QueryResult::failed(QUERY_TOO_LONG);
    }

    // A trailing terminator would leave an empty second statement behind
    let statement = trimmed.trim_end_matches(';').trim_end();
    match run_query(conn, statement) {
        Ok(result) => result,
        Err(e) => QueryResult::failed(truncate_chars(&e.to_string(), MAX_ERROR_CHARS)),
    }
}

fn read_schema(conn: &Connection) -> rusqlite::Result<Vec<SchemaEntry>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master WHERE type IN ('table','view') ORDER BY name",
    )?;
    let entries = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries
        .into_iter()
        .filter(|(name, _)| DOMAIN_TABLES.contains(&name.as_str()))
        .map(|(name, sql)| SchemaEntry {
            definition: canonical_definition(&name, sql.as_deref().unwrap_or("")),
            name,
        })
        .collect())
}

/// Query store over a pooled SQLite database
pub struct SqliteStore {
    pool: DatabasePool,
    schema: OnceCell<Vec<SchemaEntry>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            pool: DatabasePool::open(path)?,
            schema: OnceCell::new(),
        })
    }
}

#[async_trait]
impl QueryStore for SqliteStore {
    #[instrument(skip(self, sql), fields(sql_len = sql.len()))]
    async fn execute(&self, sql: &str) -> QueryResult {
        let sql = sql.to_string();
        match self.pool.interact(move |conn| Ok(execute_on(conn, &sql))).await {
            Ok(result) => {
                debug!(rows = result.rows.len(), error = ?result.error, "Query executed");
                result
            }
            Err(e) => QueryResult::failed(truncate_chars(&e.to_string(), MAX_ERROR_CHARS)),
        }
    }

    async fn schema(&self) -> Vec<SchemaEntry> {
        if let Some(cached) = self.schema.get() {
            return cached.clone();
        }

        match self
            .pool
            .interact(|conn| Ok(read_schema(conn)?))
            .await
        {
            Ok(entries) => {
                debug!(tables = entries.len(), "Schema loaded");
                self.schema.get_or_init(|| async { entries }).await.clone()
            }
            Err(e) => {
                error!(error = %e, "Schema retrieval failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Orders (OrderID INTEGER PRIMARY KEY, CustomerID TEXT, Freight REAL);
             CREATE TABLE [Order Details] (OrderID INTEGER, ProductID INTEGER, UnitPrice REAL, Quantity INTEGER, Discount REAL);
             CREATE TABLE Audit_Log (x);
             CREATE VIEW order_items AS SELECT * FROM [Order Details];
             INSERT INTO Orders VALUES (1, 'ALFKI', 12.5), (2, 'ANATR', NULL);",
        )
        .unwrap();
        conn
    }

    // ============================================================================
    // execute
    // ============================================================================

    #[test]
    fn test_execute_rows_and_columns() {
        let conn = fixture();
        let result = execute_on(&conn, "SELECT OrderID, Freight FROM Orders ORDER BY OrderID;");
        assert!(result.error.is_none());
        assert_eq!(result.columns, vec!["OrderID", "Freight"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0], vec![Value::from(1), Value::from(12.5)]);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn test_execute_no_rows_keeps_columns() {
        let conn = fixture();
        let result = execute_on(&conn, "SELECT CustomerID FROM Orders WHERE 0");
        assert!(result.error.is_none());
        assert_eq!(result.columns, vec!["CustomerID"]);
        assert!(!result.has_rows());
    }

    #[test]
    fn test_execute_rejects_empty_and_oversized() {
        let conn = fixture();
        assert_eq!(execute_on(&conn, "  ").error.as_deref(), Some(EMPTY_QUERY));
        let long = format!("SELECT 1 {}", " ".repeat(10) + &"-".repeat(MAX_QUERY_CHARS));
        assert_eq!(execute_on(&conn, &long).error.as_deref(), Some(QUERY_TOO_LONG));
    }

    #[test]
    fn test_execute_caps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let result = execute_on(
            &conn,
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 900) SELECT i FROM n",
        );
        assert_eq!(result.rows.len(), MAX_ROWS);
    }

    #[test]
    fn test_execute_captures_errors() {
        let conn = fixture();
        let missing_col = execute_on(&conn, "SELECT Bogus FROM Orders");
        assert!(missing_col.error.unwrap().to_lowercase().contains("no such column"));

        let missing_table = execute_on(&conn, "SELECT * FROM Nope");
        assert!(missing_table.error.unwrap().to_lowercase().contains("no such table"));

        let syntax = execute_on(&conn, "SELEC 1");
        assert!(syntax.error.unwrap().to_lowercase().contains("syntax error"));
    }

    #[test]
    fn test_execute_blob_rendering() {
        let conn = Connection::open_in_memory().unwrap();
        let result = execute_on(&conn, "SELECT x'00ff'");
        assert_eq!(result.rows[0][0], Value::from("<blob 2 bytes>"));
    }

    // ============================================================================
    // schema
    // ============================================================================

    #[test]
    fn test_schema_filters_to_domain_tables() {
        let conn = fixture();
        let schema = read_schema(&conn).unwrap();
        let names: Vec<_> = schema.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Orders", "order_items"]);
        assert!(!names.contains(&"Audit_Log"));
        assert_eq!(schema[1].definition, ORDER_ITEMS_VIEW);
        assert!(schema[0].definition.starts_with("CREATE TABLE Orders"));
    }

    #[tokio::test]
    async fn test_store_caches_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nw.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE Products (ProductID INTEGER, ProductName TEXT);")
            .unwrap();

        let store = SqliteStore::open(&path).unwrap();
        let first = store.schema().await;
        assert_eq!(first.len(), 1);

        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE Customers (CustomerID TEXT);")
            .unwrap();
        assert_eq!(store.schema().await, first);

        let result = store.execute("SELECT COUNT(*) AS n FROM Products").await;
        assert_eq!(result.rows, vec![vec![Value::from(0)]]);
    }
}
