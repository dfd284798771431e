//! SQLite-backed store: schema introspection and read-only execution.
//!
//! Connections are kept in a small bounded pool. Checkout runs a pre-flight
//! `SELECT 1`; stale connections are dropped and replaced rather than
//! handed out.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Schema introspection seam used by the workflow engine.
///
/// Called once per generation attempt; implementations may memoize.
pub trait SchemaProvider: Send + Sync {
    /// Text description of tables and columns for prompt building.
    fn describe_schema(&self) -> Result<String>;
}

/// SQLite store shared by concurrent workflow instances.
pub struct SqliteStore {
    uri: String,
    pool: Mutex<Vec<Connection>>,
    pool_size: usize,
    // Keeps a shared-cache in-memory database alive for the store's lifetime.
    _anchor: Option<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a file-backed store.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let uri = config.path.to_string_lossy().into_owned();
        let store = Self {
            uri,
            pool: Mutex::new(Vec::new()),
            pool_size: config.pool_size.max(1),
            _anchor: None,
        };
        // Fail fast on an unreachable database.
        let conn = store.connect()?;
        store.give_back(conn);
        Ok(store)
    }

    /// Open a store at a plain path with the default pool size.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&DatabaseConfig::new(path.as_ref()))
    }

    /// Create an in-memory store (for testing). Uses a shared-cache URI so
    /// every pooled connection sees the same database.
    pub fn in_memory() -> Result<Self> {
        let uri = format!("file:nl2sql-{}?mode=memory&cache=shared", Uuid::new_v4());
        let anchor = Connection::open(&uri).map_err(|e| Error::database(e.to_string()))?;
        Ok(Self {
            uri,
            pool: Mutex::new(Vec::new()),
            pool_size: 2,
            _anchor: Some(Mutex::new(anchor)),
        })
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.uri).map_err(|e| Error::database(e.to_string()))
    }

    fn checkout(&self) -> Result<Connection> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|e| Error::internal(format!("Failed to lock pool: {e}")))?;
        while let Some(conn) = pool.pop() {
            // Pre-flight liveness check; stale connections are recycled.
            if conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok() {
                return Ok(conn);
            }
            warn!("dropping stale pooled connection");
        }
        drop(pool);
        self.connect()
    }

    fn give_back(&self, conn: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            if pool.len() < self.pool_size {
                pool.push(conn);
            }
        }
    }

    /// Run DDL/seed statements (schema setup, fixtures). Not reachable from
    /// the query workflow, which only executes through [`run_query`].
    ///
    /// [`run_query`]: SqliteStore::run_query
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.checkout()?;
        let result = conn
            .execute_batch(sql)
            .map_err(|e| Error::database(e.to_string()));
        self.give_back(conn);
        result
    }

    /// Execute a read query and render the rows as text.
    ///
    /// Statements that would write are refused regardless of what upstream
    /// validation concluded. An empty result set renders as an empty string;
    /// the caller substitutes its localized "no data" text.
    pub fn run_query(&self, sql: &str) -> Result<String> {
        let conn = self.checkout()?;
        let result = render_query(&conn, sql);
        self.give_back(conn);
        result
    }
}

impl SchemaProvider for SqliteStore {
    fn describe_schema(&self) -> Result<String> {
        let conn = self.checkout()?;
        let result = (|| {
            let mut stmt = conn
                .prepare(
                    "SELECT sql FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Option<String>>(0))
                .map_err(|e| Error::database(e.to_string()))?;
            let mut parts = Vec::new();
            for sql in rows {
                if let Some(create_stmt) = sql.map_err(|e| Error::database(e.to_string()))? {
                    parts.push(create_stmt);
                }
            }
            Ok(parts.join("\n\n"))
        })();
        self.give_back(conn);
        result
    }
}

fn render_query(conn: &Connection, sql: &str) -> Result<String> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| Error::database(e.to_string()))?;
    if !stmt.readonly() {
        return Err(Error::database(
            "refusing to execute a statement that modifies the database",
        ));
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt
        .query([])
        .map_err(|e| Error::database(e.to_string()))?;

    let mut lines = Vec::new();
    while let Some(row) = rows.next().map_err(|e| Error::database(e.to_string()))? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value = row.get_ref(i).map_err(|e| Error::database(e.to_string()))?;
            cells.push(render_value(value));
        }
        lines.push(cells.join(" | "));
    }

    if lines.is_empty() {
        return Ok(String::new());
    }

    debug!(rows = lines.len(), "query executed");
    Ok(format!(
        "{}\n{}\n共 {} 行",
        columns.join(" | "),
        lines.join("\n"),
        lines.len()
    ))
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE stocks (name TEXT NOT NULL, cap REAL NOT NULL);
                 INSERT INTO stocks (name, cap) VALUES ('贵州茅台', 21000.0);
                 INSERT INTO stocks (name, cap) VALUES ('宁德时代', 11000.0);
                 INSERT INTO stocks (name, cap) VALUES ('招商银行', 9000.0);",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_describe_schema_lists_create_statements() {
        let store = seeded_store();
        let schema = store.describe_schema().unwrap();
        assert!(schema.contains("CREATE TABLE stocks"));
        assert!(schema.contains("cap REAL"));
    }

    #[test]
    fn test_run_query_renders_rows() {
        let store = seeded_store();
        let output = store
            .run_query("SELECT name, cap FROM stocks ORDER BY cap DESC LIMIT 2")
            .unwrap();
        assert!(output.starts_with("name | cap"));
        assert!(output.contains("贵州茅台 | 21000"));
        assert!(output.contains("共 2 行"));
    }

    #[test]
    fn test_run_query_empty_result_is_empty_string() {
        let store = seeded_store();
        let output = store
            .run_query("SELECT name FROM stocks WHERE cap > 99999")
            .unwrap();
        assert_eq!(output, "");
    }

    #[test]
    fn test_run_query_refuses_writes() {
        let store = seeded_store();
        let err = store.run_query("DELETE FROM stocks").unwrap_err();
        assert!(err.to_string().contains("refusing"));
        // Nothing was deleted.
        let output = store.run_query("SELECT count(*) FROM stocks").unwrap();
        assert!(output.contains("3"));
    }

    #[test]
    fn test_run_query_surfaces_sql_errors() {
        let store = seeded_store();
        let err = store.run_query("SELECT * FROM no_such_table").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(dir.path().join("stocks.db")).with_pool_size(2);

        let store = SqliteStore::open(&config).unwrap();
        store
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (42);")
            .unwrap();
        drop(store);

        let store = SqliteStore::open(&config).unwrap();
        let output = store.run_query("SELECT x FROM t").unwrap();
        assert!(output.contains("42"));
    }

    #[test]
    fn test_pool_reuses_connections_across_queries() {
        let store = seeded_store();
        for _ in 0..10 {
            store.run_query("SELECT 1").unwrap();
        }
        let pooled = store.pool.lock().unwrap().len();
        assert!(pooled >= 1);
        assert!(pooled <= store.pool_size);
    }
}
