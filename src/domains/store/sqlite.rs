//! SQLite-backed tool store and SQL_READ backend.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlParam, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use super::{StoreError, StoreResult, ToolStore};
use crate::domains::tools::{Row, SelectStatement, SqlBackend, SqlValue, ToolDefinition, ToolRecord};

const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS api_tools (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    backend_kind  TEXT NOT NULL DEFAULT 'HTTP',
    method        TEXT,
    url           TEXT,
    input_schema  TEXT,
    table_name    TEXT,
    fields        TEXT,
    default_limit INTEGER
);
";

const SELECT_TOOLS: &str = "
SELECT id, name, description, backend_kind, method, url, input_schema,
       table_name, fields, default_limit
FROM api_tools
ORDER BY id
";

/// SQLite database holding tool metadata and the tables SQL_READ tools query.
///
/// All access goes through one connection on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` opens an
    /// in-memory database.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        info!("Opened tool store at {}", path.display());
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Execute raw SQL statements (seeding data tables, fixtures).
    pub async fn execute_batch(&self, sql: impl Into<String>) -> StoreResult<()> {
        let sql = sql.into();
        self.with_conn(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ToolRecord, Option<String>)> {
    let record = ToolRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        backend_kind: row.get(3)?,
        method: row.get(4)?,
        url: row.get(5)?,
        input_schema: None,
        table_name: row.get(7)?,
        fields: row.get(8)?,
        default_limit: row.get(9)?,
    };
    Ok((record, row.get(6)?))
}

fn json_from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Integer(v) => ToSqlOutput::Owned(SqlParam::Integer(*v)),
            SqlValue::Float(v) => ToSqlOutput::Owned(SqlParam::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

#[async_trait]
impl ToolStore for SqliteStore {
    async fn list(&self) -> StoreResult<Vec<ToolDefinition>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_TOOLS)?;
            let rows = stmt.query_map([], record_from_row)?;

            let mut definitions = Vec::new();
            for row in rows {
                let (mut record, schema_text) = row?;
                record.input_schema = schema_text.map(Value::String);

                let id = record.id;
                match ToolDefinition::try_from(record) {
                    Ok(definition) => definitions.push(definition),
                    Err(e) => warn!(id = ?id, error = %e, "Skipping malformed tool row"),
                }
            }
            Ok(definitions)
        })
        .await
    }

    async fn insert(&self, definition: &ToolDefinition) -> StoreResult<i64> {
        let record = ToolRecord::from(definition.clone());
        let schema_text = record
            .input_schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO api_tools
                     (name, description, backend_kind, method, url, input_schema,
                      table_name, fields, default_limit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.name,
                    record.description,
                    record.backend_kind,
                    record.method,
                    record.url,
                    schema_text,
                    record.table_name,
                    record.fields,
                    record.default_limit,
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!(id, name = %record.name, "Inserted tool row");
            Ok(id)
        })
        .await
    }
}

#[async_trait]
impl SqlBackend for SqliteStore {
    async fn column_type(&self, table: &str, column: &str) -> StoreResult<Option<String>> {
        // `main.orders` is looked up as table `orders` in schema `main`.
        let (schema, table) = match table.rsplit_once('.') {
            Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
            None => (None, table.to_string()),
        };
        let column = column.to_string();

        self.with_conn(move |conn| {
            let declared = match schema {
                Some(schema) => conn.query_row(
                    "SELECT type FROM pragma_table_info(?1, ?2) WHERE name = ?3 COLLATE NOCASE",
                    params![table, schema, column],
                    |row| row.get::<_, String>(0),
                ),
                None => conn.query_row(
                    "SELECT type FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
                    params![table, column],
                    |row| row.get::<_, String>(0),
                ),
            }
            .optional()?;
            Ok(declared)
        })
        .await
    }

    async fn query(&self, statement: &SelectStatement) -> StoreResult<Vec<Row>> {
        let statement = statement.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&statement.sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

            let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (idx, name) in columns.iter().enumerate() {
                    record.insert(name.clone(), json_from_sqlite(row.get_ref(idx)?));
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{FieldList, Filter, HttpMethod, SqlReadHandler, synthesize};
    use serde_json::json;
    use tokio_test::assert_ok;

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE orders (id INTEGER, customer TEXT, total REAL, note BLOB);
                 INSERT INTO orders VALUES (1, 'ada', 12.5, x'0102');
                 INSERT INTO orders VALUES (2, 'bob', 7.0, NULL);
                 INSERT INTO orders VALUES (3, 'ada', 3.25, NULL);",
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_and_list_preserve_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = ToolDefinition::http("b_tool", "second name, first row", HttpMethod::Post, "http://b");
        let second = ToolDefinition::sql_read("a_tool", "", "orders", "id,total", 5).unwrap();

        let id1 = assert_ok!(store.insert(&first).await);
        let id2 = assert_ok!(store.insert(&second).await);
        assert!(id2 > id1);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], first.clone().with_id(id1));
        assert_eq!(listed[1], second.clone().with_id(id2));
    }

    #[tokio::test]
    async fn test_list_skips_malformed_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "INSERT INTO api_tools (name, backend_kind, url) VALUES ('ok', 'HTTP', 'http://x');
                 INSERT INTO api_tools (name, backend_kind) VALUES ('broken', 'HTTP');",
            )
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "ok");
    }

    #[tokio::test]
    async fn test_list_reads_legacy_schema_text() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                r#"INSERT INTO api_tools (name, method, url, input_schema)
                   VALUES ('legacy', 'get', 'http://x', '{"type":"object","properties":{"q":{"type":"string"}}}');"#,
            )
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].input_schema()["properties"]["q"]["type"], "string");
    }

    #[tokio::test]
    async fn test_column_type_lookup() {
        let store = seeded().await;
        assert_eq!(
            store.column_type("orders", "id").await.unwrap().as_deref(),
            Some("INTEGER")
        );
        assert_eq!(
            store.column_type("orders", "TOTAL").await.unwrap().as_deref(),
            Some("REAL")
        );
        assert_eq!(store.column_type("orders", "missing").await.unwrap(), None);
        assert_eq!(store.column_type("nope", "id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_column_type_lookup_schema_qualified() {
        let store = seeded().await;
        assert_eq!(
            store.column_type("main.orders", "id").await.unwrap().as_deref(),
            Some("INTEGER")
        );
        assert_eq!(store.column_type("temp.orders", "id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_qualified_table_filter_binds_integer() {
        let store = Arc::new(seeded().await);
        for table in ["orders", "main.orders"] {
            let handler = SqlReadHandler::new(
                table,
                FieldList::parse("id,customer").unwrap(),
                10,
                store.clone(),
            );
            let arguments = json!({ "whereField": "id", "whereValue": "2" })
                .as_object()
                .cloned()
                .unwrap();

            let stmt = handler.prepare(&arguments).await.unwrap();
            assert_eq!(stmt.params, vec![SqlValue::Integer(2)], "table {}", table);

            let rows = handler.execute(&arguments).await.unwrap();
            assert_eq!(rows, json!([{ "id": 2, "customer": "bob" }]));
        }
    }

    #[tokio::test]
    async fn test_query_rows_keep_column_order() {
        let store = seeded().await;
        let fields = FieldList::parse("total,customer,id").unwrap();
        let stmt = synthesize(
            "orders",
            &fields,
            Some(Filter {
                column: "customer".to_string(),
                value: SqlValue::Text("ada".to_string()),
            }),
            10,
        );

        let rows = store.query(&stmt).await.unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["total", "customer", "id"]);
        assert_eq!(rows[0]["total"], 12.5);
    }

    #[tokio::test]
    async fn test_query_limit_and_blob() {
        let store = seeded().await;
        let stmt = synthesize("orders", &FieldList::All, None, 1);

        let rows = store.query(&stmt).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["note"], "AQI=");
    }

    #[tokio::test]
    async fn test_query_unknown_table_fails() {
        let store = seeded().await;
        let stmt = synthesize("missing", &FieldList::All, None, 1);
        let err = store.query(&stmt).await.unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert(&ToolDefinition::http("ping", "", HttpMethod::Get, "http://x"))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "ping");
    }
}
