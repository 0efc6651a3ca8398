//! In-memory fakes for the store, HTTP and SQL collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backends::{Backends, HttpClient, Row, SelectStatement, SqlBackend};
use super::ToolDefinition;
use crate::domains::store::{StoreError, StoreResult, ToolStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpCall {
    Get { url: String },
    Post { url: String, body: String },
}

/// Records every request and answers with a fixed body or error.
pub struct FakeHttpClient {
    response: Result<String, String>,
    panics: bool,
    calls: Mutex<Vec<HttpCall>>,
}

impl FakeHttpClient {
    pub fn responding(body: &str) -> Self {
        Self {
            response: Ok(body.to_string()),
            panics: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            response: Err(error.to_string()),
            panics: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every request panics after being recorded.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::responding("")
        }
    }

    fn answer(&self) -> Result<String, String> {
        if self.panics {
            panic!("fake http client exploded");
        }
        self.response.clone()
    }

    pub fn calls(&self) -> Vec<HttpCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn get(&self, url: &str) -> Result<String, String> {
        self.calls.lock().push(HttpCall::Get { url: url.to_string() });
        self.answer()
    }

    async fn post(&self, url: &str, body: String) -> Result<String, String> {
        self.calls.lock().push(HttpCall::Post {
            url: url.to_string(),
            body,
        });
        self.answer()
    }
}

/// Catalogue and query fake recording executed statements.
#[derive(Default)]
pub struct FakeSqlBackend {
    columns: HashMap<(String, String), String>,
    rows: Vec<Row>,
    catalogue_error: bool,
    query_error: Option<String>,
    executed: Mutex<Vec<SelectStatement>>,
}

impl FakeSqlBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, table: &str, column: &str, declared: &str) -> Self {
        self.columns
            .insert((table.to_string(), column.to_string()), declared.to_string());
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing_catalogue(mut self) -> Self {
        self.catalogue_error = true;
        self
    }

    pub fn failing_queries(mut self, message: &str) -> Self {
        self.query_error = Some(message.to_string());
        self
    }

    pub fn executed(&self) -> Vec<SelectStatement> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl SqlBackend for FakeSqlBackend {
    async fn column_type(&self, table: &str, column: &str) -> StoreResult<Option<String>> {
        if self.catalogue_error {
            return Err(StoreError::Task("catalogue offline".to_string()));
        }
        Ok(self
            .columns
            .get(&(table.to_string(), column.to_string()))
            .cloned())
    }

    async fn query(&self, statement: &SelectStatement) -> StoreResult<Vec<Row>> {
        self.executed.lock().push(statement.clone());
        match &self.query_error {
            Some(message) => Err(StoreError::Task(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}

/// Tool store keeping rows in memory, with switchable failures.
#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<ToolDefinition>>,
    fail_list: AtomicBool,
    fail_insert: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<ToolDefinition>) -> Self {
        let store = Self::default();
        for row in rows {
            store.push(row);
        }
        store
    }

    /// Add a row directly, as another writer would.
    pub fn push(&self, definition: ToolDefinition) {
        let mut rows = self.rows.lock();
        let id = rows.len() as i64 + 1;
        rows.push(definition.with_id(id));
    }

    pub fn replace(&self, rows: Vec<ToolDefinition>) {
        self.rows.lock().clear();
        for row in rows {
            self.push(row);
        }
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl ToolStore for FakeStore {
    async fn list(&self) -> StoreResult<Vec<ToolDefinition>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Task("database is down".to_string()));
        }
        Ok(self.rows.lock().clone())
    }

    async fn insert(&self, definition: &ToolDefinition) -> StoreResult<i64> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Task("disk full".to_string()));
        }
        let mut rows = self.rows.lock();
        let id = rows.len() as i64 + 1;
        rows.push(definition.clone().with_id(id));
        Ok(id)
    }
}

/// Backends wired to fresh fakes, returned alongside for inspection.
pub fn fake_backends() -> (Backends, Arc<FakeHttpClient>, Arc<FakeSqlBackend>) {
    let http = Arc::new(FakeHttpClient::responding("ok"));
    let sql = Arc::new(FakeSqlBackend::new());
    (Backends::new(http.clone(), sql.clone()), http, sql)
}
