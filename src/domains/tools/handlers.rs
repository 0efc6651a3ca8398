//! Tool handlers: the executable side of a tool definition.
//!
//! A handler is bound once per definition when it enters the catalogue and
//! closes over the collaborator it needs. Both backends share one
//! `execute(arguments)` entry point.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::ToolError;
use super::backends::sql::{self, FieldList, Filter, SqlBackend, SqlReadArguments};
use super::backends::{Backends, HttpClient, HttpMethod};
use super::definition::{ToolBackend, ToolDefinition};

/// Untyped call arguments.
pub type Arguments = Map<String, Value>;

/// Proxies a call to a remote HTTP endpoint.
#[derive(Clone)]
pub struct HttpHandler {
    method: HttpMethod,
    url: String,
    client: Arc<dyn HttpClient>,
}

impl HttpHandler {
    pub fn new(method: HttpMethod, url: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            method,
            url: url.into(),
            client,
        }
    }

    /// POST sends the serialized arguments as the body; GET sends nothing.
    pub async fn execute(&self, arguments: &Arguments) -> Result<Value, ToolError> {
        let response = match self.method {
            HttpMethod::Post => {
                let body = serde_json::to_string(arguments)
                    .map_err(|e| ToolError::execution_failed(e.to_string()))?;
                self.client.post(&self.url, body).await
            }
            HttpMethod::Get => self.client.get(&self.url).await,
        };

        response
            .map(Value::String)
            .map_err(|e| ToolError::execution_failed(format!("Error calling {}: {}", self.url, e)))
    }
}

/// Runs a bounded, parameterized read against one table.
#[derive(Clone)]
pub struct SqlReadHandler {
    table_name: String,
    fields: FieldList,
    default_limit: u32,
    backend: Arc<dyn SqlBackend>,
}

impl SqlReadHandler {
    pub fn new(
        table_name: impl Into<String>,
        fields: FieldList,
        default_limit: u32,
        backend: Arc<dyn SqlBackend>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            fields,
            default_limit,
            backend,
        }
    }

    /// Resolve the optional filter into a typed predicate.
    async fn filter(&self, args: &SqlReadArguments) -> Result<Option<Filter>, ToolError> {
        let (Some(column), Some(raw)) = (&args.where_field, &args.where_value) else {
            return Ok(None);
        };

        if !sql::is_identifier(column) {
            return Err(ToolError::execution_failed(format!(
                "'{}' is not a valid column name",
                column
            )));
        }
        if !self.fields.permits(column) {
            return Err(ToolError::execution_failed(format!(
                "Column '{}' is not exposed by this tool",
                column
            )));
        }

        let kind = sql::resolve_column_kind(self.backend.as_ref(), &self.table_name, column).await;
        Ok(Some(Filter {
            column: column.clone(),
            value: kind.coerce(raw),
        }))
    }

    /// Synthesize the statement for a call without running it.
    pub async fn prepare(&self, arguments: &Arguments) -> Result<sql::SelectStatement, ToolError> {
        let args = SqlReadArguments::from_arguments(arguments);
        let filter = self.filter(&args).await?;
        let limit = args.effective_limit(self.default_limit);
        Ok(sql::synthesize(&self.table_name, &self.fields, filter, limit))
    }

    pub async fn execute(&self, arguments: &Arguments) -> Result<Value, ToolError> {
        let statement = self.prepare(arguments).await?;
        debug!(sql = %statement.sql, params = statement.params.len(), "Running SQL_READ tool");

        let rows = self
            .backend
            .query(&statement)
            .await
            .map_err(|e| ToolError::execution_failed(e.to_string()))?;

        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

/// The bound, executable form of a tool definition.
#[derive(Clone)]
pub enum ToolHandler {
    Http(HttpHandler),
    SqlRead(SqlReadHandler),
}

impl ToolHandler {
    /// Bind a definition to the collaborator its backend kind needs.
    pub fn bind(definition: &ToolDefinition, backends: &Backends) -> Self {
        match &definition.backend {
            ToolBackend::Http(spec) => {
                Self::Http(HttpHandler::new(spec.method, &spec.url, backends.http.clone()))
            }
            ToolBackend::SqlRead(spec) => Self::SqlRead(SqlReadHandler::new(
                &spec.table_name,
                spec.fields.clone(),
                spec.default_limit,
                backends.sql.clone(),
            )),
        }
    }

    /// Execute the tool. Backend failures come back as
    /// [`ToolError::ExecutionFailed`].
    pub async fn execute(&self, arguments: &Arguments) -> Result<Value, ToolError> {
        match self {
            Self::Http(handler) => handler.execute(arguments).await,
            Self::SqlRead(handler) => handler.execute(arguments).await,
        }
    }
}
