//! Tool definitions: the canonical description of one invocable tool.
//!
//! Definitions travel in a flat wire/row shape ([`ToolRecord`]) that mirrors
//! the `api_tools` table and the `/tools` API. Converting a record into a
//! [`ToolDefinition`] validates it, so every definition held in memory is
//! well-formed.

use rmcp::handler::server::tool::schema_for_type;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::ToolError;
use super::backends::sql::{FieldList, SqlReadArguments, is_qualified_identifier};
use super::backends::HttpMethod;

/// Row limit used when a SQL_READ definition does not specify one.
pub const DEFAULT_ROW_LIMIT: u32 = 10;

/// Execution strategy of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "SQL_READ")]
    SqlRead,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::SqlRead => "SQL_READ",
        }
    }

    /// Parse a stored kind. A missing kind means HTTP, which is what rows
    /// written before SQL tools existed contain.
    pub fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::Http),
            Some(k) if k.eq_ignore_ascii_case("http") => Ok(Self::Http),
            Some(k) if k.eq_ignore_ascii_case("sql_read") || k.eq_ignore_ascii_case("sql") => {
                Ok(Self::SqlRead)
            }
            Some(other) => Err(ToolError::invalid_definition(format!(
                "unknown backendKind '{}'",
                other
            ))),
        }
    }
}

/// Parameters of an HTTP-backed tool.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpToolSpec {
    pub method: HttpMethod,
    pub url: String,
    /// Opaque description of accepted arguments, advertised to clients.
    pub input_schema: Value,
}

/// Parameters of a SQL_READ tool.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlReadSpec {
    pub table_name: String,
    pub fields: FieldList,
    pub default_limit: u32,
}

/// Kind-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolBackend {
    Http(HttpToolSpec),
    SqlRead(SqlReadSpec),
}

/// A validated tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ToolRecord", into = "ToolRecord")]
pub struct ToolDefinition {
    /// Store-assigned identifier; `None` until persisted.
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub backend: ToolBackend,
}

/// Flat wire and row shape of a tool definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<i64>,
}

/// Schema advertised by HTTP tools that do not declare one.
pub fn default_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": {
                "type": "string",
                "description": "Optional input text or parameters"
            }
        }
    })
}

/// Schema advertised by every SQL_READ tool.
pub fn sql_read_input_schema() -> Value {
    Value::Object(schema_for_type::<SqlReadArguments>())
}

/// Accept a schema given as an object or as JSON text holding one.
fn normalize_schema(raw: Option<Value>) -> Value {
    match raw {
        None | Some(Value::Null) => default_input_schema(),
        Some(Value::String(text)) if text.trim().is_empty() => default_input_schema(),
        Some(Value::String(text)) => serde_json::from_str::<Value>(&text)
            .ok()
            .filter(Value::is_object)
            .unwrap_or(Value::String(text)),
        Some(other) => other,
    }
}

impl ToolDefinition {
    /// Create an HTTP-backed definition with the default input schema.
    pub fn http(
        name: impl Into<String>,
        description: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            backend: ToolBackend::Http(HttpToolSpec {
                method,
                url: url.into(),
                input_schema: default_input_schema(),
            }),
        }
    }

    /// Create a SQL_READ definition.
    ///
    /// Fails when the table or field list is not made of plain identifiers.
    pub fn sql_read(
        name: impl Into<String>,
        description: impl Into<String>,
        table_name: impl Into<String>,
        fields: &str,
        default_limit: u32,
    ) -> Result<Self, ToolError> {
        Self::try_from(ToolRecord {
            name: name.into(),
            description: description.into(),
            backend_kind: Some(BackendKind::SqlRead.as_str().to_string()),
            table_name: Some(table_name.into()),
            fields: Some(fields.to_string()),
            default_limit: Some(i64::from(default_limit)),
            ..Default::default()
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self.backend {
            ToolBackend::Http(_) => BackendKind::Http,
            ToolBackend::SqlRead(_) => BackendKind::SqlRead,
        }
    }

    /// Key used for case-insensitive lookup.
    pub fn lookup_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Schema of accepted call arguments.
    pub fn input_schema(&self) -> Value {
        match &self.backend {
            ToolBackend::Http(spec) => spec.input_schema.clone(),
            ToolBackend::SqlRead(_) => sql_read_input_schema(),
        }
    }

    /// The `{name, description, inputSchema}` view served to clients.
    pub fn summary(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Return a copy carrying the store-assigned id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl TryFrom<ToolRecord> for ToolDefinition {
    type Error = ToolError;

    fn try_from(record: ToolRecord) -> Result<Self, Self::Error> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err(ToolError::invalid_definition("name must not be empty"));
        }

        let backend = match BackendKind::parse(record.backend_kind.as_deref())? {
            BackendKind::Http => {
                let url = record
                    .url
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        ToolError::invalid_definition(format!("HTTP tool '{}' has no url", name))
                    })?;

                ToolBackend::Http(HttpToolSpec {
                    method: HttpMethod::parse(record.method.as_deref()),
                    url,
                    input_schema: normalize_schema(record.input_schema),
                })
            }
            BackendKind::SqlRead => {
                let table_name = record
                    .table_name
                    .map(|t| t.trim().to_string())
                    .filter(|t| is_qualified_identifier(t))
                    .ok_or_else(|| {
                        ToolError::invalid_definition(format!(
                            "SQL_READ tool '{}' needs a valid tableName",
                            name
                        ))
                    })?;

                let fields = FieldList::parse(record.fields.as_deref().unwrap_or("*"))
                    .map_err(ToolError::invalid_definition)?;

                let default_limit = match record.default_limit {
                    None => DEFAULT_ROW_LIMIT,
                    Some(limit) => u32::try_from(limit)
                        .ok()
                        .filter(|l| *l > 0)
                        .ok_or_else(|| {
                            ToolError::invalid_definition(format!(
                                "defaultLimit must be a positive integer, got {}",
                                limit
                            ))
                        })?,
                };

                ToolBackend::SqlRead(SqlReadSpec {
                    table_name,
                    fields,
                    default_limit,
                })
            }
        };

        Ok(Self {
            id: record.id,
            name,
            description: record.description,
            backend,
        })
    }
}

impl From<ToolDefinition> for ToolRecord {
    fn from(definition: ToolDefinition) -> Self {
        let kind = definition.kind();
        let mut record = ToolRecord {
            id: definition.id,
            name: definition.name,
            description: definition.description,
            backend_kind: Some(kind.as_str().to_string()),
            ..Default::default()
        };

        match definition.backend {
            ToolBackend::Http(spec) => {
                record.method = Some(spec.method.as_str().to_string());
                record.url = Some(spec.url);
                record.input_schema = Some(spec.input_schema);
            }
            ToolBackend::SqlRead(spec) => {
                record.table_name = Some(spec.table_name);
                record.fields = Some(spec.fields.to_string());
                record.default_limit = Some(i64::from(spec.default_limit));
            }
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_defaults() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "weather",
            "description": "Current weather",
            "url": "http://example.com/weather"
        }))
        .unwrap();

        assert_eq!(def.kind(), BackendKind::Http);
        match &def.backend {
            ToolBackend::Http(spec) => {
                assert_eq!(spec.method, HttpMethod::Get);
                assert_eq!(spec.input_schema, default_input_schema());
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "submit",
            "backendKind": "HTTP",
            "method": "post",
            "url": "http://example.com/submit"
        }))
        .unwrap();

        match def.backend {
            ToolBackend::Http(spec) => assert_eq!(spec.method, HttpMethod::Post),
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_input_schema_as_text() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "search",
            "url": "http://example.com/search",
            "inputSchema": "{\"type\":\"object\",\"properties\":{\"q\":{\"type\":\"string\"}}}"
        }))
        .unwrap();

        assert_eq!(def.input_schema()["properties"]["q"]["type"], "string");
    }

    #[test]
    fn test_sql_read_definition() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "orders",
            "description": "Recent orders",
            "backendKind": "SQL_READ",
            "tableName": "orders",
            "fields": "id, total",
        }))
        .unwrap();

        match &def.backend {
            ToolBackend::SqlRead(spec) => {
                assert_eq!(spec.table_name, "orders");
                assert_eq!(spec.default_limit, DEFAULT_ROW_LIMIT);
                assert!(spec.fields.permits("total"));
                assert!(!spec.fields.permits("secret"));
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert!(def.input_schema()["properties"].get("whereField").is_some());
    }

    #[test]
    fn test_rejects_invalid_definitions() {
        let empty_name = serde_json::from_value::<ToolDefinition>(json!({
            "name": "  ",
            "url": "http://example.com"
        }));
        assert!(empty_name.is_err());

        let no_url = serde_json::from_value::<ToolDefinition>(json!({ "name": "x" }));
        assert!(no_url.is_err());

        let bad_table = ToolDefinition::sql_read("x", "", "orders; drop table y", "*", 5);
        assert!(matches!(bad_table, Err(ToolError::InvalidDefinition(_))));

        let zero_limit = ToolDefinition::sql_read("x", "", "orders", "*", 0);
        assert!(zero_limit.is_err());

        let unknown_kind = serde_json::from_value::<ToolDefinition>(json!({
            "name": "x",
            "backendKind": "GRPC",
            "url": "http://example.com"
        }));
        assert!(unknown_kind.is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let def = ToolDefinition::sql_read("orders", "Recent orders", "orders", "a,b", 10)
            .unwrap()
            .with_id(7);
        let value = serde_json::to_value(&def).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["backendKind"], "SQL_READ");
        assert_eq!(value["tableName"], "orders");
        assert_eq!(value["fields"], "a,b");
        assert_eq!(value["defaultLimit"], 10);
        assert!(value.get("url").is_none());

        let back: ToolDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(back, def);
    }
}
