//! SQL_READ backend: column type resolution and read-query synthesis.
//!
//! A SQL_READ tool selects a fixed column list from a fixed table, both taken
//! from its stored definition. Callers may add a single equality filter and a
//! row limit. The filter value is never spliced into the statement: its type
//! is resolved from the store catalogue and it is bound as a parameter.

use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domains::store::StoreError;

/// A single result row: column name to value, in select order.
pub type Row = Map<String, Value>;

/// A typed value bound into a synthesized statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// The family a declared column type falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Classify a declared column type the way SQLite assigns affinity:
    /// anything containing `INT` is an integer, `REAL`, `FLOA`, `DOUB`,
    /// `NUMERIC` or `DEC` a float. `BIGINT(20) UNSIGNED` is an integer.
    pub fn from_declared_type(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();

        if declared.contains("INT") || declared.contains("SERIAL") {
            Self::Integer
        } else if ["REAL", "FLOA", "DOUB", "NUMERIC", "DEC"]
            .iter()
            .any(|family| declared.contains(family))
        {
            Self::Float
        } else {
            Self::Text
        }
    }

    /// Parse a raw filter value for this column kind.
    ///
    /// Never fails: a value that does not parse as the expected number is
    /// bound as text instead.
    pub fn coerce(self, raw: &str) -> SqlValue {
        let parsed = match self {
            Self::Integer => raw.trim().parse::<i64>().ok().map(SqlValue::Integer),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(SqlValue::Float),
            Self::Text => Some(SqlValue::Text(raw.to_string())),
        };

        parsed.unwrap_or_else(|| {
            debug!(kind = ?self, value = raw, "Value does not parse as column type, binding as text");
            SqlValue::Text(raw.to_string())
        })
    }
}

/// Catalogue and query access needed by SQL_READ tools.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Declared type of `table.column`, or `None` when the column is unknown.
    async fn column_type(&self, table: &str, column: &str) -> Result<Option<String>, StoreError>;

    /// Run a synthesized read statement.
    async fn query(&self, statement: &SelectStatement) -> Result<Vec<Row>, StoreError>;
}

/// Resolve how filter values for `table.column` should be typed.
///
/// Lookup failures degrade to [`ColumnKind::Text`].
pub async fn resolve_column_kind(backend: &dyn SqlBackend, table: &str, column: &str) -> ColumnKind {
    match backend.column_type(table, column).await {
        Ok(Some(declared)) => ColumnKind::from_declared_type(&declared),
        Ok(None) => {
            debug!(table, column, "Column not found in catalogue, treating filter as text");
            ColumnKind::Text
        }
        Err(e) => {
            warn!(table, column, error = %e, "Column type lookup failed, treating filter as text");
            ColumnKind::Text
        }
    }
}

/// `true` for a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `true` for an identifier optionally qualified with dots (`main.orders`).
pub fn is_qualified_identifier(name: &str) -> bool {
    name.split('.').all(is_identifier)
}

/// The column list a SQL_READ tool selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldList {
    All,
    Columns(Vec<String>),
}

impl FieldList {
    /// Parse a comma-joined column list, or `*`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Ok(Self::All);
        }

        let columns: Vec<String> = raw.split(',').map(|c| c.trim().to_string()).collect();
        if let Some(bad) = columns.iter().find(|c| !is_identifier(c)) {
            return Err(format!("'{}' is not a valid column name", bad));
        }
        Ok(Self::Columns(columns))
    }

    /// Whether a filter on `column` is allowed by this list.
    pub fn permits(&self, column: &str) -> bool {
        match self {
            Self::All => true,
            Self::Columns(columns) => columns.iter().any(|c| c.eq_ignore_ascii_case(column)),
        }
    }

    fn select_list(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Columns(columns) => columns.join(", "),
        }
    }
}

impl fmt::Display for FieldList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Columns(columns) => f.write_str(&columns.join(",")),
        }
    }
}

/// An equality predicate with an already-typed comparison value.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: SqlValue,
}

/// A synthesized, parameterized read statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// SQL text with `?N` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<SqlValue>,
    /// Row limit applied by the statement.
    pub limit: u32,
}

/// Build `SELECT <fields> FROM <table> [WHERE <col> = ?1] LIMIT <n>`.
///
/// Identifiers must already be validated; only the filter value is bound.
pub fn synthesize(table: &str, fields: &FieldList, filter: Option<Filter>, limit: u32) -> SelectStatement {
    let mut sql = format!("SELECT {} FROM {}", fields.select_list(), table);
    let mut params = Vec::new();

    if let Some(filter) = filter {
        sql.push_str(&format!(" WHERE {} = ?1", filter.column));
        params.push(filter.value);
    }

    sql.push_str(&format!(" LIMIT {}", limit));

    SelectStatement { sql, params, limit }
}

/// Call arguments understood by SQL_READ tools.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlReadArguments {
    /// Column to filter on.
    #[schemars(description = "Column to filter on (equality)")]
    pub where_field: Option<String>,

    /// Value the column must equal.
    #[schemars(description = "Value the filter column must equal; numbers are accepted as text")]
    pub where_value: Option<String>,

    /// Maximum number of rows.
    #[schemars(description = "Maximum number of rows (defaults to the tool's limit)")]
    pub limit: Option<u32>,
}

impl SqlReadArguments {
    /// Extract arguments leniently from an untyped call payload.
    ///
    /// Numbers and booleans are accepted for `whereValue`; `limit` may be a
    /// number or a numeric string. Anything unusable is treated as absent.
    pub fn from_arguments(arguments: &Map<String, Value>) -> Self {
        let where_field = arguments
            .get("whereField")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let where_value = arguments.get("whereValue").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        });

        let limit = arguments.get("limit").and_then(|v| match v {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64))
                .and_then(|l| u32::try_from(l).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        });

        Self {
            where_field,
            where_value,
            limit,
        }
    }

    /// The caller's limit when it is a positive integer, else `default_limit`.
    pub fn effective_limit(&self, default_limit: u32) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(default_limit)
    }
}
