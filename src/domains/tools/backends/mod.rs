//! Execution backends for dynamic tools.
//!
//! - `http`: outbound HTTP proxying (GET/POST)
//! - `sql`: bounded, parameterized reads with catalogue-driven typing

pub mod http;
pub mod sql;

use std::sync::Arc;

pub use http::{HttpClient, HttpMethod, ReqwestClient};
pub use sql::{
    ColumnKind, FieldList, Filter, Row, SelectStatement, SqlBackend, SqlReadArguments, SqlValue,
};

/// Collaborators that handlers close over when they are bound.
#[derive(Clone)]
pub struct Backends {
    pub http: Arc<dyn HttpClient>,
    pub sql: Arc<dyn SqlBackend>,
}

impl Backends {
    pub fn new(http: Arc<dyn HttpClient>, sql: Arc<dyn SqlBackend>) -> Self {
        Self { http, sql }
    }
}
