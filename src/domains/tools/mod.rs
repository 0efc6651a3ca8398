//! Tools domain module.
//!
//! Tools are not compiled in. Each one is a row in the tool store, bound at
//! load time to the backend that executes it.
//!
//! ## Architecture
//!
//! - `definition.rs` - Declarative tool records and their validation
//! - `backends/` - HTTP and SQL collaborators behind traits
//! - `handlers.rs` - Executable handlers bound from definitions
//! - `registry.rs` - Hot-swappable catalogue of registered tools
//! - `dispatcher.rs` - Asynchronous invocation with published outcomes
//! - `error.rs` - Tool-specific error types

pub mod backends;
mod definition;
mod dispatcher;
mod error;
mod handlers;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::sql::synthesize;
pub use backends::{
    Backends, ColumnKind, FieldList, Filter, HttpClient, HttpMethod, ReqwestClient, Row,
    SelectStatement, SqlBackend, SqlReadArguments, SqlValue,
};
pub use definition::{
    BackendKind, DEFAULT_ROW_LIMIT, HttpToolSpec, SqlReadSpec, ToolBackend, ToolDefinition,
    ToolRecord, default_input_schema, sql_read_input_schema,
};
pub use dispatcher::{CallAck, CallOutcome, CallRequest, CallStatus, Dispatcher, TOOL_NOT_REGISTERED};
pub use error::ToolError;
pub use handlers::{Arguments, HttpHandler, SqlReadHandler, ToolHandler};
pub use registry::{Catalogue, RegisteredTool, ToolRegistry};
