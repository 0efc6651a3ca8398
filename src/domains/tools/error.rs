//! Tool-specific error types.

use thiserror::Error;

/// Errors that can occur during tool registration, reload and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not in the live catalogue.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// A tool with the same (case-insensitive) name is already registered.
    #[error("Tool already registered: {0}")]
    DuplicateName(String),

    /// The tool definition is malformed.
    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    /// The metadata store could not be read; the previous catalogue is kept.
    #[error("Tool store unavailable: {0}")]
    StoreUnavailable(String),

    /// The definition could not be written to the store.
    #[error("Failed to persist tool: {0}")]
    PersistenceFailed(String),

    /// A backend (HTTP or SQL) failed while executing a single call.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "invalid definition" error.
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}
