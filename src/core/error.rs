//! Error types and handling for the gateway.
//!
//! Domain errors are aggregated into one [`Error`] so the binary and the
//! transports can propagate any failure with `?`.

use thiserror::Error;

/// A specialized Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// Error originating from the tools domain.
    #[error("Tool error: {0}")]
    Tool(#[from] crate::domains::tools::ToolError),

    /// Error originating from the tool store.
    #[error("Store error: {0}")]
    Store(#[from] crate::domains::store::StoreError),

    /// Error raised while serving a transport.
    #[error("Transport error: {0}")]
    Transport(#[from] super::transport::TransportError),
}
