//! Transport layer for the gateway.
//!
//! - **HTTP**: REST routes for the catalogue, `/call`, and the NDJSON and
//!   SSE streams - feature: `http`
//! - **STDIO**: MCP over standard input/output - feature: `stdio`
//! - **TCP**: MCP over raw TCP sockets - feature: `tcp`

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;

#[cfg(feature = "http")]
pub use config::HttpConfig;
