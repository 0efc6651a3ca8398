//! Dynamic tool-invocation gateway.
//!
//! Tools are declared as rows in a metadata store rather than compiled in.
//! Each row is bound at load time to a backend that either proxies an HTTP
//! endpoint or runs a bounded, parameterized read against the database.
//! Calls are acknowledged immediately; their outcomes are published on an
//! event bus and streamed to subscribers.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the [`Gateway`] handle and the
//!   transports (HTTP REST/streaming, MCP over STDIO or TCP)
//! - **domains**: business logic organized by bounded contexts
//!   - **tools**: definitions, backends, handlers, registry and dispatcher
//!   - **store**: SQLite persistence
//!   - **events**: the outcome broadcast bus
//!
//! # Example
//!
//! ```rust,no_run
//! use tool_gateway::core::{Config, Gateway, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let gateway = Gateway::open(config.clone()).await?;
//!     TransportService::new(config.transport).run(gateway).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

pub use core::{Config, Error, Gateway, Result};
