//! Core module containing shared infrastructure components.
//!
//! Configuration, the unified error type, the [`Gateway`] handle and the
//! transports that expose it.

pub mod config;
pub mod error;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use server::Gateway;
pub use transport::{TransportConfig, TransportService};
