//! Domains module containing business logic organized by bounded contexts.
//!
//! - `tools` - tool definitions, backends, catalogue and dispatch
//! - `store` - SQLite persistence for tool rows and SQL_READ queries
//! - `events` - broadcast bus carrying call outcomes

pub mod events;
pub mod store;
pub mod tools;
