//! SQLite persistence for the datastore engine.
//!
//! Provides a [`SqliteBackend`] implementing the engine's key-value
//! contract on a single `kv` table, plus pool setup, configuration and the
//! commands behind the `datastore` tool.

pub mod cli;
pub mod config;
pub mod error;
mod kv;
mod pool;

pub use cli::Command;
pub use config::{Config, ConfigError};
pub use error::AppError;
pub use kv::SqliteBackend;
pub use pool::*;
