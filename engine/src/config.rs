//! Engine configuration.

use crate::{changes::DEFAULT_FEED_CAPACITY, keys::DEFAULT_NAMESPACE};
use std::env;

/// Engine configuration, usually loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Top-level key namespace
    pub namespace: String,
    /// Buffered changes per change-feed subscriber
    pub feed_capacity: usize,
    /// Check the outbox before page merges instead of trusting the caller
    pub verify_hydration: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
            verify_hydration: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("DATASTORE_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.into());
        if namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        let feed_capacity = match lookup("DATASTORE_FEED_CAPACITY") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidFeedCapacity(value))?,
            None => DEFAULT_FEED_CAPACITY,
        };

        let verify_hydration = match lookup("DATASTORE_VERIFY_HYDRATION") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag {
                name: "DATASTORE_VERIFY_HYDRATION",
                value,
            })?,
            None => false,
        };

        Ok(Self {
            namespace,
            feed_capacity,
            verify_hydration,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATASTORE_NAMESPACE must not be empty")]
    EmptyNamespace,

    #[error("Invalid DATASTORE_FEED_CAPACITY value: {0}")]
    InvalidFeedCapacity(String),

    #[error("Invalid {name} value: {value}")]
    InvalidFlag { name: &'static str, value: String },
}
