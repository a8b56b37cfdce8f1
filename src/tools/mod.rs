//! MCP tool implementations.
//!
//! This module contains the handlers behind the server's capabilities:
//! - `tables`: list the tables of a dataset (resource)
//! - `query`: run a SQL query (tool)
//! - `validation`: parameter bag decoding and checks

pub mod query;
pub mod tables;
pub mod validation;

pub use query::{ExecuteQueryInput, QueryToolHandler};
pub use tables::{ListTablesParams, TablesToolHandler};

use crate::config::{Config, DEFAULT_MAX_TABLE_PAGES};

/// Settings shared by all handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Upper bound on `tables.list` pages fetched per listing
    pub max_table_pages: u32,
    /// Location used for queries that do not name one
    pub default_location: Option<String>,
}

impl ToolSettings {
    /// Take the handler settings from the server configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_table_pages: config.max_table_pages,
            default_location: config.location.clone(),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_table_pages: DEFAULT_MAX_TABLE_PAGES,
            default_location: None,
        }
    }
}
