//! BigQuery MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) capabilities for AI
//! assistants to explore BigQuery: a resource template that lists the tables
//! of a dataset and a tool that runs SQL queries.

pub mod bigquery;
pub mod config;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use bigquery::{BigQueryClient, WarehouseClient};
pub use config::Config;
pub use error::BqError;
pub use mcp::BigQueryService;
