//! Configuration handling for the BigQuery MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::error::{BqError, BqResult};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_MAX_TABLE_PAGES: u32 = 10;
/// Server-side wait window for `jobs.query` / `jobs.getQueryResults`.
pub const DEFAULT_QUERY_WAIT_MS: u64 = 10_000;

/// Configuration for the BigQuery MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bigquery-mcp-server",
    about = "MCP server for BigQuery - lets AI assistants list tables and run SQL queries",
    version,
    author
)]
pub struct Config {
    /// Path to the Google credentials file (service account key or
    /// application-default credentials). Required.
    #[arg(
        long,
        value_name = "PATH",
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        hide_env_values = true
    )]
    pub credentials: Option<PathBuf>,

    /// Default GCP project for listings and queries.
    /// Falls back to the project associated with the credentials.
    #[arg(long, value_name = "PROJECT", env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Default query location (e.g. "US", "asia-northeast1"), used when a
    /// query does not specify one
    #[arg(long, env = "BIGQUERY_LOCATION")]
    pub location: Option<String>,

    /// BigQuery REST API base URL
    #[arg(long, default_value = DEFAULT_API_BASE_URL, env = "BIGQUERY_API_BASE_URL")]
    pub api_base_url: String,

    /// Maximum number of table list pages fetched per resource read
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TABLE_PAGES,
        env = "MCP_MAX_TABLE_PAGES",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_table_pages: u32,

    /// How long BigQuery may hold a query request open waiting for the job (milliseconds)
    #[arg(long, default_value_t = DEFAULT_QUERY_WAIT_MS, env = "MCP_QUERY_WAIT_MS")]
    pub query_wait_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            credentials: None,
            project_id: None,
            location: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_table_pages: DEFAULT_MAX_TABLE_PAGES,
            query_wait_ms: DEFAULT_QUERY_WAIT_MS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Check the settings that must hold before the server may start.
    ///
    /// Returns the credentials path on success.
    pub fn validate(&self) -> BqResult<&PathBuf> {
        let path = self.credentials.as_ref().ok_or_else(|| {
            BqError::configuration(
                "GOOGLE_APPLICATION_CREDENTIALS is not set. \
                Point it (or --credentials) at a service account key or application-default credentials file.",
            )
        })?;

        if path.as_os_str().is_empty() {
            return Err(BqError::configuration(
                "GOOGLE_APPLICATION_CREDENTIALS is set but empty",
            ));
        }
        if !path.is_file() {
            return Err(BqError::configuration(format!(
                "Credentials file not found: {}",
                path.display()
            )));
        }
        if let Some(project) = &self.project_id {
            if project.trim().is_empty() {
                return Err(BqError::configuration("--project-id must not be empty"));
            }
        }
        if url::Url::parse(&self.api_base_url).is_err() {
            return Err(BqError::configuration(format!(
                "Invalid API base URL: {}",
                self.api_base_url
            )));
        }
        Ok(path)
    }

    /// Get the query wait window as a Duration.
    pub fn query_wait_duration(&self) -> Duration {
        Duration::from_millis(self.query_wait_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
