//! BigQuery MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) capabilities for AI
//! assistants to list BigQuery tables and run SQL queries over stdio.

use bigquery_mcp_server::bigquery::BigQueryClient;
use bigquery_mcp_server::config::Config;
use bigquery_mcp_server::error::BqError;
use bigquery_mcp_server::tools::ToolSettings;
use bigquery_mcp_server::transport::{StdioTransport, Transport};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status for a configuration problem detected before serving.
const EXIT_CONFIGURATION: u8 = 2;

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout is reserved for protocol messages.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

fn startup_failure(err: &BqError) -> ExitCode {
    error!(error = %err, "Server failed to start");
    if err.is_fatal() {
        ExitCode::from(EXIT_CONFIGURATION)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    let credentials = match config.validate() {
        Ok(path) => path.clone(),
        Err(e) => return startup_failure(&e),
    };

    info!(
        credentials = %credentials.display(),
        "Starting BigQuery MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = match BigQueryClient::from_credentials(
        &credentials,
        config.project_id.clone(),
        &config.api_base_url,
    )
    .await
    {
        Ok(client) => client.with_query_wait(config.query_wait_duration()),
        Err(e) => return startup_failure(&e),
    };

    let transport = StdioTransport::new(Arc::new(client), ToolSettings::from_config(&config));
    info!(transport = transport.name(), "Server ready");

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}
