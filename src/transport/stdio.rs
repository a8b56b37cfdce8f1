//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::bigquery::WarehouseClient;
use crate::error::{BqError, BqResult};
use crate::mcp::BigQueryService;
use crate::tools::ToolSettings;
use crate::transport::Transport;
use rmcp::{ServiceExt, transport::stdio};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// How long the service loop gets to stop after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout, as MCP clients expect.
pub struct StdioTransport {
    client: Arc<dyn WarehouseClient>,
    settings: ToolSettings,
}

impl StdioTransport {
    /// Create a new stdio transport.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared warehouse client for every request
    /// * `settings` - Handler settings passed to the service
    pub fn new(client: Arc<dyn WarehouseClient>, settings: ToolSettings) -> Self {
        Self { client, settings }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> BqResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = BigQueryService::new(self.client.clone(), self.settings.clone());

        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| BqError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let cancel = running_service.cancellation_token();
        let waiting = running_service.waiting();
        tokio::pin!(waiting);

        let shutdown_requested = tokio::select! {
            result = &mut waiting => {
                match result {
                    Ok(_quit_reason) => {
                        info!("Stdio transport completed normally");
                    }
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(BqError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });

            stop_service(|| cancel.cancel(), &mut waiting, SHUTDOWN_GRACE).await;

            // A pending stdin read cannot be cancelled from select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Cancel the service loop and wait up to `grace` for it to finish.
///
/// Returns whether the loop stopped in time.
async fn stop_service<F: Future>(cancel: impl FnOnce(), service: F, grace: Duration) -> bool {
    cancel();
    match tokio::time::timeout(grace, service).await {
        Ok(_) => {
            info!("Service loop stopped");
            true
        }
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Service loop did not stop in time"
            );
            false
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// If a handler cannot be installed that signal is never observed.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
