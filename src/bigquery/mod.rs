//! BigQuery access layer.
//!
//! This module provides warehouse access functionality:
//! - The `WarehouseClient` trait, the seam between tool handlers and the service
//! - `BigQueryClient`, the REST implementation
//! - Credential loading for service account and authorized user files
//! - Row decoding from BigQuery's wire shape into JSON
//! - Named query parameter typing

pub mod client;
pub mod credentials;
pub mod params;
pub mod rows;
#[cfg(test)]
mod test_server;

pub use client::{BIGQUERY_SCOPE, BigQueryClient};
pub use credentials::{AuthorizedUser, load_token_provider};

use crate::error::BqResult;
use crate::models::{QueryRequest, QueryResponse, TableList};
use async_trait::async_trait;

/// Calls into the data warehouse.
///
/// Each method performs a single request (plus completion waiting for
/// queries). Implementations hold only read-only configuration, so one
/// instance is shared by all requests.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Project used when a request does not name one.
    fn default_project(&self) -> &str;

    /// Fetch one page of the tables in a dataset.
    async fn list_tables(
        &self,
        project_id: &str,
        dataset_id: &str,
        page_token: Option<&str>,
    ) -> BqResult<TableList>;

    /// Run a query and wait for the job to complete.
    ///
    /// Returns the first page of results only.
    async fn run_query(&self, project_id: &str, request: &QueryRequest) -> BqResult<QueryResponse>;
}
