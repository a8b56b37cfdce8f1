//! Query execution tool.
//!
//! This module implements the `execute_query` MCP tool: it turns tool input
//! into a `jobs.query` request, runs it, and reshapes the response into rows
//! plus metadata.

use crate::bigquery::WarehouseClient;
use crate::bigquery::params::named_parameters;
use crate::bigquery::rows::decode_rows;
use crate::error::BqResult;
use crate::models::{QueryMetadata, QueryRequest, QueryResponse, QueryResult};
use crate::tools::ToolSettings;
use crate::tools::validation::{Validate, optional_non_empty, require_non_empty};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{error, info};

/// Input for the execute_query tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryInput {
    /// SQL query to run (GoogleSQL / standard SQL)
    pub query: String,
    /// Project to run the query in. Defaults to the server's default project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Location to run the job in, e.g. "US" or "asia-northeast1"
    #[serde(default)]
    pub location: Option<String>,
    /// Maximum number of rows to return
    #[serde(default)]
    pub max_results: Option<u32>,
    /// Named query parameters, referenced as @name in the SQL
    #[serde(default)]
    pub params: Option<Map<String, JsonValue>>,
    /// Validate the query and estimate bytes processed without running it
    #[serde(default)]
    pub dry_run: Option<bool>,
}

impl Validate for ExecuteQueryInput {
    fn validate(&self) -> BqResult<()> {
        require_non_empty("query", &self.query)?;
        optional_non_empty("projectId", self.project_id.as_deref())?;
        optional_non_empty("location", self.location.as_deref())
    }
}

impl ExecuteQueryInput {
    /// Create input for a bare query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Build the `jobs.query` request.
    ///
    /// Only options present on the input are set; `default_location` fills
    /// in when the input names no location.
    pub fn to_request(&self, default_location: Option<&str>) -> BqResult<QueryRequest> {
        let mut request = QueryRequest::new(&self.query);
        if let Some(location) = self.location.as_deref().or(default_location) {
            request = request.with_location(location);
        }
        if let Some(max_results) = self.max_results {
            request = request.with_max_results(max_results);
        }
        if let Some(dry_run) = self.dry_run {
            request = request.with_dry_run(dry_run);
        }
        if let Some(params) = self.params.as_ref().filter(|p| !p.is_empty()) {
            request = request.with_named_parameters(named_parameters(params)?);
        }
        Ok(request)
    }
}

/// Reshape a query response into rows and metadata.
pub fn shape_result(response: QueryResponse) -> QueryResult {
    let rows = decode_rows(response.schema.as_ref(), &response.rows);
    let metadata = QueryMetadata {
        total_rows: rows.len().to_string(),
        job_id: response
            .job_reference
            .as_ref()
            .map(|job| job.job_id.clone())
            .unwrap_or_default(),
        job_reference: response.job_reference,
        total_bytes_processed: response.total_bytes_processed,
        cache_hit: response.cache_hit,
    };
    QueryResult { rows, metadata }
}

/// Handler for query execution.
pub struct QueryToolHandler {
    client: Arc<dyn WarehouseClient>,
    default_location: Option<String>,
}

impl QueryToolHandler {
    /// Create a new handler.
    pub fn new(client: Arc<dyn WarehouseClient>, settings: &ToolSettings) -> Self {
        Self {
            client,
            default_location: settings.default_location.clone(),
        }
    }

    /// Run a query.
    ///
    /// Upstream failures are logged and returned unchanged.
    pub async fn execute(&self, input: ExecuteQueryInput) -> BqResult<QueryResult> {
        input.validate()?;
        let project = input
            .project_id
            .as_deref()
            .unwrap_or_else(|| self.client.default_project())
            .to_string();
        let request = input.to_request(self.default_location.as_deref())?;

        info!(
            project = %project,
            location = ?request.location,
            dry_run = request.dry_run.unwrap_or(false),
            params = request.query_parameters.as_ref().map_or(0, Vec::len),
            "Executing query"
        );

        let response = self
            .client
            .run_query(&project, &request)
            .await
            .map_err(|e| {
                error!(project = %project, error = %e, "Query failed");
                e
            })?;

        let result = shape_result(response);
        info!(
            rows = result.row_count(),
            job_id = %result.metadata.job_id,
            "Query completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BqError;
    use serde_json::json;

    #[test]
    fn test_to_request_forwards_only_present_options() {
        let request = ExecuteQueryInput::new("SELECT 1").to_request(None).unwrap();
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"query": "SELECT 1", "useLegacySql": false})
        );
    }

    #[test]
    fn test_to_request_with_all_options() {
        let input = ExecuteQueryInput {
            location: Some("EU".to_string()),
            max_results: Some(25),
            dry_run: Some(true),
            params: json!({"min": 3}).as_object().cloned(),
            ..ExecuteQueryInput::new("SELECT * FROM t WHERE n > @min")
        };
        let request = input.to_request(Some("US")).unwrap();
        assert_eq!(request.location.as_deref(), Some("EU"));
        assert_eq!(request.max_results, Some(25));
        assert_eq!(request.dry_run, Some(true));
        assert_eq!(request.parameter_mode.as_deref(), Some("NAMED"));
        assert_eq!(request.query_parameters.unwrap().len(), 1);
    }

    #[test]
    fn test_to_request_uses_default_location() {
        let request = ExecuteQueryInput::new("SELECT 1")
            .to_request(Some("asia-northeast1"))
            .unwrap();
        assert_eq!(request.location.as_deref(), Some("asia-northeast1"));
    }

    #[test]
    fn test_to_request_rejects_untyped_null_param() {
        let input = ExecuteQueryInput {
            params: json!({"x": null}).as_object().cloned(),
            ..ExecuteQueryInput::new("SELECT @x")
        };
        assert!(matches!(
            input.to_request(None),
            Err(BqError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_input_schema_uses_camel_case() {
        let input: ExecuteQueryInput = serde_json::from_value(json!({
            "query": "SELECT 1",
            "projectId": "p",
            "maxResults": 10,
            "dryRun": false
        }))
        .unwrap();
        assert_eq!(input.project_id.as_deref(), Some("p"));
        assert_eq!(input.max_results, Some(10));
        assert_eq!(input.dry_run, Some(false));
    }

    #[test]
    fn test_validate_rejects_empty_query() {
        assert!(ExecuteQueryInput::new("  ").validate().is_err());
    }

    #[test]
    fn test_shape_result_with_rows() {
        let response: QueryResponse = serde_json::from_value(json!({
            "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
            "jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"},
            "totalRows": "2",
            "rows": [{"f": [{"v": "1"}]}, {"f": [{"v": "2"}]}],
            "totalBytesProcessed": "128",
            "jobComplete": true,
            "cacheHit": true
        }))
        .unwrap();

        let result = shape_result(response);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1]["n"], 2);
        assert_eq!(result.metadata.total_rows, "2");
        assert_eq!(result.metadata.job_id, "job_1");
        assert_eq!(result.metadata.total_bytes_processed.as_deref(), Some("128"));
        assert_eq!(result.metadata.cache_hit, Some(true));
    }

    #[test]
    fn test_shape_result_without_job() {
        let result = shape_result(QueryResponse::default());
        assert!(result.rows.is_empty());
        assert_eq!(result.metadata.total_rows, "0");
        assert_eq!(result.metadata.job_id, "");
    }
}
