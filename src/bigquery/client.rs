//! BigQuery REST client.
//!
//! Talks to the BigQuery v2 REST API with `reqwest`. Access tokens come
//! from a `gcp_auth` token provider built from the credentials file (see
//! `credentials`).

use crate::bigquery::WarehouseClient;
use crate::bigquery::credentials::load_token_provider;
use crate::error::{BqError, BqResult};
use crate::models::{JobReference, QueryRequest, QueryResponse, TableList};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// OAuth scope for BigQuery.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// BigQuery REST client.
pub struct BigQueryClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<dyn TokenProvider>,
    default_project: String,
    query_wait: Duration,
}

impl BigQueryClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `auth` - Token provider for the ambient credentials
    /// * `default_project` - Project used when a request names none
    /// * `base_url` - REST API root, e.g. `https://bigquery.googleapis.com/bigquery/v2`
    pub fn new(
        auth: Arc<dyn TokenProvider>,
        default_project: impl Into<String>,
        base_url: &str,
    ) -> BqResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BqError::configuration(format!("Invalid API base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BqError::configuration(format!(
                "API base URL cannot have path segments: {}",
                base_url
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("bigquery-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BqError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            auth,
            default_project: default_project.into(),
            query_wait: Duration::from_millis(crate::config::DEFAULT_QUERY_WAIT_MS),
        })
    }

    /// Set how long BigQuery may hold each query call open.
    pub fn with_query_wait(mut self, wait: Duration) -> Self {
        self.query_wait = wait;
        self
    }

    /// Build a client from a credentials file.
    ///
    /// The default project is `project_override` when given, otherwise the
    /// project the credentials belong to.
    pub async fn from_credentials(
        credentials: &Path,
        project_override: Option<String>,
        base_url: &str,
    ) -> BqResult<Self> {
        let auth = load_token_provider(credentials)?;
        let project = match project_override {
            Some(project) => project,
            None => auth.project_id().await.map(|p| p.to_string()).map_err(|e| {
                BqError::auth(format!(
                    "Could not determine the default project from the credentials ({}). \
                    Set --project-id or GOOGLE_CLOUD_PROJECT.",
                    e
                ))
            })?,
        };
        info!(project = %project, "Using default project");
        Self::new(auth, project, base_url)
    }

    fn endpoint(&self, segments: &[&str]) -> BqResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BqError::internal("API base URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attach a fresh access token, send, and decode the JSON body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BqResult<T> {
        let token = self.auth.token(&[BIGQUERY_SCOPE]).await?;
        let response = builder.bearer_auth(token.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status.as_u16(), &body));
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_query_results(
        &self,
        job: &JobReference,
        max_results: Option<u32>,
    ) -> BqResult<QueryResponse> {
        let url = self.endpoint(&[
            "projects",
            job.project_id.as_str(),
            "queries",
            job.job_id.as_str(),
        ])?;
        let mut query: Vec<(&str, String)> = vec![
            ("timeoutMs", self.query_wait.as_millis().to_string()),
            ("formatOptions.useInt64Timestamp", "true".to_string()),
        ];
        if let Some(location) = &job.location {
            query.push(("location", location.clone()));
        }
        if let Some(max_results) = max_results {
            query.push(("maxResults", max_results.to_string()));
        }
        self.send(self.http.get(url).query(&query)).await
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    fn default_project(&self) -> &str {
        &self.default_project
    }

    async fn list_tables(
        &self,
        project_id: &str,
        dataset_id: &str,
        page_token: Option<&str>,
    ) -> BqResult<TableList> {
        let url = self.endpoint(&["projects", project_id, "datasets", dataset_id, "tables"])?;
        let mut builder = self.http.get(url);
        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }
        self.send(builder).await
    }

    async fn run_query(&self, project_id: &str, request: &QueryRequest) -> BqResult<QueryResponse> {
        let url = self.endpoint(&["projects", project_id, "queries"])?;
        let body = request
            .clone()
            .with_timeout_ms(self.query_wait.as_millis() as u64)
            .with_int64_timestamps();

        let mut response: QueryResponse = self.send(self.http.post(url).json(&body)).await?;

        while !response.is_complete() {
            let job = response
                .job_reference
                .clone()
                .filter(|job| !job.job_id.is_empty())
                .ok_or_else(|| {
                    BqError::internal("BigQuery reported an incomplete job without a job id")
                })?;
            debug!(job_id = %job.job_id, "Query still running, waiting for results");
            response = self.get_query_results(&job, body.max_results).await?;
        }
        Ok(response)
    }
}

/// Build an upstream error from a failed response.
///
/// BigQuery wraps failures as `{"error": {"code", "message", "errors", "status"}}`;
/// the `message` is kept exactly as sent.
pub fn upstream_error(status: u16, body: &str) -> BqError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("HTTP status {}", status));

    if status >= 500 {
        warn!(status, "BigQuery returned a server error");
    }
    BqError::upstream(message, Some(status))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::test_server::TestServer;
    use gcp_auth::Token;

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn token(&self, _scopes: &[&str]) -> Result<Arc<Token>, gcp_auth::Error> {
            let token: Token =
                serde_json::from_str(r#"{"access_token": "test-token", "expires_in": 3600}"#)
                    .map_err(|e| gcp_auth::Error::Json("bad test token", e))?;
            Ok(Arc::new(token))
        }

        async fn project_id(&self) -> Result<Arc<str>, gcp_auth::Error> {
            Ok(Arc::from("test-project"))
        }
    }

    fn client(base: &str) -> BigQueryClient {
        BigQueryClient::new(Arc::new(StaticToken), "test-project", base).unwrap()
    }

    async fn stub(responses: Vec<(u16, &'static str)>) -> (TestServer, BigQueryClient) {
        let server = TestServer::start(responses).await;
        let client = client(&format!("{}/bigquery/v2", server.base_url))
            .with_query_wait(Duration::from_millis(500));
        (server, client)
    }

    #[test]
    fn test_default_project() {
        assert_eq!(
            client("https://example.com/bigquery/v2").default_project(),
            "test-project"
        );
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let url = client("https://example.com/bigquery/v2")
            .endpoint(&["projects", "p", "datasets", "d", "tables"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/bigquery/v2/projects/p/datasets/d/tables"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let url = client("https://example.com/bigquery/v2/")
            .endpoint(&["projects", "p", "queries"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/bigquery/v2/projects/p/queries"
        );
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let url = client("https://example.com/v2")
            .endpoint(&["projects", "p", "datasets", "a b", "tables"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/v2/projects/p/datasets/a%20b/tables"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = BigQueryClient::new(Arc::new(StaticToken), "p", "not a url");
        assert!(matches!(result, Err(BqError::Configuration { .. })));
    }

    #[test]
    fn test_upstream_error_extracts_message() {
        let body = r#"{"error": {"code": 400, "message": "Syntax error: Expected end of input but got keyword FROM at [1:10]", "status": "INVALID_ARGUMENT"}}"#;
        match upstream_error(400, body) {
            BqError::Upstream { message, status } => {
                assert_eq!(
                    message,
                    "Syntax error: Expected end of input but got keyword FROM at [1:10]"
                );
                assert_eq!(status, Some(400));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_upstream_error_plain_body() {
        let err = upstream_error(502, "Bad Gateway\n");
        assert_eq!(err.message(), "Bad Gateway");
    }

    #[test]
    fn test_upstream_error_empty_body() {
        let err = upstream_error(404, "");
        assert_eq!(err.message(), "HTTP status 404");
    }

    #[tokio::test]
    async fn test_dry_run_response_decodes() {
        let (server, client) = stub(vec![(
            200,
            r#"{"kind":"bigquery#queryResponse","jobReference":{"projectId":"acme","location":"US"},"totalBytesProcessed":"1024","jobComplete":true,"cacheHit":false}"#,
        )])
        .await;

        let request = QueryRequest::new("SELECT 1").with_dry_run(true);
        let response = client.run_query("acme", &request).await.unwrap();

        let job = response.job_reference.unwrap();
        assert_eq!(job.job_id, "");
        assert_eq!(response.total_bytes_processed.as_deref(), Some("1024"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /bigquery/v2/projects/acme/queries HTTP/1.1"));
        assert!(
            requests[0]
                .to_ascii_lowercase()
                .contains("authorization: bearer test-token")
        );
        assert!(requests[0].contains(r#""dryRun":true"#));
        assert!(requests[0].contains(r#""useLegacySql":false"#));
        assert!(requests[0].contains(r#""timeoutMs":500"#));
    }

    #[tokio::test]
    async fn test_incomplete_job_is_polled_until_complete() {
        let (server, client) = stub(vec![
            (
                200,
                r#"{"jobReference":{"projectId":"acme","jobId":"job_1","location":"EU"},"jobComplete":false}"#,
            ),
            (
                200,
                r#"{"jobReference":{"projectId":"acme","jobId":"job_1","location":"EU"},"jobComplete":false}"#,
            ),
            (
                200,
                r#"{"schema":{"fields":[{"name":"n","type":"INTEGER"}]},"jobReference":{"projectId":"acme","jobId":"job_1","location":"EU"},"totalRows":"1","rows":[{"f":[{"v":"7"}]}],"jobComplete":true}"#,
            ),
        ])
        .await;

        let request = QueryRequest::new("SELECT 7 AS n").with_max_results(5);
        let response = client.run_query("acme", &request).await.unwrap();

        assert!(response.is_complete());
        assert_eq!(response.rows.len(), 1);

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        for poll in &requests[1..] {
            let request_line = poll.lines().next().unwrap();
            assert!(request_line.starts_with("GET /bigquery/v2/projects/acme/queries/job_1?"));
            assert!(request_line.contains("location=EU"));
            assert!(request_line.contains("maxResults=5"));
            assert!(request_line.contains("timeoutMs=500"));
        }
    }

    #[tokio::test]
    async fn test_error_body_maps_to_upstream_error() {
        let (_server, client) = stub(vec![(
            400,
            r#"{"error":{"code":400,"message":"Unrecognized name: nme at [1:8]","status":"INVALID_ARGUMENT"}}"#,
        )])
        .await;

        let err = client
            .run_query("acme", &QueryRequest::new("SELECT nme FROM t"))
            .await
            .unwrap_err();

        match err {
            BqError::Upstream { message, status } => {
                assert_eq!(message, "Unrecognized name: nme at [1:8]");
                assert_eq!(status, Some(400));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_tables_forwards_page_token() {
        let (server, client) = stub(vec![(
            200,
            r#"{"kind":"bigquery#tableList","tables":[{"id":"acme:sales.orders","tableReference":{"projectId":"acme","datasetId":"sales","tableId":"orders"},"type":"TABLE","creationTime":"1700000000000"}],"totalItems":1}"#,
        )])
        .await;

        let page = client
            .list_tables("acme", "sales", Some("tok 1"))
            .await
            .unwrap();

        assert_eq!(page.tables.len(), 1);
        assert_eq!(page.tables[0].table_id(), Some("orders"));
        assert!(page.next_page_token.is_none());

        let request_line = server.requests()[0].lines().next().unwrap().to_string();
        assert!(request_line.starts_with(
            "GET /bigquery/v2/projects/acme/datasets/sales/tables?pageToken=tok+1 "
        ));
    }
}
