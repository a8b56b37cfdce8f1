//! MCP service implementation using rmcp.
//!
//! This module defines the BigQueryService struct, which exposes the table
//! listing as a resource template and query execution as a tool. Both
//! handles convert every failure into a protocol-level error value; nothing
//! escapes as a fault of the handling call.

use crate::bigquery::WarehouseClient;
use crate::error::{BqError, BqResult};
use crate::tools::tables::{TABLES_URI_TEMPLATE, resource_variables};
use crate::tools::validation::parse_params;
use crate::tools::{
    ExecuteQueryInput, ListTablesParams, QueryToolHandler, TablesToolHandler, ToolSettings,
};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        AnnotateAble, CallToolResult, Content, Implementation, ListResourceTemplatesResult,
        ListResourcesResult, PaginatedRequestParam, ProtocolVersion, RawResourceTemplate,
        ReadResourceRequestParam, ReadResourceResult, ResourceContents, ResourceTemplate,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Content URI of a rejected resource read.
pub const INVALID_PARAMETERS_URI: &str = "error://invalid-parameters";
/// Content URI of a failed table listing.
pub const QUERY_ERROR_URI: &str = "error://query-error";

#[derive(Clone)]
pub struct BigQueryService {
    /// Shared warehouse client, read-only for every request
    client: Arc<dyn WarehouseClient>,
    settings: ToolSettings,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl BigQueryService {
    /// Create a new BigQueryService instance.
    ///
    /// # Arguments
    ///
    /// * `client` - Warehouse client used by every request
    /// * `settings` - Handler settings (page cap, default location)
    pub fn new(client: Arc<dyn WarehouseClient>, settings: ToolSettings) -> Self {
        Self {
            client,
            settings,
            tool_router: Self::tool_router(),
        }
    }

    /// The resource template advertised for table listings.
    pub fn tables_resource_template() -> ResourceTemplate {
        RawResourceTemplate {
            uri_template: TABLES_URI_TEMPLATE.to_string(),
            name: "bigquery-tables".to_string(),
            title: Some("BigQuery tables".to_string()),
            description: Some(
                "List the tables in a BigQuery dataset. projectId may be given as a query \
                parameter (e.g. warehouse://datasets/{datasetId}/tables?projectId=my-project); \
                the server's default project is used otherwise."
                    .to_string(),
            ),
            mime_type: Some("application/json".to_string()),
        }
        .no_annotation()
    }

    /// Read a tables resource.
    ///
    /// URIs outside the template are answered with `resource_not_found`.
    /// Validation and upstream failures come back as a normal read result
    /// whose payload carries `"isError": true`.
    pub async fn read_tables_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let Some(bag) = resource_variables(uri) else {
            return Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(serde_json::json!({ "uriTemplate": TABLES_URI_TEMPLATE })),
            ));
        };

        let params = match parse_params::<ListTablesParams>(bag) {
            Ok(params) => params,
            Err(e) => {
                warn!(uri = %uri, error = %e, "Rejected tables resource read");
                return Ok(error_contents(INVALID_PARAMETERS_URI, &e));
            }
        };

        let handler = TablesToolHandler::new(self.client.clone(), &self.settings);
        match handler.list_tables(params).await.and_then(|t| to_json(&t)) {
            Ok(text) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(text, uri)],
            }),
            Err(e) => Ok(error_contents(QUERY_ERROR_URI, &e)),
        }
    }
}

#[tool_router]
impl BigQueryService {
    #[tool(
        description = "Run a SQL query on BigQuery and return the rows with job metadata.\nUses GoogleSQL (standard SQL). Named parameters in `params` are referenced as @name.\nSet dryRun to validate the query and estimate bytes processed without running it.\nOnly the first page of rows is returned; use maxResults or LIMIT to bound the result."
    )]
    pub async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let handler = QueryToolHandler::new(self.client.clone(), &self.settings);
        match handler.execute(input).await.and_then(|r| to_json(&r)) {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.message())])),
        }
    }
}

#[tool_handler]
impl ServerHandler for BigQueryService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "bigquery-mcp-server".to_owned(),
                title: Some("BigQuery MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "BigQuery tools for exploring datasets and running SQL.\n\
                \n\
                ## Workflow\n\
                1. Read `warehouse://datasets/{datasetId}/tables` to see the tables of a dataset\n\
                   (add `?projectId=...` for a dataset outside the default project)\n\
                2. Call `execute_query` with GoogleSQL referencing `dataset.table`\n\
                \n\
                ## Tips\n\
                - Use `dryRun: true` to check a query and its bytes processed before running it\n\
                - Bind values through `params` (`@name` in SQL) instead of string concatenation\n\
                - Only the first page of rows is returned; bound results with LIMIT or `maxResults`"
                    .to_string(),
            ),
        }
    }

    /// Only templated resources exist.
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(Vec::new()))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult::with_all_items(vec![
            Self::tables_resource_template(),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_tables_resource(&request.uri).await
    }
}

fn to_json<T: Serialize>(value: &T) -> BqResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| BqError::internal(format!("Failed to serialize result: {}", e)))
}

/// Resource payload for a failed read.
fn error_contents(uri: &str, err: &BqError) -> ReadResourceResult {
    let payload = serde_json::json!({
        "isError": true,
        "error": err.to_string(),
    });
    ReadResourceResult {
        contents: vec![ResourceContents::text(payload.to_string(), uri)],
    }
}
