//! Shared in-memory warehouse for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bigquery_mcp_server::bigquery::WarehouseClient;
use bigquery_mcp_server::error::{BqError, BqResult};
use bigquery_mcp_server::models::{QueryRequest, QueryResponse, TableList, TableRecord};
use std::sync::Mutex;

/// A recorded `tables.list` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListCall {
    pub project: String,
    pub dataset: String,
    pub page_token: Option<String>,
}

/// Warehouse double that serves canned pages and records every call.
///
/// Page `n` is served for page token `"page-n"`; the first page for no token.
pub struct MockWarehouse {
    default_project: String,
    pages: Mutex<Vec<TableList>>,
    response: Mutex<QueryResponse>,
    failure: Mutex<Option<(String, Option<u16>)>>,
    fail_on_page: Mutex<Option<usize>>,
    list_calls: Mutex<Vec<ListCall>>,
    queries: Mutex<Vec<(String, QueryRequest)>>,
}

impl MockWarehouse {
    pub fn new(default_project: &str) -> Self {
        Self {
            default_project: default_project.to_string(),
            pages: Mutex::new(Vec::new()),
            response: Mutex::new(QueryResponse::default()),
            failure: Mutex::new(None),
            fail_on_page: Mutex::new(None),
            list_calls: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Serve the given records as consecutive pages.
    pub fn set_pages(&self, pages: Vec<Vec<TableRecord>>) {
        let count = pages.len();
        let lists = pages
            .into_iter()
            .enumerate()
            .map(|(i, tables)| TableList {
                tables,
                next_page_token: (i + 1 < count).then(|| format!("page-{}", i + 1)),
                total_items: None,
            })
            .collect();
        *self.pages.lock().unwrap() = lists;
    }

    pub fn set_response(&self, response: QueryResponse) {
        *self.response.lock().unwrap() = response;
    }

    /// Make every call fail with an upstream error.
    pub fn fail_with(&self, message: &str, status: Option<u16>) {
        *self.failure.lock().unwrap() = Some((message.to_string(), status));
    }

    /// Make only the listing of page `n` fail.
    pub fn fail_on_page(&self, page: usize) {
        *self.fail_on_page.lock().unwrap() = Some(page);
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, QueryRequest)> {
        self.queries.lock().unwrap().clone()
    }

    fn failure(&self) -> Option<BqError> {
        self.failure
            .lock()
            .unwrap()
            .clone()
            .map(|(message, status)| BqError::upstream(message, status))
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouse {
    fn default_project(&self) -> &str {
        &self.default_project
    }

    async fn list_tables(
        &self,
        project_id: &str,
        dataset_id: &str,
        page_token: Option<&str>,
    ) -> BqResult<TableList> {
        self.list_calls.lock().unwrap().push(ListCall {
            project: project_id.to_string(),
            dataset: dataset_id.to_string(),
            page_token: page_token.map(String::from),
        });
        if let Some(err) = self.failure() {
            return Err(err);
        }

        let index = page_token
            .and_then(|t| t.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        if *self.fail_on_page.lock().unwrap() == Some(index) {
            return Err(BqError::upstream("Backend error", Some(503)));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    async fn run_query(&self, project_id: &str, request: &QueryRequest) -> BqResult<QueryResponse> {
        self.queries
            .lock()
            .unwrap()
            .push((project_id.to_string(), request.clone()));
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self.response.lock().unwrap().clone())
    }
}
