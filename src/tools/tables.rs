//! Table listing.
//!
//! This module backs the `warehouse://datasets/{datasetId}/tables` resource:
//! URI parsing, parameter validation and the shaping of `tables.list`
//! records into summaries.

use crate::bigquery::WarehouseClient;
use crate::error::{BqError, BqResult};
use crate::models::{TableRecord, TableSummary};
use crate::tools::ToolSettings;
use crate::tools::validation::{ParamBag, Validate, optional_non_empty, require_non_empty};
use chrono::{DateTime, SecondsFormat};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

pub const TABLES_URI_SCHEME: &str = "warehouse";
pub const TABLES_URI_TEMPLATE: &str = "warehouse://datasets/{datasetId}/tables{?projectId}";

/// Validated parameters of a table listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesParams {
    pub dataset_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Validate for ListTablesParams {
    fn validate(&self) -> BqResult<()> {
        require_non_empty("datasetId", &self.dataset_id)?;
        optional_non_empty("projectId", self.project_id.as_deref())
    }
}

/// Extract the template variables from a tables resource URI.
///
/// Returns `None` when the URI does not address the tables resource at all.
/// A URI with an empty dataset segment still matches; the bag then lacks
/// `datasetId` and validation rejects it.
pub fn resource_variables(uri: &str) -> Option<ParamBag> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != TABLES_URI_SCHEME || url.host_str() != Some("datasets") {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    let dataset = match segments.as_slice() {
        [dataset, "tables"] => Some(*dataset),
        ["tables"] => None,
        _ => return None,
    };

    let mut bag = ParamBag::new();
    if let Some(dataset) = dataset.filter(|d| !d.is_empty()) {
        // path segments stay percent-encoded; the client encodes them again
        let dataset = percent_decode_str(dataset).decode_utf8_lossy();
        bag.insert("datasetId".to_string(), JsonValue::String(dataset.into_owned()));
    }
    if let Some((_, project)) = url.query_pairs().find(|(key, _)| key == "projectId") {
        bag.insert("projectId".to_string(), JsonValue::String(project.into_owned()));
    }
    Some(bag)
}

/// Convert an epoch-milliseconds string to ISO-8601 (`2023-11-14T22:13:20.000Z`).
pub fn epoch_millis_to_iso(field: &str, raw: &str) -> BqResult<String> {
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| BqError::conversion(field, raw, "not an integer"))?;
    let datetime = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BqError::conversion(field, raw, "out of range"))?;
    Ok(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Lenient timestamp rule: a timestamp that cannot be converted is logged and
/// left out of the summary. It never fails the listing.
fn lenient_timestamp(table: &str, field: &str, raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    match epoch_millis_to_iso(field, raw) {
        Ok(iso) => Some(iso),
        Err(e) => {
            warn!(table = %table, error = %e, "Omitting unconvertible timestamp");
            None
        }
    }
}

/// Build the summary of one table record.
///
/// Records without a table id are skipped.
pub fn summarize(record: &TableRecord) -> Option<TableSummary> {
    let Some(id) = record.table_id() else {
        warn!(record = ?record.id, "Skipping table record without an id");
        return None;
    };

    Some(TableSummary {
        id: id.to_string(),
        kind: record.kind.clone().filter(|k| !k.is_empty()),
        table_type: record.table_type.clone().filter(|t| !t.is_empty()),
        creation_time: lenient_timestamp(id, "creationTime", record.creation_time.as_deref()),
        last_modified_time: lenient_timestamp(
            id,
            "lastModifiedTime",
            record.last_modified_time.as_deref(),
        ),
    })
}

/// Handler for table listings.
pub struct TablesToolHandler {
    client: Arc<dyn WarehouseClient>,
    max_pages: u32,
}

impl TablesToolHandler {
    /// Create a new handler.
    pub fn new(client: Arc<dyn WarehouseClient>, settings: &ToolSettings) -> Self {
        Self {
            client,
            max_pages: settings.max_table_pages.max(1),
        }
    }

    /// List the tables of a dataset.
    ///
    /// Follows page tokens up to the configured page cap. A failure on any
    /// page fails the whole call.
    pub async fn list_tables(&self, params: ListTablesParams) -> BqResult<Vec<TableSummary>> {
        params.validate()?;
        let project = params
            .project_id
            .as_deref()
            .unwrap_or_else(|| self.client.default_project())
            .to_string();

        info!(project = %project, dataset = %params.dataset_id, "Listing tables");

        let mut summaries = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self
                .client
                .list_tables(&project, &params.dataset_id, page_token.as_deref())
                .await
                .map_err(|e| {
                    error!(
                        project = %project,
                        dataset = %params.dataset_id,
                        error = %e,
                        "Table listing failed"
                    );
                    e
                })?;
            pages += 1;
            summaries.extend(page.tables.iter().filter_map(summarize));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(_) if pages >= self.max_pages => {
                    warn!(
                        dataset = %params.dataset_id,
                        pages,
                        returned = summaries.len(),
                        "Table listing truncated at page limit"
                    );
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(count = summaries.len(), pages, "Listed tables");
        Ok(summaries)
    }
}
