//! Table-related data models.
//!
//! `TableRecord` / `TableList` mirror the BigQuery `tables.list` response;
//! `TableSummary` is the shape handed back to MCP clients.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

/// One entry of a `tables.list` page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    /// Always "bigquery#table" when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Fully qualified id in the form "project:dataset.table"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_reference: Option<TableReference>,
    /// TABLE, VIEW, EXTERNAL, MATERIALIZED_VIEW, SNAPSHOT
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    /// Epoch milliseconds, as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Epoch milliseconds, as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,
}

impl TableRecord {
    /// Create a record for the given table id.
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_reference: Some(TableReference {
                table_id: table_id.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Short table id.
    ///
    /// Prefers `tableReference.tableId`; falls back to the part of the
    /// qualified `id` after the dataset separator.
    pub fn table_id(&self) -> Option<&str> {
        if let Some(reference) = &self.table_reference {
            if !reference.table_id.is_empty() {
                return Some(&reference.table_id);
            }
        }
        self.id
            .as_deref()
            .map(|id| id.rsplit_once('.').map_or(id, |(_, table)| table))
            .filter(|id| !id.is_empty())
    }
}

/// One page of a `tables.list` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableList {
    #[serde(default)]
    pub tables: Vec<TableRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl TableList {
    /// A single, final page.
    pub fn last_page(tables: Vec<TableRecord>) -> Self {
        Self {
            tables,
            next_page_token: None,
            total_items: None,
        }
    }
}

/// Table summary returned by the tables resource.
///
/// Optional fields are omitted when the source record lacks them or when
/// their timestamp could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    /// ISO-8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// ISO-8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,
}
