//! Data models for the BigQuery MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod table;

// Re-export commonly used types
pub use query::{
    FormatOptions, JobReference, QueryMetadata, QueryParameter, QueryParameterType,
    QueryParameterValue, QueryRequest, QueryResponse, QueryResult, StructFieldType, TableCell,
    TableFieldSchema, TableRow, TableSchema,
};
pub use table::{TableList, TableRecord, TableReference, TableSummary};
