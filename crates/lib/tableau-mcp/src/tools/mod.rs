//! MCP tool modules.
//!
//! Tools are grouped by upstream: datasource metadata and prompt assembly,
//! VizQL Data Service queries, and contextual help.

pub mod data;
pub mod metadata;
mod context;
