//! Data model and wire constants for tableau-mcp.
//!
//! This crate defines the payloads shared by the upstream clients, the
//! aggregation pipeline, and the tool surfaces.

pub mod models;
pub mod schema;

pub use models::*;
