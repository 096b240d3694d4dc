//! Core services for tableau-mcp.
//!
//! This crate owns configuration lookup, the shared bearer-token cache, the
//! Metadata API and VizQL Data Service clients, and the pipeline that merges
//! their outputs into payloads for a downstream query agent.

pub mod auth;
pub mod client;
pub mod config;
pub mod control;
pub mod credentials;
pub mod error;
pub mod format;
pub mod pipeline;

pub use control::TableauControlPlane;
pub use error::{TableauError, TableauResult};
