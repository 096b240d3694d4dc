//! Daemon entry point for the Tableau MCP server.
//!
//! Resolves Tableau settings from the environment, builds one shared control
//! plane, and serves it over the enabled surfaces: stdio MCP, streamable HTTP
//! MCP, and the `/messages` gateway.

mod config;
mod control;

use tableau_core::config::{ConfigResolver, TableauSettings};
use tableau_gateway::GatewayServer;
use tableau_mcp::server::{serve_stdio, serve_streamable_http};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;
use crate::control::build_control_plane;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();

    let config = DaemonConfig::from_args()?;
    let settings = TableauSettings::resolve(&ConfigResolver::from_env())?;
    info!(domain = %settings.domain, site = %settings.site, "resolved Tableau settings");
    let control = build_control_plane(settings, &config)?;

    let mut surfaces: JoinSet<Result<(), BoxError>> = JoinSet::new();
    if config.gateway_serve {
        surfaces.spawn(GatewayServer::new(control.clone(), config.gateway()).serve());
    }
    if config.mcp_serve {
        surfaces.spawn(serve_streamable_http(control.clone(), config.mcp_http()));
    }
    if config.enable_stdio {
        surfaces.spawn(serve_stdio(control));
    }

    // The first surface to stop ends the daemon; dropping the set aborts the rest.
    if let Some(finished) = surfaces.join_next().await {
        finished??;
    }
    Ok(())
}

/// Logs go to stderr so the stdio transport owns stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
