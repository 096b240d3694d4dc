//! MCP server implementation for tableau-mcp.
//!
//! This crate wires the Tableau control plane into rmcp tool handlers and
//! exposes one tool per callable operation.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use rmcp::{
    ErrorData,
    RoleServer,
    ServerHandler,
    handler::server::tool::ToolRouter,
    service::RequestContext,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{
    AnnotateAble,
    CallToolResult,
    Content,
    ListResourcesResult,
    PaginatedRequestParams,
    RawResource,
    ReadResourceRequestParams,
    ReadResourceResult,
    Resource,
    ResourceContents,
    ServerCapabilities,
    ServerInfo,
};
use serde_json::json;
use tableau_core::TableauControlPlane;
use tableau_core::control::Operation;

/// URI of the resource describing the active Tableau connection.
pub const CONFIG_RESOURCE_URI: &str = "tableau://config";

const SERVER_INSTRUCTIONS: &str = r#"tableau-mcp answers questions about published Tableau datasources.

Workflow:
1. Every tool takes a `datasource_luid`: the LUID of a published datasource on the configured site.
2. Explore the datasource:
   - `get_data_dictionary` returns the name, description, owner, and field list.
   - `query_vds_metadata` returns per-field metadata from the VizQL Data Service.
   - `get_values` returns up to four sample values for one field caption.
3. Before writing a query, call `augment_datasource_metadata` with your `task`.
   It returns the prompt context: data dictionary, datasource meta, and the data model.
   When a previous query failed, pass `previous_errors` and `previous_vds_payload` so the
   next attempt can correct it.
4. Run the query:
   - `query_vds` returns rows as JSON.
   - `get_headlessbi_data` returns the same rows as a markdown table.

Notes:
- A VDS query is `{"fields": [{"fieldCaption": ...}], "filters": [...]}` and is sent unmodified.
- Sign-in is handled by the server; no credentials are passed to tools.
- Errors carry `kind`, `status`, and the upstream `body` in their data.
- `health` returns `ok`. `help` lists the tools.
- The `tableau://config` resource shows the connection settings in use (no secrets)."#;

/// MCP server wrapper around the control plane and tool routers.
#[derive(Clone)]
pub struct TableauMcp {
    tool_router: ToolRouter<Self>,
    control: Arc<TableauControlPlane>,
}

impl TableauMcp {
    /// Creates a new server owning the control plane.
    #[must_use]
    pub fn new(control: TableauControlPlane) -> Self {
        Self::with_control(Arc::new(control))
    }

    /// Creates a new server over a shared control plane, so every session
    /// reuses the same credential slot.
    #[must_use]
    pub fn with_control(control: Arc<TableauControlPlane>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_metadata()
            + Self::tool_router_data()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    /// Runs one operation through the control plane's operation table.
    pub(crate) async fn execute(&self, operation: Operation) -> Result<CallToolResult, ErrorData> {
        let output = self
            .control
            .execute(operation)
            .await
            .map_err(helpers::map_err)?;
        helpers::output_content(output).map(CallToolResult::success)
    }

    fn config_resource() -> Resource {
        RawResource {
            description: Some("Current Tableau connection settings without secrets.".to_string()),
            mime_type: Some("application/json".to_string()),
            ..RawResource::new(CONFIG_RESOURCE_URI, "Tableau Configuration")
        }
        .no_annotation()
    }

    fn read_config(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        if uri != CONFIG_RESOURCE_URI {
            return Err(ErrorData::resource_not_found(
                format!("Unknown resource: {uri}"),
                Some(json!({ "uri": uri })),
            ));
        }
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(self.config_json()?, CONFIG_RESOURCE_URI)],
        })
    }

    fn config_json(&self) -> Result<String, ErrorData> {
        serde_json::to_string_pretty(&self.control.settings().redacted())
            .map_err(|err| ErrorData::internal_error(err.to_string(), None))
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl TableauMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for TableauMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(vec![Self::config_resource()]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        self.read_config(&request.uri)
    }
}
