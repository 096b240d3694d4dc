use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tableau_core::control::OPERATIONS;

use crate::TableauMcp;

/// Payload listing the MCP commands this server exposes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        let mut commands = vec![
            "help - List MCP commands to get context with how this MCP server works.".to_string(),
            "health - Health check. Returns 'ok'.".to_string(),
        ];
        commands.extend(
            OPERATIONS
                .iter()
                .map(|spec| format!("{} - {}", spec.name, spec.description)),
        );
        Self { commands }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl TableauMcp {
    #[tool(description = "List the MCP commands to get context with how this MCP server works.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
