use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    tool,
    tool_router,
};
use tableau_core::control::{AugmentParams, DatasourceParams, Operation};

use crate::TableauMcp;

#[tool_router(router = tool_router_metadata, vis = "pub")]
impl TableauMcp {
    #[tool(description = "Fetch name, description, owner, and field dictionary of a published datasource from the Metadata API.")]
    async fn get_data_dictionary(
        &self,
        Parameters(params): Parameters<DatasourceParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::GetDataDictionary(params)).await
    }

    #[tool(description = "Read per-field metadata for a datasource from the VizQL Data Service.")]
    async fn query_vds_metadata(
        &self,
        Parameters(params): Parameters<DatasourceParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::QueryVdsMetadata(params)).await
    }

    #[tool(description = "Build the query-agent prompt: task, data dictionary, datasource meta, pruned data model, and any previous error context.")]
    async fn augment_datasource_metadata(
        &self,
        Parameters(params): Parameters<AugmentParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::AugmentDatasourceMetadata(params)).await
    }
}
