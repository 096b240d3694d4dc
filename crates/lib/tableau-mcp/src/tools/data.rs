use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    tool,
    tool_router,
};
use tableau_core::control::{GetValuesParams, HeadlessDataParams, Operation, QueryVdsParams};

use crate::TableauMcp;

#[tool_router(router = tool_router_data, vis = "pub")]
impl TableauMcp {
    #[tool(description = "Run a VizQL Data Service query (fields and filters) against a datasource and return the rows.")]
    async fn query_vds(
        &self,
        Parameters(params): Parameters<QueryVdsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::QueryVds(params)).await
    }

    #[tool(description = "Run a VizQL Data Service query and return the rows as a markdown table.")]
    async fn get_headlessbi_data(
        &self,
        Parameters(params): Parameters<HeadlessDataParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::GetHeadlessbiData(params)).await
    }

    #[tool(description = "Return up to four sample values for one field caption.")]
    async fn get_values(
        &self,
        Parameters(params): Parameters<GetValuesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.execute(Operation::GetValues(params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;
    use serde_json::json;

    use crate::tests::offline_server;

    #[tokio::test]
    async fn blank_caption_is_rejected_through_the_operation_table() {
        let params = GetValuesParams {
            datasource_luid: "abc".to_string(),
            caption: "  ".to_string(),
        };

        let err = offline_server()
            .get_values(Parameters(params))
            .await
            .expect_err("blank caption");

        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("data")["kind"], json!("ValidationError.BlankInput"));
    }
}
