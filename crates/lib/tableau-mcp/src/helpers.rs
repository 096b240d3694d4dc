use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::{Content, ErrorCode};
use serde_json::json;
use tableau_core::TableauError;
use tableau_core::control::OperationOutput;
use tableau_core::error::ValidationError;
use tracing::warn;

pub(crate) fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Maps a control-plane failure onto an MCP error, keeping the upstream
/// status and body in `data`.
pub(crate) fn map_err(err: TableauError) -> ErrorData {
    let code = match &err {
        TableauError::Validation(ValidationError::BlankInput(_)) => ErrorCode::INVALID_PARAMS,
        TableauError::Validation(ValidationError::NotFound(_)) => ErrorCode::RESOURCE_NOT_FOUND,
        _ => ErrorCode::INTERNAL_ERROR,
    };
    warn!(kind = err.kind(), status = err.status(), "tool call failed");
    let data = json!({
        "kind": err.kind(),
        "status": err.status(),
        "body": err.body(),
    });
    ErrorData {
        data: Some(data),
        ..mcp_err(code, err.to_string())
    }
}

/// Markdown tables go out as plain text; every other output as JSON.
pub(crate) fn output_content(output: OperationOutput) -> Result<Vec<Content>, ErrorData> {
    match output {
        OperationOutput::Markdown(table) => Ok(vec![Content::text(table)]),
        other => Ok(vec![Content::json(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tableau_core::error::FormatError;

    fn only_text(contents: &[Content]) -> &str {
        assert_eq!(contents.len(), 1);
        &contents[0].as_text().expect("text content").text
    }

    #[test]
    fn markdown_output_is_plain_text() {
        let table = "| Region |\n| --- |\n| West |\n".to_string();
        let contents = output_content(OperationOutput::Markdown(table.clone())).expect("content");

        assert_eq!(only_text(&contents), table);
    }

    #[test]
    fn structured_output_is_json_text() {
        let values = vec![json!("West"), json!("East")];
        let contents = output_content(OperationOutput::Values(values)).expect("content");

        let decoded: Value = serde_json::from_str(only_text(&contents)).expect("json");
        assert_eq!(decoded, json!(["West", "East"]));
    }

    #[test]
    fn upstream_failures_keep_status_and_body() {
        let err = map_err(TableauError::VdsApi {
            status: 400,
            body: "Unknown field caption".to_string(),
        });

        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert!(err.message.contains("Status code: 400"));
        let data = err.data.expect("data");
        assert_eq!(data["kind"], json!("VdsApiError"));
        assert_eq!(data["status"], json!(400));
        assert_eq!(data["body"], json!("Unknown field caption"));
    }

    #[test]
    fn caller_mistakes_map_to_client_codes() {
        let blank = map_err(ValidationError::BlankInput("caption").into());
        assert_eq!(blank.code, ErrorCode::INVALID_PARAMS);

        let missing = map_err(ValidationError::NotFound("abc".to_string()).into());
        assert_eq!(missing.code, ErrorCode::RESOURCE_NOT_FOUND);

        let empty = map_err(FormatError::Empty.into());
        assert_eq!(empty.data.expect("data")["status"], serde_json::Value::Null);
    }
}
