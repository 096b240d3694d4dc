//! Aggregation of metadata and VDS outputs into agent-facing payloads.

use serde_json::{Value, json};
use tableau_model::AugmentedPrompt;
use tableau_model::schema::SAMPLE_VALUE_LIMIT;
use tracing::debug;

use crate::client::{MetadataClient, VdsClient};
use crate::error::{Service, TableauError, TableauResult, ValidationError};
use crate::format::to_markdown_table;

/// Inputs for [`augment`] that do not come from upstream.
#[derive(Debug, Clone, Default)]
pub struct AugmentInput {
    pub task: String,
    pub prompt: AugmentedPrompt,
    pub previous_errors: Option<String>,
    pub previous_vds_payload: Option<String>,
}

/// Builds the augmented prompt for one datasource.
///
/// The data dictionary and the VDS field metadata are fetched concurrently;
/// either failure aborts the whole call.
///
/// # Errors
/// Propagates the first upstream error unchanged, or a `Decode` error if the
/// dictionary cannot be re-serialized.
pub async fn augment(
    metadata: &MetadataClient,
    vds: &VdsClient,
    token: &str,
    domain: &str,
    luid: &str,
    input: AugmentInput,
) -> TableauResult<AugmentedPrompt> {
    let AugmentInput {
        task,
        mut prompt,
        previous_errors,
        previous_vds_payload,
    } = input;

    prompt.set_task(task);

    let (dictionary, mut data_model) = tokio::try_join!(
        metadata.get_data_dictionary(token, domain, luid),
        vds.query_metadata(token, domain, luid),
    )?;

    let (meta, fields) = dictionary.into_parts();
    prompt
        .set_data_dictionary(&fields)
        .and_then(|()| prompt.set_meta(&meta))
        .map_err(|err| TableauError::Decode {
            service: Service::Metadata,
            message: err.to_string(),
        })?;

    data_model.prune_internal_keys();
    debug!(luid, fields = fields.len(), model_rows = data_model.rows.len(), "augmented prompt");
    prompt.set_data_model(data_model.rows);

    if let Some(errors) = non_blank(previous_errors) {
        prompt.set_previous_call_error(errors);
    }
    if let Some(payload) = non_blank(previous_vds_payload) {
        prompt.set_previous_vds_payload(payload);
    }

    Ok(prompt)
}

/// Returns up to four sample values for one field caption, in row order.
///
/// # Errors
/// Propagates VDS failures; a response without `data` yields an empty list.
pub async fn get_values(
    vds: &VdsClient,
    token: &str,
    domain: &str,
    luid: &str,
    caption: &str,
) -> TableauResult<Vec<Value>> {
    let query = json!({ "fields": [{ "fieldCaption": caption }] });
    let Some(rows) = vds.query_rows(token, domain, luid, &query).await? else {
        return Ok(Vec::new());
    };

    Ok(rows
        .iter()
        .filter_map(|row| row.values().find(|value| is_scalar(value)).cloned())
        .take(SAMPLE_VALUE_LIMIT)
        .collect())
}

/// Runs a VDS query and renders the rows as a markdown table.
///
/// # Errors
/// Returns `ValidationError::Empty` when the response has no `data`,
/// `FormatError::Empty` when it has no rows, and any VDS failure.
pub async fn get_headless_data(
    vds: &VdsClient,
    payload: &Value,
    domain: &str,
    token: &str,
    luid: &str,
) -> TableauResult<String> {
    let result = vds.query(token, domain, luid, payload).await?;
    Ok(to_markdown_table(&result.rows)?)
}

pub(crate) fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankInput(field))
    } else {
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

const fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
