//! Closed set of callable operations.
//!
//! Each operation has a typed parameter struct and an entry in [`OPERATIONS`];
//! callers that only have a name and a JSON parameter object go through
//! [`Operation::from_call`].

use std::{error::Error, fmt};

use serde::de::DeserializeOwned;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tableau_model::{AugmentedPrompt, DataDictionary, VdsResult};

use super::TableauControlPlane;
use crate::error::TableauResult;
use crate::pipeline::AugmentInput;

/// Parameters for operations that only need a datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DatasourceParams {
    /// LUID of the published datasource.
    pub datasource_luid: String,
}

/// Parameters for running a VDS query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryVdsParams {
    pub datasource_luid: String,
    /// VDS query object with `fields` and optional `filters`; sent unmodified.
    pub query: Value,
}

/// Parameters for running a VDS query rendered as markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HeadlessDataParams {
    /// VDS query object with `fields` and optional `filters`.
    pub payload: Value,
    pub datasource_luid: String,
}

/// Parameters for sampling values of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetValuesParams {
    pub datasource_luid: String,
    /// Field caption as shown in the data dictionary.
    pub caption: String,
}

/// Parameters for assembling the query-agent prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AugmentParams {
    /// The user's analytical question.
    pub task: String,
    pub datasource_luid: String,
    /// Existing prompt keys to carry into the result.
    #[serde(default)]
    pub prompt: Option<Map<String, Value>>,
    /// Error text from the previous failed query, if any.
    #[serde(default)]
    pub previous_errors: Option<String>,
    /// The VDS payload that produced `previous_errors`.
    #[serde(default)]
    pub previous_vds_payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetDataDictionary(DatasourceParams),
    QueryVdsMetadata(DatasourceParams),
    QueryVds(QueryVdsParams),
    GetHeadlessbiData(HeadlessDataParams),
    GetValues(GetValuesParams),
    AugmentDatasourceMetadata(AugmentParams),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    DataDictionary(DataDictionary),
    Rows(VdsResult),
    Markdown(String),
    Values(Vec<Value>),
    Prompt(AugmentedPrompt),
}

impl OperationOutput {
    /// Converts the output into the JSON value returned to callers.
    ///
    /// # Errors
    /// Returns a serialization error if the output cannot be encoded.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

type ParseFn = fn(Value) -> serde_json::Result<Operation>;

/// Lookup table entry for one callable operation.
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    parse: ParseFn,
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

fn parse_as<P: DeserializeOwned>(
    params: Value,
    wrap: fn(P) -> Operation,
) -> serde_json::Result<Operation> {
    serde_json::from_value(params).map(wrap)
}

pub static OPERATIONS: [OperationSpec; 6] = [
    OperationSpec {
        name: "get_data_dictionary",
        description: "Fetch name, description, owner, and field dictionary of a published datasource from the Metadata API.",
        required: &["datasource_luid"],
        parse: |params| parse_as(params, Operation::GetDataDictionary),
    },
    OperationSpec {
        name: "query_vds_metadata",
        description: "Read per-field metadata and sample information for a datasource from the VizQL Data Service.",
        required: &["datasource_luid"],
        parse: |params| parse_as(params, Operation::QueryVdsMetadata),
    },
    OperationSpec {
        name: "query_vds",
        description: "Run a VizQL Data Service query (fields and filters) against a datasource and return the rows.",
        required: &["datasource_luid", "query"],
        parse: |params| parse_as(params, Operation::QueryVds),
    },
    OperationSpec {
        name: "get_headlessbi_data",
        description: "Run a VizQL Data Service query and return the rows as a markdown table.",
        required: &["payload", "datasource_luid"],
        parse: |params| parse_as(params, Operation::GetHeadlessbiData),
    },
    OperationSpec {
        name: "get_values",
        description: "Return up to four sample values for one field caption.",
        required: &["datasource_luid", "caption"],
        parse: |params| parse_as(params, Operation::GetValues),
    },
    OperationSpec {
        name: "augment_datasource_metadata",
        description: "Build the query-agent prompt: task, data dictionary, datasource meta, pruned data model, and any previous error context.",
        required: &["task", "datasource_luid"],
        parse: |params| parse_as(params, Operation::AugmentDatasourceMetadata),
    },
];

#[must_use]
pub fn lookup(name: &str) -> Option<&'static OperationSpec> {
    OPERATIONS.iter().find(|spec| spec.name == name)
}

#[derive(Debug)]
pub enum DispatchError {
    UnknownOperation(String),
    InvalidParams {
        operation: &'static str,
        message: String,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperation(name) => write!(f, "Tool '{name}' not found"),
            Self::InvalidParams { operation, message } => {
                write!(f, "invalid parameters for {operation}: {message}")
            }
        }
    }
}

impl Error for DispatchError {}

impl Operation {
    /// Resolves a named call with a JSON parameter object.
    ///
    /// A missing or `null` parameter object is treated as `{}`.
    ///
    /// # Errors
    /// Returns `DispatchError::UnknownOperation` for names outside the table and
    /// `DispatchError::InvalidParams` when the parameters do not match.
    pub fn from_call(name: &str, params: Option<Value>) -> Result<Self, DispatchError> {
        let spec = lookup(name).ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))?;
        let params = match params {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params) => params,
        };
        (spec.parse)(params).map_err(|err| DispatchError::InvalidParams {
            operation: spec.name,
            message: err.to_string(),
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetDataDictionary(_) => "get_data_dictionary",
            Self::QueryVdsMetadata(_) => "query_vds_metadata",
            Self::QueryVds(_) => "query_vds",
            Self::GetHeadlessbiData(_) => "get_headlessbi_data",
            Self::GetValues(_) => "get_values",
            Self::AugmentDatasourceMetadata(_) => "augment_datasource_metadata",
        }
    }
}

impl TableauControlPlane {
    /// Runs one operation.
    ///
    /// # Errors
    /// Returns the operation's own failure unchanged.
    pub async fn execute(&self, operation: Operation) -> TableauResult<OperationOutput> {
        match operation {
            Operation::GetDataDictionary(params) => self
                .get_data_dictionary(&params.datasource_luid)
                .await
                .map(OperationOutput::DataDictionary),
            Operation::QueryVdsMetadata(params) => self
                .query_vds_metadata(&params.datasource_luid)
                .await
                .map(OperationOutput::Rows),
            Operation::QueryVds(params) => self
                .query_vds(&params.datasource_luid, &params.query)
                .await
                .map(OperationOutput::Rows),
            Operation::GetHeadlessbiData(params) => self
                .get_headlessbi_data(&params.payload, &params.datasource_luid)
                .await
                .map(OperationOutput::Markdown),
            Operation::GetValues(params) => self
                .get_values(&params.datasource_luid, &params.caption)
                .await
                .map(OperationOutput::Values),
            Operation::AugmentDatasourceMetadata(params) => {
                let AugmentParams {
                    task,
                    datasource_luid,
                    prompt,
                    previous_errors,
                    previous_vds_payload,
                } = params;
                let input = AugmentInput {
                    task,
                    prompt: AugmentedPrompt::from_map(prompt.unwrap_or_default()),
                    previous_errors,
                    previous_vds_payload,
                };
                self.augment_datasource_metadata(&datasource_luid, input)
                    .await
                    .map(OperationOutput::Prompt)
            }
        }
    }
}
