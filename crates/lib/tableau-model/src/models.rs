use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::schema::{
    KEY_DATA_DICTIONARY,
    KEY_DATA_MODEL,
    KEY_META,
    KEY_PREVIOUS_CALL_ERROR,
    KEY_PREVIOUS_VDS_PAYLOAD,
    KEY_TASK,
    PRUNED_FIELD_KEYS,
};

/// A single result row keyed by field caption, in upstream column order.
pub type Row = Map<String, Value>;

/// Field entry from the Metadata API data dictionary.
///
/// Every attribute is nullable upstream. Nulls are kept on output so the
/// dictionary mirrors what the Metadata API returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_hidden: bool,
}

/// Owner reference attached to a published datasource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Published datasource envelope returned by the Metadata API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataDictionary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDescriptor>,
}

/// Datasource envelope with its field list removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasourceMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl DataDictionary {
    /// Splits the envelope into its descriptive remainder and the field list.
    #[must_use]
    pub fn into_parts(self) -> (DatasourceMeta, Vec<FieldDescriptor>) {
        let Self {
            name,
            description,
            owner,
            fields,
        } = self;
        (
            DatasourceMeta {
                name,
                description,
                owner,
            },
            fields,
        )
    }
}

/// Row data returned by the VizQL Data Service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VdsResult {
    #[serde(rename = "data")]
    pub rows: Vec<Row>,
}

impl VdsResult {
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Removes the internal VDS identifiers from every row.
    pub fn prune_internal_keys(&mut self) {
        for row in &mut self.rows {
            for key in PRUNED_FIELD_KEYS {
                row.shift_remove(key);
            }
        }
    }
}

/// Prompt accumulator handed to the downstream query agent.
///
/// Wraps the caller's prompt object; keys the pipeline never set stay absent
/// rather than serializing as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AugmentedPrompt(Map<String, Value>);

impl AugmentedPrompt {
    #[must_use]
    pub const fn from_map(prompt: Map<String, Value>) -> Self {
        Self(prompt)
    }

    pub fn set_task(&mut self, task: impl Into<String>) {
        self.0.insert(KEY_TASK.to_string(), Value::String(task.into()));
    }

    /// # Errors
    /// Returns a serialization error if the fields cannot be encoded.
    pub fn set_data_dictionary(&mut self, fields: &[FieldDescriptor]) -> serde_json::Result<()> {
        self.insert_serialized(KEY_DATA_DICTIONARY, fields)
    }

    /// # Errors
    /// Returns a serialization error if the envelope cannot be encoded.
    pub fn set_meta(&mut self, meta: &DatasourceMeta) -> serde_json::Result<()> {
        self.insert_serialized(KEY_META, meta)
    }

    pub fn set_data_model(&mut self, rows: Vec<Row>) {
        let rows = rows.into_iter().map(Value::Object).collect();
        self.0.insert(KEY_DATA_MODEL.to_string(), Value::Array(rows));
    }

    pub fn set_previous_call_error(&mut self, error: impl Into<String>) {
        self.0
            .insert(KEY_PREVIOUS_CALL_ERROR.to_string(), Value::String(error.into()));
    }

    pub fn set_previous_vds_payload(&mut self, payload: impl Into<String>) {
        self.0
            .insert(KEY_PREVIOUS_VDS_PAYLOAD.to_string(), Value::String(payload.into()));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn insert_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> serde_json::Result<()> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }
}
