//! VizQL Data Service client.

use serde::Serialize;
use serde_json::Value;
use tableau_model::schema::{VDS_QUERY_PATH, VDS_READ_METADATA_PATH, endpoint};
use tableau_model::{Row, VdsResult};
use tracing::debug;

use super::{HttpSettings, Transport, take_data};
use crate::error::{Service, TableauError, TableauResult, ValidationError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasourceRef<'a> {
    datasource_luid: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    datasource: DatasourceRef<'a>,
    query: &'a Value,
}

#[derive(Debug, Serialize)]
struct ReadMetadataRequest<'a> {
    datasource: DatasourceRef<'a>,
}

#[derive(Clone)]
pub struct VdsClient {
    transport: Transport,
}

impl VdsClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, settings: HttpSettings) -> Self {
        Self {
            transport: Transport::new(Service::Vds, http, settings.retry),
        }
    }

    /// Runs a caller-built VDS query; the query object is sent unmodified.
    ///
    /// # Errors
    /// Returns `VdsApi` for non-2xx responses and `ValidationError::Empty`
    /// when the response has no `data`.
    pub async fn query(
        &self,
        token: &str,
        domain: &str,
        luid: &str,
        query: &Value,
    ) -> TableauResult<VdsResult> {
        let rows = self.query_rows(token, domain, luid, query).await?;
        rows.map(VdsResult::new)
            .ok_or_else(|| ValidationError::Empty("VizQL Data Service query").into())
    }

    /// Like [`Self::query`], but reports a missing `data` key as `None`.
    ///
    /// # Errors
    /// Returns `VdsApi` for non-2xx responses and `Transport`/`Decode` for
    /// network or payload failures.
    pub async fn query_rows(
        &self,
        token: &str,
        domain: &str,
        luid: &str,
        query: &Value,
    ) -> TableauResult<Option<Vec<Row>>> {
        let url = endpoint(domain, VDS_QUERY_PATH);
        let request = QueryRequest {
            datasource: DatasourceRef {
                datasource_luid: luid,
            },
            query,
        };
        debug!(luid, "querying VizQL Data Service");
        let (_, body) = self.transport.post_read(&url, token, &request).await?;
        decode_rows(body)
    }

    /// Reads per-field metadata for a datasource.
    ///
    /// Rows still carry the internal `fieldName` and `logicalTableId` keys.
    ///
    /// # Errors
    /// Returns `VdsApi` for non-2xx responses and `ValidationError::Empty`
    /// when the response has no `data`.
    pub async fn query_metadata(
        &self,
        token: &str,
        domain: &str,
        luid: &str,
    ) -> TableauResult<VdsResult> {
        let url = endpoint(domain, VDS_READ_METADATA_PATH);
        let request = ReadMetadataRequest {
            datasource: DatasourceRef {
                datasource_luid: luid,
            },
        };
        debug!(luid, "reading VizQL Data Service metadata");
        let (_, body) = self.transport.post_read(&url, token, &request).await?;
        decode_rows(body)?
            .map(VdsResult::new)
            .ok_or_else(|| ValidationError::Empty("VizQL Data Service metadata").into())
    }
}

fn decode_rows(body: Value) -> TableauResult<Option<Vec<Row>>> {
    take_data(body)
        .map(|data| {
            serde_json::from_value::<Vec<Row>>(data).map_err(|err| TableauError::Decode {
                service: Service::Vds,
                message: format!("`data` is not an array of rows: {err}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_body_wraps_the_caller_payload() {
        let query = json!({"fields": [{"fieldCaption": "Region"}], "filters": []});
        let request = QueryRequest {
            datasource: DatasourceRef {
                datasource_luid: "ds-1",
            },
            query: &query,
        };

        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({
                "datasource": {"datasourceLuid": "ds-1"},
                "query": {"fields": [{"fieldCaption": "Region"}], "filters": []}
            })
        );
    }

    #[test]
    fn missing_or_null_data_decodes_as_none() {
        assert!(decode_rows(json!({})).expect("decode").is_none());
        assert!(decode_rows(json!({"data": null})).expect("decode").is_none());
    }

    #[test]
    fn non_row_data_is_a_decode_error() {
        let err = decode_rows(json!({"data": [1, 2]})).expect_err("should fail");
        assert_eq!(err.kind(), "DecodeError");
    }
}
