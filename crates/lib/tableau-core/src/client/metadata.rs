//! GraphQL Metadata API client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tableau_model::DataDictionary;
use tableau_model::schema::{METADATA_GRAPHQL_PATH, endpoint};
use tracing::debug;

use super::{HttpSettings, Transport};
use crate::error::{Service, TableauError, TableauResult, ValidationError};

/// Data dictionary query; the datasource LUID is bound as `$luid`.
pub const DATA_DICTIONARY_QUERY: &str = r"query DatasourceDictionary($luid: String!) {
  publishedDatasources(filter: { luid: $luid }) {
    name
    description
    owner {
      name
    }
    fields {
      name
      description
      isHidden
    }
  }
}";

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: DictionaryVariables<'a>,
}

#[derive(Debug, Serialize)]
struct DictionaryVariables<'a> {
    luid: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<DictionaryData>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DictionaryData {
    #[serde(default)]
    published_datasources: Option<Vec<DataDictionary>>,
}

#[derive(Clone)]
pub struct MetadataClient {
    transport: Transport,
    settings: HttpSettings,
}

impl MetadataClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, settings: HttpSettings) -> Self {
        Self {
            transport: Transport::new(Service::Metadata, http, settings.retry),
            settings,
        }
    }

    /// Builds a client with its own HTTP connection pool.
    ///
    /// # Errors
    /// Returns `TableauError::Runtime` if the HTTP client cannot be built.
    pub fn from_settings(settings: HttpSettings) -> TableauResult<Self> {
        Ok(Self::new(settings.build_client()?, settings))
    }

    /// Fetches the data dictionary for one published datasource.
    ///
    /// # Errors
    /// Returns `MetadataApi` for non-2xx responses or GraphQL errors,
    /// `ValidationError::NotFound` when no datasource matches `luid`, and
    /// `Transport`/`Decode` for network or payload failures.
    pub async fn get_data_dictionary(
        &self,
        token: &str,
        domain: &str,
        luid: &str,
    ) -> TableauResult<DataDictionary> {
        let url = endpoint(domain, METADATA_GRAPHQL_PATH);
        let request = GraphqlRequest {
            query: DATA_DICTIONARY_QUERY,
            variables: DictionaryVariables { luid },
        };
        debug!(luid, "querying metadata API");
        let (status, body) = self.transport.post_read(&url, token, &request).await?;
        parse_dictionary(status, body, luid)
    }

    /// Blocking variant of [`Self::get_data_dictionary`].
    ///
    /// Runs on a private single-threaded runtime with a dedicated connection
    /// pool, so it must not be called from async code.
    ///
    /// # Errors
    /// Returns `TableauError::Runtime` when called inside a tokio runtime, plus
    /// every error of the async variant.
    pub fn get_data_dictionary_blocking(
        &self,
        token: &str,
        domain: &str,
        luid: &str,
    ) -> TableauResult<DataDictionary> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(TableauError::Runtime(
                "blocking metadata fetch called from within an async runtime".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| TableauError::Runtime(format!("failed to start runtime: {err}")))?;
        let detached = Self::from_settings(self.settings)?;
        runtime.block_on(detached.get_data_dictionary(token, domain, luid))
    }
}

fn parse_dictionary(status: u16, body: Value, luid: &str) -> TableauResult<DataDictionary> {
    let raw = body.to_string();
    let response: GraphqlResponse =
        serde_json::from_value(body).map_err(|err| TableauError::Decode {
            service: Service::Metadata,
            message: err.to_string(),
        })?;

    let Some(data) = response.data else {
        if response.errors.is_some_and(|errors| !errors.is_empty()) {
            return Err(TableauError::MetadataApi { status, body: raw });
        }
        return Err(ValidationError::Empty("metadata API").into());
    };

    data.published_datasources
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| ValidationError::NotFound(luid.to_string()).into())
}
