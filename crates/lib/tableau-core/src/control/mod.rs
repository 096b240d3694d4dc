use std::sync::Arc;

use serde_json::Value;
use tableau_model::{AugmentedPrompt, DataDictionary, VdsResult};

use crate::auth::{Authenticator, ConnectedAppAuthenticator};
use crate::client::{HttpSettings, MetadataClient, VdsClient};
use crate::config::TableauSettings;
use crate::credentials::CredentialCache;
use crate::error::TableauResult;
use crate::pipeline::{self, AugmentInput, require};

pub mod operations;

pub use operations::{
    AugmentParams,
    DatasourceParams,
    DispatchError,
    GetValuesParams,
    HeadlessDataParams,
    OPERATIONS,
    Operation,
    OperationOutput,
    OperationSpec,
    QueryVdsParams,
    lookup,
};

/// Entry point for every callable operation.
///
/// Owns the shared credential slot and both upstream clients; cheap to clone.
#[derive(Clone)]
pub struct TableauControlPlane {
    settings: Arc<TableauSettings>,
    credentials: Arc<CredentialCache>,
    authenticator: Arc<dyn Authenticator>,
    metadata: MetadataClient,
    vds: VdsClient,
}

impl TableauControlPlane {
    /// Wires the connected-app authenticator and both clients over one
    /// connection pool.
    ///
    /// # Errors
    /// Returns `TableauError::Runtime` if the HTTP client cannot be built.
    pub fn new(
        settings: TableauSettings,
        http: HttpSettings,
        credentials: CredentialCache,
    ) -> TableauResult<Self> {
        let settings = Arc::new(settings);
        let client = http.build_client()?;
        let authenticator = Arc::new(ConnectedAppAuthenticator::new(
            settings.clone(),
            client.clone(),
        ));
        Ok(Self::with_parts(
            settings,
            Arc::new(credentials),
            authenticator,
            MetadataClient::new(client.clone(), http),
            VdsClient::new(client, http),
        ))
    }

    #[must_use]
    pub fn with_parts(
        settings: Arc<TableauSettings>,
        credentials: Arc<CredentialCache>,
        authenticator: Arc<dyn Authenticator>,
        metadata: MetadataClient,
        vds: VdsClient,
    ) -> Self {
        Self {
            settings,
            credentials,
            authenticator,
            metadata,
            vds,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TableauSettings {
        &self.settings
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Returns a valid bearer token, signing in if the cached one is stale.
    ///
    /// # Errors
    /// Returns `TableauError::Auth` if sign-in fails.
    pub async fn token(&self) -> TableauResult<String> {
        Ok(self
            .credentials
            .get_or_refresh(|| self.authenticator.sign_in())
            .await?)
    }

    /// # Errors
    /// Returns any validation, auth, or metadata API failure.
    pub async fn get_data_dictionary(&self, luid: &str) -> TableauResult<DataDictionary> {
        require(luid, "datasource_luid")?;
        let token = self.token().await?;
        self.metadata
            .get_data_dictionary(&token, &self.settings.domain, luid)
            .await
    }

    /// # Errors
    /// Returns any validation, auth, or VDS failure.
    pub async fn query_vds_metadata(&self, luid: &str) -> TableauResult<VdsResult> {
        require(luid, "datasource_luid")?;
        let token = self.token().await?;
        self.vds
            .query_metadata(&token, &self.settings.domain, luid)
            .await
    }

    /// # Errors
    /// Returns any validation, auth, or VDS failure.
    pub async fn query_vds(&self, luid: &str, query: &Value) -> TableauResult<VdsResult> {
        require(luid, "datasource_luid")?;
        let token = self.token().await?;
        self.vds
            .query(&token, &self.settings.domain, luid, query)
            .await
    }

    /// # Errors
    /// Returns any validation, auth, VDS, or formatting failure.
    pub async fn get_headlessbi_data(&self, payload: &Value, luid: &str) -> TableauResult<String> {
        require(luid, "datasource_luid")?;
        let token = self.token().await?;
        pipeline::get_headless_data(&self.vds, payload, &self.settings.domain, &token, luid).await
    }

    /// # Errors
    /// Returns any validation, auth, or VDS failure.
    pub async fn get_values(&self, luid: &str, caption: &str) -> TableauResult<Vec<Value>> {
        require(luid, "datasource_luid")?;
        require(caption, "caption")?;
        let token = self.token().await?;
        pipeline::get_values(&self.vds, &token, &self.settings.domain, luid, caption).await
    }

    /// # Errors
    /// Returns any validation, auth, metadata API, or VDS failure.
    pub async fn augment_datasource_metadata(
        &self,
        luid: &str,
        input: AugmentInput,
    ) -> TableauResult<AugmentedPrompt> {
        require(luid, "datasource_luid")?;
        require(&input.task, "task")?;
        let token = self.token().await?;
        pipeline::augment(
            &self.metadata,
            &self.vds,
            &token,
            &self.settings.domain,
            luid,
            input,
        )
        .await
    }
}
