use std::sync::Arc;

use tableau_core::config::TableauSettings;
use tableau_core::credentials::CredentialCache;
use tableau_core::{TableauControlPlane, TableauResult};

use crate::config::DaemonConfig;

/// Builds the control plane shared by every surface the daemon serves.
pub fn build_control_plane(
    settings: TableauSettings,
    config: &DaemonConfig,
) -> TableauResult<Arc<TableauControlPlane>> {
    let credentials = CredentialCache::new().with_default_ttl_minutes(config.token_ttl_minutes);
    TableauControlPlane::new(settings, config.http, credentials).map(Arc::new)
}
