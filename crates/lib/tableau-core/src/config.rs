//! Strict key/value configuration lookup.
//!
//! Values come from a [`ConfigSource`], normally the process environment. A
//! missing key is always an error; nothing here falls back to a default.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::ConfigError;

pub const TABLEAU_DOMAIN: &str = "TABLEAU_DOMAIN";
pub const TABLEAU_SITE: &str = "TABLEAU_SITE";
pub const TABLEAU_API: &str = "TABLEAU_API";
pub const TABLEAU_USER: &str = "TABLEAU_USER";
pub const TABLEAU_JWT_CLIENT_ID: &str = "TABLEAU_JWT_CLIENT_ID";
pub const TABLEAU_JWT_SECRET_ID: &str = "TABLEAU_JWT_SECRET_ID";
pub const TABLEAU_JWT_SECRET: &str = "TABLEAU_JWT_SECRET";
pub const JWT_SCOPES: &str = "JWT_SCOPES";

/// Source of raw string configuration values.
pub trait ConfigSource: Send + Sync {
    fn raw(&self, key: &str) -> Option<String>;
}

/// Reads values from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn raw(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub struct ConfigResolver {
    source: Box<dyn ConfigSource>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(EnvSource)
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingKey` if the key is unset or blank.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.source
            .raw(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Returns the value for `key` as an ordered list.
    ///
    /// The raw value is read as a JSON array of strings first; anything else is
    /// split on commas with surrounding whitespace trimmed.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingKey` if the key is unset or blank.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let raw = self.get(key)?;
        if let Ok(values) = serde_json::from_str::<Vec<String>>(&raw) {
            return Ok(values);
        }
        debug!(key, "list setting is not a JSON array; splitting on commas");
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Connection and connected-app credentials for one Tableau site.
#[derive(Clone, PartialEq, Eq)]
pub struct TableauSettings {
    pub domain: String,
    pub site: String,
    pub api_version: String,
    pub user: String,
    pub jwt_client_id: String,
    pub jwt_secret_id: String,
    pub jwt_secret: String,
    pub jwt_scopes: Vec<String>,
}

impl TableauSettings {
    /// Reads every required Tableau key.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingKey` for the first absent key.
    pub fn resolve(resolver: &ConfigResolver) -> Result<Self, ConfigError> {
        Ok(Self {
            domain: resolver
                .get(TABLEAU_DOMAIN)?
                .trim()
                .trim_end_matches('/')
                .to_string(),
            site: resolver.get(TABLEAU_SITE)?,
            api_version: resolver.get(TABLEAU_API)?,
            user: resolver.get(TABLEAU_USER)?,
            jwt_client_id: resolver.get(TABLEAU_JWT_CLIENT_ID)?,
            jwt_secret_id: resolver.get(TABLEAU_JWT_SECRET_ID)?,
            jwt_secret: resolver.get(TABLEAU_JWT_SECRET)?,
            jwt_scopes: resolver.get_list(JWT_SCOPES)?,
        })
    }
}

impl TableauSettings {
    /// Settings view safe to hand to clients; the JWT secret is left out.
    #[must_use]
    pub fn redacted(&self) -> RedactedSettings<'_> {
        RedactedSettings {
            domain: &self.domain,
            site: &self.site,
            api_version: &self.api_version,
            user: &self.user,
            jwt_client_id: &self.jwt_client_id,
            jwt_secret_id: &self.jwt_secret_id,
            jwt_scopes: &self.jwt_scopes,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RedactedSettings<'a> {
    pub domain: &'a str,
    pub site: &'a str,
    pub api_version: &'a str,
    pub user: &'a str,
    pub jwt_client_id: &'a str,
    pub jwt_secret_id: &'a str,
    pub jwt_scopes: &'a [String],
}

impl fmt::Debug for TableauSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableauSettings")
            .field("domain", &self.domain)
            .field("site", &self.site)
            .field("api_version", &self.api_version)
            .field("user", &self.user)
            .field("jwt_client_id", &self.jwt_client_id)
            .field("jwt_secret_id", &self.jwt_secret_id)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_scopes", &self.jwt_scopes)
            .finish()
    }
}
