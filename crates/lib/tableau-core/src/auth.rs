//! Connected-app JWT sign-in.
//!
//! A short-lived HS256 JWT is exchanged at the REST sign-in endpoint for a
//! session token that the metadata and VDS clients send as `X-Tableau-Auth`.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::future::BoxFuture;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tableau_model::schema::{endpoint, signin_path};
use tracing::info;
use uuid::Uuid;

use crate::config::TableauSettings;
use crate::credentials::IssuedToken;
use crate::error::AuthError;

/// Lifetime of the assertion JWT itself, not of the session token.
const JWT_LIFETIME_MINUTES: i64 = 5;
const JWT_AUDIENCE: &str = "tableau";

/// Produces a fresh bearer token on demand.
pub trait Authenticator: Send + Sync {
    fn sign_in(&self) -> BoxFuture<'_, Result<IssuedToken, AuthError>>;
}

#[derive(Debug, Serialize)]
struct ConnectedAppClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
    jti: String,
    scp: &'a [String],
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    credentials: SignInCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct SignInCredentials<'a> {
    jwt: &'a str,
    site: SiteRef<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteRef<'a> {
    content_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    credentials: Option<SignInToken>,
}

#[derive(Debug, Deserialize)]
struct SignInToken {
    token: Option<String>,
}

pub struct ConnectedAppAuthenticator {
    settings: Arc<TableauSettings>,
    http: reqwest::Client,
}

impl ConnectedAppAuthenticator {
    #[must_use]
    pub const fn new(settings: Arc<TableauSettings>, http: reqwest::Client) -> Self {
        Self { settings, http }
    }

    /// Encodes the connected-app assertion.
    ///
    /// # Errors
    /// Returns `AuthError::JwtFailure` if signing fails.
    pub fn assertion(&self) -> Result<String, AuthError> {
        let settings = &self.settings;
        let claims = ConnectedAppClaims {
            iss: &settings.jwt_client_id,
            sub: &settings.user,
            aud: JWT_AUDIENCE,
            exp: (Utc::now() + TimeDelta::minutes(JWT_LIFETIME_MINUTES)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            scp: &settings.jwt_scopes,
        };
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(settings.jwt_secret_id.clone());

        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
        )
        .map_err(|err| AuthError::jwt(format!("failed to encode JWT: {err}")))
    }

    async fn exchange(&self) -> Result<IssuedToken, AuthError> {
        let jwt = self.assertion()?;
        let settings = &self.settings;
        let url = endpoint(&settings.domain, &signin_path(&settings.api_version));
        let request = SignInRequest {
            credentials: SignInCredentials {
                jwt: &jwt,
                site: SiteRef {
                    content_url: &settings.site,
                },
            },
        };

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| AuthError::jwt(format!("sign-in request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AuthError::jwt(format!("failed to read sign-in response: {err}")))?;
        if !status.is_success() {
            return Err(AuthError::rejected(status.as_u16(), body));
        }

        let parsed: SignInResponse = serde_json::from_str(&body)
            .map_err(|err| AuthError::jwt(format!("unreadable sign-in response: {err}")))?;
        let token = parsed
            .credentials
            .and_then(|credentials| credentials.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::jwt("sign-in response did not include a token"))?;

        info!(site = %settings.site, user = %settings.user, "signed in to Tableau");
        Ok(IssuedToken::new(token))
    }
}

impl Authenticator for ConnectedAppAuthenticator {
    fn sign_in(&self) -> BoxFuture<'_, Result<IssuedToken, AuthError>> {
        Box::pin(self.exchange())
    }
}
