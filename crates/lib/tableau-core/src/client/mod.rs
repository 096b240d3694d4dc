//! Upstream Tableau API clients.
//!
//! Both clients share one transport: an explicit request timeout, the
//! `X-Tableau-Auth` header, and bounded retry with backoff for reads.

pub mod metadata;
pub mod vds;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tableau_model::schema::HEADER_TABLEAU_AUTH;
use tracing::warn;

use crate::error::{Service, TableauError, TableauResult};

pub use metadata::MetadataClient;
pub use vds::VdsClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    const fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

/// Transport settings shared by every upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl HttpSettings {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryPolicy::new(3, Duration::from_millis(250)),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds an HTTP client honouring the configured timeout.
    ///
    /// # Errors
    /// Returns `TableauError::Runtime` if the TLS backend cannot be initialised.
    pub fn build_client(&self) -> TableauResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| TableauError::Runtime(format!("failed to build HTTP client: {err}")))
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Authenticated JSON POST shared by the metadata and VDS clients.
#[derive(Clone)]
pub(crate) struct Transport {
    service: Service,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl Transport {
    pub(crate) const fn new(service: Service, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            service,
            http,
            retry,
        }
    }

    /// Posts `body` and returns the decoded JSON response.
    ///
    /// Only read requests go through here, so every call may be retried.
    pub(crate) async fn post_read<B: Serialize + Sync + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> TableauResult<(u16, Value)> {
        let mut attempt = 1;
        loop {
            match self.post_once(url, token, body).await {
                Ok(success) => return Ok(success),
                Err(failure) if failure.retryable && self.retry.has_attempts_after(attempt) => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        service = %self.service,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %failure.error,
                        "retrying upstream read"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn post_once<B: Serialize + Sync + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<(u16, Value), Attempt> {
        let response = self
            .http
            .post(url)
            .header(HEADER_TABLEAU_AUTH, token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| Attempt::retryable(self.transport_error(&err)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| Attempt::retryable(self.transport_error(&err)))?;

        if !status.is_success() {
            let error = TableauError::api(self.service, status.as_u16(), text);
            return Err(Attempt {
                error,
                retryable: is_retryable_status(status),
            });
        }

        let value = serde_json::from_str(&text).map_err(|err| {
            Attempt::fatal(TableauError::Decode {
                service: self.service,
                message: err.to_string(),
            })
        })?;
        Ok((status.as_u16(), value))
    }

    fn transport_error(&self, err: &reqwest::Error) -> TableauError {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        TableauError::Transport {
            service: self.service,
            message,
        }
    }
}

struct Attempt {
    error: TableauError,
    retryable: bool,
}

impl Attempt {
    const fn retryable(error: TableauError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    const fn fatal(error: TableauError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Extracts the `data` array of a VDS-style response, if present.
pub(crate) fn take_data(mut value: Value) -> Option<Value> {
    match value.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => None,
        Some(data) => Some(data),
    }
}
