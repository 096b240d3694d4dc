//! Single-slot bearer token cache.
//!
//! One credential is shared by every operation. Refresh is serialized behind
//! an async mutex so callers racing past an expired token trigger a single
//! sign-in.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

/// Lifetime assumed for a token when the issuer does not report one.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 120;

/// Safety margin subtracted from a credential's expiry.
pub const SKEW_MARGIN_MINUTES: i64 = 3;

/// Longest lifetime a credential may be given; larger values are capped.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Token produced by an authentication round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub ttl_minutes: Option<i64>,
}

impl IssuedToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ttl_minutes: None,
        }
    }

    #[must_use]
    pub const fn with_ttl_minutes(mut self, ttl_minutes: i64) -> Self {
        self.ttl_minutes = Some(ttl_minutes);
        self
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        now + skew < self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct CredentialCache {
    slot: AsyncMutex<Option<Credential>>,
    clock: Arc<dyn Clock>,
    skew: TimeDelta,
    default_ttl_minutes: i64,
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: AsyncMutex::new(None),
            clock,
            skew: TimeDelta::minutes(SKEW_MARGIN_MINUTES),
            default_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }

    #[must_use]
    pub const fn with_default_ttl_minutes(mut self, ttl_minutes: i64) -> Self {
        self.default_ttl_minutes = ttl_minutes;
        self
    }

    /// Returns the cached token, or runs `authenticate` and caches its result.
    ///
    /// The slot stays locked while `authenticate` runs, so concurrent callers
    /// wait for the in-flight sign-in and then reuse its token.
    ///
    /// # Errors
    /// Returns whatever `authenticate` fails with; the slot is left unchanged.
    pub async fn get_or_refresh<F, Fut, E>(&self, authenticate: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, E>>,
    {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();
        if let Some(credential) = slot.as_ref()
            && credential.is_valid_at(now, self.skew)
        {
            debug!(expires_at = %credential.expires_at, "using cached Tableau credential");
            return Ok(credential.token.clone());
        }

        let issued = authenticate().await?;
        let credential = self.issue(issued);
        info!(expires_at = %credential.expires_at, "refreshed Tableau credential");
        let token = credential.token.clone();
        *slot = Some(credential);
        Ok(token)
    }

    /// Stores a token explicitly, replacing any cached credential.
    pub async fn set(&self, token: impl Into<String>, ttl_minutes: Option<i64>) {
        let credential = self.issue(IssuedToken {
            token: token.into(),
            ttl_minutes,
        });
        *self.slot.lock().await = Some(credential);
    }

    pub async fn current(&self) -> Option<Credential> {
        self.slot.lock().await.clone()
    }

    /// Lifetimes are clamped to `0..=MAX_TOKEN_TTL_MINUTES`.
    fn issue(&self, issued: IssuedToken) -> Credential {
        let issued_at = self.clock.now();
        let ttl = issued
            .ttl_minutes
            .unwrap_or(self.default_ttl_minutes)
            .clamp(0, MAX_TOKEN_TTL_MINUTES);
        let expires_at = TimeDelta::try_minutes(ttl)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Credential {
            token: issued.token,
            issued_at,
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn counting_sign_in(
        calls: &AtomicUsize,
    ) -> impl Future<Output = Result<IssuedToken, Infallible>> + '_ {
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken::new(format!("token-{n}")))
        }
    }

    #[tokio::test]
    async fn reuses_token_within_skew_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock.clone());
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        clock.advance(TimeDelta::minutes(60));
        let second = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_once_past_expiry_minus_skew() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock.clone());
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        // 120 minute lifetime, 3 minute skew: at +117 the token is no longer usable.
        clock.advance(TimeDelta::minutes(117));
        let second = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        let third = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-2");
        assert_eq!(third, "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_just_inside_skew_is_still_served() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock.clone());
        let calls = AtomicUsize::new(0);

        cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        clock.advance(TimeDelta::minutes(116) + TimeDelta::seconds(59));
        cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_set_honours_ttl() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock.clone());
        cache.set("manual", Some(10)).await;

        let credential = cache.current().await.expect("credential stored");
        assert_eq!(credential.expires_at - credential.issued_at, TimeDelta::minutes(10));

        let calls = AtomicUsize::new(0);
        let token = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        assert_eq!(token, "manual");

        clock.advance(TimeDelta::minutes(8));
        let token = cache.get_or_refresh(|| counting_sign_in(&calls)).await.unwrap();
        assert_eq!(token, "token-1");
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped_instead_of_overflowing() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock);

        cache.set("forever", Some(i64::MAX / 60)).await;
        let credential = cache.current().await.expect("credential stored");
        assert_eq!(
            credential.expires_at - credential.issued_at,
            TimeDelta::minutes(MAX_TOKEN_TTL_MINUTES)
        );

        cache.set("negative", Some(i64::MIN)).await;
        let credential = cache.current().await.expect("credential stored");
        assert_eq!(credential.expires_at, credential.issued_at);
    }

    #[tokio::test]
    async fn oversized_default_ttl_from_sign_in_is_capped() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = CredentialCache::with_clock(clock).with_default_ttl_minutes(i64::MAX);

        let token = cache
            .get_or_refresh(|| async { Ok::<_, Infallible>(IssuedToken::new("long")) })
            .await
            .unwrap();

        let credential = cache.current().await.expect("credential stored");
        assert_eq!(token, "long");
        assert_eq!(
            credential.expires_at - credential.issued_at,
            TimeDelta::minutes(MAX_TOKEN_TTL_MINUTES)
        );
    }

    #[tokio::test]
    async fn failed_refresh_leaves_slot_untouched() {
        let cache = CredentialCache::new();
        let result: Result<String, &str> = cache.get_or_refresh(|| async { Err("denied") }).await;

        assert_eq!(result, Err("denied"));
        assert!(cache.current().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_sign_in() {
        let cache = Arc::new(CredentialCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Infallible>(IssuedToken::new("shared"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.expect("task").expect("token"), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
