//! Access token refresh.
//!
//! The coordinator makes token expiry invisible to callers while guaranteeing
//! that at most one refresh call is made per token generation, no matter how
//! many requests hit the expired token at once. Refresh tokens may be rotated
//! on use, so two concurrent refresh calls could invalidate each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ApiError, error_message};
use crate::events::{SessionEndReason, SessionEvent, SessionEvents};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the server rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Why a refresh call did not produce a new access token.
#[derive(Debug, Error)]
pub enum RefreshFailure {
    /// The refresh token itself was rejected (expired, revoked, unknown).
    #[error("refresh token rejected (HTTP {status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// The refresh endpoint could not be reached.
    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The refresh endpoint failed for a reason unrelated to the token.
    #[error("refresh endpoint returned HTTP {status}: {message}")]
    Server { status: StatusCode, message: String },

    #[error("invalid refresh response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RefreshFailure {
    /// Check if the session cannot be recovered without a new login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshFailure>;
}

/// `POST /auth/refresh` with the refresh token as bearer credential and no body.
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http,
            endpoint: config.endpoint(REFRESH_PATH)?,
        })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshFailure> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(refresh_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        if status.is_client_error() {
            Err(RefreshFailure::Rejected { status, message })
        } else {
            Err(RefreshFailure::Server { status, message })
        }
    }
}

/// Single-flight refresh keyed by token generation.
///
/// The generation advances on every change of the active access token:
/// login, successful refresh, session end and logout. A request records the
/// generation it was sent under; when it fails with `401` it asks the
/// coordinator to resolve that generation. The first caller performs the
/// refresh, later callers for the same generation wait on the gate and then
/// find the generation already advanced.
///
/// A refresh that fails without rejecting the token leaves the generation
/// alone. Callers that were already waiting on that attempt receive its
/// failure instead of issuing another refresh call; a `401` arriving after
/// the attempt finished starts a new one.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    events: SessionEvents,
    generation: AtomicU64,
    /// Number of finished refresh attempts.
    attempts: AtomicU64,
    /// Held for the whole duration of a refresh call. Holds the failure of
    /// the last attempt when it ended without resolving the generation.
    gate: Mutex<Option<Arc<RefreshFailure>>>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        events: SessionEvents,
    ) -> Self {
        Self {
            store,
            refresher,
            events,
            generation: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Current token generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of finished refresh attempts.
    #[inline]
    pub(crate) fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark a freshly stored login. Requests still holding the previous
    /// generation will retry with the new token instead of refreshing.
    pub fn begin_session(&self) -> u64 {
        let generation = self.advance();
        self.events
            .publish(SessionEvent::SessionStarted { generation });
        generation
    }

    /// Mark a local logout. No event is published; the user asked for it.
    pub fn end_session_locally(&self) -> u64 {
        self.advance()
    }

    /// Resolve an authorization failure observed under `observed` generation.
    ///
    /// Returns `Ok(())` when a usable access token is stored and the request
    /// should be retried once. Returns [`ApiError::SessionExpired`] after the
    /// store has been cleared and `SessionEnded` published. Transport, server
    /// and decode failures of the refresh endpoint are returned as
    /// [`ApiError::RefreshUnavailable`] and leave the session untouched.
    pub async fn refresh(&self, observed: u64) -> Result<(), ApiError> {
        self.resolve(observed, self.attempts()).await
    }

    /// Like [`refresh`](Self::refresh), with the attempt count read when the
    /// failed request was sent. Attempts that finished after that point are
    /// shared instead of repeated.
    #[instrument(skip(self))]
    pub(crate) async fn resolve(&self, observed: u64, attempts_seen: u64) -> Result<(), ApiError> {
        let mut last_failure = self.gate.lock().await;

        // Double-check after acquiring the gate (another request may have refreshed)
        let current = self.generation();
        if current != observed {
            debug!(current, "Generation already resolved, reusing its outcome");
            return self.current_outcome();
        }

        if self.attempts() != attempts_seen {
            return match last_failure.as_ref() {
                Some(failure) => {
                    debug!(error = %failure, "Sharing the outcome of the failed refresh attempt");
                    Err(ApiError::RefreshUnavailable {
                        source: failure.clone(),
                    })
                }
                None => self.current_outcome(),
            };
        }

        let result = self.attempt().await;
        *last_failure = match &result {
            Err(ApiError::RefreshUnavailable { source }) => Some(source.clone()),
            _ => None,
        };
        self.attempts.fetch_add(1, Ordering::AcqRel);
        result
    }

    fn current_outcome(&self) -> Result<(), ApiError> {
        if self.store.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::SessionExpired)
        }
    }

    /// One refresh call. The caller holds the gate.
    async fn attempt(&self) -> Result<(), ApiError> {
        let refresh_token = match self.store.read() {
            Some(record) if !record.refresh_token.is_empty() => record.refresh_token,
            _ => {
                warn!("Authorization failed and no refresh token is stored");
                return Err(self.end_session(SessionEndReason::MissingRefreshToken));
            }
        };

        info!("Access token rejected, refreshing");

        match self.refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                let stored = self
                    .store
                    .replace_tokens(&tokens.access_token, tokens.refresh_token.as_deref())?;
                if !stored {
                    // Logged out while the refresh was in flight.
                    debug!("Store cleared during refresh, discarding new token");
                    return Err(ApiError::SessionExpired);
                }

                let generation = self.advance();
                info!(
                    generation,
                    rotated = tokens.refresh_token.is_some(),
                    "Access token refreshed"
                );
                self.events
                    .publish(SessionEvent::AccessTokenRefreshed { generation });
                Ok(())
            }
            Err(RefreshFailure::Rejected { status, message }) => {
                warn!(%status, %message, "Refresh token rejected, ending session");
                Err(self.end_session(SessionEndReason::RefreshRejected))
            }
            Err(failure) => {
                warn!(error = %failure, "Refresh failed, session kept");
                Err(ApiError::RefreshUnavailable {
                    source: Arc::new(failure),
                })
            }
        }
    }

    /// Clear the store, advance the generation, then publish `SessionEnded`.
    ///
    /// Runs at most once per generation because the caller holds the gate and
    /// has just checked the generation.
    fn end_session(&self, reason: SessionEndReason) -> ApiError {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear credential store");
        }
        self.advance();
        self.events.publish(SessionEvent::SessionEnded { reason });
        ApiError::SessionExpired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialRecord, MemoryCredentialStore, UserProfile};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Refresher that counts calls and answers after a short delay.
    struct FakeRefresher {
        calls: AtomicUsize,
        accept: bool,
        rotate: bool,
        /// Answer with a 503 instead of accepting or rejecting.
        unavailable: bool,
    }

    impl FakeRefresher {
        fn accepting() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                accept: true,
                rotate: false,
                unavailable: false,
            }
        }

        fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::accepting()
            }
        }

        fn rejecting() -> Self {
            Self {
                accept: false,
                ..Self::accepting()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.unavailable {
                Err(RefreshFailure::Server {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "Service Unavailable".to_string(),
                })
            } else if self.accept {
                Ok(RefreshedTokens {
                    access_token: format!("access-{n}"),
                    refresh_token: self.rotate.then(|| format!("{refresh_token}-next")),
                })
            } else {
                Err(RefreshFailure::Rejected {
                    status: StatusCode::UNAUTHORIZED,
                    message: "Invalid refresh token".to_string(),
                })
            }
        }
    }

    fn record() -> CredentialRecord {
        CredentialRecord::new(
            "access-0",
            "refresh-0",
            UserProfile {
                id: "1".to_string(),
                username: "admin".to_string(),
                name: String::new(),
                role: "admin".to_string(),
                performance: None,
            },
        )
    }

    fn coordinator(
        store: Arc<MemoryCredentialStore>,
        refresher: Arc<FakeRefresher>,
    ) -> (RefreshCoordinator, SessionEvents) {
        let events = SessionEvents::new();
        let coordinator = RefreshCoordinator::new(store, refresher, events.clone());
        (coordinator, events)
    }

    #[tokio::test]
    async fn test_refresh_replaces_access_token_only() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::accepting());
        let (coordinator, _events) = coordinator(store.clone(), refresher.clone());

        coordinator.refresh(0).await.unwrap();

        let stored = store.read().unwrap();
        assert_eq!(stored.access_token, "access-1");
        assert_eq!(stored.refresh_token, "refresh-0");
        assert_eq!(stored.user, record().user);
        assert_eq!(coordinator.generation(), 1);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stored() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher {
            rotate: true,
            ..FakeRefresher::accepting()
        });
        let (coordinator, _events) = coordinator(store.clone(), refresher);

        coordinator.refresh(0).await.unwrap();
        assert_eq!(store.read().unwrap().refresh_token, "refresh-0-next");
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_refresh() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::accepting());
        let (coordinator, _events) = coordinator(store.clone(), refresher.clone());

        let observed = coordinator.generation();
        let results =
            futures::future::join_all((0..8).map(|_| coordinator.refresh(observed))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.read().unwrap().access_token, "access-1");
    }

    #[tokio::test]
    async fn test_rejection_clears_store_and_signals_once() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::rejecting());
        let (coordinator, events) = coordinator(store.clone(), refresher.clone());
        let mut rx = events.subscribe();

        let results = futures::future::join_all((0..5).map(|_| coordinator.refresh(0))).await;

        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(ApiError::SessionExpired)))
        );
        assert_eq!(refresher.calls(), 1);
        assert!(store.read().is_none());

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SessionEnded {
                reason: SessionEndReason::RefreshRejected
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_record_ends_session_without_refresh_call() {
        let store = Arc::new(MemoryCredentialStore::new());
        let refresher = Arc::new(FakeRefresher::accepting());
        let (coordinator, events) = coordinator(store, refresher.clone());
        let mut rx = events.subscribe();

        let result = coordinator.refresh(0).await;
        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(refresher.calls(), 0);
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SessionEnded {
                reason: SessionEndReason::MissingRefreshToken
            }
        );
    }

    #[tokio::test]
    async fn test_stale_generation_skips_refresh() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::accepting());
        let (coordinator, _events) = coordinator(store, refresher.clone());

        coordinator.begin_session();
        coordinator.refresh(0).await.unwrap();
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_shared_by_waiters() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::unavailable());
        let (coordinator, events) = coordinator(store.clone(), refresher.clone());
        let mut rx = events.subscribe();

        let results = futures::future::join_all((0..5).map(|_| coordinator.refresh(0))).await;

        assert_eq!(refresher.calls(), 1);
        for result in &results {
            let err = result.as_ref().unwrap_err();
            assert!(matches!(err, ApiError::RefreshUnavailable { .. }));
            assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        }
        assert_eq!(coordinator.generation(), 0);
        assert_eq!(store.read(), Some(record()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_later_failure_starts_a_new_attempt() {
        let store = Arc::new(MemoryCredentialStore::with_record(record()));
        let refresher = Arc::new(FakeRefresher::unavailable());
        let (coordinator, _events) = coordinator(store.clone(), refresher.clone());

        assert!(coordinator.refresh(0).await.is_err());
        assert!(coordinator.refresh(0).await.is_err());

        assert_eq!(refresher.calls(), 2);
        assert!(store.is_authenticated());
    }
}
