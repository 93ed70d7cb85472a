//! The authenticated API client.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use super::refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
use super::request::{ApiRequest, AuthMode, authorize};
use crate::config::ClientConfig;
use crate::credentials::{CredentialRecord, CredentialStore, UserProfile};
use crate::error::{ApiError, StoreError};
use crate::events::{SessionEvent, SessionEvents};

/// Coordinator state read just before a request was sent.
#[derive(Debug, Clone, Copy)]
struct Observed {
    generation: u64,
    attempts: u64,
}

/// A response together with the token generation it was sent under.
struct Dispatched {
    response: reqwest::Response,
    /// `None` when the request went out without a bearer token.
    observed: Option<Observed>,
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    events: SessionEvents,
    coordinator: RefreshCoordinator,
}

/// Issues API calls with the stored credential and recovers from expired
/// access tokens transparently.
///
/// Cloning is cheap; all clones share the store, the refresh coordinator and
/// the event channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client talking to `config.base_url`, refreshing through
    /// `POST /auth/refresh`.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let http = config.build_http_client()?;
        let refresher = Arc::new(HttpTokenRefresher::new(http.clone(), &config)?);
        Ok(Self::from_parts(config, http, store, refresher))
    }

    /// Create a client with a custom refresh implementation.
    pub fn with_refresher(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self, ApiError> {
        let http = config.build_http_client()?;
        Ok(Self::from_parts(config, http, store, refresher))
    }

    fn from_parts(
        config: ClientConfig,
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let events = SessionEvents::with_capacity(config.event_capacity);
        let coordinator = RefreshCoordinator::new(store.clone(), refresher, events.clone());
        Self {
            inner: Arc::new(Inner {
                http,
                config,
                store,
                events,
                coordinator,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn generation(&self) -> u64 {
        self.inner.coordinator.generation()
    }

    /// Whether a credential record is currently stored.
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// Cached profile of the logged-in user.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.store.read().map(|record| record.user)
    }

    /// Store a freshly issued credential record and start a new generation.
    ///
    /// A record missing either token is refused and nothing is written.
    pub fn start_session(&self, record: &CredentialRecord) -> Result<u64, ApiError> {
        if !record.is_complete() {
            return Err(StoreError::IncompleteRecord.into());
        }
        self.inner.store.write(record)?;
        Ok(self.inner.coordinator.begin_session())
    }

    /// Drop the stored credentials locally.
    pub fn clear_session(&self) -> Result<(), ApiError> {
        self.inner.store.clear()?;
        self.inner.coordinator.end_session_locally();
        Ok(())
    }

    /// Send a request, refreshing and retrying once on `401`.
    ///
    /// Returns the successful response or the error of the last attempt.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let first = self.dispatch(request).await?;
        if first.response.status() != StatusCode::UNAUTHORIZED {
            return Self::into_result(first.response).await;
        }

        if request.auth_mode() == AuthMode::Public {
            return Err(ApiError::from_response(first.response).await);
        }

        let Some(observed) = first.observed else {
            debug!("Unauthenticated request rejected");
            return Err(ApiError::Unauthenticated);
        };

        self.inner
            .coordinator
            .resolve(observed.generation, observed.attempts)
            .await?;

        debug!("Retrying request with refreshed credential");
        let retried = self.dispatch(request).await?;
        // A second 401 is surfaced as is; there is no further retry.
        Self::into_result(retried.response).await
    }

    /// Send a request and decode its JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        context: &'static str,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(context, e))
    }

    /// Send a request and discard its body.
    pub async fn execute_empty(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(drop)
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Dispatched, ApiError> {
        let url = self.inner.config.endpoint(request.path())?;
        // Read the generation before the token: if a refresh lands in between
        // the request carries the newer token and a 401 skips the refresh.
        let observed = Observed {
            generation: self.inner.coordinator.generation(),
            attempts: self.inner.coordinator.attempts(),
        };
        let builder = request.to_builder(&self.inner.http, url);
        let (builder, authenticated) = authorize(builder, self.inner.store.as_ref());

        let response = builder.send().await?;
        Ok(Dispatched {
            response,
            observed: authenticated.then_some(observed),
        })
    }

    async fn into_result(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }
}
