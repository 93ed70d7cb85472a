//! Authenticated API client for the taskdesk task board.
//!
//! Every call goes through a single pipeline that attaches the stored access
//! token and, when the server answers `401`, exchanges the refresh token for a
//! new access token and retries the call once. Concurrent calls that hit the
//! same expired token share a single refresh.
//!
//! # Architecture
//!
//! - [`CredentialStore`]: durable access/refresh token and profile storage
//! - [`ApiClient`]: request pipeline plus refresh-and-retry
//! - [`RefreshCoordinator`]: single-flight refresh keyed by token generation
//! - [`SessionEvents`]: upward "session ended" signal for the UI layer
//! - [`api`]: per-resource facades (auth, tasks, chat, notifications)

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod pipeline;

pub use api::TaskdeskClient;
pub use config::ClientConfig;
pub use credentials::{
    CredentialRecord, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    PerformanceMetrics, UserProfile,
};
pub use error::{ApiError, Result, StoreError};
pub use events::{SessionEndReason, SessionEvent, SessionEvents};
pub use pipeline::{
    ApiClient, ApiRequest, AuthMode, HttpTokenRefresher, RefreshCoordinator, RefreshFailure,
    RefreshedTokens, TokenRefresher,
};
