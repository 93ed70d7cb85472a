//! Request pipeline and refresh coordination.

mod client;
mod refresh;
mod request;

pub use client::ApiClient;
pub use refresh::{
    HttpTokenRefresher, REFRESH_PATH, RefreshCoordinator, RefreshFailure, RefreshedTokens,
    TokenRefresher,
};
pub use request::{ApiRequest, AuthMode};
pub(crate) use request::path_segment;
