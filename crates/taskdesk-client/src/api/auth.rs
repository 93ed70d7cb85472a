//! Login, logout and profile.

use serde::Serialize;
use serde::de::Error as _;
use tracing::{info, instrument, warn};

use crate::credentials::{CredentialRecord, UserProfile};
use crate::error::ApiError;
use crate::pipeline::{ApiClient, ApiRequest};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/auth/me";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    refresh_token: String,
}

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Log in and persist the returned credential record.
    ///
    /// A rejected password surfaces as [`ApiError::Server`] with status 401;
    /// login never goes through the refresh path.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialRecord, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .public()
            .json(&LoginRequest { username, password })?;

        let record: CredentialRecord = self.client.execute_json(&request, "login").await?;
        if !record.is_complete() {
            return Err(ApiError::decode(
                "login",
                serde_json::Error::custom("empty access or refresh token"),
            ));
        }

        let generation = self.client.start_session(&record)?;
        info!(
            user = %record.user.username,
            role = %record.user.role,
            generation,
            "Logged in"
        );
        Ok(record)
    }

    /// Log out on the server (best effort) and clear local credentials.
    ///
    /// The local session is cleared even when the server call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(record) = self.client.store().read() {
            let request = ApiRequest::post(LOGOUT_PATH).public().json(&LogoutRequest {
                refresh_token: record.refresh_token,
            })?;
            if let Err(e) = self.client.execute_empty(&request).await {
                warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }

        self.client.clear_session()?;
        info!("Logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    /// Cached profile from the last login, without a network call.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.client.current_user()
    }

    /// Fetch the current profile from the server and update the cached copy.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let user: UserProfile = self
            .client
            .execute_json(&ApiRequest::get(PROFILE_PATH), "profile")
            .await?;
        self.client.store().replace_user(&user)?;
        Ok(user)
    }
}
