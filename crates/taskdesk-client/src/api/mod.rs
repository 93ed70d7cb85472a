//! Per-resource API facades.
//!
//! Each facade method issues exactly one call through [`ApiClient`] and
//! decodes the result. Credential handling, refresh and retry live in the
//! pipeline, so every endpoint gets them without doing anything here.

mod auth;
mod chat;
mod notifications;
mod tasks;

use std::sync::Arc;

pub use auth::{AuthApi, LOGIN_PATH, LOGOUT_PATH};
pub use chat::{ChatApi, ChatMessage};
pub use notifications::{NotificationsApi, TelegramStatus};
pub use tasks::{NewTask, Task, TaskFilter, TaskPriority, TaskStats, TaskStatus, TaskUpdate, TasksApi};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::pipeline::ApiClient;

/// Entry point bundling all facades over one shared [`ApiClient`].
#[derive(Clone)]
pub struct TaskdeskClient {
    client: ApiClient,
}

impl TaskdeskClient {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Ok(Self::from_api_client(ApiClient::new(config, store)?))
    }

    pub fn from_api_client(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying pipeline, for session state and event subscription.
    pub fn api(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(&self.client)
    }

    pub fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(&self.client)
    }

    pub fn chat(&self) -> ChatApi<'_> {
        ChatApi::new(&self.client)
    }

    pub fn notifications(&self) -> NotificationsApi<'_> {
        NotificationsApi::new(&self.client)
    }
}
