//! Telegram notification link.

use serde::{Deserialize, Serialize};

use crate::credentials::opt_string_or_number;
use crate::error::ApiError;
use crate::pipeline::{ApiClient, ApiRequest};

/// Whether the user's account is linked to a Telegram chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramStatus {
    pub linked: bool,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub chat_id: Option<String>,
    pub username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkRequest<'a> {
    chat_id: &'a str,
}

pub struct NotificationsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> NotificationsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn status(&self) -> Result<TelegramStatus, ApiError> {
        self.client
            .execute_json(&ApiRequest::get("/telegram/status"), "telegram status")
            .await
    }

    pub async fn link(&self, chat_id: &str) -> Result<TelegramStatus, ApiError> {
        let request = ApiRequest::post("/telegram/link").json(&LinkRequest { chat_id })?;
        self.client.execute_json(&request, "telegram status").await
    }

    pub async fn unlink(&self) -> Result<(), ApiError> {
        self.client
            .execute_empty(&ApiRequest::post("/telegram/unlink"))
            .await
    }

    /// Ask the server to send a test notification to the linked chat.
    pub async fn send_test(&self) -> Result<(), ApiError> {
        self.client
            .execute_empty(&ApiRequest::post("/telegram/test"))
            .await
    }
}
