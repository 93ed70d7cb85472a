//! Per-task chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::{opt_string_or_number, string_or_number};
use crate::error::ApiError;
use crate::pipeline::{ApiClient, ApiRequest, path_segment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    content: &'a str,
}

pub struct ChatApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ChatApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn messages(&self, task_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("/chat/{}/messages", path_segment(task_id)?);
        self.client
            .execute_json(&ApiRequest::get(path), "chat messages")
            .await
    }

    pub async fn send(&self, task_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        let path = format!("/chat/{}/messages", path_segment(task_id)?);
        let request = ApiRequest::post(path).json(&NewMessage { content })?;
        self.client.execute_json(&request, "chat message").await
    }
}
